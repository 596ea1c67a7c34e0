use super::state::{FailureRecord, Solution, SolveMethod};
use crate::core::models::descriptor::DescriptorPoint;
use crate::core::numeric::Numeric;
use std::collections::BTreeMap;

/// Descriptor coordinates rounded to a fixed number of decimals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointKey(Vec<i64>);

impl PointKey {
    pub fn new(point: &DescriptorPoint, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self(
            point
                .coordinates()
                .iter()
                .map(|x| (x * scale).round() as i64)
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<N> {
    pub point: DescriptorPoint,
    pub solution: Solution<N>,
    pub method: SolveMethod,
}

/// Solutions keyed by rounded descriptor point, with failure and bisection tables.
#[derive(Debug, Clone)]
pub struct SolutionCache<N> {
    decimals: u32,
    spacing: Vec<f64>,
    entries: BTreeMap<PointKey, CacheEntry<N>>,
    failures: BTreeMap<PointKey, FailureRecord>,
    intermediates: BTreeMap<PointKey, CacheEntry<N>>,
}

impl<N: Numeric> SolutionCache<N> {
    /// `spacing` is the length of one grid unit along each dimension.
    pub fn new(decimals: u32, spacing: Vec<f64>) -> Self {
        Self {
            decimals,
            spacing,
            entries: BTreeMap::new(),
            failures: BTreeMap::new(),
            intermediates: BTreeMap::new(),
        }
    }

    pub fn key(&self, point: &DescriptorPoint) -> PointKey {
        PointKey::new(point, self.decimals)
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, point: &DescriptorPoint) -> Option<&Solution<N>> {
        self.entry(point).map(|entry| &entry.solution)
    }

    pub fn entry(&self, point: &DescriptorPoint) -> Option<&CacheEntry<N>> {
        self.entries.get(&self.key(point))
    }

    pub fn failure(&self, point: &DescriptorPoint) -> Option<&FailureRecord> {
        self.failures.get(&self.key(point))
    }

    pub fn intermediate(&self, point: &DescriptorPoint) -> Option<&Solution<N>> {
        self.intermediates
            .get(&self.key(point))
            .map(|entry| &entry.solution)
    }

    fn converged_at(&self, point: &DescriptorPoint) -> Option<&CacheEntry<N>> {
        let key = self.key(point);
        self.entries
            .get(&key)
            .filter(|entry| entry.solution.converged)
            .or_else(|| self.intermediates.get(&key))
    }

    /// First converged solution found by stepping from `point` along each offset, in order.
    pub fn get_nearest(
        &self,
        point: &DescriptorPoint,
        directions: &[Vec<i64>],
    ) -> Option<&CacheEntry<N>> {
        directions
            .iter()
            .find_map(|offset| self.converged_at(&point.offset(offset, &self.spacing)))
    }

    /// Like [`Self::get_nearest`], but repeats the non-zero offsets scaled by
    /// `1..=reach` and never returns `point` itself.
    pub fn find_anchor(
        &self,
        point: &DescriptorPoint,
        directions: &[Vec<i64>],
        reach: usize,
    ) -> Option<&CacheEntry<N>> {
        let own_key = self.key(point);
        (1..=reach as i64).find_map(|scale| {
            directions
                .iter()
                .filter(|offset| offset.iter().any(|k| *k != 0))
                .find_map(|offset| {
                    let scaled: Vec<i64> = offset.iter().map(|k| k * scale).collect();
                    let candidate = point.offset(&scaled, &self.spacing);
                    if self.key(&candidate) == own_key {
                        return None;
                    }
                    self.converged_at(&candidate)
                })
        })
    }

    /// Stores a solution and clears any failure recorded for the same point.
    pub fn put(&mut self, point: &DescriptorPoint, solution: Solution<N>, method: SolveMethod) {
        let key = self.key(point);
        if solution.converged {
            self.failures.remove(&key);
        }
        self.entries.insert(
            key,
            CacheEntry {
                point: point.clone(),
                solution,
                method,
            },
        );
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        let key = self.key(&record.point);
        self.failures.insert(key, record);
    }

    pub fn put_intermediate(&mut self, point: &DescriptorPoint, solution: Solution<N>) {
        let key = self.key(point);
        self.intermediates.insert(
            key,
            CacheEntry {
                point: point.clone(),
                solution,
                method: SolveMethod::Bisection,
            },
        );
    }

    /// Cached grid solutions ordered by key.
    pub fn export(&self) -> Vec<&CacheEntry<N>> {
        self.entries.values().collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures.values()
    }

    pub fn intermediates(&self) -> impl Iterator<Item = &CacheEntry<N>> {
        self.intermediates.values()
    }
}
