use super::cache::SolutionCache;
use super::config::{ConfigError, EngineConfig};
use super::error::EngineError;
use super::grid::DescriptorGrid;
use super::progress::{Progress, ProgressReporter};
use super::solver::SteadyStateSolver;
use super::state::{FailureKind, FailureRecord, Solution, SolveMethod};
use crate::core::kinetics::{RateEquations, RateInputs};
use crate::core::models::descriptor::DescriptorPoint;
use crate::core::models::model::ReactionModel;
use crate::core::numeric::Numeric;
use crate::core::scaling::{InitialGuess, Projection};
use nalgebra::DVector;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Counters describing one mapping run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub points_total: usize,
    /// Points left untouched because the cache already held them.
    pub skipped: usize,
    pub solved_independently: usize,
    pub solved_direct: usize,
    pub solved_by_bisection: usize,
    pub failed: usize,
    /// Number of target points for which bisection was started.
    pub bisections_invoked: usize,
}

enum Bisection<N> {
    Converged(Solution<N>),
    NoAnchor,
    Exhausted { bisections: usize, samples: usize },
}

enum PointSolve<N> {
    Solved(Solution<N>),
    Failed(String),
}

/// Grid traversal that minimizes residuals by warm-starting from converged neighbours.
pub struct MinResidMapper<'a> {
    model: &'a ReactionModel,
    equations: RateEquations,
    projection: &'a dyn Projection,
    guess: &'a dyn InitialGuess,
    config: &'a EngineConfig,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a> MinResidMapper<'a> {
    pub fn new(
        model: &'a ReactionModel,
        projection: &'a dyn Projection,
        guess: &'a dyn InitialGuess,
        config: &'a EngineConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            model,
            equations: RateEquations::new(model),
            projection,
            guess,
            config,
            reporter,
        }
    }

    fn solver(&self) -> SteadyStateSolver<'_> {
        SteadyStateSolver::new(&self.equations, &self.config.solver)
    }

    /// Maps every point of `grid`, reading and writing `cache`.
    #[instrument(skip_all, name = "min_resid_mapping")]
    pub fn run<N: Numeric>(
        &self,
        grid: &DescriptorGrid,
        cache: &mut SolutionCache<N>,
    ) -> Result<MapSummary, EngineError> {
        let directions = self
            .config
            .mapper
            .search_directions
            .offsets(grid.dimension())?;
        if cache.spacing().len() != grid.dimension() {
            return Err(ConfigError::DimensionMismatch {
                what: "solution cache",
                expected: grid.dimension(),
                found: cache.spacing().len(),
            }
            .into());
        }
        let order = grid.traversal(&self.config.mapper.traversal)?;
        let mut summary = MapSummary {
            points_total: grid.len(),
            ..MapSummary::default()
        };

        let presolved = if self.config.mapper.solve_independently {
            self.independent_pass(grid, &order, cache, &mut summary)
        } else {
            HashSet::new()
        };

        self.reporter.report(Progress::PhaseStart { name: "Mapping" });
        info!(
            points = grid.len(),
            backend = N::NAME,
            "Traversing descriptor grid."
        );
        self.reporter.report(Progress::TaskStart {
            total_steps: order.len() as u64,
        });
        for idx in &order {
            if !presolved.contains(idx) {
                self.map_point(grid.point(*idx), &directions, cache, &mut summary);
            }
            self.reporter.report(Progress::TaskIncrement);
        }
        self.reporter.report(Progress::TaskFinish);
        self.reporter.report(Progress::PhaseFinish);

        info!(
            direct = summary.solved_direct,
            independent = summary.solved_independently,
            bisection = summary.solved_by_bisection,
            skipped = summary.skipped,
            failed = summary.failed,
            "Mapping complete."
        );
        Ok(summary)
    }

    fn should_skip<N: Numeric>(&self, point: &DescriptorPoint, cache: &SolutionCache<N>) -> bool {
        let mapper = &self.config.mapper;
        if mapper.force_recalculation {
            return false;
        }
        match cache.entry(point) {
            Some(entry) if entry.solution.converged => true,
            Some(_) => !mapper.retry_failed_points,
            None => cache.failure(point).is_some() && !mapper.retry_failed_points,
        }
    }

    /// Solves every uncached point from its initial estimate alone; converged
    /// results are stored in traversal order and their indices returned.
    #[instrument(skip_all, name = "independent_pass")]
    fn independent_pass<N: Numeric>(
        &self,
        grid: &DescriptorGrid,
        order: &[usize],
        cache: &mut SolutionCache<N>,
        summary: &mut MapSummary,
    ) -> HashSet<usize> {
        self.reporter.report(Progress::PhaseStart {
            name: "Independent Solves",
        });
        let pending: Vec<usize> = order
            .iter()
            .copied()
            .filter(|idx| !self.should_skip(grid.point(*idx), cache))
            .collect();
        info!(points = pending.len(), "Solving points independently.");

        #[cfg(not(feature = "parallel"))]
        let iterator = pending.iter();

        #[cfg(feature = "parallel")]
        let iterator = pending.par_iter();

        let results: Vec<(usize, Option<Solution<N>>)> = iterator
            .map(|idx| {
                let solved = match self.solve_from_estimate(grid.point(*idx)) {
                    PointSolve::Solved(solution) if solution.converged => Some(solution),
                    _ => None,
                };
                (*idx, solved)
            })
            .collect();

        let mut presolved = HashSet::new();
        for (idx, solution) in results {
            if let Some(solution) = solution {
                cache.put(grid.point(idx), solution, SolveMethod::Direct);
                summary.solved_independently += 1;
                presolved.insert(idx);
            }
        }
        self.reporter.report(Progress::PhaseFinish);
        presolved
    }

    fn prepare<N: Numeric>(&self, point: &DescriptorPoint) -> Result<RateInputs<N>, String> {
        let params = self.projection.project(point).map_err(|e| e.to_string())?;
        self.equations
            .prepare(&params, self.config.precision())
            .map_err(|e| e.to_string())
    }

    fn solve_from_estimate<N: Numeric>(&self, point: &DescriptorPoint) -> PointSolve<N> {
        let params = match self.projection.project(point) {
            Ok(params) => params,
            Err(e) => return PointSolve::Failed(e.to_string()),
        };
        let inputs: RateInputs<N> = match self.equations.prepare(&params, self.config.precision()) {
            Ok(inputs) => inputs,
            Err(e) => return PointSolve::Failed(e.to_string()),
        };
        let estimate = match self.guess.estimate(self.model, point, &params) {
            Ok(estimate) => estimate,
            Err(e) => return PointSolve::Failed(e.to_string()),
        };
        match self.solver().solve(&estimate, &inputs) {
            Ok(solution) => PointSolve::Solved(solution),
            Err(e) => PointSolve::Failed(e.to_string()),
        }
    }

    fn solve_from_neighbour<N: Numeric>(
        &self,
        point: &DescriptorPoint,
        start: &[N],
    ) -> PointSolve<N> {
        match self.prepare::<N>(point) {
            Ok(inputs) => PointSolve::Solved(
                self.solver()
                    .solve_from(DVector::from_vec(start.to_vec()), &inputs),
            ),
            Err(reason) => PointSolve::Failed(reason),
        }
    }

    fn record<N: Numeric>(
        &self,
        cache: &mut SolutionCache<N>,
        summary: &mut MapSummary,
        point: &DescriptorPoint,
        kind: FailureKind,
    ) {
        warn!(point = %point, reason = %kind, "Point failed.");
        self.reporter.report(Progress::PointFailed {
            point: point.to_string(),
            reason: kind.to_string(),
        });
        summary.failed += 1;
        cache.record_failure(FailureRecord {
            point: point.clone(),
            kind,
        });
    }

    /// Solves a single grid point, falling back to bisection when the direct solve fails.
    pub fn map_point<N: Numeric>(
        &self,
        point: &DescriptorPoint,
        directions: &[Vec<i64>],
        cache: &mut SolutionCache<N>,
        summary: &mut MapSummary,
    ) {
        if self.should_skip(point, cache) {
            debug!(point = %point, "Using cached solution.");
            summary.skipped += 1;
            return;
        }

        let neighbour = cache
            .get_nearest(point, directions)
            .map(|entry| entry.solution.coverages.clone());
        let attempt = match &neighbour {
            Some(start) => self.solve_from_neighbour(point, start),
            None => self.solve_from_estimate(point),
        };
        let direct = match attempt {
            PointSolve::Solved(solution) => solution,
            PointSolve::Failed(reason) => {
                self.record(cache, summary, point, FailureKind::Projection(reason));
                return;
            }
        };
        debug!(
            point = %point,
            warm_start = neighbour.is_some(),
            iterations = direct.iterations,
            termination = %direct.termination,
            "Direct solve finished."
        );

        if direct.converged {
            cache.put(point, direct, SolveMethod::Direct);
            summary.solved_direct += 1;
            return;
        }

        match self.bisect(point, directions, cache, summary) {
            Bisection::Converged(solution) => {
                debug!(point = %point, "Bisection reached target.");
                cache.put(point, solution, SolveMethod::Bisection);
                summary.solved_by_bisection += 1;
            }
            Bisection::NoAnchor => {
                let termination = direct.termination;
                cache.put(point, direct, SolveMethod::Unresolved);
                self.record(cache, summary, point, FailureKind::Convergence(termination));
            }
            Bisection::Exhausted {
                bisections,
                samples,
            } => {
                cache.put(point, direct, SolveMethod::Unresolved);
                self.record(
                    cache,
                    summary,
                    point,
                    FailureKind::MappingGap {
                        bisections,
                        samples,
                    },
                );
            }
        }
    }

    /// Walks from the nearest converged anchor towards `target` by halving the
    /// remaining interval; every converged midpoint becomes the new near end.
    fn bisect<N: Numeric>(
        &self,
        target: &DescriptorPoint,
        directions: &[Vec<i64>],
        cache: &mut SolutionCache<N>,
        summary: &mut MapSummary,
    ) -> Bisection<N> {
        let max_bisections = self.config.mapper.max_bisections;
        let Some(anchor) =
            cache.find_anchor(target, directions, self.config.mapper.bisection_search_reach)
        else {
            return Bisection::NoAnchor;
        };
        summary.bisections_invoked += 1;
        let mut near_point = anchor.point.clone();
        let mut near_coverages = anchor.solution.coverages.clone();
        let mut far_point = target.clone();
        let mut samples = 0;
        debug!(target = %target, anchor = %near_point, "Starting bisection.");

        for _ in 0..max_bisections {
            let midpoint = near_point.midpoint(&far_point);
            samples += 1;
            let solution = match self.solve_from_neighbour(&midpoint, &near_coverages) {
                PointSolve::Solved(solution) if solution.converged => solution,
                _ => {
                    far_point = midpoint;
                    continue;
                }
            };
            near_coverages = solution.coverages.clone();
            cache.put_intermediate(&midpoint, solution);
            near_point = midpoint;

            samples += 1;
            if let PointSolve::Solved(solution) = self.solve_from_neighbour(target, &near_coverages) {
                if solution.converged {
                    return Bisection::Converged(solution);
                }
            }
        }

        Bisection::Exhausted {
            bisections: max_bisections,
            samples,
        }
    }
}
