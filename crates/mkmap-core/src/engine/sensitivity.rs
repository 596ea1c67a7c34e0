use super::cache::SolutionCache;
use super::config::EngineConfig;
use super::grid::DescriptorGrid;
use super::progress::{Progress, ProgressReporter};
use super::solver::SteadyStateSolver;
use super::state::Solution;
use crate::core::kinetics::{RateEquations, RateInputs};
use crate::core::models::descriptor::DescriptorPoint;
use crate::core::models::model::ReactionModel;
use crate::core::numeric::Numeric;
use crate::core::scaling::Projection;
use nalgebra::DVector;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Logarithmic sensitivities of every gas turnover frequency at one grid point.
///
/// An entry is `NaN` where the derivative is undefined: a zero turnover
/// frequency, a sign change across the perturbation, or a perturbed solve
/// that did not converge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sensitivity {
    /// `∂ln|TOF_g| / ∂ln p_h`, indexed `[g][h]`; empty unless requested.
    pub reaction_orders: Vec<Vec<f64>>,
    /// `∂ln|TOF_g| / ∂ln k_i` at fixed `K_i`, indexed `[g][i]`; empty unless requested.
    pub rate_control: Vec<Vec<f64>>,
}

/// Central differences around one converged solution.
struct Perturbation<'s, N> {
    solver: SteadyStateSolver<'s>,
    start: DVector<N>,
    up: N,
    down: N,
    /// `ln((1 + δ) / (1 - δ))`.
    span: f64,
    gases: usize,
}

impl<N: Numeric> Perturbation<'_, N> {
    fn turnover(&self, inputs: &RateInputs<N>) -> Option<Vec<N>> {
        let solution = self.solver.solve_from(self.start.clone(), inputs);
        solution
            .converged
            .then_some(solution.rates.turnover_frequency)
    }

    fn response(&self, scaled: impl Fn(&N) -> RateInputs<N>) -> Vec<f64> {
        match (self.turnover(&scaled(&self.up)), self.turnover(&scaled(&self.down))) {
            (Some(high), Some(low)) => high
                .iter()
                .zip(&low)
                .map(|(h, l)| log_ratio(h, l) / self.span)
                .collect(),
            _ => vec![f64::NAN; self.gases],
        }
    }

    /// Sensitivity matrix `[gas][column]` for `columns` independently scaled inputs.
    fn matrix(&self, columns: usize, scaled: impl Fn(usize, &N) -> RateInputs<N>) -> Vec<Vec<f64>> {
        let per_column: Vec<Vec<f64>> = (0..columns)
            .map(|col| self.response(|factor| scaled(col, factor)))
            .collect();
        (0..self.gases)
            .map(|gas| per_column.iter().map(|column| column[gas]).collect())
            .collect()
    }
}

/// `ln(high / low)`, or `NaN` when the ratio is undefined or not positive.
fn log_ratio<N: Numeric>(high: &N, low: &N) -> f64 {
    match high.checked_div(low).map(|ratio| ratio.to_f64()) {
        Some(ratio) if ratio > 0.0 => ratio.ln(),
        _ => f64::NAN,
    }
}

/// Reaction orders and degrees of rate control over a finished map.
pub struct SensitivityAnalyzer<'a> {
    equations: RateEquations,
    projection: &'a dyn Projection,
    config: &'a EngineConfig,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a> SensitivityAnalyzer<'a> {
    pub fn new(
        model: &ReactionModel,
        projection: &'a dyn Projection,
        config: &'a EngineConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            equations: RateEquations::new(model),
            projection,
            config,
            reporter,
        }
    }

    /// Analyses every converged grid point. Entries follow grid order and are
    /// `None` where no converged solution exists or the analysis is disabled.
    #[instrument(skip_all, name = "sensitivity_analysis")]
    pub fn run<N: Numeric>(
        &self,
        grid: &DescriptorGrid,
        cache: &SolutionCache<N>,
    ) -> Vec<Option<Sensitivity>> {
        let mut sensitivities = vec![None; grid.len()];
        let analysis = &self.config.analysis;
        if !analysis.is_enabled() {
            return sensitivities;
        }

        self.reporter.report(Progress::PhaseStart {
            name: "Sensitivity Analysis",
        });
        let targets: Vec<(usize, &Solution<N>)> = grid
            .points()
            .iter()
            .enumerate()
            .filter_map(|(idx, point)| {
                cache
                    .get(point)
                    .filter(|solution| solution.converged)
                    .map(|solution| (idx, solution))
            })
            .collect();
        info!(
            points = targets.len(),
            reaction_orders = analysis.reaction_orders,
            rate_control = analysis.rate_control,
            "Computing finite-difference sensitivities."
        );
        self.reporter.report(Progress::TaskStart {
            total_steps: targets.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = targets.iter();

        #[cfg(feature = "parallel")]
        let iterator = targets.par_iter();

        let results: Vec<(usize, Option<Sensitivity>)> = iterator
            .map(|(idx, solution)| (*idx, self.analyse_point(grid.point(*idx), solution)))
            .collect();

        for (idx, sensitivity) in results {
            sensitivities[idx] = sensitivity;
            self.reporter.report(Progress::TaskIncrement);
        }
        self.reporter.report(Progress::TaskFinish);
        self.reporter.report(Progress::PhaseFinish);
        sensitivities
    }

    /// Re-solves from `solution` with each pressure or step scaled by `1 ± δ`.
    pub fn analyse_point<N: Numeric>(
        &self,
        point: &DescriptorPoint,
        solution: &Solution<N>,
    ) -> Option<Sensitivity> {
        let params = match self.projection.project(point) {
            Ok(params) => params,
            Err(e) => {
                debug!(point = %point, error = %e, "Projection failed during sensitivity analysis.");
                return None;
            }
        };
        let inputs: RateInputs<N> = match self.equations.prepare(&params, self.config.precision()) {
            Ok(inputs) => inputs,
            Err(e) => {
                debug!(point = %point, error = %e, "Rate constants rejected during sensitivity analysis.");
                return None;
            }
        };

        let analysis = &self.config.analysis;
        let precision = inputs.precision();
        let delta = analysis.perturbation;
        let perturbation = Perturbation {
            solver: SteadyStateSolver::new(&self.equations, &self.config.solver),
            start: DVector::from_vec(solution.coverages.clone()),
            up: N::from_f64(1.0 + delta, precision)?,
            down: N::from_f64(1.0 - delta, precision)?,
            span: ((1.0 + delta) / (1.0 - delta)).ln(),
            gases: self.equations.gas_count(),
        };

        let mut sensitivity = Sensitivity::default();
        if analysis.reaction_orders {
            sensitivity.reaction_orders = perturbation.matrix(self.equations.gas_count(), |gas, factor| {
                inputs.with_pressure_scaled(gas, factor)
            });
        }
        if analysis.rate_control {
            sensitivity.rate_control = perturbation.matrix(self.equations.step_count(), |step, factor| {
                inputs.with_step_scaled(step, factor)
            });
        }
        Some(sensitivity)
    }
}
