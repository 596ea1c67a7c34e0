use super::config::SolverConfig;
use super::state::{Solution, Termination};
use crate::core::kinetics::{KineticsError, RateEquations, RateInputs};
use crate::core::numeric::Numeric;
use crate::core::numeric::linalg::{all_finite, max_norm, solve_linear};
use nalgebra::DVector;
use tracing::trace;

/// Multi-dimensional Newton iteration on the steady-state residual.
pub struct SteadyStateSolver<'a> {
    equations: &'a RateEquations,
    config: &'a SolverConfig,
}

struct Iterate<N> {
    coverages: DVector<N>,
    norm: N,
}

impl<'a> SteadyStateSolver<'a> {
    pub fn new(equations: &'a RateEquations, config: &'a SolverConfig) -> Self {
        Self { equations, config }
    }

    /// Solves from a double-precision guess such as a Boltzmann estimate.
    pub fn solve<N: Numeric>(
        &self,
        initial_guess: &[f64],
        inputs: &RateInputs<N>,
    ) -> Result<Solution<N>, KineticsError> {
        let start = self
            .equations
            .coverage_vector(initial_guess, inputs.precision())?;
        Ok(self.solve_from(start, inputs))
    }

    /// Solves from coverages already held at working precision, e.g. a cached neighbour.
    pub fn solve_from<N: Numeric>(&self, start: DVector<N>, inputs: &RateInputs<N>) -> Solution<N> {
        let precision = inputs.precision();
        let tolerance = N::from_f64(self.config.tolerance, precision).unwrap_or_else(|| N::zero(precision));
        let threshold =
            N::from_f64(self.config.residual_threshold, precision).unwrap_or_else(|| N::one(precision));
        let max_iterations = self.config.max_rootfinding_iterations;

        let mut coverages = self.constrained(start, inputs);
        let mut residual = self.equations.residual(&coverages, inputs);
        if !all_finite(&residual) {
            let norm = max_norm(&residual, precision);
            return self.finish(coverages, norm, 0, Termination::NonFinite, inputs);
        }
        let mut norm = max_norm(&residual, precision);
        let mut best = Iterate {
            coverages: coverages.clone(),
            norm: norm.clone(),
        };
        let mut iterations = 0;

        loop {
            if norm < tolerance {
                return self.finish(coverages, norm, iterations, Termination::Converged, inputs);
            }
            if iterations >= max_iterations {
                return self.finish_best(best, iterations, Termination::MaxIterations, inputs);
            }

            let jacobian = self.equations.jacobian(&coverages, inputs);
            let Some(step) = solve_linear(jacobian, residual.map(|value| -value)) else {
                return self.finish_best(best, iterations, Termination::Singular, inputs);
            };
            let updated = DVector::from_iterator(
                coverages.len(),
                coverages.iter().zip(step.iter()).map(|(x, dx)| x.clone() + dx.clone()),
            );
            let candidate = self.constrained(updated, inputs);
            let candidate_residual = self.equations.residual(&candidate, inputs);
            iterations += 1;
            if !all_finite(&candidate) || !all_finite(&candidate_residual) {
                return self.finish_best(best, iterations, Termination::NonFinite, inputs);
            }
            let candidate_norm = max_norm(&candidate_residual, precision);
            trace!(
                iteration = iterations,
                residual = candidate_norm.to_f64(),
                "Newton step"
            );

            let stalled = candidate_norm >= tolerance
                && iterations < max_iterations
                && candidate_norm > threshold.clone() * norm.clone();

            coverages = candidate;
            residual = candidate_residual;
            norm = candidate_norm;
            if norm < best.norm {
                best = Iterate {
                    coverages: coverages.clone(),
                    norm: norm.clone(),
                };
            }
            if stalled {
                return self.finish_best(best, iterations, Termination::Stalled, inputs);
            }
        }
    }

    fn constrained<N: Numeric>(&self, coverages: DVector<N>, inputs: &RateInputs<N>) -> DVector<N> {
        if self.config.internally_constrain_coverages {
            self.equations.constrain(coverages, inputs)
        } else {
            coverages
        }
    }

    fn finish_best<N: Numeric>(
        &self,
        best: Iterate<N>,
        iterations: usize,
        termination: Termination,
        inputs: &RateInputs<N>,
    ) -> Solution<N> {
        self.finish(best.coverages, best.norm, iterations, termination, inputs)
    }

    fn finish<N: Numeric>(
        &self,
        coverages: DVector<N>,
        residual_norm: N,
        iterations: usize,
        termination: Termination,
        inputs: &RateInputs<N>,
    ) -> Solution<N> {
        let rates = self.equations.rates(&coverages, inputs);
        Solution {
            coverages: coverages.iter().cloned().collect(),
            residual_norm,
            rates,
            converged: termination.is_converged(),
            iterations,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kinetics::ParameterVector;
    use crate::core::models::model::test_models;
    use crate::core::numeric::{Decimal, Precision};
    use crate::engine::config::EngineConfig;

    fn solver_config(tolerance: f64) -> SolverConfig {
        SolverConfig {
            tolerance,
            ..EngineConfig::default().solver
        }
    }

    #[test]
    fn two_state_equilibrium_converges_at_high_precision() {
        let model = test_models::two_state();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-50);
        let solver = SteadyStateSolver::new(&equations, &config);
        let precision = Precision::default();
        let inputs: RateInputs<Decimal> = equations
            .prepare(&ParameterVector::new(vec![2.0], vec![1.0]), precision)
            .unwrap();

        let solution = solver.solve(&[0.5, 0.5], &inputs).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.termination, Termination::Converged);
        assert!(solution.residual_norm < Decimal::from_f64(1e-50, precision).unwrap());

        let third = Decimal::one(precision)
            .checked_div(&Decimal::from_i64(3, precision))
            .unwrap();
        let error_a = (solution.coverages[0].clone() - third.clone()).abs();
        let error_b = (solution.coverages[1].clone() - (third.clone() + third)).abs();
        let bound = Decimal::from_f64(1e-49, precision).unwrap();
        assert!(error_a < bound);
        assert!(error_b < bound);
    }

    #[test]
    fn converged_solution_satisfies_residual_closure() {
        let model = test_models::adsorption_chain();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-12);
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(
                &ParameterVector::new(vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]),
                Precision::default(),
            )
            .unwrap();

        let solution = solver.solve(&[0.1, 0.1], &inputs).unwrap();
        assert!(solution.converged);
        let recomputed = equations.residual(&DVector::from_vec(solution.coverages.clone()), &inputs);
        assert!(max_norm(&recomputed, Precision::default()) < 1e-12);
        assert!((solution.coverages[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((solution.coverages[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((solution.rates.turnover_frequency[1] - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn solve_is_deterministic() {
        let model = test_models::dissociative();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-40);
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<Decimal> = equations
            .prepare(
                &ParameterVector::new(vec![5.0, 0.3], vec![0.2, 0.0]),
                Precision::default(),
            )
            .unwrap();

        let first = solver.solve(&[0.5], &inputs).unwrap();
        let second = solver.solve(&[0.5], &inputs).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.coverages[0].to_repr(), second.coverages[0].to_repr());
    }

    #[test]
    fn constrained_solution_respects_site_capacity() {
        let model = test_models::dissociative();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-12);
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(
                &ParameterVector::new(vec![1e6, 1e-3], vec![1e-6, 0.0]),
                Precision::default(),
            )
            .unwrap();

        let solution = solver.solve(&[1.7], &inputs).unwrap();
        assert!(solution.coverages.iter().all(|theta| *theta >= 0.0));
        assert!(solution.coverages.iter().sum::<f64>() <= 1.0 + 1e-12);
    }

    #[test]
    fn singular_jacobian_terminates_without_convergence() {
        let model = test_models::adsorption_chain();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-12);
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(
                &ParameterVector::new(vec![0.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]),
                Precision::default(),
            )
            .unwrap();

        let solution = solver.solve(&[0.2, 0.3], &inputs).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.termination, Termination::Singular);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.coverages, vec![0.2, 0.3]);
    }

    #[test]
    fn iteration_budget_is_respected() {
        let model = test_models::dissociative();
        let equations = RateEquations::new(&model);
        let config = SolverConfig {
            tolerance: 1e-300,
            max_rootfinding_iterations: 1,
            internally_constrain_coverages: true,
            residual_threshold: 0.5,
        };
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(
                &ParameterVector::new(vec![2.0, 1.0], vec![0.5, 0.0]),
                Precision::default(),
            )
            .unwrap();

        let solution = solver.solve(&[0.9], &inputs).unwrap();
        assert!(!solution.converged);
        assert_eq!(solution.termination, Termination::MaxIterations);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn strict_threshold_reports_stall() {
        let model = test_models::dissociative();
        let equations = RateEquations::new(&model);
        let config = SolverConfig {
            tolerance: 1e-300,
            max_rootfinding_iterations: 50,
            internally_constrain_coverages: true,
            residual_threshold: 1e-30,
        };
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(
                &ParameterVector::new(vec![2.0, 1.0], vec![0.5, 0.0]),
                Precision::default(),
            )
            .unwrap();

        let solution = solver.solve(&[0.9], &inputs).unwrap();
        assert_eq!(solution.termination, Termination::Stalled);
        assert_eq!(solution.iterations, 1);
    }

    #[test]
    fn wrong_guess_length_is_an_error() {
        let model = test_models::two_state();
        let equations = RateEquations::new(&model);
        let config = solver_config(1e-12);
        let solver = SteadyStateSolver::new(&equations, &config);
        let inputs: RateInputs<f64> = equations
            .prepare(&ParameterVector::new(vec![2.0], vec![1.0]), Precision::default())
            .unwrap();
        assert!(solver.solve(&[0.5], &inputs).is_err());
    }
}
