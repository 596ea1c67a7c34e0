use crate::core::kinetics::RateReport;
use crate::core::models::descriptor::DescriptorPoint;
use std::fmt;

/// Why the Newton iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    Converged,
    MaxIterations,
    Stalled,
    /// The Jacobian had a zero pivot.
    Singular,
    /// A residual or update left the representable range.
    NonFinite,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Converged => "converged",
            Termination::MaxIterations => "max-iterations",
            Termination::Stalled => "stalled",
            Termination::Singular => "singular-jacobian",
            Termination::NonFinite => "non-finite",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steady-state result at one descriptor point.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<N> {
    /// Adsorbate coverages in the model's coverage order.
    pub coverages: Vec<N>,
    pub residual_norm: N,
    pub rates: RateReport<N>,
    pub converged: bool,
    pub iterations: usize,
    pub termination: Termination,
}

/// How a cached solution was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveMethod {
    /// Solved from a converged neighbour or the initial estimate.
    Direct,
    /// Reached by bisecting from a converged anchor.
    Bisection,
    /// Every strategy failed; the stored solution is unconverged.
    Unresolved,
}

impl SolveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveMethod::Direct => "direct",
            SolveMethod::Bisection => "bisection",
            SolveMethod::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// No rate constants or initial guess could be produced.
    Projection(String),
    /// The direct solve failed and no converged anchor was available to bisect from.
    Convergence(Termination),
    /// Bisection from a converged anchor ran out of budget.
    MappingGap { bisections: usize, samples: usize },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Projection(message) => write!(f, "projection failed: {}", message),
            FailureKind::Convergence(termination) => {
                write!(f, "did not converge ({})", termination)
            }
            FailureKind::MappingGap {
                bisections,
                samples,
            } => write!(
                f,
                "mapping gap after {} bisections and {} sampled points",
                bisections, samples
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub point: DescriptorPoint,
    pub kind: FailureKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_converged_termination_reports_convergence() {
        assert!(Termination::Converged.is_converged());
        for other in [
            Termination::MaxIterations,
            Termination::Stalled,
            Termination::Singular,
            Termination::NonFinite,
        ] {
            assert!(!other.is_converged());
        }
    }

    #[test]
    fn failure_kinds_render_readable_messages() {
        assert_eq!(
            FailureKind::Convergence(Termination::Singular).to_string(),
            "did not converge (singular-jacobian)"
        );
        assert_eq!(
            FailureKind::MappingGap {
                bisections: 3,
                samples: 6
            }
            .to_string(),
            "mapping gap after 3 bisections and 6 sampled points"
        );
    }
}
