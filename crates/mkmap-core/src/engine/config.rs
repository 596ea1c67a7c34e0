use super::grid::TraversalOrder;
use crate::core::numeric::{NumericBackend, Precision};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
    #[error("Search directions must not be empty")]
    EmptySearchDirections,
    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Engine configured for the '{configured}' backend but run with '{requested}'")]
    BackendMismatch {
        configured: &'static str,
        requested: &'static str,
    },
}

/// Neighbour offsets, in grid units, tried when looking for a warm start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchDirections {
    /// The origin followed by every offset in `{-1, 0, 1}^d`.
    #[default]
    Moore,
    Explicit(Vec<Vec<i64>>),
}

const MOORE_2D: [[i64; 2]; 9] = [
    [0, 0],
    [0, 1],
    [1, 0],
    [0, -1],
    [-1, 0],
    [-1, 1],
    [1, 1],
    [1, -1],
    [-1, -1],
];

impl SearchDirections {
    /// Concrete offsets for a grid of the given dimension.
    ///
    /// In two dimensions the Moore neighbourhood visits the origin, the four
    /// axis neighbours, then the diagonals. Other dimensions list the origin,
    /// then the remaining offsets by increasing number of non-zero components.
    pub fn offsets(&self, dimension: usize) -> Result<Vec<Vec<i64>>, ConfigError> {
        match self {
            SearchDirections::Moore if dimension == 2 => {
                Ok(MOORE_2D.iter().map(|offset| offset.to_vec()).collect())
            }
            SearchDirections::Moore => {
                let mut offsets: Vec<Vec<i64>> = vec![Vec::new()];
                for _ in 0..dimension {
                    offsets = offsets
                        .into_iter()
                        .flat_map(|prefix| {
                            [0, 1, -1].into_iter().map(move |k| {
                                let mut next = prefix.clone();
                                next.push(k);
                                next
                            })
                        })
                        .collect();
                }
                offsets.sort_by_key(|offset| offset.iter().filter(|k| **k != 0).count());
                Ok(offsets)
            }
            SearchDirections::Explicit(offsets) => {
                if offsets.is_empty() {
                    return Err(ConfigError::EmptySearchDirections);
                }
                if let Some(bad) = offsets.iter().find(|o| o.len() != dimension) {
                    return Err(ConfigError::DimensionMismatch {
                        what: "search directions",
                        expected: dimension,
                        found: bad.len(),
                    });
                }
                Ok(offsets.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_rootfinding_iterations: usize,
    pub internally_constrain_coverages: bool,
    /// An iteration stalls when its residual exceeds this fraction of the previous one.
    pub residual_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    pub search_directions: SearchDirections,
    pub max_bisections: usize,
    pub descriptor_decimal_precision: u32,
    pub traversal: TraversalOrder,
    pub force_recalculation: bool,
    pub retry_failed_points: bool,
    /// Largest multiple of the search offsets tried when looking for a bisection anchor.
    pub bisection_search_reach: usize,
    pub solve_independently: bool,
}

/// Finite-difference sensitivities computed around converged grid points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    /// `∂ln|TOF| / ∂ln p` for every gas pair.
    pub reaction_orders: bool,
    /// Degree of rate control, `∂ln|TOF| / ∂ln k` at fixed equilibrium constant.
    pub rate_control: bool,
    /// Relative step of the central difference.
    pub perturbation: f64,
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.reaction_orders || self.rate_control
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub numeric: NumericBackend,
    pub solver: SolverConfig,
    pub mapper: MapperConfig,
    pub analysis: AnalysisConfig,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    pub fn precision(&self) -> Precision {
        self.numeric.precision()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            numeric: NumericBackend::default(),
            solver: SolverConfig {
                tolerance: EngineConfigBuilder::DEFAULT_TOLERANCE,
                max_rootfinding_iterations: EngineConfigBuilder::DEFAULT_MAX_ITERATIONS,
                internally_constrain_coverages: true,
                residual_threshold: EngineConfigBuilder::DEFAULT_RESIDUAL_THRESHOLD,
            },
            mapper: MapperConfig {
                search_directions: SearchDirections::default(),
                max_bisections: EngineConfigBuilder::DEFAULT_MAX_BISECTIONS,
                descriptor_decimal_precision: EngineConfigBuilder::DEFAULT_DECIMAL_PRECISION,
                traversal: TraversalOrder::default(),
                force_recalculation: false,
                retry_failed_points: false,
                bisection_search_reach: EngineConfigBuilder::DEFAULT_SEARCH_REACH,
                solve_independently: false,
            },
            analysis: AnalysisConfig {
                reaction_orders: false,
                rate_control: false,
                perturbation: EngineConfigBuilder::DEFAULT_PERTURBATION,
            },
        }
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    numeric: Option<NumericBackend>,
    tolerance: Option<f64>,
    max_rootfinding_iterations: Option<usize>,
    internally_constrain_coverages: Option<bool>,
    residual_threshold: Option<f64>,
    search_directions: Option<SearchDirections>,
    max_bisections: Option<usize>,
    descriptor_decimal_precision: Option<u32>,
    traversal: Option<TraversalOrder>,
    force_recalculation: Option<bool>,
    retry_failed_points: Option<bool>,
    bisection_search_reach: Option<usize>,
    solve_independently: Option<bool>,
    reaction_orders: Option<bool>,
    rate_control: Option<bool>,
    perturbation: Option<f64>,
}

impl EngineConfigBuilder {
    pub const DEFAULT_TOLERANCE: f64 = 1e-50;
    pub const DEFAULT_MAX_ITERATIONS: usize = 50;
    pub const DEFAULT_RESIDUAL_THRESHOLD: f64 = 0.5;
    pub const DEFAULT_MAX_BISECTIONS: usize = 3;
    pub const DEFAULT_DECIMAL_PRECISION: u32 = 2;
    pub const DEFAULT_SEARCH_REACH: usize = 2;
    pub const DEFAULT_PERTURBATION: f64 = 1e-4;
    /// Rounded keys are stored as `i64`; more decimals would overflow typical descriptor ranges.
    pub const MAX_DECIMAL_PRECISION: u32 = 12;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn numeric(mut self, backend: NumericBackend) -> Self {
        self.numeric = Some(backend);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn max_rootfinding_iterations(mut self, iterations: usize) -> Self {
        self.max_rootfinding_iterations = Some(iterations);
        self
    }
    pub fn internally_constrain_coverages(mut self, enabled: bool) -> Self {
        self.internally_constrain_coverages = Some(enabled);
        self
    }
    pub fn residual_threshold(mut self, threshold: f64) -> Self {
        self.residual_threshold = Some(threshold);
        self
    }
    pub fn search_directions(mut self, directions: SearchDirections) -> Self {
        self.search_directions = Some(directions);
        self
    }
    pub fn max_bisections(mut self, n: usize) -> Self {
        self.max_bisections = Some(n);
        self
    }
    pub fn descriptor_decimal_precision(mut self, decimals: u32) -> Self {
        self.descriptor_decimal_precision = Some(decimals);
        self
    }
    pub fn traversal(mut self, order: TraversalOrder) -> Self {
        self.traversal = Some(order);
        self
    }
    pub fn force_recalculation(mut self, enabled: bool) -> Self {
        self.force_recalculation = Some(enabled);
        self
    }
    pub fn retry_failed_points(mut self, enabled: bool) -> Self {
        self.retry_failed_points = Some(enabled);
        self
    }
    pub fn bisection_search_reach(mut self, reach: usize) -> Self {
        self.bisection_search_reach = Some(reach);
        self
    }
    pub fn solve_independently(mut self, enabled: bool) -> Self {
        self.solve_independently = Some(enabled);
        self
    }
    pub fn reaction_orders(mut self, enabled: bool) -> Self {
        self.reaction_orders = Some(enabled);
        self
    }
    pub fn rate_control(mut self, enabled: bool) -> Self {
        self.rate_control = Some(enabled);
        self
    }
    pub fn perturbation(mut self, step: f64) -> Self {
        self.perturbation = Some(step);
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let invalid = |parameter: &'static str, reason: String| ConfigError::InvalidParameter {
            parameter,
            reason,
        };

        let numeric = self.numeric.unwrap_or(defaults.numeric);
        if let NumericBackend::Decimal { digits } = numeric {
            if digits == 0 || digits > Precision::MAX_DIGITS {
                return Err(invalid(
                    "numeric.digits",
                    format!("{} is outside 1..={}", digits, Precision::MAX_DIGITS),
                ));
            }
        }

        let tolerance = self.tolerance.unwrap_or(defaults.solver.tolerance);
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(invalid("tolerance", format!("{} is not a positive number", tolerance)));
        }
        let max_rootfinding_iterations = self
            .max_rootfinding_iterations
            .unwrap_or(defaults.solver.max_rootfinding_iterations);
        if max_rootfinding_iterations == 0 {
            return Err(invalid(
                "max_rootfinding_iterations",
                "at least one iteration is required".to_string(),
            ));
        }
        let residual_threshold = self
            .residual_threshold
            .unwrap_or(defaults.solver.residual_threshold);
        if !(residual_threshold > 0.0 && residual_threshold < 1.0) {
            return Err(invalid(
                "residual_threshold",
                format!("{} is not in the open interval (0, 1)", residual_threshold),
            ));
        }

        let search_directions = self
            .search_directions
            .unwrap_or(defaults.mapper.search_directions);
        if let SearchDirections::Explicit(offsets) = &search_directions {
            let first = offsets.first().ok_or(ConfigError::EmptySearchDirections)?;
            if let Some(bad) = offsets.iter().find(|o| o.len() != first.len()) {
                return Err(ConfigError::DimensionMismatch {
                    what: "search directions",
                    expected: first.len(),
                    found: bad.len(),
                });
            }
        }
        let descriptor_decimal_precision = self
            .descriptor_decimal_precision
            .unwrap_or(defaults.mapper.descriptor_decimal_precision);
        if descriptor_decimal_precision > Self::MAX_DECIMAL_PRECISION {
            return Err(invalid(
                "descriptor_decimal_precision",
                format!("{} exceeds {}", descriptor_decimal_precision, Self::MAX_DECIMAL_PRECISION),
            ));
        }
        let bisection_search_reach = self
            .bisection_search_reach
            .unwrap_or(defaults.mapper.bisection_search_reach);
        if bisection_search_reach == 0 {
            return Err(invalid(
                "bisection_search_reach",
                "must be at least 1".to_string(),
            ));
        }

        let perturbation = self.perturbation.unwrap_or(defaults.analysis.perturbation);
        if !(perturbation > 0.0 && perturbation < 0.5) {
            return Err(invalid(
                "perturbation",
                format!("{} is not in the open interval (0, 0.5)", perturbation),
            ));
        }

        Ok(EngineConfig {
            numeric,
            solver: SolverConfig {
                tolerance,
                max_rootfinding_iterations,
                internally_constrain_coverages: self
                    .internally_constrain_coverages
                    .unwrap_or(defaults.solver.internally_constrain_coverages),
                residual_threshold,
            },
            mapper: MapperConfig {
                search_directions,
                max_bisections: self.max_bisections.unwrap_or(defaults.mapper.max_bisections),
                descriptor_decimal_precision,
                traversal: self.traversal.unwrap_or(defaults.mapper.traversal),
                force_recalculation: self
                    .force_recalculation
                    .unwrap_or(defaults.mapper.force_recalculation),
                retry_failed_points: self
                    .retry_failed_points
                    .unwrap_or(defaults.mapper.retry_failed_points),
                bisection_search_reach,
                solve_independently: self
                    .solve_independently
                    .unwrap_or(defaults.mapper.solve_independently),
            },
            analysis: AnalysisConfig {
                reaction_orders: self
                    .reaction_orders
                    .unwrap_or(defaults.analysis.reaction_orders),
                rate_control: self.rate_control.unwrap_or(defaults.analysis.rate_control),
                perturbation,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.numeric, NumericBackend::Decimal { digits: 50 });
        assert_eq!(config.solver.tolerance, 1e-50);
        assert_eq!(config.solver.max_rootfinding_iterations, 50);
        assert!(config.solver.internally_constrain_coverages);
        assert_eq!(config.solver.residual_threshold, 0.5);
        assert_eq!(config.mapper.search_directions, SearchDirections::Moore);
        assert_eq!(config.mapper.max_bisections, 3);
        assert_eq!(config.mapper.descriptor_decimal_precision, 2);
        assert_eq!(config.mapper.traversal, TraversalOrder::RowMajor);
        assert_eq!(config.mapper.bisection_search_reach, 2);
        assert!(!config.mapper.force_recalculation);
        assert!(!config.mapper.retry_failed_points);
        assert!(!config.mapper.solve_independently);
        assert!(!config.analysis.is_enabled());
        assert_eq!(config.analysis.perturbation, 1e-4);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn moore_neighbourhood_in_two_dimensions_has_nine_offsets() {
        let offsets = SearchDirections::Moore.offsets(2).unwrap();
        assert_eq!(offsets.len(), 9);
        assert_eq!(offsets[0], vec![0, 0]);
        assert_eq!(offsets[1], vec![0, 1]);
        assert_eq!(offsets[8], vec![-1, -1]);
    }

    #[test]
    fn moore_neighbourhood_generalizes_to_other_dimensions() {
        assert_eq!(
            SearchDirections::Moore.offsets(1).unwrap(),
            vec![vec![0], vec![1], vec![-1]]
        );
        let offsets = SearchDirections::Moore.offsets(3).unwrap();
        assert_eq!(offsets.len(), 27);
        assert_eq!(offsets[0], vec![0, 0, 0]);
        assert!(offsets[1..7].iter().all(|o| o.iter().filter(|k| **k != 0).count() == 1));
    }

    #[test]
    fn explicit_directions_must_match_grid_dimension() {
        let directions = SearchDirections::Explicit(vec![vec![0, 1]]);
        assert!(matches!(
            directions.offsets(3),
            Err(ConfigError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn build_rejects_invalid_values() {
        assert!(EngineConfig::builder().tolerance(0.0).build().is_err());
        assert!(EngineConfig::builder().residual_threshold(-1.0).build().is_err());
        assert!(EngineConfig::builder().residual_threshold(1.0).build().is_err());
        assert!(EngineConfig::builder().residual_threshold(5.0).build().is_err());
        assert!(EngineConfig::builder().residual_threshold(0.99).build().is_ok());
        assert!(EngineConfig::builder().max_rootfinding_iterations(0).build().is_err());
        assert!(
            EngineConfig::builder()
                .numeric(NumericBackend::Decimal { digits: 0 })
                .build()
                .is_err()
        );
        assert!(EngineConfig::builder().bisection_search_reach(0).build().is_err());
        assert!(EngineConfig::builder().perturbation(0.0).build().is_err());
        assert!(EngineConfig::builder().perturbation(0.5).build().is_err());
        assert_eq!(
            EngineConfig::builder()
                .search_directions(SearchDirections::Explicit(Vec::new()))
                .build(),
            Err(ConfigError::EmptySearchDirections)
        );
        assert!(matches!(
            EngineConfig::builder()
                .search_directions(SearchDirections::Explicit(vec![vec![0, 1], vec![1]]))
                .build(),
            Err(ConfigError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn builder_overrides_are_applied() {
        let config = EngineConfig::builder()
            .numeric(NumericBackend::Double)
            .tolerance(1e-10)
            .traversal(TraversalOrder::Serpentine)
            .solve_independently(true)
            .rate_control(true)
            .perturbation(1e-3)
            .build()
            .unwrap();
        assert_eq!(config.numeric, NumericBackend::Double);
        assert_eq!(config.solver.tolerance, 1e-10);
        assert_eq!(config.mapper.traversal, TraversalOrder::Serpentine);
        assert!(config.mapper.solve_independently);
        assert!(config.analysis.rate_control);
        assert!(!config.analysis.reaction_orders);
        assert!(config.analysis.is_enabled());
        assert_eq!(config.analysis.perturbation, 1e-3);
    }
}
