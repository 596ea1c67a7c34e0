use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileBackend {
    Double,
    Decimal,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileTraversal {
    RowMajor,
    Serpentine,
    FromSeed,
    AsListed,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileNumericConfig {
    pub backend: Option<FileBackend>,
    pub digits: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSolverConfig {
    pub tolerance: Option<f64>,
    pub max_rootfinding_iterations: Option<usize>,
    pub internally_constrain_coverages: Option<bool>,
    pub residual_threshold: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMapperConfig {
    pub search_directions: Option<Vec<Vec<i64>>>,
    pub max_bisections: Option<usize>,
    pub descriptor_decimal_precision: Option<u32>,
    pub traversal: Option<FileTraversal>,
    /// Lattice index the `from-seed` traversal starts from.
    pub seed: Option<Vec<i64>>,
    pub force_recalculation: Option<bool>,
    pub retry_failed_points: Option<bool>,
    pub bisection_search_reach: Option<usize>,
    pub solve_independently: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAnalysisConfig {
    pub reaction_orders: Option<bool>,
    pub rate_control: Option<bool>,
    pub perturbation: Option<f64>,
}

/// Either `axes` with `resolution`, or an explicit `points` list.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileGridConfig {
    pub axes: Option<Vec<[f64; 2]>>,
    pub resolution: Option<Vec<usize>>,
    pub points: Option<Vec<Vec<f64>>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub numeric: Option<FileNumericConfig>,
    pub solver: Option<FileSolverConfig>,
    pub mapper: Option<FileMapperConfig>,
    pub analysis: Option<FileAnalysisConfig>,
    pub grid: Option<FileGridConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
