use thiserror::Error;

use super::config::ConfigError;
use super::grid::GridError;
use crate::core::kinetics::KineticsError;

/// Errors that abort a mapping run; point-local failures are recorded instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid descriptor grid: {0}")]
    Grid(#[from] GridError),

    #[error("Rate equation setup failed: {0}")]
    Kinetics(#[from] KineticsError),
}
