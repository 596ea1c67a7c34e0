//! # Kinetics Module
//!
//! Mass-action rate expressions for a [`ReactionModel`](crate::core::models::model::ReactionModel).
//!
//! [`rates::RateEquations`] is compiled once per model and then evaluated many
//! times by the steady-state solver: the time derivative of every adsorbate
//! coverage, the steady-state residual (with closure rows for saturated sites),
//! its analytic Jacobian, and the per-step and per-gas rate report attached to
//! every solution.

pub mod params;
pub mod rates;

pub use params::ParameterVector;
pub use rates::{KineticsError, RateEquations, RateInputs, RateReport};
