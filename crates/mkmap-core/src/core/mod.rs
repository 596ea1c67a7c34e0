//! # Core Module
//!
//! Stateless building blocks of the mapper: numeric backends, the reaction
//! model, compiled rate equations, descriptor projections, and file formats.
//!
//! ## Architecture
//!
//! - **Arithmetic** ([`numeric`]) - The [`numeric::Numeric`] trait with double and
//!   arbitrary-precision decimal backends, plus dense linear algebra over them
//! - **Mechanism** ([`models`]) - Sites, species, elementary steps, and the validated reaction model
//! - **Rate Laws** ([`kinetics`]) - Mass-action residuals, Jacobians, and rate reports
//! - **Projection** ([`scaling`]) - Descriptor-to-rate-constant projection and initial coverage estimates
//! - **File I/O** ([`io`]) - TOML model definitions and CSV map tables

pub mod io;
pub mod kinetics;
pub mod models;
pub mod numeric;
pub mod scaling;
