//! # mkmap Core Library
//!
//! Steady-state microkinetic modelling over descriptor grids.
//!
//! Given a reaction mechanism and a projection from descriptor space (for
//! example a pair of adsorption energies) to rate constants, the library solves
//! the steady-state coverage problem at every point of a grid, reusing
//! converged neighbours as warm starts and bisecting towards points that fail
//! to converge directly.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ReactionModel`), the
//!   precision-aware numeric layer, compiled rate equations, and I/O.
//!
//! - **[`engine`]: The Logic Core.** The Newton steady-state solver, the
//!   descriptor grid and solution cache, and the MinResid mapper that traverses
//!   the grid.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together into a
//!   single call that maps a grid and returns every solution and failure.

pub mod core;
pub mod engine;
pub mod workflows;
