//! # Engine Module
//!
//! The computational side of mkmap: the Newton steady-state solver and the
//! MinResid mapper that drives it across a descriptor grid.
//!
//! ## Overview
//!
//! A mapping run visits every grid point in a chosen traversal order. Each point
//! is solved from the nearest converged neighbour when one is cached, otherwise
//! from an initial coverage estimate. Points that still fail are approached by
//! bisection from a converged anchor, and whatever cannot be reached is recorded
//! as a failure rather than aborting the run.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Solver tolerances, mapper strategy, and backend selection
//! - **Grid** ([`grid`]) - Regular and explicit descriptor grids with traversal orders
//! - **Solution Cache** ([`cache`]) - Converged, intermediate, and failed points keyed by rounded coordinates
//! - **Solver** ([`solver`]) - Multi-dimensional Newton iteration with capacity constraints
//! - **Mapper** ([`mapper`]) - Warm-started traversal, bisection, and the optional independent pre-pass
//! - **Sensitivity** ([`sensitivity`]) - Finite-difference reaction orders and degrees of rate control
//! - **State Tracking** ([`state`]) - Solutions, termination reasons, and failure records
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Errors that abort a run

pub mod cache;
pub mod config;
pub mod error;
pub mod grid;
pub mod mapper;
pub mod progress;
pub mod sensitivity;
pub mod solver;
pub mod state;
