//! # Workflows Module
//!
//! High-level entry points that run a complete descriptor-space map.
//!
//! ## Overview
//!
//! A workflow builds the descriptor grid, allocates the solution cache, drives
//! the MinResid mapper, and returns a [`map::MapResult`] holding every solution,
//! every recorded failure, and the run counters. Results can be resumed under a
//! new configuration or flattened into a CSV-ready table.
//!
//! ## Architecture
//!
//! - **Map Workflow** ([`map`]) - `run`, `resume`, and backend dispatch via `run_configured`

pub mod map;
