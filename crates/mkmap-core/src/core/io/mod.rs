//! File formats read and written by the mapper.
//!
//! - [`model_file`] - TOML reaction-model definitions with linear energy scaling
//! - [`map_table`] - Tabular map output and its CSV writer

pub mod map_table;
pub mod model_file;
