//! # Core Models Module
//!
//! Data structures describing a microkinetic mechanism: binding sites, species,
//! elementary steps, and the validated [`model::ReactionModel`] that ties them
//! together.
//!
//! ## Key Components
//!
//! - [`site`] - Binding sites with a finite capacity and alias names
//! - [`species`] - Gas, adsorbate, and transition-state species
//! - [`step`] - Elementary steps as initial/transition/final multisets
//! - [`model`] - The immutable reaction model and its validating builder
//! - [`descriptor`] - Points in descriptor space
//! - [`ids`] - Index identifiers for sites, species, and steps
//!
//! ## Usage
//!
//! ```ignore
//! use mkmap::core::models::model::ReactionModel;
//!
//! let mut builder = ReactionModel::builder();
//! let s = builder.add_site("s", 1.0);
//! builder.add_adsorbate("A*", s);
//! builder.add_adsorbate("B*", s);
//! builder.add_step_from_tokens("isomerization", &["A*"], None, &["B*"])?;
//! let model = builder.build()?;
//! ```

pub mod descriptor;
pub mod ids;
pub mod model;
pub mod site;
pub mod species;
pub mod step;
