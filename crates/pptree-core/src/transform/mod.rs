//! Equivalence-preserving rewrites of prefix graphs
//!
//! - [`descriptor`]: the closed rule catalog and the descriptor language
//! - `rules`: pattern matching and graph edits for each rule
//! - `engine`: sequencing, validation and rollback

pub mod descriptor;
mod engine;
mod rules;

pub use descriptor::{format_sequence, Rule, TransformDescriptor};
pub use engine::{EngineConfig, PipelineOutcome, TransformEngine};
pub use rules::Applied;
