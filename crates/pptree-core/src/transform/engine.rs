//! Transform Engine
//!
//! Applies descriptors to a prefix graph one at a time. After each rewrite
//! the graph is re-validated; a rewrite that breaks equivalence is rolled
//! back and reported as a fatal error.
//!
//! # Example
//!
//! ```ignore
//! use pptree_core::{build_topology, TransformDescriptor, TransformEngine};
//!
//! let graph = build_topology(8, "ripple-carry")?;
//! let sequence = TransformDescriptor::parse_sequence("LF@6_LF@4")?;
//! let outcome = TransformEngine::new().run(graph, &sequence);
//! ```

use super::descriptor::TransformDescriptor;
use super::rules::{apply_rule, Applied};
use crate::error::TransformError;
use crate::graph::PrefixGraph;
use crate::validate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Run the full validator after every rewrite
    pub validate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Result of running a descriptor sequence
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Every descriptor applied
    Completed {
        graph: PrefixGraph,
        applied: Vec<Applied>,
    },
    /// A descriptor failed; nothing after it was attempted
    Failed {
        /// Graph as it stood before the failing descriptor
        graph: PrefixGraph,
        applied: Vec<Applied>,
        position: usize,
        descriptor: TransformDescriptor,
        error: TransformError,
    },
}

impl PipelineOutcome {
    /// The last valid graph
    pub fn graph(&self) -> &PrefixGraph {
        match self {
            PipelineOutcome::Completed { graph, .. } | PipelineOutcome::Failed { graph, .. } => {
                graph
            }
        }
    }

    /// Rewrites that were committed
    pub fn applied(&self) -> &[Applied] {
        match self {
            PipelineOutcome::Completed { applied, .. }
            | PipelineOutcome::Failed { applied, .. } => applied,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    /// Whether the run stopped on a broken rule rather than a rejected locus
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineOutcome::Completed { .. } => false,
            PipelineOutcome::Failed { error, .. } => error.is_fatal(),
        }
    }

    /// Split into the final graph or the failure details
    pub fn into_result(
        self,
    ) -> Result<(PrefixGraph, Vec<Applied>), (usize, TransformDescriptor, TransformError)> {
        match self {
            PipelineOutcome::Completed { graph, applied } => Ok((graph, applied)),
            PipelineOutcome::Failed {
                position,
                descriptor,
                error,
                ..
            } => Err((position, descriptor, error)),
        }
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self {
            PipelineOutcome::Completed { graph, applied } => format!(
                "Applied {} transform(s): {}",
                applied.len(),
                graph.stats().summary()
            ),
            PipelineOutcome::Failed {
                applied,
                position,
                descriptor,
                error,
                ..
            } => format!(
                "Stopped at transform {} ({}) after {} applied: {}",
                position,
                descriptor,
                applied.len(),
                error
            ),
        }
    }
}

/// Applies rewrite rules with optional per-step validation
#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    config: EngineConfig,
}

impl TransformEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with specific configuration
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply one descriptor in place
    ///
    /// On any error the graph is left exactly as it was before the call.
    pub fn apply(
        &self,
        graph: &mut PrefixGraph,
        descriptor: &TransformDescriptor,
    ) -> Result<Applied, TransformError> {
        let snapshot = graph.clone();
        let applied = apply_rule(graph, descriptor)?;

        if self.config.validate {
            if let Err(violations) = validate::check(graph) {
                warn!(
                    descriptor = %descriptor,
                    violations = violations.len(),
                    "rewrite broke equivalence, rolling back"
                );
                *graph = snapshot;
                return Err(TransformError::Equivalence(violations));
            }
        }

        debug!(
            descriptor = %descriptor,
            locus = %applied.locus,
            depth = graph.depth(),
            "applied transform"
        );
        Ok(applied)
    }

    /// Apply a sequence strictly in order, stopping at the first failure
    pub fn run(&self, mut graph: PrefixGraph, sequence: &[TransformDescriptor]) -> PipelineOutcome {
        let mut applied = Vec::with_capacity(sequence.len());
        for (position, descriptor) in sequence.iter().enumerate() {
            match self.apply(&mut graph, descriptor) {
                Ok(record) => applied.push(record),
                Err(error) => {
                    if error.is_fatal() {
                        error!(
                            position,
                            descriptor = %descriptor,
                            %error,
                            "rewrite broke equivalence"
                        );
                    } else {
                        warn!(position, descriptor = %descriptor, %error, "transform failed");
                    }
                    return PipelineOutcome::Failed {
                        graph,
                        applied,
                        position,
                        descriptor: descriptor.clone(),
                        error,
                    };
                }
            }
        }
        info!(
            transforms = applied.len(),
            stats = %graph.stats().summary(),
            "transform sequence completed"
        );
        PipelineOutcome::Completed { graph, applied }
    }
}
