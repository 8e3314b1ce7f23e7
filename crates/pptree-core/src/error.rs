//! Error types for prefix-graph construction, transformation and export

use crate::graph::Coord;
use crate::validate::Violation;
use thiserror::Error;

/// Result type for synthesis pipeline operations
pub type Result<T> = std::result::Result<T, SynthError>;

/// A controlled edit would have broken a structural invariant.
///
/// The graph the edit was attempted on is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("structural error: {message}")]
pub struct StructuralError {
    /// What went wrong
    pub message: String,
}

impl StructuralError {
    /// Create a new structural error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while constructing an initial topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Width is zero or above the supported maximum
    #[error("invalid width {width}: must be between 1 and {max}")]
    InvalidWidth { width: usize, max: usize },

    /// Topology name not in the catalog
    #[error("unknown topology '{0}'")]
    UnknownTopology(String),

    /// Topology construction produced an inconsistent graph
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Errors raised while parsing a transform descriptor string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Token names a rule that is not in the catalog
    #[error("unknown rule '{name}' in descriptor {position}")]
    UnknownRule { position: usize, name: String },

    /// Token is not of the form `RULE@p1,p2,...`
    #[error("malformed descriptor {position} '{token}': {reason}")]
    Malformed {
        position: usize,
        token: String,
        reason: String,
    },
}

impl ParseError {
    /// Position of the offending token in the descriptor sequence
    pub fn position(&self) -> usize {
        match self {
            ParseError::UnknownRule { position, .. } | ParseError::Malformed { position, .. } => {
                *position
            }
        }
    }
}

/// Errors raised while applying a single rewrite rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Parameters do not address existing nodes
    #[error("invalid locus for {rule}: {reason}")]
    InvalidLocus { rule: &'static str, reason: String },

    /// The rule's pattern does not match at the locus
    #[error("{rule} not applicable at {locus}: {reason}")]
    RuleNotApplicable {
        rule: &'static str,
        locus: Coord,
        reason: String,
    },

    /// An edit was rejected by the graph
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// The rewritten graph no longer computes the prefix function
    #[error("equivalence violation after rewrite ({} issue(s)): {}", .0.len(), summarize(.0))]
    Equivalence(Vec<Violation>),
}

impl TransformError {
    /// Equivalence violations indicate a broken rule and must halt synthesis
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransformError::Equivalence(_))
    }
}

/// Errors raised while lowering a graph to a netlist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// The graph failed validation and must not be emitted
    #[error("refusing to export an invalid graph: {}", summarize(.0))]
    Unvalidated(Vec<Violation>),

    /// Module name is not a legal HDL identifier
    #[error("invalid module name '{0}'")]
    InvalidModuleName(String),

    /// Cell library has no cell for a node kind
    #[error("cell library '{library}' has no cell for {kind} nodes")]
    MissingCell { library: String, kind: String },

    /// Unknown mapping policy name
    #[error("unknown mapping policy '{0}'")]
    UnknownPolicy(String),
}

/// Errors raised while loading a synthesis configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file
    #[error("I/O error: {0}")]
    Io(String),

    /// TOML parsing error
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A field holds an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for a complete synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A transform in the sequence failed; nothing after it was applied
    #[error("transform {position} ({descriptor}) failed: {source}")]
    Transform {
        position: usize,
        descriptor: String,
        #[source]
        source: TransformError,
    },

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .take(4)
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
