//! Parallel-prefix adder synthesis
//!
//! This crate models the carry computation of a binary adder as a prefix
//! graph and rewrites it with equivalence-preserving rules:
//!
//! - [`graph`]: the prefix graph and its transactional edits
//! - [`topology`]: canonical starting topologies (ripple carry, Sklansky, ...)
//! - [`transform`]: the rewrite rule catalog and the engine that applies it
//! - [`validate`]: structural checks and symbolic equivalence
//! - [`export`]: lowering to a netlist of equations or library cells
//!
//! # Example
//!
//! ```ignore
//! use pptree_core::{synthesize, SynthConfig};
//!
//! let config = SynthConfig {
//!     width: 8,
//!     transforms: "LF@6_LF@4".to_string(),
//!     ..Default::default()
//! };
//! let synthesis = synthesize(&config)?;
//! println!("{}", synthesis.graph);
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod topology;
pub mod transform;
pub mod validate;

pub use config::SynthConfig;
pub use error::{
    BuildError, ConfigError, ExportError, ParseError, Result, StructuralError, SynthError,
    TransformError,
};
pub use export::{export, CellLibrary, GenericCells, MappingPolicy, Netlist};
pub use graph::{Coord, GraphStats, Layout, NodeId, NodeKind, Port, PrefixGraph, PrefixNode};
pub use topology::{build_topology, Topology, TopologyBuilder, MAX_WIDTH};
pub use transform::{
    Applied, EngineConfig, PipelineOutcome, Rule, TransformDescriptor, TransformEngine,
};
pub use validate::{check, Violation};

use tracing::info;

/// Everything produced by one synthesis run
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Final prefix graph
    pub graph: PrefixGraph,
    /// Rewrites applied, in order
    pub applied: Vec<Applied>,
    /// Exported netlist
    pub netlist: Netlist,
}

/// Build, transform and export an adder using the generic cell library
pub fn synthesize(config: &SynthConfig) -> Result<Synthesis> {
    synthesize_with(config, &GenericCells)
}

/// Build, transform and export an adder with a specific cell library
///
/// The descriptor string is parsed completely before the graph is built, so
/// an unknown rule anywhere in the sequence fails without running anything.
pub fn synthesize_with(config: &SynthConfig, library: &dyn CellLibrary) -> Result<Synthesis> {
    let sequence = TransformDescriptor::parse_sequence(&config.transforms)?;
    let graph = build_topology(config.width, &config.start)?;

    let engine = TransformEngine::with_config(config.engine.clone());
    let (graph, applied) = engine
        .run(graph, &sequence)
        .into_result()
        .map_err(|(position, descriptor, source)| SynthError::Transform {
            position,
            descriptor: descriptor.to_string(),
            source,
        })?;

    let netlist = export(&graph, config.mapping, &config.top_module, library)?;
    info!(
        width = config.width,
        start = %config.start,
        transforms = applied.len(),
        "{}",
        graph.stats().summary()
    );
    Ok(Synthesis {
        graph,
        applied,
        netlist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: usize, start: &str, transforms: &str) -> SynthConfig {
        SynthConfig {
            width,
            start: start.to_string(),
            transforms: transforms.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_synthesize_ripple() {
        let synthesis = synthesize(&config(4, "ripple-carry", "")).unwrap();
        assert_eq!(synthesis.graph.rows(), 4);
        assert_eq!(synthesis.graph.depth(), 4);
        assert!(synthesis.applied.is_empty());
        assert_eq!(synthesis.netlist.module, "adder");
    }

    #[test]
    fn test_unknown_rule_fails_first() {
        // The width is invalid too, but parsing comes first
        let err = synthesize(&config(0, "ripple-carry", "LF@6_ZZ@1")).unwrap_err();
        assert!(matches!(
            err,
            SynthError::Parse(ParseError::UnknownRule { position: 1, .. })
        ));
    }

    #[test]
    fn test_transform_failure_reports_position() {
        let err = synthesize(&config(8, "ripple-carry", "LF@6_LF@9")).unwrap_err();
        match err {
            SynthError::Transform {
                position,
                descriptor,
                source,
            } => {
                assert_eq!(position, 1);
                assert_eq!(descriptor, "LF@9");
                assert!(matches!(source, TransformError::InvalidLocus { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(
            synthesize(&config(8, "carry-skip", "")),
            Err(SynthError::Build(BuildError::UnknownTopology(_)))
        ));
    }
}
