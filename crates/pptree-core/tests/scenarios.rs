//! End-to-end synthesis scenarios

use pptree_core::export::Logic;
use pptree_core::{
    build_topology, check, synthesize, MappingPolicy, NodeKind, ParseError, SynthConfig,
    SynthError, Topology, TopologyBuilder,
};
use std::io::Write;

fn config(width: usize, start: &str, transforms: &str) -> SynthConfig {
    SynthConfig {
        width,
        start: start.to_string(),
        transforms: transforms.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_ripple_carry_four_bits() {
    let synthesis = synthesize(&config(4, "ripple-carry", "")).unwrap();
    let graph = &synthesis.graph;
    assert_eq!(graph.rows(), 4);
    assert_eq!(graph.depth(), 4);
    assert_eq!(graph.max_column(), 3);
    assert_eq!(synthesis.netlist.outputs.len(), 5);
}

#[test]
fn test_level_flatten_reduces_row_depth() {
    let baseline = build_topology(8, "ripple-carry").unwrap();
    let synthesis = synthesize(&config(8, "ripple-carry", "LF@6")).unwrap();
    assert!(check(&synthesis.graph).is_ok());
    assert!(synthesis.graph.row_depth(6).unwrap() < baseline.row_depth(6).unwrap());
    assert_eq!(synthesis.applied.len(), 1);
    assert_eq!(synthesis.applied[0].inverse().to_string(), "FL@6,5");
}

#[test]
fn test_unknown_rule_rejected_before_transforms() {
    let err = synthesize(&config(8, "ripple-carry", "LF@6_QQ@2_LF@4")).unwrap_err();
    match err {
        SynthError::Parse(ParseError::UnknownRule { position, name }) => {
            assert_eq!(position, 1);
            assert_eq!(name, "QQ");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_flatten_chain_on_ripple() {
    // Repeated flattening walks ripple carry toward a log-depth tree
    let synthesis = synthesize(&config(16, "ripple-carry", "LF@15_LF@15_LF@15_LF@14")).unwrap();
    let graph = &synthesis.graph;
    assert!(graph.row_depth(15).unwrap() < 15);
    assert!(graph.max_fanout() >= 2);
    assert!(check(graph).is_ok());
}

#[test]
fn test_every_topology_exports_structurally() {
    for topology in Topology::ALL {
        let graph = TopologyBuilder::new(12).unwrap().build(topology).unwrap();
        let netlist = pptree_core::export(
            &graph,
            MappingPolicy::Structural,
            "adder12",
            &pptree_core::GenericCells,
        )
        .unwrap();
        assert_eq!(netlist.nodes.len(), graph.node_count());
        for node in &netlist.nodes {
            assert!(matches!(node.logic, Logic::Cell(_)), "{topology}");
            assert_eq!(node.propagate.is_none(), node.kind == NodeKind::Gray);
        }
    }
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
width = 8
start = "brent-kung"
top-module = "bk8"
mapping = "structural"
"#
    )
    .unwrap();

    let config = SynthConfig::from_path(file.path()).unwrap();
    let synthesis = synthesize(&config).unwrap();
    assert_eq!(synthesis.netlist.module, "bk8");
    assert_eq!(synthesis.netlist.policy, MappingPolicy::Structural);
    assert_eq!(synthesis.graph.max_column(), 5);
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SynthConfig::from_path(dir.path().join("absent.toml")).is_err());
}
