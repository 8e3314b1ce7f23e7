//! Property tests for rewrite rules
//!
//! - Every committed rewrite leaves a valid, equivalent graph
//! - Rejected rewrites leave the graph untouched and are never fatal
//! - Every successful rewrite can be undone by its inverse

use pptree_core::{
    check, Rule, Topology, TopologyBuilder, TransformDescriptor, TransformEngine, TransformError,
};
use proptest::prelude::*;

fn descriptor(rule: Rule, row: i64, col: i64, to: i64, with_col: bool) -> TransformDescriptor {
    let params = match rule {
        Rule::LevelFlatten | Rule::FanExpand if !with_col => vec![row],
        Rule::BufferInsert if !with_col => vec![row, col, to % 3],
        Rule::ColumnShift => vec![row, col, to],
        _ => vec![row, col],
    };
    TransformDescriptor::new(rule, params)
}

fn arb_descriptor() -> impl Strategy<Value = TransformDescriptor> {
    (
        prop::sample::select(Rule::ALL.to_vec()),
        0i64..16,
        0i64..9,
        0i64..10,
        any::<bool>(),
    )
        .prop_map(|(rule, row, col, to, with_col)| descriptor(rule, row, col, to, with_col))
}

fn arb_topology() -> impl Strategy<Value = Topology> {
    prop::sample::select(Topology::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_rewrites_preserve_equivalence(
        topology in arb_topology(),
        width in 2usize..=16,
        sequence in prop::collection::vec(arb_descriptor(), 1..24),
    ) {
        let mut graph = TopologyBuilder::new(width).unwrap().build(topology).unwrap();
        let engine = TransformEngine::new();

        for descriptor in &sequence {
            let before = graph.clone();
            match engine.apply(&mut graph, descriptor) {
                Ok(_) => prop_assert!(check(&graph).is_ok(), "{descriptor}:\n{graph}"),
                Err(error) => {
                    prop_assert!(
                        matches!(
                            error,
                            TransformError::InvalidLocus { .. }
                                | TransformError::RuleNotApplicable { .. }
                        ),
                        "{descriptor}: {error}\n{before}"
                    );
                    prop_assert_eq!(&graph, &before);
                }
            }
        }
    }

    #[test]
    fn prop_inverse_always_applies(
        topology in arb_topology(),
        width in 2usize..=16,
        prefix in prop::collection::vec(arb_descriptor(), 0..16),
        probes in prop::collection::vec(arb_descriptor(), 1..16),
    ) {
        let mut graph = TopologyBuilder::new(width).unwrap().build(topology).unwrap();
        let engine = TransformEngine::new();
        for descriptor in &prefix {
            let _ = engine.apply(&mut graph, descriptor);
        }

        for descriptor in &probes {
            let nodes = graph.node_count();
            if let Ok(applied) = engine.apply(&mut graph, descriptor) {
                let inverse = applied.inverse();
                let undone = engine.apply(&mut graph, &inverse);
                prop_assert!(undone.is_ok(), "{descriptor} then {inverse}: {undone:?}\n{graph}");
                prop_assert_eq!(graph.node_count(), nodes);
                prop_assert!(check(&graph).is_ok());
            }
        }
    }

    #[test]
    fn prop_out_of_range_rows_rejected(
        topology in arb_topology(),
        width in 1usize..=16,
        extra in 0i64..8,
        rule in prop::sample::select(Rule::ALL.to_vec()),
    ) {
        let mut graph = TopologyBuilder::new(width).unwrap().build(topology).unwrap();
        let before = graph.clone();
        let row = width as i64 + extra;
        let result = TransformEngine::new().apply(&mut graph, &descriptor(rule, row, 1, 2, true));
        let is_invalid_locus = matches!(result, Err(TransformError::InvalidLocus { .. }));
        prop_assert!(is_invalid_locus);
        prop_assert_eq!(graph, before);
    }
}
