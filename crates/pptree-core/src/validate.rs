//! Structural and Functional Validation
//!
//! The validator runs three checks over a prefix graph:
//!
//! 1. **Structure**: index consistency, input terminals, row chains, and
//!    strictly increasing columns along every edge (acyclicity).
//! 2. **Completeness**: each row's output covers bits `[0..=row]`.
//! 3. **Equivalence**: a symbolic simulation where every input is an opaque
//!    generate/propagate pair. A signal is the ordered word of bit segments
//!    it combines; the operator is associative but not commutative, so a row
//!    output is correct only if its word is exactly `[0..=row]`.
//!
//! The simulation also tracks whether a propagate signal exists, so a gray
//! node feeding a consumer that needs propagate is reported.

use crate::graph::{Coord, NodeId, NodeKind, Port, PrefixGraph};
use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// A broken invariant found by [`check`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Arena and coordinate index disagree
    #[error("index entry {coord} does not match node {node:?}")]
    IndexMismatch { coord: Coord, node: NodeId },

    /// Node placed outside the operand width
    #[error("node {node:?} sits in row {row} outside the width")]
    RowOutOfRange { node: NodeId, row: usize },

    /// Row has no input terminal at column 0
    #[error("row {row} has no input terminal")]
    MissingInput { row: usize },

    /// Input terminal away from column 0, or operator at column 0
    #[error("{kind} node misplaced at {coord}")]
    Misplaced { coord: Coord, kind: NodeKind },

    /// Input arity does not match the node kind
    #[error("{kind} node at {coord} has the wrong inputs")]
    WrongArity { coord: Coord, kind: NodeKind },

    /// Input references a node that does not exist
    #[error("{port} input of {coord} references a missing node")]
    DanglingInput { coord: Coord, port: Port },

    /// Edge does not go to a strictly higher column
    #[error("edge {from} -> {to} does not increase the column")]
    BackwardEdge { from: Coord, to: Coord },

    /// Through input is not the previous node of the same row
    #[error("row chain broken at {coord}")]
    BrokenChain { coord: Coord },

    /// Group input does not come from a lower row
    #[error("group input of {coord} comes from row {group_row}")]
    BadGroupRow { coord: Coord, group_row: usize },

    /// Consumer needs a propagate signal its source does not produce
    #[error("{coord} needs propagate from {source_coord}, which has none")]
    MissingPropagate { coord: Coord, source_coord: Coord },

    /// Row output covers a contiguous range that stops short of bit 0
    #[error("row {row} output only covers bits {lo}..={row}")]
    IncompleteRow { row: usize, lo: usize },

    /// Row output is not the in-order combine of its inputs
    #[error("row {row} computes {found} instead of [0..{row}]")]
    Equivalence { row: usize, found: Word },
}

/// Contiguous run of input bits `lo..=hi`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub lo: usize,
    pub hi: usize,
}

/// Ordered sequence of segments combined into a signal, least significant first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word(pub Vec<Segment>);

impl Word {
    fn single(lo: usize, hi: usize) -> Self {
        Word(vec![Segment { lo, hi }])
    }

    /// Concatenate `low` then `high`, merging adjacent runs
    fn concat(low: &Word, high: &Word) -> Word {
        let mut segments: Vec<Segment> = Vec::with_capacity(low.0.len() + high.0.len());
        for seg in low.0.iter().chain(high.0.iter()) {
            match segments.last_mut() {
                Some(last) if last.hi + 1 == seg.lo => last.hi = seg.hi,
                _ => segments.push(*seg),
            }
        }
        Word(segments)
    }

    /// The `(lo, hi)` range if this word is one contiguous run
    pub fn span(&self) -> Option<(usize, usize)> {
        match self.0.as_slice() {
            [seg] => Some((seg.lo, seg.hi)),
            _ => None,
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("·")?;
            }
            write!(f, "[{}..{}]", seg.lo, seg.hi)?;
        }
        Ok(())
    }
}

/// Symbolic value of a node output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Bits combined into the generate signal
    pub word: Word,
    /// Whether a propagate signal is produced
    pub propagate: bool,
}

/// Check every invariant, returning all violations found
pub fn check(graph: &PrefixGraph) -> Result<(), Vec<Violation>> {
    let mut violations = structural_violations(graph);
    if violations.is_empty() {
        let (symbols, mut functional) = simulate_checked(graph);
        violations.append(&mut functional);
        for row in 0..graph.rows() {
            let Some(symbol) = graph.output_id(row).and_then(|id| symbols.get(&id)) else {
                continue;
            };
            match symbol.word.span() {
                Some((0, hi)) if hi == row => {}
                Some((lo, hi)) if hi == row => violations.push(Violation::IncompleteRow { row, lo }),
                _ => violations.push(Violation::Equivalence {
                    row,
                    found: symbol.word.clone(),
                }),
            }
        }
    }
    trace!(violations = violations.len(), "validated prefix graph");
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Symbolic value of every node, in topological order
///
/// Only meaningful for structurally sound graphs; nodes whose inputs cannot
/// be resolved are skipped.
pub fn simulate(graph: &PrefixGraph) -> IndexMap<NodeId, Symbol> {
    simulate_checked(graph).0
}

fn simulate_checked(graph: &PrefixGraph) -> (IndexMap<NodeId, Symbol>, Vec<Violation>) {
    let mut symbols: IndexMap<NodeId, Symbol> = IndexMap::new();
    let mut violations = Vec::new();

    for id in graph.topological_order() {
        let Some(node) = graph.node(id) else { continue };
        let symbol = match node.kind {
            NodeKind::Input => Symbol {
                word: Word::single(node.row(), node.row()),
                propagate: true,
            },
            NodeKind::Buffer => match node.through.and_then(|t| symbols.get(&t)) {
                Some(source) => source.clone(),
                None => continue,
            },
            NodeKind::Black | NodeKind::Gray => {
                let (Some(t), Some(g)) = (node.through, node.group) else {
                    continue;
                };
                let (Some(high), Some(low)) = (symbols.get(&t), symbols.get(&g)) else {
                    continue;
                };
                // gh | ph & gl always needs the high propagate
                let mut needs = vec![(t, high.propagate)];
                if node.kind == NodeKind::Black {
                    needs.push((g, low.propagate));
                }
                for (source, has) in needs {
                    if !has {
                        if let Some(src) = graph.node(source) {
                            violations.push(Violation::MissingPropagate {
                                coord: node.coord,
                                source_coord: src.coord,
                            });
                        }
                    }
                }
                Symbol {
                    word: Word::concat(&low.word, &high.word),
                    propagate: node.kind == NodeKind::Black,
                }
            }
        };
        symbols.insert(id, symbol);
    }
    (symbols, violations)
}

/// Structural invariants only: index, terminals, arity, chains, acyclicity
pub(crate) fn structural_violations(graph: &PrefixGraph) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (coord, id) in graph.index_entries() {
        if graph.node(id).map(|node| node.coord) != Some(coord) {
            violations.push(Violation::IndexMismatch { coord, node: id });
        }
    }

    for row in 0..graph.rows() {
        if graph.node_at(row, 0).map(|node| node.kind) != Some(NodeKind::Input) {
            violations.push(Violation::MissingInput { row });
        }
    }

    for (id, node) in graph.nodes() {
        let coord = node.coord;
        if coord.row >= graph.rows() {
            violations.push(Violation::RowOutOfRange { node: id, row: coord.row });
            continue;
        }
        if (node.kind == NodeKind::Input) != (coord.col == 0) {
            violations.push(Violation::Misplaced {
                coord,
                kind: node.kind,
            });
        }

        let arity_ok = match node.kind {
            NodeKind::Input => node.through.is_none() && node.group.is_none(),
            NodeKind::Buffer => node.through.is_some() && node.group.is_none(),
            NodeKind::Black | NodeKind::Gray => node.through.is_some() && node.group.is_some(),
        };
        if !arity_ok {
            violations.push(Violation::WrongArity {
                coord,
                kind: node.kind,
            });
        }

        for (port, source) in node.inputs() {
            let Some(src) = graph.node(source) else {
                violations.push(Violation::DanglingInput { coord, port });
                continue;
            };
            if src.col() >= coord.col {
                violations.push(Violation::BackwardEdge {
                    from: src.coord,
                    to: coord,
                });
            }
            match port {
                Port::Through => {
                    let previous = graph
                        .row_nodes(coord.row)
                        .into_iter()
                        .take_while(|other| *other != id)
                        .last();
                    if src.row() != coord.row || previous != Some(source) {
                        violations.push(Violation::BrokenChain { coord });
                    }
                }
                Port::Group => {
                    if src.row() >= coord.row {
                        violations.push(Violation::BadGroupRow {
                            coord,
                            group_row: src.row(),
                        });
                    }
                }
            }
        }
    }

    violations
}
