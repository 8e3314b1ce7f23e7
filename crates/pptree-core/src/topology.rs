//! Canonical Prefix Topologies
//!
//! Each topology is described level by level as the set of rows that combine
//! at that level. A combining row always takes its group input from the row
//! just below its current span, so every span stays contiguous and the graph
//! is valid by construction.
//!
//! | Topology | Depth | Combines | Max fan-out |
//! |----------|-------|----------|-------------|
//! | Ripple carry | n - 1 | n - 1 | 2 |
//! | Sklansky | log n | (n/2) log n | n/2 + 1 |
//! | Kogge-Stone | log n | n log n - n + 1 | 3 |
//! | Brent-Kung | 2 log n - 1 | 2n - log n - 2 | log n |
//! | Han-Carlson | log n + 1 | (n/2) log n | 3 |
//!
//! # References
//!
//! - Sklansky, J. (1960). Conditional-sum addition logic.
//! - Kogge, P. M., & Stone, H. S. (1973). A parallel algorithm for the efficient solution of a general class of recurrence equations.
//! - Brent, R. P., & Kung, H. T. (1982). A regular layout for parallel adders.
//! - Han, T., & Carlson, D. A. (1987). Fast area-efficient VLSI adders.

use crate::error::{BuildError, StructuralError};
use crate::graph::{Coord, NodeKind, PrefixGraph};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Largest supported operand width
pub const MAX_WIDTH: usize = 1024;

/// Canonical prefix topology families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Serial carry chain - one combine per level
    RippleCarry,
    /// Divide and conquer - minimum depth, high fan-out
    Sklansky,
    /// Minimum depth with fan-out bounded by 2 per level
    KoggeStone,
    /// Up-sweep/down-sweep tree - minimum area among log-depth adders
    BrentKung,
    /// Kogge-Stone on odd bits plus one extra level for even bits
    HanCarlson,
}

impl Topology {
    /// Every supported topology
    pub const ALL: [Topology; 5] = [
        Topology::RippleCarry,
        Topology::Sklansky,
        Topology::KoggeStone,
        Topology::BrentKung,
        Topology::HanCarlson,
    ];

    /// Get the name of this topology
    pub fn name(&self) -> &'static str {
        match self {
            Self::RippleCarry => "ripple-carry",
            Self::Sklansky => "sklansky",
            Self::KoggeStone => "kogge-stone",
            Self::BrentKung => "brent-kung",
            Self::HanCarlson => "han-carlson",
        }
    }

    /// Rows combining at each level, before empty levels are dropped
    fn levels(&self, width: usize) -> Vec<Vec<usize>> {
        let log = ceil_log2(width);
        match self {
            Self::RippleCarry => (1..width).map(|row| vec![row]).collect(),
            Self::Sklansky => (0..log)
                .map(|level| (0..width).filter(|row| row & (1usize << level) != 0).collect())
                .collect(),
            Self::KoggeStone => (0..log).map(|level| (1usize << level..width).collect()).collect(),
            Self::BrentKung => {
                let mut levels: Vec<Vec<usize>> = (1..=log)
                    .map(|level| {
                        let stride = 1usize << level;
                        (0..width).filter(|row| (row + 1) % stride == 0).collect()
                    })
                    .collect();
                for level in (1..log).rev() {
                    let stride = 1usize << level;
                    levels.push(
                        (stride..width)
                            .filter(|row| (row + 1) % stride == stride / 2)
                            .collect(),
                    );
                }
                levels
            }
            Self::HanCarlson => {
                let odd: Vec<usize> = (1..width).step_by(2).collect();
                let mut levels = vec![odd; log.max(1)];
                levels.push((2..width).step_by(2).collect());
                levels
            }
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Topology {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Topology::ALL
            .into_iter()
            .find(|topology| topology.name() == normalized)
            .ok_or_else(|| BuildError::UnknownTopology(s.to_string()))
    }
}

/// Builds initial prefix graphs for a fixed width
#[derive(Debug, Clone, Copy)]
pub struct TopologyBuilder {
    width: usize,
}

impl TopologyBuilder {
    /// Create a builder, rejecting unusable widths
    pub fn new(width: usize) -> Result<Self, BuildError> {
        if width == 0 || width > MAX_WIDTH {
            return Err(BuildError::InvalidWidth {
                width,
                max: MAX_WIDTH,
            });
        }
        Ok(Self { width })
    }

    /// Operand width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Build a graph from a topology name
    pub fn build_named(&self, name: &str) -> Result<PrefixGraph, BuildError> {
        self.build(name.parse()?)
    }

    /// Build a graph for a topology
    ///
    /// Rows listed at a level read the values their group rows held at the
    /// previous level, so all nodes of a level are placed in one column.
    pub fn build(&self, topology: Topology) -> Result<PrefixGraph, BuildError> {
        let width = self.width;
        let mut graph = PrefixGraph::with_inputs(width)?;

        graph.transaction(|tx| {
            let mut head = (0..width)
                .map(|row| tx.graph().input_id(row))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| StructuralError::new("missing input terminal"))?;
            let mut lo: Vec<usize> = (0..width).collect();
            let mut col = 0;

            for rows in topology.levels(width) {
                let rows: Vec<usize> = rows
                    .into_iter()
                    .filter(|&row| row < width && lo[row] > 0)
                    .collect();
                if rows.is_empty() {
                    continue;
                }
                col += 1;
                let (prev_head, prev_lo) = (head.clone(), lo.clone());
                for row in rows {
                    let source = prev_lo[row] - 1;
                    let reach = prev_lo[source];
                    let kind = if reach == 0 {
                        NodeKind::Gray
                    } else {
                        NodeKind::Black
                    };
                    head[row] = tx.insert_node(
                        Coord::new(row, col),
                        kind,
                        Some(prev_head[row]),
                        Some(prev_head[source]),
                    )?;
                    lo[row] = reach;
                }
            }
            Ok(())
        })?;

        debug!(
            topology = topology.name(),
            width,
            depth = graph.depth(),
            nodes = graph.node_count(),
            "built prefix graph"
        );
        Ok(graph)
    }
}

/// Build a graph from a width and topology name
pub fn build_topology(width: usize, name: &str) -> Result<PrefixGraph, BuildError> {
    TopologyBuilder::new(width)?.build_named(name)
}

fn ceil_log2(n: usize) -> usize {
    n.next_power_of_two().trailing_zeros() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;

    #[test]
    fn test_parse_names() {
        assert_eq!("ripple-carry".parse::<Topology>().unwrap(), Topology::RippleCarry);
        assert_eq!("Kogge_Stone".parse::<Topology>().unwrap(), Topology::KoggeStone);
        assert!(matches!(
            "carry-skip".parse::<Topology>(),
            Err(BuildError::UnknownTopology(name)) if name == "carry-skip"
        ));
    }

    #[test]
    fn test_invalid_width() {
        assert!(matches!(
            TopologyBuilder::new(0),
            Err(BuildError::InvalidWidth { width: 0, .. })
        ));
        assert!(TopologyBuilder::new(MAX_WIDTH + 1).is_err());
    }

    #[test]
    fn test_ripple_carry_shape() {
        let graph = build_topology(4, "ripple-carry").unwrap();
        assert_eq!(graph.rows(), 4);
        assert_eq!(graph.depth(), 4);
        assert_eq!(graph.max_column(), 3);
        for row in 1..4 {
            assert_eq!(graph.row_depth(row), Some(row));
            assert_eq!(graph.node_at(row, row).unwrap().kind, NodeKind::Gray);
        }
        assert_eq!(graph.combine_count(), 3);
    }

    #[test]
    fn test_kogge_stone_shape() {
        let graph = build_topology(8, "kogge-stone").unwrap();
        assert_eq!(graph.max_column(), 3);
        // 7 + 6 + 4 combines
        assert_eq!(graph.combine_count(), 17);
        assert!(graph.max_fanout() <= 3);
    }

    #[test]
    fn test_sklansky_shape() {
        let graph = build_topology(8, "sklansky").unwrap();
        assert_eq!(graph.max_column(), 3);
        assert_eq!(graph.combine_count(), 12);
        // Row 3 feeds rows 4..=7 at the last level
        let row3 = graph.output_id(3).unwrap();
        assert_eq!(graph.fanout(row3), 4);
    }

    #[test]
    fn test_brent_kung_shape() {
        let graph = build_topology(8, "brent-kung").unwrap();
        assert_eq!(graph.max_column(), 5);
        assert_eq!(graph.combine_count(), 11);
    }

    #[test]
    fn test_han_carlson_shape() {
        let graph = build_topology(8, "han-carlson").unwrap();
        assert_eq!(graph.max_column(), 4);
        assert_eq!(graph.combine_count(), 12);
    }

    #[test]
    fn test_gray_marks_prefix_nodes() {
        for topology in Topology::ALL {
            let graph = TopologyBuilder::new(16).unwrap().build(topology).unwrap();
            let symbols = validate::simulate(&graph);
            for (id, node) in graph.nodes() {
                if node.kind.is_combine() {
                    let reaches_zero = symbols[&id].word.span().map(|(lo, _)| lo) == Some(0);
                    assert_eq!(reaches_zero, node.kind == NodeKind::Gray, "{topology} {:?}", node);
                }
            }
        }
    }

    #[test]
    fn test_all_topologies_validate() {
        for topology in Topology::ALL {
            for width in 1..=40 {
                let graph = TopologyBuilder::new(width).unwrap().build(topology).unwrap();
                assert!(
                    validate::check(&graph).is_ok(),
                    "{topology} width {width}:\n{graph}"
                );
            }
        }
    }
}
