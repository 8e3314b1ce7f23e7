//! Graphviz rendering of prefix graph layouts
//!
//! Columns become ranks from left to right; rows are listed most significant
//! first inside each rank. Group edges are dashed.

use crate::Result;
use pptree_core::{Coord, Layout, NodeKind, Port};
use std::fmt::Write;

fn node_name(coord: Coord) -> String {
    format!("n{}_{}", coord.row, coord.col)
}

fn node_style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Input => r#"shape=circle style=solid"#,
        NodeKind::Black => r#"shape=box style=filled fillcolor="black" fontcolor="white""#,
        NodeKind::Gray => r#"shape=box style=filled fillcolor="gray70""#,
        NodeKind::Buffer => r#"shape=triangle orientation=270 style=solid"#,
    }
}

/// Render a layout as a DOT digraph
pub fn generate_dot(layout: &Layout) -> Result<String> {
    let mut dot = String::new();
    writeln!(dot, "digraph prefix_graph {{")?;
    writeln!(dot, "  rankdir=LR;")?;
    writeln!(dot, "  node [fontsize=10];")?;
    writeln!(
        dot,
        r#"  label="{} bits, {} levels";"#,
        layout.width, layout.depth
    )?;

    for col in 0..layout.depth {
        let mut column: Vec<_> = layout.nodes.iter().filter(|n| n.coord.col == col).collect();
        if column.is_empty() {
            continue;
        }
        column.sort_by_key(|n| std::cmp::Reverse(n.coord.row));
        writeln!(dot, "  subgraph level_{} {{", col)?;
        writeln!(dot, "    rank=same;")?;
        for node in column {
            writeln!(
                dot,
                r#"    {} [label="{},{}" {}];"#,
                node_name(node.coord),
                node.coord.row,
                node.coord.col,
                node_style(node.kind)
            )?;
        }
        writeln!(dot, "  }}")?;
    }

    for edge in &layout.edges {
        let style = match edge.port {
            Port::Through => "",
            Port::Group => " [style=dashed]",
        };
        writeln!(
            dot,
            "  {} -> {}{};",
            node_name(edge.from),
            node_name(edge.to),
            style
        )?;
    }
    writeln!(dot, "}}")?;
    Ok(dot)
}
