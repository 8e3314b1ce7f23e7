//! Rewrite Rule Implementations
//!
//! Every rule reads the graph, builds a plan, and commits the plan as one
//! transaction. Plans only rely on associativity of the prefix operator and
//! on the row-chain structure, never on which topology produced the graph.
//!
//! # Notation
//!
//! `N = X∘G` means node `N` has through input `X` (same row, high bits) and
//! group input `G` (lower row, low bits).
//!
//! ```text
//! level-flatten:  N = X∘(A∘B)   ==>  M = X∘A,  N = M∘B
//! fan-expand:     N = (X∘A)∘B   ==>  N = X∘G   where G = A∘B already exists
//! ```
//!
//! Each rule leaves the graph in a state where its inverse applies at the
//! locus recorded in [`Applied`].

use super::descriptor::{Rule, TransformDescriptor};
use crate::error::TransformError;
use crate::graph::{Coord, NodeId, NodeKind, Port, PrefixGraph};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Record of a successful rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    /// The descriptor that was applied
    pub descriptor: TransformDescriptor,
    /// Coordinate of the matched node before the rewrite
    pub origin: Coord,
    /// Coordinate of the node the inverse rule should target
    pub locus: Coord,
    /// Group consumers moved onto or off a buffer
    #[serde(default)]
    pub moved: usize,
}

impl Applied {
    /// Descriptor that undoes this rewrite up to functional equivalence
    pub fn inverse(&self) -> TransformDescriptor {
        let row = self.locus.row as i64;
        let col = self.locus.col as i64;
        match self.descriptor.rule {
            Rule::ColumnShift => {
                TransformDescriptor::new(Rule::ColumnShift, vec![row, col, self.origin.col as i64])
            }
            Rule::BufferRemove => {
                TransformDescriptor::new(Rule::BufferInsert, vec![row, col, self.moved as i64])
            }
            rule => TransformDescriptor::new(rule.inverse(), vec![row, col]),
        }
    }
}

/// Apply one descriptor in place; the graph is unchanged on error
pub(crate) fn apply_rule(
    graph: &mut PrefixGraph,
    descriptor: &TransformDescriptor,
) -> Result<Applied, TransformError> {
    let rule = descriptor.rule;
    let params = &descriptor.params;
    if !rule.arity().contains(&params.len()) {
        return Err(invalid(
            rule,
            format!(
                "expected {} to {} parameters, got {}",
                rule.arity().start(),
                rule.arity().end(),
                params.len()
            ),
        ));
    }

    let row = row_param(graph, rule, params[0])?;
    let mut moved = 0;
    let (origin, locus) = match rule {
        Rule::LevelFlatten => {
            let col = params.get(1).map(|&c| index(rule, c, "column")).transpose()?;
            level_flatten(graph, row, col)?
        }
        Rule::FanExpand => {
            let col = params.get(1).map(|&c| index(rule, c, "column")).transpose()?;
            fan_expand(graph, row, col)?
        }
        Rule::BufferInsert => {
            let col = index(rule, params[1], "column")?;
            let count = params.get(2).map(|&n| index(rule, n, "count")).transpose()?;
            let (origin, locus, count) = buffer_insert(graph, row, col, count)?;
            moved = count;
            (origin, locus)
        }
        Rule::BufferRemove => {
            let (origin, locus, count) =
                buffer_remove(graph, row, index(rule, params[1], "column")?)?;
            moved = count;
            (origin, locus)
        }
        Rule::ColumnShift => column_shift(
            graph,
            row,
            index(rule, params[1], "column")?,
            index(rule, params[2], "target column")?,
        )?,
    };

    trace!(rule = rule.name(), %origin, %locus, moved, "rewrite committed");
    Ok(Applied {
        descriptor: descriptor.clone(),
        origin,
        locus,
        moved,
    })
}

// ============================================================================
// Parameter Handling
// ============================================================================

fn invalid(rule: Rule, reason: String) -> TransformError {
    TransformError::InvalidLocus {
        rule: rule.mnemonic(),
        reason,
    }
}

fn not_applicable(rule: Rule, locus: Coord, reason: String) -> TransformError {
    TransformError::RuleNotApplicable {
        rule: rule.mnemonic(),
        locus,
        reason,
    }
}

fn index(rule: Rule, value: i64, what: &str) -> Result<usize, TransformError> {
    usize::try_from(value).map_err(|_| invalid(rule, format!("{} {} is negative", what, value)))
}

fn row_param(graph: &PrefixGraph, rule: Rule, value: i64) -> Result<usize, TransformError> {
    let row = index(rule, value, "row")?;
    if row >= graph.rows() {
        return Err(invalid(
            rule,
            format!("row {} outside width {}", row, graph.rows()),
        ));
    }
    Ok(row)
}

fn node_param(
    graph: &PrefixGraph,
    rule: Rule,
    row: usize,
    col: usize,
) -> Result<NodeId, TransformError> {
    graph
        .id_at(row, col)
        .ok_or_else(|| invalid(rule, format!("no node at {}", Coord::new(row, col))))
}

fn coord_of(graph: &PrefixGraph, id: NodeId) -> Result<Coord, String> {
    graph
        .node(id)
        .map(|node| node.coord)
        .ok_or_else(|| format!("node {:?} does not exist", id))
}

/// Try a planner on the node at `(row, col)`, or on every operator of the
/// row from its output downward when no column is given
fn find_plan<P>(
    graph: &PrefixGraph,
    rule: Rule,
    row: usize,
    col: Option<usize>,
    planner: fn(&PrefixGraph, NodeId) -> Result<P, String>,
) -> Result<P, TransformError> {
    let candidates: Vec<NodeId> = match col {
        Some(col) => vec![node_param(graph, rule, row, col)?],
        None => graph
            .row_nodes(row)
            .into_iter()
            .rev()
            .filter(|&id| graph.node(id).is_some_and(|node| node.kind != NodeKind::Input))
            .collect(),
    };

    let mut first_failure: Option<(Coord, String)> = None;
    for id in candidates {
        match planner(graph, id) {
            Ok(plan) => return Ok(plan),
            Err(reason) => {
                if first_failure.is_none() {
                    let coord = graph.node(id).map_or(Coord::new(row, 0), |n| n.coord);
                    first_failure = Some((coord, reason));
                }
            }
        }
    }
    let (locus, reason) = first_failure
        .unwrap_or_else(|| (Coord::new(row, 0), format!("row {} has no operator nodes", row)));
    Err(not_applicable(rule, locus, reason))
}

// ============================================================================
// Level Flatten / Fan Expand
// ============================================================================

struct FlattenPlan {
    node: NodeId,
    through: NodeId,
    inner_through: NodeId,
    inner_group: NodeId,
    mid_col: usize,
    new_col: usize,
}

fn plan_flatten(graph: &PrefixGraph, id: NodeId) -> Result<FlattenPlan, String> {
    let node = graph.node(id).ok_or("node does not exist")?;
    if !node.kind.is_combine() {
        return Err(format!("{} node is not a combine", node.kind));
    }
    let (Some(through), Some(group)) = (node.through, node.group) else {
        return Err("combine node is missing an input".into());
    };
    let inner = graph.node(group).ok_or("group input does not exist")?;
    if !inner.kind.is_combine() {
        return Err(format!(
            "group input at {} is a {} node, not a combine",
            inner.coord, inner.kind
        ));
    }
    let (Some(inner_through), Some(inner_group)) = (inner.through, inner.group) else {
        return Err("group input is missing an input".into());
    };

    let mid_col = coord_of(graph, through)?
        .col
        .max(coord_of(graph, inner_through)?.col)
        + 1;
    let new_col = mid_col.max(coord_of(graph, inner_group)?.col) + 1;
    if new_col >= node.col() {
        return Err(format!(
            "regrouping needs column {} and would not reduce depth below {}",
            new_col,
            node.col()
        ));
    }

    Ok(FlattenPlan {
        node: id,
        through,
        inner_through,
        inner_group,
        mid_col,
        new_col,
    })
}

fn level_flatten(
    graph: &mut PrefixGraph,
    row: usize,
    col: Option<usize>,
) -> Result<(Coord, Coord), TransformError> {
    let plan = find_plan(graph, Rule::LevelFlatten, row, col, plan_flatten)?;
    let origin = coord_of(graph, plan.node).map_err(|e| invalid(Rule::LevelFlatten, e))?;

    // A lies above B, so X∘A never reaches bit 0 and always needs propagate
    graph.transaction(|tx| {
        tx.shift_column(plan.node, plan.new_col)?;
        let mid = tx.insert_node(
            Coord::new(row, plan.mid_col),
            NodeKind::Black,
            Some(plan.through),
            Some(plan.inner_through),
        )?;
        tx.rewire(plan.node, Port::Through, mid)?;
        tx.rewire(plan.node, Port::Group, plan.inner_group)
    })?;

    Ok((origin, Coord::new(row, plan.new_col)))
}

struct ExpandPlan {
    node: NodeId,
    mid: NodeId,
    through: NodeId,
    group: NodeId,
    new_col: usize,
}

fn plan_expand(graph: &PrefixGraph, id: NodeId) -> Result<ExpandPlan, String> {
    let node = graph.node(id).ok_or("node does not exist")?;
    if !node.kind.is_combine() {
        return Err(format!("{} node is not a combine", node.kind));
    }
    let (Some(mid), Some(outer_group)) = (node.through, node.group) else {
        return Err("combine node is missing an input".into());
    };
    let mid_node = graph.node(mid).ok_or("through input does not exist")?;
    if mid_node.kind != NodeKind::Black {
        return Err(format!(
            "through input at {} is a {} node, not black",
            mid_node.coord, mid_node.kind
        ));
    }
    let (Some(through), Some(inner)) = (mid_node.through, mid_node.group) else {
        return Err("through input is missing an input".into());
    };

    // The node combining A with B must directly follow A in A's row
    let inner_coord = coord_of(graph, inner)?;
    let group = graph
        .successor(inner)
        .filter(|&g| {
            graph
                .node(g)
                .is_some_and(|n| n.kind.is_combine() && n.group == Some(outer_group))
        })
        .ok_or_else(|| {
            format!(
                "no node in row {} combines {} with {}",
                inner_coord.row,
                inner_coord,
                coord_of(graph, outer_group).map_or_else(|e| e, |c| c.to_string())
            )
        })?;

    if graph.fanout(mid) != 1 {
        return Err(format!(
            "intermediate node at {} has {} consumers",
            mid_node.coord,
            graph.fanout(mid)
        ));
    }

    // Stay beyond the column level-flatten would move the node back to
    let through_col = coord_of(graph, through)?.col;
    let regroup_col = (through_col.max(inner_coord.col) + 1)
        .max(coord_of(graph, outer_group)?.col)
        + 1;
    let new_col = (through_col.max(coord_of(graph, group)?.col) + 1).max(regroup_col + 1);
    let limit = graph
        .consumers(id)
        .into_iter()
        .filter_map(|(c, _)| graph.node(c).map(|n| n.col()))
        .min();
    if let Some(limit) = limit {
        if new_col >= limit {
            return Err(format!(
                "expanded node needs column {} but is read at column {}",
                new_col, limit
            ));
        }
    }

    Ok(ExpandPlan {
        node: id,
        mid,
        through,
        group,
        new_col,
    })
}

fn fan_expand(
    graph: &mut PrefixGraph,
    row: usize,
    col: Option<usize>,
) -> Result<(Coord, Coord), TransformError> {
    let plan = find_plan(graph, Rule::FanExpand, row, col, plan_expand)?;
    let origin = coord_of(graph, plan.node).map_err(|e| invalid(Rule::FanExpand, e))?;

    graph.transaction(|tx| {
        tx.rewire(plan.node, Port::Through, plan.through)?;
        tx.rewire(plan.node, Port::Group, plan.group)?;
        tx.delete_node(plan.mid)?;
        tx.shift_column(plan.node, plan.new_col)
    })?;

    Ok((origin, Coord::new(row, plan.new_col)))
}

// ============================================================================
// Buffers
// ============================================================================

fn buffer_insert(
    graph: &mut PrefixGraph,
    row: usize,
    col: usize,
    count: Option<usize>,
) -> Result<(Coord, Coord, usize), TransformError> {
    let rule = Rule::BufferInsert;
    let source = node_param(graph, rule, row, col)?;
    let origin = Coord::new(row, col);
    let buffer_coord = Coord::new(row, col + 1);

    let successor = graph.successor(source);
    if let Some(next) = successor.and_then(|id| graph.node(id)) {
        if next.col() <= buffer_coord.col {
            return Err(not_applicable(
                rule,
                origin,
                format!("no free column before the next node at {}", next.coord),
            ));
        }
    }

    let fanout = graph.fanout(source);
    if count.is_none() && fanout < 2 {
        return Err(not_applicable(
            rule,
            origin,
            format!("fan-out {} leaves nothing to split", fanout),
        ));
    }

    // Group consumers the buffer can legally drive, highest rows moving first
    let mut eligible: Vec<(Coord, NodeId)> = graph
        .consumers(source)
        .into_iter()
        .filter(|&(_, port)| port == Port::Group)
        .filter_map(|(id, _)| graph.node(id).map(|n| (n.coord, id)))
        .filter(|(coord, _)| coord.col > buffer_coord.col)
        .collect();
    eligible.sort();
    let count = count.unwrap_or(eligible.len() / 2);
    if count > eligible.len() {
        return Err(not_applicable(
            rule,
            origin,
            format!(
                "only {} group consumers lie beyond column {}, cannot move {}",
                eligible.len(),
                buffer_coord.col,
                count
            ),
        ));
    }
    let moved: Vec<NodeId> = eligible[eligible.len() - count..]
        .iter()
        .map(|&(_, id)| id)
        .collect();
    if successor.is_none() && moved.is_empty() {
        return Err(not_applicable(
            rule,
            origin,
            "no consumer can be moved onto a buffer".into(),
        ));
    }

    graph.transaction(|tx| {
        let buffer = tx.insert_node(buffer_coord, NodeKind::Buffer, Some(source), None)?;
        if let Some(next) = successor {
            tx.rewire(next, Port::Through, buffer)?;
        }
        for consumer in &moved {
            tx.rewire(*consumer, Port::Group, buffer)?;
        }
        Ok(())
    })?;

    Ok((origin, buffer_coord, moved.len()))
}

fn buffer_remove(
    graph: &mut PrefixGraph,
    row: usize,
    col: usize,
) -> Result<(Coord, Coord, usize), TransformError> {
    let rule = Rule::BufferRemove;
    let id = node_param(graph, rule, row, col)?;
    let origin = Coord::new(row, col);
    let node = graph
        .node(id)
        .ok_or_else(|| invalid(rule, format!("no node at {}", origin)))?;
    if node.kind != NodeKind::Buffer {
        return Err(not_applicable(
            rule,
            origin,
            format!("{} node is not a buffer", node.kind),
        ));
    }
    let source = node
        .through
        .ok_or_else(|| not_applicable(rule, origin, "buffer has no input".into()))?;
    let locus = graph
        .node(source)
        .map(|n| n.coord)
        .ok_or_else(|| not_applicable(rule, origin, "buffer input does not exist".into()))?;
    let consumers = graph.consumers(id);
    let moved = consumers
        .iter()
        .filter(|&&(_, port)| port == Port::Group)
        .count();

    graph.transaction(|tx| {
        for (consumer, port) in consumers {
            tx.rewire(consumer, port, source)?;
        }
        tx.delete_node(id)
    })?;

    Ok((origin, locus, moved))
}

// ============================================================================
// Column Shift
// ============================================================================

fn column_shift(
    graph: &mut PrefixGraph,
    row: usize,
    col: usize,
    to: usize,
) -> Result<(Coord, Coord), TransformError> {
    let rule = Rule::ColumnShift;
    let id = node_param(graph, rule, row, col)?;
    let origin = Coord::new(row, col);
    let max = graph.peak_column() + 1;
    if to == 0 || to > max {
        return Err(invalid(
            rule,
            format!("target column {} outside 1..={}", to, max),
        ));
    }

    let node = graph
        .node(id)
        .ok_or_else(|| invalid(rule, format!("no node at {}", origin)))?;
    if node.kind == NodeKind::Input {
        return Err(not_applicable(
            rule,
            origin,
            "input nodes are fixed at column 0".into(),
        ));
    }
    if to == col {
        return Err(not_applicable(
            rule,
            origin,
            format!("node is already at column {}", col),
        ));
    }

    let lower = node
        .inputs()
        .filter_map(|(_, source)| graph.node(source).map(|n| n.col()))
        .max()
        .unwrap_or(0);
    if to <= lower {
        return Err(not_applicable(
            rule,
            origin,
            format!("column {} is not after its inputs at column {}", to, lower),
        ));
    }
    let upper = graph
        .consumers(id)
        .into_iter()
        .filter_map(|(c, _)| graph.node(c).map(|n| n.col()))
        .min();
    if let Some(upper) = upper {
        if to >= upper {
            return Err(not_applicable(
                rule,
                origin,
                format!("column {} is not before its consumers at column {}", to, upper),
            ));
        }
    }

    graph.transaction(|tx| tx.shift_column(id, to))?;
    Ok((origin, Coord::new(row, to)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::build_topology;
    use crate::validate;

    fn apply(graph: &mut PrefixGraph, token: &str) -> Result<Applied, TransformError> {
        let descriptor = TransformDescriptor::parse_token(token, 0).unwrap();
        apply_rule(graph, &descriptor)
    }

    #[test]
    fn test_level_flatten_ripple() {
        let mut graph = build_topology(8, "ripple-carry").unwrap();
        let applied = apply(&mut graph, "LF@6").unwrap();
        assert_eq!(applied.origin, Coord::new(6, 6));
        assert_eq!(applied.locus, Coord::new(6, 5));
        assert_eq!(graph.row_depth(6), Some(5));
        // New X∘A node in row 6
        assert_eq!(graph.node_at(6, 1).unwrap().kind, NodeKind::Black);
        // Row 4 output now feeds rows 5 and 6
        assert_eq!(graph.fanout(graph.output_id(4).unwrap()), 2);
        assert!(validate::check(&graph).is_ok());
    }

    #[test]
    fn test_level_flatten_then_expand_restores_structure() {
        let original = build_topology(8, "ripple-carry").unwrap();
        let mut graph = original.clone();
        let applied = apply(&mut graph, "LF@6").unwrap();
        let inverse = applied.inverse();
        assert_eq!(inverse.to_string(), "FL@6,5");
        apply_rule(&mut graph, &inverse).unwrap();
        assert!(validate::check(&graph).is_ok());
        assert_eq!(graph.layout(), original.layout());
        assert_eq!(graph.row_depth(6), Some(6));
    }

    #[test]
    fn test_level_flatten_not_applicable() {
        let mut graph = build_topology(8, "ripple-carry").unwrap();
        let before = graph.clone();
        // Row 1 reads the row 0 input, which is not a combine
        let err = apply(&mut graph, "LF@1").unwrap_err();
        assert!(matches!(err, TransformError::RuleNotApplicable { rule: "LF", .. }));
        // Row 0 has no operators
        assert!(matches!(
            apply(&mut graph, "LF@0"),
            Err(TransformError::RuleNotApplicable { .. })
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_fan_expand_leaves_room_to_flatten() {
        let mut graph = build_topology(3, "ripple-carry").unwrap();
        apply(&mut graph, "SH@2,2,3").unwrap();
        let shifted = graph.clone();
        apply(&mut graph, "LF@2").unwrap();
        assert_eq!(graph.row_depth(2), Some(2));

        // Regrouping alone would fit in column 2, which leaves level-flatten no gain
        let expanded = apply(&mut graph, "FL@2,2").unwrap();
        assert_eq!(expanded.locus, Coord::new(2, 3));
        assert_eq!(graph.layout(), shifted.layout());

        let inverse = expanded.inverse();
        assert_eq!(inverse.to_string(), "LF@2,3");
        apply_rule(&mut graph, &inverse).unwrap();
        assert_eq!(graph.row_depth(2), Some(2));
        assert!(validate::check(&graph).is_ok());
    }

    #[test]
    fn test_fan_expand_needs_existing_group() {
        let mut graph = build_topology(8, "ripple-carry").unwrap();
        let err = apply(&mut graph, "FL@6").unwrap_err();
        assert!(matches!(err, TransformError::RuleNotApplicable { rule: "FL", .. }));
    }

    /// Sklansky 8 with rows 4..=7 pushed one column out, leaving room after row 3
    fn spread_sklansky() -> PrefixGraph {
        let mut graph = build_topology(8, "sklansky").unwrap();
        for row in 4..8 {
            let col = graph.row_depth(row).unwrap();
            apply(&mut graph, &format!("SH@{},{},{}", row, col, col + 1)).unwrap();
        }
        graph
    }

    #[test]
    fn test_buffer_insert_needs_room() {
        // Every consumer of row 3 sits in the column the buffer would take
        let mut graph = build_topology(8, "sklansky").unwrap();
        assert!(matches!(
            apply(&mut graph, "BI@3,2"),
            Err(TransformError::RuleNotApplicable { rule: "BI", .. })
        ));
    }

    #[test]
    fn test_buffer_insert_splits_later_consumers() {
        let mut graph = spread_sklansky();
        let hot = graph.output_id(3).unwrap();
        assert_eq!(graph.fanout(hot), 4);

        let applied = apply(&mut graph, "BI@3,2").unwrap();
        assert_eq!(applied.locus, Coord::new(3, 3));
        let buffer = graph.id_at(3, 3).unwrap();
        assert_eq!(graph.node(buffer).unwrap().kind, NodeKind::Buffer);
        // Rows 4 and 5 stay, rows 6 and 7 move, the buffer itself reads `hot`
        assert_eq!(graph.fanout(hot), 3);
        assert_eq!(graph.fanout(buffer), 2);
        assert!(validate::check(&graph).is_ok());
    }

    #[test]
    fn test_buffer_insert_then_remove() {
        let original = spread_sklansky();
        let mut graph = original.clone();
        let applied = apply(&mut graph, "BI@3,2").unwrap();
        let inverse = applied.inverse();
        assert_eq!(inverse.to_string(), "BR@3,3");
        let removed = apply_rule(&mut graph, &inverse).unwrap();
        assert_eq!(removed.locus, Coord::new(3, 2));
        assert_eq!(removed.inverse().to_string(), "BI@3,2,2");
        assert_eq!(graph.layout(), original.layout());
    }

    #[test]
    fn test_buffer_insert_with_count() {
        let mut graph = spread_sklansky();
        let hot = graph.output_id(3).unwrap();
        let applied = apply(&mut graph, "BI@3,2,1").unwrap();
        assert_eq!(applied.moved, 1);
        let buffer = graph.id_at(3, 3).unwrap();
        assert_eq!(graph.fanout(buffer), 1);
        assert_eq!(graph.fanout(hot), 4);

        // Removing and reinserting moves the same single consumer back
        let buffered = graph.layout();
        let removed = apply_rule(&mut graph, &applied.inverse()).unwrap();
        apply_rule(&mut graph, &removed.inverse()).unwrap();
        assert_eq!(graph.layout(), buffered);

        assert!(matches!(
            apply(&mut graph, "BI@1,1,5"),
            Err(TransformError::RuleNotApplicable { rule: "BI", .. })
        ));
    }

    #[test]
    fn test_buffer_with_single_consumer_round_trips() {
        let mut graph = build_topology(4, "ripple-carry").unwrap();
        apply(&mut graph, "SH@3,3,4").unwrap();
        apply(&mut graph, "SH@2,2,3").unwrap();

        // Row 1 has a single consumer, so only an explicit count can buffer it
        assert!(matches!(
            apply(&mut graph, "BI@1,1"),
            Err(TransformError::RuleNotApplicable { rule: "BI", .. })
        ));
        apply(&mut graph, "BI@1,1,1").unwrap();
        let buffered = graph.layout();

        let removed = apply(&mut graph, "BR@1,2").unwrap();
        assert_eq!(removed.moved, 1);
        let inverse = removed.inverse();
        assert_eq!(inverse.to_string(), "BI@1,1,1");
        apply_rule(&mut graph, &inverse).unwrap();
        assert_eq!(graph.layout(), buffered);
        assert!(validate::check(&graph).is_ok());
    }

    #[test]
    fn test_buffer_remove_rejects_non_buffer() {
        let mut graph = build_topology(4, "ripple-carry").unwrap();
        assert!(matches!(
            apply(&mut graph, "BR@2,2"),
            Err(TransformError::RuleNotApplicable { rule: "BR", .. })
        ));
    }

    #[test]
    fn test_column_shift_bounds() {
        let mut graph = build_topology(4, "ripple-carry").unwrap();
        // Row 3's output has no consumers and can move one column out
        apply(&mut graph, "SH@3,3,4").unwrap();
        assert_eq!(graph.depth(), 5);
        // Row 2's output is read by row 3 at column 4
        assert!(apply(&mut graph, "SH@2,2,3").is_ok());
        assert!(matches!(
            apply(&mut graph, "SH@2,3,4"),
            Err(TransformError::RuleNotApplicable { .. })
        ));
        assert!(matches!(
            apply(&mut graph, "SH@2,3,9"),
            Err(TransformError::InvalidLocus { .. })
        ));
        assert!(validate::check(&graph).is_ok());
    }

    #[test]
    fn test_column_shift_inward_then_back() {
        let mut graph = build_topology(4, "ripple-carry").unwrap();
        for col in 3..6 {
            apply(&mut graph, &format!("SH@3,{},{}", col, col + 1)).unwrap();
        }
        let applied = apply(&mut graph, "SH@3,6,3").unwrap();
        assert_eq!(graph.max_column(), 3);

        // The way back lies beyond the current last column
        let inverse = applied.inverse();
        assert_eq!(inverse.to_string(), "SH@3,3,6");
        apply_rule(&mut graph, &inverse).unwrap();
        assert_eq!(graph.row_depth(3), Some(6));
        assert!(matches!(
            apply(&mut graph, "SH@3,6,8"),
            Err(TransformError::InvalidLocus { .. })
        ));
    }

    #[test]
    fn test_invalid_locus() {
        let mut graph = build_topology(4, "ripple-carry").unwrap();
        let before = graph.clone();
        for token in ["LF@4", "LF@-1", "LF@2,7", "BI@1", "BI@1,1,-1", "SH@1,1", "BR@9,9"] {
            assert!(
                matches!(apply(&mut graph, token), Err(TransformError::InvalidLocus { .. })),
                "{token}"
            );
        }
        assert_eq!(graph, before);
    }
}
