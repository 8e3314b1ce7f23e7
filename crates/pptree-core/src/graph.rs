//! Prefix Graph Data Structure
//!
//! A prefix graph holds one node per prefix operator, laid out on a grid of
//! rows (the output bit a node contributes to) and columns (logic levels).
//!
//! # Storage
//!
//! Nodes live in an arena addressed by [`NodeId`]; an ordered `(row, col)`
//! index locates them by coordinate. Inputs are stored as `NodeId`s, so a
//! node can move to another column without invalidating its consumers.
//!
//! # Rows
//!
//! Every row is a chain: `INPUT, n1, n2, ..., nk` ordered by column, where the
//! *through* input of each node is the node just before it. The last node of
//! the chain is the row's output.
//!
//! # Mutation
//!
//! The only way to change a graph is [`PrefixGraph::transaction`]. Edits run
//! on a copy and the structural invariants are checked once at the end; on
//! any failure the original graph is untouched.

use crate::error::StructuralError;
use crate::validate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Node Types
// ============================================================================

/// Unique identifier for a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Grid position of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    /// Output bit the node contributes to
    pub row: usize,
    /// Logic level
    pub col: usize,
}

impl Coord {
    /// Create a new coordinate
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Prefix operator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Per-bit generate/propagate terminal
    Input,
    /// Full combine, produces generate and propagate
    Black,
    /// Half combine, produces generate only
    Gray,
    /// Pass-through
    Buffer,
}

impl NodeKind {
    /// Check if this kind combines two inputs
    pub fn is_combine(&self) -> bool {
        matches!(self, NodeKind::Black | NodeKind::Gray)
    }

    /// Get the name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Black => "black",
            NodeKind::Gray => "gray",
            NodeKind::Buffer => "buffer",
        }
    }

    fn glyph(&self) -> char {
        match self {
            NodeKind::Input => 'o',
            NodeKind::Black => '#',
            NodeKind::Gray => '+',
            NodeKind::Buffer => '>',
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input port of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Port {
    /// Previous node in the same row (high half of the span)
    Through,
    /// Node in a lower row (low half of the span)
    Group,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Port::Through => f.write_str("through"),
            Port::Group => f.write_str("group"),
        }
    }
}

/// One prefix operator instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixNode {
    /// Grid position
    pub coord: Coord,
    /// Operator kind
    pub kind: NodeKind,
    /// Previous node in the same row
    pub through: Option<NodeId>,
    /// Node in a lower row
    pub group: Option<NodeId>,
}

impl PrefixNode {
    /// Row of this node
    pub fn row(&self) -> usize {
        self.coord.row
    }

    /// Column of this node
    pub fn col(&self) -> usize {
        self.coord.col
    }

    /// Input on the given port
    pub fn input(&self, port: Port) -> Option<NodeId> {
        match port {
            Port::Through => self.through,
            Port::Group => self.group,
        }
    }

    /// All connected inputs with their ports
    pub fn inputs(&self) -> impl Iterator<Item = (Port, NodeId)> + '_ {
        self.through
            .map(|id| (Port::Through, id))
            .into_iter()
            .chain(self.group.map(|id| (Port::Group, id)))
    }
}

// ============================================================================
// Graph
// ============================================================================

/// Summary metrics of a prefix graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Operand width
    pub width: usize,
    /// Number of columns in use
    pub depth: usize,
    /// Number of black nodes
    pub black: usize,
    /// Number of gray nodes
    pub gray: usize,
    /// Number of buffers
    pub buffers: usize,
    /// Largest fan-out of any node
    pub max_fanout: usize,
}

impl GraphStats {
    /// Get summary string
    pub fn summary(&self) -> String {
        format!(
            "width {}, depth {}, {} black, {} gray, {} buffers, max fanout {}",
            self.width, self.depth, self.black, self.gray, self.buffers, self.max_fanout
        )
    }
}

/// Prefix graph for a fixed operand width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixGraph {
    width: usize,
    nodes: Vec<Option<PrefixNode>>,
    index: BTreeMap<Coord, NodeId>,
    /// Highest column any committed graph state has used
    peak_column: usize,
}

impl PrefixGraph {
    /// Create a graph holding only the input column
    pub(crate) fn with_inputs(width: usize) -> Result<Self, StructuralError> {
        let mut graph = Self {
            width,
            nodes: Vec::with_capacity(width * 2),
            index: BTreeMap::new(),
            peak_column: 0,
        };
        for row in 0..width {
            graph.push(PrefixNode {
                coord: Coord::new(row, 0),
                kind: NodeKind::Input,
                through: None,
                group: None,
            })?;
        }
        Ok(graph)
    }

    /// Store a node in the first free arena slot
    fn push(&mut self, node: PrefixNode) -> Result<NodeId, StructuralError> {
        let slot = self
            .nodes
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.nodes.len());
        let id = u32::try_from(slot)
            .map(NodeId)
            .map_err(|_| StructuralError::new(format!("node arena full at {} slots", slot)))?;
        self.index.insert(node.coord, id);
        match self.nodes.get_mut(slot) {
            Some(free) => *free = Some(node),
            None => self.nodes.push(Some(node)),
        }
        Ok(id)
    }

    /// Number of arena slots, live or free
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Operand width (number of rows)
    pub fn rows(&self) -> usize {
        self.width
    }

    /// Get a live node by id
    pub fn node(&self, id: NodeId) -> Option<&PrefixNode> {
        self.nodes.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Get the id of the node at a coordinate
    pub fn id_at(&self, row: usize, col: usize) -> Option<NodeId> {
        self.index.get(&Coord::new(row, col)).copied()
    }

    /// Get the node at a coordinate
    pub fn node_at(&self, row: usize, col: usize) -> Option<&PrefixNode> {
        self.id_at(row, col).and_then(|id| self.node(id))
    }

    /// Iterate over live nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &PrefixNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|node| (NodeId(i as u32), node)))
    }

    /// Coordinate index entries, ordered by row then column
    pub(crate) fn index_entries(&self) -> impl Iterator<Item = (Coord, NodeId)> + '_ {
        self.index.iter().map(|(coord, id)| (*coord, *id))
    }

    /// Node ids ordered by column, then row
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut order: Vec<(Coord, NodeId)> =
            self.nodes().map(|(id, node)| (node.coord, id)).collect();
        order.sort_by_key(|(coord, _)| (coord.col, coord.row));
        order.into_iter().map(|(_, id)| id).collect()
    }

    /// Nodes of a row ordered by column
    pub fn row_nodes(&self, row: usize) -> Vec<NodeId> {
        self.index
            .range(Coord::new(row, 0)..=Coord::new(row, usize::MAX))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Input terminal of a row
    pub fn input_id(&self, row: usize) -> Option<NodeId> {
        self.id_at(row, 0)
    }

    /// Id of the last node in a row's chain
    pub fn output_id(&self, row: usize) -> Option<NodeId> {
        if row >= self.width {
            return None;
        }
        self.index
            .range(Coord::new(row, 0)..=Coord::new(row, usize::MAX))
            .next_back()
            .map(|(_, id)| *id)
    }

    /// Last node in a row's chain
    pub fn output_node(&self, row: usize) -> Option<&PrefixNode> {
        self.output_id(row).and_then(|id| self.node(id))
    }

    /// Next node in the same row
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        let coord = self.node(id)?.coord;
        self.index
            .range(Coord::new(coord.row, coord.col + 1)..=Coord::new(coord.row, usize::MAX))
            .next()
            .map(|(_, id)| *id)
    }

    /// Highest column holding a node
    pub fn max_column(&self) -> usize {
        self.nodes().map(|(_, node)| node.col()).max().unwrap_or(0)
    }

    /// Highest column the graph has held a node in since it was built
    ///
    /// Never decreases, so a node moved inward can always be moved back.
    pub fn peak_column(&self) -> usize {
        self.peak_column
    }

    /// Number of columns in use, including the input column
    pub fn depth(&self) -> usize {
        self.max_column() + 1
    }

    /// Column of a row's output node
    pub fn row_depth(&self, row: usize) -> Option<usize> {
        self.output_node(row).map(|node| node.col())
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Number of black and gray nodes
    pub fn combine_count(&self) -> usize {
        self.nodes().filter(|(_, node)| node.kind.is_combine()).count()
    }

    /// Nodes reading from `id`, with the port they read it on
    pub fn consumers(&self, id: NodeId) -> Vec<(NodeId, Port)> {
        let mut consumers = Vec::new();
        for (other, node) in self.nodes() {
            for (port, source) in node.inputs() {
                if source == id {
                    consumers.push((other, port));
                }
            }
        }
        consumers
    }

    /// Consumers of every node, in topological order of the sources
    pub fn consumer_map(&self) -> IndexMap<NodeId, Vec<(NodeId, Port)>> {
        let mut map: IndexMap<NodeId, Vec<(NodeId, Port)>> = self
            .topological_order()
            .into_iter()
            .map(|id| (id, Vec::new()))
            .collect();
        for (id, node) in self.nodes() {
            for (port, source) in node.inputs() {
                if let Some(list) = map.get_mut(&source) {
                    list.push((id, port));
                }
            }
        }
        map
    }

    /// Number of nodes reading from `id`
    pub fn fanout(&self, id: NodeId) -> usize {
        self.consumers(id).len()
    }

    /// Largest fan-out of any node
    pub fn max_fanout(&self) -> usize {
        self.consumer_map()
            .values()
            .map(|consumers| consumers.len())
            .max()
            .unwrap_or(0)
    }

    /// Compute summary metrics
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            width: self.width,
            depth: self.depth(),
            max_fanout: self.max_fanout(),
            ..Default::default()
        };
        for (_, node) in self.nodes() {
            match node.kind {
                NodeKind::Black => stats.black += 1,
                NodeKind::Gray => stats.gray += 1,
                NodeKind::Buffer => stats.buffers += 1,
                NodeKind::Input => {}
            }
        }
        stats
    }

    /// Node/edge layout for diagram rendering
    pub fn layout(&self) -> Layout {
        let mut nodes = Vec::with_capacity(self.node_count());
        let mut edges = Vec::new();
        for id in self.topological_order() {
            let Some(node) = self.node(id) else { continue };
            nodes.push(LayoutNode {
                coord: node.coord,
                kind: node.kind,
            });
            for (port, source) in node.inputs() {
                if let Some(from) = self.node(source) {
                    edges.push(LayoutEdge {
                        from: from.coord,
                        to: node.coord,
                        port,
                    });
                }
            }
        }
        Layout {
            width: self.width,
            depth: self.depth(),
            nodes,
            edges,
        }
    }

    /// Run a batch of controlled edits atomically
    ///
    /// The closure edits a copy of the graph. If it fails, or the edited copy
    /// breaks a structural invariant, the error is returned and `self` is left
    /// exactly as it was.
    pub fn transaction<T>(
        &mut self,
        edits: impl FnOnce(&mut Transaction<'_>) -> Result<T, StructuralError>,
    ) -> Result<T, StructuralError> {
        let mut draft = self.clone();
        let value = edits(&mut Transaction { graph: &mut draft })?;
        if let Some(violation) = validate::structural_violations(&draft).into_iter().next() {
            return Err(StructuralError::new(violation.to_string()));
        }
        draft.peak_column = draft.peak_column.max(draft.max_column());
        *self = draft;
        Ok(value)
    }
}

impl fmt::Display for PrefixGraph {
    /// One line per row, most significant bit first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.depth();
        let label = self.width.saturating_sub(1).to_string().len();
        for row in (0..self.width).rev() {
            write!(f, "{:>label$} |", row, label = label)?;
            for col in 0..depth {
                let glyph = self.node_at(row, col).map_or('.', |node| node.kind.glyph());
                write!(f, " {}", glyph)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ============================================================================
// Controlled Edits
// ============================================================================

/// Edit handle passed to [`PrefixGraph::transaction`]
///
/// Individual edits reject obviously bad requests immediately; chain and
/// ordering invariants are checked once the whole batch is done, so a batch
/// may pass through intermediate states that are not valid graphs.
pub struct Transaction<'a> {
    graph: &'a mut PrefixGraph,
}

impl Transaction<'_> {
    /// Read-only view of the graph being edited
    pub fn graph(&self) -> &PrefixGraph {
        self.graph
    }

    fn live(&self, id: NodeId) -> Result<&PrefixNode, StructuralError> {
        self.graph
            .node(id)
            .ok_or_else(|| StructuralError::new(format!("node {:?} does not exist", id)))
    }

    fn live_mut(&mut self, id: NodeId) -> Result<&mut PrefixNode, StructuralError> {
        self.graph
            .nodes
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| StructuralError::new(format!("node {:?} does not exist", id)))
    }

    fn check_free(&self, coord: Coord) -> Result<(), StructuralError> {
        if coord.row >= self.graph.width {
            return Err(StructuralError::new(format!(
                "row {} outside width {}",
                coord.row, self.graph.width
            )));
        }
        if coord.col == 0 {
            return Err(StructuralError::new(format!(
                "column 0 is reserved for inputs, cannot place a node at {}",
                coord
            )));
        }
        if self.graph.index.contains_key(&coord) {
            return Err(StructuralError::new(format!("cell {} is occupied", coord)));
        }
        Ok(())
    }

    /// Insert a new operator node
    pub fn insert_node(
        &mut self,
        coord: Coord,
        kind: NodeKind,
        through: Option<NodeId>,
        group: Option<NodeId>,
    ) -> Result<NodeId, StructuralError> {
        if kind == NodeKind::Input {
            return Err(StructuralError::new("input nodes cannot be inserted"));
        }
        self.check_free(coord)?;
        for source in through.into_iter().chain(group) {
            self.live(source)?;
        }
        self.graph.push(PrefixNode {
            coord,
            kind,
            through,
            group,
        })
    }

    /// Point one input port of `id` at `source`
    pub fn rewire(&mut self, id: NodeId, port: Port, source: NodeId) -> Result<(), StructuralError> {
        self.live(source)?;
        let node = self.live_mut(id)?;
        if node.kind == NodeKind::Input {
            return Err(StructuralError::new("input nodes have no inputs to rewire"));
        }
        match port {
            Port::Through => node.through = Some(source),
            Port::Group => node.group = Some(source),
        }
        Ok(())
    }

    /// Remove a node that nothing reads from
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), StructuralError> {
        let node = self.live(id)?;
        if node.kind == NodeKind::Input {
            return Err(StructuralError::new("input nodes cannot be deleted"));
        }
        let coord = node.coord;
        if let Some((consumer, port)) = self.graph.consumers(id).into_iter().next() {
            return Err(StructuralError::new(format!(
                "node at {} is still read by {:?} on its {} port",
                coord, consumer, port
            )));
        }
        self.graph.index.remove(&coord);
        self.graph.nodes[id.index()] = None;
        Ok(())
    }

    /// Move a node to another column of its row
    pub fn shift_column(&mut self, id: NodeId, col: usize) -> Result<(), StructuralError> {
        let node = self.live(id)?;
        if node.kind == NodeKind::Input {
            return Err(StructuralError::new("input nodes cannot move"));
        }
        let from = node.coord;
        if from.col == col {
            return Ok(());
        }
        let to = Coord::new(from.row, col);
        self.check_free(to)?;
        self.graph.index.remove(&from);
        self.graph.index.insert(to, id);
        self.live_mut(id)?.coord = to;
        Ok(())
    }

    /// Change the operator kind of a non-input node
    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<(), StructuralError> {
        let node = self.live_mut(id)?;
        if node.kind == NodeKind::Input || kind == NodeKind::Input {
            return Err(StructuralError::new("input kind is fixed"));
        }
        node.kind = kind;
        Ok(())
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Node placement for diagram rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub coord: Coord,
    pub kind: NodeKind,
}

/// Wire between two placed nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub from: Coord,
    pub to: Coord,
    pub port: Port,
}

/// Presentation-only view of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub width: usize,
    pub depth: usize,
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}
