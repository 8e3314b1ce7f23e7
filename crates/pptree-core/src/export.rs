//! Netlist Export
//!
//! Lowers a validated prefix graph to a flat list of named signals and the
//! logic driving them. Two mapping policies are supported:
//!
//! | Policy | Node logic |
//! |--------|------------|
//! | Behavioral | Boolean equations over generate/propagate signals |
//! | Structural | One cell instance per node from a [`CellLibrary`] |
//!
//! # Signals
//!
//! The node at `(r, c)` drives `g{r}_{c}` and, when it produces one,
//! `p{r}_{c}`. Inputs compute `g = a & b` and `p = a ^ b`; combines compute
//! `g = gh | (ph & gl)` and black nodes also `p = ph & pl`, where `h` is the
//! through input and `l` the group input. The sum of bit `r` is
//! `p{r}_0 ^ G(r-1)` with `G(r)` the generate of row `r`'s output; the carry
//! out is `G(W-1)`.

use crate::error::ExportError;
use crate::graph::{Coord, NodeId, NodeKind, PrefixGraph};
use crate::validate::{self, Symbol};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// Mapping Policy
// ============================================================================

/// How node logic is expressed in the netlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingPolicy {
    /// Boolean equations
    #[default]
    Behavioral,
    /// Library cell instances
    Structural,
}

impl MappingPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            MappingPolicy::Behavioral => "behavioral",
            MappingPolicy::Structural => "structural",
        }
    }
}

impl fmt::Display for MappingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MappingPolicy {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "behavioral" | "behavioural" => Ok(MappingPolicy::Behavioral),
            "structural" | "mapped" => Ok(MappingPolicy::Structural),
            _ => Err(ExportError::UnknownPolicy(s.to_string())),
        }
    }
}

// ============================================================================
// Cell Library
// ============================================================================

/// Pin-level description of one library cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTemplate {
    /// Cell (module) name
    pub name: String,
    /// Input pins, in the order node inputs are listed
    pub inputs: Vec<String>,
    /// Output pins: generate first, then propagate
    pub outputs: Vec<String>,
}

impl CellTemplate {
    fn new(name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Source of cells for structural mapping
pub trait CellLibrary {
    /// Library name used in diagnostics
    fn name(&self) -> &str;

    /// Cell implementing a node kind, if the library has one
    fn cell(&self, kind: NodeKind) -> Option<CellTemplate>;
}

/// Built-in technology-independent prefix cells
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCells;

impl CellLibrary for GenericCells {
    fn name(&self) -> &str {
        "generic"
    }

    fn cell(&self, kind: NodeKind) -> Option<CellTemplate> {
        let template = match kind {
            NodeKind::Input => CellTemplate::new("ppa_pre", &["a", "b"], &["g", "p"]),
            NodeKind::Black => {
                CellTemplate::new("ppa_black", &["gh", "ph", "gl", "pl"], &["g", "p"])
            }
            NodeKind::Gray => CellTemplate::new("ppa_grey", &["gh", "ph", "gl"], &["g"]),
            NodeKind::Buffer => CellTemplate::new("ppa_buffer", &["gi", "pi"], &["g", "p"]),
        };
        Some(template)
    }
}

// ============================================================================
// Netlist Types
// ============================================================================

/// Boolean expression over netlist signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Internal wire
    Signal(String),
    /// One bit of a module port
    Bit { port: String, index: usize },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn signal(name: impl Into<String>) -> Self {
        Expr::Signal(name.into())
    }

    pub fn bit(port: &str, index: usize) -> Self {
        Expr::Bit {
            port: port.to_string(),
            index,
        }
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn xor(self, rhs: Expr) -> Self {
        Expr::Xor(Box::new(self), Box::new(rhs))
    }

    fn is_atom(&self) -> bool {
        matches!(self, Expr::Signal(_) | Expr::Bit { .. })
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atom() {
            write!(f, "{}", self)
        } else {
            write!(f, "({})", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lhs, op, rhs) = match self {
            Expr::Signal(name) => return f.write_str(name),
            Expr::Bit { port, index } => return write!(f, "{}[{}]", port, index),
            Expr::And(l, r) => (l, "&", r),
            Expr::Or(l, r) => (l, "|", r),
            Expr::Xor(l, r) => (l, "^", r),
        };
        lhs.write_operand(f)?;
        write!(f, " {} ", op)?;
        rhs.write_operand(f)
    }
}

/// `target = expr`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: String,
    pub expr: Expr,
}

impl Assignment {
    fn new(target: impl Into<String>, expr: Expr) -> Self {
        Self {
            target: target.into(),
            expr,
        }
    }
}

/// Library cell placed for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInstance {
    /// Instance name
    pub name: String,
    /// Cell name from the library
    pub cell: String,
    /// Pin to signal connections
    pub connections: IndexMap<String, String>,
}

/// Logic driving a node's outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    Equations(Vec<Assignment>),
    Cell(CellInstance),
}

/// One graph node in the netlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedNode {
    pub coord: Coord,
    pub kind: NodeKind,
    /// Generate output signal
    pub generate: String,
    /// Propagate output signal, if the node produces one
    pub propagate: Option<String>,
    /// Signals read, in cell pin order
    pub inputs: Vec<String>,
    pub logic: Logic,
}

/// Direction of a module port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// Module port declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    pub name: String,
    pub direction: Direction,
    pub width: usize,
}

/// Exported adder netlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netlist {
    /// Top-level module name
    pub module: String,
    /// Operand width
    pub width: usize,
    pub policy: MappingPolicy,
    /// Cell library used for structural mapping
    pub library: Option<String>,
    pub ports: Vec<PortDecl>,
    /// Nodes in column-major order
    pub nodes: Vec<ExportedNode>,
    /// Sum and carry-out equations
    pub outputs: Vec<Assignment>,
}

impl Netlist {
    /// Every internal wire, in node order
    pub fn wires(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().flat_map(|node| {
            std::iter::once(node.generate.as_str()).chain(node.propagate.as_deref())
        })
    }

    /// Names of the cells instantiated, without duplicates
    pub fn cells_used(&self) -> Vec<&str> {
        let mut cells: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if let Logic::Cell(instance) = &node.logic {
                if !cells.contains(&instance.cell.as_str()) {
                    cells.push(instance.cell.as_str());
                }
            }
        }
        cells
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "module {} ({} bits, {}): {} nodes, {} wires",
            self.module,
            self.width,
            self.policy,
            self.nodes.len(),
            self.wires().count()
        )
    }
}

// ============================================================================
// Export
// ============================================================================

/// IEEE 1364-2005 keywords and gate primitives, plus SystemVerilog `logic`
const RESERVED: &[&str] = &[
    "always", "and", "assign", "automatic", "begin", "buf", "bufif0", "bufif1", "case", "casex",
    "casez", "cell", "cmos", "config", "deassign", "default", "defparam", "design", "disable",
    "edge", "else", "end", "endcase", "endconfig", "endfunction", "endgenerate", "endmodule",
    "endprimitive", "endspecify", "endtable", "endtask", "event", "for", "force", "forever",
    "fork", "function", "generate", "genvar", "highz0", "highz1", "if", "ifnone", "incdir",
    "include", "initial", "inout", "input", "instance", "integer", "join", "large", "liblist",
    "library", "localparam", "logic", "macromodule", "medium", "module", "nand", "negedge", "nmos",
    "nor", "noshowcancelled", "not", "notif0", "notif1", "or", "output", "parameter", "pmos",
    "posedge", "primitive", "pull0", "pull1", "pulldown", "pullup", "pulsestyle_ondetect",
    "pulsestyle_onevent", "rcmos", "real", "realtime", "reg", "release", "repeat", "rnmos",
    "rpmos", "rtran", "rtranif0", "rtranif1", "scalared", "showcancelled", "signed", "small",
    "specify", "specparam", "strong0", "strong1", "supply0", "supply1", "table", "task", "time",
    "tran", "tranif0", "tranif1", "tri", "tri0", "tri1", "triand", "trior", "trireg", "unsigned",
    "use", "uwire", "vectored", "wait", "wand", "weak0", "weak1", "while", "wire", "wor", "xnor",
    "xor",
];

/// Check that a module name is a legal HDL identifier
pub fn check_module_name(name: &str) -> Result<(), ExportError> {
    let mut chars = name.chars();
    let legal = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        None => false,
    };
    if !legal || RESERVED.contains(&name) {
        return Err(ExportError::InvalidModuleName(name.to_string()));
    }
    Ok(())
}

fn generate_name(coord: Coord) -> String {
    format!("g{}_{}", coord.row, coord.col)
}

fn propagate_name(coord: Coord) -> String {
    format!("p{}_{}", coord.row, coord.col)
}

/// Lower a graph to a netlist
///
/// The graph must pass [`validate::check`]; an invalid graph is never
/// emitted.
pub fn export(
    graph: &PrefixGraph,
    policy: MappingPolicy,
    module_name: &str,
    library: &dyn CellLibrary,
) -> Result<Netlist, ExportError> {
    check_module_name(module_name)?;
    validate::check(graph).map_err(ExportError::Unvalidated)?;

    let symbols = validate::simulate(graph);
    let width = graph.rows();
    let mut nodes = Vec::with_capacity(graph.node_count());

    for id in graph.topological_order() {
        let Some(node) = graph.node(id) else { continue };
        let signals = Signals::of(graph, &symbols, id);
        let generate = generate_name(node.coord);
        let propagate = signals.has_propagate.then(|| propagate_name(node.coord));
        let inputs = signals.inputs(node.row());

        let logic = match policy {
            MappingPolicy::Behavioral => {
                Logic::Equations(equations(node.kind, node.row(), &signals, &generate, &propagate))
            }
            MappingPolicy::Structural => {
                let template = library.cell(node.kind).ok_or_else(|| ExportError::MissingCell {
                    library: library.name().to_string(),
                    kind: node.kind.to_string(),
                })?;
                let outputs = std::iter::once(&generate).chain(propagate.as_ref());
                let connections = template
                    .inputs
                    .iter()
                    .cloned()
                    .zip(inputs.iter().cloned())
                    .chain(template.outputs.iter().cloned().zip(outputs.cloned()))
                    .collect();
                Logic::Cell(CellInstance {
                    name: format!("u{}_{}", node.coord.row, node.coord.col),
                    cell: template.name,
                    connections,
                })
            }
        };

        nodes.push(ExportedNode {
            coord: node.coord,
            kind: node.kind,
            generate,
            propagate,
            inputs,
            logic,
        });
    }

    let outputs = sum_equations(graph, width)?;
    let ports = vec![
        port("a", Direction::Input, width),
        port("b", Direction::Input, width),
        port("sum", Direction::Output, width),
        port("cout", Direction::Output, 1),
    ];

    let netlist = Netlist {
        module: module_name.to_string(),
        width,
        policy,
        library: (policy == MappingPolicy::Structural).then(|| library.name().to_string()),
        ports,
        nodes,
        outputs,
    };
    debug!(summary = %netlist.summary(), "exported netlist");
    Ok(netlist)
}

fn port(name: &str, direction: Direction, width: usize) -> PortDecl {
    PortDecl {
        name: name.to_string(),
        direction,
        width,
    }
}

/// Signals a node reads, resolved to netlist names
struct Signals {
    high_generate: Option<String>,
    high_propagate: Option<String>,
    low_generate: Option<String>,
    low_propagate: Option<String>,
    has_propagate: bool,
}

impl Signals {
    fn of(graph: &PrefixGraph, symbols: &IndexMap<NodeId, Symbol>, id: NodeId) -> Self {
        let produces = |id: NodeId| symbols.get(&id).is_some_and(|s| s.propagate);
        let resolve = |source: Option<NodeId>| match source
            .and_then(|s| graph.node(s).map(|n| (s, n.coord)))
        {
            Some((s, coord)) => (
                Some(generate_name(coord)),
                produces(s).then(|| propagate_name(coord)),
            ),
            None => (None, None),
        };
        let node = graph.node(id);
        let (high_generate, high_propagate) = resolve(node.and_then(|n| n.through));
        let (low_generate, low_propagate) = resolve(node.and_then(|n| n.group));
        // Only black nodes read the low propagate
        let black = node.is_some_and(|n| n.kind == NodeKind::Black);
        Self {
            high_generate,
            high_propagate,
            low_generate,
            low_propagate: low_propagate.filter(|_| black),
            has_propagate: produces(id),
        }
    }

    /// Input signal names in cell pin order
    fn inputs(&self, row: usize) -> Vec<String> {
        if self.high_generate.is_none() {
            return vec![format!("a[{}]", row), format!("b[{}]", row)];
        }
        [
            &self.high_generate,
            &self.high_propagate,
            &self.low_generate,
            &self.low_propagate,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

fn equations(
    kind: NodeKind,
    row: usize,
    signals: &Signals,
    generate: &str,
    propagate: &Option<String>,
) -> Vec<Assignment> {
    let sig = |name: &Option<String>| Expr::signal(name.clone().unwrap_or_default());
    let mut out = Vec::with_capacity(2);
    match kind {
        NodeKind::Input => {
            out.push(Assignment::new(generate, Expr::bit("a", row).and(Expr::bit("b", row))));
            if let Some(p) = propagate {
                out.push(Assignment::new(p, Expr::bit("a", row).xor(Expr::bit("b", row))));
            }
        }
        NodeKind::Black | NodeKind::Gray => {
            let g = sig(&signals.high_generate)
                .or(sig(&signals.high_propagate).and(sig(&signals.low_generate)));
            out.push(Assignment::new(generate, g));
            if let Some(p) = propagate {
                out.push(Assignment::new(
                    p,
                    sig(&signals.high_propagate).and(sig(&signals.low_propagate)),
                ));
            }
        }
        NodeKind::Buffer => {
            out.push(Assignment::new(generate, sig(&signals.high_generate)));
            if let Some(p) = propagate {
                out.push(Assignment::new(p, sig(&signals.high_propagate)));
            }
        }
    }
    out
}

fn sum_equations(graph: &PrefixGraph, width: usize) -> Result<Vec<Assignment>, ExportError> {
    let carry = |row: usize| {
        graph
            .output_node(row)
            .map(|node| Expr::signal(generate_name(node.coord)))
            .ok_or_else(|| ExportError::Unvalidated(vec![validate::Violation::MissingInput { row }]))
    };

    let mut outputs = Vec::with_capacity(width + 1);
    for row in 0..width {
        let half = Expr::signal(propagate_name(Coord::new(row, 0)));
        let expr = if row == 0 {
            half
        } else {
            half.xor(carry(row - 1)?)
        };
        outputs.push(Assignment::new(format!("sum[{}]", row), expr));
    }
    outputs.push(Assignment::new("cout", carry(width - 1)?));
    Ok(outputs)
}
