//! Verilog generation from exported netlists
//!
//! Behavioral netlists become one `assign` per signal. Structural netlists
//! become one cell instance per node; when the generic library is used the
//! cell modules are appended so the output is self-contained.

use crate::{CodegenError, Result};
use pptree_core::export::{Assignment, CellInstance, Direction, Logic, PortDecl};
use pptree_core::Netlist;
use std::fmt::Write;
use tracing::debug;

const PPA_PRE: &str = "\
module ppa_pre (
    input  a,
    input  b,
    output g,
    output p
);
    assign g = a & b;
    assign p = a ^ b;
endmodule
";

const PPA_BLACK: &str = "\
module ppa_black (
    input  gh,
    input  ph,
    input  gl,
    input  pl,
    output g,
    output p
);
    assign g = gh | (ph & gl);
    assign p = ph & pl;
endmodule
";

const PPA_GREY: &str = "\
module ppa_grey (
    input  gh,
    input  ph,
    input  gl,
    output g
);
    assign g = gh | (ph & gl);
endmodule
";

const PPA_BUFFER: &str = "\
module ppa_buffer (
    input  gi,
    input  pi,
    output g,
    output p
);
    assign g = gi;
    assign p = pi;
endmodule
";

fn generic_cell_module(name: &str) -> Option<&'static str> {
    match name {
        "ppa_pre" => Some(PPA_PRE),
        "ppa_black" => Some(PPA_BLACK),
        "ppa_grey" => Some(PPA_GREY),
        "ppa_buffer" => Some(PPA_BUFFER),
        _ => None,
    }
}

/// Verilog source of every generic prefix cell
pub fn generic_cell_modules() -> String {
    [PPA_PRE, PPA_BLACK, PPA_GREY, PPA_BUFFER].join("\n")
}

/// Generate a Verilog module for a netlist
pub fn generate_verilog(netlist: &Netlist) -> Result<String> {
    if netlist.nodes.is_empty() {
        return Err(CodegenError::Unsupported(format!(
            "module {} has no nodes",
            netlist.module
        )));
    }

    let mut v = String::new();
    writeln!(
        v,
        "// {}-bit parallel-prefix adder, {} mapping",
        netlist.width, netlist.policy
    )?;
    writeln!(v, "module {} (", netlist.module)?;
    let ports: Vec<String> = netlist.ports.iter().map(port_decl).collect();
    writeln!(v, "{}", ports.join(",\n"))?;
    v.push_str(");\n\n");

    // Wire declarations
    for node in &netlist.nodes {
        match &node.propagate {
            Some(p) => writeln!(v, "    wire {}, {};", node.generate, p)?,
            None => writeln!(v, "    wire {};", node.generate)?,
        }
    }
    v.push('\n');

    let mut column = None;
    for node in &netlist.nodes {
        if column != Some(node.coord.col) {
            column = Some(node.coord.col);
            writeln!(v, "    // Level {}", node.coord.col)?;
        }
        match &node.logic {
            Logic::Equations(equations) => {
                for assignment in equations {
                    write_assign(&mut v, assignment)?;
                }
            }
            Logic::Cell(instance) => write_instance(&mut v, instance)?,
        }
    }

    v.push_str("\n    // Sum and carry out\n");
    for assignment in &netlist.outputs {
        write_assign(&mut v, assignment)?;
    }
    v.push_str("endmodule\n");

    if netlist.library.as_deref() == Some("generic") {
        for cell in netlist.cells_used() {
            if let Some(source) = generic_cell_module(cell) {
                v.push('\n');
                v.push_str(source);
            }
        }
    }

    debug!(module = %netlist.module, bytes = v.len(), "generated verilog");
    Ok(v)
}

fn port_decl(port: &PortDecl) -> String {
    let direction = match port.direction {
        Direction::Input => "input ",
        Direction::Output => "output",
    };
    if port.width > 1 {
        format!("    {} [{}:0] {}", direction, port.width - 1, port.name)
    } else {
        format!("    {} {}", direction, port.name)
    }
}

fn write_assign(v: &mut String, assignment: &Assignment) -> std::fmt::Result {
    writeln!(v, "    assign {} = {};", assignment.target, assignment.expr)
}

fn write_instance(v: &mut String, instance: &CellInstance) -> std::fmt::Result {
    let pins: Vec<String> = instance
        .connections
        .iter()
        .map(|(pin, signal)| format!(".{}({})", pin, signal))
        .collect();
    writeln!(v, "    {} {} ({});", instance.cell, instance.name, pins.join(", "))
}
