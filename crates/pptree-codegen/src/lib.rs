//! Prefix Adder Code Generation
//!
//! This crate handles:
//! - Verilog generation from an exported [`Netlist`](pptree_core::Netlist),
//!   either as continuous assignments or as cell instances
//! - Verilog models of the generic prefix cells
//! - Graphviz DOT rendering of a prefix graph layout
//!
//! [`generate_hdl`] is the entry point for HDL text; the target is chosen by
//! [`Language`].

pub mod diagram;
pub mod verilog;

pub use diagram::generate_dot;
pub use verilog::{generate_verilog, generic_cell_modules};

use pptree_core::Netlist;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for code generation
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors raised while rendering output text
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Writing to the output buffer failed
    #[error("formatting failed: {0}")]
    Format(#[from] std::fmt::Error),

    /// The netlist cannot be expressed in the target language
    #[error("cannot emit netlist: {0}")]
    Unsupported(String),
}

/// Target hardware description language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Verilog,
}

impl Language {
    pub const ALL: [Language; 1] = [Language::Verilog];

    pub fn name(&self) -> &'static str {
        match self {
            Language::Verilog => "verilog",
        }
    }

    /// File extension for generated sources
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Verilog => "v",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self> {
        Language::ALL
            .into_iter()
            .find(|language| language.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CodegenError::Unsupported(format!("unknown HDL language '{}'", s)))
    }
}

/// Generate HDL source for a netlist in the requested language
pub fn generate_hdl(netlist: &Netlist, language: Language) -> Result<String> {
    match language {
        Language::Verilog => generate_verilog(netlist),
    }
}
