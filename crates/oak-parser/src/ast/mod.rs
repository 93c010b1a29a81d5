//! Abstract Syntax Tree (AST) for Oak: the Parsed IR.
//!
//! This module provides:
//! - Node definitions for modules, declarations, expressions, patterns and types
//! - The recursive-descent [`Parser`] producing them
//!
//! Every node carries the [`oak_core::Location`] it was parsed from.

pub mod expr;
pub mod module;
pub mod pattern;
pub mod types;

mod decl_parser;
mod expr_parser;
mod parser;
mod pattern_parser;
mod type_parser;

pub use expr::*;
pub use module::*;
pub use parser::Parser;
pub use pattern::*;
pub use types::*;
