//! Oak parser crate.
//!
//! Turns one module source file into a [`Module`] of the Parsed IR.
//!
//! # Example
//!
//! ```
//! use oak_core::{PackageIdentifier, SourceFile};
//! use oak_parser::parse_module;
//!
//! let file = SourceFile::new("src/M.oak", "module M\ndef add(a, b) = a + b\n");
//! let module = parse_module(&file, PackageIdentifier::new("main")).unwrap();
//! assert_eq!(module.name.as_str(), "M");
//! assert_eq!(module.definitions[0].params.len(), 2);
//! ```

use std::sync::Arc;

use oak_core::{PackageIdentifier, ParseError, SourceFile};

pub mod ast;
pub mod lexer;

pub use ast::*;

/// Parse one module file belonging to `package`.
///
/// Parse errors are fatal for the module: the first one is returned.
pub fn parse_module(
    file: &Arc<SourceFile>,
    package: PackageIdentifier,
) -> Result<Module, ParseError> {
    Parser::new(file)?.parse(package)
}
