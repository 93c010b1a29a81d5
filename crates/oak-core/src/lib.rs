//! Oak core crate.
//!
//! Types shared by every stage of the Oak compiler:
//! - Source files and byte-offset [`Location`]s
//! - Nominal identifier types ([`Identifier`], [`FullIdentifier`], ...)
//! - Literal [`Constant`] values
//! - Deterministic string and constant hashes used as bytecode operands
//! - The error and diagnostic hierarchy
//!
//! # Example
//!
//! ```
//! use oak_core::{Location, SourceFile};
//!
//! let file = SourceFile::new("src/Main.oak", "module Main\ndef x = 1\n");
//! let loc = Location::new(file, 16, 17);
//! assert_eq!(loc.text(), "x");
//! assert_eq!(loc.line_col(), (2, 5));
//! ```

mod constant;
mod error;
mod hash;
mod identifiers;
mod location;

pub use constant::{Constant, ConstantKey, ConstantKind};
pub use error::{
    Diagnostic, Diagnostics, OakError, ParseError, ParseErrorKind, Result, Severity,
};
pub use hash::{ConstHash, StringHash, hash_constants};
pub use identifiers::{
    DataOptionIdentifier, FullIdentifier, Identifier, InfixIdentifier, PackageIdentifier,
    QualifiedIdentifier,
};
pub use location::{Location, SourceFile};
