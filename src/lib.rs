//! Oak
//!
//! Compiler driver for the Oak language: package manifests and discovery,
//! the command line, and the language server. The compiler itself lives in
//! [`oak_compiler`].
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! use oak::package::PackageLoader;
//! use oak_compiler::Compiler;
//!
//! let mut loader = PackageLoader::new("/home/me/.oak");
//! loader.load("geometry", Path::new("."))?;
//! let sources = loader.sources(&BTreeMap::new())?;
//! let compilation = Compiler::default().compile(&sources)?;
//! for diagnostic in &compilation.diagnostics {
//!     eprintln!("{}", diagnostic.display_with_source());
//! }
//! # Ok::<(), oak_core::OakError>(())
//! ```

pub mod cli;
pub mod lsp;
pub mod package;

pub use cli::{Build, Options, UsageError};
pub use package::{LoadedPackage, Manifest, PackageLoader};
