//! Oak Compiler
//!
//! Whole-program compilation from parsed modules to one linked bytecode
//! binary.
//!
//! ## Pipeline
//!
//! - **Resolution**: imports are unwrapped and every name is resolved to a
//!   `module.name` or a local binding
//! - **Normalization**: surface sugar is removed, operators are re-associated
//!   by precedence and closures are lifted to hidden definitions
//! - **Typing**: every node gets a type variable; equations are solved per
//!   strongly connected group of definitions
//! - **Checking**: pattern matches are checked for exhaustiveness and
//!   redundancy
//! - **Emission**: typed definitions become functions of a [`Binary`]
//!
//! ## Modules
//!
//! - [`resolve`]: import unwrapping and name resolution
//! - [`flatten`]: data types to aliases and constructor definitions
//! - [`normalize`]: parsed to normalized IR
//! - [`lift`]: lambda lifting
//! - [`types`]: semantic types and the data-type table
//! - [`annotate`], [`solve`]: type inference
//! - [`patterns`]: exhaustiveness and redundancy checking
//! - [`bytecode`]: ops, the binary and its file format
//! - [`emit`], [`link`]: code generation
//! - [`compiler`]: the pipeline driver

pub mod annotate;
pub mod bytecode;
pub mod compiler;
pub mod emit;
pub mod flatten;
pub mod lift;
pub mod link;
pub mod normalize;
pub mod normalized;
pub mod patterns;
pub mod resolve;
pub mod solve;
pub mod types;

pub use bytecode::{Binary, BinaryError, BinaryFlags, Func, Op};
pub use compiler::{
    CompileOptions, Compilation, Compiler, ModuleSource, PRELUDE_PATH, PRELUDE_SOURCE,
    PackageSource,
};
pub use link::{Linker, link_program};
pub use resolve::{Resolution, Resolver};
pub use types::{DataTypeTable, Type};
