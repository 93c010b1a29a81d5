//! Bytecode model.
//!
//! This module contains:
//! - [`Op`]: one 64-bit operation word and its tags
//! - [`Binary`]: interned tables, function table and exports, with the
//!   on-disk reader and writer
//! - [`verify`]: structural checks run after linking

mod binary;
mod op;
mod verify;

use thiserror::Error;

use oak_core::OakError;

pub use binary::{Binary, BinaryFlags, COMPILER_VERSION, FORMAT_VERSION, Func, NumericConstant};
pub use op::{ObjectKind, Op, OpKind, PatternKind, StackKind, SwapPopMode};
pub use verify::verify;

/// Errors reading or writing a binary.
#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("not an oak binary")]
    BadMagic,

    #[error("unsupported bytecode format {0}")]
    UnsupportedFormat(u32),

    #[error("unexpected end of file at offset {0}")]
    UnexpectedEof(usize),

    #[error("malformed binary at offset {offset}: {message}")]
    Malformed { offset: usize, message: String },

    #[error("unknown op word {0:#018x}")]
    UnknownOp(u64),

    #[error("interned hash collision between {0}")]
    HashCollision(String),

    #[error("table of {0} entries does not fit the format")]
    TooLarge(usize),
}

impl From<BinaryError> for OakError {
    fn from(err: BinaryError) -> Self {
        OakError::System(err.to_string())
    }
}

/// A structural defect found by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("function {function}{}: {message}", op.map(|at| format!(" op {at}")).unwrap_or_default())]
pub struct VerifyError {
    pub function: u32,
    pub op: Option<usize>,
    pub message: String,
}

impl From<VerifyError> for OakError {
    fn from(err: VerifyError) -> Self {
        OakError::Internal(format!("invalid bytecode: {err}"))
    }
}
