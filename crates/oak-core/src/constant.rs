//! Literal constant values.

use std::fmt;

/// A literal value as written in source.
///
/// Equality is structural. Floats compare numerically here; use
/// [`Constant::key`] where a constant must act as a map key, which compares
/// floats by bit pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// `()`
    Unit,
    /// `'c'`
    Char(char),
    /// `42`, `0xff`
    Int(i64),
    /// `1.5`, `2e10`
    Float(f64),
    /// `"text"`
    String(String),
}

/// Hashable version of [`Constant`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstantKey {
    Unit,
    Char(char),
    Int(i64),
    /// Bit pattern of the float.
    Float(u64),
    String(String),
}

/// Constant kind tags as encoded in `LoadConst` operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConstantKind {
    Unit = 0,
    Char = 1,
    Int = 2,
    Float = 3,
    String = 4,
}

impl ConstantKind {
    /// Decode a kind tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ConstantKind::Unit),
            1 => Some(ConstantKind::Char),
            2 => Some(ConstantKind::Int),
            3 => Some(ConstantKind::Float),
            4 => Some(ConstantKind::String),
            _ => None,
        }
    }
}

impl Constant {
    /// Convert to the hashable key representation.
    pub fn key(&self) -> ConstantKey {
        match self {
            Constant::Unit => ConstantKey::Unit,
            Constant::Char(c) => ConstantKey::Char(*c),
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::String(s) => ConstantKey::String(s.clone()),
        }
    }

    /// The kind tag of this constant.
    pub fn kind(&self) -> ConstantKind {
        match self {
            Constant::Unit => ConstantKind::Unit,
            Constant::Char(_) => ConstantKind::Char,
            Constant::Int(_) => ConstantKind::Int,
            Constant::Float(_) => ConstantKind::Float,
            Constant::String(_) => ConstantKind::String,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Unit => write!(f, "()"),
            Constant::Char(c) => write!(f, "'{}'", c.escape_default()),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::String(s) => write!(f, "\"{}\"", s.escape_default()),
        }
    }
}
