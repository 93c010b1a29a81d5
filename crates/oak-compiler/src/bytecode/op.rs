//! Bytecode operations.
//!
//! Every op is one 64-bit word. The low byte is the [`OpKind`] tag, the
//! remaining bits carry operands:
//!
//! | Kind | Operand bits |
//! |---|---|
//! | `LoadLocal` | 8..40 name hash |
//! | `LoadGlobal` | 8..40 function pointer |
//! | `LoadConst` | 8..16 stack, 16..24 constant kind, 32..64 value |
//! | `Apply` | 8..16 argument count |
//! | `Call` | 8..40 name hash, 40..48 argument count |
//! | `Match`, `Jump` | 8..40 jump delta |
//! | `MakeObject` | 8..16 object kind, 16..24 count |
//! | `MakePattern` | 8..16 pattern kind, 16..48 name hash, 48..56 nested count |
//! | `Access`, `Update` | 8..40 field hash |
//! | `SwapPop` | 8..16 mode |
//!
//! Jump deltas count ops from the one following the `Match`/`Jump`.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use oak_core::{ConstantKind, StringHash};

use super::BinaryError;

/// Op tag stored in the low byte of the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OpKind {
    // =========================================================================
    // Loads
    // =========================================================================
    /// Push the value bound to a local name.
    LoadLocal = 1,
    /// Push a closure over a function, or its value when it takes no
    /// arguments.
    LoadGlobal = 2,
    /// Push a constant onto the object or pattern stack.
    LoadConst = 3,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Pop a callee and `n` arguments and apply; under-application leaves a
    /// closure.
    Apply = 4,
    /// Call a runtime-provided function by name.
    Call = 5,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Pop a pattern and match it against the top object, skipping `delta`
    /// ops on mismatch.
    Match = 6,
    /// Skip `delta` ops.
    Jump = 7,

    // =========================================================================
    // Construction
    // =========================================================================
    MakeObject = 8,
    MakePattern = 9,

    // =========================================================================
    // Records
    // =========================================================================
    Access = 10,
    Update = 11,

    // =========================================================================
    // Stack
    // =========================================================================
    SwapPop = 12,
}

/// Target stack of a `LoadConst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StackKind {
    Object = 0,
    Pattern = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ObjectKind {
    List = 0,
    Tuple = 1,
    /// `(value, name)` pairs, name on top.
    Record = 2,
    /// Option name on top, arguments below.
    Data = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PatternKind {
    Alias = 0,
    Any = 1,
    Cons = 2,
    /// Reserved; constant patterns are pushed with `LoadConst`.
    Const = 3,
    Data = 4,
    List = 5,
    Named = 6,
    /// Field names are pushed as string constants on the pattern stack.
    Record = 7,
    Tuple = 8,
}

impl PatternKind {
    /// Whether the name operand refers to the string table.
    pub fn is_named(self) -> bool {
        matches!(self, PatternKind::Alias | PatternKind::Data | PatternKind::Named)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SwapPopMode {
    /// Keep the top value, drop the one beneath it.
    Both = 0,
    /// Drop the top value.
    Pop = 1,
}

/// A decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    LoadLocal(StringHash),
    LoadGlobal(u32),
    /// `value` is the scalar for `Unit` and `Char`, a [`oak_core::ConstHash`]
    /// for `Int` and `Float`, a [`StringHash`] for `String`.
    LoadConst {
        stack: StackKind,
        kind: ConstantKind,
        value: u32,
    },
    Apply(u8),
    Call {
        name: StringHash,
        num_args: u8,
    },
    Match(u32),
    Jump(u32),
    MakeObject {
        kind: ObjectKind,
        count: u8,
    },
    MakePattern {
        kind: PatternKind,
        name: StringHash,
        nested: u8,
    },
    Access(StringHash),
    Update(StringHash),
    SwapPop(SwapPopMode),
}

#[inline]
fn field(word: u64, shift: u32, bits: u32) -> u64 {
    (word >> shift) & ((1u64 << bits) - 1)
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::LoadLocal(_) => OpKind::LoadLocal,
            Op::LoadGlobal(_) => OpKind::LoadGlobal,
            Op::LoadConst { .. } => OpKind::LoadConst,
            Op::Apply(_) => OpKind::Apply,
            Op::Call { .. } => OpKind::Call,
            Op::Match(_) => OpKind::Match,
            Op::Jump(_) => OpKind::Jump,
            Op::MakeObject { .. } => OpKind::MakeObject,
            Op::MakePattern { .. } => OpKind::MakePattern,
            Op::Access(_) => OpKind::Access,
            Op::Update(_) => OpKind::Update,
            Op::SwapPop(_) => OpKind::SwapPop,
        }
    }

    /// Pack into a 64-bit word.
    pub fn encode(&self) -> u64 {
        let tag = u8::from(self.kind()) as u64;
        let operands = match *self {
            Op::LoadLocal(name) | Op::Access(name) | Op::Update(name) => {
                (name.to_u32() as u64) << 8
            }
            Op::LoadGlobal(pointer) => (pointer as u64) << 8,
            Op::LoadConst { stack, kind, value } => {
                (u8::from(stack) as u64) << 8 | (kind as u8 as u64) << 16 | (value as u64) << 32
            }
            Op::Apply(num_args) => (num_args as u64) << 8,
            Op::Call { name, num_args } => (name.to_u32() as u64) << 8 | (num_args as u64) << 40,
            Op::Match(delta) | Op::Jump(delta) => (delta as u64) << 8,
            Op::MakeObject { kind, count } => (u8::from(kind) as u64) << 8 | (count as u64) << 16,
            Op::MakePattern { kind, name, nested } => {
                (u8::from(kind) as u64) << 8
                    | (name.to_u32() as u64) << 16
                    | (nested as u64) << 48
            }
            Op::SwapPop(mode) => (u8::from(mode) as u64) << 8,
        };
        tag | operands
    }

    /// Unpack a 64-bit word.
    pub fn decode(word: u64) -> Result<Op, BinaryError> {
        let tag = (word & 0xff) as u8;
        let kind = OpKind::try_from(tag).map_err(|_| BinaryError::UnknownOp(word))?;
        let hash = |shift| StringHash(field(word, shift, 32) as u32);
        let byte = |shift| field(word, shift, 8) as u8;
        let op = match kind {
            OpKind::LoadLocal => Op::LoadLocal(hash(8)),
            OpKind::LoadGlobal => Op::LoadGlobal(field(word, 8, 32) as u32),
            OpKind::LoadConst => Op::LoadConst {
                stack: StackKind::try_from(byte(8)).map_err(|_| BinaryError::UnknownOp(word))?,
                kind: ConstantKind::from_u8(byte(16)).ok_or(BinaryError::UnknownOp(word))?,
                value: field(word, 32, 32) as u32,
            },
            OpKind::Apply => Op::Apply(byte(8)),
            OpKind::Call => Op::Call {
                name: hash(8),
                num_args: byte(40),
            },
            OpKind::Match => Op::Match(field(word, 8, 32) as u32),
            OpKind::Jump => Op::Jump(field(word, 8, 32) as u32),
            OpKind::MakeObject => Op::MakeObject {
                kind: ObjectKind::try_from(byte(8)).map_err(|_| BinaryError::UnknownOp(word))?,
                count: byte(16),
            },
            OpKind::MakePattern => Op::MakePattern {
                kind: PatternKind::try_from(byte(8)).map_err(|_| BinaryError::UnknownOp(word))?,
                name: hash(16),
                nested: byte(48),
            },
            OpKind::Access => Op::Access(hash(8)),
            OpKind::Update => Op::Update(hash(8)),
            OpKind::SwapPop => {
                Op::SwapPop(SwapPopMode::try_from(byte(8)).map_err(|_| BinaryError::UnknownOp(word))?)
            }
        };
        Ok(op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::LoadLocal(name) => write!(f, "LoadLocal {:#010x}", name.to_u32()),
            Op::LoadGlobal(pointer) => write!(f, "LoadGlobal {pointer}"),
            Op::LoadConst { stack, kind, value } => {
                write!(f, "LoadConst {stack:?} {kind:?} {value:#010x}")
            }
            Op::Apply(n) => write!(f, "Apply {n}"),
            Op::Call { name, num_args } => write!(f, "Call {:#010x} {num_args}", name.to_u32()),
            Op::Match(delta) => write!(f, "Match +{delta}"),
            Op::Jump(delta) => write!(f, "Jump +{delta}"),
            Op::MakeObject { kind, count } => write!(f, "MakeObject {kind:?} {count}"),
            Op::MakePattern { kind, name, nested } => {
                write!(f, "MakePattern {kind:?} {:#010x} {nested}", name.to_u32())
            }
            Op::Access(name) => write!(f, "Access {:#010x}", name.to_u32()),
            Op::Update(name) => write!(f, "Update {:#010x}", name.to_u32()),
            Op::SwapPop(mode) => write!(f, "SwapPop {mode:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_low_byte() {
        assert_eq!(Op::LoadGlobal(7).encode(), 2 | 7 << 8);
        assert_eq!(Op::SwapPop(SwapPopMode::Pop).encode(), 12 | 1 << 8);
        assert_eq!(Op::Apply(3).encode() & 0xff, 4);
    }

    #[test]
    fn operand_layout() {
        let word = Op::Call {
            name: StringHash(0xdead_beef),
            num_args: 2,
        }
        .encode();
        assert_eq!(word, 5 | 0xdead_beef << 8 | 2 << 40);

        let word = Op::LoadConst {
            stack: StackKind::Pattern,
            kind: ConstantKind::Char,
            value: 'x' as u32,
        }
        .encode();
        assert_eq!(word, 3 | 1 << 8 | 1 << 16 | ('x' as u64) << 32);

        let word = Op::MakePattern {
            kind: PatternKind::Data,
            name: StringHash(0xffff_ffff),
            nested: 1,
        }
        .encode();
        assert_eq!(word, 9 | 4 << 8 | 0xffff_ffff << 16 | 1 << 48);
    }

    #[test]
    fn decode_inverts_encode_for_every_kind() {
        let ops = [
            Op::LoadLocal(StringHash(1)),
            Op::LoadGlobal(u32::MAX),
            Op::LoadConst {
                stack: StackKind::Object,
                kind: ConstantKind::Float,
                value: 0x8000_0001,
            },
            Op::Apply(255),
            Op::Call {
                name: StringHash(9),
                num_args: 1,
            },
            Op::Match(4),
            Op::Jump(0),
            Op::MakeObject {
                kind: ObjectKind::Record,
                count: 2,
            },
            Op::MakePattern {
                kind: PatternKind::Cons,
                name: StringHash(0),
                nested: 2,
            },
            Op::Access(StringHash(3)),
            Op::Update(StringHash(3)),
            Op::SwapPop(SwapPopMode::Both),
        ];
        for op in ops {
            assert_eq!(Op::decode(op.encode()).unwrap(), op);
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(matches!(Op::decode(0), Err(BinaryError::UnknownOp(0))));
        assert!(matches!(Op::decode(13), Err(BinaryError::UnknownOp(13))));
        // SwapPop with mode 2
        assert!(Op::decode(12 | 2 << 8).is_err());
    }
}
