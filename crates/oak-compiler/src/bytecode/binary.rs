//! The linked program and its file format.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! "OAKB" u16 major u16 minor u32 format u32 flags
//! u32 count { u32 len, utf-8 }                      strings
//! u32 count { u8 kind (1 int, 2 float), 8 bytes }   constants
//! u32 count { u32 num_args, u32 ops_count, u64 ops[],
//!             if debug: u32 file_hash, u32 count, { u32 start, u32 end } }
//! u32 count { string, u32 function }                exports, sorted by name
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use oak_core::{ConstHash, StringHash};

use super::{BinaryError, Op};

const MAGIC: &[u8; 4] = b"OAKB";

/// Version of the op encoding and file layout.
pub const FORMAT_VERSION: u32 = 1;

/// Compiler version written into the header.
pub const COMPILER_VERSION: (u16, u16) = (0, 1);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BinaryFlags: u32 {
        /// Per-op source locations are present.
        const DEBUG = 1 << 0;
    }
}

/// An interned numeric constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericConstant {
    Int(i64),
    Float(f64),
}

impl NumericConstant {
    pub fn hash(&self) -> ConstHash {
        match *self {
            NumericConstant::Int(v) => ConstHash::int(v),
            NumericConstant::Float(v) => ConstHash::float(v),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            NumericConstant::Int(_) => 1,
            NumericConstant::Float(_) => 2,
        }
    }

    fn bits(&self) -> u64 {
        match *self {
            NumericConstant::Int(v) => v as u64,
            NumericConstant::Float(v) => v.to_bits(),
        }
    }

    fn same(&self, other: &NumericConstant) -> bool {
        self.tag() == other.tag() && self.bits() == other.bits()
    }
}

/// One entry of the function table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Func {
    pub num_args: u32,
    pub ops: Vec<Op>,
    /// Hash of the defining file's path, debug builds only.
    pub file_path: Option<StringHash>,
    /// `(start, end)` byte offsets, one per op in debug builds.
    pub locations: Vec<(u32, u32)>,
}

/// A whole program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binary {
    pub version: (u16, u16),
    pub flags: BinaryFlags,
    strings: Vec<String>,
    string_index: FxHashMap<StringHash, u32>,
    constants: Vec<NumericConstant>,
    constant_index: FxHashMap<ConstHash, u32>,
    pub funcs: Vec<Func>,
    /// Full definition name to function pointer.
    pub exports: BTreeMap<String, u32>,
}

impl Binary {
    pub fn new(flags: BinaryFlags) -> Self {
        Self {
            version: COMPILER_VERSION,
            flags,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_debug(&self) -> bool {
        self.flags.contains(BinaryFlags::DEBUG)
    }

    /// Intern a string, returning its hash.
    pub fn intern_string(&mut self, value: &str) -> Result<StringHash, BinaryError> {
        let hash = StringHash::of(value);
        if let Some(&index) = self.string_index.get(&hash) {
            if self.strings[index as usize] != value {
                return Err(BinaryError::HashCollision(format!(
                    "'{}' and '{value}'",
                    self.strings[index as usize]
                )));
            }
            return Ok(hash);
        }
        self.string_index.insert(hash, self.strings.len() as u32);
        self.strings.push(value.to_string());
        Ok(hash)
    }

    /// Intern a numeric constant, returning its hash.
    pub fn intern_constant(&mut self, value: NumericConstant) -> Result<ConstHash, BinaryError> {
        let hash = value.hash();
        if let Some(&index) = self.constant_index.get(&hash) {
            if !self.constants[index as usize].same(&value) {
                return Err(BinaryError::HashCollision(format!(
                    "{:?} and {value:?}",
                    self.constants[index as usize]
                )));
            }
            return Ok(hash);
        }
        self.constant_index.insert(hash, self.constants.len() as u32);
        self.constants.push(value);
        Ok(hash)
    }

    pub fn string(&self, hash: StringHash) -> Option<&str> {
        self.string_index
            .get(&hash)
            .map(|&i| self.strings[i as usize].as_str())
    }

    pub fn constant(&self, hash: ConstHash) -> Option<NumericConstant> {
        self.constant_index
            .get(&hash)
            .map(|&i| self.constants[i as usize])
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn constants(&self) -> &[NumericConstant] {
        &self.constants
    }

    /// Pointer of an exported definition.
    pub fn export(&self, name: &str) -> Option<u32> {
        self.exports.get(name).copied()
    }

    /// Serialize.
    pub fn write(&self) -> Result<Vec<u8>, BinaryError> {
        let mut enc = Encoder::default();
        enc.bytes(MAGIC);
        enc.u16(self.version.0);
        enc.u16(self.version.1);
        enc.u32(FORMAT_VERSION);
        enc.u32(self.flags.bits());

        enc.len(self.strings.len())?;
        for s in &self.strings {
            enc.string(s)?;
        }

        enc.len(self.constants.len())?;
        for c in &self.constants {
            enc.u8(c.tag());
            enc.u64(c.bits());
        }

        enc.len(self.funcs.len())?;
        for func in &self.funcs {
            enc.u32(func.num_args);
            enc.len(func.ops.len())?;
            for op in &func.ops {
                enc.u64(op.encode());
            }
            if self.is_debug() {
                enc.u32(func.file_path.map_or(0, StringHash::to_u32));
                enc.len(func.locations.len())?;
                for &(start, end) in &func.locations {
                    enc.u32(start);
                    enc.u32(end);
                }
            }
        }

        enc.len(self.exports.len())?;
        for (name, pointer) in &self.exports {
            enc.string(name)?;
            enc.u32(*pointer);
        }
        Ok(enc.buf)
    }

    /// Deserialize.
    pub fn read(bytes: &[u8]) -> Result<Binary, BinaryError> {
        let mut dec = Decoder { bytes, pos: 0 };
        if dec.take(4)? != MAGIC {
            return Err(BinaryError::BadMagic);
        }
        let version = (dec.u16()?, dec.u16()?);
        let format = dec.u32()?;
        if format != FORMAT_VERSION {
            return Err(BinaryError::UnsupportedFormat(format));
        }
        let flags = BinaryFlags::from_bits(dec.u32()?).ok_or(dec.malformed("unknown flags"))?;

        let mut binary = Binary {
            version,
            flags,
            ..Binary::default()
        };

        for _ in 0..dec.u32()? {
            let s = dec.string()?;
            binary.intern_string(&s)?;
        }

        for _ in 0..dec.u32()? {
            let constant = match dec.u8()? {
                1 => NumericConstant::Int(dec.u64()? as i64),
                2 => NumericConstant::Float(f64::from_bits(dec.u64()?)),
                other => return Err(dec.malformed(&format!("unknown constant kind {other}"))),
            };
            binary.intern_constant(constant)?;
        }

        for _ in 0..dec.u32()? {
            let num_args = dec.u32()?;
            let ops = (0..dec.u32()?)
                .map(|_| dec.u64().and_then(Op::decode))
                .collect::<Result<Vec<_>, _>>()?;
            let mut func = Func {
                num_args,
                ops,
                ..Func::default()
            };
            if binary.is_debug() {
                func.file_path = Some(StringHash(dec.u32()?));
                func.locations = (0..dec.u32()?)
                    .map(|_| -> Result<(u32, u32), BinaryError> { Ok((dec.u32()?, dec.u32()?)) })
                    .collect::<Result<Vec<_>, _>>()?;
            }
            binary.funcs.push(func);
        }

        for _ in 0..dec.u32()? {
            let name = dec.string()?;
            let pointer = dec.u32()?;
            binary.exports.insert(name, pointer);
        }

        if dec.pos != bytes.len() {
            return Err(dec.malformed("trailing bytes"));
        }
        Ok(binary)
    }
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    fn len(&mut self, len: usize) -> Result<(), BinaryError> {
        let len = u32::try_from(len).map_err(|_| BinaryError::TooLarge(len))?;
        self.u32(len);
        Ok(())
    }

    fn string(&mut self, s: &str) -> Result<(), BinaryError> {
        self.len(s.len())?;
        self.bytes(s.as_bytes());
        Ok(())
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn malformed(&self, message: &str) -> BinaryError {
        BinaryError::Malformed {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BinaryError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(BinaryError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BinaryError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, BinaryError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, BinaryError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, BinaryError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, BinaryError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String, BinaryError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.malformed("invalid utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::SwapPopMode;

    fn sample(flags: BinaryFlags) -> Binary {
        let mut binary = Binary::new(flags);
        let name = binary.intern_string("x").unwrap();
        binary.intern_constant(NumericConstant::Int(42)).unwrap();
        binary.intern_constant(NumericConstant::Float(0.5)).unwrap();
        let file = binary.intern_string("src/M.oak").unwrap();
        binary.funcs.push(Func {
            num_args: 1,
            ops: vec![Op::LoadLocal(name), Op::SwapPop(SwapPopMode::Pop)],
            file_path: flags.contains(BinaryFlags::DEBUG).then_some(file),
            locations: if flags.contains(BinaryFlags::DEBUG) {
                vec![(0, 1), (2, 3)]
            } else {
                Vec::new()
            },
        });
        binary.exports.insert("M.f".into(), 0);
        binary
    }

    #[test]
    fn header_layout() {
        let bytes = sample(BinaryFlags::empty()).write().unwrap();
        assert_eq!(&bytes[0..4], b"OAKB");
        assert_eq!(&bytes[8..12], &FORMAT_VERSION.to_le_bytes());
        assert_eq!(&bytes[12..16], &0u32.to_le_bytes());
    }

    #[test]
    fn read_restores_tables() {
        for flags in [BinaryFlags::empty(), BinaryFlags::DEBUG] {
            let binary = sample(flags);
            let read = Binary::read(&binary.write().unwrap()).unwrap();
            assert_eq!(read, binary);
            assert_eq!(read.string(StringHash::of("x")), Some("x"));
            assert_eq!(
                read.constant(ConstHash::int(42)),
                Some(NumericConstant::Int(42))
            );
            assert_eq!(read.export("M.f"), Some(0));
        }
    }

    #[test]
    fn interning_deduplicates() {
        let mut binary = Binary::new(BinaryFlags::empty());
        let a = binary.intern_string("a").unwrap();
        assert_eq!(binary.intern_string("a").unwrap(), a);
        binary.intern_constant(NumericConstant::Int(1)).unwrap();
        binary.intern_constant(NumericConstant::Int(1)).unwrap();
        assert_eq!(binary.strings().len(), 1);
        assert_eq!(binary.constants().len(), 1);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(Binary::read(b"NOPE"), Err(BinaryError::BadMagic)));
        assert!(matches!(Binary::read(b"OA"), Err(BinaryError::UnexpectedEof(0))));

        let mut bytes = sample(BinaryFlags::empty()).write().unwrap();
        bytes[8] = 9;
        assert!(matches!(
            Binary::read(&bytes),
            Err(BinaryError::UnsupportedFormat(9))
        ));

        let mut bytes = sample(BinaryFlags::empty()).write().unwrap();
        bytes.push(0);
        assert!(matches!(Binary::read(&bytes), Err(BinaryError::Malformed { .. })));
    }
}
