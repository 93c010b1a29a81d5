//! Deterministic 32-bit hashes used as bytecode operands.
//!
//! Strings (identifiers, field names, option names, string literals) and
//! numeric constants are interned in the binary and referenced from op words
//! by hash. Hashes are XXHash64 folded to 32 bits, seeded per domain so that
//! an integer and a float with the same bit pattern never share a hash.
//!
//! # Examples
//!
//! ```
//! use oak_core::{ConstHash, StringHash};
//!
//! assert_eq!(StringHash::of("map"), StringHash::of("map"));
//! assert_ne!(ConstHash::int(1), ConstHash::float(f64::from_bits(1)));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain seeds for hash computation.
pub mod hash_constants {
    /// Seed for interned strings.
    pub const STRING: u64 = 0x1a095090689d4647;

    /// Seed for interned integer constants.
    pub const INT: u64 = 0x5ea77ffbcdf5f302;

    /// Seed for interned float constants.
    pub const FLOAT: u64 = 0x7d3c8b4a92e15f6d;
}

#[inline]
fn fold(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

/// Hash of an interned string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringHash(pub u32);

impl StringHash {
    /// Hash a string.
    #[inline]
    pub fn of(value: &str) -> Self {
        StringHash(fold(xxh64(value.as_bytes(), hash_constants::STRING)))
    }

    /// The raw 32-bit value.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StringHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringHash({:#010x})", self.0)
    }
}

/// Hash of an interned numeric constant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstHash(pub u32);

impl ConstHash {
    /// Hash an integer constant.
    #[inline]
    pub fn int(value: i64) -> Self {
        ConstHash(fold(xxh64(&value.to_le_bytes(), hash_constants::INT)))
    }

    /// Hash a float constant by its bit pattern.
    #[inline]
    pub fn float(value: f64) -> Self {
        ConstHash(fold(xxh64(
            &value.to_bits().to_le_bytes(),
            hash_constants::FLOAT,
        )))
    }

    /// The raw 32-bit value.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ConstHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstHash({:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_is_deterministic() {
        assert_eq!(StringHash::of("Oak.Base.add"), StringHash::of("Oak.Base.add"));
        assert_ne!(StringHash::of("add"), StringHash::of("sub"));
    }

    #[test]
    fn const_domains_differ() {
        let bits = 2.0f64.to_bits() as i64;
        assert_ne!(ConstHash::int(bits), ConstHash::float(2.0));
    }

    #[test]
    fn float_hash_uses_bits() {
        assert_eq!(ConstHash::float(1.25), ConstHash::float(1.25));
        assert_ne!(ConstHash::float(0.0), ConstHash::float(-0.0));
    }
}
