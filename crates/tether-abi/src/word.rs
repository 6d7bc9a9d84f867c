//! Word — the flat 64-bit boundary representation carrier
//!
//! Every value crossing the native boundary travels as one `Word`: raw IEEE
//! 754 bits for floats, two's-complement bits for integers, and a
//! zero-extended 32-bit heap offset for pointers. Unlike a NaN-boxed value,
//! a `Word` carries **no tag** — the wire type at each call-site position
//! decides how its bits are interpreted, so extraction is branch-free.

/// Untagged 64-bit boundary word.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Word(u64);

impl Word {
    /// The all-zero word: null pointer, 0, 0.0, and false all share it.
    pub const ZERO: Word = Word(0);

    /// Create from raw bits
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Carry a signed integer (two's-complement bits, sign-extended to 64)
    #[inline]
    pub const fn from_i64(v: i64) -> Self {
        Self(v as u64)
    }

    /// Carry an unsigned integer
    #[inline]
    pub const fn from_u64(v: u64) -> Self {
        Self(v)
    }

    /// Carry a double (raw IEEE 754 bits)
    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self(v.to_bits())
    }

    /// Carry a single-precision float in the low 32 bits
    #[inline]
    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits() as u64)
    }

    /// Carry a boolean as 0/1
    #[inline]
    pub const fn from_bool(v: bool) -> Self {
        Self(v as u64)
    }

    /// Carry a 32-bit heap offset ("pointer"), zero-extended
    #[inline]
    pub const fn from_offset(offset: u32) -> Self {
        Self(offset as u64)
    }

    /// Interpret as a signed integer
    #[inline]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Interpret as an unsigned integer
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Interpret as a double
    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Interpret the low 32 bits as a single-precision float
    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Interpret as a boolean (any nonzero bit pattern is true)
    #[inline]
    pub const fn as_bool(self) -> bool {
        self.0 != 0
    }

    /// Interpret the low 32 bits as a heap offset
    #[inline]
    pub const fn as_offset(self) -> u32 {
        self.0 as u32
    }

    /// True when every bit is zero (the null/absent sentinel)
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Word({:#x})", self.0)
    }
}

impl From<u32> for Word {
    fn from(offset: u32) -> Self {
        Word::from_offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_word() {
        assert!(Word::ZERO.is_zero());
        assert_eq!(Word::ZERO.as_offset(), 0);
        assert!(!Word::ZERO.as_bool());
    }

    #[test]
    fn test_i64_roundtrip() {
        let w = Word::from_i64(-42);
        assert_eq!(w.as_i64(), -42);
        // Sign-extension fills the high bits
        assert_ne!(w.as_u64(), 42);
    }

    #[test]
    fn test_f64_roundtrip() {
        let w = Word::from_f64(3.25);
        assert_eq!(w.as_f64(), 3.25);
    }

    #[test]
    fn test_f32_roundtrip() {
        let w = Word::from_f32(1.5);
        assert_eq!(w.as_f32(), 1.5);
    }

    #[test]
    fn test_offset_is_low_32_bits() {
        let w = Word::from_offset(0xDEAD_BEEF);
        assert_eq!(w.as_offset(), 0xDEAD_BEEF);
        assert_eq!(w.as_u64(), 0xDEAD_BEEF);
    }
}
