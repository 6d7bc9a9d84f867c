//! Primitive and boolean wire types
//!
//! Primitives pass through the boundary as raw word bits, so they never need
//! conversion resources and are eligible for the fast caller path. The
//! canonical name of a primitive is derived from its subkind flags and byte
//! width: `char` when signless, otherwise `{u?}{float|int}{bits}_t`; 64-bit
//! integers additionally carry the BIG flag for hosts whose numeric type
//! cannot represent the full range.

use once_cell::sync::Lazy;
use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use super::{PolicySet, TypeFlags, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;

/// Structural description of one primitive: byte width plus subkind flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveSpec {
    /// Byte width (1, 2, 4, or 8)
    pub width: u8,
    /// Unsigned integer subkind
    pub unsigned: bool,
    /// Floating-point subkind
    pub float: bool,
    /// Signless character subkind
    pub signless: bool,
}

impl PrimitiveSpec {
    /// Signed integer of the given byte width
    pub const fn int(width: u8) -> Self {
        Self {
            width,
            unsigned: false,
            float: false,
            signless: false,
        }
    }

    /// Unsigned integer of the given byte width
    pub const fn uint(width: u8) -> Self {
        Self {
            width,
            unsigned: true,
            float: false,
            signless: false,
        }
    }

    /// Float of the given byte width (4 or 8)
    pub const fn float(width: u8) -> Self {
        Self {
            width,
            unsigned: false,
            float: true,
            signless: false,
        }
    }

    /// The signless character type
    pub const fn char_() -> Self {
        Self {
            width: 1,
            unsigned: false,
            float: false,
            signless: true,
        }
    }

    /// True when this is a 64-bit integer needing wide emulation on narrow hosts
    pub const fn is_big(&self) -> bool {
        self.width == 8 && !self.float
    }

    /// Derive the numeric subkind flag word
    pub fn flags(&self) -> TypeFlags {
        let mut flags = TypeFlags::NONE;
        if self.unsigned {
            flags = flags.union(TypeFlags::UNSIGNED);
        }
        if self.float {
            flags = flags.union(TypeFlags::FLOAT);
        }
        if self.signless {
            flags = flags.union(TypeFlags::SIGNLESS);
        }
        if self.is_big() {
            flags = flags.union(TypeFlags::BIG);
        }
        flags
    }
}

/// Canonical primitive name derivation: `char` when signless, else
/// `{u?}{float|int}{bits}_t`.
pub fn primitive_name(spec: &PrimitiveSpec) -> String {
    if spec.signless {
        return "char".to_string();
    }
    format!(
        "{}{}{}_t",
        if spec.unsigned { "u" } else { "" },
        if spec.float { "float" } else { "int" },
        spec.width as u32 * 8
    )
}

/// A numeric wire type.
pub struct PrimitiveType {
    id: TypeId,
    name: String,
    spec: PrimitiveSpec,
}

impl PrimitiveType {
    /// Create a primitive with its canonical derived name.
    pub fn new(id: TypeId, spec: PrimitiveSpec) -> Self {
        Self {
            id,
            name: primitive_name(&spec),
            spec,
        }
    }

    /// The structural spec
    pub fn spec(&self) -> &PrimitiveSpec {
        &self.spec
    }
}

impl WireType for PrimitiveType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Primitive
    }

    fn flags(&self) -> TypeFlags {
        self.spec.flags()
    }

    fn stride(&self) -> u32 {
        self.spec.width as u32
    }

    fn needs_conversion(&self) -> bool {
        false
    }

    fn write(
        &self,
        _ctx: &mut BridgeContext,
        value: &HostValue,
        policies: PolicySet,
    ) -> BridgeResult<Word> {
        if self.spec.float {
            if policies.contains(PolicySet::STRICT) && !matches!(value, HostValue::Float(_)) {
                return Err(BridgeError::mismatch(&self.name, value.type_name()));
            }
            let v = value
                .as_f64()
                .ok_or_else(|| BridgeError::mismatch(&self.name, value.type_name()))?;
            return Ok(if self.spec.width == 4 {
                Word::from_f32(v as f32)
            } else {
                Word::from_f64(v)
            });
        }
        if policies.contains(PolicySet::STRICT)
            && !matches!(value, HostValue::Int(_) | HostValue::UInt(_))
        {
            return Err(BridgeError::mismatch(&self.name, value.type_name()));
        }
        if self.spec.unsigned || self.spec.signless {
            let v = value
                .as_u64()
                .ok_or_else(|| BridgeError::mismatch(&self.name, value.type_name()))?;
            Ok(Word::from_u64(v & width_mask(self.spec.width)))
        } else {
            let v = value
                .as_i64()
                .ok_or_else(|| BridgeError::mismatch(&self.name, value.type_name()))?;
            Ok(Word::from_i64(v))
        }
    }

    fn read(&self, _ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if self.spec.float {
            return Ok(HostValue::Float(if self.spec.width == 4 {
                word.as_f32() as f64
            } else {
                word.as_f64()
            }));
        }
        if self.spec.signless {
            return Ok(HostValue::Int((word.as_u64() & 0xFF) as i64));
        }
        if self.spec.unsigned {
            return Ok(HostValue::UInt(word.as_u64() & width_mask(self.spec.width)));
        }
        Ok(HostValue::Int(sign_extend(word.as_u64(), self.spec.width)))
    }
}

/// The boolean wire type: 0/1 on the wire, single-byte element stride.
pub struct BooleanType {
    id: TypeId,
}

impl BooleanType {
    /// Create the boolean type
    pub fn new(id: TypeId) -> Self {
        Self { id }
    }
}

impl WireType for BooleanType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        "bool"
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Primitive
    }

    fn stride(&self) -> u32 {
        1
    }

    fn needs_conversion(&self) -> bool {
        false
    }

    fn write(
        &self,
        _ctx: &mut BridgeContext,
        value: &HostValue,
        _policies: PolicySet,
    ) -> BridgeResult<Word> {
        let v = value
            .as_bool()
            .ok_or_else(|| BridgeError::mismatch("bool", value.type_name()))?;
        Ok(Word::from_bool(v))
    }

    fn read(&self, _ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        Ok(HostValue::Bool(!word.is_zero()))
    }
}

/// The void wire type: nothing crosses in either direction.
pub struct VoidType {
    id: TypeId,
}

impl VoidType {
    /// Create the void type
    pub fn new(id: TypeId) -> Self {
        Self { id }
    }
}

impl WireType for VoidType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        "void"
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Primitive
    }

    fn needs_conversion(&self) -> bool {
        false
    }

    fn write(
        &self,
        _ctx: &mut BridgeContext,
        _value: &HostValue,
        _policies: PolicySet,
    ) -> BridgeResult<Word> {
        Ok(Word::ZERO)
    }

    fn read(&self, _ctx: &mut BridgeContext, _word: Word) -> BridgeResult<HostValue> {
        Ok(HostValue::Null)
    }
}

#[inline]
fn width_mask(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width as u32 * 8)) - 1
    }
}

#[inline]
fn sign_extend(bits: u64, width: u8) -> i64 {
    if width >= 8 {
        return bits as i64;
    }
    let shift = 64 - width as u32 * 8;
    ((bits << shift) as i64) >> shift
}

/// The canonical primitive set every context registers at init.
pub static STANDARD_PRIMITIVES: Lazy<Vec<PrimitiveSpec>> = Lazy::new(|| {
    vec![
        PrimitiveSpec::int(1),
        PrimitiveSpec::int(2),
        PrimitiveSpec::int(4),
        PrimitiveSpec::int(8),
        PrimitiveSpec::uint(1),
        PrimitiveSpec::uint(2),
        PrimitiveSpec::uint(4),
        PrimitiveSpec::uint(8),
        PrimitiveSpec::float(4),
        PrimitiveSpec::float(8),
        PrimitiveSpec::char_(),
    ]
});
