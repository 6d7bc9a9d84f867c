//! Vector and fixed-array wire types
//!
//! A sequence crosses the boundary as a 4-byte LE element count followed by
//! that many fixed-stride elements. Elements are stored back-to-back at the
//! element type's stride, so multi-byte elements are written through the
//! raw byte interface rather than the aligned typed interface. A fixed-size
//! array additionally knows its compile-time length and rejects writes of
//! any other length.

use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use super::{PolicySet, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;
use crate::resource::ResourceId;

const STACK_ONLY: &[ResourceId] = &[ResourceId::Stack];

fn write_sequence(
    ctx: &mut BridgeContext,
    elem_id: TypeId,
    items: &[HostValue],
    policies: PolicySet,
) -> BridgeResult<Word> {
    let elem = ctx.type_by_id(elem_id)?;
    let stride = elem.stride();
    let count = items.len() as u32;
    let offset = ctx.heap.stack_alloc(4 + count * stride)?;
    ctx.heap.write_u32(offset, count)?;
    let mut cursor = offset + 4;
    for item in items {
        let word = elem.write(ctx, item, policies)?;
        let bytes = word.to_bits().to_le_bytes();
        ctx.heap.write_bytes(cursor, &bytes[..stride as usize])?;
        cursor += stride;
    }
    Ok(Word::from_offset(offset))
}

fn read_sequence(ctx: &mut BridgeContext, elem_id: TypeId, word: Word) -> BridgeResult<HostValue> {
    if word.is_zero() {
        return Ok(HostValue::Null);
    }
    let elem = ctx.type_by_id(elem_id)?;
    let stride = elem.stride() as usize;
    let offset = word.as_offset();
    let count = ctx.heap.read_u32(offset)? as usize;
    let mut items = Vec::with_capacity(count);
    let mut cursor = offset + 4;
    for _ in 0..count {
        let raw = ctx.heap.read_bytes(cursor, stride as u32)?;
        let mut bits = [0u8; 8];
        bits[..stride].copy_from_slice(raw);
        items.push(elem.read(ctx, Word::from_bits(u64::from_le_bytes(bits)))?);
        cursor += stride as u32;
    }
    Ok(HostValue::List(items))
}

/// Variable-length sequence of a fixed element type.
pub struct VectorType {
    id: TypeId,
    name: String,
    elem: TypeId,
}

impl VectorType {
    /// Create a vector of the given element type. The element type is
    /// resolved lazily at conversion time, so registration order is free.
    pub fn new(id: TypeId, name: impl Into<String>, elem: TypeId) -> Self {
        Self {
            id,
            name: name.into(),
            elem,
        }
    }

    /// Element type id
    pub fn elem(&self) -> TypeId {
        self.elem
    }
}

impl WireType for VectorType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Vector
    }

    fn write(
        &self,
        ctx: &mut BridgeContext,
        value: &HostValue,
        policies: PolicySet,
    ) -> BridgeResult<Word> {
        if policies.contains(PolicySet::NULLABLE) && value.is_null() {
            return Ok(Word::ZERO);
        }
        let items = value
            .as_list()
            .ok_or_else(|| BridgeError::mismatch(&self.name, value.type_name()))?;
        write_sequence(ctx, self.elem, items, policies)
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        read_sequence(ctx, self.elem, word)
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        STACK_ONLY
    }
}

/// Fixed-length sequence of a fixed element type.
pub struct ArrayType {
    id: TypeId,
    name: String,
    elem: TypeId,
    len: usize,
}

impl ArrayType {
    /// Create a fixed-length array of the given element type.
    pub fn new(id: TypeId, name: impl Into<String>, elem: TypeId, len: usize) -> Self {
        Self {
            id,
            name: name.into(),
            elem,
            len,
        }
    }

    /// Compile-time-fixed element count
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for the degenerate zero-length array
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl WireType for ArrayType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Array
    }

    fn write(
        &self,
        ctx: &mut BridgeContext,
        value: &HostValue,
        policies: PolicySet,
    ) -> BridgeResult<Word> {
        if policies.contains(PolicySet::NULLABLE) && value.is_null() {
            return Ok(Word::ZERO);
        }
        let items = value
            .as_list()
            .ok_or_else(|| BridgeError::mismatch(&self.name, value.type_name()))?;
        if items.len() != self.len {
            return Err(BridgeError::mismatch(
                format!("{} (length {})", self.name, self.len),
                format!("list of length {}", items.len()),
            ));
        }
        write_sequence(ctx, self.elem, items, policies)
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        read_sequence(ctx, self.elem, word)
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        STACK_ONLY
    }
}
