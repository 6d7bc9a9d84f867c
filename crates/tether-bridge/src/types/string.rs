//! String wire types
//!
//! `String` crosses the boundary length-prefixed (4-byte LE length, raw
//! UTF-8 bytes, an uncounted NUL); `CString` crosses as a bare
//! zero-terminated buffer. Both materialize their bytes in the scratch
//! stack region, so both require the Stack resource on write.

use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use super::{PolicySet, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;
use crate::resource::ResourceId;

const STACK_ONLY: &[ResourceId] = &[ResourceId::Stack];

/// Length-prefixed UTF-8 string.
pub struct StringType {
    id: TypeId,
}

impl StringType {
    /// Create the length-prefixed string type
    pub fn new(id: TypeId) -> Self {
        Self { id }
    }
}

impl WireType for StringType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        "String"
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Other
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
        let s = value
            .as_str()
            .ok_or_else(|| BridgeError::mismatch("String", value.type_name()))?;
        let offset = ctx.heap.stack_push_string(s)?;
        Ok(Word::from_offset(offset))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        Ok(HostValue::Str(ctx.heap.read_string(word.as_offset())?))
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        STACK_ONLY
    }
}

/// Bare zero-terminated UTF-8 string.
pub struct CStringType {
    id: TypeId,
}

impl CStringType {
    /// Create the zero-terminated string type
    pub fn new(id: TypeId) -> Self {
        Self { id }
    }
}

impl WireType for CStringType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        "CString"
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Other
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
        let s = value
            .as_str()
            .ok_or_else(|| BridgeError::mismatch("CString", value.type_name()))?;
        let offset = ctx.heap.stack_push_cstring(s)?;
        Ok(Word::from_offset(offset))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        Ok(HostValue::Str(ctx.heap.read_cstring(word.as_offset())?))
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        STACK_ONLY
    }
}
