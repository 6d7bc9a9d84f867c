//! Value-object wire type
//!
//! A value object is copied by value across the boundary through an explicit
//! host-side constructor rather than wrapped by pointer. The host class is
//! registered by name in the class registry; a read conversion without a
//! registered host class fails with `MissingValueClass`.

use tether_abi::{BridgeResult, HostValue, Word};

use super::{PolicySet, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;
use crate::resource::ResourceId;

const POOL_ONLY: &[ResourceId] = &[ResourceId::Pool];

/// Type copied by value through a registered host value class.
pub struct ValueObjectType {
    id: TypeId,
    name: String,
    class_name: String,
}

impl ValueObjectType {
    /// Create a value-object type bound to the named host value class.
    pub fn new(id: TypeId, name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class_name: class_name.into(),
        }
    }

    /// Name of the host value class this type converts through
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl WireType for ValueObjectType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Class
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
        let value_class = ctx.classes.value_class(&self.class_name)?;
        let offset = (value_class.to_wire)(ctx, value)?;
        Ok(Word::from_offset(offset))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        let value_class = ctx.classes.value_class(&self.class_name)?;
        (value_class.from_wire)(ctx, word.as_offset())
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        POOL_ONLY
    }

    fn read_resources(&self) -> &'static [ResourceId] {
        POOL_ONLY
    }
}
