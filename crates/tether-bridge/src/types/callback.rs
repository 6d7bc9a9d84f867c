//! Callback wire type
//!
//! A host function crosses the boundary as an opaque numeric slot handle.
//! Writing registers the callable in the context's callback table; native
//! code later invokes it through an inverse thunk built by the caller engine
//! (see `caller::make_callback_thunk`). Reading a handle back produces the
//! registered callable.

use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use super::{PolicySet, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;

/// Host function passed into native code by slot handle.
pub struct CallbackType {
    id: TypeId,
    name: String,
}

impl CallbackType {
    /// Create a callback type under the given signature name.
    pub fn new(id: TypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl WireType for CallbackType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
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
        let f = match value {
            HostValue::Callable(f) => f.clone(),
            other => return Err(BridgeError::mismatch(&self.name, other.type_name())),
        };
        Ok(Word::from_offset(ctx.callbacks.register(f)))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        let handle = word.as_offset();
        let f = ctx
            .callbacks
            .get(handle)
            .cloned()
            .ok_or(BridgeError::BadHandle(handle))?;
        Ok(HostValue::Callable(f))
    }
}
