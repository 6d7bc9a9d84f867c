//! Buffer wire type
//!
//! A host buffer crosses the boundary as a 3-word descriptor — byte length,
//! native data pointer, external-slot handle — plus a copy of the bytes into
//! the scratch stack region. Native code reads and mutates the copy; a
//! commit entry point copies the boundary-resident bytes back into the
//! original host buffer through the external slot handle.

use tether_abi::{BridgeError, BridgeResult, HostValue, Word};

use super::{PolicySet, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;
use crate::resource::ResourceId;
use crate::slots::External;

const STACK_ONLY: &[ResourceId] = &[ResourceId::Stack];

/// Mutable host byte buffer, mirrored into native memory per call.
pub struct BufferType {
    id: TypeId,
}

impl BufferType {
    /// Create the buffer type
    pub fn new(id: TypeId) -> Self {
        Self { id }
    }
}

impl WireType for BufferType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        "Buffer"
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
        let host = match value {
            HostValue::Bytes(host) => host.clone(),
            other => return Err(BridgeError::mismatch("Buffer", other.type_name())),
        };
        let len = host.borrow().len() as u32;

        // Side-channel copy of the bytes into native memory
        let data_ptr = ctx.heap.stack_alloc(len.max(1))?;
        ctx.heap.write_bytes(data_ptr, &host.borrow())?;

        let handle = ctx.externals.register(External::buffer(host, data_ptr, len));

        // 3-word descriptor: length, data pointer, external handle
        let descriptor = ctx.heap.stack_alloc(12)?;
        ctx.heap.write_u32(descriptor, len)?;
        ctx.heap.write_u32(descriptor + 4, data_ptr)?;
        ctx.heap.write_u32(descriptor + 8, handle)?;
        Ok(Word::from_offset(descriptor))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        let descriptor = word.as_offset();
        let len = ctx.heap.read_u32(descriptor)?;
        let data_ptr = ctx.heap.read_u32(descriptor + 4)?;
        let bytes = if len == 0 {
            Vec::new()
        } else {
            ctx.heap.read_bytes(data_ptr, len)?.to_vec()
        };
        Ok(HostValue::bytes(bytes))
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        STACK_ONLY
    }
}
