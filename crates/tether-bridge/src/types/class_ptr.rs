//! Class pointer and shared class pointer wire types
//!
//! A bound class instance crosses the boundary as its raw native pointer
//! (heap offset). Reading wraps the pointer in a host-side `Instance`; a
//! reference flagged as a value object instead takes the copy-by-value path
//! through the registered host value class. Shared-ownership instances
//! cross as a two-word {shared handle, raw pointer} pair.

use tether_abi::{BridgeError, BridgeResult, HostValue, Instance, InstanceFlags, Word};

use super::{PolicySet, TypeFlags, TypeId, TypeKind, WireType};
use crate::context::BridgeContext;
use crate::resource::ResourceId;

const POOL_ONLY: &[ResourceId] = &[ResourceId::Pool];

fn instance_flags(flags: TypeFlags) -> InstanceFlags {
    let mut out = InstanceFlags::NONE;
    if flags.contains(TypeFlags::CONST) {
        out = out.union(InstanceFlags::CONST);
    }
    if flags.contains(TypeFlags::REFERENCE) {
        out = out.union(InstanceFlags::REFERENCE);
    }
    out
}

fn check_argument(
    ctx: &BridgeContext,
    type_name: &str,
    accepts_const: bool,
    class_id: u32,
    value: &HostValue,
) -> BridgeResult<tether_abi::InstanceRef> {
    let inst = value
        .as_instance()
        .ok_or_else(|| BridgeError::mismatch(type_name, value.type_name()))?;
    let b = inst.borrow();
    if b.class_id() != class_id && !ctx.classes.derives_from(b.class_id(), class_id) {
        return Err(BridgeError::mismatch(type_name, b.class_name().to_string()));
    }
    // A const-flagged instance may only flow into const-accepting parameters
    if b.is_const() && !accepts_const {
        return Err(BridgeError::ConstViolation(format!(
            "const {} passed as mutable {}",
            b.class_name(),
            type_name
        )));
    }
    drop(b);
    Ok(inst.clone())
}

/// Pointer or reference to a bound class instance.
pub struct ClassPtrType {
    id: TypeId,
    name: String,
    class_id: u32,
    flags: TypeFlags,
}

impl ClassPtrType {
    /// Create a class pointer/reference type.
    ///
    /// The REFERENCE + VALUE_OBJECT flag combination selects the
    /// copy-by-value read path through the registered host value class
    /// instead of wrapping the pointer in place.
    pub fn new(id: TypeId, name: impl Into<String>, class_id: u32, flags: TypeFlags) -> Self {
        Self {
            id,
            name: name.into(),
            class_id,
            flags,
        }
    }

    /// Bound class id
    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    fn is_value_read(&self) -> bool {
        self.flags
            .contains(TypeFlags::REFERENCE.union(TypeFlags::VALUE_OBJECT))
    }
}

impl WireType for ClassPtrType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        if self.flags.contains(TypeFlags::REFERENCE) {
            TypeKind::Reference
        } else {
            TypeKind::Pointer
        }
    }

    fn flags(&self) -> TypeFlags {
        self.flags
    }

    fn write(
        &self,
        ctx: &mut BridgeContext,
        value: &HostValue,
        policies: PolicySet,
    ) -> BridgeResult<Word> {
        // The Nullable wrapper short-circuits before the real write runs
        if policies.contains(PolicySet::NULLABLE) && value.is_null() {
            return Ok(Word::ZERO);
        }
        let accepts_const = self.flags.contains(TypeFlags::CONST);
        let inst = check_argument(ctx, &self.name, accepts_const, self.class_id, value)?;
        let ptr = inst.borrow().ptr()?;
        Ok(Word::from_offset(ptr))
    }

    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        if self.is_value_read() {
            let class_name = ctx.classes.get(self.class_id)?.name().to_string();
            let value_class = ctx.classes.value_class(&class_name)?;
            return (value_class.from_wire)(ctx, word.as_offset());
        }
        let class_name = ctx.classes.get(self.class_id)?.name().to_string();
        let inst = Instance::new(
            self.class_id,
            class_name,
            instance_flags(self.flags),
            word.as_offset(),
        )
        .into_ref();
        ctx.track_instance(&inst);
        Ok(HostValue::Instance(inst))
    }
}

/// Reference-counted shared-ownership pointer to a bound class instance.
pub struct SharedClassPtrType {
    id: TypeId,
    name: String,
    class_id: u32,
    flags: TypeFlags,
}

impl SharedClassPtrType {
    /// Create a shared class pointer type.
    pub fn new(id: TypeId, name: impl Into<String>, class_id: u32, flags: TypeFlags) -> Self {
        Self {
            id,
            name: name.into(),
            class_id,
            flags,
        }
    }

    /// Bound class id
    pub fn class_id(&self) -> u32 {
        self.class_id
    }
}

impl WireType for SharedClassPtrType {
    fn id(&self) -> TypeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::SharedPtr
    }

    fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// The shared handle, not the raw pointer, crosses on write.
    fn write(
        &self,
        ctx: &mut BridgeContext,
        value: &HostValue,
        policies: PolicySet,
    ) -> BridgeResult<Word> {
        if policies.contains(PolicySet::NULLABLE) && value.is_null() {
            return Ok(Word::ZERO);
        }
        let accepts_const = self.flags.contains(TypeFlags::CONST);
        let inst = check_argument(ctx, &self.name, accepts_const, self.class_id, value)?;
        let shared = inst.borrow().shared()?;
        Ok(Word::from_offset(shared))
    }

    /// Reconstructs the {shared, raw} pair from two adjacent 4-byte words.
    fn read(&self, ctx: &mut BridgeContext, word: Word) -> BridgeResult<HostValue> {
        if word.is_zero() {
            return Ok(HostValue::Null);
        }
        let offset = word.as_offset();
        let shared = ctx.heap.read_u32(offset)?;
        let raw = ctx.heap.read_u32(offset + 4)?;
        let class_name = ctx.classes.get(self.class_id)?.name().to_string();
        let inst = Instance::new_shared(
            self.class_id,
            class_name,
            instance_flags(self.flags),
            raw,
            shared,
        )
        .into_ref();
        ctx.track_instance(&inst);
        ctx.gc.register(&inst);
        Ok(HostValue::Instance(inst))
    }

    fn write_resources(&self) -> &'static [ResourceId] {
        POOL_ONLY
    }
}
