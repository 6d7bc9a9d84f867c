//! The bridge context
//!
//! One `BridgeContext` owns everything with cross-call state: the boundary
//! heap, the wire-type table, the class registry, the callback and external
//! slot tables, the deferred reclamation queue, and the bound free-function
//! table. There are no globals; embedders hold one context per native
//! module instance and tear it down explicitly.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tether_abi::{
    BoundaryHeap, BridgeError, BridgeResult, HostValue, Instance, InstanceRef, Word,
};

use crate::caller::{
    make_caller, make_method_caller, HostThunk, MethodThunk, NativeFn, OverloadMap, Signature,
};
use crate::class::{BindClass, ClassRegistry, MethodDef, MethodKind, PropertyDef};
use crate::gc::LightGc;
use crate::slots::{CallbackTable, ExternalPayload, ExternalTable};
use crate::types::{
    BooleanType, PolicySet, PrimitiveType, TypeId, TypeTable, VoidType, WireTypeRef,
    STANDARD_PRIMITIVES,
};

/// Default boundary heap capacity in bytes.
pub const DEFAULT_HEAP_CAPACITY: u32 = 1 << 16;

/// Owner of all bridge state for one native module instance.
pub struct BridgeContext {
    /// The boundary heap
    pub heap: BoundaryHeap,
    /// Registered wire types
    pub types: TypeTable,
    /// Bound classes and value classes
    pub classes: ClassRegistry,
    /// Host callbacks held on behalf of native code
    pub callbacks: CallbackTable,
    /// Externally-owned buffers and payloads
    pub externals: ExternalTable,
    /// Deferred instance reclamation queue
    pub gc: LightGc,
    functions: OverloadMap<HostThunk>,
    instances: Vec<Weak<RefCell<Instance>>>,
    next_type_id: u32,
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new(DEFAULT_HEAP_CAPACITY)
    }
}

impl BridgeContext {
    /// Create a context with a boundary heap of the given capacity. No
    /// types are registered yet; call [`register_standard_primitives`]
    /// (or register types by hand) before binding signatures.
    ///
    /// [`register_standard_primitives`]: Self::register_standard_primitives
    pub fn new(heap_capacity: u32) -> Self {
        Self {
            heap: BoundaryHeap::new(heap_capacity),
            types: TypeTable::new(),
            classes: ClassRegistry::new(),
            callbacks: CallbackTable::new(),
            externals: ExternalTable::new(),
            gc: LightGc::new(),
            functions: OverloadMap::new(),
            instances: Vec::new(),
            next_type_id: 1,
        }
    }

    // ========================================================================
    // Type registration
    // ========================================================================

    /// Hand out a fresh type id.
    pub fn alloc_type_id(&mut self) -> TypeId {
        let id = TypeId(self.next_type_id);
        self.next_type_id += 1;
        id
    }

    /// Register a wire type. Both its id and its name must be unused.
    pub fn register_type(&mut self, ty: WireTypeRef) -> BridgeResult<()> {
        // Keep allocation ahead of explicitly chosen ids
        if ty.id().0 >= self.next_type_id {
            self.next_type_id = ty.id().0 + 1;
        }
        self.types.register(ty)
    }

    /// Remove a wire type, freeing its id and name for re-registration.
    pub fn unregister_type(&mut self, id: TypeId) -> BridgeResult<()> {
        self.types.unregister(id)
    }

    /// Look up a wire type by id.
    pub fn type_by_id(&self, id: TypeId) -> BridgeResult<WireTypeRef> {
        self.types.by_id(id)
    }

    /// Look up a wire type by canonical name.
    pub fn type_by_name(&self, name: &str) -> BridgeResult<WireTypeRef> {
        self.types.by_name(name)
    }

    /// Register the canonical primitive set plus `bool` and `void`,
    /// allocating a fresh id for each. Call exactly once per context.
    pub fn register_standard_primitives(&mut self) -> BridgeResult<()> {
        for spec in STANDARD_PRIMITIVES.iter() {
            let id = self.alloc_type_id();
            self.register_type(Rc::new(PrimitiveType::new(id, *spec)))?;
        }
        let id = self.alloc_type_id();
        self.register_type(Rc::new(BooleanType::new(id)))?;
        let id = self.alloc_type_id();
        self.register_type(Rc::new(VoidType::new(id)))
    }

    // ========================================================================
    // Free functions
    // ========================================================================

    /// Bind a native free function under a name. Repeated binds of the same
    /// name with different arities become overloads.
    pub fn bind_function(
        &mut self,
        name: &str,
        sig: &Signature,
        native: NativeFn,
        policies: PolicySet,
    ) -> BridgeResult<()> {
        let thunk = make_caller(self, sig, native, policies)?;
        self.functions.add_overload(name, sig.arity(), thunk);
        Ok(())
    }

    /// Call a bound free function, selecting the overload by argument count.
    pub fn call(&mut self, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        let thunk = self.functions.resolve(name, args.len())?;
        thunk(self, args)
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Register a class shell. Methods, properties, constructors, and the
    /// destructor are bound afterwards, up until the class is finished.
    pub fn register_class(
        &mut self,
        id: u32,
        name: &str,
        supers: Vec<u32>,
    ) -> BridgeResult<()> {
        self.classes.register(BindClass::new(id, name, supers))
    }

    /// Bind a method overload on a registered class.
    pub fn bind_method(
        &mut self,
        class_id: u32,
        name: &str,
        sig: &Signature,
        native: NativeFn,
        policies: PolicySet,
        kind: MethodKind,
        is_const: bool,
        overload_slot: Option<u32>,
    ) -> BridgeResult<()> {
        let thunk = make_method_caller(
            self,
            sig,
            native,
            policies,
            kind == MethodKind::Static,
            is_const,
            overload_slot,
        )?;
        self.classes.get_mut(class_id)?.register_method(MethodDef {
            name: name.to_string(),
            sig: sig.clone(),
            kind,
            policies,
            is_const,
            thunk,
        })
    }

    /// Bind a property from optional getter and setter entry points. The
    /// getter is const; the setter is rejected on const receivers.
    pub fn bind_property(
        &mut self,
        class_id: u32,
        name: &str,
        read: Option<(Signature, NativeFn)>,
        write: Option<(Signature, NativeFn)>,
        policies: PolicySet,
    ) -> BridgeResult<()> {
        let mut def = PropertyDef {
            name: name.to_string(),
            read_sig: None,
            write_sig: None,
            getter: None,
            setter: None,
        };
        if let Some((sig, native)) = read {
            def.getter = Some(make_method_caller(
                self, &sig, native, policies, false, true, None,
            )?);
            def.read_sig = Some(sig);
        }
        if let Some((sig, native)) = write {
            def.setter = Some(make_method_caller(
                self, &sig, native, policies, false, false, None,
            )?);
            def.write_sig = Some(sig);
        }
        self.classes.get_mut(class_id)?.register_property(def)
    }

    /// Bind a constructor overload. The signature's return type is the
    /// class's pointer (or shared-pointer) wire type, so the generated
    /// thunk yields a wrapped instance.
    pub fn bind_constructor(
        &mut self,
        class_id: u32,
        sig: &Signature,
        native: NativeFn,
        policies: PolicySet,
    ) -> BridgeResult<()> {
        let thunk = make_caller(self, sig, native, policies)?;
        self.classes
            .get_mut(class_id)?
            .register_constructor(sig.arity(), thunk)
    }

    /// Bind the destructor entry point for a class.
    pub fn set_destructor(&mut self, class_id: u32, native: NativeFn) -> BridgeResult<()> {
        self.classes.get_mut(class_id)?.set_destructor(native)
    }

    /// Construct an instance of a named class, selecting the constructor
    /// overload by argument count. Finishes the class if needed.
    pub fn construct(&mut self, class_name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        let id = self.classes.get_by_name(class_name)?.id();
        self.classes.finish(id)?;
        let thunk = self.classes.get(id)?.constructor(args.len())?;
        thunk(self, args)
    }

    /// Call an instance method on a receiver. Finishes the receiver's class
    /// if needed; static entries reached through an instance dispatch
    /// without the receiver.
    pub fn call_method(
        &mut self,
        receiver: &InstanceRef,
        name: &str,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        let class_id = receiver.borrow().class_id();
        self.classes.finish(class_id)?;
        let class = self.classes.get(class_id)?;
        let entry = class
            .dispatch(name)
            .ok_or_else(|| BridgeError::NoMatchingOverload {
                name: format!("{}.{name}", class.name()),
                arity: args.len(),
            })?;
        let kind = entry.kind;
        let thunk = entry
            .overloads
            .resolve(&format!("{}.{name}", class.name()), args.len())?;
        let recv = (kind == MethodKind::Instance).then_some(receiver);
        thunk(self, recv, args)
    }

    /// Call a static method through its class name.
    pub fn call_static(
        &mut self,
        class_name: &str,
        name: &str,
        args: &[HostValue],
    ) -> BridgeResult<HostValue> {
        let class_id = self.classes.get_by_name(class_name)?.id();
        self.classes.finish(class_id)?;
        let class = self.classes.get(class_id)?;
        let qualified = format!("{class_name}.{name}");
        let entry = class
            .dispatch(name)
            .filter(|e| e.kind == MethodKind::Static)
            .ok_or_else(|| BridgeError::NoMatchingOverload {
                name: qualified.clone(),
                arity: args.len(),
            })?;
        let thunk = entry.overloads.resolve(&qualified, args.len())?;
        thunk(self, None, args)
    }

    /// Read a property, searching the receiver's inheritance graph.
    pub fn get_property(&mut self, receiver: &InstanceRef, name: &str) -> BridgeResult<HostValue> {
        let class_id = receiver.borrow().class_id();
        let (getter, _) = self.find_property(class_id, name)?;
        let getter = getter.ok_or_else(|| BridgeError::NoMatchingOverload {
            name: format!("get {name}"),
            arity: 0,
        })?;
        getter(self, Some(receiver), &[])
    }

    /// Write a property. Fails with `ConstViolation` on const receivers.
    pub fn set_property(
        &mut self,
        receiver: &InstanceRef,
        name: &str,
        value: HostValue,
    ) -> BridgeResult<()> {
        let class_id = receiver.borrow().class_id();
        let (_, setter) = self.find_property(class_id, name)?;
        let setter = setter.ok_or_else(|| BridgeError::NoMatchingOverload {
            name: format!("set {name}"),
            arity: 1,
        })?;
        setter(self, Some(receiver), &[value])?;
        Ok(())
    }

    /// Walk the inheritance graph for a property, closest class first.
    fn find_property(
        &self,
        class_id: u32,
        name: &str,
    ) -> BridgeResult<(Option<MethodThunk>, Option<MethodThunk>)> {
        let mut pending = std::collections::VecDeque::from([class_id]);
        let mut seen = rustc_hash::FxHashSet::default();
        while let Some(id) = pending.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let class = self.classes.get(id)?;
            if let Some(prop) = class.property(name) {
                return Ok((prop.getter.clone(), prop.setter.clone()));
            }
            // Breadth-first in declaration order, so the closest class wins
            // and ties fall to the earlier-declared superclass
            pending.extend(class.supers().iter().copied());
        }
        Err(BridgeError::NoMatchingOverload {
            name: format!("property {name}"),
            arity: 0,
        })
    }

    // ========================================================================
    // Instance lifecycle
    // ========================================================================

    /// Record an instance for teardown invalidation. Wire types call this
    /// for every instance they wrap.
    pub fn track_instance(&mut self, instance: &InstanceRef) {
        self.instances.push(Rc::downgrade(instance));
    }

    /// Run the destructor for an instance and mark it deleted. Freeing an
    /// already-deleted instance is a no-op, so host-side finalizers racing
    /// an explicit free are harmless.
    pub fn free_instance(&mut self, instance: &InstanceRef) -> BridgeResult<()> {
        let (class_id, word) = {
            let inst = instance.borrow();
            if inst.is_deleted() {
                return Ok(());
            }
            // Shared instances are released through their shared handle
            let word = if inst.is_shared() {
                Word::from_offset(inst.shared()?)
            } else {
                Word::from_offset(inst.ptr()?)
            };
            (inst.class_id(), word)
        };
        let destructor = self.classes.get(class_id)?.destructor().cloned();
        if let Some(destructor) = destructor {
            destructor(self, &[word])?;
        }
        instance.borrow_mut().mark_deleted();
        Ok(())
    }

    /// Exempt an instance from deferred reclamation.
    pub fn persist(&mut self, instance: &InstanceRef) {
        instance.borrow_mut().persist();
    }

    /// Sweep the deferred-reclamation queue if a sweep is due. Persistent
    /// and already-deleted instances are skipped; destructor failures
    /// propagate. Returns the number of instances freed.
    pub fn run_pending_sweep(&mut self) -> BridgeResult<usize> {
        let Some(batch) = self.gc.take_pending() else {
            return Ok(0);
        };
        let mut freed = 0;
        for instance in batch {
            let skip = {
                let inst = instance.borrow();
                inst.is_deleted() || inst.is_persistent()
            };
            if skip {
                continue;
            }
            self.free_instance(&instance)?;
            freed += 1;
        }
        Ok(freed)
    }

    /// Invalidate every tracked instance without running destructors. The
    /// native side owns teardown of its own memory; this only fences off
    /// stale host references.
    pub fn teardown(&mut self) {
        for weak in std::mem::take(&mut self.instances) {
            if let Some(instance) = weak.upgrade() {
                instance.borrow_mut().mark_deleted();
            }
        }
        self.gc.take_pending();
    }

    // ========================================================================
    // Slot tables
    // ========================================================================

    /// Copy a mirrored buffer's boundary-resident bytes back into its host
    /// buffer. Native code calls this after mutating the copy in place.
    pub fn commit_buffer(&mut self, handle: u32) -> BridgeResult<()> {
        let external = self
            .externals
            .get(handle)
            .ok_or(BridgeError::BadHandle(handle))?;
        match &external.payload {
            ExternalPayload::Buffer {
                host,
                native_ptr,
                len,
            } => {
                let bytes = self.heap.read_bytes(*native_ptr, *len)?;
                let mut host = host.borrow_mut();
                host.clear();
                host.extend_from_slice(bytes);
                Ok(())
            }
            ExternalPayload::Opaque => Err(BridgeError::mismatch(
                "buffer external",
                "opaque external",
            )),
        }
    }

    /// Drop one reference to an external slot, running its cleanup hook
    /// when the count reaches zero.
    pub fn release_external(&mut self, handle: u32) -> BridgeResult<()> {
        if let Some(external) = self.externals.release(handle)? {
            if let Some(cleanup) = external.cleanup {
                cleanup();
            }
        }
        Ok(())
    }

    /// Drop one reference to a callback slot.
    pub fn release_callback(&mut self, handle: u32) -> BridgeResult<()> {
        self.callbacks.release(handle)?;
        Ok(())
    }
}
