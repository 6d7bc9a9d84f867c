//! Wrapper instance state — the host-side handle to a native object
//!
//! An `Instance` holds a native flags word, a lifecycle state, a raw native
//! pointer (heap offset) and, for shared-ownership instances, a shared
//! handle distinct from the raw pointer. Once an instance is freed, its
//! pointer and shared-handle accessors fail with `UseAfterFree` so stale
//! host references are caught instead of reading reclaimed memory.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BridgeError, BridgeResult};

/// Native flags word: const-ness and pointer/reference/shared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceFlags(u8);

impl InstanceFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// The native object is const; mutable use is a `ConstViolation`
    pub const CONST: Self = Self(0x01);
    /// Bound as a reference rather than a pointer
    pub const REFERENCE: Self = Self(0x02);
    /// Owned through a reference-counted shared handle
    pub const SHARED: Self = Self(0x04);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check whether all of `other`'s bits are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of two flag sets
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Lifecycle state of a wrapper instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Freshly constructed, eligible for deferred collection
    #[default]
    None,
    /// Exempt from automatic collection; freed explicitly or never
    Persistent,
    /// Destructor has run; pointer and shared handle are inaccessible
    Deleted,
}

/// Host-side wrapper around one native object.
#[derive(Debug)]
pub struct Instance {
    class_id: u32,
    class_name: String,
    flags: InstanceFlags,
    state: Lifecycle,
    ptr: u32,
    shared: u32,
}

/// Shared handle to an instance; the class system, GC, and wire types all
/// hold these. Single-threaded by design, hence `Rc<RefCell<...>>`.
pub type InstanceRef = Rc<RefCell<Instance>>;

impl Instance {
    /// Create a plain pointer/reference instance.
    pub fn new(class_id: u32, class_name: impl Into<String>, flags: InstanceFlags, ptr: u32) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            flags,
            state: Lifecycle::None,
            ptr,
            shared: 0,
        }
    }

    /// Create a shared-ownership instance with a shared handle distinct from
    /// the raw pointer.
    pub fn new_shared(
        class_id: u32,
        class_name: impl Into<String>,
        flags: InstanceFlags,
        ptr: u32,
        shared: u32,
    ) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            flags: flags.union(InstanceFlags::SHARED),
            state: Lifecycle::None,
            ptr,
            shared,
        }
    }

    /// Wrap into the shared reference form
    pub fn into_ref(self) -> InstanceRef {
        Rc::new(RefCell::new(self))
    }

    /// Class id of the bound native class
    pub fn class_id(&self) -> u32 {
        self.class_id
    }

    /// Class name (for diagnostics and type checks)
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Native flags word
    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    /// True when the native object is const-flagged
    pub fn is_const(&self) -> bool {
        self.flags.contains(InstanceFlags::CONST)
    }

    /// True when owned through a shared handle
    pub fn is_shared(&self) -> bool {
        self.flags.contains(InstanceFlags::SHARED)
    }

    /// Current lifecycle state
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// True once the destructor has run
    pub fn is_deleted(&self) -> bool {
        self.state == Lifecycle::Deleted
    }

    /// True when exempt from automatic collection
    pub fn is_persistent(&self) -> bool {
        self.state == Lifecycle::Persistent
    }

    /// Raw native pointer. Fails with `UseAfterFree` once deleted.
    pub fn ptr(&self) -> BridgeResult<u32> {
        if self.is_deleted() {
            return Err(BridgeError::UseAfterFree(self.class_name.clone()));
        }
        Ok(self.ptr)
    }

    /// Shared-ownership handle. Fails with `UseAfterFree` once deleted and
    /// with `TypeMismatch` when the instance never carried one.
    pub fn shared(&self) -> BridgeResult<u32> {
        if self.is_deleted() {
            return Err(BridgeError::UseAfterFree(self.class_name.clone()));
        }
        if !self.is_shared() {
            return Err(BridgeError::mismatch(
                format!("shared {}", self.class_name),
                "plain pointer instance",
            ));
        }
        Ok(self.shared)
    }

    /// Overwrite the raw pointer. Fails with `UseAfterFree` once deleted.
    pub fn set_ptr(&mut self, ptr: u32) -> BridgeResult<()> {
        if self.is_deleted() {
            return Err(BridgeError::UseAfterFree(self.class_name.clone()));
        }
        self.ptr = ptr;
        Ok(())
    }

    /// Exempt this instance from deferred collection. No effect once deleted.
    pub fn persist(&mut self) {
        if self.state == Lifecycle::None {
            self.state = Lifecycle::Persistent;
        }
    }

    /// Mark deleted. The destructor must already have run (or the owning
    /// context is being torn down); afterwards pointer and shared-handle
    /// access fails.
    pub fn mark_deleted(&mut self) {
        self.state = Lifecycle::Deleted;
    }
}
