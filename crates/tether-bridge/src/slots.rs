//! Reference-counted slot tables for callbacks and externally-owned buffers
//!
//! A slot table maps an opaque numeric handle to a host-side payload.
//! Handle 0 is a permanent reserved sentinel so a falsy handle always means
//! "absent"; freed handles are recycled through a free list only after the
//! reference count reaches zero.

use tether_abi::{BridgeError, BridgeResult, HostBytes, HostFn};

struct Slot<T> {
    payload: T,
    refs: u32,
}

/// Generic reference-counted slot table with free-list reuse.
pub struct SlotTable<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<u32>,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotTable<T> {
    /// Create a table with handle 0 permanently reserved.
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            free: Vec::new(),
        }
    }

    /// Store a payload and return its handle with reference count 1.
    ///
    /// Pops a recycled handle from the free list when one is available,
    /// otherwise appends. Never returns 0.
    pub fn register(&mut self, payload: T) -> u32 {
        let slot = Some(Slot { payload, refs: 1 });
        if let Some(handle) = self.free.pop() {
            self.slots[handle as usize] = slot;
            handle
        } else {
            self.slots.push(slot);
            (self.slots.len() - 1) as u32
        }
    }

    /// Borrow the payload behind a handle.
    pub fn get(&self, handle: u32) -> Option<&T> {
        self.slots
            .get(handle as usize)
            .and_then(|s| s.as_ref())
            .map(|s| &s.payload)
    }

    /// Increment the reference count.
    pub fn reference(&mut self, handle: u32) -> BridgeResult<()> {
        let slot = self
            .slots
            .get_mut(handle as usize)
            .and_then(|s| s.as_mut())
            .ok_or(BridgeError::BadHandle(handle))?;
        slot.refs += 1;
        Ok(())
    }

    /// Decrement the reference count.
    ///
    /// At zero the slot is cleared, the handle returns to the free list, and
    /// the payload is handed back so the caller can run its cleanup.
    pub fn release(&mut self, handle: u32) -> BridgeResult<Option<T>> {
        let entry = self
            .slots
            .get_mut(handle as usize)
            .ok_or(BridgeError::BadHandle(handle))?;
        let slot = entry.as_mut().ok_or(BridgeError::BadHandle(handle))?;
        slot.refs -= 1;
        if slot.refs == 0 {
            let taken = entry.take().map(|s| s.payload);
            self.free.push(handle);
            return Ok(taken);
        }
        Ok(None)
    }

    /// Number of live (occupied) slots
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Payload of an external slot.
pub enum ExternalPayload {
    /// A host buffer mirrored into native memory. `native_ptr`/`len`
    /// describe the boundary-resident copy so a commit can copy it back.
    Buffer {
        /// The host-side buffer the bytes came from
        host: HostBytes,
        /// Offset of the boundary-resident copy
        native_ptr: u32,
        /// Byte length of the copy
        len: u32,
    },
    /// An opaque externally-owned payload identified only by its handle
    Opaque,
}

/// An externally-owned resource held on behalf of native code.
pub struct External {
    /// What the slot holds
    pub payload: ExternalPayload,
    /// Optional cleanup run when the reference count reaches zero
    pub cleanup: Option<Box<dyn FnOnce()>>,
}

impl External {
    /// Wrap a mirrored host buffer
    pub fn buffer(host: HostBytes, native_ptr: u32, len: u32) -> Self {
        Self {
            payload: ExternalPayload::Buffer {
                host,
                native_ptr,
                len,
            },
            cleanup: None,
        }
    }

    /// Wrap an opaque payload with a cleanup hook
    pub fn opaque_with_cleanup(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            payload: ExternalPayload::Opaque,
            cleanup: Some(Box::new(cleanup)),
        }
    }
}

/// Slot table of host callbacks, keyed by the handle passed to native code.
pub type CallbackTable = SlotTable<HostFn>;

/// Slot table of externally-owned buffers/payloads.
pub type ExternalTable = SlotTable<External>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_zero_never_issued() {
        let mut table: SlotTable<i32> = SlotTable::new();
        for _ in 0..10 {
            assert_ne!(table.register(7), 0);
        }
        assert!(table.get(0).is_none());
    }

    #[test]
    fn test_distinct_handles_before_release() {
        let mut table: SlotTable<i32> = SlotTable::new();
        let a = table.register(1);
        let b = table.register(2);
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&1));
        assert_eq!(table.get(b), Some(&2));
    }

    #[test]
    fn test_release_at_zero_recycles_handle() {
        let mut table: SlotTable<i32> = SlotTable::new();
        let a = table.register(1);
        assert_eq!(table.release(a).unwrap(), Some(1));
        assert!(table.get(a).is_none());
        let b = table.register(2);
        assert_eq!(b, a);
    }

    #[test]
    fn test_reference_defers_recycling() {
        let mut table: SlotTable<i32> = SlotTable::new();
        let a = table.register(1);
        table.reference(a).unwrap();
        assert_eq!(table.release(a).unwrap(), None);
        assert_eq!(table.get(a), Some(&1));
        assert_eq!(table.release(a).unwrap(), Some(1));
        assert!(table.get(a).is_none());
    }

    #[test]
    fn test_bad_handle() {
        let mut table: SlotTable<i32> = SlotTable::new();
        assert!(matches!(
            table.reference(42),
            Err(BridgeError::BadHandle(42))
        ));
        assert!(matches!(table.release(0), Err(BridgeError::BadHandle(0))));
    }

    #[test]
    fn test_external_cleanup_runs_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let ran = Rc::new(Cell::new(0));
        let ran2 = ran.clone();
        let mut table: ExternalTable = SlotTable::new();
        let h = table.register(External::opaque_with_cleanup(move || {
            ran2.set(ran2.get() + 1);
        }));
        if let Some(ext) = table.release(h).unwrap() {
            if let Some(cleanup) = ext.cleanup {
                cleanup();
            }
        }
        assert_eq!(ran.get(), 1);
    }
}
