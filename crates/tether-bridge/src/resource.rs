//! Scoped conversion resources
//!
//! A resource is a named acquire/release pair wrapped around one invocation:
//! saving and restoring the heap's stack top, or checkpointing the pool.
//! Multiple types requesting the same resource collapse to a single
//! acquire/release per call, and each call's scope is independent so nested
//! calls restore their own saved state without corrupting the outer call's.

use tether_abi::BoundaryHeap;

use crate::types::WireTypeRef;

/// Identity of a scoped resource. Dedup across a signature is by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceId {
    /// Save/restore the scratch stack top
    Stack,
    /// Checkpoint/restore the scratch pool
    Pool,
}

impl ResourceId {
    /// Printable resource name
    pub fn name(&self) -> &'static str {
        match self {
            ResourceId::Stack => "stack",
            ResourceId::Pool => "pool",
        }
    }
}

/// Union, in first-seen order, of every resource the participating types of
/// one invocation need: each parameter's write resources, then the return
/// type's read resources, deduplicated by identity.
pub fn list_resources(params: &[WireTypeRef], ret: &WireTypeRef) -> Vec<ResourceId> {
    let mut out = Vec::new();
    let push = |ids: &[ResourceId], out: &mut Vec<ResourceId>| {
        for id in ids {
            if !out.contains(id) {
                out.push(*id);
            }
        }
    };
    for ty in params {
        push(ty.write_resources(), &mut out);
    }
    push(ret.read_resources(), &mut out);
    out
}

/// One call's acquired resource state.
///
/// Acquire captures the saved markers before any conversion runs; `release`
/// must be called on every exit path (success, conversion failure, or native
/// failure) so scratch regions never leak across failed calls.
#[must_use = "a resource scope must be released on every exit path"]
pub struct ResourceScope {
    saved: Vec<(ResourceId, u32)>,
}

impl ResourceScope {
    /// Acquire each listed resource exactly once.
    pub fn acquire(heap: &mut BoundaryHeap, resources: &[ResourceId]) -> Self {
        let saved = resources
            .iter()
            .map(|&id| {
                let mark = match id {
                    ResourceId::Stack => heap.stack_save(),
                    ResourceId::Pool => heap.pool_save(),
                };
                (id, mark)
            })
            .collect();
        Self { saved }
    }

    /// Release each acquired resource exactly once, in reverse order.
    pub fn release(self, heap: &mut BoundaryHeap) {
        for (id, mark) in self.saved.into_iter().rev() {
            match id {
                ResourceId::Stack => heap.stack_restore(mark),
                ResourceId::Pool => heap.pool_restore(mark),
            }
        }
    }

    /// Number of distinct acquired resources
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// Check if nothing was acquired
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}
