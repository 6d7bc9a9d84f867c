//! Deferred instance reclamation
//!
//! Instances created implicitly by value reads (shared-pointer returns and
//! the like) are queued here instead of freed inline, and swept later in a
//! single cooperative pump. Scheduling is debounced: any number of
//! registrations between pumps results in exactly one sweep. The bridge is
//! single-threaded, so the pump is driven by the embedder's loop rather
//! than a timer.

use tether_abi::InstanceRef;

/// Deferred reclamation queue for bridge-created instances.
#[derive(Default)]
pub struct LightGc {
    enabled: bool,
    dirty: Vec<InstanceRef>,
    sweep_pending: bool,
}

impl LightGc {
    /// Create a disabled queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn deferred reclamation on.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn deferred reclamation off. Already-queued instances stay queued
    /// and are swept by the next pump.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether registration currently queues instances
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queue an instance for the next sweep. No-op while disabled.
    pub fn register(&mut self, instance: &InstanceRef) {
        if !self.enabled {
            return;
        }
        self.dirty.push(instance.clone());
        self.sweep_pending = true;
    }

    /// Take the queued batch if a sweep is due. Clears the debounce flag,
    /// so the caller owns the batch and runs exactly one sweep for it.
    pub fn take_pending(&mut self) -> Option<Vec<InstanceRef>> {
        if !self.sweep_pending {
            return None;
        }
        self.sweep_pending = false;
        Some(std::mem::take(&mut self.dirty))
    }

    /// Number of instances currently queued
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }
}
