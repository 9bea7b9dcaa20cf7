//! Low-disk-space signals fanned out to registered caches

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Something that can shrink its disk footprint on request
pub trait DiskTrimmable: Send + Sync {
    /// Shrink toward the configured floor
    fn trim_to_minimum(&self);

    /// Drop everything
    fn trim_to_nothing(&self);
}

/// Explicitly constructed registry; holds weak references so dropping a
/// cache unregisters it
#[derive(Default)]
pub struct DiskTrimmableRegistry {
    trimmables: Mutex<Vec<Weak<dyn DiskTrimmable>>>,
}

impl DiskTrimmableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, trimmable: &Arc<dyn DiskTrimmable>) {
        self.trimmables.lock().push(Arc::downgrade(trimmable));
    }

    pub fn unregister(&self, trimmable: &Arc<dyn DiskTrimmable>) {
        let target = Arc::downgrade(trimmable);
        self.trimmables.lock().retain(|w| !w.ptr_eq(&target));
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn on_low_disk_space(&self) {
        for trimmable in self.live() {
            trimmable.trim_to_minimum();
        }
    }

    pub fn on_critically_low_disk_space(&self) {
        for trimmable in self.live() {
            trimmable.trim_to_nothing();
        }
    }

    /// Upgrade live registrations, dropping dead ones. Callbacks run unlocked.
    fn live(&self) -> Vec<Arc<dyn DiskTrimmable>> {
        let mut trimmables = self.trimmables.lock();
        trimmables.retain(|w| w.strong_count() > 0);
        trimmables.iter().filter_map(Weak::upgrade).collect()
    }
}
