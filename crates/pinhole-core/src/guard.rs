//! Scoped handle ownership.

use core::fmt;
use core::mem::ManuallyDrop;

use crate::{Handle, HandleTable, Rejected};

/// Owns a live handle and wipes it when dropped.
///
/// Created by [`HandleTable::guard`] or [`HandleTable::adopt`]. Use
/// [`into_raw`](Self::into_raw) when the handle has to outlive the scope,
/// e.g. to hand it to foreign code that passes it back later.
///
/// A guard is pinned to the entry it was created for. If that entry is wiped
/// through the table and the number reissued, the guard sees nothing: reads
/// return `None`, `set` is rejected, and dropping it leaves the new entry
/// alone.
#[must_use = "dropping the guard wipes the handle immediately"]
pub struct HandleGuard<'t, V> {
    table: &'t HandleTable<V>,
    handle: Handle,
    epoch: u64,
}

impl<'t, V> HandleGuard<'t, V> {
    pub(crate) fn new(table: &'t HandleTable<V>, handle: Handle, epoch: u64) -> Self {
        Self {
            table,
            handle,
            epoch,
        }
    }

    /// The guarded handle.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Whether the guarded entry is still in the table.
    pub fn is_live(&self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Clone of the guarded value.
    pub fn get(&self) -> Option<V>
    where
        V: Clone,
    {
        self.with(V::clone)
    }

    /// Run `f` on the guarded value.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.table.with_matching(self.handle, Some(self.epoch), f)
    }

    /// Replace the guarded value, returning the old one.
    pub fn set(&self, value: V) -> Result<V, Rejected<V>> {
        self.table.set_matching(self.handle, Some(self.epoch), value)
    }

    /// Disarm the guard and return the handle; the entry stays live until
    /// wiped or re-adopted.
    pub fn into_raw(self) -> Handle {
        let this = ManuallyDrop::new(self);
        this.table.disarm(this.handle, this.epoch);
        this.handle
    }

    /// Wipe now and return the value.
    pub fn release(self) -> Option<V> {
        let this = ManuallyDrop::new(self);
        this.table.wipe_matching(this.handle, Some(this.epoch))
    }
}

impl<V> Drop for HandleGuard<'_, V> {
    fn drop(&mut self) {
        self.table.wipe_matching(self.handle, Some(self.epoch));
    }
}

impl<V> fmt::Debug for HandleGuard<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard")
            .field("handle", &self.handle)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
