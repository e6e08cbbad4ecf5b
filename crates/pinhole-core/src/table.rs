//! The handle table.
//!
//! One reader/writer lock covers both the live set and the allocation cursor,
//! so every operation sees either all or none of another operation's effect.
//! Reads share the lock; allocate, set, and wipe take it exclusively.
//! Values leaving the table (replaced or wiped) are dropped after the lock is
//! released, so a value's `Drop` may itself call back into the table.
//!
//! Each entry carries the epoch of the allocation that created it. Handle
//! numbers are reused, epochs are not, so a [`HandleGuard`] pinned to an
//! epoch never reaches an unrelated entry that later received its number.

use core::fmt;
use core::mem;
use std::collections::HashMap;

use parking_lot::RwLock;
use pinhole_metrics::{Counter, Histogram, HistogramSnapshot};
use tracing::{debug, error, trace, warn};

use crate::cursor::Cursor;
use crate::{Handle, HandleGuard, Rejected, TableConfig, TableError};

/// A live value and the bookkeeping that ties guards to it.
struct Entry<V> {
    epoch: u64,
    /// Owned by a [`HandleGuard`].
    guarded: bool,
    value: V,
}

/// State protected by the table lock.
struct Inner<V> {
    live: HashMap<Handle, Entry<V>>,
    cursor: Cursor,
    next_epoch: u64,
}

impl<V> Inner<V> {
    /// Entry behind `handle`, restricted to `epoch` when one is given.
    fn entry(&self, handle: Handle, epoch: Option<u64>) -> Option<&Entry<V>> {
        self.live
            .get(&handle)
            .filter(|e| epoch.is_none_or(|epoch| e.epoch == epoch))
    }

    fn entry_mut(&mut self, handle: Handle, epoch: Option<u64>) -> Option<&mut Entry<V>> {
        self.live
            .get_mut(&handle)
            .filter(|e| epoch.is_none_or(|epoch| e.epoch == epoch))
    }
}

#[derive(Debug, Default)]
struct Metrics {
    allocations: Counter,
    releases: Counter,
    rejected_writes: Counter,
    probes: Histogram,
}

/// Point-in-time statistics for a [`HandleTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    /// Entries currently live.
    pub live: usize,
    /// Successful allocations since construction.
    pub allocations: u64,
    /// Wipes that removed an entry.
    pub releases: u64,
    /// Sets and allocations the table refused.
    pub rejected_writes: u64,
    /// Live numbers skipped per allocation.
    pub probes: HistogramSnapshot,
}

/// Thread-safe table mapping opaque [`Handle`]s to values of type `V`.
///
/// Handles are unique among live entries only. After [`wipe`](Self::wipe)
/// the number may be issued again by a later allocation, at which point it
/// refers solely to the new value.
pub struct HandleTable<V> {
    inner: RwLock<Inner<V>>,
    capacity: u64,
    metrics: Metrics,
}

impl<V> HandleTable<V> {
    /// Create an empty table over the full `u64` handle space with linear
    /// probing.
    pub fn new() -> Self {
        let config = TableConfig::default();
        Self::build(&config)
    }

    /// Create an empty table from `config`.
    pub fn with_config(config: TableConfig) -> Result<Self, TableError> {
        config.validate()?;
        Ok(Self::build(&config))
    }

    fn build(config: &TableConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                live: HashMap::with_capacity(config.initial_capacity),
                cursor: Cursor::new(config),
                next_epoch: 0,
            }),
            capacity: config.capacity(),
            metrics: Metrics::default(),
        }
    }

    /// Store `value` under a handle not currently live.
    ///
    /// # Panics
    ///
    /// Panics if every handle in the space is live. That only happens when
    /// handles are leaked; use [`try_allocate`](Self::try_allocate) to
    /// recover instead.
    pub fn allocate(&self, value: V) -> Handle {
        match self.try_allocate(value) {
            Ok(handle) => handle,
            Err(rejected) => panic!("{}", rejected.error()),
        }
    }

    /// Store `value` under a handle not currently live, handing the value
    /// back if the handle space is exhausted.
    pub fn try_allocate(&self, value: V) -> Result<Handle, Rejected<V>> {
        self.insert(value, false).map(|(handle, _)| handle)
    }

    /// Claim a number and store `value` there, returning the entry's epoch.
    fn insert(&self, value: V, guarded: bool) -> Result<(Handle, u64), Rejected<V>> {
        let mut inner = self.inner.write();
        let Inner {
            live,
            cursor,
            next_epoch,
        } = &mut *inner;
        let Some(claim) = cursor.claim(live.len(), |raw| live.contains_key(&Handle(raw))) else {
            drop(inner);
            self.metrics.rejected_writes.incr();
            error!(capacity = self.capacity, "handle space exhausted");
            let error = TableError::Exhausted {
                capacity: self.capacity,
            };
            return Err(Rejected::new(error, value));
        };
        let handle = Handle(claim.raw);
        let epoch = *next_epoch;
        *next_epoch += 1;
        let entry = Entry {
            epoch,
            guarded,
            value,
        };
        let prev = live.insert(handle, entry);
        debug_assert!(prev.is_none(), "cursor claimed live handle {handle}");
        drop(inner);

        self.metrics.allocations.incr();
        self.metrics.probes.record(claim.probes);
        if claim.wrapped {
            debug!(%handle, "allocation cursor wrapped");
        }
        trace!(%handle, epoch, probes = claim.probes, "allocated");
        Ok((handle, epoch))
    }

    /// Clone of the value behind `handle`, or `None` if it is not live.
    pub fn get(&self, handle: Handle) -> Option<V>
    where
        V: Clone,
    {
        self.with(handle, V::clone)
    }

    /// Run `f` on the value behind `handle` under the read lock.
    ///
    /// `f` may read from this table but must not write to it; a write from
    /// inside `f` deadlocks.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.with_matching(handle, None, f)
    }

    /// Read path shared with guards. Recursive so that reads nested inside
    /// `f` do not queue behind a waiting writer.
    pub(crate) fn with_matching<R>(
        &self,
        handle: Handle,
        epoch: Option<u64>,
        f: impl FnOnce(&V) -> R,
    ) -> Option<R> {
        let inner = self.inner.read_recursive();
        inner.entry(handle, epoch).map(|e| f(&e.value))
    }

    /// Run `f` on the value behind `handle` under the write lock.
    ///
    /// `f` must not touch this table; doing so deadlocks.
    pub fn with_mut<R>(&self, handle: Handle, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.inner
            .write()
            .live
            .get_mut(&handle)
            .map(|e| f(&mut e.value))
    }

    /// Whether `handle` is currently live.
    pub fn contains(&self, handle: Handle) -> bool {
        self.inner.read_recursive().live.contains_key(&handle)
    }

    /// Replace the value behind a live `handle`, returning the old value.
    ///
    /// A handle that is not live is never revived: the new value is handed
    /// back inside [`Rejected`] with [`TableError::Absent`].
    pub fn set(&self, handle: Handle, value: V) -> Result<V, Rejected<V>> {
        self.set_matching(handle, None, value)
    }

    pub(crate) fn set_matching(
        &self,
        handle: Handle,
        epoch: Option<u64>,
        value: V,
    ) -> Result<V, Rejected<V>> {
        let mut inner = self.inner.write();
        match inner.entry_mut(handle, epoch) {
            Some(entry) => {
                let prev = mem::replace(&mut entry.value, value);
                drop(inner);
                trace!(%handle, "replaced");
                Ok(prev)
            }
            None => {
                drop(inner);
                self.metrics.rejected_writes.incr();
                warn!(%handle, "set on handle that is not live");
                Err(Rejected::new(TableError::Absent(handle), value))
            }
        }
    }

    /// Remove `handle` from the table, returning its value if it was live.
    ///
    /// Idempotent: wiping an unknown or already wiped handle does nothing.
    /// Wiping a guarded handle is allowed; the guard then finds nothing.
    pub fn wipe(&self, handle: Handle) -> Option<V> {
        self.wipe_matching(handle, None)
    }

    pub(crate) fn wipe_matching(&self, handle: Handle, epoch: Option<u64>) -> Option<V> {
        let mut inner = self.inner.write();
        let removed = if inner.entry(handle, epoch).is_some() {
            inner.live.remove(&handle).map(|e| e.value)
        } else {
            None
        };
        if removed.is_some() {
            inner.cursor.released(handle.0);
        }
        drop(inner);

        if removed.is_some() {
            self.metrics.releases.incr();
            trace!(%handle, "wiped");
        } else {
            debug!(%handle, "wipe of handle that is not live");
        }
        removed
    }

    /// Wipe every entry, returning how many were live.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let drained = mem::take(&mut inner.live);
        for handle in drained.keys() {
            inner.cursor.released(handle.0);
        }
        drop(inner);

        let count = drained.len();
        self.metrics.releases.add(count as u64);
        debug!(count, "cleared table");
        count
    }

    /// Store `value` and return a guard that wipes it when dropped.
    ///
    /// # Panics
    ///
    /// Panics if the handle space is exhausted, as [`allocate`](Self::allocate).
    pub fn guard(&self, value: V) -> HandleGuard<'_, V> {
        match self.insert(value, true) {
            Ok((handle, epoch)) => HandleGuard::new(self, handle, epoch),
            Err(rejected) => panic!("{}", rejected.error()),
        }
    }

    /// Take scoped ownership of a live `handle`, typically one returned by
    /// [`HandleGuard::into_raw`] that has come back across a boundary.
    ///
    /// Returns `None` if the handle is not live or another guard already
    /// owns it.
    pub fn adopt(&self, handle: Handle) -> Option<HandleGuard<'_, V>> {
        let mut inner = self.inner.write();
        let entry = inner.live.get_mut(&handle)?;
        if entry.guarded {
            drop(inner);
            debug!(%handle, "adopt of handle that is already guarded");
            return None;
        }
        entry.guarded = true;
        let epoch = entry.epoch;
        drop(inner);
        Some(HandleGuard::new(self, handle, epoch))
    }

    /// Hand the entry back to manual management. No-op if the entry the
    /// guard owned is gone.
    pub(crate) fn disarm(&self, handle: Handle, epoch: u64) {
        if let Some(entry) = self.inner.write().entry_mut(handle, Some(epoch)) {
            entry.guarded = false;
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.read_recursive().live.len()
    }

    /// Whether no entries are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of handles in the configured space, saturated at `u64::MAX`.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Snapshot of the table's counters.
    pub fn stats(&self) -> TableStats {
        TableStats {
            live: self.len(),
            allocations: self.metrics.allocations.get(),
            releases: self.metrics.releases.get(),
            rejected_writes: self.metrics.rejected_writes.get(),
            probes: self.metrics.probes.snapshot(),
        }
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for HandleTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Strategy;

    #[test]
    fn allocate_get_set_wipe_round_trip() {
        let table = HandleTable::new();
        let h = table.allocate(String::from("x"));
        assert_eq!(table.get(h).as_deref(), Some("x"));

        let prev = table.set(h, String::from("y")).expect("live handle");
        assert_eq!(prev, "x");
        assert_eq!(table.get(h).as_deref(), Some("y"));

        assert_eq!(table.wipe(h).as_deref(), Some("y"));
        assert_eq!(table.get(h), None);
        assert_eq!(table.wipe(h), None);
    }

    #[test]
    fn absent_is_distinct_from_empty_value() {
        let table: HandleTable<Option<u8>> = HandleTable::new();
        let h = table.allocate(None);
        assert_eq!(table.get(h), Some(None));
        table.wipe(h);
        assert_eq!(table.get(h), None);
    }

    #[test]
    fn set_on_wiped_handle_is_rejected_and_does_not_revive() {
        let table = HandleTable::new();
        let h = table.allocate(1);
        table.wipe(h);

        let rejected = table.set(h, 2).unwrap_err();
        assert_eq!(rejected.error(), &TableError::Absent(h));
        assert_eq!(rejected.into_value(), 2);
        assert!(!table.contains(h));
        assert_eq!(table.stats().rejected_writes, 1);
    }

    #[test]
    fn with_and_with_mut_see_the_stored_value() {
        let table = HandleTable::new();
        let h = table.allocate(vec![1, 2]);
        assert_eq!(table.with(h, Vec::len), Some(2));
        table.with_mut(h, |v| v.push(3));
        assert_eq!(table.get(h), Some(vec![1, 2, 3]));
        assert_eq!(table.with(Handle::from_raw(99), Vec::len), None);
    }

    #[test]
    fn exhaustion_hands_value_back() {
        let config = TableConfig::new().with_space(0, 1);
        let table = HandleTable::with_config(config).unwrap();
        table.allocate('a');
        table.allocate('b');

        let rejected = table.try_allocate('c').unwrap_err();
        assert_eq!(rejected.error(), &TableError::Exhausted { capacity: 2 });
        assert_eq!(rejected.into_value(), 'c');
    }

    #[test]
    #[should_panic(expected = "handle space exhausted")]
    fn allocate_panics_when_exhausted() {
        let table = HandleTable::with_config(TableConfig::new().with_space(3, 3)).unwrap();
        table.allocate(());
        table.allocate(());
    }

    #[test]
    fn invalid_config_is_refused() {
        let err = HandleTable::<u8>::with_config(TableConfig::new().with_space(2, 1)).unwrap_err();
        assert_eq!(err, TableError::InvalidConfig { first: 2, last: 1 });
    }

    #[test]
    fn handles_start_at_configured_first() {
        let config = TableConfig::new().with_space(1, 100);
        let table = HandleTable::with_config(config).unwrap();
        assert_eq!(table.allocate(()).into_raw(), 1);
        assert_eq!(table.allocate(()).into_raw(), 2);
    }

    #[test]
    fn free_list_table_reuses_released_number() {
        let config = TableConfig::new().with_strategy(Strategy::FreeList);
        let table = HandleTable::with_config(config).unwrap();
        let a = table.allocate("a");
        let _b = table.allocate("b");
        table.wipe(a);
        let c = table.allocate("c");
        assert_eq!(c, a);
        assert_eq!(table.get(c), Some("c"));
    }

    #[test]
    fn clear_drops_everything_and_counts_releases() {
        let table = HandleTable::new();
        let hs: Vec<Handle> = (0..5).map(|i| table.allocate(i)).collect();
        assert_eq!(table.clear(), 5);
        assert!(table.is_empty());
        assert!(hs.iter().all(|h| table.get(*h).is_none()));
        assert_eq!(table.stats().releases, 5);
    }

    #[test]
    fn stats_track_allocations_and_probes() {
        let config = TableConfig::new().with_space(0, 3);
        let table = HandleTable::with_config(config).unwrap();
        let hs: Vec<Handle> = (0..4).map(|i| table.allocate(i)).collect();
        table.wipe(hs[1]);
        // Filling the space left the cursor at 0; it skips 0 and lands on 1.
        assert_eq!(table.allocate(9), hs[1]);

        let stats = table.stats();
        assert_eq!(stats.live, 4);
        assert_eq!(stats.allocations, 5);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.probes.count(), 5);
        assert_eq!(stats.probes.max, 1);
    }

    #[test]
    fn value_drop_may_reenter_table() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Reenter(Arc<HandleTable<Option<Reenter>>>, Arc<AtomicUsize>);
        impl Drop for Reenter {
            fn drop(&mut self) {
                // Would deadlock if the table still held its write lock.
                self.1.store(self.0.len() + 1, Ordering::SeqCst);
            }
        }

        let table = Arc::new(HandleTable::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let h = table.allocate(Some(Reenter(Arc::clone(&table), Arc::clone(&seen))));

        let prev = table.set(h, None);
        assert!(matches!(prev, Ok(Some(_))));
        drop(prev);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(matches!(table.wipe(h), Some(None)));
    }

    #[test]
    fn nested_read_does_not_wait_behind_queued_writer() {
        use std::sync::{Arc, mpsc};
        use std::time::Duration;

        let table = Arc::new(HandleTable::new());
        let h = table.allocate(7);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let reader = Arc::clone(&table);
        std::thread::spawn(move || {
            let nested = reader.with(h, |_| {
                entered_tx.send(()).unwrap();
                // Give the writer time to queue on the lock.
                std::thread::sleep(Duration::from_millis(200));
                (reader.get(h), reader.contains(h), reader.len())
            });
            done_tx.send(nested).unwrap();
        });
        entered_rx.recv().unwrap();
        let writer = Arc::clone(&table);
        let wiper = std::thread::spawn(move || writer.wipe(h));

        let nested = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("nested read finished");
        assert_eq!(nested, Some((Some(7), true, 1)));
        assert_eq!(wiper.join().unwrap(), Some(7));
        assert!(table.is_empty());
    }
}
