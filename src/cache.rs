//! The public cache facades.
//!
//! ## Architecture
//!
//! ```text
//!   Cache / LoadingCache (thin handles)
//!        │
//!        ▼
//!   CacheCore ──► Directory (sharded map, synchronous)
//!        │
//!        ├──► event channel ──► Processor (policy, async)
//!        └──► LoaderCoordinator (loads + refresh)
//! ```
//!
//! The facade does only synchronous, lock-light work: directory lookups,
//! timestamp updates, and event enqueues. The directory is updated by `put`
//! before the processor sees the Write event, so readers observe fresh
//! values while policy accounting may lag behind.
//!
//! Removal and insertion listeners run on the processor thread and must
//! not call back into the cache: the event channel is bounded and a
//! blocked processor cannot drain it.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::clock::Clock;
use crate::directory::Directory;
use crate::entry::Entry;
use crate::error::LoadError;
use crate::event::EntryEvent;
use crate::hash::sum64;
use crate::loader::LoaderCoordinator;
use crate::processor::ShutdownSignal;
use crate::stats::{Stats, StatsCounter};

/// State shared by every handle to one cache instance.
pub(crate) struct CacheCore<K, V> {
    pub(crate) directory: Arc<Directory<K, V>>,
    pub(crate) tx: Sender<EntryEvent<K, V>>,
    pub(crate) coordinator: Arc<LoaderCoordinator<K, V>>,
    pub(crate) stats: Arc<dyn StatsCounter>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) expire_after_access: u64,
    pub(crate) expire_after_write: u64,
    pub(crate) maximum_size: usize,
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) shutdown: Arc<ShutdownSignal>,
}

impl<K, V> CacheCore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn send(&self, event: EntryEvent<K, V>) {
        // Events raced past a close are dropped, not queued.
        if self.is_closed() {
            return;
        }
        let _ = self.tx.send(event);
    }

    fn is_expired(&self, entry: &Entry<K, V>, now: u64) -> bool {
        if entry.is_invalidated() {
            return true;
        }
        if self.expire_after_access > 0
            && entry.access_time().saturating_add(self.expire_after_access) < now
        {
            return true;
        }
        if self.expire_after_write > 0
            && entry.write_time().saturating_add(self.expire_after_write) < now
        {
            return true;
        }
        false
    }

    pub(crate) fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
        if self.is_closed() {
            return None;
        }
        let hash = sum64(key);
        let Some(entry) = self.directory.get(key, hash) else {
            self.stats.record_misses(1);
            return None;
        };
        let now = self.clock.now();
        if self.is_expired(&entry, now) {
            self.send(EntryEvent::Delete(Some(entry)));
            self.stats.record_misses(1);
            return None;
        }
        entry.set_access_time(now);
        let value = entry.value();
        self.send(EntryEvent::Access(entry));
        self.stats.record_hits(1);
        Some(value)
    }

    pub(crate) fn put(&self, key: K, value: V) {
        if self.is_closed() {
            return;
        }
        let hash = sum64(&key);
        let value = Arc::new(value);
        let now = self.clock.now();

        if let Some(entry) = self.directory.get(&key, hash) {
            entry.set_value(value);
            entry.set_write_time(now);
            entry.set_invalidated(false);
            self.send(EntryEvent::Write(entry));
            return;
        }

        let entry = Arc::new(Entry::new(key, value, hash, now));
        if self.directory.len() < self.maximum_size {
            if let Some(existing) = self.directory.get_or_insert(Arc::clone(&entry)) {
                // Racing put: the first install wins, we update it.
                existing.set_value(entry.value());
                existing.set_write_time(now);
                existing.set_invalidated(false);
                self.send(EntryEvent::Write(existing));
                return;
            }
        }
        // At capacity the entry is not installed here; the policy admits
        // or rejects it when the Write event is processed.
        self.send(EntryEvent::Write(entry));
    }

    pub(crate) fn invalidate(&self, key: &K) {
        if self.is_closed() {
            return;
        }
        let hash = sum64(key);
        if let Some(entry) = self.directory.get(key, hash) {
            entry.set_invalidated(true);
            self.send(EntryEvent::Delete(Some(entry)));
        }
    }

    pub(crate) fn invalidate_all(&self) {
        if self.is_closed() {
            return;
        }
        self.directory.walk(|entry| entry.set_invalidated(true));
        self.send(EntryEvent::Delete(None));
    }

    pub(crate) fn get_or_load(&self, key: &K) -> Result<Arc<V>, LoadError> {
        if self.is_closed() {
            // The loader still produces a value; nothing is cached.
            return self.coordinator.call_loader(key).map(Arc::new);
        }
        let hash = sum64(key);
        let Some(entry) = self.directory.get(key, hash) else {
            self.stats.record_misses(1);
            return self.load_and_install(key, hash);
        };

        let now = self.clock.now();
        if self.is_expired(&entry, now) {
            // Retain and serve stale; freshen in the background.
            self.stats.record_misses(1);
            entry.set_access_time(now);
            self.coordinator.refresh_async(&entry);
            Ok(entry.value())
        } else {
            self.stats.record_hits(1);
            entry.set_access_time(now);
            let value = entry.value();
            self.send(EntryEvent::Access(entry));
            Ok(value)
        }
    }

    pub(crate) fn refresh(&self, key: &K) {
        if self.is_closed() || !self.coordinator.has_loader() {
            return;
        }
        let hash = sum64(key);
        match self.directory.get(key, hash) {
            None => {
                // Absent keys load on the caller's thread; errors are
                // already counted and the caller asked for no result.
                let _ = self.load_and_install(key, hash);
            },
            Some(entry) => {
                self.coordinator.refresh_async(&entry);
            },
        }
    }

    fn load_and_install(&self, key: &K, hash: u64) -> Result<Arc<V>, LoadError> {
        let start = self.clock.now();
        let result = self.coordinator.call_loader(key);
        let load_time = Duration::from_nanos(self.clock.now().saturating_sub(start));
        match result {
            Err(err) => {
                self.stats.record_load_error(load_time);
                Err(err)
            },
            Ok(value) => {
                self.stats.record_load_success(load_time);
                let value = Arc::new(value);
                let now = self.clock.now();
                let entry = Arc::new(Entry::new(
                    key.clone(),
                    Arc::clone(&value),
                    hash,
                    now,
                ));
                if self.directory.len() < self.maximum_size {
                    if let Some(existing) =
                        self.directory.get_or_insert(Arc::clone(&entry))
                    {
                        existing.set_value(Arc::clone(&value));
                        existing.set_write_time(now);
                        existing.set_invalidated(false);
                        self.send(EntryEvent::Write(existing));
                        return Ok(value);
                    }
                }
                self.send(EntryEvent::Write(entry));
                Ok(value)
            },
        }
    }

    pub(crate) fn stats(&self, out: &mut Stats) {
        self.stats.snapshot(out);
    }

    pub(crate) fn len(&self) -> usize {
        self.directory.len()
    }

    pub(crate) fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Winner of the close race; everyone waits for the drain.
            let _ = self.tx.send(EntryEvent::Close);
        }
        self.shutdown.wait();
    }
}

/// A concurrent key/value cache.
///
/// Built by [`CacheBuilder`](crate::CacheBuilder). All methods take `&self`
/// and may be called from any thread; wrap the cache in an [`Arc`] to share
/// it.
///
/// # Example
///
/// ```
/// use cachette::CacheBuilder;
///
/// let cache = CacheBuilder::new().maximum_size(2).build();
/// cache.put("a", 1);
/// cache.put("b", 2);
///
/// assert_eq!(cache.get_if_present(&"a").as_deref(), Some(&1));
/// assert_eq!(cache.get_if_present(&"missing"), None);
///
/// cache.invalidate(&"a");
/// cache.close();
/// ```
pub struct Cache<K, V> {
    core: Arc<CacheCore<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn from_core(core: Arc<CacheCore<K, V>>) -> Self {
        Self { core }
    }

    /// Returns the cached value for `key`, or `None`.
    ///
    /// An expired entry counts as a miss and is scheduled for removal.
    pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
        self.core.get_if_present(key)
    }

    /// Associates `value` with `key`, replacing any previous value.
    pub fn put(&self, key: K, value: V) {
        self.core.put(key, value)
    }

    /// Discards the cached value for `key`, notifying `on_removal`.
    pub fn invalidate(&self, key: &K) {
        self.core.invalidate(key)
    }

    /// Discards every entry.
    pub fn invalidate_all(&self) {
        self.core.invalidate_all()
    }

    /// Copies the current statistics into `out`.
    pub fn stats(&self, out: &mut Stats) {
        self.core.stats(out)
    }

    /// Number of live entries. Approximate while writes are in flight.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shuts the cache down: pending events are drained, every entry is
    /// removed (notifying `on_removal`), and the processor thread exits.
    ///
    /// Idempotent and safe to call from any number of threads; each call
    /// blocks until the shutdown completes. Operations after `close` are
    /// no-ops or return `None`.
    pub fn close(&self) {
        self.core.close()
    }
}

/// A cache that computes missing values through a loader function.
///
/// Built by
/// [`CacheBuilder::build_with_loader`](crate::CacheBuilder::build_with_loader).
/// Offers everything [`Cache`] does, plus [`get`](Self::get) and
/// [`refresh`](Self::refresh).
///
/// # Example
///
/// ```
/// use cachette::CacheBuilder;
///
/// let cache = CacheBuilder::new()
///     .maximum_size(128)
///     .build_with_loader(|key: &u64| Ok(key * 2));
///
/// assert_eq!(*cache.get(&21).unwrap(), 42);  // loaded
/// assert_eq!(*cache.get(&21).unwrap(), 42);  // cached
/// cache.close();
/// ```
pub struct LoadingCache<K, V> {
    core: Arc<CacheCore<K, V>>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn from_core(core: Arc<CacheCore<K, V>>) -> Self {
        Self { core }
    }

    /// Returns the value for `key`, invoking the loader on a miss.
    ///
    /// Loader errors are returned verbatim and nothing is cached for the
    /// key. An *expired* entry is served stale while a background refresh
    /// replaces it; an absent entry is loaded on the caller's thread.
    ///
    /// After [`close`](Self::close) the loader still runs, but the result
    /// is not cached.
    pub fn get(&self, key: &K) -> Result<Arc<V>, LoadError> {
        self.core.get_or_load(key)
    }

    /// Schedules a reload of `key`.
    ///
    /// Present keys refresh asynchronously (at most one refresh per key in
    /// flight); absent keys load synchronously on the caller's thread.
    pub fn refresh(&self, key: &K) {
        self.core.refresh(key)
    }

    /// Returns the cached value for `key` without loading.
    pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
        self.core.get_if_present(key)
    }

    /// Associates `value` with `key`, replacing any previous value.
    pub fn put(&self, key: K, value: V) {
        self.core.put(key, value)
    }

    /// Discards the cached value for `key`, notifying `on_removal`.
    pub fn invalidate(&self, key: &K) {
        self.core.invalidate(key)
    }

    /// Discards every entry.
    pub fn invalidate_all(&self) {
        self.core.invalidate_all()
    }

    /// Copies the current statistics into `out`.
    pub fn stats(&self, out: &mut Stats) {
        self.core.stats(out)
    }

    /// Number of live entries. Approximate while writes are in flight.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shuts the cache down; see [`Cache::close`].
    pub fn close(&self) {
        self.core.close()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Cache, CacheBuilder, Stats};

    #[test]
    fn put_then_get_round_trips() {
        let cache = CacheBuilder::new().maximum_size(8).build();
        cache.put(1_u64, "one");
        assert_eq!(cache.get_if_present(&1).as_deref(), Some(&"one"));
        cache.close();
    }

    #[test]
    fn overwrite_replaces_the_value() {
        let cache = CacheBuilder::new().maximum_size(8).build();
        cache.put(1_u64, 1);
        cache.put(1_u64, 2);
        assert_eq!(cache.get_if_present(&1).as_deref(), Some(&2));
        cache.close();
    }

    #[test]
    fn invalidate_hides_the_entry_immediately() {
        let cache = CacheBuilder::new().maximum_size(8).build();
        cache.put(1_u64, 1);
        cache.invalidate(&1);
        // The Delete event may still be queued, but the invalidated flag
        // already hides the entry.
        assert_eq!(cache.get_if_present(&1), None);
        cache.close();
    }

    #[test]
    fn operations_after_close_are_noops() {
        let cache = CacheBuilder::new().maximum_size(8).build();
        cache.put(1_u64, 1);
        cache.close();

        assert_eq!(cache.get_if_present(&1), None);
        cache.put(2, 2);
        cache.invalidate(&2);
        cache.invalidate_all();
        assert_eq!(cache.len(), 0);

        let mut stats = Stats::default();
        cache.stats(&mut stats);
        assert_eq!(stats.hit_count, 0);
    }

    #[test]
    fn close_is_idempotent() {
        let cache: Cache<u64, u64> = CacheBuilder::new().maximum_size(8).build();
        cache.close();
        cache.close();
    }

    #[test]
    fn loading_cache_loads_once_per_key() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let cache = CacheBuilder::new().maximum_size(8).build_with_loader(
            move |key: &u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(*key + 1)
            },
        );

        assert_eq!(*cache.get(&1).unwrap(), 2);
        assert_eq!(*cache.get(&1).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cache.close();
    }

    #[test]
    fn loader_errors_propagate_and_are_not_cached() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let cache = CacheBuilder::new().maximum_size(8).build_with_loader(
            move |_key: &u64| -> Result<u64, crate::LoadError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(crate::LoadError::message("down"))
            },
        );

        assert!(cache.get(&1).is_err());
        assert!(cache.get(&1).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2, "errors are never cached");

        let mut stats = Stats::default();
        cache.stats(&mut stats);
        assert_eq!(stats.load_error_count, 2);
        assert_eq!(stats.miss_count, 2);
        cache.close();
    }
}
