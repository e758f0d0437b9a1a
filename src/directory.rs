//! Sharded concurrent map from key to entry.
//!
//! ## Architecture
//!
//! ```text
//!   hash(key) ──► hash & (SHARDS-1) ──► shard index
//!
//!   ┌───────────────┬───────────────┬───────────────┬───────────────┐
//!   │   shard 0     │   shard 1     │   shard 2     │   shard 3     │
//!   │ RwLock<FxMap> │ RwLock<FxMap> │ RwLock<FxMap> │ RwLock<FxMap> │
//!   └───────────────┴───────────────┴───────────────┴───────────────┘
//!                        len: AtomicUsize (global)
//! ```
//!
//! Lookups take one shard read lock; inserts and removes take one shard
//! write lock. The global `len` counter changes exactly when an insert adds
//! a new key or a remove deletes one, so it always agrees with a full scan.
//!
//! Removal is conditional on pointer identity ([`Directory::remove_if_same`])
//! so that an eviction decided against a stale entry cannot clobber a key
//! that was concurrently re-inserted.

use std::collections::hash_map::Entry as MapEntry;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entry::Entry;

const SHARDS: usize = 4;
const SHARD_MASK: u64 = SHARDS as u64 - 1;

type Shard<K, V> = RwLock<FxHashMap<K, Arc<Entry<K, V>>>>;

/// Sharded map of live entries.
#[derive(Debug)]
pub(crate) struct Directory<K, V> {
    shards: [Shard<K, V>; SHARDS],
    len: AtomicUsize,
}

impl<K, V> Directory<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| RwLock::new(FxHashMap::default())),
            len: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn shard(&self, hash: u64) -> &Shard<K, V> {
        &self.shards[(hash & SHARD_MASK) as usize]
    }

    /// Returns the entry for `key`, if present.
    pub(crate) fn get(&self, key: &K, hash: u64) -> Option<Arc<Entry<K, V>>> {
        self.shard(hash).read().get(key).cloned()
    }

    /// Inserts `entry` unless its key is already present.
    ///
    /// Returns the existing entry when the insert loses the race, `None`
    /// when `entry` was installed.
    pub(crate) fn get_or_insert(
        &self,
        entry: Arc<Entry<K, V>>,
    ) -> Option<Arc<Entry<K, V>>> {
        let mut shard = self.shard(entry.hash()).write();
        match shard.entry(entry.key().clone()) {
            MapEntry::Occupied(occupied) => Some(Arc::clone(occupied.get())),
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
                self.len.fetch_add(1, Ordering::Release);
                None
            },
        }
    }

    /// Removes `entry` only if the map still holds this exact entry.
    ///
    /// Returns `true` if the entry was removed.
    pub(crate) fn remove_if_same(&self, entry: &Arc<Entry<K, V>>) -> bool {
        let mut shard = self.shard(entry.hash()).write();
        match shard.get(entry.key()) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                shard.remove(entry.key());
                self.len.fetch_sub(1, Ordering::Release);
                true
            },
            _ => false,
        }
    }

    /// Returns the number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Visits every entry. Iteration order is unspecified.
    pub(crate) fn walk(&self, mut f: impl FnMut(&Arc<Entry<K, V>>)) {
        for shard in &self.shards {
            for entry in shard.read().values() {
                f(entry);
            }
        }
    }

    /// Removes every entry and returns them for removal notification.
    pub(crate) fn drain_all(&self) -> Vec<Arc<Entry<K, V>>> {
        let mut drained = Vec::new();
        for shard in &self.shards {
            let old = std::mem::take(&mut *shard.write());
            drained.extend(old.into_values());
        }
        self.len.store(0, Ordering::Release);
        drained
    }

    /// Counts entries with a full scan; test support for the invariant that
    /// the atomic counter agrees with the maps.
    #[cfg(test)]
    pub(crate) fn scan_len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sum64;

    fn entry(key: u64, value: &'static str) -> Arc<Entry<u64, &'static str>> {
        Arc::new(Entry::new(key, Arc::new(value), sum64(&key), 0))
    }

    #[test]
    fn get_or_insert_installs_once() {
        let dir = Directory::new();
        let first = entry(1, "a");
        let second = entry(1, "b");

        assert!(dir.get_or_insert(Arc::clone(&first)).is_none());
        let existing = dir.get_or_insert(Arc::clone(&second)).unwrap();
        assert!(Arc::ptr_eq(&existing, &first));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn get_finds_installed_entries() {
        let dir = Directory::new();
        let en = entry(7, "x");
        dir.get_or_insert(Arc::clone(&en));

        let hash = sum64(&7_u64);
        let found = dir.get(&7, hash).unwrap();
        assert!(Arc::ptr_eq(&found, &en));
        assert!(dir.get(&8, sum64(&8_u64)).is_none());
    }

    #[test]
    fn remove_if_same_respects_identity() {
        let dir = Directory::new();
        let original = entry(1, "a");
        dir.get_or_insert(Arc::clone(&original));

        // A different Arc for the same key must not remove the original.
        let imposter = entry(1, "b");
        assert!(!dir.remove_if_same(&imposter));
        assert_eq!(dir.len(), 1);

        assert!(dir.remove_if_same(&original));
        assert_eq!(dir.len(), 0);
        assert!(!dir.remove_if_same(&original));
    }

    #[test]
    fn len_counter_agrees_with_scan() {
        let dir = Directory::new();
        for key in 0..100_u64 {
            dir.get_or_insert(entry(key, "v"));
        }
        assert_eq!(dir.len(), 100);
        assert_eq!(dir.len(), dir.scan_len());

        let en = dir.get(&50, sum64(&50_u64)).unwrap();
        dir.remove_if_same(&en);
        assert_eq!(dir.len(), 99);
        assert_eq!(dir.len(), dir.scan_len());
    }

    #[test]
    fn walk_visits_every_entry() {
        let dir = Directory::new();
        for key in 0..20_u64 {
            dir.get_or_insert(entry(key, "v"));
        }
        let mut seen = std::collections::HashSet::new();
        dir.walk(|en| {
            seen.insert(*en.key());
        });
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn drain_all_empties_and_returns_entries() {
        let dir = Directory::new();
        for key in 0..10_u64 {
            dir.get_or_insert(entry(key, "v"));
        }
        let drained = dir.drain_all();
        assert_eq!(drained.len(), 10);
        assert_eq!(dir.len(), 0);
        assert_eq!(dir.scan_len(), 0);
    }

    #[test]
    fn concurrent_inserts_keep_the_counter_exact() {
        let dir = Arc::new(Directory::new());
        let mut handles = Vec::new();
        for t in 0..4_u64 {
            let dir = Arc::clone(&dir);
            handles.push(std::thread::spawn(move || {
                // Overlapping key ranges force get_or_insert races.
                for key in (t * 100)..(t * 100 + 200) {
                    dir.get_or_insert(entry(key, "v"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(dir.len(), dir.scan_len());
    }
}
