//! Access policies: the recency/frequency structures that decide eviction.
//!
//! ## Architecture
//!
//! ```text
//!                    processor thread (sole mutator)
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  AccessPolicy                                                │
//!   │  ┌──────────┐   ┌───────────────────┐   ┌─────────────────┐  │
//!   │  │ LruPolicy│   │ SlruPolicy        │   │ TinyLfuPolicy   │  │
//!   │  │ one list │   │ probation 20%     │   │ window 1%       │  │
//!   │  │          │   │ protected 80%     │   │ + SLRU main 99% │  │
//!   │  │          │   │                   │   │ + sketch/door   │  │
//!   │  └──────────┘   └───────────────────┘   └─────────────────┘  │
//!   └──────────────────────────────────────────────────────────────┘
//!            │ evictions delete from the shared Directory
//!            ▼
//!      on_removal / eviction stats (processor)
//! ```
//!
//! Policies run exclusively on the processor thread. They own the linked
//! lists, write the per-entry queue handles and segment markers, and delete
//! evicted entries from the directory. A `write` may receive an entry that
//! is not yet in the directory (a put issued while the cache was at
//! capacity installs lazily); the policy resolves it against the directory
//! first, so a racing insert of the same key collapses onto one entry.
//!
//! Shared edge-case rules:
//! - capacity `0` means unbounded: no eviction ever happens;
//! - a duplicate write re-orders the existing entry to the front;
//! - removing an entry whose handle is already cleared is a no-op.

pub(crate) mod lru;
pub(crate) mod slru;
pub(crate) mod tiny_lfu;
pub(crate) mod write_queue;

use std::hash::Hash;
use std::sync::Arc;

use crate::builder::EvictionPolicy;
use crate::directory::Directory;
use crate::entry::Entry;

pub(crate) use lru::LruPolicy;
pub(crate) use slru::SlruPolicy;
pub(crate) use tiny_lfu::TinyLfuPolicy;
pub(crate) use write_queue::WriteQueue;

/// Outcome of a policy write.
pub(crate) struct WriteResult<K, V> {
    /// The canonical entry the write landed on. Differs from the event
    /// entry when a racing write of the same key got there first.
    pub(crate) written: Arc<Entry<K, V>>,
    /// Entry evicted to make room, already deleted from the directory.
    pub(crate) evicted: Option<Arc<Entry<K, V>>>,
}

/// Recency/frequency bookkeeping over cached entries.
pub(crate) trait AccessPolicy<K, V>: Send {
    /// Records a write, installing the entry if it is new. Returns the
    /// canonical entry and any eviction the write forced.
    fn write(&mut self, entry: &Arc<Entry<K, V>>) -> WriteResult<K, V>;

    /// Records a read hit.
    fn access(&mut self, entry: &Arc<Entry<K, V>>);

    /// Removes the entry from the policy and the directory. No-op when the
    /// entry is no longer tracked.
    fn remove(&mut self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Entry<K, V>>>;

    /// Collects up to `budget` entries from the eviction end whose access
    /// time is older than `deadline`, stopping at the first live entry.
    fn expired(&self, deadline: u64, budget: usize) -> Vec<Arc<Entry<K, V>>>;

    /// Drops all list state and clears the handles on the entries so they
    /// can be re-registered later.
    fn clear_handles(&mut self);

    /// Number of entries currently tracked.
    fn len(&self) -> usize;
}

/// Builds the policy selected at configuration time.
pub(crate) fn new_policy<K, V>(
    kind: EvictionPolicy,
    capacity: usize,
    directory: Arc<Directory<K, V>>,
) -> Box<dyn AccessPolicy<K, V>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    match kind {
        EvictionPolicy::Lru => Box::new(LruPolicy::new(capacity, directory)),
        EvictionPolicy::Slru => Box::new(SlruPolicy::new(capacity, directory)),
        EvictionPolicy::TinyLfu => Box::new(TinyLfuPolicy::new(capacity, directory)),
    }
}

/// Resolves a written entry against the directory.
///
/// Installs `entry` when its key is absent; otherwise forwards the written
/// value and write time onto the entry that won, which becomes canonical.
pub(crate) fn resolve_written<K, V>(
    directory: &Directory<K, V>,
    entry: &Arc<Entry<K, V>>,
) -> Arc<Entry<K, V>>
where
    K: Eq + Hash + Clone,
{
    match directory.get_or_insert(Arc::clone(entry)) {
        None => Arc::clone(entry),
        Some(existing) => {
            if !Arc::ptr_eq(&existing, entry) {
                existing.set_value(entry.value());
                existing.set_write_time(entry.write_time());
            }
            existing
        },
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn entry(key: u64, value: u64) -> Arc<Entry<u64, u64>> {
        entry_at(key, value, 0)
    }

    pub(crate) fn entry_at(key: u64, value: u64, now: u64) -> Arc<Entry<u64, u64>> {
        Arc::new(Entry::new(
            key,
            Arc::new(value),
            crate::hash::sum64(&key),
            now,
        ))
    }
}
