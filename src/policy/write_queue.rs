//! Insertion-ordered queue for write-based expiry and refresh.
//!
//! A single [`EntryList`] ordered by write time: every write pushes or
//! moves its entry to the front, so the back is always the stalest write.
//! The expire-after-write and refresh-after-write sweeps walk from the back
//! and stop at the first entry that is still fresh.
//!
//! The queue is only maintained when a write-based horizon is configured;
//! otherwise every operation is a no-op and entries never get a write
//! handle.

use std::sync::Arc;

use crate::ds::EntryList;
use crate::entry::Entry;

/// Write-time ordered queue over cached entries.
pub(crate) struct WriteQueue<K, V> {
    enabled: bool,
    list: EntryList<Arc<Entry<K, V>>>,
}

impl<K, V> WriteQueue<K, V> {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            list: EntryList::new(),
        }
    }

    /// Pushes a newly written entry to the front, or moves it there.
    pub(crate) fn record_write(&mut self, entry: &Arc<Entry<K, V>>) {
        if !self.enabled {
            return;
        }
        match entry.write_slot() {
            Some(id) => {
                self.list.move_to_front(id);
            },
            None => {
                let id = self.list.push_front(Arc::clone(entry));
                entry.set_write_slot(Some(id));
            },
        }
    }

    /// Unlinks an evicted or invalidated entry; no-op without a handle.
    pub(crate) fn remove(&mut self, entry: &Arc<Entry<K, V>>) {
        if let Some(id) = entry.write_slot() {
            if self.list.remove(id).is_some() {
                entry.set_write_slot(None);
            }
        }
    }

    /// Collects up to `budget` entries written before `deadline`, stalest
    /// first, stopping at the first fresh entry.
    pub(crate) fn expired(&self, deadline: u64, budget: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::new();
        for entry in self.list.iter_rev() {
            if out.len() >= budget || entry.write_time() >= deadline {
                break;
            }
            out.push(Arc::clone(entry));
        }
        out
    }

    /// Like [`expired`](Self::expired), but skips entries that already have
    /// a refresh in flight.
    pub(crate) fn refresh_candidates(
        &self,
        deadline: u64,
        budget: usize,
    ) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::new();
        for entry in self.list.iter_rev() {
            if out.len() >= budget || entry.write_time() >= deadline {
                break;
            }
            if !entry.is_loading() {
                out.push(Arc::clone(entry));
            }
        }
        out
    }

    /// Clears the queue and the write handles of the entries in it.
    pub(crate) fn clear_handles(&mut self) {
        for entry in self.list.iter() {
            entry.set_write_slot(None);
        }
        self.list.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }
}
