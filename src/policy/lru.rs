//! Least-recently-used access policy.
//!
//! A single [`EntryList`]: writes and hits move entries to the front, and a
//! write that pushes the list past capacity evicts the back. The list is
//! therefore sorted by access time, which is what lets the expiration sweep
//! stop at the first live entry.

use std::hash::Hash;
use std::sync::Arc;

use crate::directory::Directory;
use crate::ds::EntryList;
use crate::entry::Entry;
use crate::policy::{resolve_written, AccessPolicy, WriteResult};

/// Single-list LRU.
pub(crate) struct LruPolicy<K, V> {
    capacity: usize,
    directory: Arc<Directory<K, V>>,
    list: EntryList<Arc<Entry<K, V>>>,
}

impl<K, V> LruPolicy<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an LRU policy; `capacity` 0 means unbounded.
    pub(crate) fn new(capacity: usize, directory: Arc<Directory<K, V>>) -> Self {
        Self {
            capacity,
            directory,
            list: EntryList::new(),
        }
    }

    fn evict_back(&mut self) -> Option<Arc<Entry<K, V>>> {
        let victim = self.list.pop_back()?;
        victim.set_access_slot(None);
        self.directory.remove_if_same(&victim);
        Some(victim)
    }
}

impl<K, V> AccessPolicy<K, V> for LruPolicy<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn write(&mut self, entry: &Arc<Entry<K, V>>) -> WriteResult<K, V> {
        let written = if entry.access_slot().is_some() {
            Arc::clone(entry)
        } else {
            resolve_written(&self.directory, entry)
        };

        match written.access_slot() {
            Some(id) => {
                self.list.move_to_front(id);
            },
            None => {
                let id = self.list.push_front(Arc::clone(&written));
                written.set_access_slot(Some(id));
            },
        }

        let evicted = if self.capacity > 0 && self.list.len() > self.capacity {
            self.evict_back()
        } else {
            None
        };
        WriteResult { written, evicted }
    }

    fn access(&mut self, entry: &Arc<Entry<K, V>>) {
        if let Some(id) = entry.access_slot() {
            self.list.move_to_front(id);
        }
    }

    fn remove(&mut self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Entry<K, V>>> {
        let id = entry.access_slot()?;
        let removed = self.list.remove(id)?;
        removed.set_access_slot(None);
        self.directory.remove_if_same(&removed);
        Some(removed)
    }

    fn expired(&self, deadline: u64, budget: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::new();
        for entry in self.list.iter_rev() {
            if out.len() >= budget || entry.access_time() >= deadline {
                break;
            }
            out.push(Arc::clone(entry));
        }
        out
    }

    fn clear_handles(&mut self) {
        for entry in self.list.iter() {
            entry.set_access_slot(None);
        }
        self.list.clear();
    }

    fn len(&self) -> usize {
        self.list.len()
    }
}
