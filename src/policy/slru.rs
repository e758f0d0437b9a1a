//! Segmented LRU access policy.
//!
//! Two lists provide scan resistance: new entries prove themselves in
//! probation (20% of capacity) before a hit promotes them into protected
//! (80%). One-shot scans churn through probation without touching the
//! protected working set.
//!
//! ```text
//!   write ──► probation front          hit on probation entry
//!                  │                        │ promote
//!                  ▼                        ▼
//!   evict ◄── probation back          protected front ──► overflow demotes
//!                                     protected back ───► probation front
//! ```

use std::hash::Hash;
use std::sync::Arc;

use crate::directory::Directory;
use crate::ds::EntryList;
use crate::entry::{Entry, Segment};
use crate::policy::{resolve_written, AccessPolicy, WriteResult};

const PROTECTED_RATIO: f64 = 0.8;

/// Probation/protected segmented LRU.
pub(crate) struct SlruPolicy<K, V> {
    capacity: usize,
    protected_cap: usize,
    directory: Arc<Directory<K, V>>,
    probation: EntryList<Arc<Entry<K, V>>>,
    protected: EntryList<Arc<Entry<K, V>>>,
}

impl<K, V> SlruPolicy<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an SLRU policy; `capacity` 0 means unbounded.
    pub(crate) fn new(capacity: usize, directory: Arc<Directory<K, V>>) -> Self {
        Self {
            capacity,
            protected_cap: (capacity as f64 * PROTECTED_RATIO) as usize,
            directory,
            probation: EntryList::new(),
            protected: EntryList::new(),
        }
    }

    pub(crate) fn total_len(&self) -> usize {
        self.probation.len() + self.protected.len()
    }

    /// Inserts an already-resolved entry at the probation front.
    pub(crate) fn insert_probation(&mut self, entry: &Arc<Entry<K, V>>) {
        let id = self.probation.push_front(Arc::clone(entry));
        entry.set_access_slot(Some(id));
        entry.set_segment(Segment::Probation);
    }

    /// The entry next in line for eviction, probation first.
    pub(crate) fn victim(&self) -> Option<&Arc<Entry<K, V>>> {
        if self.probation.is_empty() {
            self.protected.back()
        } else {
            self.probation.back()
        }
    }

    /// Evicts the victim, deleting it from the directory.
    pub(crate) fn evict_victim(&mut self) -> Option<Arc<Entry<K, V>>> {
        let victim = self
            .probation
            .pop_back()
            .or_else(|| self.protected.pop_back())?;
        victim.set_access_slot(None);
        self.directory.remove_if_same(&victim);
        Some(victim)
    }

    /// Moves a hit entry up: probation entries promote into protected,
    /// protected entries just move to the front.
    pub(crate) fn touch(&mut self, entry: &Arc<Entry<K, V>>) {
        let Some(id) = entry.access_slot() else {
            return;
        };
        match entry.segment() {
            Segment::Probation => {
                if self.probation.remove(id).is_none() {
                    return;
                }
                let new_id = self.protected.push_front(Arc::clone(entry));
                entry.set_access_slot(Some(new_id));
                entry.set_segment(Segment::Protected);
                self.demote_overflow();
            },
            Segment::Protected => {
                self.protected.move_to_front(id);
            },
            Segment::Window => {},
        }
    }

    /// Removes an entry from whichever segment list holds it.
    pub(crate) fn unlink(&mut self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Entry<K, V>>> {
        let id = entry.access_slot()?;
        let removed = match entry.segment() {
            Segment::Probation => self.probation.remove(id),
            Segment::Protected => self.protected.remove(id),
            Segment::Window => None,
        }?;
        removed.set_access_slot(None);
        Some(removed)
    }

    /// Collects expired entries, probation back first, then protected.
    pub(crate) fn collect_expired(
        &self,
        deadline: u64,
        budget: usize,
        out: &mut Vec<Arc<Entry<K, V>>>,
    ) {
        for entry in self.probation.iter_rev() {
            if out.len() >= budget || entry.access_time() >= deadline {
                return;
            }
            out.push(Arc::clone(entry));
        }
        for entry in self.protected.iter_rev() {
            if out.len() >= budget || entry.access_time() >= deadline {
                return;
            }
            out.push(Arc::clone(entry));
        }
    }

    /// Clears both lists and the handles of the entries in them.
    pub(crate) fn reset(&mut self) {
        for entry in self.probation.iter().chain(self.protected.iter()) {
            entry.set_access_slot(None);
            entry.set_segment(Segment::Window);
        }
        self.probation.clear();
        self.protected.clear();
    }

    fn demote_overflow(&mut self) {
        if self.protected_cap == 0 && self.capacity == 0 {
            // Unbounded cache: protected never overflows.
            return;
        }
        while self.protected.len() > self.protected_cap.max(1) {
            let Some(demoted) = self.protected.pop_back() else {
                break;
            };
            demoted.set_access_slot(None);
            let id = self.probation.push_front(Arc::clone(&demoted));
            demoted.set_access_slot(Some(id));
            demoted.set_segment(Segment::Probation);
        }
    }
}

impl<K, V> AccessPolicy<K, V> for SlruPolicy<K, V>
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

        if written.access_slot().is_some() {
            // Duplicate write behaves like a hit.
            self.touch(&written);
            return WriteResult {
                written,
                evicted: None,
            };
        }

        self.insert_probation(&written);
        let evicted = if self.capacity > 0 && self.total_len() > self.capacity {
            self.evict_victim()
        } else {
            None
        };
        WriteResult { written, evicted }
    }

    fn access(&mut self, entry: &Arc<Entry<K, V>>) {
        self.touch(entry);
    }

    fn remove(&mut self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Entry<K, V>>> {
        let removed = self.unlink(entry)?;
        self.directory.remove_if_same(&removed);
        Some(removed)
    }

    fn expired(&self, deadline: u64, budget: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::new();
        self.collect_expired(deadline, budget, &mut out);
        out
    }

    fn clear_handles(&mut self) {
        self.reset();
    }

    fn len(&self) -> usize {
        self.total_len()
    }
}
