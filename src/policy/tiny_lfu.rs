//! W-TinyLFU access policy.
//!
//! ## Architecture
//!
//! ```text
//!   write ──► admission window (LRU, 1% of capacity)
//!                     │ overflow: back of window = candidate
//!                     ▼
//!          ┌─ admission contest ─────────────────────────────┐
//!          │  candidate unknown to the doorkeeper while the  │
//!          │  victim is known? evict the candidate.          │
//!          │  else: estimate(candidate) > estimate(victim) ? │
//!          │    yes: evict victim, candidate → probation     │
//!          │    no:  evict candidate (ties keep the victim)  │
//!          └──────────────────────────────────────────────────┘
//!                     ▼
//!            main SLRU (99%): probation 20% / protected 80%
//! ```
//!
//! The contest compares raw Count-Min estimates and is gated by the
//! doorkeeper, a bloom filter recording every key sighted since the last
//! decay: a candidate the doorkeeper has not seen is rejected outright
//! unless the victim is equally unknown. Every `sketch.width()` sightings
//! both structures decay (counters halve, doorkeeper clears), so stale
//! popularity fades.
//!
//! The window absorbs bursts of brand-new keys; the contest keeps one-hit
//! wonders from displacing entries with an established record.

use std::hash::Hash;
use std::sync::Arc;

use crate::directory::Directory;
use crate::ds::EntryList;
use crate::entry::{Entry, Segment};
use crate::policy::slru::SlruPolicy;
use crate::policy::{resolve_written, AccessPolicy, WriteResult};
use crate::sketch::{CountMinSketch, Doorkeeper};

const WINDOW_RATIO: f64 = 0.01;
// Sketch memory is bounded even for enormous caches; past this width the
// extra resolution stops paying for itself.
const MAX_SKETCH_WIDTH: usize = 1 << 20;

/// TinyLFU with an LRU admission window in front of an SLRU main area.
pub(crate) struct TinyLfuPolicy<K, V> {
    capacity: usize,
    window_cap: usize,
    main_cap: usize,
    directory: Arc<Directory<K, V>>,
    window: EntryList<Arc<Entry<K, V>>>,
    main: SlruPolicy<K, V>,
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
    additions: usize,
    sample_size: usize,
}

impl<K, V> TinyLfuPolicy<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a TinyLFU policy; `capacity` 0 means unbounded.
    pub(crate) fn new(capacity: usize, directory: Arc<Directory<K, V>>) -> Self {
        let window_cap = if capacity == 0 {
            0
        } else {
            ((capacity as f64 * WINDOW_RATIO) as usize).max(1)
        };
        let main_cap = capacity.saturating_sub(window_cap);
        let sketch_width = capacity.clamp(1, MAX_SKETCH_WIDTH);
        let sketch = CountMinSketch::new(sketch_width);
        let sample_size = sketch.width();
        Self {
            capacity,
            window_cap,
            main_cap,
            directory: Arc::clone(&directory),
            window: EntryList::new(),
            // The main SLRU's own write/evict path is unused here; its
            // capacity only drives the protected/probation balance.
            main: SlruPolicy::new(main_cap, directory),
            sketch,
            doorkeeper: Doorkeeper::new(sketch_width),
            additions: 0,
            sample_size,
        }
    }

    /// Records a sighting of `hash` and ages the sketch on schedule.
    fn note(&mut self, hash: u64) {
        self.additions += 1;
        if self.additions >= self.sample_size {
            self.additions = 0;
            self.sketch.reset();
            self.doorkeeper.reset();
        }
        self.sketch.add(hash);
        self.doorkeeper.insert(hash);
    }

    /// The admission test: doorkeeper gate first, then raw estimates.
    ///
    /// A candidate the doorkeeper has not seen since the last decay loses
    /// outright unless the victim is equally unknown. Ties on the estimate
    /// keep the victim.
    fn admit(&self, candidate_hash: u64, victim_hash: u64) -> bool {
        if !self.doorkeeper.contains(candidate_hash) && self.doorkeeper.contains(victim_hash)
        {
            return false;
        }
        self.sketch.estimate(candidate_hash) > self.sketch.estimate(victim_hash)
    }

    fn mark_access(&mut self, entry: &Arc<Entry<K, V>>) {
        match entry.segment() {
            Segment::Window => {
                if let Some(id) = entry.access_slot() {
                    self.window.move_to_front(id);
                }
            },
            Segment::Probation | Segment::Protected => self.main.touch(entry),
        }
    }

    /// Handles window overflow: the window tail competes for admission.
    fn admit_candidate(&mut self) -> Option<Arc<Entry<K, V>>> {
        let candidate_id = self.window.back_id()?;
        let candidate = self.window.remove(candidate_id)?;
        candidate.set_access_slot(None);

        if self.main_cap == 0 {
            // Degenerate sizing (total capacity 1): nothing to contest.
            self.directory.remove_if_same(&candidate);
            return Some(candidate);
        }
        if self.main.total_len() < self.main_cap {
            self.main.insert_probation(&candidate);
            return None;
        }

        let victim = self.main.victim().cloned();
        let Some(victim) = victim else {
            self.main.insert_probation(&candidate);
            return None;
        };

        if self.admit(candidate.hash(), victim.hash()) {
            self.main.evict_victim();
            self.main.insert_probation(&candidate);
            Some(victim)
        } else {
            self.directory.remove_if_same(&candidate);
            Some(candidate)
        }
    }
}

impl<K, V> AccessPolicy<K, V> for TinyLfuPolicy<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn write(&mut self, entry: &Arc<Entry<K, V>>) -> WriteResult<K, V> {
        self.note(entry.hash());

        let written = if entry.access_slot().is_some() {
            Arc::clone(entry)
        } else {
            resolve_written(&self.directory, entry)
        };

        if written.access_slot().is_some() {
            // Duplicate write behaves like a hit.
            self.mark_access(&written);
            return WriteResult {
                written,
                evicted: None,
            };
        }

        let id = self.window.push_front(Arc::clone(&written));
        written.set_access_slot(Some(id));
        written.set_segment(Segment::Window);

        let evicted = if self.capacity > 0 && self.window.len() > self.window_cap {
            self.admit_candidate()
        } else {
            None
        };
        WriteResult { written, evicted }
    }

    fn access(&mut self, entry: &Arc<Entry<K, V>>) {
        self.note(entry.hash());
        self.mark_access(entry);
    }

    fn remove(&mut self, entry: &Arc<Entry<K, V>>) -> Option<Arc<Entry<K, V>>> {
        match entry.segment() {
            Segment::Window => {
                let id = entry.access_slot()?;
                let removed = self.window.remove(id)?;
                removed.set_access_slot(None);
                self.directory.remove_if_same(&removed);
                Some(removed)
            },
            Segment::Probation | Segment::Protected => {
                let removed = self.main.unlink(entry)?;
                self.directory.remove_if_same(&removed);
                Some(removed)
            },
        }
    }

    fn expired(&self, deadline: u64, budget: usize) -> Vec<Arc<Entry<K, V>>> {
        let mut out = Vec::new();
        for entry in self.window.iter_rev() {
            if out.len() >= budget || entry.access_time() >= deadline {
                return out;
            }
            out.push(Arc::clone(entry));
        }
        self.main.collect_expired(deadline, budget, &mut out);
        out
    }

    fn clear_handles(&mut self) {
        for entry in self.window.iter() {
            entry.set_access_slot(None);
        }
        self.window.clear();
        self.main.reset();
        self.sketch = CountMinSketch::new(self.capacity.clamp(1, MAX_SKETCH_WIDTH));
        self.doorkeeper.reset();
        self.additions = 0;
    }

    fn len(&self) -> usize {
        self.window.len() + self.main.total_len()
    }
}
