//! The single-consumer policy processor.
//!
//! ## Architecture
//!
//! ```text
//!   caller threads                       processor thread
//!   ──────────────                       ────────────────
//!   put ───────► Write ─┐                loop {
//!   get hit ───► Access ├─► bounded ───►   dispatch event
//!   invalidate ► Delete ┘    channel       post-read/write cleanup
//!   close ─────► Close ──────────────►       └─ expire_entries (budgeted)
//!                                        }
//! ```
//!
//! The processor is the sole mutator of the access policy, the write
//! queue, and the per-entry queue handles. Events for one key are handled
//! in the order their API calls enqueued them; readers may observe values
//! newer than the processor's bookkeeping, which is intentional.
//!
//! Cleanup is amortized: every write sweeps for expired entries, reads
//! only every [`DRAIN_THRESHOLD`] events, and a sweep evicts at most
//! [`DRAIN_MAX`] entries across its three phases (expire-after-access,
//! expire-after-write, refresh-after-write, consumed in that order).

use std::hash::Hash;
use std::sync::{Arc, Weak};

use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};

use crate::builder::RemovalListener;
use crate::clock::Clock;
use crate::directory::Directory;
use crate::entry::Entry;
use crate::event::EntryEvent;
use crate::loader::LoaderCoordinator;
use crate::policy::{AccessPolicy, WriteQueue, WriteResult};
use crate::stats::StatsCounter;

/// Most entries a single cleanup pass will expire or refresh.
pub(crate) const DRAIN_MAX: usize = 16;
/// Reads between read-triggered cleanup passes.
pub(crate) const DRAIN_THRESHOLD: u32 = 64;

/// One-shot completion latch for `close`.
pub(crate) struct ShutdownSignal {
    done: Mutex<bool>,
    cv: Condvar,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn signal(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cv.notify_all();
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cv.wait(&mut done);
        }
    }
}

/// Background worker that owns all policy state.
pub(crate) struct Processor<K, V> {
    rx: Receiver<EntryEvent<K, V>>,
    policy: Box<dyn AccessPolicy<K, V>>,
    write_queue: WriteQueue<K, V>,
    directory: Arc<Directory<K, V>>,
    // Weak: the coordinator holds an event sender, and the processor must
    // not keep its own channel alive after the cache handle is dropped.
    coordinator: Weak<LoaderCoordinator<K, V>>,
    stats: Arc<dyn StatsCounter>,
    clock: Arc<dyn Clock>,
    expire_after_access: u64,
    expire_after_write: u64,
    refresh_after_write: u64,
    on_removal: Option<RemovalListener<K, V>>,
    on_insertion: Option<RemovalListener<K, V>>,
    shutdown: Arc<ShutdownSignal>,
    read_count: u32,
}

impl<K, V> Processor<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rx: Receiver<EntryEvent<K, V>>,
        policy: Box<dyn AccessPolicy<K, V>>,
        write_queue: WriteQueue<K, V>,
        directory: Arc<Directory<K, V>>,
        coordinator: Weak<LoaderCoordinator<K, V>>,
        stats: Arc<dyn StatsCounter>,
        clock: Arc<dyn Clock>,
        expire_after_access: u64,
        expire_after_write: u64,
        refresh_after_write: u64,
        on_removal: Option<RemovalListener<K, V>>,
        on_insertion: Option<RemovalListener<K, V>>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            rx,
            policy,
            write_queue,
            directory,
            coordinator,
            stats,
            clock,
            expire_after_access,
            expire_after_write,
            refresh_after_write,
            on_removal,
            on_insertion,
            shutdown,
            read_count: 0,
        }
    }

    /// Consumes events until `Close` arrives or every sender is gone.
    pub(crate) fn run(mut self) {
        loop {
            match self.rx.recv() {
                Ok(EntryEvent::Write(entry)) => {
                    self.handle_write(entry);
                    self.post_write_cleanup();
                },
                Ok(EntryEvent::Access(entry)) => {
                    self.policy.access(&entry);
                    self.post_read_cleanup();
                },
                Ok(EntryEvent::Delete(Some(entry))) => {
                    self.handle_delete(&entry);
                    self.post_read_cleanup();
                },
                Ok(EntryEvent::Delete(None)) => {
                    self.remove_all();
                    self.post_read_cleanup();
                },
                Ok(EntryEvent::Close) => {
                    if let Some(coordinator) = self.coordinator.upgrade() {
                        coordinator.close_reloader();
                    }
                    self.remove_all();
                    break;
                },
                // Cache handle dropped without close: exit without removal
                // notifications.
                Err(_) => break,
            }
        }
        self.shutdown.signal();
    }

    fn handle_write(&mut self, entry: Arc<Entry<K, V>>) {
        let WriteResult { written, evicted } = self.policy.write(&entry);
        self.write_queue.record_write(&written);
        if let Some(victim) = evicted {
            self.write_queue.remove(&victim);
            self.stats.record_eviction();
            self.notify_removal(&victim);
        }
        if let Some(on_insertion) = &self.on_insertion {
            let value = written.value();
            on_insertion(written.key(), &value);
        }
    }

    fn handle_delete(&mut self, entry: &Arc<Entry<K, V>>) {
        if let Some(removed) = self.policy.remove(entry) {
            self.write_queue.remove(&removed);
            self.notify_removal(&removed);
        }
    }

    fn remove_all(&mut self) {
        let entries = self.directory.drain_all();
        self.policy.clear_handles();
        self.write_queue.clear_handles();
        for entry in &entries {
            self.notify_removal(entry);
        }
    }

    fn notify_removal(&self, entry: &Arc<Entry<K, V>>) {
        if let Some(on_removal) = &self.on_removal {
            let value = entry.value();
            on_removal(entry.key(), &value);
        }
    }

    fn post_read_cleanup(&mut self) {
        self.read_count += 1;
        if self.read_count > DRAIN_THRESHOLD {
            self.read_count = 0;
            self.expire_entries();
        }
    }

    fn post_write_cleanup(&mut self) {
        self.read_count = 0;
        self.expire_entries();
    }

    /// Expires and refreshes up to [`DRAIN_MAX`] entries, in phase order.
    fn expire_entries(&mut self) {
        let mut remaining = DRAIN_MAX;
        let now = self.clock.now();

        if self.expire_after_access > 0 && remaining > 0 {
            let deadline = now.saturating_sub(self.expire_after_access);
            for entry in self.policy.expired(deadline, remaining) {
                self.evict_expired(&entry);
                remaining -= 1;
            }
        }

        if self.expire_after_write > 0 && remaining > 0 {
            let deadline = now.saturating_sub(self.expire_after_write);
            for entry in self.write_queue.expired(deadline, remaining) {
                self.evict_expired(&entry);
                remaining -= 1;
            }
        }

        if self.refresh_after_write > 0 && remaining > 0 {
            let Some(coordinator) = self.coordinator.upgrade() else {
                return;
            };
            if !coordinator.has_loader() {
                return;
            }
            let deadline = now.saturating_sub(self.refresh_after_write);
            for entry in self.write_queue.refresh_candidates(deadline, remaining) {
                if coordinator.refresh_async(&entry) {
                    remaining -= 1;
                }
            }
        }
    }

    fn evict_expired(&mut self, entry: &Arc<Entry<K, V>>) {
        if let Some(removed) = self.policy.remove(entry) {
            self.write_queue.remove(&removed);
            self.stats.record_eviction();
            self.notify_removal(&removed);
        }
    }
}
