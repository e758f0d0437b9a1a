//! Loader coordination: synchronous loads and single-flight refresh.
//!
//! ## Architecture
//!
//! ```text
//!   LoadingCache::get (miss)          refresh (stale hit / sweep / manual)
//!        │ caller's thread                 │ CAS entry.loading 0→1
//!        ▼                                 ▼ winner only
//!   loader(key) ── install ── Write   Reloader::reload(key, old, setter)
//!                                     or, without a reloader:
//!                                     spawned thread: setter(loader(key))
//! ```
//!
//! Synchronous loads are deliberately not deduplicated: two threads missing
//! the same key both run the loader, and the first to install wins (the
//! other observes the installed entry). Only *refresh* is single-flight,
//! gated by the entry's loading flag.
//!
//! The setter is the single completion path for a refresh, on success and
//! failure alike: it publishes the value, stamps the write time, clears
//! the loading flag, enqueues the Write event, and records load
//! statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::entry::Entry;
use crate::error::LoadError;
use crate::event::EntryEvent;
use crate::stats::StatsCounter;

/// Function that computes the value for a key.
pub type LoaderFn<K, V> = Arc<dyn Fn(&K) -> Result<V, LoadError> + Send + Sync>;

/// Completion callback handed to a [`Reloader`].
pub type ValueSetter<V> = Box<dyn FnOnce(Result<V, LoadError>) + Send>;

/// Custom executor for asynchronous refreshes.
///
/// When configured, the cache hands every refresh to `reload` instead of
/// spawning a thread. The implementation must eventually invoke `set`
/// exactly once with the outcome; until then the entry's refresh stays
/// claimed and further refreshes of the same key are suppressed.
///
/// `reload` must not invoke the setter synchronously on the calling
/// thread: the setter enqueues an event and may block on a full cache, and
/// the caller can be the cache's own processor.
pub trait Reloader<K, V>: Send {
    /// Schedules a reload of `key`; `old_value` is the currently cached value.
    fn reload(&self, key: &K, old_value: Arc<V>, set: ValueSetter<V>);

    /// Called once when the cache closes.
    fn close(&mut self);
}

/// Shared state behind loads and refreshes.
pub(crate) struct LoaderCoordinator<K, V> {
    loader: Option<LoaderFn<K, V>>,
    reloader: Mutex<Option<Box<dyn Reloader<K, V>>>>,
    tx: Sender<EntryEvent<K, V>>,
    stats: Arc<dyn StatsCounter>,
    clock: Arc<dyn Clock>,
    closed: Arc<AtomicBool>,
}

impl<K, V> LoaderCoordinator<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        loader: Option<LoaderFn<K, V>>,
        reloader: Option<Box<dyn Reloader<K, V>>>,
        tx: Sender<EntryEvent<K, V>>,
        stats: Arc<dyn StatsCounter>,
        clock: Arc<dyn Clock>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            loader,
            reloader: Mutex::new(reloader),
            tx,
            stats,
            clock,
            closed,
        }
    }

    pub(crate) fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Runs the loader on the caller's thread, without timing or stats.
    pub(crate) fn call_loader(&self, key: &K) -> Result<V, LoadError> {
        match &self.loader {
            Some(loader) => loader(key),
            None => Err(LoadError::message("no loader configured")),
        }
    }

    /// Starts an asynchronous refresh of `entry` if none is in flight.
    ///
    /// Returns `true` when this call claimed the refresh.
    pub(crate) fn refresh_async(&self, entry: &Arc<Entry<K, V>>) -> bool {
        let Some(loader) = self.loader.clone() else {
            return false;
        };
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        if !entry.try_begin_loading() {
            return false;
        }

        let setter = self.setter(Arc::clone(entry));
        {
            let reloader = self.reloader.lock();
            if let Some(reloader) = reloader.as_ref() {
                reloader.reload(entry.key(), entry.value(), setter);
                return true;
            }
        }

        let key = entry.key().clone();
        let spawned = std::thread::Builder::new()
            .name("cachette-refresh".to_string())
            .spawn(move || setter(loader(&key)));
        match spawned {
            Ok(_) => true,
            Err(_) => {
                // Could not start the worker; release the claim so a later
                // sweep can retry.
                entry.end_loading();
                false
            },
        }
    }

    /// Shuts down the reloader, if one is configured.
    pub(crate) fn close_reloader(&self) {
        if let Some(mut reloader) = self.reloader.lock().take() {
            reloader.close();
        }
    }

    fn setter(&self, entry: Arc<Entry<K, V>>) -> ValueSetter<V> {
        let tx = self.tx.clone();
        let stats = Arc::clone(&self.stats);
        let clock = Arc::clone(&self.clock);
        let closed = Arc::clone(&self.closed);
        let start = clock.now();
        Box::new(move |result| {
            let load_time = Duration::from_nanos(clock.now().saturating_sub(start));
            match result {
                Ok(value) => {
                    let now = clock.now();
                    entry.set_value(Arc::new(value));
                    entry.set_write_time(now);
                    entry.set_access_time(now);
                    entry.set_invalidated(false);
                    entry.end_loading();
                    stats.record_load_success(load_time);
                    if !closed.load(Ordering::Acquire) {
                        let _ = tx.send(EntryEvent::Write(entry));
                    }
                },
                Err(_) => {
                    // The stale value stays; only the error is counted.
                    entry.end_loading();
                    stats.record_load_error(load_time);
                },
            }
        })
    }
}
