//! Cache configuration and construction.
//!
//! [`CacheBuilder`] assembles a [`Cache`] or [`LoadingCache`]: it wires the
//! sharded directory, the bounded event channel, the selected access
//! policy, and the background processor thread together, then hands back a
//! facade.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use cachette::{CacheBuilder, EvictionPolicy};
//!
//! let cache = CacheBuilder::new()
//!     .maximum_size(10_000)
//!     .expire_after_access(Duration::from_secs(300))
//!     .policy(EvictionPolicy::TinyLfu)
//!     .build();
//! cache.put("k", "v");
//! cache.close();
//! ```

use std::hash::Hash;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, CacheCore, LoadingCache};
use crate::clock::{Clock, SystemClock};
use crate::directory::Directory;
use crate::error::{ConfigError, LoadError};
use crate::event::EVENT_BUFFER;
use crate::loader::{LoaderCoordinator, LoaderFn, Reloader};
use crate::policy::{new_policy, WriteQueue};
use crate::processor::{Processor, ShutdownSignal};
use crate::stats::{ConcurrentStatsCounter, StatsCounter};

/// Hard ceiling on `maximum_size`; "unbounded" resolves to this.
const MAX_CAPACITY: usize = 1 << 30;

/// Callback invoked with a key and value on removal or insertion.
///
/// Runs on the processor thread; it must not call back into the cache.
pub type RemovalListener<K, V> = Box<dyn Fn(&K, &V) + Send>;

/// Eviction policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Plain least-recently-used.
    Lru,
    /// Segmented LRU: probation + protected segments, scan resistant.
    Slru,
    /// W-TinyLFU: LRU admission window with sketch-based admission into a
    /// segmented main area. The default.
    TinyLfu,
}

/// Builder for [`Cache`] and [`LoadingCache`].
///
/// Durations of zero leave the corresponding mechanism disabled, and a
/// `maximum_size` of zero means unbounded (clamped internally to 2^30
/// entries).
pub struct CacheBuilder<K, V> {
    maximum_size: usize,
    expire_after_access: Duration,
    expire_after_write: Duration,
    refresh_after_write: Duration,
    policy: EvictionPolicy,
    on_removal: Option<RemovalListener<K, V>>,
    on_insertion: Option<RemovalListener<K, V>>,
    stats_counter: Option<Arc<dyn StatsCounter>>,
    clock: Option<Arc<dyn Clock>>,
    reloader: Option<Box<dyn Reloader<K, V>>>,
}

impl<K, V> Default for CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a builder with defaults: unbounded, TinyLFU, no expiration.
    pub fn new() -> Self {
        Self {
            maximum_size: 0,
            expire_after_access: Duration::ZERO,
            expire_after_write: Duration::ZERO,
            refresh_after_write: Duration::ZERO,
            policy: EvictionPolicy::TinyLfu,
            on_removal: None,
            on_insertion: None,
            stats_counter: None,
            clock: None,
            reloader: None,
        }
    }

    /// Caps the number of cached entries; 0 means unbounded.
    pub fn maximum_size(mut self, size: usize) -> Self {
        self.maximum_size = size;
        self
    }

    /// Expires entries unused for `d`. Zero disables.
    pub fn expire_after_access(mut self, d: Duration) -> Self {
        self.expire_after_access = d;
        self
    }

    /// Expires entries `d` after their last write. Zero disables.
    pub fn expire_after_write(mut self, d: Duration) -> Self {
        self.expire_after_write = d;
        self
    }

    /// Refreshes entries asynchronously `d` after their last write.
    /// Requires a loader; zero disables.
    pub fn refresh_after_write(mut self, d: Duration) -> Self {
        self.refresh_after_write = d;
        self
    }

    /// Selects the eviction policy. Defaults to [`EvictionPolicy::TinyLfu`].
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Invokes `listener` once for every entry that is evicted,
    /// invalidated, or removed during close.
    pub fn on_removal(mut self, listener: impl Fn(&K, &V) + Send + 'static) -> Self {
        self.on_removal = Some(Box::new(listener));
        self
    }

    /// Invokes `listener` after the processor registers a write. Intended
    /// for tests that need to detect quiescence.
    pub fn on_insertion(mut self, listener: impl Fn(&K, &V) + Send + 'static) -> Self {
        self.on_insertion = Some(Box::new(listener));
        self
    }

    /// Replaces the default statistics counter.
    pub fn stats_counter(mut self, counter: Arc<dyn StatsCounter>) -> Self {
        self.stats_counter = Some(counter);
        self
    }

    /// Replaces the time source; see [`MockClock`](crate::MockClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Dispatches asynchronous refreshes to `reloader` instead of spawning
    /// threads. Only meaningful with a loader.
    pub fn reloader(mut self, reloader: impl Reloader<K, V> + 'static) -> Self {
        self.reloader = Some(Box::new(reloader));
        self
    }

    /// Builds a manual [`Cache`].
    ///
    /// # Panics
    ///
    /// Panics on an invalid configuration; use
    /// [`try_build`](Self::try_build) to handle it as an error.
    pub fn build(self) -> Cache<K, V> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {err}"),
        }
    }

    /// Builds a manual [`Cache`], validating the configuration.
    pub fn try_build(self) -> Result<Cache<K, V>, ConfigError> {
        if !self.refresh_after_write.is_zero() {
            return Err(ConfigError::new(
                "refresh_after_write requires a loader; use build_with_loader",
            ));
        }
        if self.reloader.is_some() {
            return Err(ConfigError::new(
                "a reloader requires a loader; use build_with_loader",
            ));
        }
        Ok(Cache::from_core(self.build_core(None)))
    }

    /// Builds a [`LoadingCache`] around `loader`.
    pub fn build_with_loader(
        self,
        loader: impl Fn(&K) -> Result<V, LoadError> + Send + Sync + 'static,
    ) -> LoadingCache<K, V> {
        let loader: LoaderFn<K, V> = Arc::new(loader);
        LoadingCache::from_core(self.build_core(Some(loader)))
    }

    fn build_core(self, loader: Option<LoaderFn<K, V>>) -> Arc<CacheCore<K, V>> {
        // Unbounded caches get a no-eviction policy (capacity 0) but still
        // clamp the facade's install check at the hard ceiling.
        let (policy_capacity, install_capacity) = if self.maximum_size == 0 {
            (0, MAX_CAPACITY)
        } else {
            let cap = self.maximum_size.min(MAX_CAPACITY);
            (cap, cap)
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let stats = self
            .stats_counter
            .unwrap_or_else(|| Arc::new(ConcurrentStatsCounter::new()) as Arc<dyn StatsCounter>);
        let directory = Arc::new(Directory::new());
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(ShutdownSignal::new());
        let (tx, rx) = crossbeam_channel::bounded(EVENT_BUFFER);

        let coordinator = Arc::new(LoaderCoordinator::new(
            loader,
            self.reloader,
            tx.clone(),
            Arc::clone(&stats),
            Arc::clone(&clock),
            Arc::clone(&closed),
        ));

        let expire_after_access = duration_nanos(self.expire_after_access);
        let expire_after_write = duration_nanos(self.expire_after_write);
        let refresh_after_write = duration_nanos(self.refresh_after_write);

        let processor = Processor::new(
            rx,
            new_policy(self.policy, policy_capacity, Arc::clone(&directory)),
            WriteQueue::new(expire_after_write > 0 || refresh_after_write > 0),
            Arc::clone(&directory),
            Arc::downgrade(&coordinator),
            Arc::clone(&stats),
            Arc::clone(&clock),
            expire_after_access,
            expire_after_write,
            refresh_after_write,
            self.on_removal,
            self.on_insertion,
            Arc::clone(&shutdown),
        );
        std::thread::Builder::new()
            .name("cachette-processor".to_string())
            .spawn(move || processor.run())
            .expect("failed to spawn cache processor thread");

        Arc::new(CacheCore {
            directory,
            tx,
            coordinator,
            stats,
            clock,
            expire_after_access,
            expire_after_write,
            maximum_size: install_capacity,
            closed,
            shutdown,
        })
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_working_cache() {
        let cache = CacheBuilder::new().build();
        cache.put(1_u64, 1_u64);
        assert_eq!(cache.get_if_present(&1).as_deref(), Some(&1));
        cache.close();
    }

    #[test]
    fn every_policy_builds() {
        for policy in [
            EvictionPolicy::Lru,
            EvictionPolicy::Slru,
            EvictionPolicy::TinyLfu,
        ] {
            let cache = CacheBuilder::new().maximum_size(16).policy(policy).build();
            cache.put(1_u64, 1_u64);
            assert_eq!(cache.get_if_present(&1).as_deref(), Some(&1));
            cache.close();
        }
    }

    #[test]
    fn refresh_without_loader_is_rejected() {
        let result = CacheBuilder::<u64, u64>::new()
            .refresh_after_write(Duration::from_secs(1))
            .try_build();
        let err = result.err().expect("configuration must be rejected");
        assert!(err.message().contains("loader"));
    }

    #[test]
    fn reloader_without_loader_is_rejected() {
        struct Nop;
        impl Reloader<u64, u64> for Nop {
            fn reload(
                &self,
                _key: &u64,
                _old: Arc<u64>,
                _set: crate::loader::ValueSetter<u64>,
            ) {
            }
            fn close(&mut self) {}
        }

        let result = CacheBuilder::<u64, u64>::new().reloader(Nop).try_build();
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid cache configuration")]
    fn build_panics_on_invalid_configuration() {
        let _ = CacheBuilder::<u64, u64>::new()
            .refresh_after_write(Duration::from_secs(1))
            .build();
    }

    #[test]
    fn refresh_with_loader_is_accepted() {
        let cache = CacheBuilder::new()
            .refresh_after_write(Duration::from_secs(60))
            .build_with_loader(|key: &u64| Ok(*key));
        assert_eq!(*cache.get(&3).unwrap(), 3);
        cache.close();
    }
}
