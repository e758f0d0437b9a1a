//! Cache performance statistics.
//!
//! ## Architecture
//!
//! ```text
//!   caller threads                 processor thread
//!   ──────────────                 ────────────────
//!   record_hits ─┐                 record_eviction ─┐
//!   record_misses ├──► StatsCounter (atomics) ◄─────┘
//!   record_load_* ┘        │
//!                          ▼ snapshot()
//!                        Stats (plain copy + derived rates)
//! ```
//!
//! All counters are 64-bit atomics updated with `fetch_add`; a snapshot
//! copies each counter individually, so the snapshot is not consistent
//! *across* counters but every individual counter is monotonic.
//!
//! ## Key Components
//!
//! - [`Stats`]: a point-in-time copy plus derived rates.
//! - [`StatsCounter`]: the recording interface; override it through
//!   [`CacheBuilder::stats_counter`](crate::CacheBuilder::stats_counter) to
//!   feed an external metrics pipeline.
//! - [`ConcurrentStatsCounter`]: the default lock-free implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time cache statistics.
///
/// Derived quantities return `0` / `0.0` / zero duration whenever their
/// denominator is zero, so a snapshot of a fresh cache is always safe to
/// inspect.
///
/// # Example
///
/// ```
/// use cachette::stats::Stats;
///
/// let stats = Stats::default();
/// assert_eq!(stats.request_count(), 0);
/// assert_eq!(stats.hit_rate(), 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of lookups that found a live entry.
    pub hit_count: u64,
    /// Number of lookups that found nothing, or an expired entry.
    pub miss_count: u64,
    /// Number of loader invocations that returned a value.
    pub load_success_count: u64,
    /// Number of loader invocations that returned an error.
    pub load_error_count: u64,
    /// Wall time accumulated across all loader invocations.
    pub total_load_time: Duration,
    /// Number of entries removed by capacity or expiration, not by the user.
    pub eviction_count: u64,
}

impl Stats {
    /// Total lookups: `hit_count + miss_count`.
    pub fn request_count(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    /// Fraction of lookups that hit; `0.0` when there were none.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hit_count, self.request_count())
    }

    /// Fraction of lookups that missed; `0.0` when there were none.
    pub fn miss_rate(&self) -> f64 {
        ratio(self.miss_count, self.request_count())
    }

    /// Fraction of loads that failed; `0.0` when there were none.
    pub fn load_error_rate(&self) -> f64 {
        ratio(
            self.load_error_count,
            self.load_success_count + self.load_error_count,
        )
    }

    /// Mean wall time per load (successful or not); zero when there were none.
    pub fn average_load_penalty(&self) -> Duration {
        let loads = self.load_success_count + self.load_error_count;
        if loads == 0 {
            Duration::ZERO
        } else {
            self.total_load_time / loads as u32
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Recording interface for cache statistics.
///
/// The cache calls these from arbitrary threads; implementations must be
/// cheap and must never block the read path.
pub trait StatsCounter: Send + Sync {
    /// Records `count` cache hits.
    fn record_hits(&self, count: u64);

    /// Records `count` cache misses.
    fn record_misses(&self, count: u64);

    /// Records one successful load taking `load_time`.
    fn record_load_success(&self, load_time: Duration);

    /// Records one failed load taking `load_time`.
    fn record_load_error(&self, load_time: Duration);

    /// Records one eviction.
    fn record_eviction(&self);

    /// Copies the current counters into `out`.
    fn snapshot(&self, out: &mut Stats);
}

/// Default lock-free [`StatsCounter`] over `AtomicU64` counters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use cachette::stats::{ConcurrentStatsCounter, Stats, StatsCounter};
///
/// let counter = ConcurrentStatsCounter::new();
/// counter.record_hits(2);
/// counter.record_misses(1);
/// counter.record_load_success(Duration::from_millis(5));
///
/// let mut stats = Stats::default();
/// counter.snapshot(&mut stats);
/// assert_eq!(stats.hit_count, 2);
/// assert_eq!(stats.request_count(), 3);
/// assert!(stats.hit_rate() > 0.6);
/// ```
#[derive(Debug, Default)]
pub struct ConcurrentStatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    load_successes: AtomicU64,
    load_errors: AtomicU64,
    total_load_nanos: AtomicU64,
    evictions: AtomicU64,
}

impl ConcurrentStatsCounter {
    /// Creates a counter with all fields at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsCounter for ConcurrentStatsCounter {
    fn record_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    fn record_misses(&self, count: u64) {
        self.misses.fetch_add(count, Ordering::Relaxed);
    }

    fn record_load_success(&self, load_time: Duration) {
        self.load_successes.fetch_add(1, Ordering::Relaxed);
        self.total_load_nanos
            .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
    }

    fn record_load_error(&self, load_time: Duration) {
        self.load_errors.fetch_add(1, Ordering::Relaxed);
        self.total_load_nanos
            .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, out: &mut Stats) {
        out.hit_count = self.hits.load(Ordering::Acquire);
        out.miss_count = self.misses.load(Ordering::Acquire);
        out.load_success_count = self.load_successes.load(Ordering::Acquire);
        out.load_error_count = self.load_errors.load(Ordering::Acquire);
        out.total_load_time =
            Duration::from_nanos(self.total_load_nanos.load(Ordering::Acquire));
        out.eviction_count = self.evictions.load(Ordering::Acquire);
    }
}
