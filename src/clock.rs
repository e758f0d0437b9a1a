//! Injectable time source.
//!
//! Every timestamp in the cache (entry access/write times, expiration
//! deadlines, load latency) is read through the [`Clock`] trait, so tests
//! can drive expiration deterministically with [`MockClock`] instead of
//! sleeping.
//!
//! Time is a monotonic nanosecond counter from an arbitrary per-clock
//! origin; only differences are meaningful.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic nanosecond time source.
pub trait Clock: Send + Sync {
    /// Returns nanoseconds elapsed since this clock's origin.
    fn now(&self) -> u64;
}

/// Wall clock backed by [`Instant`], anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Manually advanced clock for tests.
///
/// Starts at zero and only moves when told to. Share it with the cache via
/// `Arc` and keep a clone to advance from the test body.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use cachette::clock::{Clock, MockClock};
///
/// let clock = Arc::new(MockClock::new());
/// assert_eq!(clock.now(), 0);
///
/// clock.advance(Duration::from_secs(1));
/// assert_eq!(clock.now(), 1_000_000_000);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    nanos: AtomicU64,
}

impl MockClock {
    /// Creates a clock stopped at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `d`.
    pub fn advance(&self, d: Duration) {
        self.advance_nanos(d.as_nanos() as u64);
    }

    /// Advances the clock by `nanos` nanoseconds.
    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::Release);
    }
}

impl Clock for MockClock {
    #[inline]
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }
}
