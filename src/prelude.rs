//! Convenience re-exports of the public surface.

pub use crate::builder::{CacheBuilder, EvictionPolicy, RemovalListener};
pub use crate::cache::{Cache, LoadingCache};
pub use crate::clock::{Clock, MockClock, SystemClock};
pub use crate::error::{ConfigError, LoadError};
pub use crate::loader::{LoaderFn, Reloader, ValueSetter};
pub use crate::stats::{ConcurrentStatsCounter, Stats, StatsCounter};
