//! cachette: an embeddable, concurrent, self-loading key/value cache.
//!
//! Entries stay in the cache until they are evicted by the configured
//! policy, expire, or are manually invalidated. Reads run lock-light on the
//! caller's thread; all policy bookkeeping is serialized onto a single
//! background processor thread fed through a bounded event channel.
//!
//! ```
//! use cachette::{CacheBuilder, EvictionPolicy};
//!
//! let cache = CacheBuilder::new()
//!     .maximum_size(1024)
//!     .policy(EvictionPolicy::TinyLfu)
//!     .build();
//!
//! cache.put("answer", 42);
//! assert_eq!(cache.get_if_present(&"answer").as_deref(), Some(&42));
//! cache.close();
//! ```
//!
//! See [`CacheBuilder`] for the full option set, and [`LoadingCache`] for
//! caches that compute missing values through a loader function.

mod directory;
mod ds;
mod entry;
mod event;
mod policy;
mod processor;
mod sketch;

pub mod builder;
pub mod cache;
pub mod clock;
pub mod error;
pub mod hash;
pub mod loader;
pub mod prelude;
pub mod stats;

pub use builder::{CacheBuilder, EvictionPolicy};
pub use cache::{Cache, LoadingCache};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ConfigError, LoadError};
pub use loader::Reloader;
pub use stats::{ConcurrentStatsCounter, Stats, StatsCounter};
