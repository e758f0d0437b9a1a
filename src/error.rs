//! Error types for the cachette library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: returned when builder parameters are inconsistent
//!   (e.g. a refresh interval configured on a cache without a loader).
//! - [`LoadError`]: the error a loader or reloader produces for a key; it
//!   is propagated verbatim to the caller of `get`/`refresh` and counted
//!   in the load-error statistics.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use cachette::CacheBuilder;
//! use cachette::error::ConfigError;
//!
//! // refresh_after_write without a loader is caught without panicking
//! let bad: Result<_, ConfigError> = CacheBuilder::<u64, u64>::new()
//!     .refresh_after_write(Duration::from_secs(1))
//!     .try_build();
//! assert!(bad.is_err());
//! ```

use std::error::Error;
use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::try_build`](crate::CacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed
/// validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for ConfigError {}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Error produced by a loader while computing the value for a key.
///
/// The cache never retries a failed load; the error is surfaced to the
/// caller, the load-error counter is incremented, and any previously cached
/// value for the key is left in place.
///
/// # Example
///
/// ```
/// use cachette::error::LoadError;
///
/// let err = LoadError::message("backend unavailable");
/// assert_eq!(err.to_string(), "backend unavailable");
///
/// // Wrap any std error
/// let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// let err = LoadError::new(io);
/// assert!(err.to_string().contains("boom"));
/// ```
#[derive(Debug)]
pub struct LoadError {
    inner: Box<dyn Error + Send + Sync>,
}

impl LoadError {
    /// Wraps an arbitrary error.
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self { inner: err.into() }
    }

    /// Creates an error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            inner: msg.into().into(),
        }
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn Error + Send + Sync) {
        self.inner.as_ref()
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner.as_ref() as &(dyn Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
