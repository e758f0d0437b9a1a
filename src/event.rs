//! Events flowing from the public API to the processor.
//!
//! The channel is bounded: a full buffer blocks the sending caller, which
//! is the cache's only backpressure mechanism. Senders check the closing
//! flag first, so events raced past a close are dropped rather than queued
//! behind the final `Close`.

use std::sync::Arc;

use crate::entry::Entry;

/// Capacity of the event channel between callers and the processor.
pub(crate) const EVENT_BUFFER: usize = 64;

/// One unit of work for the processor.
pub(crate) enum EntryEvent<K, V> {
    /// Entry was written (put, load, or refresh completion).
    Write(Arc<Entry<K, V>>),
    /// Entry was read.
    Access(Arc<Entry<K, V>>),
    /// Entry was invalidated; `None` means invalidate everything.
    Delete(Option<Arc<Entry<K, V>>>),
    /// Drain, notify, and shut down. Sent exactly once.
    Close,
}
