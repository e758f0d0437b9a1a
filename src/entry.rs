//! Cached entry: key, value cell, timestamps, status flags, queue handles.
//!
//! An `Entry` is shared between caller threads (which read the value and
//! bump timestamps) and the processor thread (which alone owns the queue
//! handles and segment). The split is:
//!
//! ```text
//!   any thread                         processor thread only
//!   ──────────                         ─────────────────────
//!   value (RwLock<Arc<V>>)             access_slot
//!   access_time / write_time           write_slot
//!   invalidated / loading flags        segment
//! ```
//!
//! The value cell swaps a whole `Arc<V>`, so readers observe either the old
//! or the new value, never a torn one. The queue handle fields are atomics
//! only so the struct stays `Sync`; they have a single writer.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ds::SlotId;

const NO_SLOT: u64 = u64::MAX;

/// TinyLFU segment an entry currently occupies.
///
/// Meaningful only while the TinyLFU policy manages the entry; LRU keeps
/// everything in `Window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment {
    Window,
    Probation,
    Protected,
}

impl Segment {
    fn from_u8(v: u8) -> Segment {
        match v {
            1 => Segment::Probation,
            2 => Segment::Protected,
            _ => Segment::Window,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Segment::Window => 0,
            Segment::Probation => 1,
            Segment::Protected => 2,
        }
    }
}

/// One cached record.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    key: K,
    hash: u64,
    value: RwLock<Arc<V>>,
    access_time: AtomicU64,
    write_time: AtomicU64,
    invalidated: AtomicBool,
    loading: AtomicBool,
    access_slot: AtomicU64,
    write_slot: AtomicU64,
    segment: AtomicU8,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, value: Arc<V>, hash: u64, now: u64) -> Self {
        Self {
            key,
            hash,
            value: RwLock::new(value),
            access_time: AtomicU64::new(now),
            write_time: AtomicU64::new(now),
            invalidated: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            access_slot: AtomicU64::new(NO_SLOT),
            write_slot: AtomicU64::new(NO_SLOT),
            segment: AtomicU8::new(Segment::Window.as_u8()),
        }
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns a handle to the current value.
    pub(crate) fn value(&self) -> Arc<V> {
        Arc::clone(&self.value.read())
    }

    /// Publishes a replacement value.
    pub(crate) fn set_value(&self, value: Arc<V>) {
        *self.value.write() = value;
    }

    pub(crate) fn access_time(&self) -> u64 {
        self.access_time.load(Ordering::Acquire)
    }

    pub(crate) fn set_access_time(&self, now: u64) {
        self.access_time.store(now, Ordering::Release);
    }

    pub(crate) fn write_time(&self) -> u64 {
        self.write_time.load(Ordering::Acquire)
    }

    pub(crate) fn set_write_time(&self, now: u64) {
        self.write_time.store(now, Ordering::Release);
    }

    pub(crate) fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    pub(crate) fn set_invalidated(&self, invalidated: bool) {
        self.invalidated.store(invalidated, Ordering::Release);
    }

    /// Claims the loading flag; only one claimant wins until release.
    pub(crate) fn try_begin_loading(&self) -> bool {
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the loading flag unconditionally.
    pub(crate) fn end_loading(&self) {
        self.loading.store(false, Ordering::Release);
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    // Queue handles: single writer (the processor), so relaxed ordering is
    // enough; the channel hand-off orders them against everything else.

    pub(crate) fn access_slot(&self) -> Option<SlotId> {
        decode_slot(self.access_slot.load(Ordering::Relaxed))
    }

    pub(crate) fn set_access_slot(&self, slot: Option<SlotId>) {
        self.access_slot.store(encode_slot(slot), Ordering::Relaxed);
    }

    pub(crate) fn write_slot(&self) -> Option<SlotId> {
        decode_slot(self.write_slot.load(Ordering::Relaxed))
    }

    pub(crate) fn set_write_slot(&self, slot: Option<SlotId>) {
        self.write_slot.store(encode_slot(slot), Ordering::Relaxed);
    }

    pub(crate) fn segment(&self) -> Segment {
        Segment::from_u8(self.segment.load(Ordering::Relaxed))
    }

    pub(crate) fn set_segment(&self, segment: Segment) {
        self.segment.store(segment.as_u8(), Ordering::Relaxed);
    }
}

fn encode_slot(slot: Option<SlotId>) -> u64 {
    match slot {
        Some(id) => id.index() as u64,
        None => NO_SLOT,
    }
}

fn decode_slot(raw: u64) -> Option<SlotId> {
    if raw == NO_SLOT {
        None
    } else {
        Some(SlotId(raw as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(now: u64) -> Entry<u64, &'static str> {
        Entry::new(1, Arc::new("v"), crate::hash::sum64(&1_u64), now)
    }

    #[test]
    fn new_entry_starts_clean() {
        let en = entry(5);
        assert_eq!(*en.value(), "v");
        assert_eq!(en.access_time(), 5);
        assert_eq!(en.write_time(), 5);
        assert!(!en.is_invalidated());
        assert!(!en.is_loading());
        assert_eq!(en.access_slot(), None);
        assert_eq!(en.write_slot(), None);
        assert_eq!(en.segment(), Segment::Window);
    }

    #[test]
    fn value_replacement_is_whole_arc() {
        let en = entry(0);
        let old = en.value();
        en.set_value(Arc::new("new"));
        assert_eq!(*old, "v");
        assert_eq!(*en.value(), "new");
    }

    #[test]
    fn loading_flag_is_single_claimant() {
        let en = entry(0);
        assert!(en.try_begin_loading());
        assert!(!en.try_begin_loading());
        en.end_loading();
        assert!(en.try_begin_loading());
    }

    #[test]
    fn slot_round_trip() {
        let en = entry(0);
        en.set_access_slot(Some(SlotId(3)));
        assert_eq!(en.access_slot(), Some(SlotId(3)));
        en.set_access_slot(None);
        assert_eq!(en.access_slot(), None);

        en.set_write_slot(Some(SlotId(0)));
        assert_eq!(en.write_slot(), Some(SlotId(0)));
    }

    #[test]
    fn segment_round_trip() {
        let en = entry(0);
        for seg in [Segment::Probation, Segment::Protected, Segment::Window] {
            en.set_segment(seg);
            assert_eq!(en.segment(), seg);
        }
    }
}
