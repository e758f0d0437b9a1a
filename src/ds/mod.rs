//! Data structures owned by the policy processor.
//!
//! These are deliberately single-threaded: the processor thread is the only
//! mutator, so the lists need no locks. Entries hold opaque [`SlotId`]
//! handles into the lists instead of pointers, which keeps the whole crate
//! free of `unsafe`.

pub(crate) mod arena;
pub(crate) mod list;

pub(crate) use arena::{SlotArena, SlotId};
pub(crate) use list::EntryList;
