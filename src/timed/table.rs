//! Fixed-size open-addressing table of atomically updated entries.
//!
//! ## Layout
//!
//! The table holds `slots + 1` entries. The first `slots` entries are probed
//! linearly starting at `key % slots`. The final entry is a shared overflow
//! slot: it is handed out only when a full probe cycle finds neither the key
//! nor a free slot, so [`Table::find_entry`] always returns *some* entry and
//! never blocks or allocates.
//!
//! Every entry is two `AtomicU64`s: the key (0 = free) and a packed
//! [`EntryData`] word holding the access and sample times. The packed word
//! is the unit of every compare-and-swap, so a reader never observes one
//! half of an update without the other.
//!
//! ## Eviction
//!
//! Entries are never removed in place. Instead the owner periodically calls
//! [`Table::pruned_copy`], which builds a fresh table containing only the
//! most recently accessed, non-expired entries.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// EntryData
// ---------------------------------------------------------------------------

/// Access time (high 32 bits) and sample time (low 32 bits), in seconds.
///
/// A value of 0 means the entry's key has been claimed but its first sample
/// has not been published yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct EntryData(u64);

impl EntryData {
    #[inline]
    pub(crate) fn new(access_time: u32, sample_time: u32) -> Self {
        EntryData((u64::from(access_time) << 32) | u64::from(sample_time))
    }

    #[inline]
    pub(crate) fn access_time(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub(crate) fn sample_time(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub(crate) fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Returns a copy with the access time replaced and the sample time kept.
    #[inline]
    pub(crate) fn with_access_time(self, access_time: u32) -> Self {
        EntryData((self.0 & 0x0000_0000_FFFF_FFFF) | (u64::from(access_time) << 32))
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct Entry {
    key: AtomicU64,
    data: AtomicU64,
}

impl Entry {
    #[inline]
    pub(crate) fn key(&self) -> u64 {
        self.key.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn data(&self) -> EntryData {
        EntryData(self.data.load(Ordering::Acquire))
    }

    /// Claims a free entry for `key`.
    ///
    /// On failure returns the key that currently owns the entry, which may be
    /// `key` itself if another thread claimed it first.
    #[inline]
    pub(crate) fn claim(&self, key: u64) -> Result<(), u64> {
        self.key
            .compare_exchange(0, key, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    #[inline]
    pub(crate) fn store_data(&self, data: EntryData) {
        self.data.store(data.0, Ordering::Release);
    }

    /// Replaces `current` with `new`; `false` if another thread got there first.
    #[inline]
    pub(crate) fn compare_exchange_data(&self, current: EntryData, new: EntryData) -> bool {
        self.data
            .compare_exchange(current.0, new.0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Result of probing the table for a key.
#[derive(Debug)]
pub(crate) enum Slot<'a> {
    /// A free entry the caller may try to claim.
    Vacant(&'a Entry),
    /// The entry already holding the key.
    Occupied(&'a Entry),
    /// No free entry and no match: the shared overflow entry.
    Overflow(&'a Entry),
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

pub(crate) struct Table {
    /// `slots` probe entries followed by the overflow entry.
    entries: Box<[Entry]>,
    /// Number of keys claimed in the probe entries.
    count: AtomicUsize,
}

impl Table {
    /// Creates an empty table with `slots` probe entries.
    pub(crate) fn with_slots(slots: usize) -> Self {
        assert!(slots > 0, "a table needs at least one slot");
        let entries = (0..=slots)
            .map(|_| Entry::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Table {
            entries,
            count: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn slots(&self) -> usize {
        self.entries.len() - 1
    }

    /// Number of keys claimed so far.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Records a successful claim and returns the new live count.
    #[inline]
    pub(crate) fn record_claim(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Locates the entry for `key` (which must be non-zero).
    pub(crate) fn find_entry(&self, key: u64) -> Slot<'_> {
        debug_assert_ne!(key, 0, "0 is the free-slot sentinel");
        let slots = self.slots();
        let start = (key % slots as u64) as usize;
        let mut idx = start;
        loop {
            let entry = &self.entries[idx];
            match entry.key() {
                0 => return Slot::Vacant(entry),
                k if k == key => return Slot::Occupied(entry),
                _ => {}
            }
            idx += 1;
            if idx == slots {
                idx = 0;
            }
            if idx == start {
                return Slot::Overflow(&self.entries[slots]);
            }
        }
    }

    /// Builds a fresh table of the same size holding at most `keep` of this
    /// table's entries.
    ///
    /// Free entries and entries sampled before `threshold` are discarded; of
    /// the rest, the ones with the highest access time are kept. The overflow
    /// entry is never carried over.
    pub(crate) fn pruned_copy(&self, threshold: u32, keep: usize) -> Table {
        let mut heap: BinaryHeap<Survivor> = self.entries[..self.slots()]
            .iter()
            .filter_map(|entry| {
                let key = entry.key();
                let data = entry.data();
                // Entries still mid-claim are dropped along with expired ones.
                if key == 0 || data.is_unset() || data.sample_time() < threshold {
                    return None;
                }
                Some(Survivor {
                    access_time: data.access_time(),
                    key,
                    data,
                })
            })
            .collect();

        let table = Table::with_slots(self.slots());
        let mut kept = 0usize;
        while kept < keep {
            let Some(survivor) = heap.pop() else { break };
            match table.find_entry(survivor.key) {
                Slot::Vacant(entry) => {
                    // Not yet shared, so plain stores are enough; publication
                    // happens through the owner's pointer swap.
                    entry.key.store(survivor.key, Ordering::Relaxed);
                    entry.data.store(survivor.data.0, Ordering::Relaxed);
                    kept += 1;
                }
                Slot::Occupied(_) | Slot::Overflow(_) => {}
            }
        }
        table.count.store(kept, Ordering::Release);
        table
    }

    /// Returns `true` if `key` holds a probe entry.
    pub(crate) fn contains(&self, key: u64) -> bool {
        matches!(self.find_entry(key), Slot::Occupied(_))
    }
}

/// A live entry considered during a rebuild; ordered by access time first so
/// the max-heap yields the most recently accessed entry.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Survivor {
    access_time: u32,
    key: u64,
    data: EntryData,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
