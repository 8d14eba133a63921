//! Time-windowed deduplication of hashed keys.
//!
//! A [`Deduplicator`] answers "should this key be sampled now?" at most once
//! per interval for each key, using a fixed-capacity table of atomic entries.
//! There is no mutex anywhere on the decision path:
//!
//! - Slots are claimed and updated with compare-and-swap on a packed 64-bit
//!   word, so per-key decisions are linearizable.
//! - When the live count exceeds `max_items`, one caller wins a flag and
//!   rebuilds the table inline, keeping the most recently accessed
//!   two-thirds; everyone else keeps using the current table.
//! - The table pointer is swapped atomically. Callers still holding the old
//!   table finish against it; their updates are simply not carried over.

pub(crate) mod table;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use arc_swap::ArcSwap;

use crate::builder::DeduplicatorBuilder;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::metrics::stats::{Metrics, StatsCounter};

use self::table::{Entry, EntryData, Slot, Table};

/// Default live-item bound.
pub const DEFAULT_MAX_ITEMS: usize = 4_096;

/// Probe slots allocated per live item; keeps linear probes short.
const SLOTS_PER_ITEM: usize = 2;

// ---------------------------------------------------------------------------
// Preset
// ---------------------------------------------------------------------------

/// Interval policy of a [`Deduplicator`]. Both presets decide identically;
/// they differ only in which intervals they accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Short fixed-rate windows: `1s <= interval <= 30s`.
    Set,
    /// Any interval representable in 32-bit seconds (about 136 years).
    Lru,
}

impl Preset {
    pub const SET_MIN_INTERVAL: Duration = Duration::from_secs(1);
    pub const SET_MAX_INTERVAL: Duration = Duration::from_secs(30);
    pub const LRU_MAX_INTERVAL: Duration = Duration::from_secs(u32::MAX as u64);

    fn ctor(self) -> &'static str {
        match self {
            Preset::Set => "Deduplicator::set",
            Preset::Lru => "Deduplicator::lru",
        }
    }

    /// Checks `interval` against this preset's allowed range.
    pub fn validate(self, interval: Duration) -> Result<()> {
        let (min, max) = match self {
            Preset::Set => (Self::SET_MIN_INTERVAL, Self::SET_MAX_INTERVAL),
            Preset::Lru => (Duration::ZERO, Self::LRU_MAX_INTERVAL),
        };
        if interval < min {
            return Err(Error::IntervalTooShort {
                ctor: self.ctor(),
                min,
                interval,
            });
        }
        if interval > max {
            return Err(Error::IntervalTooLong {
                ctor: self.ctor(),
                max,
                interval,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deduplicator
// ---------------------------------------------------------------------------

/// A bounded, lock-free "sample at most once per interval" decision cache.
///
/// # Example
/// ```
/// use apisec_sampling::clock::ManualClock;
/// use apisec_sampling::Deduplicator;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000)));
/// let dedup = Deduplicator::builder(Duration::from_secs(30))
///     .clock(Arc::clone(&clock))
///     .build_set()
///     .unwrap();
///
/// assert!(dedup.hit(42));
/// clock.advance(Duration::from_secs(29));
/// assert!(!dedup.hit(42));
/// clock.advance(Duration::from_secs(1));
/// assert!(dedup.hit(42));
/// ```
pub struct Deduplicator {
    table: ArcSwap<Table>,
    /// Single-flight guard for rebuilds.
    rebuilding: AtomicBool,
    /// Interval in whole seconds.
    interval: u32,
    max_items: usize,
    /// Stand-in for keys equal to the free-slot sentinel 0.
    zero_key: u64,
    clock: Box<dyn Clock>,
    metrics: StatsCounter,
}

impl Deduplicator {
    pub(crate) fn new(
        preset: Preset,
        interval: Duration,
        max_items: usize,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        preset.validate(interval)?;
        Ok(Self::assemble(interval, max_items, clock))
    }

    /// Builds without validating `interval`, which must fit in `u32` seconds.
    pub(crate) fn assemble(interval: Duration, max_items: usize, clock: Box<dyn Clock>) -> Self {
        let slots = max_items.saturating_mul(SLOTS_PER_ITEM).max(1);
        Deduplicator {
            table: ArcSwap::from_pointee(Table::with_slots(slots)),
            rebuilding: AtomicBool::new(false),
            interval: interval.as_secs() as u32,
            max_items,
            zero_key: random_nonzero_key(),
            clock,
            metrics: StatsCounter::new(),
        }
    }

    /// Returns a [`DeduplicatorBuilder`] for the given interval.
    pub fn builder(interval: Duration) -> DeduplicatorBuilder {
        DeduplicatorBuilder::new(interval)
    }

    /// A [`Preset::Set`] deduplicator with default capacity and the system clock.
    pub fn set(interval: Duration) -> Result<Self> {
        DeduplicatorBuilder::new(interval).build_set()
    }

    /// A [`Preset::Lru`] deduplicator with default capacity and the system clock.
    pub fn lru(interval: Duration) -> Result<Self> {
        DeduplicatorBuilder::new(interval).build_lru()
    }

    // -----------------------------------------------------------------------
    // Hot path
    // -----------------------------------------------------------------------

    /// Returns `true` if `key` should be sampled now, recording the sample.
    ///
    /// Returns `false` when the key was sampled less than one interval ago.
    /// Never blocks and never fails; under cardinality overflow the answer is
    /// approximate.
    pub fn hit(&self, key: u64) -> bool {
        let key = if key == 0 { self.zero_key } else { key };
        let now = self.now_secs();

        let table = self.table.load();
        let sampled = self.hit_in(&table, key, now);
        if table.len() > self.max_items {
            self.rebuild_while_over_capacity(now);
        }

        self.metrics.record_decision(sampled);
        sampled
    }

    fn hit_in(&self, table: &Table, key: u64, now: u32) -> bool {
        loop {
            match table.find_entry(key) {
                Slot::Vacant(entry) => match entry.claim(key) {
                    Ok(()) => {
                        entry.store_data(EntryData::new(now, now));
                        table.record_claim();
                        return true;
                    }
                    // Lost the race to a concurrent insert of the same key.
                    Err(owner) if owner == key => return self.touch(entry, now),
                    // The slot went to another key; probe again.
                    Err(_) => continue,
                },
                Slot::Occupied(entry) => return self.touch(entry, now),
                Slot::Overflow(entry) => {
                    self.metrics.record_overflow();
                    return self.decide(entry, entry.data(), now);
                }
            }
        }
    }

    /// Decision for an entry that already holds the key.
    #[inline]
    fn touch(&self, entry: &Entry, now: u32) -> bool {
        let current = entry.data();
        if current.is_unset() {
            // The claiming thread is about to publish the first sample.
            return false;
        }
        self.decide(entry, current, now)
    }

    #[inline]
    fn decide(&self, entry: &Entry, current: EntryData, now: u32) -> bool {
        if now.saturating_sub(current.sample_time()) >= self.interval {
            return entry.compare_exchange_data(current, EntryData::new(now, now));
        }
        // Losing this race only loses an access-time bump.
        let access_time = now.max(current.access_time());
        let _ = entry.compare_exchange_data(current, current.with_access_time(access_time));
        false
    }

    // -----------------------------------------------------------------------
    // Rebuild
    // -----------------------------------------------------------------------

    /// Rebuilds until the published table is back within `max_items`.
    ///
    /// A caller that finds the flag taken leaves the work to its holder, which
    /// checks the count again after clearing the flag. Growth that races with
    /// a rebuild is therefore never left without one.
    fn rebuild_while_over_capacity(&self, now: u32) {
        while self.table.load().len() > self.max_items {
            if !self.try_rebuild(now) {
                return;
            }
        }
    }

    /// Returns `false` if another caller holds the rebuild flag.
    ///
    /// The flag and the live counters use `SeqCst`: a caller whose claim
    /// failed the flag CAS must be visible to the holder's re-check.
    fn try_rebuild(&self, now: u32) -> bool {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let _guard = RebuildGuard(&self.rebuilding);

        // Another caller may have published a fresh table since we looked.
        let current = self.table.load_full();
        let before = current.len();
        if before <= self.max_items {
            return true;
        }

        let threshold = now.saturating_sub(self.interval);
        let keep = (self.max_items * 2 / 3).max(1);
        let pruned = current.pruned_copy(threshold, keep);
        tracing::debug!(
            before,
            kept = pruned.len(),
            threshold,
            "rebuilt sampling table"
        );
        self.table.store(Arc::new(pruned));
        self.metrics.record_rebuild();
        true
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of keys in the current table.
    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` is tracked by the current table.
    pub fn contains(&self, key: u64) -> bool {
        let key = if key == 0 { self.zero_key } else { key };
        self.table.load().contains(key)
    }

    /// Returns `true` while a rebuild is in flight.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval))
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn stats(&self) -> Metrics {
        self.metrics.snapshot()
    }

    /// Current time in table units: whole seconds, never 0 so that a packed
    /// word of 0 keeps meaning "unset".
    #[inline]
    fn now_secs(&self) -> u32 {
        (self.clock.now().as_secs() as u32).max(1)
    }
}

impl fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deduplicator")
            .field("interval", &self.interval())
            .field("max_items", &self.max_items)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Clears the rebuild flag when the rebuild scope ends, panicking or not.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn random_nonzero_key() -> u64 {
    RandomState::new().hash_one(0u64).max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
