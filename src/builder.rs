use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::timed::{Deduplicator, Preset, DEFAULT_MAX_ITEMS};

/// Builder for configuring and constructing a [`Deduplicator`].
///
/// # Example
/// ```
/// use apisec_sampling::DeduplicatorBuilder;
/// use std::time::Duration;
///
/// let dedup = DeduplicatorBuilder::new(Duration::from_secs(60))
///     .max_items(1_024)
///     .build_lru()
///     .unwrap();
/// assert!(dedup.hit(7));
/// assert!(!dedup.hit(7));
/// ```
pub struct DeduplicatorBuilder {
    interval: Duration,
    max_items: usize,
    clock: Box<dyn Clock>,
}

impl DeduplicatorBuilder {
    pub fn new(interval: Duration) -> Self {
        DeduplicatorBuilder {
            interval,
            max_items: DEFAULT_MAX_ITEMS,
            clock: Box::new(SystemClock),
        }
    }

    /// Set the live-item bound (default: 4096). The table allocates two probe
    /// slots per item.
    pub fn max_items(mut self, n: usize) -> Self {
        assert!(n > 0, "max_items must be greater than 0");
        self.max_items = n;
        self
    }

    /// Use `clock` instead of the system wall clock.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Builds with the given preset, failing if the interval is out of range.
    pub fn build(self, preset: Preset) -> Result<Deduplicator> {
        Deduplicator::new(preset, self.interval, self.max_items, self.clock)
    }

    /// Builds a [`Preset::Set`] deduplicator (`1s..=30s`).
    pub fn build_set(self) -> Result<Deduplicator> {
        self.build(Preset::Set)
    }

    /// Builds a [`Preset::Lru`] deduplicator (up to `u32::MAX` seconds).
    pub fn build_lru(self) -> Result<Deduplicator> {
        self.build(Preset::Lru)
    }
}
