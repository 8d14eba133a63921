use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every sampling decision.
pub struct StatsCounter {
    sampled: AtomicU64,
    suppressed: AtomicU64,
    overflow_hits: AtomicU64,
    rebuilds: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            sampled: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            overflow_hits: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_decision(&self, sampled: bool) {
        if sampled {
            self.sampled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_overflow(&self) {
        self.overflow_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> Metrics {
        let sampled = self.sampled.load(Ordering::Relaxed);
        let suppressed = self.suppressed.load(Ordering::Relaxed);
        let total = sampled + suppressed;
        let sample_ratio = if total == 0 {
            0.0_f64
        } else {
            sampled as f64 / total as f64
        };
        Metrics {
            sampled,
            suppressed,
            overflow_hits: self.overflow_hits.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            sample_ratio,
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of deduplicator statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Decisions that returned `true`.
    pub sampled: u64,
    /// Decisions that returned `false`.
    pub suppressed: u64,
    /// Decisions served by the shared overflow slot because the table was full.
    pub overflow_hits: u64,
    /// Pruning rebuilds published.
    pub rebuilds: u64,
    /// `sampled / (sampled + suppressed)`, or `0.0` before any decision.
    pub sample_ratio: f64,
}

impl Metrics {
    pub fn decision_count(&self) -> u64 {
        self.sampled + self.suppressed
    }
}
