//! Public sampling decisions.
//!
//! Callers build a [`SamplingKey`] per request and ask a [`Sampler`] whether
//! to run the expensive schema extraction. `true` means go ahead, `false`
//! means skip. Two strategies are provided:
//!
//! - [`TimedSampler`]: at most one sample per key per interval, backed by a
//!   [`Deduplicator`].
//! - [`ProxySampler`]: an aggregate budget of samples per window across all
//!   keys, for proxies and gateways that see too many distinct routes for
//!   per-key deduplication.

mod proxy;

pub use proxy::{NeverSampler, ProxySampler, DEFAULT_PROXY_INTERVAL, DEFAULT_PROXY_RATE};

use std::sync::Arc;
use std::time::Duration;

use crate::clock::SystemClock;
use crate::error::Result;
use crate::key::SamplingKey;
use crate::timed::{Deduplicator, DEFAULT_MAX_ITEMS};

/// Default minimum time between two samples of the same key.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Decides whether a request should be sampled.
///
/// Implementations are shared by every request-handling thread.
pub trait Sampler: Send + Sync {
    fn decision_for(&self, key: &SamplingKey<'_>) -> bool;
}

impl<S: Sampler + ?Sized> Sampler for Arc<S> {
    #[inline]
    fn decision_for(&self, key: &SamplingKey<'_>) -> bool {
        (**self).decision_for(key)
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    #[inline]
    fn decision_for(&self, key: &SamplingKey<'_>) -> bool {
        (**self).decision_for(key)
    }
}

// ---------------------------------------------------------------------------
// TimedSampler
// ---------------------------------------------------------------------------

/// Samples each request shape at most once per interval.
///
/// # Example
/// ```
/// use apisec_sampling::{Sampler, SamplingKey, TimedSampler};
///
/// let sampler = TimedSampler::new();
/// let key = SamplingKey::new("GET", "/users/{id}", 200);
/// assert!(sampler.decision_for(&key));
/// assert!(!sampler.decision_for(&key));
/// assert!(sampler.decision_for(&SamplingKey::new("GET", "/users/{id}", 404)));
/// ```
#[derive(Debug)]
pub struct TimedSampler {
    dedup: Deduplicator,
}

impl TimedSampler {
    /// A sampler with the default 30 second interval and the system clock.
    pub fn new() -> Self {
        TimedSampler {
            dedup: Deduplicator::assemble(
                DEFAULT_INTERVAL,
                DEFAULT_MAX_ITEMS,
                Box::new(SystemClock),
            ),
        }
    }

    /// A sampler with a custom interval; fails if it exceeds 32-bit seconds.
    pub fn with_interval(interval: Duration) -> Result<Self> {
        Deduplicator::lru(interval).map(Self::from_deduplicator)
    }

    /// Wraps a pre-configured deduplicator (custom clock or capacity).
    pub fn from_deduplicator(dedup: Deduplicator) -> Self {
        TimedSampler { dedup }
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }
}

impl Default for TimedSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for TimedSampler {
    #[inline]
    fn decision_for(&self, key: &SamplingKey<'_>) -> bool {
        self.dedup.hit(key.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn sampler(interval_secs: u64) -> (TimedSampler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_700_000_000)));
        let dedup = Deduplicator::builder(Duration::from_secs(interval_secs))
            .clock(Arc::clone(&clock))
            .build_lru()
            .unwrap();
        (TimedSampler::from_deduplicator(dedup), clock)
    }

    #[test]
    fn thirty_second_scenario() {
        let (sampler, clock) = sampler(30);
        let key = SamplingKey::new("GET", "/", 200);
        let other = SamplingKey::new("POST", "/", 200);

        assert!(sampler.decision_for(&key));
        clock.advance(Duration::from_secs(1));
        assert!(sampler.decision_for(&other), "independent key space");
        for _ in 1..30 {
            assert!(!sampler.decision_for(&key));
            clock.advance(Duration::from_secs(1));
        }
        assert!(sampler.decision_for(&key));
    }

    #[test]
    fn interval_longer_than_set_preset_is_accepted() {
        let sampler = TimedSampler::with_interval(Duration::from_secs(3_600)).unwrap();
        assert_eq!(sampler.deduplicator().interval(), Duration::from_secs(3_600));
    }

    #[test]
    fn default_sampler_uses_default_interval() {
        let sampler = TimedSampler::default();
        assert_eq!(sampler.deduplicator().interval(), DEFAULT_INTERVAL);
        assert_eq!(sampler.deduplicator().max_items(), DEFAULT_MAX_ITEMS);
    }

    #[test]
    fn usable_behind_dyn_and_arc() {
        let (sampler, _clock) = sampler(30);
        let shared: Arc<dyn Sampler> = Arc::new(sampler);
        let key = SamplingKey::new("PUT", "/items", 201);
        assert!(shared.decision_for(&key));
        assert!(!shared.decision_for(&key));
    }
}
