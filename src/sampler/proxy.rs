//! Aggregate-rate sampling for proxy deployments.
//!
//! A proxy fronts many services and sees far more distinct routes than a
//! single application, so instead of deduplicating per key it accepts at most
//! `rate` samples per `interval` across all keys.
//!
//! The budget is a direct (unkeyed) `governor` rate limiter: one sample is
//! replenished every `interval / rate`, and up to `rate` samples may be taken
//! in a burst. Checking the budget is a single atomic update, so the sampler
//! is lock-free like the timed one.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::key::SamplingKey;
use crate::sampler::Sampler;

/// Default proxy budget: samples per window.
pub const DEFAULT_PROXY_RATE: u32 = 300;
/// Default proxy budget window.
pub const DEFAULT_PROXY_INTERVAL: Duration = Duration::from_secs(60);

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Accepts at most `rate` samples per `interval`, regardless of key.
///
/// # Example
/// ```
/// use apisec_sampling::{ProxySampler, Sampler, SamplingKey};
/// use std::time::Duration;
///
/// let sampler = ProxySampler::new(2, Duration::from_secs(60));
/// let key = SamplingKey::new("GET", "/", 200);
/// assert!(sampler.decision_for(&key));
/// assert!(sampler.decision_for(&key));
/// assert!(!sampler.decision_for(&key));
/// ```
pub struct ProxySampler<C: Clock = DefaultClock> {
    /// `None` when the rate is 0.
    limiter: Option<DirectLimiter<C>>,
    rate: u32,
    interval: Duration,
}

impl ProxySampler {
    /// A sampler accepting `rate` samples per `interval` on the default
    /// monotonic clock.
    ///
    /// A `rate` of 0 never samples.
    pub fn new(rate: u32, interval: Duration) -> Self {
        Self::with_clock(rate, interval, &DefaultClock::default())
    }
}

impl<C: Clock> ProxySampler<C> {
    /// Like [`ProxySampler::new`], reading time from `clock`; tests pass a
    /// `governor::clock::FakeRelativeClock`.
    pub fn with_clock(rate: u32, interval: Duration, clock: &C) -> Self {
        ProxySampler {
            limiter: quota(rate, interval)
                .map(|quota| RateLimiter::direct_with_clock(quota, clock)),
            rate,
            interval,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes one sample from the budget if any is left.
    pub fn allow(&self) -> bool {
        self.limiter
            .as_ref()
            .is_some_and(|limiter| limiter.check().is_ok())
    }
}

/// `rate` samples per `interval`, all of them available as a burst.
fn quota(rate: u32, interval: Duration) -> Option<Quota> {
    let burst = NonZeroU32::new(rate)?;
    let period = (interval / rate).max(Duration::from_nanos(1));
    Quota::with_period(period).map(|quota| quota.allow_burst(burst))
}

impl<C> Sampler for ProxySampler<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    #[inline]
    fn decision_for(&self, _key: &SamplingKey<'_>) -> bool {
        self.allow()
    }
}

impl<C: Clock> fmt::Debug for ProxySampler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySampler")
            .field("rate", &self.rate)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Never samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    #[inline]
    fn decision_for(&self, _key: &SamplingKey<'_>) -> bool {
        false
    }
}
