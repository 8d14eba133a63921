//! Sampling decisions for API Security schema extraction.
//!
//! Extracting a request's schema is expensive, so each request shape
//! (method, route, status code) is sampled at most once per interval.
//! [`Deduplicator`] is the bounded, lock-free table behind that decision;
//! [`TimedSampler`] and [`ProxySampler`] put it behind the [`Sampler`] trait.

mod builder;
mod error;
mod key;
mod metrics;
mod sampler;
mod timed;
pub mod clock;
pub mod config;
pub mod log;

pub use builder::DeduplicatorBuilder;
pub use config::ApiSecConfig;
pub use error::{Error, Result};
pub use key::SamplingKey;
pub use log::{Logger, TracingLogger};
pub use metrics::stats::Metrics;
pub use sampler::{NeverSampler, ProxySampler, Sampler, TimedSampler, DEFAULT_INTERVAL};
pub use timed::{Deduplicator, Preset, DEFAULT_MAX_ITEMS};
