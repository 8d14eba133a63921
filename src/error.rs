use std::time::Duration;

/// Errors raised while constructing a deduplicator or sampler.
///
/// Decisions themselves never fail; only invalid construction parameters do.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{ctor}: interval must be at least {min:?}, got {interval:?}")]
    IntervalTooShort {
        ctor: &'static str,
        min: Duration,
        interval: Duration,
    },
    #[error("{ctor}: interval must not exceed {max:?}, got {interval:?}")]
    IntervalTooLong {
        ctor: &'static str,
        max: Duration,
        interval: Duration,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
