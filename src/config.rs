//! Environment-driven configuration for API Security sampling.
//!
//! Parsing problems never fail configuration: the offending variable is
//! reported through the configured [`Logger`] at debug level and its default
//! is used instead.
//!
//! # Example
//! ```
//! use apisec_sampling::config::{ApiSecConfig, ENV_API_SEC_ENABLED};
//!
//! let cfg = ApiSecConfig::builder().build_with_lookup(|name| {
//!     (name == ENV_API_SEC_ENABLED).then(|| "false".to_string())
//! });
//! assert!(!cfg.enabled);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::log::{Logger, TracingLogger};
use crate::sampler::{
    NeverSampler, ProxySampler, Sampler, TimedSampler, DEFAULT_INTERVAL, DEFAULT_PROXY_INTERVAL,
    DEFAULT_PROXY_RATE,
};

/// Enables or disables API Security (default: enabled).
pub const ENV_API_SEC_ENABLED: &str = "DD_API_SECURITY_ENABLED";
/// Legacy probabilistic sample rate, superseded by the samplers.
pub const ENV_API_SEC_SAMPLE_RATE: &str = "DD_API_SECURITY_REQUEST_SAMPLE_RATE";
/// Proxy budget, in samples per minute.
pub const ENV_API_SEC_PROXY_SAMPLE_RATE: &str = "DD_API_SECURITY_PROXY_SAMPLE_RATE";
/// Per-key sampling interval in seconds; meant for system tests.
pub const ENV_API_SEC_SAMPLE_DELAY: &str = "DD_API_SECURITY_SAMPLE_DELAY";

/// Default legacy sample rate.
pub const DEFAULT_SAMPLE_RATE: f64 = 0.1;

// ---------------------------------------------------------------------------
// ApiSecConfig
// ---------------------------------------------------------------------------

/// Resolved API Security sampling configuration.
pub struct ApiSecConfig {
    pub sampler: Arc<dyn Sampler>,
    pub enabled: bool,
    pub is_proxy: bool,
    /// Legacy rate in `[0, 1]`; kept for callers that still read it.
    pub sample_rate: f64,
}

impl ApiSecConfig {
    pub fn builder() -> ApiSecConfigBuilder {
        ApiSecConfigBuilder::new()
    }

    /// Reads the configuration from the process environment with defaults.
    pub fn from_env() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ApiSecConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSecConfig")
            .field("enabled", &self.enabled)
            .field("is_proxy", &self.is_proxy)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`ApiSecConfig`].
pub struct ApiSecConfigBuilder {
    sampler: Option<Arc<dyn Sampler>>,
    is_proxy: bool,
    logger: Arc<dyn Logger>,
}

impl ApiSecConfigBuilder {
    pub fn new() -> Self {
        ApiSecConfigBuilder {
            sampler: None,
            is_proxy: false,
            logger: Arc::new(TracingLogger),
        }
    }

    /// Configure for a proxy: an aggregate per-minute budget replaces per-key
    /// deduplication.
    pub fn proxy(mut self) -> Self {
        self.is_proxy = true;
        self
    }

    /// Use `sampler` as is; the sampler-related variables are then ignored.
    pub fn sampler<S: Sampler + 'static>(mut self, sampler: S) -> Self {
        self.sampler = Some(Arc::new(sampler));
        self
    }

    /// Report configuration problems to `logger` instead of `tracing`.
    pub fn logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Resolves the configuration from the process environment.
    pub fn build(self) -> ApiSecConfig {
        self.build_with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves the configuration, reading variables through `lookup`.
    pub fn build_with_lookup<F>(self, lookup: F) -> ApiSecConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader {
            lookup,
            logger: &*self.logger,
        };
        let enabled = env.bool(ENV_API_SEC_ENABLED, true);
        let sample_rate = env.sample_rate();

        let sampler = match self.sampler {
            Some(sampler) => sampler,
            None if self.is_proxy => env.proxy_sampler(),
            None => env.timed_sampler(),
        };

        ApiSecConfig {
            sampler,
            enabled,
            is_proxy: self.is_proxy,
            sample_rate,
        }
    }
}

impl Default for ApiSecConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Variable parsing
// ---------------------------------------------------------------------------

struct EnvReader<'a, F> {
    lookup: F,
    logger: &'a dyn Logger,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn bool(&self, name: &str, default: bool) -> bool {
        let Some(value) = (self.lookup)(name) else {
            return default;
        };
        match parse_bool(&value) {
            Some(parsed) => parsed,
            None => {
                self.parse_failure(name, &value, "not a boolean", default);
                default
            }
        }
    }

    fn sample_rate(&self) -> f64 {
        let Some(value) = (self.lookup)(ENV_API_SEC_SAMPLE_RATE).filter(|v| !v.is_empty()) else {
            return DEFAULT_SAMPLE_RATE;
        };
        match value.trim().parse::<f64>() {
            Ok(rate) if !rate.is_nan() => rate.clamp(0.0, 1.0),
            Ok(_) => {
                self.parse_failure(
                    ENV_API_SEC_SAMPLE_RATE,
                    &value,
                    "not a number",
                    DEFAULT_SAMPLE_RATE,
                );
                DEFAULT_SAMPLE_RATE
            }
            Err(err) => {
                self.parse_failure(ENV_API_SEC_SAMPLE_RATE, &value, err, DEFAULT_SAMPLE_RATE);
                DEFAULT_SAMPLE_RATE
            }
        }
    }

    fn proxy_sampler(&self) -> Arc<dyn Sampler> {
        let rate = match (self.lookup)(ENV_API_SEC_PROXY_SAMPLE_RATE) {
            None => DEFAULT_PROXY_RATE,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(rate) => rate,
                Err(err) => {
                    self.parse_failure(
                        ENV_API_SEC_PROXY_SAMPLE_RATE,
                        &value,
                        err,
                        DEFAULT_PROXY_RATE,
                    );
                    DEFAULT_PROXY_RATE
                }
            },
        };
        if rate == 0 {
            self.logger.debug(format_args!(
                "appsec: {ENV_API_SEC_PROXY_SAMPLE_RATE}=0, API Security schemas will not be sampled"
            ));
            return Arc::new(NeverSampler);
        }
        Arc::new(ProxySampler::new(rate, DEFAULT_PROXY_INTERVAL))
    }

    fn timed_sampler(&self) -> Arc<dyn Sampler> {
        let interval = self.seconds(ENV_API_SEC_SAMPLE_DELAY, DEFAULT_INTERVAL);
        match TimedSampler::with_interval(interval) {
            Ok(sampler) => Arc::new(sampler),
            Err(err) => {
                self.unexpected_value(
                    ENV_API_SEC_SAMPLE_DELAY,
                    &format!("{interval:?}"),
                    err,
                    DEFAULT_INTERVAL,
                );
                Arc::new(TimedSampler::new())
            }
        }
    }

    /// A non-negative number of seconds, fractional values allowed.
    fn seconds(&self, name: &str, default: Duration) -> Duration {
        let Some(value) = (self.lookup)(name) else {
            return default;
        };
        match value.trim().parse::<f64>() {
            Ok(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(duration) => duration,
                Err(err) => {
                    self.unexpected_value(name, &value, err, default);
                    default
                }
            },
            Err(err) => {
                self.parse_failure(name, &value, err, default);
                default
            }
        }
    }

    fn parse_failure(
        &self,
        name: &str,
        value: &str,
        err: impl fmt::Display,
        default: impl fmt::Debug,
    ) {
        self.logger.debug(format_args!(
            "appsec: could not parse the env var {name}={value}: {err}. Using default value {default:?}."
        ));
    }

    fn unexpected_value(
        &self,
        name: &str,
        value: &str,
        reason: impl fmt::Display,
        default: impl fmt::Debug,
    ) {
        self.logger.debug(format_args!(
            "appsec: unexpected configuration value of {name}={value}: {reason}. Using default value {default:?}."
        ));
    }
}

/// Accepts the spellings `1 t T TRUE true True` and `0 f F FALSE false False`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
