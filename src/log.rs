//! Narrow, leveled logging capability.
//!
//! Collaborators that need to report problems (currently the configuration
//! loader) take a [`Logger`] instead of reaching for a global. The default,
//! [`TracingLogger`], forwards to `tracing`, so the host application's
//! subscriber decides what is kept.

use std::fmt;

pub use tracing::Level;

/// A sink for leveled, preformatted log messages.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: fmt::Arguments<'_>);

    fn trace(&self, message: fmt::Arguments<'_>) {
        self.log(Level::TRACE, message)
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        self.log(Level::DEBUG, message)
    }

    fn info(&self, message: fmt::Arguments<'_>) {
        self.log(Level::INFO, message)
    }

    fn warn(&self, message: fmt::Arguments<'_>) {
        self.log(Level::WARN, message)
    }

    fn error(&self, message: fmt::Arguments<'_>) {
        self.log(Level::ERROR, message)
    }
}

/// Forwards every message to the `tracing` macros under the
/// `apisec_sampling` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        match level {
            Level::ERROR => tracing::error!(target: "apisec_sampling", "{message}"),
            Level::WARN => tracing::warn!(target: "apisec_sampling", "{message}"),
            Level::INFO => tracing::info!(target: "apisec_sampling", "{message}"),
            Level::DEBUG => tracing::debug!(target: "apisec_sampling", "{message}"),
            _ => tracing::trace!(target: "apisec_sampling", "{message}"),
        }
    }
}
