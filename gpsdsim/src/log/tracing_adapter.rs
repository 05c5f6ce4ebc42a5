//! Tracing library adapter implementation.

use std::fmt::Arguments;

use crate::log::{LogLevel, Logger};

/// Logger implementation that delegates to the `tracing` crate.
///
/// Bridges the [`Logger`] trait to the `tracing` ecosystem so application
/// code stays decoupled from the backend. `fatal` maps to the error level
/// (tracing has no fatal); `raw` writes directly to stdout, which is where
/// the operator-facing banners belong.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    /// Create a new tracing logger adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", args),
            LogLevel::Info => tracing::info!("{}", args),
            LogLevel::Warn => tracing::warn!("{}", args),
            LogLevel::Error => tracing::error!("{}", args),
            LogLevel::Fatal => tracing::error!("FATAL: {}", args),
        }
    }

    fn raw(&self, args: Arguments<'_>) {
        println!("{}", args);
    }
}
