//! No-operation logger implementation.

use std::fmt::Arguments;

use crate::log::{LogLevel, Logger};

/// A logger that discards all messages.
///
/// Used in unit tests where log output would be noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}

    #[inline]
    fn raw(&self, _args: Arguments<'_>) {}
}
