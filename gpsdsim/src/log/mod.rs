//! Logging abstraction layer.
//!
//! Components log through the [`Logger`] trait instead of calling a backend
//! directly, so the playback engine can run under `tracing` in production
//! and stay silent in tests.
//!
//! - `Logger` trait: the capability set components rely on
//! - `TracingLogger`: production adapter delegating to the `tracing` crate
//! - `NoOpLogger`: discards everything, for tests
//!
//! Components accept an `Arc<dyn Logger>` and use the format-args macros:
//!
//! ```
//! use gpsdsim::log::{Logger, NoOpLogger};
//! use gpsdsim::log_info;
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_info!(logger, "route loaded with {} points", 42);
//! ```

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
