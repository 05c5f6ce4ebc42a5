//! GPSD Simulator - replay geographic routes as a moving GPS fix
//!
//! This library impersonates a GPS daemon on its native TCP port. A route
//! (a polyline of latitude/longitude waypoints) is prepared into a dense,
//! time-uniform sequence of motion samples and replayed at a fixed cadence
//! to every connected client, speaking the GPSD line-JSON protocol.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gpsdsim::log::TracingLogger;
//! use gpsdsim::route::Controller;
//! use gpsdsim::gpsd::{GpsdServer, WriterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let logger = Arc::new(TracingLogger);
//! let shutdown = CancellationToken::new();
//! let controller = Arc::new(Controller::new(
//!     shutdown.clone(),
//!     Duration::from_secs(1),
//!     logger.clone(),
//! ));
//! controller.startup();
//!
//! let server = GpsdServer::bind(shutdown, 2947, WriterConfig::default(), controller, logger).await?;
//! server.startup();
//! ```

pub mod geo;
pub mod gpsd;
pub mod http;
pub mod log;
pub mod logging;
pub mod route;
pub mod update;

/// Version of the gpsdsim library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
