//! GPSD protocol front-end.
//!
//! - [`writer`] - the four line-JSON record types on a byte sink
//! - [`server`] - TCP listener, per-connection command loop and TPV pump

pub mod server;
pub mod writer;

pub use server::{GpsdServer, ServerError};
pub use writer::{Writer, WriterConfig};

/// Client command that activates TPV reporting, matched by prefix.
pub const WATCH_COMMAND: &str = "?WATCH=";

/// GPSD client command terminator.
pub const COMMAND_SUFFIX: u8 = b';';
