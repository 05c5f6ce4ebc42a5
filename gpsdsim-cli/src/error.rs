//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use gpsdsim::gpsd::ServerError;
use gpsdsim::http::HttpError;
use gpsdsim::route::StorageError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the GPSD server
    GpsdServer(ServerError),
    /// Failed to start the web UI server
    HttpServer(HttpError),
    /// Failed to import a GeoJSON route
    Import(StorageError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::GpsdServer(_) | CliError::HttpServer(_) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. The port is already in use by another process");
                eprintln!("  2. Ports below 1024 need elevated privileges");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::GpsdServer(e) => write!(f, "Failed to start the GPSD server: {}", e),
            CliError::HttpServer(e) => write!(f, "Failed to start the web UI server: {}", e),
            CliError::Import(e) => write!(f, "Failed to import route: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::GpsdServer(e) => Some(e),
            CliError::HttpServer(e) => Some(e),
            CliError::Import(e) => Some(e),
            _ => None,
        }
    }
}
