//! Browser-facing control surface.
//!
//! A small HTTP server for driving the simulator from a browser: route
//! upload, play/pause toggling and a server-sent-events stream of the
//! current position. The SSE stream is just another subscriber of the
//! playback controller and obeys the same backpressure contract as a GPSD
//! client.

mod server;

pub use server::{HttpError, HttpServer};
