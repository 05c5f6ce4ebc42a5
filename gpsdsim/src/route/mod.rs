//! Route engine.
//!
//! The pipeline from a raw polyline to a replayed GPS fix:
//!
//! - [`model`] - `Point`, `Route`, `PlayState` data model
//! - [`prepare`] - dedup, annotation, elevation, densification
//! - [`elevation`] - open-elevation batch client
//! - [`controller`] - play-state machine, emission loop, subscriber fan-out
//! - [`geojson`] - GeoJSON `LineString` import shape
//! - [`storage`] - persisted route files and import

pub mod controller;
pub mod elevation;
pub mod geojson;
pub mod model;
pub mod prepare;
pub mod storage;
mod subscription;

pub use controller::Controller;
pub use elevation::{ElevationClient, ElevationError};
pub use geojson::GeoJsonFeature;
pub use model::{LatLon, PlayState, Point, Route};
pub use prepare::RoutePreparer;
pub use storage::{import_geojson, load_route, save_route, StorageError};
pub use subscription::SubscriptionHandle;
