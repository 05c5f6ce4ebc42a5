//! Route preparation pipeline.
//!
//! Turns a raw polyline into a playable [`Route`] in three phases:
//!
//! 1. **Dedup & annotate** - drop coincident vertices, derive per-point
//!    speed and track, accumulate the original polyline length.
//! 2. **Elevation** - best-effort enrichment via the elevation service.
//! 3. **Densification** - when a speed cap is set, split any gap longer
//!    than the stride bound into exact multiples of it along the great
//!    circle, so one emission tick never covers more ground than the cap
//!    allows.

use std::sync::Arc;
use std::time::Duration;

use crate::geo;
use crate::log::Logger;
use crate::log_error;

use super::elevation::ElevationClient;
use super::model::{LatLon, Point, Route};

/// Builds playable routes from raw polylines.
pub struct RoutePreparer {
    step_delay: Duration,
    elevation: ElevationClient,
    logger: Arc<dyn Logger>,
}

impl RoutePreparer {
    pub fn new(step_delay: Duration, elevation: ElevationClient, logger: Arc<dyn Logger>) -> Self {
        Self {
            step_delay,
            elevation,
            logger,
        }
    }

    /// Prepare a route from a raw polyline.
    ///
    /// `max_speed_kmh` of 0 means unbounded; any positive value enables
    /// densification with a stride bound of
    /// `max_speed_kmh / 3.6 * step_delay` metres.
    pub async fn prepare(&self, name: &str, max_speed_kmh: u32, polyline: &[LatLon]) -> Route {
        let mut route = Route {
            name: name.to_string(),
            max_speed: max_speed_kmh,
            ..Default::default()
        };

        // Phase 1: dedup & annotate. segment_distances[i] is the original
        // great-circle distance from point i-1 to point i.
        let mut segment_distances: Vec<f64> = Vec::with_capacity(polyline.len());

        for raw in polyline {
            let Some(prev) = route.points.last() else {
                route.points.push(Point {
                    lat: raw.lat,
                    lon: raw.lon,
                    ..Default::default()
                });
                segment_distances.push(0.0);
                continue;
            };

            if prev.lat == raw.lat && prev.lon == raw.lon {
                continue;
            }

            let speed = geo::speed(prev.lat, prev.lon, raw.lat, raw.lon, self.step_delay);
            let track = geo::initial_bearing(prev.lat, prev.lon, raw.lat, raw.lon);
            let segment = geo::distance(prev.lat, prev.lon, raw.lat, raw.lon);
            route.distance += segment;
            segment_distances.push(segment);

            route.points.push(Point {
                lat: raw.lat,
                lon: raw.lon,
                speed,
                track,
                ..Default::default()
            });
        }

        // Phase 2: elevation is best-effort and never blocks playback.
        if let Err(e) = self.elevation.enrich(&mut route.points).await {
            log_error!(self.logger, "route: error updating route elevations: {e}");
        }

        // Phase 3: densification.
        if max_speed_kmh > 0 && route.points.len() > 2 {
            let stride = f64::from(max_speed_kmh) / 3.6 * self.step_delay.as_secs_f64();
            let densified = densify(&route.points, &segment_distances, stride, self.step_delay);
            if densified.len() > route.points.len() {
                route.points = densified;
            }
        }

        route
    }
}

/// Split every gap longer than `stride` into intermediates at exact
/// multiples of it along the great circle.
///
/// Intermediates take the gap's bearing as their track, a speed recomputed
/// from their densified predecessor, and the predecessor's elevation. The
/// original gap endpoint is kept unchanged.
fn densify(
    points: &[Point],
    segment_distances: &[f64],
    stride: f64,
    step_delay: Duration,
) -> Vec<Point> {
    let mut result: Vec<Point> = Vec::with_capacity(points.len());

    for (i, point) in points.iter().enumerate() {
        if i == 0 {
            result.push(*point);
            continue;
        }

        let gap = segment_distances[i];
        if gap <= stride {
            result.push(*point);
            continue;
        }

        let origin = result[result.len() - 1];
        let bearing = geo::initial_bearing(origin.lat, origin.lon, point.lat, point.lon);

        let intermediates = (gap / stride).ceil() as usize - 1;
        for j in 1..=intermediates {
            let (lat, lon) = geo::destination(origin.lat, origin.lon, bearing, j as f64 * stride);
            let prev = result[result.len() - 1];
            result.push(Point {
                lat,
                lon,
                speed: geo::speed(prev.lat, prev.lon, lat, lon, step_delay),
                track: bearing,
                elevation: prev.elevation,
            });
        }

        result.push(*point);
    }

    result
}
