//! Great-circle geometry primitives.
//!
//! All formulas assume a spherical Earth with radius [`EARTH_RADIUS_METERS`].
//! Latitudes and longitudes are WGS-84 decimal degrees, distances are
//! metres, bearings are degrees clockwise from true north in `[0, 360)`.

use std::f64::consts::PI;
use std::time::Duration;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[inline]
pub fn degrees_to_radians(deg: f64) -> f64 {
    deg * PI / 180.0
}

#[inline]
pub fn radians_to_degrees(rad: f64) -> f64 {
    rad * 180.0 / PI
}

/// Great-circle distance between two points, via the haversine formula.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = degrees_to_radians(lat1);
    let lat2_rad = degrees_to_radians(lat2);
    let delta_lat = degrees_to_radians(lat2 - lat1);
    let delta_lon = degrees_to_radians(lon2 - lon1);

    let a = (delta_lat / 2.0).sin() * (delta_lat / 2.0).sin()
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin() * (delta_lon / 2.0).sin();

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Initial forward azimuth from the first point toward the second.
///
/// The result is normalized to `[0, 360)` with a full-circle modulo.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = degrees_to_radians(lat1);
    let lat2_rad = degrees_to_radians(lat2);
    let delta_lon_rad = degrees_to_radians(lon2 - lon1);

    let x = delta_lon_rad.sin() * lat2_rad.cos();
    let y = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon_rad.cos();

    let bearing_deg = radians_to_degrees(x.atan2(y));
    (bearing_deg + 360.0) % 360.0
}

/// Great-circle endpoint reached from a start point along `bearing_deg`
/// after `distance_m` metres.
pub fn destination(lat1: f64, lon1: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let lat1_rad = degrees_to_radians(lat1);
    let lon1_rad = degrees_to_radians(lon1);
    let bearing_rad = degrees_to_radians(bearing_deg);
    let angular_distance = distance_m / EARTH_RADIUS_METERS;

    let lat2_rad = (lat1_rad.sin() * angular_distance.cos()
        + lat1_rad.cos() * angular_distance.sin() * bearing_rad.cos())
    .asin();
    let lon2_rad = lon1_rad
        + (bearing_rad.sin() * angular_distance.sin() * lat1_rad.cos())
            .atan2(angular_distance.cos() - lat1_rad.sin() * lat2_rad.sin());

    (radians_to_degrees(lat2_rad), radians_to_degrees(lon2_rad))
}

/// Ground speed in metres per second for covering the great-circle distance
/// between two points in `duration`. Zero when the duration is zero.
pub fn speed(lat1: f64, lon1: f64, lat2: f64, lon2: f64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds == 0.0 {
        return 0.0;
    }
    distance(lat1, lon1, lat2, lon2) / seconds
}
