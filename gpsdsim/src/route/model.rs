//! Route data model.
//!
//! A [`Route`] is an ordered sequence of motion samples ([`Point`]) with a
//! display name, the great-circle length of the original polyline, an
//! optional speed cap and a play-state. The serde shapes match the persisted
//! route file: capitalized route keys, lowercase point keys, play-state
//! encoded as an integer.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// A single motion sample. Immutable once emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in WGS-84 decimal degrees.
    pub lat: f64,
    /// Longitude in WGS-84 decimal degrees.
    pub lon: f64,
    /// Ground speed in metres per second, non-negative.
    #[serde(default)]
    pub speed: f64,
    /// Elevation in metres; 0 if unknown.
    #[serde(default)]
    pub elevation: f64,
    /// Track (bearing) in degrees, `[0, 360)`.
    #[serde(default)]
    pub track: f64,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// A raw polyline vertex, before preparation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Playback state of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum PlayState {
    #[default]
    Paused = 0,
    Running = 1,
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayState::Paused => write!(f, "Paused"),
            PlayState::Running => write!(f, "Running"),
        }
    }
}

/// A prepared route: the densified point sequence plus its metadata.
///
/// `distance` is the haversine sum over the original polyline, not the
/// densified one. `max_speed` is km/h; 0 means unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    pub name: String,
    pub distance: f64,
    pub points: Vec<Point>,
    pub state: PlayState,
    pub max_speed: u32,
}

impl Route {
    /// Number of points in the (possibly densified) sequence.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => write!(
                f,
                "route with {} points from {} to {} is currently {}",
                self.points.len(),
                first,
                last,
                self.state
            ),
            _ => write!(f, "empty route"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_state_integer_encoding() {
        assert_eq!(serde_json::to_string(&PlayState::Paused).unwrap(), "0");
        assert_eq!(serde_json::to_string(&PlayState::Running).unwrap(), "1");

        let state: PlayState = serde_json::from_str("1").unwrap();
        assert_eq!(state, PlayState::Running);
    }

    #[test]
    fn test_route_file_shape() {
        let route = Route {
            name: "Lakeside".into(),
            distance: 2223.9,
            points: vec![Point {
                lat: 47.0,
                lon: 8.0,
                speed: 0.0,
                elevation: 431.0,
                track: 0.0,
            }],
            state: PlayState::Running,
            max_speed: 50,
        };

        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["Name"], "Lakeside");
        assert_eq!(json["State"], 1);
        assert_eq!(json["MaxSpeed"], 50);
        assert_eq!(json["Points"][0]["lat"], 47.0);
        assert_eq!(json["Points"][0]["elevation"], 431.0);
    }

    #[test]
    fn test_route_deserialize_missing_fields_default() {
        // Files written by older builds may omit state and speed cap.
        let route: Route =
            serde_json::from_str(r#"{"Name":"x","Points":[{"lat":1.0,"lon":2.0}]}"#).unwrap();
        assert_eq!(route.state, PlayState::Paused);
        assert_eq!(route.max_speed, 0);
        assert_eq!(route.points[0].speed, 0.0);
    }

    #[test]
    fn test_route_display() {
        let mut route = Route::default();
        assert_eq!(route.to_string(), "empty route");

        route.points = vec![
            Point {
                lat: 47.0,
                lon: 8.0,
                ..Default::default()
            },
            Point {
                lat: 47.01,
                lon: 8.0,
                ..Default::default()
            },
        ];
        route.state = PlayState::Running;
        let text = route.to_string();
        assert!(text.contains("2 points"));
        assert!(text.contains("Running"));
    }
}
