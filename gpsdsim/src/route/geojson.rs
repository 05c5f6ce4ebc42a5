//! GeoJSON import shape.
//!
//! Only the parts of a Feature the importer needs: a `LineString` geometry
//! with `[lon, lat]` coordinate pairs.

use serde::Deserialize;

use super::model::LatLon;

#[derive(Debug, Default, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub geometry: GeoJsonGeometry,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeoJsonGeometry {
    #[serde(rename = "type", default)]
    pub geometry_type: String,
    #[serde(default)]
    pub coordinates: Vec<Vec<f64>>,
}

impl GeoJsonFeature {
    /// Extract the polyline. GeoJSON stores longitude first; coordinate
    /// arrays shorter than two entries are skipped.
    pub fn polyline(&self) -> Vec<LatLon> {
        self.geometry
            .coordinates
            .iter()
            .filter(|coord| coord.len() >= 2)
            .map(|coord| LatLon::new(coord[1], coord[0]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_swaps_lon_lat() {
        let json = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "LineString",
                "coordinates": [[8.0, 47.0], [8.1, 47.01]]
            }
        }"#;

        let feature: GeoJsonFeature = serde_json::from_str(json).unwrap();
        assert_eq!(feature.geometry.geometry_type, "LineString");

        let polyline = feature.polyline();
        assert_eq!(polyline.len(), 2);
        assert_eq!(polyline[0].lat, 47.0);
        assert_eq!(polyline[0].lon, 8.0);
    }

    #[test]
    fn test_polyline_skips_short_coordinates() {
        let json = r#"{
            "geometry": {
                "type": "LineString",
                "coordinates": [[8.0, 47.0], [1.0], [], [8.1, 47.01, 430.0]]
            }
        }"#;

        let feature: GeoJsonFeature = serde_json::from_str(json).unwrap();
        let polyline = feature.polyline();
        assert_eq!(polyline.len(), 2);
        // A third entry (elevation) is tolerated and ignored.
        assert_eq!(polyline[1].lon, 8.1);
    }
}
