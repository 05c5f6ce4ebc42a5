//! Persisted route files and GeoJSON import.
//!
//! A persisted route is the JSON shape of [`Route`]. Loading is forgiving:
//! an empty path or a missing file succeeds with no route, so the daemon
//! can always be started with `--route-file` pointing at a file that will
//! only exist later.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::geojson::GeoJsonFeature;
use super::model::Route;
use super::prepare::RoutePreparer;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Load a persisted route.
///
/// Returns `Ok(None)` for an empty path or a file that does not exist.
/// A decode error is returned to the caller, who logs it and keeps the
/// route it already has.
pub fn load_route(path: &str) -> Result<Option<Route>, StorageError> {
    if path.is_empty() || !Path::new(path).exists() {
        return Ok(None);
    }

    let data = std::fs::read(path).map_err(|source| StorageError::Read {
        path: path.to_string(),
        source,
    })?;
    let route = serde_json::from_slice(&data).map_err(|source| StorageError::Decode {
        path: path.to_string(),
        source,
    })?;
    Ok(Some(route))
}

/// Write a route as a single-line JSON file, newline terminated.
pub fn save_route(route: &Route, path: &Path) -> Result<(), StorageError> {
    let mut data = serde_json::to_vec(route).map_err(|source| StorageError::Encode {
        path: path.display().to_string(),
        source,
    })?;
    data.push(b'\n');
    std::fs::write(path, data).map_err(|source| StorageError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Import a GeoJSON `LineString` file into a persisted route file.
///
/// When `output` is `None` the file lands next to the input, named after
/// the route, its length and the speed cap. Returns the path written.
pub async fn import_geojson(
    preparer: &RoutePreparer,
    name: &str,
    input: &str,
    output: Option<PathBuf>,
    max_speed_kmh: u32,
) -> Result<PathBuf, StorageError> {
    let data = std::fs::read(input).map_err(|source| StorageError::Read {
        path: input.to_string(),
        source,
    })?;
    let feature: GeoJsonFeature =
        serde_json::from_slice(&data).map_err(|source| StorageError::Decode {
            path: input.to_string(),
            source,
        })?;

    let name = if name.is_empty() {
        format!("Route {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    } else {
        name.to_string()
    };

    let route = preparer
        .prepare(&name, max_speed_kmh, &feature.polyline())
        .await;

    let output = output.unwrap_or_else(|| derive_output_path(input, &route));
    save_route(&route, &output)?;
    Ok(output)
}

/// `<name>-<distance><unit>[-<speed>kmh].json`, in the input's directory.
fn derive_output_path(input: &str, route: &Route) -> PathBuf {
    let mut file_name = String::from(&route.name);
    if route.distance > 10_000.0 {
        file_name.push_str(&format!("-{:.2}km", route.distance / 1000.0));
    } else {
        file_name.push_str(&format!("-{:.0}m", route.distance));
    }
    if route.max_speed > 0 {
        file_name.push_str(&format!("-{}kmh", route.max_speed));
    }
    file_name.push_str(".json");

    Path::new(input)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(file_name)
}
