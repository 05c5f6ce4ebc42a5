//! Elevation enrichment via the open-elevation lookup API.
//!
//! Points are posted in batches and the response elevations are written
//! back in place. Enrichment is best-effort: any failure surfaces as a
//! single [`ElevationError`] for the whole call and the caller decides
//! whether playback proceeds without elevations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::Point;

/// Public lookup endpoint of the open-elevation service.
pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

/// Maximum number of locations per lookup request.
const MAX_POINTS_PER_REQUEST: usize = 20_000;

/// HTTP timeout for a single batch.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single enrichment call.
#[derive(Debug, Error)]
pub enum ElevationError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("elevation request failed: {0}")]
    Transport(String),

    /// The service answered with a non-200 status.
    #[error("elevation service returned status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("failed to decode elevation response: {0}")]
    Decode(String),

    /// The service returned a different number of results than requested.
    #[error("unexpected number of elevation results: {got}, expected {expected}")]
    ResultCountMismatch { got: usize, expected: usize },
}

#[derive(Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

#[derive(Deserialize)]
struct LookupResult {
    latitude: f64,
    longitude: f64,
    elevation: f64,
}

#[derive(Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

/// Batch client for the open-elevation lookup API.
///
/// Certificate verification is disabled for the public endpoint; this
/// mirrors the daemon's long-standing behavior.
pub struct ElevationClient {
    http: reqwest::Client,
    lookup_url: String,
}

impl Default for ElevationClient {
    fn default() -> Self {
        Self::new(DEFAULT_ELEVATION_URL.to_string())
    }
}

impl ElevationClient {
    /// Create a client against a specific lookup URL.
    ///
    /// The URL is configurable so tests can point the client at a local
    /// stub server.
    pub fn new(lookup_url: String) -> Self {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self { http, lookup_url }
    }

    /// Annotate each point's elevation in place.
    ///
    /// Points are processed in batches of at most 20 000, in order. Points
    /// whose coordinates do not appear in the response keep their prior
    /// elevation.
    pub async fn enrich(&self, points: &mut [Point]) -> Result<(), ElevationError> {
        if points.is_empty() {
            return Ok(());
        }

        let total = points.len();
        let batches = total.div_ceil(MAX_POINTS_PER_REQUEST);

        for (batch_index, offset) in (0..total).step_by(MAX_POINTS_PER_REQUEST).enumerate() {
            let end = (offset + MAX_POINTS_PER_REQUEST).min(total);
            let batch = &mut points[offset..end];

            let request = LookupRequest {
                locations: batch
                    .iter()
                    .map(|p| LookupLocation {
                        latitude: p.lat,
                        longitude: p.lon,
                    })
                    .collect(),
            };

            tracing::debug!(
                batch = batch_index + 1,
                batches,
                locations = batch.len(),
                "requesting elevations"
            );

            let response = self
                .http
                .post(&self.lookup_url)
                .json(&request)
                .send()
                .await
                .map_err(|e| ElevationError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ElevationError::Status(status.as_u16()));
            }

            let decoded: LookupResponse = response
                .json()
                .await
                .map_err(|e| ElevationError::Decode(e.to_string()))?;

            if decoded.results.len() != batch.len() {
                return Err(ElevationError::ResultCountMismatch {
                    got: decoded.results.len(),
                    expected: batch.len(),
                });
            }

            apply_results(batch, &decoded.results);
        }

        Ok(())
    }
}

/// Write response elevations back onto the batch.
///
/// The response is not assumed to be positionally aligned with the request:
/// each result is matched to the first point in the batch with exactly equal
/// coordinates. Duplicated coordinates only ever update their first
/// occurrence.
fn apply_results(batch: &mut [Point], results: &[LookupResult]) {
    for result in results {
        for point in batch.iter_mut() {
            if point.lat == result.latitude && point.lon == result.longitude {
                point.elevation = result.elevation;
                break;
            }
        }
    }
}
