//! Travel matrix provider
//!
//! Builds NxN distance/time matrices for a point set. Prefers the external
//! matrix HTTP service; any failure (missing endpoint, HTTP error, timeout,
//! cancellation, malformed payload) degrades to geometry-derived estimates
//! with a warning. This module never returns an error.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::services::geo::haversine_km;
use crate::types::Coordinates;

/// Which provider produced the matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixProviderKind {
    External,
    Geometry,
}

/// Distance and time matrices between locations
#[derive(Debug, Clone)]
pub struct TravelMatrix {
    pub provider: MatrixProviderKind,
    /// Distance in meters [i][j] from location i to location j
    pub distances: Vec<Vec<f64>>,
    /// Travel time in seconds [i][j] from location i to location j
    pub times: Vec<Vec<f64>>,
    pub warnings: Vec<String>,
}

impl TravelMatrix {
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }

    pub fn time(&self, from: usize, to: usize) -> f64 {
        self.times[from][to]
    }

    pub fn size(&self) -> usize {
        self.distances.len()
    }
}

/// Matrix source abstraction (external client, geometry-only, test fakes)
#[async_trait]
pub trait MatrixSource: Send + Sync {
    /// Get matrices for a list of locations. Infallible: degraded results
    /// carry warnings instead of errors.
    async fn matrices(
        &self,
        points: &[Coordinates],
        speed_kmh: f64,
        cancel: &CancellationToken,
    ) -> TravelMatrix;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Matrix client configuration
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Base URL of the matrix endpoint; None disables the external call
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Routing profile sent to the provider
    pub profile: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_seconds: 10,
            profile: "car".to_string(),
        }
    }
}

/// HTTP matrix client with geometry fallback
pub struct HttpMatrixClient {
    client: Client,
    config: MatrixConfig,
}

impl HttpMatrixClient {
    pub fn new(config: MatrixConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    async fn fetch_external(
        &self,
        endpoint: &str,
        points: &[Coordinates],
    ) -> anyhow::Result<MatrixResponse> {
        use anyhow::Context;

        let request = MatrixRequest {
            profile: self.config.profile.clone(),
            points: points.iter().map(|p| [p.lng, p.lat]).collect(),
            outputs: vec!["distances".to_string(), "times".to_string()],
        };

        debug!("Requesting travel matrix for {} points", points.len());

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to matrix provider")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("matrix provider returned status {}", status);
        }

        response
            .json::<MatrixResponse>()
            .await
            .context("Failed to parse matrix provider response")
    }
}

#[async_trait]
impl MatrixSource for HttpMatrixClient {
    async fn matrices(
        &self,
        points: &[Coordinates],
        speed_kmh: f64,
        cancel: &CancellationToken,
    ) -> TravelMatrix {
        let endpoint = match &self.config.endpoint {
            Some(url) => url.clone(),
            None => {
                let mut matrix = geometry_matrix(points, speed_kmh);
                matrix
                    .warnings
                    .push("matrix provider is not configured, using geometry estimates".to_string());
                return matrix;
            }
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Matrix request cancelled, falling back to geometry");
                let mut matrix = geometry_matrix(points, speed_kmh);
                matrix.warnings.push("matrix request was cancelled".to_string());
                return matrix;
            }
            result = self.fetch_external(&endpoint, points) => result,
        };

        match response {
            Ok(payload) => sanitize_external(points, payload, speed_kmh),
            Err(err) => {
                warn!("Matrix provider failed: {:#}", err);
                let mut matrix = geometry_matrix(points, speed_kmh);
                matrix
                    .warnings
                    .push(format!("matrix provider unavailable ({err}), using geometry estimates"));
                matrix
            }
        }
    }

    fn name(&self) -> &str {
        "HttpMatrix"
    }
}

/// Geometry-only matrix source for paths that should skip the HTTP round-trip
#[derive(Debug, Default)]
pub struct GeometryMatrixSource;

#[async_trait]
impl MatrixSource for GeometryMatrixSource {
    async fn matrices(
        &self,
        points: &[Coordinates],
        speed_kmh: f64,
        _cancel: &CancellationToken,
    ) -> TravelMatrix {
        geometry_matrix(points, speed_kmh)
    }

    fn name(&self) -> &str {
        "Geometry"
    }
}

/// Build matrices from great-circle distances at the given average speed
pub fn geometry_matrix(points: &[Coordinates], speed_kmh: f64) -> TravelMatrix {
    let n = points.len();
    let mut distances = vec![vec![0.0; n]; n];
    let mut times = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i != j {
                let meters = haversine_km(&points[i], &points[j]) * 1000.0;
                distances[i][j] = meters;
                times[i][j] = geometry_seconds(meters, speed_kmh);
            }
        }
    }

    TravelMatrix {
        provider: MatrixProviderKind::Geometry,
        distances,
        times,
        warnings: vec![],
    }
}

/// Travel seconds for a distance in meters at the given speed, floored at 0
fn geometry_seconds(meters: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    (meters * 3.6 / speed_kmh).max(0.0)
}

/// Validate and repair an external payload cell by cell.
/// Shape mismatch discards the payload entirely; bad cells are recomputed
/// via geometry. The diagonal is always forced to 0.
fn sanitize_external(
    points: &[Coordinates],
    payload: MatrixResponse,
    speed_kmh: f64,
) -> TravelMatrix {
    let n = points.len();
    let mut warnings: Vec<String> = payload
        .info
        .map(|info| info.messages)
        .unwrap_or_default();

    if !matrix_shape_ok(&payload.distances, n) || !matrix_shape_ok(&payload.times, n) {
        warn!("Matrix provider returned unexpected shape for {} points", n);
        let mut matrix = geometry_matrix(points, speed_kmh);
        matrix
            .warnings
            .push("matrix provider returned an unexpected shape, using geometry estimates".to_string());
        matrix.warnings.extend(warnings);
        return matrix;
    }

    let mut distances = payload.distances;
    let mut times = payload.times;
    let mut repaired = 0usize;

    for i in 0..n {
        for j in 0..n {
            if i == j {
                distances[i][j] = 0.0;
                times[i][j] = 0.0;
                continue;
            }

            if !distances[i][j].is_finite() || distances[i][j] < 0.0 {
                distances[i][j] = haversine_km(&points[i], &points[j]) * 1000.0;
                repaired += 1;
            }
            if !times[i][j].is_finite() || times[i][j] < 0.0 {
                times[i][j] = geometry_seconds(distances[i][j], speed_kmh);
                repaired += 1;
            }
        }
    }

    if repaired > 0 {
        warnings.push(format!(
            "{repaired} matrix cells were invalid and recomputed from geometry"
        ));
    }

    TravelMatrix {
        provider: MatrixProviderKind::External,
        distances,
        times,
        warnings,
    }
}

fn matrix_shape_ok(matrix: &[Vec<f64>], n: usize) -> bool {
    matrix.len() == n && matrix.iter().all(|row| row.len() == n)
}

// Matrix provider API types

#[derive(Debug, Serialize)]
struct MatrixRequest {
    profile: String,
    /// Points in [lng, lat] order
    points: Vec<[f64; 2]>,
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    distances: Vec<Vec<f64>>,
    times: Vec<Vec<f64>>,
    #[serde(default)]
    info: Option<MatrixInfo>,
}

#[derive(Debug, Deserialize)]
struct MatrixInfo {
    #[serde(default)]
    messages: Vec<String>,
}
