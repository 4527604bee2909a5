//! External VRP solver adapter
//!
//! Packages tasks + matrices + vehicle constraints into a solve request and
//! runs the external constrained-optimization engine as a subprocess: one
//! JSON request on stdin, one JSON response on stdout. A disabled solver is
//! not an error; a failing one is, so the orchestrator can fall back.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Reserved depot identifier, distinct from all task ids (tasks use Uuids)
pub const DEPOT_ID: &str = "depot";

/// Extra seconds granted on top of the solver's own time limit before the
/// subprocess is considered hung
const KILL_GRACE_SECONDS: u64 = 5;

/// Solver adapter configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Feature flag; disabled solves return immediately with a warning
    pub enabled: bool,
    /// Path to the solver binary
    pub bin: Option<PathBuf>,
    /// Extra arguments passed to the binary
    pub args: Vec<String>,
    /// Time budget handed to the solver, enforced by the process itself
    pub time_limit_seconds: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bin: None,
            args: vec![],
            time_limit_seconds: 10,
        }
    }
}

/// One task entry in the solve request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveTask {
    pub id: String,
    pub demand: f64,
    pub service_minutes: u32,
    /// [earliest, latest] minutes-of-day
    pub time_window: [u32; 2],
}

/// Request written to the solver's stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub tasks: Vec<SolveTask>,
    /// Meters, row-major over depot + tasks
    pub distance_matrix: Vec<Vec<f64>>,
    /// Seconds, same shape
    pub time_matrix: Vec<Vec<f64>>,
    pub vehicle_capacity: f64,
    pub vehicle_count: u32,
    pub depot_index: usize,
    pub time_limit_seconds: u64,
}

/// Response read from the solver's stdout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    #[serde(default)]
    routes: Vec<Vec<String>>,
    total_distance_km: Option<f64>,
    total_duration_minutes: Option<f64>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Adapter result; `enabled: false` means "use the fallback", not an error
#[derive(Debug, Clone, Default)]
pub struct SolverOutcome {
    pub enabled: bool,
    /// Task id sequences per vehicle
    pub routes: Vec<Vec<String>>,
    pub total_distance_km: Option<f64>,
    pub total_duration_minutes: Option<f64>,
    pub warnings: Vec<String>,
}

/// VRP solver subprocess adapter
pub struct SolverAdapter {
    config: SolverConfig,
}

impl SolverAdapter {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.bin.is_some()
    }

    /// Run one solve. Disabled adapters return `enabled: false` immediately;
    /// subprocess failures (spawn error, non-zero exit, timeout, malformed
    /// stdout) are returned as errors for the caller to catch.
    pub async fn solve(&self, request: &SolveRequest) -> Result<SolverOutcome> {
        let bin = match (&self.config.enabled, &self.config.bin) {
            (true, Some(bin)) => bin.clone(),
            _ => {
                debug!("VRP solver disabled, caller will use heuristic fallback");
                return Ok(SolverOutcome {
                    enabled: false,
                    warnings: vec![
                        "external solver is disabled, heuristic assignment was used".to_string(),
                    ],
                    ..Default::default()
                });
            }
        };

        let input = serde_json::to_vec(request).context("Failed to serialize solve request")?;

        debug!(
            "Spawning solver {:?} for {} tasks, {} vehicles",
            bin,
            request.tasks.len(),
            request.vehicle_count
        );

        let mut child = Command::new(&bin)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn solver {:?}", bin))?;

        {
            let mut stdin = child.stdin.take().context("solver stdin not piped")?;
            stdin
                .write_all(&input)
                .await
                .context("Failed to write solve request to solver stdin")?;
            stdin.shutdown().await.ok();
        }

        let deadline = Duration::from_secs(request.time_limit_seconds + KILL_GRACE_SECONDS);
        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "solver exceeded its time budget of {}s",
                    request.time_limit_seconds
                )
            })?
            .context("Failed to collect solver output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "solver exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let response: SolveResponse = serde_json::from_slice(&output.stdout)
            .context("Failed to parse solver response")?;

        if !response.warnings.is_empty() {
            warn!("Solver reported {} warnings", response.warnings.len());
        }

        Ok(SolverOutcome {
            enabled: true,
            routes: response.routes,
            total_distance_km: response.total_distance_km,
            total_duration_minutes: response.total_duration_minutes,
            warnings: response.warnings,
        })
    }
}
