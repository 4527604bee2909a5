//! Optimization orchestrator
//!
//! Composes the travel-matrix provider and the solver adapter into one
//! `optimize` call that always produces a usable assignment: when the
//! external solver is disabled or fails, a greedy nearest-neighbor walk
//! takes over. Failures on this path become warnings, never errors.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::matrix::{MatrixSource, TravelMatrix};
use crate::services::solver::{SolveRequest, SolveTask, SolverAdapter, DEPOT_ID};
use crate::types::{Coordinates, Task};

/// Full-day window in minutes-of-day
const FULL_DAY_WINDOW: [u32; 2] = [0, 1440];

/// Optimization options
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub vehicle_count: u32,
    pub vehicle_capacity: f64,
    pub average_speed_kmh: f64,
    /// Service minutes charged per task stop
    pub service_minutes: u32,
    pub time_limit_seconds: u64,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            vehicle_count: 1,
            vehicle_capacity: 25.0,
            average_speed_kmh: 35.0,
            service_minutes: 5,
            time_limit_seconds: 10,
        }
    }
}

/// One optimized vehicle route
#[derive(Debug, Clone)]
pub struct OptimizedRoute {
    /// Task ids in visit order
    pub task_ids: Vec<Uuid>,
    /// Rounded to 0.001 km, includes the return-to-depot leg
    pub distance_km: f64,
    /// Whole minutes, travel + service, floored at 0
    pub eta_minutes: i64,
    /// Sum of task weights, rounded to 2 decimals
    pub load: f64,
}

/// Result of one optimization run
#[derive(Debug, Clone, Default)]
pub struct OptimizeResult {
    pub routes: Vec<OptimizedRoute>,
    pub total_distance_km: f64,
    pub total_eta_minutes: i64,
    pub total_load: f64,
    pub warnings: Vec<String>,
}

/// Route optimizer over injected matrix and solver collaborators
pub struct Optimizer {
    matrix: Arc<dyn MatrixSource>,
    solver: SolverAdapter,
}

impl Optimizer {
    pub fn new(matrix: Arc<dyn MatrixSource>, solver: SolverAdapter) -> Self {
        Self { matrix, solver }
    }

    /// Assign tasks to vehicle routes. Never fails: degraded paths return a
    /// result with warnings.
    pub async fn optimize(&self, tasks: &[Task], options: &OptimizeOptions) -> OptimizeResult {
        let located: Vec<(&Task, Coordinates)> = tasks
            .iter()
            .filter_map(|task| {
                task.primary_point()
                    .filter(Coordinates::is_finite)
                    .map(|point| (task, point))
            })
            .collect();

        if located.is_empty() {
            return OptimizeResult {
                warnings: vec!["no tasks with valid coordinates to optimize".to_string()],
                ..Default::default()
            };
        }
        if located.len() < tasks.len() {
            debug!(
                "Skipping {} tasks without valid coordinates",
                tasks.len() - located.len()
            );
        }

        let depot = centroid(located.iter().map(|(_, p)| *p));
        let mut points = Vec::with_capacity(located.len() + 1);
        points.push(depot);
        points.extend(located.iter().map(|(_, p)| *p));

        let cancel = CancellationToken::new();
        let matrix = self
            .matrix
            .matrices(&points, options.average_speed_kmh, &cancel)
            .await;
        let mut warnings = matrix.warnings.clone();

        let request = build_solve_request(&located, &matrix, options);
        let sequences = match self.solver.solve(&request).await {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                if outcome.enabled && !outcome.routes.is_empty() {
                    info!("Solver assigned {} routes", outcome.routes.len());
                    resolve_sequences(&outcome.routes, &located)
                } else {
                    if outcome.enabled {
                        warnings.push("solver returned no routes, heuristic assignment was used".to_string());
                    }
                    greedy_routes(&matrix, located.len(), options.vehicle_count)
                }
            }
            Err(err) => {
                warn!("Solver failed, using heuristic fallback: {:#}", err);
                warnings.push(format!("solver failed: {err}"));
                greedy_routes(&matrix, located.len(), options.vehicle_count)
            }
        };

        let mut result = summarize(&sequences, &located, &matrix, options);
        warnings.extend(result.warnings.drain(..));
        result.warnings = dedup_warnings(warnings);
        result
    }
}

/// Centroid of the task points; the single point itself when there is one
fn centroid(points: impl Iterator<Item = Coordinates>) -> Coordinates {
    let mut lat = 0.0;
    let mut lng = 0.0;
    let mut count = 0usize;
    for point in points {
        lat += point.lat;
        lng += point.lng;
        count += 1;
    }
    Coordinates {
        lat: lat / count as f64,
        lng: lng / count as f64,
    }
}

fn build_solve_request(
    located: &[(&Task, Coordinates)],
    matrix: &TravelMatrix,
    options: &OptimizeOptions,
) -> SolveRequest {
    let tasks = located
        .iter()
        .map(|(task, _)| SolveTask {
            id: task.id.to_string(),
            // Capacity only constrains tasks that declare a weight
            demand: task.cargo_weight.unwrap_or(0.0),
            service_minutes: options.service_minutes,
            time_window: task
                .window_minutes_local()
                .map(|(from, to)| [from.max(0) as u32, to.max(0) as u32])
                .unwrap_or(FULL_DAY_WINDOW),
        })
        .collect();

    SolveRequest {
        tasks,
        distance_matrix: matrix.distances.clone(),
        time_matrix: matrix.times.clone(),
        vehicle_capacity: options.vehicle_capacity,
        vehicle_count: options.vehicle_count.max(1),
        depot_index: 0,
        time_limit_seconds: options.time_limit_seconds,
    }
}

/// Map solver task-id sequences back to matrix point indices (1-based over
/// the depot). Unknown ids and the depot sentinel are skipped.
fn resolve_sequences(routes: &[Vec<String>], located: &[(&Task, Coordinates)]) -> Vec<Vec<usize>> {
    let index_by_id: HashMap<String, usize> = located
        .iter()
        .enumerate()
        .map(|(i, (task, _))| (task.id.to_string(), i + 1))
        .collect();

    routes
        .iter()
        .map(|route| {
            route
                .iter()
                .filter(|id| id.as_str() != DEPOT_ID)
                .filter_map(|id| {
                    let found = index_by_id.get(id).copied();
                    if found.is_none() {
                        warn!("Solver returned unknown task id {}", id);
                    }
                    found
                })
                .collect()
        })
        .collect()
}

/// Greedy nearest-unvisited-neighbor assignment: one route per requested
/// vehicle, capacity-naive. Each vehicle starts at the depot and repeatedly
/// takes the closest remaining task (lowest index wins ties) up to an even
/// share of the task count. Deterministic for a fixed matrix.
fn greedy_routes(matrix: &TravelMatrix, task_count: usize, vehicle_count: u32) -> Vec<Vec<usize>> {
    if task_count == 0 {
        return vec![];
    }

    let vehicles = (vehicle_count.max(1) as usize).min(task_count);
    let quota = task_count.div_ceil(vehicles);
    let mut visited = vec![false; task_count + 1];
    let mut routes = Vec::with_capacity(vehicles);

    for _ in 0..vehicles {
        let mut route = Vec::new();
        let mut current = 0usize;

        while route.len() < quota {
            let mut best: Option<(usize, f64)> = None;
            for next in 1..=task_count {
                if visited[next] {
                    continue;
                }
                let dist = matrix.distance(current, next);
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((next, dist));
                }
            }

            match best {
                Some((next, _)) => {
                    visited[next] = true;
                    route.push(next);
                    current = next;
                }
                None => break,
            }
        }

        if !route.is_empty() {
            routes.push(route);
        }
    }

    routes
}

/// Walk each sequence accumulating distance, travel + service time and load,
/// then append the return-to-depot leg. Empty sequences are dropped.
fn summarize(
    sequences: &[Vec<usize>],
    located: &[(&Task, Coordinates)],
    matrix: &TravelMatrix,
    options: &OptimizeOptions,
) -> OptimizeResult {
    let mut routes = Vec::new();

    for sequence in sequences {
        if sequence.is_empty() {
            continue;
        }

        let mut task_ids = Vec::with_capacity(sequence.len());
        let mut distance_m = 0.0;
        let mut eta_minutes = 0.0;
        let mut load = 0.0;
        let mut prev = 0usize;

        for &idx in sequence {
            let (task, _) = located[idx - 1];
            let leg_m = matrix.distance(prev, idx);
            distance_m += leg_m;
            eta_minutes += travel_minutes(leg_m, options.average_speed_kmh);
            eta_minutes += options.service_minutes as f64;
            load += task.cargo_weight.unwrap_or(1.0);
            task_ids.push(task.id);
            prev = idx;
        }

        // Return leg back to the depot
        let return_m = matrix.distance(prev, 0);
        distance_m += return_m;
        eta_minutes += travel_minutes(return_m, options.average_speed_kmh);

        routes.push(OptimizedRoute {
            task_ids,
            distance_km: round3(distance_m / 1000.0),
            eta_minutes: (eta_minutes.round() as i64).max(0),
            load: round2(load),
        });
    }

    let total_distance_km = round3(routes.iter().map(|r| r.distance_km).sum());
    let total_eta_minutes = routes.iter().map(|r| r.eta_minutes).sum();
    let total_load = round2(routes.iter().map(|r| r.load).sum());

    OptimizeResult {
        routes,
        total_distance_km,
        total_eta_minutes,
        total_load,
        warnings: vec![],
    }
}

fn travel_minutes(meters: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    meters / 1000.0 / speed_kmh * 60.0
}

fn dedup_warnings(warnings: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    warnings
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matrix::GeometryMatrixSource;
    use crate::services::solver::SolverConfig;
    use crate::types::TaskStatus;
    use chrono::Utc;

    fn task(lat: f64, lng: f64, weight: Option<f64>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Delivery".to_string(),
            status: TaskStatus::New,
            start_address: None,
            finish_address: None,
            start_lat: Some(lat),
            start_lng: Some(lng),
            finish_lat: None,
            finish_lng: None,
            cargo_weight: weight,
            delivery_from: None,
            delivery_to: None,
            route_distance_km: None,
            route_plan_id: None,
            status_changed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn disabled_optimizer() -> Optimizer {
        Optimizer::new(
            Arc::new(GeometryMatrixSource),
            SolverAdapter::new(SolverConfig::default()),
        )
    }

    fn failing_optimizer() -> Optimizer {
        // Enabled solver pointing at a missing binary: every solve throws
        Optimizer::new(
            Arc::new(GeometryMatrixSource),
            SolverAdapter::new(SolverConfig {
                enabled: true,
                bin: Some("/nonexistent/vrp-solver".into()),
                args: vec![],
                time_limit_seconds: 1,
            }),
        )
    }

    #[tokio::test]
    async fn test_empty_input_returns_warning() {
        let optimizer = disabled_optimizer();

        let result = optimizer.optimize(&[], &OptimizeOptions::default()).await;

        assert!(result.routes.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("no tasks")));
    }

    #[tokio::test]
    async fn test_tasks_without_coordinates_are_filtered() {
        let optimizer = disabled_optimizer();
        let mut bad = task(0.0, 0.0, None);
        bad.start_lat = None;
        bad.start_lng = None;

        let result = optimizer
            .optimize(&[bad], &OptimizeOptions::default())
            .await;

        assert!(result.routes.is_empty());
        assert!(!result.warnings.is_empty());
    }

    // Two nearby tasks, one vehicle, solver disabled: the documented
    // fallback scenario.
    #[tokio::test]
    async fn test_disabled_solver_greedy_assignment() {
        let optimizer = disabled_optimizer();
        let tasks = vec![
            task(50.45, 30.52, None),
            task(50.46, 30.53, None),
        ];

        let options = OptimizeOptions {
            vehicle_count: 1,
            vehicle_capacity: 25.0,
            ..Default::default()
        };
        let result = optimizer.optimize(&tasks, &options).await;

        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].task_ids.len(), 2);
        // Default weight is 1 unit per task
        assert!((result.routes[0].load - 2.0).abs() < 1e-9);
        assert!(result.routes[0].distance_km > 0.0);
        assert!(result.total_distance_km > 0.0);
        assert!(!result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failing_solver_never_errors() {
        let optimizer = failing_optimizer();
        let tasks = vec![
            task(50.45, 30.52, Some(3.0)),
            task(50.47, 30.54, Some(2.0)),
            task(50.43, 30.50, None),
        ];

        let result = optimizer
            .optimize(&tasks, &OptimizeOptions::default())
            .await;

        assert!(!result.routes.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("solver failed")));

        let assigned: usize = result.routes.iter().map(|r| r.task_ids.len()).sum();
        assert_eq!(assigned, 3);
        // 3 + 2 + default 1
        assert!((result.total_load - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_multiple_vehicles_split_tasks() {
        let optimizer = disabled_optimizer();
        let tasks = vec![
            task(50.45, 30.52, None),
            task(50.46, 30.53, None),
            task(50.47, 30.54, None),
            task(50.48, 30.55, None),
        ];

        let options = OptimizeOptions {
            vehicle_count: 2,
            ..Default::default()
        };
        let result = optimizer.optimize(&tasks, &options).await;

        assert_eq!(result.routes.len(), 2);
        let assigned: usize = result.routes.iter().map(|r| r.task_ids.len()).sum();
        assert_eq!(assigned, 4);
    }

    #[tokio::test]
    async fn test_more_vehicles_than_tasks_drops_empty_routes() {
        let optimizer = disabled_optimizer();
        let tasks = vec![task(50.45, 30.52, None)];

        let options = OptimizeOptions {
            vehicle_count: 3,
            ..Default::default()
        };
        let result = optimizer.optimize(&tasks, &options).await;

        // No empty routes are emitted
        assert_eq!(result.routes.len(), 1);
        assert!(result.routes.iter().all(|r| !r.task_ids.is_empty()));
    }

    #[tokio::test]
    async fn test_warnings_are_deduplicated() {
        let optimizer = disabled_optimizer();
        let tasks = vec![task(50.45, 30.52, None), task(50.46, 30.53, None)];

        let result = optimizer
            .optimize(&tasks, &OptimizeOptions::default())
            .await;

        let mut sorted = result.warnings.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), result.warnings.len());
    }

    #[test]
    fn test_centroid_of_single_point() {
        let point = Coordinates { lat: 50.45, lng: 30.52 };
        let depot = centroid([point].into_iter());
        assert!((depot.lat - 50.45).abs() < 1e-9);
        assert!((depot.lng - 30.52).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_averages() {
        let depot = centroid(
            [
                Coordinates { lat: 50.0, lng: 30.0 },
                Coordinates { lat: 51.0, lng: 31.0 },
            ]
            .into_iter(),
        );
        assert!((depot.lat - 50.5).abs() < 1e-9);
        assert!((depot.lng - 30.5).abs() < 1e-9);
    }

    #[test]
    fn test_greedy_routes_nearest_first() {
        // Depot + 2 tasks where task 2 is closer to the depot
        let matrix = TravelMatrix {
            provider: crate::services::matrix::MatrixProviderKind::Geometry,
            distances: vec![
                vec![0.0, 20000.0, 10000.0],
                vec![20000.0, 0.0, 15000.0],
                vec![10000.0, 15000.0, 0.0],
            ],
            times: vec![vec![0.0; 3]; 3],
            warnings: vec![],
        };

        let routes = greedy_routes(&matrix, 2, 1);
        assert_eq!(routes, vec![vec![2, 1]]);
    }

    #[test]
    fn test_greedy_routes_respects_vehicle_count() {
        let matrix = crate::services::matrix::geometry_matrix(
            &[
                Coordinates { lat: 50.0, lng: 30.0 },
                Coordinates { lat: 50.1, lng: 30.1 },
                Coordinates { lat: 50.2, lng: 30.2 },
                Coordinates { lat: 50.3, lng: 30.3 },
            ],
            35.0,
        );

        let routes = greedy_routes(&matrix, 3, 2);
        assert_eq!(routes.len(), 2);
        let total: usize = routes.iter().map(|r| r.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(2.349), 2.35);
        assert_eq!(round3(1.23456), 1.235);
    }
}
