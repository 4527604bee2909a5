//! Route simulator
//!
//! Turns an explicit route→task assignment into fully materialized routes:
//! each task expands into a start stop and, when it has finish coordinates,
//! a finish stop; the stop sequence is then walked in order accumulating
//! elapsed time and vehicle load. Rebuilding from the same assignment and
//! task snapshot always yields the same result.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::services::geo::{haversine_km, multi_point_map_url};
use crate::types::{
    Coordinates, PlanMetrics, Route, RouteAssignment, RouteMetrics, RouteTaskEntry, Stop,
    StopKind, Task,
};

/// Default travel speed between stops
pub const DEFAULT_SPEED_KMH: f64 = 35.0;

/// Service time at a pickup stop
const PICKUP_SERVICE_MINUTES: f64 = 5.0;

/// Service time at a dropoff stop
const DROPOFF_SERVICE_MINUTES: f64 = 6.0;

/// Cargo weight assumed for tasks that do not declare one
const DEFAULT_CARGO_WEIGHT: f64 = 1.0;

/// Result of building routes from assignments
#[derive(Debug, Clone)]
pub struct RoutesBuild {
    pub routes: Vec<Route>,
    pub metrics: PlanMetrics,
    /// De-duplicated union of task ids across all routes, in first-seen order
    pub task_ids: Vec<Uuid>,
}

/// A stop before simulation: geometry and window resolved, timing not yet
struct PendingStop {
    kind: StopKind,
    task_id: Uuid,
    point: Coordinates,
    address: Option<String>,
    weight: f64,
    window: Option<(i64, i64)>,
}

/// Accumulator state carried across the stop sequence
struct SimState {
    eta_minutes: f64,
    load: f64,
    peak_load: f64,
    last_point: Option<Coordinates>,
    last_service_minutes: f64,
}

impl SimState {
    fn new() -> Self {
        Self {
            eta_minutes: 0.0,
            load: 0.0,
            peak_load: 0.0,
            last_point: None,
            last_service_minutes: 0.0,
        }
    }
}

/// Build routes and plan metrics from route assignments.
/// Unresolvable task ids are skipped, never fatal.
pub fn build_routes(
    assignments: &[RouteAssignment],
    tasks: &HashMap<Uuid, Task>,
) -> RoutesBuild {
    let mut routes = Vec::with_capacity(assignments.len());
    let mut seen_tasks = HashSet::new();
    let mut task_ids = Vec::new();

    for (route_order, assignment) in assignments.iter().enumerate() {
        let resolved: Vec<&Task> = assignment
            .task_ids
            .iter()
            .filter_map(|id| {
                let task = tasks.get(id);
                if task.is_none() {
                    debug!("Skipping unresolvable task {} in route {}", id, route_order);
                }
                task
            })
            .collect();

        let route = build_route(route_order as i32, assignment, &resolved);

        for task in &resolved {
            if seen_tasks.insert(task.id) {
                task_ids.push(task.id);
            }
        }
        routes.push(route);
    }

    let metrics = aggregate_plan_metrics(&routes, task_ids.len() as i64);

    RoutesBuild {
        routes,
        metrics,
        task_ids,
    }
}

fn build_route(order: i32, assignment: &RouteAssignment, resolved: &[&Task]) -> Route {
    let pending = expand_stops(resolved);
    let (stops, state) = simulate(&pending);

    let eta_minutes = if stops.is_empty() {
        None
    } else {
        Some(((state.eta_minutes - state.last_service_minutes).round() as i64).max(0))
    };
    let load = if stops.is_empty() {
        None
    } else {
        Some(round2(state.peak_load))
    };

    // A manually entered distance wins over the task-derived sum
    let distance_km = assignment
        .distance_km
        .or_else(|| task_distance_sum(resolved));

    let map_url = multi_point_map_url(
        &stops
            .iter()
            .map(|s| Coordinates { lat: s.lat, lng: s.lng })
            .collect::<Vec<_>>(),
    );

    let tasks = resolved
        .iter()
        .enumerate()
        .map(|(i, task)| RouteTaskEntry {
            task_id: task.id,
            title: task.title.clone(),
            order: i as i32,
        })
        .collect::<Vec<_>>();

    let metrics = RouteMetrics {
        distance_km,
        eta_minutes,
        load,
        total_tasks: tasks.len() as i64,
        total_stops: stops.len() as i64,
    };

    Route {
        order,
        vehicle_id: assignment.vehicle_id,
        vehicle_name: assignment.vehicle_name.clone(),
        driver_id: assignment.driver_id,
        driver_name: assignment.driver_name.clone(),
        tasks,
        stops,
        metrics,
        map_url,
    }
}

/// Expand tasks into start/finish stop pairs. A task contributes a start
/// stop when it has start coordinates and a finish stop when it has finish
/// coordinates.
fn expand_stops(resolved: &[&Task]) -> Vec<PendingStop> {
    let mut pending = Vec::new();

    for task in resolved {
        let weight = task.cargo_weight.unwrap_or(DEFAULT_CARGO_WEIGHT);
        let window = task.window_minutes_local();

        if let Some(point) = task.start_point() {
            pending.push(PendingStop {
                kind: StopKind::Start,
                task_id: task.id,
                point,
                address: task.start_address.clone(),
                weight,
                window,
            });
        }
        if let Some(point) = task.finish_point() {
            pending.push(PendingStop {
                kind: StopKind::Finish,
                task_id: task.id,
                point,
                address: task.finish_address.clone(),
                weight,
                window,
            });
        }
    }

    pending
}

/// Sequential fold over the stop sequence: each stop's ETA and load depend
/// on the previous one.
fn simulate(pending: &[PendingStop]) -> (Vec<Stop>, SimState) {
    let mut state = SimState::new();
    let mut stops = Vec::with_capacity(pending.len());

    for (order, stop) in pending.iter().enumerate() {
        if let Some(prev) = state.last_point {
            let km = haversine_km(&prev, &stop.point);
            state.eta_minutes += km / DEFAULT_SPEED_KMH * 60.0;
        }

        let eta_minutes = state.eta_minutes.round() as i64;
        let delay_minutes = delay_for(stop.kind, eta_minutes, stop.window);

        match stop.kind {
            StopKind::Start => state.load += stop.weight,
            StopKind::Finish => state.load = (state.load - stop.weight).max(0.0),
        }
        state.peak_load = state.peak_load.max(state.load);

        stops.push(Stop {
            order: order as i32,
            kind: stop.kind,
            task_id: stop.task_id,
            lat: stop.point.lat,
            lng: stop.point.lng,
            address: stop.address.clone(),
            eta_minutes,
            delay_minutes,
            load: round2(state.load),
            window_from_minutes: stop.window.map(|(from, _)| from),
            window_to_minutes: stop.window.map(|(_, to)| to),
        });

        let service = match stop.kind {
            StopKind::Start => PICKUP_SERVICE_MINUTES,
            StopKind::Finish => DROPOFF_SERVICE_MINUTES,
        };
        state.eta_minutes += service;
        state.last_service_minutes = service;
        state.last_point = Some(stop.point);
    }

    (stops, state)
}

/// Positive schedule slip against the relevant window bound: the window
/// start for pickups, the window end for dropoffs. None when on time or
/// when the task has no window.
fn delay_for(kind: StopKind, eta_minutes: i64, window: Option<(i64, i64)>) -> Option<i64> {
    let (from, to) = window?;
    let bound = match kind {
        StopKind::Start => from,
        StopKind::Finish => to,
    };
    (eta_minutes > bound).then(|| eta_minutes - bound)
}

/// Sum of the tasks' precomputed route distances; None when no task has one
fn task_distance_sum(resolved: &[&Task]) -> Option<f64> {
    let values: Vec<f64> = resolved
        .iter()
        .filter_map(|task| task.route_distance_km)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(round2(values.iter().sum()))
    }
}

/// Plan metrics derived from route metrics: distance summed when any route
/// carries one, ETA and load summed across routes with a value.
fn aggregate_plan_metrics(routes: &[Route], total_tasks: i64) -> PlanMetrics {
    let distances: Vec<f64> = routes
        .iter()
        .filter_map(|r| r.metrics.distance_km)
        .collect();
    let etas: Vec<i64> = routes.iter().filter_map(|r| r.metrics.eta_minutes).collect();
    let loads: Vec<f64> = routes.iter().filter_map(|r| r.metrics.load).collect();

    PlanMetrics {
        total_distance_km: (!distances.is_empty()).then(|| round2(distances.iter().sum())),
        total_eta_minutes: (!etas.is_empty()).then(|| etas.iter().sum()),
        total_load: (!loads.is_empty()).then(|| round2(loads.iter().sum())),
        total_routes: routes.len() as i64,
        total_tasks,
        total_stops: routes.iter().map(|r| r.stops.len() as i64).sum(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
