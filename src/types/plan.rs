//! Route plan types
//!
//! A plan is persisted as one document: routes and metrics are rebuilt as a
//! whole on every edit, never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Route plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "plan_status", rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Approved,
    Completed,
}

impl PlanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Approved => "approved",
            PlanStatus::Completed => "completed",
        }
    }
}

/// Stop kind: pickup at the task's start point or dropoff at its finish point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Start,
    Finish,
}

/// A simulated stop on a route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    /// Dense 0-based position within the route
    pub order: i32,
    pub kind: StopKind,
    pub task_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    /// Minutes elapsed from route start
    pub eta_minutes: i64,
    /// Minutes past the relevant window bound; None when on time or unwindowed
    pub delay_minutes: Option<i64>,
    /// Vehicle load after serving this stop
    pub load: f64,
    /// Declared window bounds (minutes-of-day), echoed for display
    pub window_from_minutes: Option<i64>,
    pub window_to_minutes: Option<i64>,
}

/// Denormalized task summary carried on the route next to its stops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTaskEntry {
    pub task_id: Uuid,
    pub title: String,
    /// Dense 0-based position within the route
    pub order: i32,
}

/// Per-route metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetrics {
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<i64>,
    /// Peak vehicle payload along the route
    pub load: Option<f64>,
    pub total_tasks: i64,
    pub total_stops: i64,
}

/// A single vehicle route within a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Dense 0-based position within the plan
    pub order: i32,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_name: Option<String>,
    pub driver_id: Option<Uuid>,
    pub driver_name: Option<String>,
    pub tasks: Vec<RouteTaskEntry>,
    pub stops: Vec<Stop>,
    pub metrics: RouteMetrics,
    /// Multi-point map link over the ordered stop coordinates
    pub map_url: Option<String>,
}

/// Plan-level metrics, derived from route metrics on every rebuild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetrics {
    pub total_distance_km: Option<f64>,
    pub total_eta_minutes: Option<i64>,
    pub total_load: Option<f64>,
    pub total_routes: i64,
    pub total_tasks: i64,
    pub total_stops: i64,
}

/// Persisted route plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub id: Uuid,
    pub title: String,
    pub status: PlanStatus,
    pub routes: Vec<Route>,
    pub metrics: PlanMetrics,
    /// De-duplicated union of task ids across all routes
    pub tasks: Vec<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutePlan {
    /// New draft plan with empty routes
    pub fn new_draft(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: PlanStatus::Draft,
            routes: vec![],
            metrics: PlanMetrics::default(),
            tasks: vec![],
            approved_by: None,
            approved_at: None,
            completed_by: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Route assignment supplied by the optimizer or by manual editing.
/// The simulator turns a list of these into the plan's routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAssignment {
    /// Ordered task ids for this vehicle
    pub task_ids: Vec<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_name: Option<String>,
    pub driver_id: Option<Uuid>,
    pub driver_name: Option<String>,
    /// Manually entered distance; takes precedence over the computed value
    pub distance_km: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_status_as_str() {
        assert_eq!(PlanStatus::Draft.as_str(), "draft");
        assert_eq!(PlanStatus::Approved.as_str(), "approved");
        assert_eq!(PlanStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_new_draft_plan_is_empty() {
        let plan = RoutePlan::new_draft("Morning deliveries");
        assert_eq!(plan.status, PlanStatus::Draft);
        assert!(plan.routes.is_empty());
        assert!(plan.tasks.is_empty());
        assert!(plan.approved_at.is_none());
        assert_eq!(plan.metrics.total_routes, 0);
    }

    #[test]
    fn test_stop_serializes_camel_case() {
        let stop = Stop {
            order: 0,
            kind: StopKind::Start,
            task_id: Uuid::nil(),
            lat: 50.45,
            lng: 30.52,
            address: Some("Khreshchatyk 1".to_string()),
            eta_minutes: 12,
            delay_minutes: None,
            load: 1.0,
            window_from_minutes: Some(540),
            window_to_minutes: Some(660),
        };

        let json = serde_json::to_string(&stop).unwrap();
        assert!(json.contains("\"etaMinutes\":12"));
        assert!(json.contains("\"kind\":\"start\""));
        assert!(json.contains("\"windowFromMinutes\":540"));
    }

    #[test]
    fn test_plan_document_roundtrip() {
        let mut plan = RoutePlan::new_draft("Roundtrip");
        plan.routes.push(Route {
            order: 0,
            vehicle_id: None,
            vehicle_name: Some("Sprinter 17".to_string()),
            driver_id: None,
            driver_name: None,
            tasks: vec![],
            stops: vec![],
            metrics: RouteMetrics::default(),
            map_url: None,
        });

        let json = serde_json::to_value(&plan).unwrap();
        let back: RoutePlan = serde_json::from_value(json).unwrap();
        assert_eq!(back.routes.len(), 1);
        assert_eq!(back.routes[0].vehicle_name.as_deref(), Some("Sprinter 17"));
    }
}
