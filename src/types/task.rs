//! Task types

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinates;

/// Project timezone offset for minutes-of-day conversions (UTC+3).
/// Delivery windows are stored in UTC but planned against the local day.
const LOCAL_OFFSET_HOURS: i32 = 3;

/// Delivery/pickup task (owned by the CRUD layer, read by the planning core)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub start_address: Option<String>,
    pub finish_address: Option<String>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub finish_lat: Option<f64>,
    pub finish_lng: Option<f64>,
    /// Cargo weight in units; planning defaults to 1.0 when absent
    pub cargo_weight: Option<f64>,
    pub delivery_from: Option<DateTime<Utc>>,
    pub delivery_to: Option<DateTime<Utc>>,
    /// Precomputed road distance for this task's start→finish leg
    pub route_distance_km: Option<f64>,
    /// Back-reference to the plan this task is scheduled in
    pub route_plan_id: Option<Uuid>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl Task {
    pub fn start_point(&self) -> Option<Coordinates> {
        match (self.start_lat, self.start_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    pub fn finish_point(&self) -> Option<Coordinates> {
        match (self.finish_lat, self.finish_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }

    /// Location used for route optimization: the pickup point, or the
    /// dropoff point for tasks without a pickup leg.
    pub fn primary_point(&self) -> Option<Coordinates> {
        self.start_point().or_else(|| self.finish_point())
    }

    /// Delivery window as minutes-of-day in the project timezone.
    /// None unless both bounds are set.
    pub fn window_minutes_local(&self) -> Option<(i64, i64)> {
        match (self.delivery_from, self.delivery_to) {
            (Some(from), Some(to)) => {
                Some((minutes_of_local_day(from), minutes_of_local_day(to)))
            }
            _ => None,
        }
    }
}

fn minutes_of_local_day(at: DateTime<Utc>) -> i64 {
    let offset = FixedOffset::east_opt(LOCAL_OFFSET_HOURS * 3600)
        .expect("valid static offset");
    let local = at.with_timezone(&offset);
    (local.hour() * 60 + local.minute()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task_at(lat: Option<f64>, lng: Option<f64>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Test task".to_string(),
            status: TaskStatus::New,
            start_address: None,
            finish_address: None,
            start_lat: lat,
            start_lng: lng,
            finish_lat: None,
            finish_lng: None,
            cargo_weight: None,
            delivery_from: None,
            delivery_to: None,
            route_distance_km: None,
            route_plan_id: None,
            status_changed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_start_point_requires_both_components() {
        assert!(task_at(Some(50.45), Some(30.52)).start_point().is_some());
        assert!(task_at(Some(50.45), None).start_point().is_none());
        assert!(task_at(None, None).start_point().is_none());
    }

    #[test]
    fn test_primary_point_falls_back_to_finish() {
        let mut task = task_at(None, None);
        task.finish_lat = Some(50.46);
        task.finish_lng = Some(30.53);

        let point = task.primary_point().unwrap();
        assert!((point.lat - 50.46).abs() < 1e-9);
    }

    #[test]
    fn test_window_minutes_converts_to_local_day() {
        let mut task = task_at(None, None);
        // 07:30 UTC = 10:30 local (UTC+3) = 630 minutes
        task.delivery_from = Some(Utc.with_ymd_and_hms(2026, 3, 10, 7, 30, 0).unwrap());
        task.delivery_to = Some(Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap());

        let (from, to) = task.window_minutes_local().unwrap();
        assert_eq!(from, 630);
        assert_eq!(to, 720);
    }

    #[test]
    fn test_window_minutes_none_when_partial() {
        let mut task = task_at(None, None);
        task.delivery_from = Some(Utc.with_ymd_and_hms(2026, 3, 10, 7, 30, 0).unwrap());
        assert!(task.window_minutes_local().is_none());
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::New.as_str(), "new");
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }
}
