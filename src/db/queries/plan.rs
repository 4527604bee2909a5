//! Route plan database queries
//!
//! Routes and metrics are stored as JSONB documents; the task id union is a
//! plain uuid array so the back-reference side stays queryable with SQL.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{PlanMetrics, PlanStatus, Route, RoutePlan};

#[derive(sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    title: String,
    status: PlanStatus,
    routes: Json<Vec<Route>>,
    metrics: Json<PlanMetrics>,
    tasks: Vec<Uuid>,
    approved_by: Option<Uuid>,
    approved_at: Option<DateTime<Utc>>,
    completed_by: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for RoutePlan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            status: row.status,
            routes: row.routes.0,
            metrics: row.metrics.0,
            tasks: row.tasks,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            completed_by: row.completed_by,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert a new plan
pub async fn insert(pool: &PgPool, plan: &RoutePlan) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_plans (
            id, title, status, routes, metrics, tasks,
            approved_by, approved_at, completed_by, completed_at,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(plan.id)
    .bind(&plan.title)
    .bind(plan.status)
    .bind(Json(&plan.routes))
    .bind(Json(&plan.metrics))
    .bind(&plan.tasks)
    .bind(plan.approved_by)
    .bind(plan.approved_at)
    .bind(plan.completed_by)
    .bind(plan.completed_at)
    .bind(plan.created_at)
    .bind(plan.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a plan by id
pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<RoutePlan>> {
    let row = sqlx::query_as::<_, PlanRow>(
        r#"
        SELECT * FROM route_plans
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(RoutePlan::from))
}

/// Full replace of the plan's mutable state
pub async fn update(pool: &PgPool, plan: &RoutePlan) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE route_plans
        SET title = $2, status = $3, routes = $4, metrics = $5, tasks = $6,
            approved_by = $7, approved_at = $8,
            completed_by = $9, completed_at = $10,
            updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(plan.id)
    .bind(&plan.title)
    .bind(plan.status)
    .bind(Json(&plan.routes))
    .bind(Json(&plan.metrics))
    .bind(&plan.tasks)
    .bind(plan.approved_by)
    .bind(plan.approved_at)
    .bind(plan.completed_by)
    .bind(plan.completed_at)
    .bind(plan.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a plan; returns the number of deleted rows
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM route_plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// List plans, newest first, optionally filtered by status
pub async fn list(
    pool: &PgPool,
    status: Option<PlanStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<RoutePlan>> {
    let rows = sqlx::query_as::<_, PlanRow>(
        r#"
        SELECT * FROM route_plans
        WHERE ($1::plan_status IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RoutePlan::from).collect())
}
