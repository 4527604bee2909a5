//! Task database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{Task, TaskStatus};

/// Fetch tasks by id set; missing ids are silently absent from the result
pub async fn get_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Task>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let tasks = sqlx::query_as::<_, Task>(
        r#"
        SELECT * FROM tasks
        WHERE id = ANY($1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(tasks)
}

/// Move every listed task to the given status, stamping the change time
pub async fn set_status_bulk(
    pool: &PgPool,
    ids: &[Uuid],
    status: TaskStatus,
    at: DateTime<Utc>,
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET status = $2, status_changed_at = $3, updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(status)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Link every listed task to the given plan
pub async fn set_plan_refs(pool: &PgPool, ids: &[Uuid], plan_id: Uuid) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET route_plan_id = $2, updated_at = NOW()
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Clear the plan back-reference on every task pointing at it
pub async fn clear_plan_refs(pool: &PgPool, plan_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET route_plan_id = NULL, updated_at = NOW()
        WHERE route_plan_id = $1
        "#,
    )
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
