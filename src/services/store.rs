//! Persistence seams for the planning core
//!
//! The lifecycle talks to the task and plan repositories through these
//! traits; tests substitute in-memory fakes, production wires the Postgres
//! implementations below.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::types::{PlanStatus, RoutePlan, Task, TaskStatus};

/// Task repository: read by id set, bulk status moves, plan unlinking
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Task>>;

    /// Move every listed task to the given status, stamping the change time.
    /// Returns the number of updated rows.
    async fn set_status_bulk(
        &self,
        ids: &[Uuid],
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Link every listed task to the given plan
    async fn set_plan_refs(&self, ids: &[Uuid], plan_id: Uuid) -> Result<u64>;

    /// Clear the plan back-reference on every task pointing at it
    async fn clear_plan_refs(&self, plan_id: Uuid) -> Result<u64>;
}

/// Plan repository: full-document reads and writes
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn insert(&self, plan: &RoutePlan) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<RoutePlan>>;

    /// Full replace of the plan's mutable state (routes, metrics, tasks,
    /// status, audit stamps)
    async fn update(&self, plan: &RoutePlan) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<u64>;

    async fn list(
        &self,
        status: Option<PlanStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RoutePlan>>;
}

/// Postgres task repository
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn by_ids(&self, ids: &[Uuid]) -> Result<Vec<Task>> {
        queries::task::get_by_ids(&self.pool, ids).await
    }

    async fn set_status_bulk(
        &self,
        ids: &[Uuid],
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        queries::task::set_status_bulk(&self.pool, ids, status, at).await
    }

    async fn set_plan_refs(&self, ids: &[Uuid], plan_id: Uuid) -> Result<u64> {
        queries::task::set_plan_refs(&self.pool, ids, plan_id).await
    }

    async fn clear_plan_refs(&self, plan_id: Uuid) -> Result<u64> {
        queries::task::clear_plan_refs(&self.pool, plan_id).await
    }
}

/// Postgres plan repository
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn insert(&self, plan: &RoutePlan) -> Result<()> {
        queries::plan::insert(&self.pool, plan).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<RoutePlan>> {
        queries::plan::find(&self.pool, id).await
    }

    async fn update(&self, plan: &RoutePlan) -> Result<()> {
        queries::plan::update(&self.pool, plan).await
    }

    async fn delete(&self, id: Uuid) -> Result<u64> {
        queries::plan::delete(&self.pool, id).await
    }

    async fn list(
        &self,
        status: Option<PlanStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RoutePlan>> {
        queries::plan::list(&self.pool, status, limit, offset).await
    }
}
