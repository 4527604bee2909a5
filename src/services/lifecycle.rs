//! Route plan lifecycle
//!
//! Finite-state machine over a persisted plan: draft → approved →
//! completed, with rollback from approved to draft. Transitions mutate the
//! underlying task records, notify the configured channel and publish
//! change events. Route edits rebuild the whole plan document through the
//! simulator; nothing is patched in place.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::events::{EventBus, PlanEvent, PlanUpdateReason, TaskChangeAction};
use crate::services::notify::{format_approval_message, NotificationSink};
use crate::services::simulator;
use crate::services::store::{PlanStore, TaskStore};
use crate::types::{PlanStatus, RouteAssignment, RoutePlan, Task, TaskStatus};

/// Lifecycle operation failure
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("route plan {0} not found")]
    PlanNotFound(Uuid),

    #[error("invalid status transition: {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition { from: PlanStatus, to: PlanStatus },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Plan lifecycle service over injected collaborators
pub struct PlanLifecycle {
    plans: Arc<dyn PlanStore>,
    tasks: Arc<dyn TaskStore>,
    notifier: Option<Arc<dyn NotificationSink>>,
    events: EventBus,
}

impl PlanLifecycle {
    pub fn new(
        plans: Arc<dyn PlanStore>,
        tasks: Arc<dyn TaskStore>,
        notifier: Option<Arc<dyn NotificationSink>>,
        events: EventBus,
    ) -> Self {
        Self {
            plans,
            tasks,
            notifier,
            events,
        }
    }

    /// Create a draft plan from route assignments (optimizer output or
    /// manual editing)
    pub async fn create_plan(
        &self,
        title: impl Into<String>,
        assignments: &[RouteAssignment],
    ) -> Result<RoutePlan, LifecycleError> {
        let mut plan = RoutePlan::new_draft(title);
        self.rebuild(&mut plan, assignments).await?;
        self.plans.insert(&plan).await?;
        self.tasks.set_plan_refs(&plan.tasks, plan.id).await?;

        info!(
            "Created plan {} with {} routes, {} tasks",
            plan.id,
            plan.routes.len(),
            plan.tasks.len()
        );
        self.events.publish(PlanEvent::PlanUpdated {
            plan_id: plan.id,
            reason: PlanUpdateReason::Created,
        });

        Ok(plan)
    }

    /// Replace a plan's routes with a new assignment; the whole document is
    /// rebuilt and written back
    pub async fn update_routes(
        &self,
        plan_id: Uuid,
        assignments: &[RouteAssignment],
    ) -> Result<RoutePlan, LifecycleError> {
        let mut plan = self.load(plan_id).await?;

        // Old links are dropped first so tasks removed from the plan do not
        // keep pointing at it
        self.tasks.clear_plan_refs(plan.id).await?;
        self.rebuild(&mut plan, assignments).await?;
        self.plans.update(&plan).await?;
        self.tasks.set_plan_refs(&plan.tasks, plan.id).await?;

        self.events.publish(PlanEvent::PlanUpdated {
            plan_id: plan.id,
            reason: PlanUpdateReason::Updated,
        });

        Ok(plan)
    }

    /// Transition a plan to the target status.
    /// Requesting the current status is a no-op success.
    pub async fn set_status(
        &self,
        plan_id: Uuid,
        target: PlanStatus,
        actor: Uuid,
    ) -> Result<RoutePlan, LifecycleError> {
        let mut plan = self.load(plan_id).await?;

        if plan.status == target {
            return Ok(plan);
        }

        if !transition_allowed(plan.status, target) {
            return Err(LifecycleError::InvalidTransition {
                from: plan.status,
                to: target,
            });
        }

        let now = Utc::now();
        let mut tasks_changed = false;

        match target {
            PlanStatus::Approved => {
                plan.approved_at = Some(now);
                plan.approved_by = Some(actor);
                if !plan.tasks.is_empty() {
                    self.tasks
                        .set_status_bulk(&plan.tasks, TaskStatus::InProgress, now)
                        .await?;
                    tasks_changed = true;
                }
            }
            PlanStatus::Completed => {
                plan.completed_at = Some(now);
                plan.completed_by = Some(actor);
                if plan.approved_at.is_none() {
                    plan.approved_at = Some(now);
                    plan.approved_by = Some(actor);
                }
                if !plan.tasks.is_empty() {
                    self.tasks
                        .set_status_bulk(&plan.tasks, TaskStatus::Done, now)
                        .await?;
                    tasks_changed = true;
                }
            }
            PlanStatus::Draft => {
                plan.approved_at = None;
                plan.approved_by = None;
                plan.completed_at = None;
                plan.completed_by = None;
            }
        }

        plan.status = target;
        plan.updated_at = now;
        self.plans.update(&plan).await?;

        info!("Plan {} moved to {}", plan.id, target.as_str());

        if target == PlanStatus::Approved {
            self.notify_approval(&plan).await;
        }

        self.events.publish(PlanEvent::PlanUpdated {
            plan_id: plan.id,
            reason: PlanUpdateReason::StatusChanged,
        });
        if tasks_changed {
            self.events.publish(PlanEvent::TasksChanged {
                action: TaskChangeAction::StatusChanged,
                task_ids: plan.tasks.clone(),
            });
        }

        Ok(plan)
    }

    /// Delete a plan, clearing the back-reference on every task that
    /// pointed at it. Tasks themselves are not deleted.
    pub async fn delete_plan(&self, plan_id: Uuid) -> Result<(), LifecycleError> {
        let plan = self.load(plan_id).await?;

        self.tasks.clear_plan_refs(plan.id).await?;
        self.plans.delete(plan.id).await?;

        info!("Deleted plan {}", plan.id);
        self.events.publish(PlanEvent::PlanRemoved { plan_id: plan.id });
        if !plan.tasks.is_empty() {
            self.events.publish(PlanEvent::TasksChanged {
                action: TaskChangeAction::PlanUnlinked,
                task_ids: plan.tasks,
            });
        }

        Ok(())
    }

    async fn load(&self, plan_id: Uuid) -> Result<RoutePlan, LifecycleError> {
        self.plans
            .find(plan_id)
            .await?
            .ok_or(LifecycleError::PlanNotFound(plan_id))
    }

    /// Re-read the referenced tasks and rebuild routes, metrics and the
    /// task set as one unit
    async fn rebuild(
        &self,
        plan: &mut RoutePlan,
        assignments: &[RouteAssignment],
    ) -> Result<(), LifecycleError> {
        let mut wanted: Vec<Uuid> = assignments
            .iter()
            .flat_map(|a| a.task_ids.iter().copied())
            .collect();
        wanted.sort();
        wanted.dedup();

        let tasks: HashMap<Uuid, Task> = self
            .tasks
            .by_ids(&wanted)
            .await?
            .into_iter()
            .map(|task| (task.id, task))
            .collect();

        let build = simulator::build_routes(assignments, &tasks);
        plan.routes = build.routes;
        plan.metrics = build.metrics;
        plan.tasks = build.task_ids;
        plan.updated_at = Utc::now();

        Ok(())
    }

    /// Best-effort approval notification; failures are logged and swallowed
    async fn notify_approval(&self, plan: &RoutePlan) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let message = format_approval_message(plan);
        if let Err(err) = notifier.send_text(&message).await {
            warn!("Failed to send approval notification for plan {}: {:#}", plan.id, err);
        }
    }
}

fn transition_allowed(from: PlanStatus, to: PlanStatus) -> bool {
    matches!(
        (from, to),
        (PlanStatus::Draft, PlanStatus::Approved)
            | (PlanStatus::Approved, PlanStatus::Draft)
            | (PlanStatus::Approved, PlanStatus::Completed)
    )
}
