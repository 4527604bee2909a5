//! In-process plan event channel
//!
//! Downstream listeners (live UI refresh, audit log) subscribe to a
//! broadcast channel. Delivery is at-most-once with no replay: publishing
//! never blocks and never fails, even with no subscribers.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Why a plan-updated event was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanUpdateReason {
    Created,
    Updated,
    StatusChanged,
}

/// What happened to the affected tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskChangeAction {
    StatusChanged,
    PlanUnlinked,
}

/// Plan lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum PlanEvent {
    PlanUpdated {
        plan_id: Uuid,
        reason: PlanUpdateReason,
    },
    PlanRemoved {
        plan_id: Uuid,
    },
    TasksChanged {
        action: TaskChangeAction,
        task_ids: Vec<Uuid>,
    },
}

/// Broadcast-backed event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlanEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlanEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; a missing audience is not an error
    pub fn publish(&self, event: PlanEvent) {
        debug!("Publishing event: {:?}", event);
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
