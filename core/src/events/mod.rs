//! Lifecycle notifications published by the runtime.
//!
//! Publishing never blocks and never fails: with zero subscribers events are
//! simply dropped, so scheduling behaves identically whether or not anything
//! is listening.

mod sink;

pub use sink::{spawn_sink, EventSink};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::TaskResult;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuntimeEvent {
    #[serde(rename_all = "camelCase")]
    TaskAdded {
        task_id: String,
        agent_type: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    TaskStarted {
        task_id: String,
        agent_type: String,
        batch: Option<usize>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    TaskRetrying {
        task_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    TaskCompleted { result: Box<TaskResult> },
    TaskFailed { result: Box<TaskResult> },
    #[serde(rename_all = "camelCase")]
    TaskBlocked {
        task_id: String,
        blocked_by: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    TaskCancelled {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    BatchStarted {
        run_id: String,
        index: usize,
        task_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    BatchCompleted {
        run_id: String,
        index: usize,
        succeeded: usize,
        failed: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlanStarted {
        run_id: String,
        total_tasks: usize,
        total_batches: usize,
    },
    #[serde(rename_all = "camelCase")]
    PlanCompleted {
        run_id: String,
        succeeded: usize,
        failed: usize,
        blocked: usize,
        cancelled: usize,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    QueueIdle { pending: usize },
}

impl RuntimeEvent {
    /// The wire name of the event (`task-added`, `plan-completed`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskAdded { .. } => "task-added",
            Self::TaskStarted { .. } => "task-started",
            Self::TaskRetrying { .. } => "task-retrying",
            Self::TaskCompleted { .. } => "task-completed",
            Self::TaskFailed { .. } => "task-failed",
            Self::TaskBlocked { .. } => "task-blocked",
            Self::TaskCancelled { .. } => "task-cancelled",
            Self::BatchStarted { .. } => "batch-started",
            Self::BatchCompleted { .. } => "batch-completed",
            Self::PlanStarted { .. } => "plan-started",
            Self::PlanCompleted { .. } => "plan-completed",
            Self::QueueIdle { .. } => "queue-idle",
        }
    }

    /// Event for a settled task: completed when it succeeded, failed otherwise.
    pub fn settled(result: &TaskResult) -> Self {
        if result.success {
            Self::TaskCompleted {
                result: Box::new(result.clone()),
            }
        } else {
            Self::TaskFailed {
                result: Box::new(result.clone()),
            }
        }
    }
}

/// Broadcast fan-out of [`RuntimeEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RuntimeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: RuntimeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish(RuntimeEvent::QueueIdle { pending: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(RuntimeEvent::TaskAdded {
            task_id: "a".into(),
            agent_type: "echo".into(),
            timestamp: Utc::now(),
        });
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.name(), "task-added");
    }

    #[test]
    fn serializes_with_kebab_type_tag() {
        let ev = RuntimeEvent::PlanCompleted {
            run_id: "r".into(),
            succeeded: 3,
            failed: 1,
            blocked: 1,
            cancelled: 0,
            duration_ms: 10,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "plan-completed");
        assert_eq!(v["runId"], "r");
        assert_eq!(v["durationMs"], 10);
    }
}
