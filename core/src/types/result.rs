use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArtifactMap;
use crate::error::TaskError;

/// Lifecycle of a single task: `Pending -> Running -> {Succeeded, Failed}`,
/// or straight from `Pending` to `Blocked`/`Cancelled` when it never dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Whether the task reached an agent at all.
    pub fn was_dispatched(self) -> bool {
        matches!(self, Self::Running | Self::Succeeded | Self::Failed)
    }
}

/// Outcome of a settled task. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub agent_type: String,
    pub status: TaskStatus,
    pub success: bool,
    pub output: String,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub artifacts: ArtifactMap,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskResult {
    /// A result for a task that never reached its agent.
    pub fn not_dispatched(
        task_id: impl Into<String>,
        agent_type: impl Into<String>,
        status: TaskStatus,
        error: TaskError,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            agent_type: agent_type.into(),
            status,
            success: false,
            output: String::new(),
            messages: Vec::new(),
            confidence: None,
            artifacts: ArtifactMap::new(),
            start_time: now,
            end_time: now,
            duration_ms: 0,
            retry_count: 0,
            error: Some(error),
        }
    }

    pub fn blocked(
        task_id: impl Into<String>,
        agent_type: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self::not_dispatched(
            task_id,
            agent_type,
            TaskStatus::Blocked,
            TaskError::Blocked { dependencies },
        )
    }

    pub fn cancelled(task_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self::not_dispatched(task_id, agent_type, TaskStatus::Cancelled, TaskError::Cancelled)
    }
}
