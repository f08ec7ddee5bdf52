use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an agent while processing a task input.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("agent failed: {0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-task failure recorded in a `TaskResult`.
///
/// These never unwind the scheduler; they are data attached to the settled task.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    #[error("task timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("task execution failed: {message}")]
    Execution { message: String },

    #[error("agent reported failure: {message}")]
    Rejected { message: String },

    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<TaskError> },

    #[error("blocked by unsuccessful dependencies: {}", .dependencies.join(", "))]
    Blocked { dependencies: Vec<String> },

    #[error("cancelled before dispatch")]
    Cancelled,
}

impl TaskError {
    /// The innermost error, looking through `RetriesExhausted`.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::Timeout { .. })
    }

    /// Short machine-readable classification, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Execution { .. } => "execution",
            Self::Rejected { .. } => "rejected",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Blocked { .. } => "blocked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<AgentError> for TaskError {
    fn from(err: AgentError) -> Self {
        Self::Execution {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_sees_through_retry_wrapper() {
        let err = TaskError::RetriesExhausted {
            attempts: 3,
            last: Box::new(TaskError::Timeout { timeout_ms: 50 }),
        };
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "retries_exhausted");
        assert_eq!(err.root_cause().kind(), "timeout");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = TaskError::Blocked {
            dependencies: vec!["a".into(), "b".into()],
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["kind"], "blocked");
        assert_eq!(err.to_string(), "blocked by unsuccessful dependencies: a, b");
    }
}
