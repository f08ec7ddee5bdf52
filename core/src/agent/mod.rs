//! The uniform contract every pluggable work unit implements.

mod registry;

pub use registry::{AgentFactoryFn, AgentRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::shared_state::SharedState;
use crate::types::ArtifactMap;

/// Context handed to an agent for one attempt of one task.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub task_id: String,
    pub agent_type: String,
    /// Zero-based attempt number; greater than zero on retries.
    pub attempt: u32,
    /// Plan-scoped store shared by all tasks. Reads see writes from tasks that
    /// already succeeded.
    pub shared: SharedState,
}

/// What an agent hands back when its call completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub success: bool,

    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub messages: Vec<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    /// Named results attached to the task result and mirrored into the shared
    /// store under `"{task_id}.{key}"`.
    #[serde(default)]
    pub artifacts: ArtifactMap,

    /// Entries written verbatim into the shared store when the task succeeds.
    #[serde(default, alias = "sharedMemory")]
    pub shared: ArtifactMap,
}

impl AgentOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }

    pub fn with_shared(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.shared.insert(key.into(), value);
        self
    }
}

/// A pluggable executor selected by a task's `agent_type`.
///
/// Returning `Err` (or exceeding the timeout) counts as a retryable failure.
/// Returning an outcome with `success == false` is a terminal failure that is
/// not retried.
#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_type(&self) -> &str;

    async fn process(&self, input: &str, ctx: &AgentContext) -> Result<AgentOutcome, AgentError>;
}
