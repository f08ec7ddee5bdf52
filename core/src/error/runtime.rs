use thiserror::Error;

use super::graph::GraphError;

/// Errors surfaced synchronously by the runtime before any task is dispatched.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("invalid plan: {0}")]
    Graph(#[from] GraphError),

    #[error("no agent registered for type '{0}'")]
    AgentNotFound(String),

    #[error("failed to create agent '{agent_type}': {reason}")]
    AgentCreation { agent_type: String, reason: String },

    #[error("task '{0}' is already queued or settled")]
    DuplicateTask(String),

    #[error("runtime is busy: {0}")]
    Busy(&'static str),
}

/// Errors from turning a free-text request into planned tasks.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("planner output is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("planner io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("planner failed: {0}")]
    Failed(String),

    #[error("planned tasks are invalid: {0}")]
    Graph(#[from] GraphError),
}
