use conductor_core::{GraphError, PlannerError, RuntimeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("planner failed: {0}")]
    Planner(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl From<GraphError> for CliError {
    fn from(e: GraphError) -> Self {
        CliError::InvalidPlan(e.to_string())
    }
}

impl From<PlannerError> for CliError {
    fn from(e: PlannerError) -> Self {
        match e {
            PlannerError::Parse(_) | PlannerError::Graph(_) => CliError::InvalidPlan(e.to_string()),
            PlannerError::Io(_) | PlannerError::Failed(_) => CliError::Planner(e.to_string()),
        }
    }
}
