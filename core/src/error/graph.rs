use thiserror::Error;

/// Structural problems found while turning a task list into an execution plan.
///
/// All of these reject the plan before anything is scheduled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    UnknownDependency {
        task_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected: {0}")]
    CyclicDependency(String),
}
