use async_trait::async_trait;
use conductor_core::config::CommandSpec;
use conductor_core::{PlannedTasks, Planner, PlannerError};

use crate::process::run_command;

/// Delegates planning to an external program: the request text goes in on
/// stdin, a `PlannedTasks` JSON document comes back on stdout.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    spec: CommandSpec,
}

impl CommandPlanner {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Planner for CommandPlanner {
    async fn plan(&self, request: &str) -> Result<PlannedTasks, PlannerError> {
        let out = run_command(&self.spec, request, &[])
            .await
            .map_err(|e| PlannerError::Failed(format!("{e:#}")))?;
        if !out.status.success() {
            return Err(PlannerError::Failed(format!(
                "'{}' exited with {}: {}",
                self.spec.program,
                out.status,
                out.stderr_tail()
            )));
        }
        let planned = PlannedTasks::from_json(&out.stdout)?;
        tracing::debug!(tasks = planned.tasks.len(), "planner returned tasks");
        Ok(planned)
    }
}
