//! Whole-plan execution as a single call.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::agent::AgentRegistry;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::graph::{build_plan, ExecutionPlan};
use crate::metrics::RuntimeMetrics;
use crate::runtime::Runtime;
use crate::types::{Priority, Task, TaskResult, TaskStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub results: Vec<TaskResult>,
    pub metrics: RuntimeMetrics,
    pub shared_state: IndexMap<String, Value>,
    pub duration_ms: u64,
}

impl PlanResult {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn unsuccessful(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Output of each successful task keyed by agent type. When several tasks
    /// share an agent type the one settled last in batch order wins.
    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.succeeded()
            .filter(|r| !r.output.is_empty())
            .map(|r| (r.agent_type.clone(), r.output.clone()))
            .collect()
    }

    /// Artifacts of successful tasks, namespaced as `"{agent_type}-{key}"`.
    pub fn artifacts(&self) -> BTreeMap<String, Value> {
        self.succeeded()
            .flat_map(|r| {
                r.artifacts
                    .iter()
                    .map(move |(key, value)| (format!("{}-{}", r.agent_type, key), value.clone()))
            })
            .collect()
    }
}

/// Thin facade over a [`Runtime`]. It only executes plans it is given; turning
/// a free-text request into tasks is the caller's job (see [`crate::planner`]).
#[derive(Debug, Clone)]
pub struct Orchestrator {
    runtime: Runtime,
}

impl Orchestrator {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn from_config(config: RuntimeConfig, registry: AgentRegistry) -> Self {
        Self::new(Runtime::new(config, registry))
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub async fn run(&self, plan: &ExecutionPlan) -> Result<PlanResult, RuntimeError> {
        let started = Instant::now();
        let results = self.runtime.execute_plan(plan).await?;
        Ok(PlanResult {
            results,
            metrics: self.runtime.metrics(),
            shared_state: self.runtime.shared_state().snapshot(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Validate `tasks` into a plan and run it.
    pub async fn run_tasks(&self, tasks: Vec<Task>) -> Result<PlanResult, RuntimeError> {
        let plan = build_plan(tasks, &HashMap::new())?;
        self.run(&plan).await
    }

    /// Feed the same input through `agent_types` one after another
    /// (`quick-0 -> quick-1 -> ...`).
    pub async fn quick_analysis<S: AsRef<str>>(
        &self,
        input: &str,
        agent_types: &[S],
    ) -> Result<PlanResult, RuntimeError> {
        let tasks = agent_types
            .iter()
            .enumerate()
            .map(|(index, agent_type)| {
                let task = Task::new(format!("quick-{index}"), agent_type.as_ref(), input)
                    .with_priority(Priority::High);
                if index == 0 {
                    task
                } else {
                    task.with_dependencies([format!("quick-{}", index - 1)])
                }
            })
            .collect();
        self.run_tasks(tasks).await
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.runtime.metrics()
    }

    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.runtime.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn result(agent: &str, success: bool, output: &str) -> TaskResult {
        TaskResult {
            task_id: format!("{agent}-task"),
            agent_type: agent.into(),
            status: if success { TaskStatus::Succeeded } else { TaskStatus::Failed },
            success,
            output: output.into(),
            messages: vec![],
            confidence: None,
            artifacts: [("report".to_string(), json!({"ok": success}))].into_iter().collect(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            duration_ms: 1,
            retry_count: 0,
            error: None,
        }
    }

    #[test]
    fn helpers_only_consider_successful_tasks() {
        let plan = PlanResult {
            results: vec![result("analyst", true, "findings"), result("architect", false, "x")],
            metrics: RuntimeMetrics::default(),
            shared_state: IndexMap::new(),
            duration_ms: 5,
        };

        assert!(!plan.is_success());
        assert_eq!(plan.succeeded().count(), 1);
        assert_eq!(plan.count(TaskStatus::Failed), 1);
        assert_eq!(plan.outputs().get("analyst").map(String::as_str), Some("findings"));
        assert!(!plan.outputs().contains_key("architect"));

        let artifacts = plan.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts["analyst-report"], json!({"ok": true}));
    }
}
