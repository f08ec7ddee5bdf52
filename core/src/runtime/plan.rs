use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{lock, Runtime, RuntimePhase};
use crate::agent::Agent;
use crate::error::{RuntimeError, TaskError};
use crate::events::RuntimeEvent;
use crate::graph::ExecutionPlan;
use crate::types::{Task, TaskResult, TaskStatus};

/// Returns the runtime to `Idle` however plan execution ends.
struct PlanPhaseGuard<'a> {
    runtime: &'a Runtime,
}

impl Drop for PlanPhaseGuard<'_> {
    fn drop(&mut self) {
        let mut phase = lock(&self.runtime.inner.phase);
        self.runtime.set_phase(&mut phase, RuntimePhase::Idle);
    }
}

impl Runtime {
    /// Run every batch of `plan` in order and return the results in batch order.
    ///
    /// Fails only before scheduling: when another plan or the queue is active,
    /// or when an agent type cannot be resolved. Per-task failures are data in
    /// the returned results; tasks behind a failed prerequisite are `Blocked`.
    pub async fn execute_plan(&self, plan: &ExecutionPlan) -> Result<Vec<TaskResult>, RuntimeError> {
        let _guard = self.enter_plan_phase()?;
        let agents = self.resolve_agents(plan)?;
        let inner = &self.inner;

        lock(&inner.ledger).clear();
        inner.shared.clear();
        {
            let mut queue = lock(&inner.queue);
            if !queue.pending.is_empty() && inner.config.enable_logging {
                tracing::debug!(dropped = queue.pending.len(), "discarding stale queued tasks");
            }
            queue.pending.clear();
            queue.in_flight.clear();
        }
        inner.metrics.record_submitted(plan.len());

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let cancel = self.cancel_token();

        if inner.config.enable_logging {
            tracing::info!(
                run_id = %run_id,
                tasks = plan.len(),
                batches = plan.batches().len(),
                max_concurrent = inner.config.concurrency(),
                "plan started"
            );
        }
        inner.events.publish(RuntimeEvent::PlanStarted {
            run_id: run_id.clone(),
            total_tasks: plan.len(),
            total_batches: plan.batches().len(),
        });

        let mut ordered = Vec::with_capacity(plan.len());
        for (index, batch) in plan.batches().iter().enumerate() {
            inner.events.publish(RuntimeEvent::BatchStarted {
                run_id: run_id.clone(),
                index,
                task_ids: batch.clone(),
            });

            let batch_results = self.run_batch(plan, batch, index, &agents, &cancel).await;
            let succeeded = batch_results.iter().filter(|r| r.success).count();

            if inner.config.enable_logging {
                tracing::info!(
                    run_id = %run_id,
                    batch = index,
                    succeeded,
                    failed = batch_results.len() - succeeded,
                    "batch settled"
                );
            }
            inner.events.publish(RuntimeEvent::BatchCompleted {
                run_id: run_id.clone(),
                index,
                succeeded,
                failed: batch_results.len() - succeeded,
            });
            ordered.extend(batch_results);
        }

        let count = |status: TaskStatus| ordered.iter().filter(|r| r.status == status).count();
        let duration_ms = started.elapsed().as_millis() as u64;
        let (succeeded, failed, blocked, cancelled) = (
            count(TaskStatus::Succeeded),
            count(TaskStatus::Failed),
            count(TaskStatus::Blocked),
            count(TaskStatus::Cancelled),
        );
        if inner.config.enable_logging {
            tracing::info!(
                run_id = %run_id,
                succeeded,
                failed,
                blocked,
                cancelled,
                duration_ms,
                "plan completed"
            );
        }
        inner.events.publish(RuntimeEvent::PlanCompleted {
            run_id,
            succeeded,
            failed,
            blocked,
            cancelled,
            duration_ms,
        });

        Ok(ordered)
    }

    fn enter_plan_phase(&self) -> Result<PlanPhaseGuard<'_>, RuntimeError> {
        let mut phase = lock(&self.inner.phase);
        match *phase {
            RuntimePhase::Idle => {
                self.set_phase(&mut phase, RuntimePhase::ExecutingPlan);
                Ok(PlanPhaseGuard { runtime: self })
            }
            RuntimePhase::ExecutingPlan => Err(RuntimeError::Busy("a plan is already executing")),
            RuntimePhase::DrainingQueue => Err(RuntimeError::Busy("the task queue is draining")),
        }
    }

    /// Resolve every agent type up front so configuration errors surface
    /// before anything is dispatched.
    fn resolve_agents(&self, plan: &ExecutionPlan) -> Result<HashMap<String, Arc<dyn Agent>>, RuntimeError> {
        plan.agent_types()
            .into_iter()
            .map(|agent_type| {
                let agent = self.inner.registry.resolve(agent_type)?;
                Ok((agent_type.to_string(), agent))
            })
            .collect()
    }

    /// Dispatch one batch and wait for all of it to settle. Results keep batch order.
    async fn run_batch(
        &self,
        plan: &ExecutionPlan,
        batch: &[String],
        index: usize,
        agents: &HashMap<String, Arc<dyn Agent>>,
        cancel: &CancellationToken,
    ) -> Vec<TaskResult> {
        let mut settled: HashMap<String, TaskResult> = HashMap::with_capacity(batch.len());
        let mut in_flight = FuturesUnordered::new();

        for task in batch.iter().filter_map(|id| plan.task(id)) {
            if cancel.is_cancelled() {
                let result = self.settle(TaskResult::cancelled(&task.id, &task.agent_type));
                settled.insert(task.id.clone(), result);
                continue;
            }
            let failed = self.failed_dependencies(task);
            if !failed.is_empty() {
                let result = self.settle(TaskResult::blocked(&task.id, &task.agent_type, failed));
                settled.insert(task.id.clone(), result);
                continue;
            }
            match agents.get(&task.agent_type) {
                Some(agent) => in_flight.push(self.dispatch(task, agent.clone(), index, cancel)),
                None => {
                    let result = self.settle(TaskResult::not_dispatched(
                        &task.id,
                        &task.agent_type,
                        TaskStatus::Failed,
                        TaskError::Execution {
                            message: format!("no agent resolved for '{}'", task.agent_type),
                        },
                    ));
                    settled.insert(task.id.clone(), result);
                }
            }
        }

        while let Some(result) = in_flight.next().await {
            settled.insert(result.task_id.clone(), result);
        }

        batch.iter().filter_map(|id| settled.remove(id)).collect()
    }

    async fn dispatch(
        &self,
        task: &Task,
        agent: Arc<dyn Agent>,
        batch: usize,
        cancel: &CancellationToken,
    ) -> TaskResult {
        match self.acquire_slot(cancel).await {
            Some(permit) => self.run_with_slot(task, agent, Some(batch), permit).await,
            None => self.settle(TaskResult::cancelled(&task.id, &task.agent_type)),
        }
    }
}
