use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::{lock, Runtime, RuntimePhase};
use crate::agent::Agent;
use crate::error::{RuntimeError, TaskError};
use crate::events::RuntimeEvent;
use crate::types::{Task, TaskResult, TaskStatus};

enum QueueStep {
    Dispatch(Task, Arc<dyn Agent>),
    Wait,
    Idle,
}

impl Runtime {
    /// Submit a task in continuous mode.
    ///
    /// The task runs once every dependency has succeeded, and settles as
    /// `Blocked` as soon as one has not. Dependencies on ids that are never
    /// submitted keep the task pending (see [`pending_tasks`](Self::pending_tasks)).
    pub async fn add_task(&self, task: Task) -> Result<(), RuntimeError> {
        self.inner.registry.resolve(&task.agent_type)?;

        let mut phase = lock(&self.inner.phase);
        if *phase == RuntimePhase::ExecutingPlan {
            return Err(RuntimeError::Busy("a plan is executing"));
        }
        {
            let mut queue = lock(&self.inner.queue);
            if queue.in_flight.contains(&task.id)
                || lock(&self.inner.ledger).contains_key(&task.id)
            {
                return Err(RuntimeError::DuplicateTask(task.id));
            }
            queue.in_flight.insert(task.id.clone());
            self.inner.metrics.record_submitted(1);
            self.inner.events.publish(RuntimeEvent::TaskAdded {
                task_id: task.id.clone(),
                agent_type: task.agent_type.clone(),
                timestamp: Utc::now(),
            });
            if self.inner.config.enable_logging {
                tracing::debug!(task_id = %task.id, deps = task.dependencies.len(), "task queued");
            }
            queue.pending.push(task);
        }

        if *phase == RuntimePhase::Idle {
            self.set_phase(&mut phase, RuntimePhase::DrainingQueue);
            let runtime = self.clone();
            tokio::spawn(async move { runtime.drain_queue().await });
        }
        drop(phase);
        self.inner.wake.notify_one();
        Ok(())
    }

    /// Queued tasks not yet dispatched, in submission order.
    pub fn pending_tasks(&self) -> Vec<Task> {
        lock(&self.inner.queue).pending.clone()
    }

    async fn drain_queue(self) {
        let cancel = self.cancel_token();
        loop {
            match self.next_queue_step(&cancel) {
                QueueStep::Idle => break,
                QueueStep::Wait => self.inner.wake.notified().await,
                QueueStep::Dispatch(task, agent) => match self.acquire_slot(&cancel).await {
                    Some(permit) => {
                        let runtime = self.clone();
                        tokio::spawn(async move {
                            runtime.run_with_slot(&task, agent, None, permit).await;
                            runtime.finish_queued(&task.id);
                        });
                    }
                    None => {
                        self.settle(TaskResult::cancelled(&task.id, &task.agent_type));
                        self.finish_queued(&task.id);
                    }
                },
            }
        }
    }

    /// Settle whatever can no longer run, then pick the first runnable task.
    ///
    /// Runs under the phase lock so the transition to idle cannot race with a
    /// concurrent `add_task`.
    fn next_queue_step(&self, cancel: &CancellationToken) -> QueueStep {
        let mut phase = lock(&self.inner.phase);
        let mut queue = lock(&self.inner.queue);
        let cancelled = cancel.is_cancelled();

        loop {
            let mut progressed = false;
            let mut i = 0;
            while i < queue.pending.len() {
                let (ready, failed) = {
                    let task = &queue.pending[i];
                    (
                        !cancelled && self.dependencies_succeeded(task),
                        self.failed_dependencies(task),
                    )
                };

                if ready {
                    let task = queue.pending.remove(i);
                    match self.inner.registry.resolve(&task.agent_type) {
                        Ok(agent) => {
                            queue.running += 1;
                            return QueueStep::Dispatch(task, agent);
                        }
                        Err(err) => {
                            queue.in_flight.remove(&task.id);
                            self.settle(TaskResult::not_dispatched(
                                &task.id,
                                &task.agent_type,
                                TaskStatus::Failed,
                                TaskError::Execution {
                                    message: err.to_string(),
                                },
                            ));
                            progressed = true;
                            continue;
                        }
                    }
                }

                if cancelled || !failed.is_empty() {
                    let task = queue.pending.remove(i);
                    queue.in_flight.remove(&task.id);
                    let result = if cancelled {
                        TaskResult::cancelled(&task.id, &task.agent_type)
                    } else {
                        TaskResult::blocked(&task.id, &task.agent_type, failed)
                    };
                    self.settle(result);
                    progressed = true;
                    continue;
                }

                i += 1;
            }
            if !progressed {
                break;
            }
        }

        if queue.running > 0 {
            return QueueStep::Wait;
        }

        let pending = queue.pending.len();
        self.set_phase(&mut phase, RuntimePhase::Idle);
        self.inner.events.publish(RuntimeEvent::QueueIdle { pending });
        if self.inner.config.enable_logging {
            tracing::debug!(pending, "task queue idle");
        }
        QueueStep::Idle
    }

    fn finish_queued(&self, task_id: &str) {
        {
            let mut queue = lock(&self.inner.queue);
            queue.running = queue.running.saturating_sub(1);
            queue.in_flight.remove(task_id);
        }
        self.inner.wake.notify_one();
    }
}
