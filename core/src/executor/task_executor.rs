use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::retry::{LinearBackoff, RetryStrategy};
use crate::agent::{Agent, AgentContext, AgentOutcome};
use crate::error::TaskError;
use crate::events::{EventBus, RuntimeEvent};
use crate::shared_state::SharedState;
use crate::types::{Task, TaskResult, TaskStatus};

/// Runs one task to a settled [`TaskResult`].
///
/// `execute` never returns an error and never panics outward: timeouts, agent
/// errors, agent panics and agent-reported failures are all encoded in the
/// result.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    strategy: Arc<dyn RetryStrategy>,
    events: Option<EventBus>,
    logging: bool,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(Arc::new(LinearBackoff::default()))
    }
}

impl TaskExecutor {
    pub fn new(strategy: Arc<dyn RetryStrategy>) -> Self {
        Self {
            strategy,
            events: None,
            logging: true,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn strategy(&self) -> &Arc<dyn RetryStrategy> {
        &self.strategy
    }

    pub async fn execute(
        &self,
        task: &Task,
        agent: Arc<dyn Agent>,
        shared: &SharedState,
        timeout: Duration,
        max_retries: u32,
    ) -> TaskResult {
        let start_time = Utc::now();
        let clock = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let err = match self
                .run_attempt(task, agent.clone(), shared, attempt, timeout)
                .await
            {
                Ok(outcome) if outcome.success => {
                    return self.succeeded(task, outcome, shared, attempt, start_time, clock);
                }
                Ok(outcome) => {
                    let message = rejection_message(&outcome);
                    return finish(
                        task,
                        Some(outcome),
                        TaskStatus::Failed,
                        Some(TaskError::Rejected { message }),
                        attempt,
                        start_time,
                        clock,
                    );
                }
                Err(err) => err,
            };

            if self.strategy.is_fatal(&err) {
                return finish(
                    task,
                    None,
                    TaskStatus::Failed,
                    Some(err),
                    attempt,
                    start_time,
                    clock,
                );
            }

            if attempt >= max_retries {
                let error = TaskError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                };
                return finish(
                    task,
                    None,
                    TaskStatus::Failed,
                    Some(error),
                    attempt,
                    start_time,
                    clock,
                );
            }

            let delay = self.strategy.next_delay(attempt);
            if self.logging {
                tracing::warn!(
                    task_id = %task.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "task attempt failed, retrying"
                );
            }
            if let Some(events) = &self.events {
                events.publish(RuntimeEvent::TaskRetrying {
                    task_id: task.id.clone(),
                    attempt: attempt + 1,
                    delay_ms: delay.as_millis() as u64,
                    error: err.to_string(),
                    timestamp: Utc::now(),
                });
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One agent call on its own tokio task, raced against `timeout`.
    async fn run_attempt(
        &self,
        task: &Task,
        agent: Arc<dyn Agent>,
        shared: &SharedState,
        attempt: u32,
        timeout: Duration,
    ) -> Result<AgentOutcome, TaskError> {
        let ctx = AgentContext {
            task_id: task.id.clone(),
            agent_type: task.agent_type.clone(),
            attempt,
            shared: shared.clone(),
        };
        let input = task.input.clone();
        let mut handle = AbortOnDrop(tokio::spawn(async move { agent.process(&input, &ctx).await }));

        match tokio::time::timeout(timeout, &mut handle.0).await {
            Ok(Ok(Ok(outcome))) => Ok(outcome),
            Ok(Ok(Err(err))) => Err(TaskError::from(err)),
            Ok(Err(join_err)) => {
                let message = if join_err.is_panic() {
                    "agent panicked".to_string()
                } else {
                    format!("agent call aborted: {join_err}")
                };
                Err(TaskError::Execution { message })
            }
            // Dropping `handle` aborts the attempt; the agent observes it at its next await.
            Err(_) => Err(TaskError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn succeeded(
        &self,
        task: &Task,
        outcome: AgentOutcome,
        shared: &SharedState,
        attempt: u32,
        start_time: DateTime<Utc>,
        clock: Instant,
    ) -> TaskResult {
        let updates = outcome
            .shared
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(
                outcome
                    .artifacts
                    .iter()
                    .map(|(k, v)| (format!("{}.{}", task.id, k), v.clone())),
            );
        shared.merge(updates);

        finish(
            task,
            Some(outcome),
            TaskStatus::Succeeded,
            None,
            attempt,
            start_time,
            clock,
        )
    }
}

fn rejection_message(outcome: &AgentOutcome) -> String {
    if !outcome.output.is_empty() {
        outcome.output.clone()
    } else if let Some(last) = outcome.messages.last() {
        last.clone()
    } else {
        "agent returned success=false".to_string()
    }
}

/// Clamp to [0, 1]; NaN counts as absent.
pub(crate) fn normalize_confidence(confidence: Option<f64>) -> Option<f64> {
    confidence
        .filter(|c| !c.is_nan())
        .map(|c| c.clamp(0.0, 1.0))
}

fn finish(
    task: &Task,
    outcome: Option<AgentOutcome>,
    status: TaskStatus,
    error: Option<TaskError>,
    attempt: u32,
    start_time: DateTime<Utc>,
    clock: Instant,
) -> TaskResult {
    let outcome = outcome.unwrap_or_default();
    let elapsed = clock.elapsed();
    let end_time = start_time
        + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

    TaskResult {
        task_id: task.id.clone(),
        agent_type: task.agent_type.clone(),
        status,
        success: status == TaskStatus::Succeeded,
        output: outcome.output,
        messages: outcome.messages,
        confidence: normalize_confidence(outcome.confidence),
        artifacts: outcome.artifacts,
        start_time,
        end_time,
        duration_ms: elapsed.as_millis() as u64,
        retry_count: attempt,
        error,
    }
}

/// Aborts the spawned attempt when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
