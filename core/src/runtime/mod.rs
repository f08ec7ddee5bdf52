//! The scheduler: dispatches tasks under a global concurrency ceiling and
//! records every settled result in a plan-scoped ledger.
//!
//! Two mutually exclusive modes share the same slots and ledger:
//! - plan mode ([`Runtime::execute_plan`]) runs a validated [`ExecutionPlan`]
//!   batch by batch;
//! - queue mode ([`Runtime::add_task`]) accepts tasks one at a time and drains
//!   them as their dependencies succeed.
//!
//! [`ExecutionPlan`]: crate::graph::ExecutionPlan

mod plan;
mod queue;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentRegistry};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, TaskError};
use crate::events::{EventBus, RuntimeEvent};
use crate::executor::{LinearBackoff, RetryStrategy, TaskExecutor};
use crate::metrics::{MetricsCollector, RuntimeMetrics};
use crate::shared_state::SharedState;
use crate::types::{Task, TaskResult, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimePhase {
    Idle,
    ExecutingPlan,
    DrainingQueue,
}

#[derive(Default)]
struct QueueState {
    /// Submitted but not yet dispatched, in submission order.
    pending: Vec<Task>,
    /// Ids of pending and running queue tasks.
    in_flight: HashSet<String>,
    running: usize,
}

struct RuntimeInner {
    config: RuntimeConfig,
    registry: AgentRegistry,
    executor: TaskExecutor,
    shared: SharedState,
    metrics: MetricsCollector,
    events: EventBus,
    slots: Arc<Semaphore>,
    ledger: Mutex<IndexMap<String, TaskResult>>,
    queue: Mutex<QueueState>,
    phase: Mutex<RuntimePhase>,
    phase_tx: watch::Sender<RuntimePhase>,
    cancel: Mutex<CancellationToken>,
    running: AtomicUsize,
    wake: Notify,
}

/// Clonable handle; clones drive the same scheduler.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

pub struct RuntimeBuilder {
    config: RuntimeConfig,
    registry: AgentRegistry,
    strategy: Arc<dyn RetryStrategy>,
    events: Option<EventBus>,
}

impl RuntimeBuilder {
    pub fn registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Runtime {
        let events = self.events.unwrap_or_default();
        let executor = TaskExecutor::new(self.strategy)
            .with_events(events.clone())
            .with_logging(self.config.enable_logging);
        let (phase_tx, _) = watch::channel(RuntimePhase::Idle);

        Runtime {
            inner: Arc::new(RuntimeInner {
                slots: Arc::new(Semaphore::new(self.config.concurrency())),
                shared: SharedState::new(self.config.shared_memory_limit),
                metrics: MetricsCollector::new(self.config.enable_metrics),
                registry: self.registry,
                executor,
                events,
                ledger: Mutex::new(IndexMap::new()),
                queue: Mutex::new(QueueState::default()),
                phase: Mutex::new(RuntimePhase::Idle),
                phase_tx,
                cancel: Mutex::new(CancellationToken::new()),
                running: AtomicUsize::new(0),
                wake: Notify::new(),
                config: self.config,
            }),
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig, registry: AgentRegistry) -> Self {
        Self::builder(config).registry(registry).build()
    }

    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            registry: AgentRegistry::new(),
            strategy: Arc::new(LinearBackoff::default()),
            events: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.inner.registry
    }

    pub fn phase(&self) -> RuntimePhase {
        *lock(&self.inner.phase)
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.inner.metrics.snapshot()
    }

    pub fn shared_state(&self) -> &SharedState {
        &self.inner.shared
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.events.subscribe()
    }

    pub fn result(&self, task_id: &str) -> Option<TaskResult> {
        lock(&self.inner.ledger).get(task_id).cloned()
    }

    /// Every settled result, in settlement order.
    pub fn results(&self) -> Vec<TaskResult> {
        lock(&self.inner.ledger).values().cloned().collect()
    }

    /// Tasks currently running on an agent.
    pub fn running_tasks(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Concurrency slots not held by a running task.
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Stop dispatching. Tasks already on an agent run to completion or
    /// timeout; everything not yet dispatched settles as cancelled. Stays in
    /// effect until [`reset`](Self::reset).
    pub fn cancel(&self) {
        lock(&self.inner.cancel).cancel();
        self.inner.wake.notify_one();
        if self.inner.config.enable_logging {
            tracing::info!("runtime cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.cancel).is_cancelled()
    }

    /// Clear ledger, queue, shared state, metrics, cached agent instances and
    /// cancellation.
    pub fn reset(&self) -> Result<(), RuntimeError> {
        let phase = lock(&self.inner.phase);
        if *phase != RuntimePhase::Idle {
            return Err(RuntimeError::Busy("cannot reset while tasks are executing"));
        }
        *lock(&self.inner.queue) = QueueState::default();
        lock(&self.inner.ledger).clear();
        self.inner.shared.clear();
        self.inner.metrics.reset();
        self.inner.registry.clear_instances();
        *lock(&self.inner.cancel) = CancellationToken::new();
        drop(phase);

        if self.inner.config.enable_logging {
            tracing::debug!("runtime reset");
        }
        Ok(())
    }

    /// Resolves once no plan is executing and the queue drain loop is idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.phase_tx.subscribe();
        let _ = rx.wait_for(|phase| *phase == RuntimePhase::Idle).await;
    }

    fn cancel_token(&self) -> CancellationToken {
        lock(&self.inner.cancel).clone()
    }

    /// Callers must hold the phase lock.
    fn set_phase(&self, guard: &mut MutexGuard<'_, RuntimePhase>, phase: RuntimePhase) {
        **guard = phase;
        self.inner.phase_tx.send_replace(phase);
    }

    /// Prerequisites of `task` that settled without success.
    fn failed_dependencies(&self, task: &Task) -> Vec<String> {
        let ledger = lock(&self.inner.ledger);
        task.dependencies
            .iter()
            .filter(|dep| ledger.get(dep.as_str()).is_some_and(|r| !r.success))
            .cloned()
            .collect()
    }

    fn dependencies_succeeded(&self, task: &Task) -> bool {
        let ledger = lock(&self.inner.ledger);
        task.dependencies
            .iter()
            .all(|dep| ledger.get(dep.as_str()).is_some_and(|r| r.success))
    }

    /// Wait for a slot unless cancelled first.
    async fn acquire_slot(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = self.inner.slots.clone().acquire_owned() => permit.ok(),
        }
    }

    /// Run a task that already holds a slot, then release the slot and settle.
    async fn run_with_slot(
        &self,
        task: &Task,
        agent: Arc<dyn Agent>,
        batch: Option<usize>,
        permit: OwnedSemaphorePermit,
    ) -> TaskResult {
        let inner = &self.inner;
        let running = RunningGuard::enter(inner);

        if inner.config.enable_logging {
            tracing::debug!(task_id = %task.id, agent_type = %task.agent_type, ?batch, "dispatching task");
        }
        inner.events.publish(RuntimeEvent::TaskStarted {
            task_id: task.id.clone(),
            agent_type: task.agent_type.clone(),
            batch,
            timestamp: chrono::Utc::now(),
        });

        let timeout = task.timeout().unwrap_or_else(|| inner.config.timeout());
        let retries = task.retries.unwrap_or(inner.config.retry_attempts);
        let result = inner
            .executor
            .execute(task, agent, &inner.shared, timeout, retries)
            .await;

        drop(permit);
        drop(running);

        self.settle(result)
    }

    /// Record a terminal result in the ledger and metrics and announce it.
    fn settle(&self, result: TaskResult) -> TaskResult {
        let inner = &self.inner;
        lock(&inner.ledger).insert(result.task_id.clone(), result.clone());
        inner.metrics.record(&result);
        inner.metrics.set_shared_entries(inner.shared.len());

        let event = match result.status {
            TaskStatus::Blocked => RuntimeEvent::TaskBlocked {
                task_id: result.task_id.clone(),
                blocked_by: match &result.error {
                    Some(TaskError::Blocked { dependencies }) => dependencies.clone(),
                    _ => Vec::new(),
                },
                timestamp: result.end_time,
            },
            TaskStatus::Cancelled => RuntimeEvent::TaskCancelled {
                task_id: result.task_id.clone(),
                timestamp: result.end_time,
            },
            _ => RuntimeEvent::settled(&result),
        };
        inner.events.publish(event);

        if inner.config.enable_logging {
            match &result.error {
                None => tracing::info!(
                    task_id = %result.task_id,
                    duration_ms = result.duration_ms,
                    retries = result.retry_count,
                    "task succeeded"
                ),
                Some(err) => tracing::info!(
                    task_id = %result.task_id,
                    status = ?result.status,
                    error.kind = err.kind(),
                    error.message = %err,
                    "task did not succeed"
                ),
            }
        }
        result
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("phase", &self.phase())
            .field("config", &self.inner.config)
            .field("running", &self.running_tasks())
            .finish()
    }
}

/// Holds one slot of the running-task count until dropped.
struct RunningGuard<'a> {
    inner: &'a RuntimeInner,
}

impl<'a> RunningGuard<'a> {
    fn enter(inner: &'a RuntimeInner) -> Self {
        let running = inner.running.fetch_add(1, Ordering::SeqCst) + 1;
        inner.metrics.set_concurrency(running);
        Self { inner }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let running = self
            .inner
            .running
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        self.inner.metrics.set_concurrency(running);
    }
}
