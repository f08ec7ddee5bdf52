//! Aggregate counters over settled tasks.
//!
//! Running averages use the incremental mean `avg += (sample - avg) / n`, so no
//! per-task history is kept.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::executor::normalize_confidence;
use crate::types::{TaskResult, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub average_duration_ms: f64,
    /// Mean over successful tasks that reported a confidence.
    pub average_confidence: f64,
    pub confidence_samples: u64,
    pub total_messages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeMetrics {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// Tasks that reached an agent and failed. Tasks whose prerequisites
    /// never succeeded are counted in `blocked_tasks` instead.
    pub failed_tasks: u64,
    pub blocked_tasks: u64,
    pub cancelled_tasks: u64,
    pub average_duration_ms: f64,
    pub concurrent_tasks: usize,
    pub peak_concurrency: usize,
    pub shared_memory_entries: usize,
    pub agents: BTreeMap<String, AgentMetrics>,
}

impl RuntimeMetrics {
    /// Tasks that have reached a terminal status.
    pub fn settled_tasks(&self) -> u64 {
        self.completed_tasks + self.failed_tasks + self.blocked_tasks + self.cancelled_tasks
    }

    /// Every task that ended in the failed state: agent failures plus tasks
    /// blocked by a failed prerequisite.
    pub fn terminal_failures(&self) -> u64 {
        self.failed_tasks + self.blocked_tasks
    }

    pub fn success_rate(&self) -> f64 {
        let settled = self.settled_tasks();
        if settled == 0 {
            0.0
        } else {
            self.completed_tasks as f64 / settled as f64
        }
    }
}

fn incremental_mean(avg: f64, sample: f64, count: u64) -> f64 {
    avg + (sample - avg) / count as f64
}

#[derive(Debug)]
pub struct MetricsCollector {
    enabled: bool,
    inner: Mutex<RuntimeMetrics>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            inner: Mutex::new(RuntimeMetrics::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, RuntimeMetrics> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record_submitted(&self, count: usize) {
        if self.enabled {
            self.lock().total_tasks += count as u64;
        }
    }

    pub fn record(&self, result: &TaskResult) {
        if !self.enabled {
            return;
        }
        let mut m = self.lock();
        match result.status {
            TaskStatus::Succeeded => m.completed_tasks += 1,
            TaskStatus::Failed => m.failed_tasks += 1,
            TaskStatus::Blocked => {
                m.blocked_tasks += 1;
                return;
            }
            TaskStatus::Cancelled => {
                m.cancelled_tasks += 1;
                return;
            }
            TaskStatus::Pending | TaskStatus::Running => return,
        }

        let duration = result.duration_ms as f64;
        let dispatched = m.completed_tasks + m.failed_tasks;
        m.average_duration_ms = incremental_mean(m.average_duration_ms, duration, dispatched);

        let agent = m.agents.entry(result.agent_type.clone()).or_default();
        if result.success {
            agent.tasks_completed += 1;
        } else {
            agent.tasks_failed += 1;
        }
        let runs = agent.tasks_completed + agent.tasks_failed;
        agent.average_duration_ms = incremental_mean(agent.average_duration_ms, duration, runs);
        agent.total_messages += result.messages.len() as u64;

        if result.success {
            if let Some(confidence) = normalize_confidence(result.confidence) {
                agent.confidence_samples += 1;
                agent.average_confidence = incremental_mean(
                    agent.average_confidence,
                    confidence,
                    agent.confidence_samples,
                );
            }
        }
    }

    pub fn set_concurrency(&self, running: usize) {
        if !self.enabled {
            return;
        }
        let mut m = self.lock();
        m.concurrent_tasks = running;
        m.peak_concurrency = m.peak_concurrency.max(running);
    }

    pub fn set_shared_entries(&self, entries: usize) {
        if self.enabled {
            self.lock().shared_memory_entries = entries;
        }
    }

    pub fn snapshot(&self) -> RuntimeMetrics {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = RuntimeMetrics::default();
    }
}
