use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use conductor_core::{EventSink, RuntimeEvent, TaskStatus};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Live progress bars for a plan run, fed from the runtime event stream.
///
/// One overall bar counts settled tasks; each running task gets a spinner
/// that is replaced by its final status line.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: Mutex<HashMap<String, ProgressBar>>,
    ascii_only: bool,
}

impl ProgressMonitor {
    pub fn new(total_tasks: usize, ascii_only: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let chars = if ascii_only { "#>-" } else { "█▓▒░  " };
        overall.set_style(style.progress_chars(chars));
        overall.set_message("starting");

        Self {
            multi,
            overall,
            task_bars: Mutex::new(HashMap::new()),
            ascii_only,
        }
    }

    /// A monitor that draws nothing.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: ProgressBar::hidden(),
            task_bars: Mutex::new(HashMap::new()),
            ascii_only: true,
        }
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProgressBar>> {
        match self.task_bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn start_task(&self, task_id: &str) {
        if self.overall.is_hidden() {
            return;
        }
        let bar = self.multi.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.set_message(task_id.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bars().insert(task_id.to_string(), bar);
    }

    fn settle_task(&self, task_id: &str, status: TaskStatus, detail: String) {
        let mark = match (status, self.ascii_only) {
            (TaskStatus::Succeeded, false) => "✓",
            (TaskStatus::Succeeded, true) => "OK",
            (TaskStatus::Blocked, _) => "BLOCKED",
            (TaskStatus::Cancelled, _) => "CANCELLED",
            (_, false) => "✗",
            (_, true) => "FAIL",
        };
        let line = format!("{mark} {task_id} {detail}");
        match self.bars().remove(task_id) {
            Some(bar) => bar.finish_with_message(line),
            // Never started: blocked or cancelled before dispatch.
            None if !self.overall.is_hidden() => {
                let _ = self.multi.println(format!("  {line}"));
            }
            None => {}
        }
        self.overall.inc(1);
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.overall.position()
    }
}

impl EventSink for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn handle(&self, event: &RuntimeEvent) {
        match event {
            RuntimeEvent::PlanStarted { total_tasks, .. } => {
                self.overall.set_length(*total_tasks as u64);
                self.overall.set_position(0);
            }
            RuntimeEvent::BatchStarted { index, .. } => {
                self.overall.set_message(format!("batch {}", index + 1));
            }
            RuntimeEvent::TaskStarted { task_id, .. } => self.start_task(task_id),
            RuntimeEvent::TaskRetrying { task_id, attempt, .. } => {
                if let Some(bar) = self.bars().get(task_id) {
                    bar.set_message(format!("{task_id} (retry {attempt})"));
                }
            }
            RuntimeEvent::TaskCompleted { result } | RuntimeEvent::TaskFailed { result } => {
                self.settle_task(&result.task_id, result.status, format!("({}ms)", result.duration_ms));
            }
            RuntimeEvent::TaskBlocked { task_id, blocked_by, .. } => {
                self.settle_task(task_id, TaskStatus::Blocked, format!("by {}", blocked_by.join(", ")));
            }
            RuntimeEvent::TaskCancelled { task_id, .. } => {
                self.settle_task(task_id, TaskStatus::Cancelled, String::new());
            }
            RuntimeEvent::PlanCompleted { failed, blocked, cancelled, .. } => {
                let msg = if failed + blocked + cancelled == 0 { "done" } else { "finished with failures" };
                self.overall.finish_with_message(msg);
            }
            _ => {}
        }
    }

    fn finish(&self) {
        for (_, bar) in self.bars().drain() {
            bar.finish_and_clear();
        }
        if !self.overall.is_finished() {
            self.overall.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn hidden_monitor_counts_settled_tasks() {
        let monitor = ProgressMonitor::hidden();
        let now = Utc::now();
        monitor.handle(&RuntimeEvent::TaskStarted {
            task_id: "a".into(),
            agent_type: "echo".into(),
            batch: Some(0),
            timestamp: now,
        });
        monitor.handle(&RuntimeEvent::TaskBlocked {
            task_id: "b".into(),
            blocked_by: vec!["a".into()],
            timestamp: now,
        });
        monitor.handle(&RuntimeEvent::TaskCancelled {
            task_id: "c".into(),
            timestamp: now,
        });
        assert_eq!(monitor.position(), 2);
        monitor.finish();
    }
}
