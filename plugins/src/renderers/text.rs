use conductor_core::{EventSink, RuntimeEvent, TaskResult};

/// One human-readable line per runtime event, on stdout.
pub struct TextRenderer {
    ascii_only: bool,
}

impl TextRenderer {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn status_mark(&self, result: &TaskResult) -> &'static str {
        match (result.success, self.ascii_only) {
            (true, true) => "OK",
            (true, false) => "✓",
            (false, true) => "FAIL",
            (false, false) => "✗",
        }
    }

    pub fn format_event(&self, event: &RuntimeEvent) -> String {
        match event {
            RuntimeEvent::PlanStarted {
                run_id,
                total_tasks,
                total_batches,
            } => format!("PLAN START {run_id} (tasks: {total_tasks}, batches: {total_batches})"),
            RuntimeEvent::BatchStarted { index, task_ids, .. } => {
                format!("BATCH START {index} ({})", task_ids.join(", "))
            }
            RuntimeEvent::TaskAdded {
                task_id, agent_type, ..
            } => format!("TASK QUEUED {task_id} ({agent_type})"),
            RuntimeEvent::TaskStarted {
                task_id, agent_type, ..
            } => format!("TASK START {task_id} ({agent_type})"),
            RuntimeEvent::TaskRetrying {
                task_id,
                attempt,
                delay_ms,
                error,
                ..
            } => format!("TASK RETRY {task_id} (attempt {attempt} in {delay_ms}ms): {error}"),
            RuntimeEvent::TaskCompleted { result } | RuntimeEvent::TaskFailed { result } => {
                let mut line = format!(
                    "TASK END {} {} ({}ms, retries {})",
                    result.task_id,
                    self.status_mark(result),
                    result.duration_ms,
                    result.retry_count
                );
                if let Some(err) = &result.error {
                    line.push_str(&format!(": {err}"));
                }
                line
            }
            RuntimeEvent::TaskBlocked {
                task_id, blocked_by, ..
            } => format!("TASK BLOCKED {task_id} (by {})", blocked_by.join(", ")),
            RuntimeEvent::TaskCancelled { task_id, .. } => format!("TASK CANCELLED {task_id}"),
            RuntimeEvent::BatchCompleted {
                index,
                succeeded,
                failed,
                ..
            } => format!("BATCH END {index} (succeeded {succeeded}, failed {failed})"),
            RuntimeEvent::PlanCompleted {
                run_id,
                succeeded,
                failed,
                blocked,
                cancelled,
                duration_ms,
            } => format!(
                "PLAN END {run_id} (succeeded {succeeded}, failed {failed}, blocked {blocked}, cancelled {cancelled}, {duration_ms}ms)"
            ),
            RuntimeEvent::QueueIdle { pending } => format!("QUEUE IDLE (pending {pending})"),
        }
    }
}

impl EventSink for TextRenderer {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn handle(&self, event: &RuntimeEvent) {
        println!("{}", self.format_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use conductor_core::TaskError;

    #[test]
    fn test_task_end_line() {
        let mut result = TaskResult::blocked("d", "echo", vec!["b".into()]);
        result.error = Some(TaskError::Timeout { timeout_ms: 10 });
        result.status = conductor_core::TaskStatus::Failed;
        let line = TextRenderer::new(true).format_event(&RuntimeEvent::settled(&result));
        assert_eq!(line, "TASK END d FAIL (0ms, retries 0): task timed out after 10ms");
    }

    #[test]
    fn test_blocked_line() {
        let line = TextRenderer::new(false).format_event(&RuntimeEvent::TaskBlocked {
            task_id: "d".into(),
            blocked_by: vec!["b".into(), "c".into()],
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(line, "TASK BLOCKED d (by b, c)");
    }
}
