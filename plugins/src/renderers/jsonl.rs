use chrono::Local;
use conductor_core::{EventSink, RuntimeEvent};
use serde_json::{json, Value};

/// One JSON object per runtime event, on stdout.
pub struct JsonlRenderer {
    pretty_print: bool,
}

impl JsonlRenderer {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    pub fn event_to_json(&self, event: &RuntimeEvent) -> Value {
        let mut value = serde_json::to_value(event).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut value {
            map.insert("v".into(), json!(1));
            map.insert("ts".into(), json!(Local::now().to_rfc3339()));
        }
        value
    }
}

impl EventSink for JsonlRenderer {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn handle(&self, event: &RuntimeEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        println!("{}", line.unwrap_or_else(|_| "{}".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::TaskResult;

    #[test]
    fn test_jsonl_event_type() {
        let value = JsonlRenderer::new(false).event_to_json(&RuntimeEvent::QueueIdle { pending: 2 });
        assert_eq!(value["type"], "queue-idle");
        assert_eq!(value["pending"], 2);
        assert_eq!(value["v"], 1);
        assert!(value["ts"].is_string());
    }

    #[test]
    fn test_jsonl_task_result_payload() {
        let result = TaskResult::cancelled("t", "echo");
        let value = JsonlRenderer::new(false).event_to_json(&RuntimeEvent::settled(&result));
        assert_eq!(value["type"], "task-failed");
        assert_eq!(value["result"]["taskId"], "t");
        assert_eq!(value["result"]["status"], "cancelled");
        assert_eq!(value["result"]["error"]["kind"], "cancelled");
    }
}
