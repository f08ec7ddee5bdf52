use async_trait::async_trait;
use conductor_core::{Agent, AgentContext, AgentError, AgentOutcome};

/// Returns its input unchanged. Handy for dry runs and wiring checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoAgent;

impl EchoAgent {
    pub const TYPE: &'static str = "echo";
}

#[async_trait]
impl Agent for EchoAgent {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    async fn process(&self, input: &str, _ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        Ok(AgentOutcome::success(input)
            .with_confidence(1.0)
            .with_message(format!("echoed {} bytes", input.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::SharedState;

    #[tokio::test]
    async fn echoes_input() {
        let ctx = AgentContext {
            task_id: "t".into(),
            agent_type: EchoAgent::TYPE.into(),
            attempt: 0,
            shared: SharedState::new(4),
        };
        let out = EchoAgent.process("hello", &ctx).await.unwrap();
        assert!(out.success);
        assert_eq!(out.output, "hello");
        assert_eq!(out.confidence, Some(1.0));
        assert_eq!(out.messages, vec!["echoed 5 bytes"]);
    }
}
