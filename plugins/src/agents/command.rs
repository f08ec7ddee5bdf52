use async_trait::async_trait;
use conductor_core::config::CommandSpec;
use conductor_core::{Agent, AgentContext, AgentError, AgentOutcome};
use serde_json::Value;

use crate::process::run_command;

/// An agent backed by an external program.
///
/// The task input is written to stdin. Exit code zero is a success whose
/// output is stdout; stderr lines become messages. If stdout is a JSON object
/// with an `output` field it is decoded as a full [`AgentOutcome`] instead,
/// which lets the program report confidence, artifacts and shared entries. A
/// non-zero exit is a raised (retryable) error.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    agent_type: String,
    spec: CommandSpec,
}

impl CommandAgent {
    pub fn new(agent_type: impl Into<String>, spec: CommandSpec) -> anyhow::Result<Self> {
        let agent_type = agent_type.into();
        if spec.program.trim().is_empty() {
            anyhow::bail!("agent '{agent_type}' has an empty program");
        }
        Ok(Self { agent_type, spec })
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    async fn process(&self, input: &str, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let env = [
            ("CONDUCTOR_TASK_ID", ctx.task_id.clone()),
            ("CONDUCTOR_AGENT_TYPE", ctx.agent_type.clone()),
            ("CONDUCTOR_ATTEMPT", ctx.attempt.to_string()),
        ];
        let out = run_command(&self.spec, input, &env).await?;

        if !out.status.success() {
            let code = out
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AgentError::Failed(format!(
                "'{}' exited with {}: {}",
                self.spec.program,
                code,
                out.stderr_tail()
            )));
        }

        let messages: Vec<String> = out
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        if let Some(outcome) = decode_structured(&out.stdout)? {
            return Ok(outcome);
        }

        let mut outcome = AgentOutcome::success(out.stdout.trim_end());
        outcome.messages = messages;
        Ok(outcome)
    }
}

/// `Some` when stdout is a JSON object carrying an `output` field.
fn decode_structured(stdout: &str) -> Result<Option<AgentOutcome>, AgentError> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        return Ok(None);
    }
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(None);
    };
    if !map.contains_key("output") {
        return Ok(None);
    }
    map.entry("success").or_insert(Value::Bool(true));
    serde_json::from_value(Value::Object(map))
        .map(Some)
        .map_err(|e| AgentError::InvalidInput(format!("malformed agent result: {e}")))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use conductor_core::SharedState;
    use serde_json::json;

    fn sh(script: &str) -> CommandAgent {
        CommandAgent::new(
            "shell",
            CommandSpec {
                program: "sh".into(),
                args: vec!["-c".into(), script.into()],
                env: Default::default(),
                cwd: None,
            },
        )
        .unwrap()
    }

    fn ctx() -> AgentContext {
        AgentContext {
            task_id: "t7".into(),
            agent_type: "shell".into(),
            attempt: 1,
            shared: SharedState::new(4),
        }
    }

    #[tokio::test]
    async fn plain_stdout_is_the_output() {
        let out = sh("cat; echo note >&2").process("payload", &ctx()).await.unwrap();
        assert!(out.success);
        assert_eq!(out.output, "payload");
        assert_eq!(out.messages, vec!["note"]);
    }

    #[tokio::test]
    async fn task_context_is_exported() {
        let out = sh("printf '%s/%s' \"$CONDUCTOR_TASK_ID\" \"$CONDUCTOR_ATTEMPT\"")
            .process("", &ctx())
            .await
            .unwrap();
        assert_eq!(out.output, "t7/1");
    }

    #[tokio::test]
    async fn json_stdout_is_decoded() {
        let script = r#"printf '{"output":"done","confidence":0.4,"artifacts":{"n":2}}'"#;
        let out = sh(script).process("", &ctx()).await.unwrap();
        assert!(out.success);
        assert_eq!(out.output, "done");
        assert_eq!(out.confidence, Some(0.4));
        assert_eq!(out.artifacts["n"], json!(2));
    }

    #[tokio::test]
    async fn non_zero_exit_raises() {
        let err = sh("echo broken >&2; exit 3").process("", &ctx()).await.unwrap_err();
        match err {
            AgentError::Failed(msg) => {
                assert!(msg.contains("exited with 3"));
                assert!(msg.ends_with("broken"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_program_is_rejected() {
        let spec = CommandSpec {
            program: " ".into(),
            args: vec![],
            env: Default::default(),
            cwd: None,
        };
        assert!(CommandAgent::new("x", spec).is_err());
    }
}
