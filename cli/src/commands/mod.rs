pub mod cli;
pub mod plan;
pub mod run;
pub mod validate;

use std::path::Path;

use conductor_core::config::AppConfig;
use conductor_core::PlannedTasks;

use crate::error::CliError;

/// Read a planned-tasks JSON file.
pub(crate) fn load_planned(path: &Path) -> Result<PlannedTasks, CliError> {
    let text = std::fs::read_to_string(path)?;
    Ok(PlannedTasks::from_json(&text)?)
}

/// Fold command-line overrides into the loaded config.
pub(crate) fn apply_exec_args(cfg: &mut AppConfig, exec: &cli::ExecArgs) {
    if let Some(n) = exec.max_concurrent {
        cfg.runtime.max_concurrent_agents = n;
    }
    if let Some(ms) = exec.timeout_ms {
        cfg.runtime.timeout_ms = ms;
    }
    if let Some(n) = exec.retries {
        cfg.runtime.retry_attempts = n;
    }
    if let Some(format) = exec.format {
        cfg.output.format = format.into();
    }
    if exec.no_progress {
        cfg.output.progress = false;
    }
    if exec.ascii {
        cfg.output.ascii_only = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::config::OutputFormat;

    #[test]
    fn exec_args_override_config() {
        let mut cfg = AppConfig::default();
        let exec = cli::ExecArgs {
            max_concurrent: Some(2),
            retries: Some(0),
            format: Some(cli::FormatArg::Jsonl),
            no_progress: true,
            ..Default::default()
        };
        apply_exec_args(&mut cfg, &exec);
        assert_eq!(cfg.runtime.max_concurrent_agents, 2);
        assert_eq!(cfg.runtime.retry_attempts, 0);
        assert_eq!(cfg.runtime.timeout_ms, 300_000);
        assert_eq!(cfg.output.format, OutputFormat::Jsonl);
        assert!(!cfg.output.progress);
    }

    #[test]
    fn loads_fenced_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            "```json\n{\"tasks\":[{\"id\":\"a\",\"agentType\":\"echo\",\"input\":\"hi\"}]}\n```",
        )
        .unwrap();
        let planned = load_planned(&path).unwrap();
        assert_eq!(planned.tasks.len(), 1);
        assert_eq!(planned.tasks[0].agent_type, "echo");
    }

    #[test]
    fn missing_plan_file_is_io_error() {
        let err = load_planned(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
