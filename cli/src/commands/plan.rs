use conductor_core::config::AppConfig;
use conductor_core::ProjectRequest;
use conductor_plugins::build_planner;

use super::cli::PlanArgs;
use super::{apply_exec_args, run};
use crate::error::CliError;

/// Ask the configured planner for tasks, print them, and optionally run them.
pub async fn plan(args: PlanArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_exec_args(&mut cfg, &args.exec);
    let planner = build_planner(&cfg).ok_or_else(|| {
        CliError::Config("no planner configured; add a [planner] section".to_string())
    })?;

    let mut request = ProjectRequest::new(args.request).with_kind(args.kind);
    request.constraints = args.constraints;
    request.priorities = args.priorities;

    let planned = planner.plan(&request.render()).await?;
    tracing::info!(tasks = planned.tasks.len(), "planner returned tasks");

    let json = serde_json::to_string_pretty(&planned).map_err(anyhow::Error::from)?;
    println!("{json}");

    if !args.execute {
        return Ok(0);
    }
    let plan = planned.into_plan()?;
    run::execute(&plan, &cfg).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::commands::cli::ExecArgs;
    use conductor_core::config::{CommandSpec, OutputFormat};
    use conductor_core::RequestKind;

    fn args(execute: bool) -> PlanArgs {
        PlanArgs {
            request: "add a login page".into(),
            kind: RequestKind::FullStack,
            constraints: vec![],
            priorities: vec![],
            execute,
            exec: ExecArgs {
                no_progress: true,
                format: Some(crate::commands::cli::FormatArg::Jsonl),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn requires_a_planner() {
        let err = plan(args(false), AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn executes_planned_echo_tasks() {
        let mut cfg = AppConfig::default();
        cfg.output.format = OutputFormat::Jsonl;
        cfg.planner = Some(CommandSpec {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                r#"cat >/dev/null; echo '{"tasks":[{"id":"a","agentType":"echo","input":"x"}]}'"#.into(),
            ],
            env: Default::default(),
            cwd: None,
        });
        assert_eq!(plan(args(true), cfg).await.unwrap(), 0);
    }
}
