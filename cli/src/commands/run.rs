use std::fmt::Write as _;

use conductor_core::config::{AppConfig, OutputFormat};
use conductor_core::events::spawn_sink;
use conductor_core::{EventBus, EventSink, ExecutionPlan, Orchestrator, PlanResult, TaskStatus};
use conductor_plugins::{build_renderer, build_runtime};

use super::cli::RunArgs;
use super::{apply_exec_args, load_planned};
use crate::error::CliError;
use crate::progress::ProgressMonitor;

/// Exit code when every task succeeded.
pub const EXIT_OK: i32 = 0;
/// Exit code when the plan ran but some task did not succeed.
pub const EXIT_TASKS_FAILED: i32 = 2;

pub async fn run(args: RunArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_exec_args(&mut cfg, &args.exec);
    let planned = load_planned(&args.plan)?;
    if !planned.notes.is_empty() {
        tracing::info!(notes = %planned.notes, "plan notes");
    }
    let plan = planned.into_plan()?;
    execute(&plan, &cfg).await
}

/// Run `plan` with live output, print the report, and map the outcome to an exit code.
pub(crate) async fn execute(plan: &ExecutionPlan, cfg: &AppConfig) -> Result<i32, CliError> {
    let events = EventBus::default();
    let sink: Box<dyn EventSink> = if use_progress(cfg) {
        Box::new(ProgressMonitor::new(plan.len(), cfg.output.ascii_only))
    } else {
        build_renderer(cfg.output.format, cfg.output.ascii_only)
    };
    let sink_task = spawn_sink(events.subscribe(), sink);

    let orchestrator = Orchestrator::new(build_runtime(cfg, events));

    let runtime = orchestrator.runtime().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling remaining tasks");
            runtime.cancel();
        }
    });

    let outcome = orchestrator.run(plan).await;

    // The sink drains until every bus sender is gone.
    interrupt.abort();
    let _ = interrupt.await;
    drop(orchestrator);
    let _ = sink_task.await;

    let result = outcome?;
    print!("{}", render_report(&result, cfg.output.format)?);
    Ok(if result.is_success() {
        EXIT_OK
    } else {
        EXIT_TASKS_FAILED
    })
}

fn use_progress(cfg: &AppConfig) -> bool {
    cfg.output.progress
        && cfg.output.format == OutputFormat::Text
        && atty::is(atty::Stream::Stderr)
}

pub(crate) fn render_report(result: &PlanResult, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Jsonl => {
            let mut value = serde_json::to_value(result).map_err(anyhow::Error::from)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("type".into(), "plan-result".into());
            }
            Ok(format!("{value}\n"))
        }
        OutputFormat::Text => Ok(render_text_report(result)),
    }
}

fn render_text_report(result: &PlanResult) -> String {
    let mut out = String::new();
    let width = result
        .results
        .iter()
        .map(|r| r.task_id.len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "\nResults:");
    for r in &result.results {
        let status = match r.status {
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
        };
        let _ = write!(
            out,
            "  {:<width$}  {:<10} {:>7}ms  retries {}",
            r.task_id, status, r.duration_ms, r.retry_count
        );
        if let Some(err) = &r.error {
            let _ = write!(out, "  {err}");
        }
        out.push('\n');
    }

    for r in result.succeeded().filter(|r| !r.output.is_empty()) {
        let _ = writeln!(out, "\n--- {} ({}) ---", r.task_id, r.agent_type);
        let _ = writeln!(out, "{}", r.output.trim_end());
    }

    let m = &result.metrics;
    let _ = writeln!(
        out,
        "\n{} succeeded, {} failed, {} blocked, {} cancelled in {}ms (avg task {:.1}ms, peak concurrency {})",
        result.count(TaskStatus::Succeeded),
        result.count(TaskStatus::Failed),
        result.count(TaskStatus::Blocked),
        result.count(TaskStatus::Cancelled),
        result.duration_ms,
        m.average_duration_ms,
        m.peak_concurrency,
    );
    out
}
