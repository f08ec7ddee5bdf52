use conductor_core::config::AppConfig;
use conductor_core::graph::DEFAULT_TASK_ESTIMATE;
use conductor_core::ExecutionPlan;

use super::cli::ValidateArgs;
use super::load_planned;
use crate::error::CliError;

pub fn validate(args: ValidateArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let plan = load_planned(&args.plan)?.into_plan()?;
    let concurrency = args
        .max_concurrent
        .unwrap_or_else(|| cfg.runtime.concurrency());
    print!("{}", describe(&plan, concurrency));
    Ok(0)
}

fn describe(plan: &ExecutionPlan, concurrency: usize) -> String {
    let mut out = format!(
        "{} tasks in {} batches\n",
        plan.len(),
        plan.batches().len()
    );
    for (i, batch) in plan.batches().iter().enumerate() {
        out.push_str(&format!("  batch {}: {}\n", i + 1, batch.join(", ")));
    }
    out.push_str(&format!("agents: {}\n", plan.agent_types().join(", ")));
    let estimate = plan.estimated_duration(concurrency, DEFAULT_TASK_ESTIMATE);
    out.push_str(&format!(
        "estimated duration: {}s at concurrency {}\n",
        estimate.as_secs(),
        concurrency
    ));
    out
}
