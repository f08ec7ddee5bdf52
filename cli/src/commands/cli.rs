use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use conductor_core::config::OutputFormat;
use conductor_core::RequestKind;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Text,
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "conductor", version, about = "Run dependency-aware agent task plans")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.conductor/config.toml, then ./conductor.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Knobs shared by every command that executes tasks.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ExecArgs {
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Default per-attempt timeout for tasks without their own.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Default retry budget for tasks without their own.
    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Plain ASCII status marks.
    #[arg(long, default_value_t = false)]
    pub ascii: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Planned tasks JSON (`{"tasks": [...], "notes": "..."}`).
    pub plan: PathBuf,

    #[command(flatten)]
    pub exec: ExecArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    pub plan: PathBuf,

    /// Concurrency assumed for the duration estimate.
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub request: String,

    #[arg(long, default_value_t = RequestKind::FullStack)]
    pub kind: RequestKind,

    #[arg(long = "constraint", action = clap::ArgAction::Append)]
    pub constraints: Vec<String>,

    #[arg(long = "priority", action = clap::ArgAction::Append)]
    pub priorities: Vec<String>,

    /// Run the planned tasks right away.
    #[arg(long, default_value_t = false)]
    pub execute: bool,

    #[command(flatten)]
    pub exec: ExecArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a task plan file.
    Run(RunArgs),
    /// Check a plan file and print its batches.
    Validate(ValidateArgs),
    /// Ask the configured planner for tasks.
    Plan(PlanArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let args = Args::try_parse_from([
            "conductor",
            "run",
            "plan.json",
            "--max-concurrent",
            "3",
            "--format",
            "jsonl",
            "--no-progress",
        ])
        .unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.plan, PathBuf::from("plan.json"));
        assert_eq!(run.exec.max_concurrent, Some(3));
        assert_eq!(run.exec.format, Some(FormatArg::Jsonl));
        assert!(run.exec.no_progress);
    }

    #[test]
    fn parses_plan_kind() {
        let args = Args::try_parse_from([
            "conductor",
            "--config",
            "c.toml",
            "plan",
            "--request",
            "build it",
            "--kind",
            "architecture",
            "--constraint",
            "cheap",
            "--execute",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        let Commands::Plan(plan) = args.command else {
            panic!("expected plan");
        };
        assert_eq!(plan.kind, RequestKind::Architecture);
        assert_eq!(plan.constraints, vec!["cheap"]);
        assert!(plan.execute);
    }
}
