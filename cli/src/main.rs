use clap::Parser;
use conductor_core::config::LoggingConfig;
use conductor_core::RuntimeError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod progress;

use commands::cli;
use error::CliError;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = conductor_core::config::load(args.config.as_deref())
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    match args.command {
        cli::Commands::Run(run_args) => commands::run::run(run_args, cfg).await,
        cli::Commands::Validate(validate_args) => commands::validate::validate(validate_args, &cfg),
        cli::Commands::Plan(plan_args) => commands::plan::plan(plan_args, cfg).await,
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: all tasks succeeded
    // 2: plan ran, some task failed/blocked/cancelled (returned as a normal exit code)
    // 11: config or plan error
    // 20: io error
    // 30: planner failure
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) | CliError::InvalidPlan(_) => 11,
        CliError::Runtime(re) => match re {
            RuntimeError::AgentNotFound(_)
            | RuntimeError::AgentCreation { .. }
            | RuntimeError::Graph(_) => 11,
            _ => 50,
        },
        CliError::Io(_) | CliError::Command(_) => 20,
        CliError::Planner(_) => 30,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("conductor"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("conductor.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
