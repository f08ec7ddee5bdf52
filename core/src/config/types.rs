use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Agent type -> external command implementing it.
    #[serde(default)]
    pub agents: BTreeMap<String, CommandSpec>,

    #[serde(default)]
    pub planner: Option<CommandSpec>,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_true")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "conductor_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Scheduler knobs. Both snake_case and camelCase keys are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_concurrent_agents", alias = "maxConcurrentAgents")]
    pub max_concurrent_agents: usize,

    /// Default per-attempt timeout for tasks that do not set their own.
    #[serde(default = "default_timeout_ms", alias = "timeoutMs")]
    pub timeout_ms: u64,

    /// Default retry budget (attempts after the first).
    #[serde(default = "default_retry_attempts", alias = "retryAttempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_shared_memory_limit", alias = "sharedMemoryLimit")]
    pub shared_memory_limit: usize,

    #[serde(default = "default_true", alias = "enableMetrics")]
    pub enable_metrics: bool,

    #[serde(default = "default_true", alias = "enableLogging")]
    pub enable_logging: bool,
}

fn default_max_concurrent_agents() -> usize {
    5
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_shared_memory_limit() -> usize {
    1000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            shared_memory_limit: default_shared_memory_limit(),
            enable_metrics: true,
            enable_logging: true,
        }
    }
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Concurrency ceiling, never below one slot.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_agents.max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategyKind {
    #[default]
    Linear,
    #[serde(alias = "exponential")]
    ExponentialBackoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub strategy: RetryStrategyKind,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategyKind::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// An external program: input on stdin, result on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub ascii_only: bool,

    #[serde(default = "default_true")]
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            ascii_only: false,
            progress: true,
        }
    }
}
