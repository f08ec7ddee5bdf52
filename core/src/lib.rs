//! Dependency-aware task scheduling for pluggable agents.
//!
//! A list of [`Task`]s is validated and levelled into an [`ExecutionPlan`] by
//! [`build_plan`], then executed by a [`Runtime`] under a global concurrency
//! ceiling with per-task timeout and retry. Agents talk to each other only
//! through the bounded [`SharedState`] and the artifacts they return.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod runtime;
pub mod shared_state;
pub mod types;

pub use agent::{Agent, AgentContext, AgentOutcome, AgentRegistry};
pub use config::{AppConfig, RuntimeConfig};
pub use error::{AgentError, GraphError, PlannerError, RuntimeError, TaskError};
pub use events::{EventBus, EventSink, RuntimeEvent};
pub use executor::{LinearBackoff, RetryStrategy, TaskExecutor};
pub use graph::{build_plan, ExecutionPlan, TaskGraph};
pub use metrics::{AgentMetrics, MetricsCollector, RuntimeMetrics};
pub use orchestrator::{Orchestrator, PlanResult};
pub use planner::{PlannedTasks, Planner, ProjectRequest, RequestKind};
pub use runtime::{Runtime, RuntimeBuilder, RuntimePhase};
pub use shared_state::SharedState;
pub use types::{ArtifactMap, Priority, Task, TaskResult, TaskStatus};
