pub mod graph;
pub mod runtime;
pub mod task;

pub use graph::GraphError;
pub use runtime::{PlannerError, RuntimeError};
pub use task::{AgentError, TaskError};
