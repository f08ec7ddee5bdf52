//! Single-task execution: timeout enforcement, retry with backoff, and
//! folding an agent's outcome into a [`TaskResult`](crate::types::TaskResult).

mod retry;
mod task_executor;

pub use retry::{LinearBackoff, RetryStrategy, DEFAULT_BASE_DELAY};
pub(crate) use task_executor::normalize_confidence;
pub use task_executor::TaskExecutor;
