use std::fmt;
use std::time::Duration;

use crate::error::TaskError;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Decides how long to wait between attempts of a failing task.
///
/// The retry budget itself comes from the task (or runtime default); a strategy
/// only shapes the delay and may stop early by classifying an error as fatal.
pub trait RetryStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Delay before the attempt that follows the zero-based `attempt`.
    fn next_delay(&self, attempt: u32) -> Duration;

    fn is_fatal(&self, _error: &TaskError) -> bool {
        false
    }
}

/// `base * (attempt + 1)`, optionally capped.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    max: Option<Duration>,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base, max: None }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

impl RetryStrategy for LinearBackoff {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base.saturating_mul(attempt.saturating_add(1));
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}
