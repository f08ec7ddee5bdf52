use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::{RetryConfig, RetryStrategyKind};
use conductor_core::{LinearBackoff, RetryStrategy};

/// `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(30);
        self.base.saturating_mul(factor).min(self.max)
    }
}

pub fn build_retry_strategy(cfg: &RetryConfig) -> Arc<dyn RetryStrategy> {
    let base = Duration::from_millis(cfg.base_delay_ms);
    let max = Duration::from_millis(cfg.max_delay_ms);
    match cfg.strategy {
        RetryStrategyKind::Linear => Arc::new(LinearBackoff::new(base).with_max(max)),
        RetryStrategyKind::ExponentialBackoff => Arc::new(ExponentialBackoff::new(base, max)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let s = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        assert_eq!(s.next_delay(0).as_millis(), 100);
        assert_eq!(s.next_delay(1).as_millis(), 200);
        assert_eq!(s.next_delay(3).as_millis(), 800);
        assert_eq!(s.next_delay(4).as_millis(), 1000);
        assert_eq!(s.next_delay(40).as_millis(), 1000);
    }

    #[test]
    fn test_build_from_config() {
        let linear = build_retry_strategy(&RetryConfig::default());
        assert_eq!(linear.name(), "linear");
        assert_eq!(linear.next_delay(1).as_millis(), 2000);

        let cfg = RetryConfig {
            strategy: RetryStrategyKind::ExponentialBackoff,
            base_delay_ms: 50,
            max_delay_ms: 120,
        };
        let exp = build_retry_strategy(&cfg);
        assert_eq!(exp.name(), "exponential-backoff");
        assert_eq!(exp.next_delay(2).as_millis(), 120);
    }
}
