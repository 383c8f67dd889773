//! Exponential backoff for transmit retries

use crate::transmit::fluent::FluentConfig;
use std::time::Duration;

/// Configuration for exponential backoff
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Retries after the first attempt (0 = no retry)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Delay to wait before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

impl From<&FluentConfig> for BackoffConfig {
    fn from(config: &FluentConfig) -> Self {
        Self {
            max_attempts: config.max_retry,
            initial_delay: config.retry_wait,
            max_delay: config.max_retry_wait,
            multiplier: 2.0,
        }
    }
}
