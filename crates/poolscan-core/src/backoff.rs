//! Exponential backoff for subscription reconnects.

use std::time::Duration;

/// Configuration for the reconnect backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Maximum number of reconnect attempts (not counting the first open).
    pub max_attempts: u32,
    pub initial: Duration,
    /// Caps exponential growth.
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Stateless policy: computes the delay given the attempt number.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Delay before the `attempt`-th reconnect (1-based), or `None` once the
    /// budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_attempts {
            return None;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_ms = self.config.initial.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped = base_ms.min(self.config.max.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}
