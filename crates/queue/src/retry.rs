//! Retry policy: attempt budget and backoff delays for failed jobs.

use std::time::Duration;

use chrono::{DateTime, Utc};

use runq_core::config::QueueConfig;

/// Longest backoff between two attempts, whatever the policy computes.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Exponential backoff: `base_delay * multiplier^(attempts - 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed before a job is marked `Failed`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_ms),
            multiplier: config.retry_multiplier,
        }
    }

    /// Delay before the next attempt, given the attempts already made.
    ///
    /// With base=1s, multiplier=2.0: 1s, 2s, 4s, ... capped at [`MAX_RETRY_DELAY`].
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if secs.is_nan() || secs < 0.0 {
            return self.base_delay.min(MAX_RETRY_DELAY);
        }
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }

    /// Earliest time the next attempt may be claimed.
    pub fn retry_at(&self, attempts: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.next_delay(attempts))
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_RETRY_DELAY.as_secs() as i64));
        now + delay
    }

    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
