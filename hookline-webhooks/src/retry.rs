//! Retry policy for webhook delivery

use rand::Rng;
use std::time::Duration;

/// Upper bound of the random extra delay added when jitter is on (25%).
const JITTER_FACTOR: f64 = 0.25;

/// Retry policy configuration
///
/// `max_attempts` counts every POST, including the first one, so a policy
/// with `max_attempts == 3` sends at most three requests per subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts (at least 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Maximum delay between attempts
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, never retried
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// A fixed number of attempts separated by a constant delay
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Exponential backoff with default delays
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after attempt `attempt` failed, before the next one.
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    /// Jitter never pushes the delay past the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let max_secs = self.max_delay.as_secs_f64();
        let delay_secs = if base_delay.is_finite() {
            base_delay.min(max_secs)
        } else {
            max_secs
        };

        let final_delay = if self.jitter && delay_secs > 0.0 {
            let factor = 1.0 + rand::rng().random_range(0.0..JITTER_FACTOR);
            (delay_secs * factor).min(max_secs)
        } else {
            delay_secs
        };

        Duration::try_from_secs_f64(final_delay.max(0.0)).unwrap_or(self.max_delay)
    }

    /// Whether another attempt may follow attempt number `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
