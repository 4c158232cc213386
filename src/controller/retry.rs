//! Retry policy for conflicting updates

use std::time::Duration;

/// Jittered exponential backoff with a fixed attempt budget.
///
/// The default matches the API machinery's default conflict-retry policy:
/// five attempts, 10ms apart, 10% jitter.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub steps: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier for each subsequent retry
    pub factor: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steps: 5,
            initial_delay: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy without any backoff, for deterministic tests
    pub fn immediate(steps: u32) -> Self {
        Self {
            steps,
            initial_delay: Duration::ZERO,
            factor: 1.0,
            jitter: 0.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Same policy with a different attempt budget
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Number of attempts actually made; at least one
    pub fn attempts(&self) -> u32 {
        self.steps.max(1)
    }

    /// Calculate the backoff delay before retry number `retry` (0-based)
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base_delay_secs = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        if !base_delay_secs.is_finite() {
            return self.max_delay;
        }

        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_delay)
    }
}
