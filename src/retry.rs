//! Backoff policies
//!
//! Two policies share one exponential schedule:
//! - [`RetryPolicy`] drives transport-level retries inside the HTTP adapters
//! - [`PollPolicy`] spaces out status polls in the orchestrator and bounds
//!   the total wait

use std::time::Duration;

fn exponential_delay(initial: Duration, multiplier: f64, max: Duration, attempt: u32) -> f64 {
    let base = initial.as_millis() as f64 * multiplier.powi(attempt.min(64) as i32);
    base.min(max.as_millis() as f64)
}

/// Retry policy with exponential backoff
///
/// Controls how failed transport operations are retried.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    /// Default: 3
    pub max_retries: u32,

    /// Initial delay between retries
    /// Default: 100ms
    pub initial_delay: Duration,

    /// Maximum delay between retries
    /// Default: 5 seconds
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    /// Default: 2.0
    pub multiplier: f64,

    /// Add random jitter to delays
    /// Default: true
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            exponential_delay(self.initial_delay, self.multiplier, self.max_delay, attempt);

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter = rand::random::<f64>() * 0.25;
            delay_ms * (1.0 + jitter)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if we should retry after the given attempt
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Status polling schedule for one statement
///
/// Intervals grow from `initial_interval` by `multiplier` up to
/// `max_interval`. The whole wait never exceeds `max_wait`.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// First pause after the initial status check
    /// Default: 100ms
    pub initial_interval: Duration,

    /// Longest pause between two checks
    /// Default: 2 seconds
    pub max_interval: Duration,

    /// Growth factor between consecutive pauses
    /// Default: 2.0
    pub multiplier: f64,

    /// Upper bound on total time spent waiting for a terminal state
    /// Default: 5 minutes
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            multiplier: 2.0,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    /// Set the maximum total wait
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the interval bounds
    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    /// Pause before poll number `attempt + 1`
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = exponential_delay(
            self.initial_interval,
            self.multiplier,
            self.max_interval,
            attempt,
        );
        Duration::from_millis(delay_ms as u64)
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_interval.is_zero() {
            return Err("Poll initial interval must be > 0".to_string());
        }
        if self.max_interval < self.initial_interval {
            return Err("Poll max interval must be >= initial interval".to_string());
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err("Poll multiplier must be >= 1.0".to_string());
        }
        if self.max_wait.is_zero() {
            return Err("Poll max wait must be > 0".to_string());
        }
        Ok(())
    }
}
