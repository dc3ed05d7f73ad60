//! # Retry Mechanism
//!
//! Retry policy with exponential backoff and jitter for transient failures
//! of a downstream call.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A trait for errors that can be retried
pub trait RetryableError {
    /// Returns true if the error is transient and the operation might succeed on retry
    fn is_transient(&self) -> bool;
}

/// Configuration for a retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: usize,

    /// Base duration for exponential backoff
    pub base_backoff: Duration,

    /// Maximum backoff time
    pub max_backoff: Duration,

    /// Jitter factor (0.0 - 1.0) to add randomness to backoff
    pub jitter_factor: f64,

    /// Deadline applied to every single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            jitter_factor: 0.1,
            attempt_timeout: Duration::from_secs(2),
        }
    }
}

/// A retry policy that determines how to handle retries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    /// Name of the policy (for metrics and logging)
    name: String,
}

impl RetryPolicy {
    /// Creates a new retry policy with the given name and configuration
    pub fn new<S: Into<String>>(name: S, config: RetryConfig) -> Self {
        Self {
            config,
            name: name.into(),
        }
    }


    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Total number of attempts this policy allows, including the first
    pub fn max_attempts(&self) -> usize {
        self.config.max_retries + 1
    }

    /// Checks whether another attempt may follow the given failed one
    ///
    /// `attempt` is 1-based: the first call is attempt 1.
    pub fn has_attempts_left(&self, attempt: usize) -> bool {
        attempt < self.max_attempts()
    }

    /// Checks whether `error` raised by `attempt` should be retried
    pub fn should_retry<E: RetryableError>(&self, error: &E, attempt: usize) -> bool {
        error.is_transient() && self.has_attempts_left(attempt)
    }

    /// Calculates the backoff to wait after the given failed attempt
    ///
    /// The raw delay is `base_backoff * 2^(attempt - 1)`, capped at
    /// `max_backoff`, then spread by `± jitter_factor`.
    pub fn calculate_backoff(&self, attempt: usize) -> Duration {
        let base_ms = self.config.base_backoff.as_millis() as f64;
        let max_ms = self.config.max_backoff.as_millis() as f64;

        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let capped_backoff = (base_ms * 2.0_f64.powi(exponent)).min(max_ms);

        // Add jitter to avoid thundering herd
        let jitter_range = capped_backoff * self.config.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped_backoff + jitter).max(0.0) as u64)
    }
}
