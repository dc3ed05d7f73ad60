//! # Circuit Breaker
//!
//! A count-based sliding-window circuit breaker guarding a single call site.
//!
//! - Closed: calls flow, outcomes are recorded in the window
//! - Open: calls are rejected until `reset_timeout` has elapsed
//! - Half-Open: a bounded number of probe calls decide whether to close again

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, requests allowed
    Closed,
    /// Failing, requests blocked
    Open,
    /// Testing recovery, limited requests allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF-OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result tracking for a sliding window
#[derive(Debug)]
struct ResultWindow {
    /// Size of the sliding window
    size: usize,
    /// Results in the window (true = success, false = failure)
    results: VecDeque<bool>,
    failure_count: usize,
}

impl ResultWindow {
    fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            results: VecDeque::with_capacity(size.max(1)),
            failure_count: 0,
        }
    }

    fn add_result(&mut self, success: bool) {
        if self.results.len() >= self.size {
            if let Some(false) = self.results.pop_front() {
                self.failure_count = self.failure_count.saturating_sub(1);
            }
        }

        self.results.push_back(success);
        if !success {
            self.failure_count += 1;
        }
    }

    /// Gets the current failure rate (0.0 to 1.0)
    fn failure_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.failure_count as f64 / self.results.len() as f64
        }
    }

    fn total(&self) -> usize {
        self.results.len()
    }

    fn failure_count(&self) -> usize {
        self.failure_count
    }

    fn success_count(&self) -> usize {
        self.results.len() - self.failure_count
    }

    fn clear(&mut self) {
        self.results.clear();
        self.failure_count = 0;
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Size of the sliding window for error tracking
    pub window_size: usize,
    /// Error rate that trips the circuit (0.0 to 1.0)
    pub error_threshold: f64,
    /// Minimum number of recorded calls before the error rate applies
    pub minimum_request_threshold: usize,
    /// Time to keep the circuit open before admitting probes
    pub reset_timeout: Duration,
    /// Successful probes needed to close the circuit from half-open
    pub half_open_success_threshold: usize,
    /// Maximum number of probes admitted while half-open
    pub half_open_max_calls: usize,
    /// Successful calls slower than this are recorded as failures
    pub slow_call_threshold: Option<Duration>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            error_threshold: 0.5,
            minimum_request_threshold: 5,
            reset_timeout: Duration::from_secs(10),
            half_open_success_threshold: 3,
            half_open_max_calls: 3,
            slow_call_threshold: None,
        }
    }
}

/// Point-in-time view of a circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitHealth {
    pub state: CircuitState,
    /// Current error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Calls in the tracking window
    pub request_count: usize,
    pub failure_count: usize,
    pub success_count: usize,
    /// Time since the last state transition
    pub time_in_state: Duration,
    /// Remaining time before an open circuit admits probes
    pub estimated_time_to_retry: Option<Duration>,
}

#[derive(Debug)]
struct CircuitStats {
    state: CircuitState,
    last_state_change: Instant,
    window: ResultWindow,
    /// Successful probes while half-open
    consecutive_successes: usize,
    /// Probe permits still available while half-open
    half_open_permits: usize,
}

/// Thread-safe circuit breaker for one call site
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Name of this circuit breaker (for metrics and logging)
    name: String,
    config: CircuitBreakerConfig,
    stats: Mutex<CircuitStats>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given name and configuration
    ///
    /// At least one probe is admitted while half-open, and the success
    /// threshold never exceeds the probe budget.
    pub fn new<S: Into<String>>(name: S, mut config: CircuitBreakerConfig) -> Self {
        config.half_open_max_calls = config.half_open_max_calls.max(1);
        config.half_open_success_threshold = config
            .half_open_success_threshold
            .clamp(1, config.half_open_max_calls);

        let stats = CircuitStats {
            state: CircuitState::Closed,
            last_state_change: Instant::now(),
            window: ResultWindow::new(config.window_size),
            consecutive_successes: 0,
            half_open_permits: config.half_open_max_calls,
        };

        Self {
            name: name.into(),
            config,
            stats: Mutex::new(stats),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CircuitStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks the circuit for permission to issue one call
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open and
    /// hands out a probe permit.
    pub fn try_acquire(&self) -> bool {
        let mut stats = self.lock();

        match stats.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = stats.last_state_change.elapsed();
                if elapsed >= self.config.reset_timeout {
                    self.transition(&mut stats, CircuitState::HalfOpen);
                    self.take_probe_permit(&mut stats)
                } else {
                    debug!(
                        circuit = %self.name,
                        remaining_ms = %self.config.reset_timeout.saturating_sub(elapsed).as_millis(),
                        "Circuit open, request rejected"
                    );
                    counter!("circuit_breaker.rejected", 1, "circuit" => self.name.clone());
                    false
                }
            }
            CircuitState::HalfOpen => self.take_probe_permit(&mut stats),
        }
    }

    fn take_probe_permit(&self, stats: &mut CircuitStats) -> bool {
        if stats.half_open_permits > 0 {
            stats.half_open_permits -= 1;
            true
        } else {
            counter!("circuit_breaker.rejected", 1, "circuit" => self.name.clone());
            false
        }
    }

    /// Records the outcome of a permitted call that succeeded
    pub fn record_success(&self, elapsed: Duration) {
        let slow = self
            .config
            .slow_call_threshold
            .map_or(false, |threshold| elapsed > threshold);

        if slow {
            debug!(
                circuit = %self.name,
                elapsed_ms = %elapsed.as_millis(),
                "Slow call recorded as failure"
            );
            self.record_failure();
            return;
        }

        let mut stats = self.lock();
        stats.window.add_result(true);

        if stats.state == CircuitState::HalfOpen {
            stats.consecutive_successes += 1;

            if stats.consecutive_successes >= self.config.half_open_success_threshold {
                info!(
                    circuit = %self.name,
                    successes = %stats.consecutive_successes,
                    "Circuit CLOSED: Service recovered"
                );
                self.transition(&mut stats, CircuitState::Closed);
            }
        }
    }

    /// Records the outcome of a permitted call that failed transiently
    pub fn record_failure(&self) {
        let mut stats = self.lock();
        stats.window.add_result(false);

        match stats.state {
            CircuitState::Closed => {
                let threshold_reached = stats.window.total() >= self.config.minimum_request_threshold
                    && stats.window.failure_rate() >= self.config.error_threshold;

                if threshold_reached {
                    warn!(
                        circuit = %self.name,
                        error_rate = %format!("{:.2}%", stats.window.failure_rate() * 100.0),
                        failure_count = %stats.window.failure_count(),
                        "Circuit OPEN: Failure threshold exceeded"
                    );
                    self.transition(&mut stats, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                warn!(circuit = %self.name, "Circuit REOPENED: Failed in half-open state");
                self.transition(&mut stats, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Returns a permit for a call whose outcome must not count either way
    pub fn record_ignored(&self) {
        let mut stats = self.lock();
        if stats.state == CircuitState::HalfOpen {
            stats.half_open_permits = (stats.half_open_permits + 1).min(self.config.half_open_max_calls);
        }
    }

    fn transition(&self, stats: &mut CircuitStats, to: CircuitState) {
        let from = stats.state;
        stats.state = to;
        stats.last_state_change = Instant::now();
        stats.consecutive_successes = 0;

        match to {
            CircuitState::HalfOpen => {
                stats.half_open_permits = self.config.half_open_max_calls;
                info!(
                    circuit = %self.name,
                    max_test_calls = %stats.half_open_permits,
                    "Circuit HALF-OPEN: Testing service recovery"
                );
            }
            CircuitState::Closed => stats.window.clear(),
            CircuitState::Open => {}
        }

        counter!(
            "circuit_breaker.transitions",
            1,
            "circuit" => self.name.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        );
    }

    /// Gets the current state of the circuit
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Gets health metrics for the circuit
    pub fn health(&self) -> CircuitHealth {
        let stats = self.lock();
        let time_in_state = stats.last_state_change.elapsed();

        CircuitHealth {
            state: stats.state,
            error_rate: stats.window.failure_rate(),
            request_count: stats.window.total(),
            failure_count: stats.window.failure_count(),
            success_count: stats.window.success_count(),
            time_in_state,
            estimated_time_to_retry: if stats.state == CircuitState::Open {
                Some(self.config.reset_timeout.saturating_sub(time_in_state))
            } else {
                None
            },
        }
    }

    /// Resets the circuit to closed state
    pub fn reset(&self) {
        let mut stats = self.lock();
        info!(circuit = %self.name, previous_state = %stats.state, "Circuit manually reset to CLOSED state");
        self.transition(&mut stats, CircuitState::Closed);
    }
}
