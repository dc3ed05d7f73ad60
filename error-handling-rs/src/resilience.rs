//! # Resilience Facade
//!
//! Composes bulkhead, circuit breaker and retry around a single downstream
//! call site. One instance is shared per call site through `Arc`.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use metrics::counter;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::bulkhead::Bulkhead;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitHealth, CircuitState};
use crate::retry::{RetryConfig, RetryPolicy, RetryableError};

/// Outcome of a call that did not produce a value
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The breaker rejected the call without invoking the operation
    #[error("Circuit breaker '{circuit}' is open")]
    CircuitOpen { circuit: String },

    /// Every attempt failed transiently
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// A non-transient failure, passed through untouched
    #[error("{0}")]
    Permanent(E),

    #[error("Bulkhead '{bulkhead}' is closed")]
    BulkheadClosed { bulkhead: String },
}

/// Returns an unresolved half-open probe permit if the attempt is dropped
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self { breaker, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.record_ignored();
        }
    }
}

/// A unified resilience facade for one downstream call site
#[derive(Debug)]
pub struct Resilience {
    name: String,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreaker,
    bulkhead: Option<Bulkhead>,
}

impl Resilience {
    /// Creates a facade with the given retry and breaker configuration
    pub fn new<S: Into<String>>(
        name: S,
        retry_config: RetryConfig,
        circuit_breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let name = name.into();
        Self {
            retry: RetryPolicy::new(name.clone(), retry_config),
            circuit_breaker: CircuitBreaker::new(name.clone(), circuit_breaker_config),
            bulkhead: None,
            name,
        }
    }

    /// Bounds concurrent executions with the given bulkhead
    pub fn with_bulkhead(mut self, bulkhead: Bulkhead) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes `operation` with every configured resilience pattern
    ///
    /// The breaker is consulted before each attempt. Transient failures and
    /// attempt timeouts are recorded and retried with backoff. Non-transient
    /// failures return immediately and leave the breaker window untouched.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + Display,
    {
        let _permit = match &self.bulkhead {
            Some(bulkhead) => Some(bulkhead.acquire().await.map_err(|_| {
                ResilienceError::BulkheadClosed {
                    bulkhead: bulkhead.name().to_string(),
                }
            })?),
            None => None,
        };

        let attempt_timeout = self.retry.config().attempt_timeout;
        let mut attempt = 0;

        loop {
            attempt += 1;

            if !self.circuit_breaker.try_acquire() {
                return Err(ResilienceError::CircuitOpen {
                    circuit: self.name.clone(),
                });
            }

            counter!("retry.attempts", 1, "policy" => self.name.clone());

            let mut guard = ProbeGuard::new(&self.circuit_breaker);
            let started = Instant::now();
            let outcome = timeout(attempt_timeout, operation()).await;
            guard.disarm();

            let last_error = match outcome {
                Ok(Ok(value)) => {
                    self.circuit_breaker.record_success(started.elapsed());
                    if attempt > 1 {
                        debug!(policy = %self.name, attempt = %attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Ok(Err(err)) if !err.is_transient() => {
                    self.circuit_breaker.record_ignored();
                    return Err(ResilienceError::Permanent(err));
                }
                Ok(Err(err)) => {
                    self.circuit_breaker.record_failure();
                    err.to_string()
                }
                Err(_) => {
                    self.circuit_breaker.record_failure();
                    format!("Attempt timed out after {}ms", attempt_timeout.as_millis())
                }
            };

            if !self.retry.has_attempts_left(attempt) {
                counter!("retry.exhausted", 1, "policy" => self.name.clone());
                warn!(
                    policy = %self.name,
                    attempts = %attempt,
                    error = %last_error,
                    "Retries exhausted"
                );
                return Err(ResilienceError::RetriesExhausted {
                    attempts: attempt,
                    last_error,
                });
            }

            let backoff = self.retry.calculate_backoff(attempt);
            debug!(
                policy = %self.name,
                attempt = %attempt,
                backoff_ms = %backoff.as_millis(),
                error = %last_error,
                "Transient failure, retrying"
            );
            sleep(backoff).await;
        }
    }

    /// Gets the current state of the circuit breaker
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Gets health metrics for the circuit breaker
    pub fn circuit_health(&self) -> CircuitHealth {
        self.circuit_breaker.health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl RetryableError for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_retry(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter_factor: 0.0,
            attempt_timeout: Duration::from_millis(50),
        }
    }

    fn breaker(minimum_request_threshold: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            window_size: 10,
            error_threshold: 0.5,
            minimum_request_threshold,
            reset_timeout: Duration::from_secs(60),
            half_open_success_threshold: 1,
            half_open_max_calls: 1,
            slow_call_threshold: None,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let resilience = Resilience::new("test", fast_retry(2), breaker(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let result = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried_or_recorded() {
        let resilience = Resilience::new("test", fast_retry(2), breaker(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Permanent)
                }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::Permanent(TestError::Permanent))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resilience.circuit_state(), CircuitState::Closed);
        assert_eq!(resilience.circuit_health().request_count, 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let resilience = Resilience::new("test", fast_retry(2), breaker(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            })
            .await;

        match result {
            Err(ResilienceError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "Transient");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_transient() {
        let resilience = Resilience::new("test", fast_retry(1), breaker(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), ResilienceError<TestError>> = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
            })
            .await;

        match result {
            Err(ResilienceError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_calling() {
        let resilience = Resilience::new("test", fast_retry(0), breaker(1));

        let first: Result<(), _> = resilience.execute(|| async { Err(TestError::Transient) }).await;
        assert!(matches!(first, Err(ResilienceError::RetriesExhausted { .. })));
        assert_eq!(resilience.circuit_state(), CircuitState::Open);

        let calls = Arc::new(AtomicUsize::new(0));
        let second: Result<(), _> = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                }
            })
            .await;

        match second {
            Err(ResilienceError::CircuitOpen { circuit }) => assert_eq!(circuit, "test"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_circuit_opening_mid_retry_short_circuits() {
        let resilience = Resilience::new("test", fast_retry(5), breaker(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = resilience
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_success_still_returns_value() {
        let config = CircuitBreakerConfig {
            slow_call_threshold: Some(Duration::from_millis(5)),
            ..breaker(1)
        };
        let resilience = Resilience::new("test", fast_retry(0), config);

        let result: Result<u32, ResilienceError<TestError>> = resilience
            .execute(|| async {
                sleep(Duration::from_millis(20)).await;
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(resilience.circuit_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_bulkhead_limits_executions() {
        let resilience =
            Arc::new(Resilience::new("test", fast_retry(0), breaker(100)).with_bulkhead(Bulkhead::new("test", 2)));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let resilience = Arc::clone(&resilience);
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    resilience
                        .execute(|| {
                            let current = Arc::clone(&current);
                            let peak = Arc::clone(&peak);
                            async move {
                                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                sleep(Duration::from_millis(5)).await;
                                current.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, TestError>(())
                            }
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
