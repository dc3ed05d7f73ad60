//! # Error Handling Framework
//!
//! Error taxonomy, structured logging and resilience primitives shared by
//! the product composite services.
//!
//! ## Features
//!
//! - Standardized error types with HTTP status mapping
//! - Structured logging through `tracing`
//! - Retry policy with exponential backoff and jitter
//! - Sliding-window circuit breaker
//! - Semaphore bulkhead
//! - A resilience facade composing all of the above
//!

pub mod types;
pub mod logging;
pub mod retry;
pub mod circuit_breaker;
pub mod bulkhead;
pub mod resilience;

// Re-export commonly used types
pub use types::{Error, ErrorKind, HttpErrorInfo, Result};
pub use logging::{init_logging, LoggingConfig};
pub use retry::{RetryConfig, RetryPolicy, RetryableError};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitHealth, CircuitState};
pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use resilience::{Resilience, ResilienceError};
