//! # Bulkhead
//!
//! Bounds the number of in-flight calls to one downstream. Callers wait for a
//! permit instead of being rejected.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::types::{Error, Result};

/// Concurrency limiter for a single downstream
#[derive(Debug, Clone)]
pub struct Bulkhead {
    name: String,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
}

/// Permit held for the duration of one call, released on drop
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

impl Bulkhead {
    /// Creates a bulkhead admitting at most `max_concurrent` calls at once
    pub fn new<S: Into<String>>(name: S, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            name: name.into(),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Waits for a free slot
    pub async fn acquire(&self) -> Result<BulkheadPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::unavailable(format!("Bulkhead '{}' closed: {}", self.name, e)))?;

        trace!(bulkhead = %self.name, in_flight = %self.in_flight(), "Bulkhead permit acquired");

        Ok(BulkheadPermit { _permit: permit })
    }

    /// Stops admitting calls; pending and future acquisitions fail
    pub fn close(&self) {
        self.semaphore.close();
    }
}
