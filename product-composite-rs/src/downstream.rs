//! Ports to the product, recommendation and review services
//!
//! Every operation answers with a [`DownstreamOutcome`]. The HTTP adapters in
//! [`crate::http`] implement these traits; tests substitute mocks or fakes.

use std::sync::Arc;

use async_trait::async_trait;
use error_handling::{ResilienceError, RetryableError};
use thiserror::Error;

use crate::model::{Product, ProductId, Recommendation, Review};

/// Failure reported by a downstream call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamFailure {
    #[error("Circuit breaker '{circuit}' is open")]
    CircuitOpen { circuit: String },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The call site stopped admitting calls
    #[error("Bulkhead '{bulkhead}' is closed")]
    BulkheadClosed { bulkhead: String },

    /// The call did not complete before its deadline
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

/// Result of a single downstream call
pub type DownstreamOutcome<T> = Result<T, DownstreamFailure>;

impl DownstreamFailure {
    /// True for the outcomes the product fallback masks
    pub fn is_resilience_rejection(&self) -> bool {
        matches!(
            self,
            DownstreamFailure::CircuitOpen { .. } | DownstreamFailure::RetriesExhausted { .. }
        )
    }
}

impl RetryableError for DownstreamFailure {
    fn is_transient(&self) -> bool {
        matches!(self, DownstreamFailure::Timeout(_) | DownstreamFailure::Other(_))
    }
}

impl From<ResilienceError<DownstreamFailure>> for DownstreamFailure {
    fn from(err: ResilienceError<DownstreamFailure>) -> Self {
        match err {
            ResilienceError::CircuitOpen { circuit } => DownstreamFailure::CircuitOpen { circuit },
            ResilienceError::RetriesExhausted { attempts, last_error } => {
                DownstreamFailure::RetriesExhausted { attempts, last_error }
            }
            ResilienceError::Permanent(failure) => failure,
            ResilienceError::BulkheadClosed { bulkhead } => DownstreamFailure::BulkheadClosed { bulkhead },
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductClient: Send + Sync {
    /// Fetches one product; `delay` (seconds) and `fault_percent` are forwarded verbatim
    async fn get_product(
        &self,
        product_id: ProductId,
        delay: u32,
        fault_percent: u32,
    ) -> DownstreamOutcome<Product>;

    async fn create_product(&self, product: Product) -> DownstreamOutcome<Product>;

    /// Deleting an absent product succeeds
    async fn delete_product(&self, product_id: ProductId) -> DownstreamOutcome<()>;

    async fn health(&self) -> DownstreamOutcome<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommendationClient: Send + Sync {
    /// Recommendations in the order the service returned them
    async fn get_recommendations(&self, product_id: ProductId) -> DownstreamOutcome<Vec<Recommendation>>;

    async fn create_recommendation(&self, recommendation: Recommendation) -> DownstreamOutcome<Recommendation>;

    async fn delete_recommendations(&self, product_id: ProductId) -> DownstreamOutcome<()>;

    async fn health(&self) -> DownstreamOutcome<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewClient: Send + Sync {
    /// Reviews in the order the service returned them
    async fn get_reviews(&self, product_id: ProductId) -> DownstreamOutcome<Vec<Review>>;

    async fn create_review(&self, review: Review) -> DownstreamOutcome<Review>;

    async fn delete_reviews(&self, product_id: ProductId) -> DownstreamOutcome<()>;

    async fn health(&self) -> DownstreamOutcome<()>;
}

/// The three downstream ports, shared across requests
#[derive(Clone)]
pub struct DownstreamClients {
    pub product: Arc<dyn ProductClient>,
    pub recommendation: Arc<dyn RecommendationClient>,
    pub review: Arc<dyn ReviewClient>,
}

impl DownstreamClients {
    pub fn new(
        product: Arc<dyn ProductClient>,
        recommendation: Arc<dyn RecommendationClient>,
        review: Arc<dyn ReviewClient>,
    ) -> Self {
        Self {
            product,
            recommendation,
            review,
        }
    }
}
