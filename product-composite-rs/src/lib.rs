//! # Product Composite
//!
//! Composes a product aggregate from the product, recommendation and review
//! services. Reads fan out concurrently; the product call runs through a
//! circuit breaker and retry policy and falls back to a placeholder product
//! when rejected. Writes are sequenced across the services without rollback
//! and gated on the caller's scopes.

pub mod aggregate;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod downstream;
pub mod fallback;
pub mod health;
pub mod http;
pub mod model;
pub mod service;

#[cfg(test)]
mod tests;

pub use auth::{AuthorizationGate, CallerContext, Scope, ScopeGate};
pub use config::CompositeConfig;
pub use downstream::{
    DownstreamClients, DownstreamFailure, DownstreamOutcome, ProductClient, RecommendationClient,
    ReviewClient,
};
pub use health::{DownstreamHealth, HealthReport, HealthStatus};
pub use model::{
    Product, ProductAggregate, ProductId, Recommendation, RecommendationSummary, Review,
    ReviewSummary, ServiceAddresses,
};
pub use service::ProductCompositeService;

/// Initializes logging, then loads configuration and wires the HTTP-backed service
///
/// Logging comes first so warnings about malformed settings are not lost.
pub fn init_from_env() -> error_handling::Result<ProductCompositeService> {
    error_handling::init_logging(Some(CompositeConfig::logging_from_env()))?;
    let config = CompositeConfig::from_env()?;
    ProductCompositeService::from_config(&config)
}
