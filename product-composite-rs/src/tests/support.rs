//! Shared fixtures for the orchestrator tests

use std::sync::Arc;
use std::time::Duration;

use error_handling::{CircuitBreakerConfig, RetryConfig};

use crate::auth::{AuthorizationGate, ScopeGate};
use crate::config::CompositeConfig;
use crate::downstream::{DownstreamClients, ProductClient, RecommendationClient, ReviewClient};
use crate::model::{Product, Recommendation, Review};
use crate::service::ProductCompositeService;

pub const COMPOSITE_ADDRESS: &str = "composite-test:7000";

/// Fast retries and a breaker that needs five samples to trip
pub fn test_config() -> CompositeConfig {
    let call_timeout = Duration::from_millis(500);
    CompositeConfig {
        service_address: COMPOSITE_ADDRESS.to_string(),
        call_timeout,
        max_concurrent_calls: 4,
        retry: RetryConfig {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter_factor: 0.0,
            attempt_timeout: call_timeout,
        },
        circuit_breaker: CircuitBreakerConfig {
            window_size: 5,
            error_threshold: 0.5,
            minimum_request_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_success_threshold: 1,
            half_open_max_calls: 1,
            slow_call_threshold: None,
        },
        ..CompositeConfig::default()
    }
}

pub fn service_with<P, R, V>(product: P, recommendation: R, review: V) -> ProductCompositeService
where
    P: ProductClient + 'static,
    R: RecommendationClient + 'static,
    V: ReviewClient + 'static,
{
    service_with_gate(product, recommendation, review, ScopeGate::default())
}

pub fn service_with_gate<P, R, V, G>(product: P, recommendation: R, review: V, gate: G) -> ProductCompositeService
where
    P: ProductClient + 'static,
    R: RecommendationClient + 'static,
    V: ReviewClient + 'static,
    G: AuthorizationGate + 'static,
{
    let clients = DownstreamClients::new(Arc::new(product), Arc::new(recommendation), Arc::new(review));
    ProductCompositeService::new(&test_config(), clients, Arc::new(gate))
}

pub fn product(product_id: i32) -> Product {
    Product {
        product_id,
        name: format!("name-{}", product_id),
        weight: product_id * 10,
        service_address: "product-1:7001".to_string(),
    }
}

pub fn recommendation(product_id: i32, recommendation_id: i32, address: &str) -> Recommendation {
    Recommendation {
        product_id,
        recommendation_id,
        author: format!("author-{}", recommendation_id),
        rate: recommendation_id % 5,
        content: format!("content-{}", recommendation_id),
        service_address: address.to_string(),
    }
}

pub fn review(product_id: i32, review_id: i32, address: &str) -> Review {
    Review {
        product_id,
        review_id,
        author: format!("author-{}", review_id),
        subject: format!("subject-{}", review_id),
        content: format!("content-{}", review_id),
        service_address: address.to_string(),
    }
}
