//! The product composite orchestrator
//!
//! Reads fan out to the three downstreams concurrently and are merged into a
//! [`ProductAggregate`]. Only the product call is guarded by the resilience
//! facade and has a fallback. Writes run strictly in sequence and stop at the
//! first failure; nothing already written is compensated.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use error_handling::{Bulkhead, BulkheadPermit, Error, Resilience, Result};

use crate::aggregate::build_aggregate;
use crate::auth::{AuthorizationGate, CallerContext, Scope, ScopeGate};
use crate::classifier::classify_failure;
use crate::config::CompositeConfig;
use crate::downstream::{DownstreamClients, DownstreamFailure, DownstreamOutcome};
use crate::fallback::product_fallback;
use crate::health::DownstreamHealth;
use crate::http::{build_http_client, HttpProductClient, HttpRecommendationClient, HttpReviewClient};
use crate::model::{Product, ProductAggregate, ProductId, Recommendation, Review};

const COMPOSITE_PATH: &str = "/product-composite";

fn aggregate_path(product_id: ProductId) -> String {
    format!("{}/{}", COMPOSITE_PATH, product_id)
}

pub struct ProductCompositeService {
    clients: DownstreamClients,
    product_resilience: Arc<Resilience>,
    recommendation_bulkhead: Bulkhead,
    review_bulkhead: Bulkhead,
    gate: Arc<dyn AuthorizationGate>,
    service_address: String,
    call_timeout: Duration,
}

impl ProductCompositeService {
    /// Wires the orchestrator from configuration around the given ports
    pub fn new(config: &CompositeConfig, clients: DownstreamClients, gate: Arc<dyn AuthorizationGate>) -> Self {
        let product_resilience = Resilience::new("product", config.retry.clone(), config.circuit_breaker.clone())
            .with_bulkhead(Bulkhead::new("product", config.max_concurrent_calls));

        Self {
            clients,
            product_resilience: Arc::new(product_resilience),
            recommendation_bulkhead: Bulkhead::new("recommendation", config.max_concurrent_calls),
            review_bulkhead: Bulkhead::new("review", config.max_concurrent_calls),
            gate,
            service_address: config.service_address.clone(),
            call_timeout: config.call_timeout,
        }
    }

    /// Builds HTTP adapters for every downstream and the default scope gate
    pub fn from_config(config: &CompositeConfig) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(config.call_timeout)?;

        let clients = DownstreamClients::new(
            Arc::new(HttpProductClient::new(http.clone(), config.product_url.as_str())),
            Arc::new(HttpRecommendationClient::new(http.clone(), config.recommendation_url.as_str())),
            Arc::new(HttpReviewClient::new(http, config.review_url.as_str())),
        );

        info!(
            product = %config.product_url,
            recommendation = %config.recommendation_url,
            review = %config.review_url,
            "Product composite wired to downstream services"
        );

        Ok(Self::new(config, clients, Arc::new(ScopeGate::default())))
    }

    pub fn product_resilience(&self) -> &Arc<Resilience> {
        &self.product_resilience
    }

    pub fn service_address(&self) -> &str {
        &self.service_address
    }

    /// Health surface over the same ports and breaker this service uses
    pub fn health(&self) -> DownstreamHealth {
        DownstreamHealth::new(self.clients.clone(), Arc::clone(&self.product_resilience))
    }

    /// Reads the aggregate for `product_id`
    ///
    /// `delay` and `fault_percent` are forwarded to the product service
    /// untouched. Dropping the returned future cancels all in-flight calls.
    pub async fn get_aggregate(
        &self,
        product_id: ProductId,
        delay: u32,
        fault_percent: u32,
    ) -> Result<ProductAggregate> {
        let path = aggregate_path(product_id);
        debug!(product_id = %product_id, "Will get composite product info");

        if product_id < 1 {
            return Err(Error::invalid_input(format!("Invalid productId: {}", product_id))
                .path(path)
                .context("productId", product_id));
        }

        let joined = tokio::try_join!(
            self.fetch_product(product_id, delay, fault_percent, &path),
            self.fetch_recommendations(product_id, &path),
            self.fetch_reviews(product_id, &path),
        );

        match joined {
            Ok((product, recommendations, reviews)) => {
                Ok(build_aggregate(&product, &recommendations, &reviews, &self.service_address))
            }
            Err(err) => {
                warn!(product_id = %product_id, "getCompositeProduct failed: {}", err);
                Err(err.context("productId", product_id))
            }
        }
    }

    async fn fetch_product(
        &self,
        product_id: ProductId,
        delay: u32,
        fault_percent: u32,
        path: &str,
    ) -> Result<Product> {
        let outcome: DownstreamOutcome<Product> = self
            .product_resilience
            .execute(|| self.clients.product.get_product(product_id, delay, fault_percent))
            .await
            .map_err(DownstreamFailure::from);

        let product = match outcome {
            Err(failure) if failure.is_resilience_rejection() => {
                warn!(product_id = %product_id, "Creating a fail-fast fallback product: {}", failure);
                product_fallback(product_id, &self.service_address)
            }
            other => other,
        };

        product.map_err(|failure| classify_failure(&failure, path).service("product"))
    }

    async fn fetch_recommendations(&self, product_id: ProductId, path: &str) -> Result<Vec<Recommendation>> {
        let _permit = self.admit(&self.recommendation_bulkhead, path).await?;

        self.with_deadline("recommendation", self.clients.recommendation.get_recommendations(product_id))
            .await
            .map_err(|failure| classify_failure(&failure, path).service("recommendation"))
    }

    async fn fetch_reviews(&self, product_id: ProductId, path: &str) -> Result<Vec<Review>> {
        let _permit = self.admit(&self.review_bulkhead, path).await?;

        self.with_deadline("review", self.clients.review.get_reviews(product_id))
            .await
            .map_err(|failure| classify_failure(&failure, path).service("review"))
    }

    async fn admit(&self, bulkhead: &Bulkhead, path: &str) -> Result<BulkheadPermit> {
        bulkhead.acquire().await.map_err(|_| {
            let failure = DownstreamFailure::BulkheadClosed {
                bulkhead: bulkhead.name().to_string(),
            };
            classify_failure(&failure, path).service(bulkhead.name())
        })
    }

    async fn with_deadline<T, F>(&self, service: &str, call: F) -> DownstreamOutcome<T>
    where
        F: Future<Output = DownstreamOutcome<T>>,
    {
        match timeout(self.call_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DownstreamFailure::Timeout(format!(
                "{} call did not complete within {}ms",
                service,
                self.call_timeout.as_millis()
            ))),
        }
    }

    fn authorize(&self, caller: &CallerContext, scope: Scope, path: &str) -> Result<()> {
        if self.gate.check(caller, scope) {
            return Ok(());
        }

        warn!(subject = %caller.display_subject(), scope = %scope, "Authorization denied");
        Err(Error::unauthorized(format!(
            "Caller '{}' lacks scope '{}'",
            caller.display_subject(),
            scope
        ))
        .path(path)
        .context("requiredScope", scope.as_str()))
    }

    /// Creates the product, then each recommendation and each review in input order
    ///
    /// The first failure is returned; earlier creates stay in place.
    pub async fn create_aggregate(&self, caller: &CallerContext, body: &ProductAggregate) -> Result<()> {
        let path = COMPOSITE_PATH;
        self.authorize(caller, Scope::Read, path)?;

        let product_id = body.product_id;
        debug!(product_id = %product_id, "createCompositeProduct: creates a new composite entity");

        let product = Product {
            product_id,
            name: body.name.clone(),
            weight: body.weight,
            service_address: String::new(),
        };
        self.with_deadline("product", self.clients.product.create_product(product))
            .await
            .map_err(|failure| self.write_failed(&failure, path, "product", product_id))?;

        for summary in &body.recommendations {
            let recommendation = summary.to_recommendation(product_id);
            self.with_deadline(
                "recommendation",
                self.clients.recommendation.create_recommendation(recommendation),
            )
            .await
            .map_err(|failure| self.write_failed(&failure, path, "recommendation", product_id))?;
        }

        for summary in &body.reviews {
            let review = summary.to_review(product_id);
            self.with_deadline("review", self.clients.review.create_review(review))
                .await
                .map_err(|failure| self.write_failed(&failure, path, "review", product_id))?;
        }

        debug!(product_id = %product_id, "createCompositeProduct: composite entities created");
        Ok(())
    }

    /// Deletes the product, its recommendations and its reviews, in that order
    ///
    /// Deleting an absent product succeeds. The first failure is returned;
    /// earlier deletes are not undone.
    pub async fn delete_aggregate(&self, caller: &CallerContext, product_id: ProductId) -> Result<()> {
        let path = aggregate_path(product_id);
        self.authorize(caller, Scope::Write, &path)?;

        debug!(product_id = %product_id, "deleteCompositeProduct: deletes a product aggregate");

        self.with_deadline("product", self.clients.product.delete_product(product_id))
            .await
            .map_err(|failure| self.write_failed(&failure, &path, "product", product_id))?;

        self.with_deadline(
            "recommendation",
            self.clients.recommendation.delete_recommendations(product_id),
        )
        .await
        .map_err(|failure| self.write_failed(&failure, &path, "recommendation", product_id))?;

        self.with_deadline("review", self.clients.review.delete_reviews(product_id))
            .await
            .map_err(|failure| self.write_failed(&failure, &path, "review", product_id))?;

        debug!(product_id = %product_id, "deleteCompositeProduct: aggregate entities deleted");
        Ok(())
    }

    fn write_failed(&self, failure: &DownstreamFailure, path: &str, service: &str, product_id: ProductId) -> Error {
        warn!(
            product_id = %product_id,
            service = %service,
            "Composite write aborted: {}",
            failure
        );
        classify_failure(failure, path)
            .service(service)
            .context("productId", product_id)
    }
}
