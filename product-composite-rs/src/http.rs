//! HTTP adapters for the downstream ports
//!
//! Status codes map onto [`DownstreamFailure`]: 404 is `NotFound`, 400 and 422
//! are `InvalidInput`, everything else unsuccessful is `Other`. Transport
//! timeouts become `Timeout`. Error messages are taken from the `message`
//! field of a JSON error body when one is present.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use error_handling::{Error, Result};

use crate::downstream::{
    DownstreamFailure, DownstreamOutcome, ProductClient, RecommendationClient, ReviewClient,
};
use crate::model::{Product, ProductId, Recommendation, Review};

const USER_AGENT: &str = concat!("product-composite/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used by every adapter
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {}", e)).cause(e))
}

fn map_transport_error(service: &str, err: reqwest::Error) -> DownstreamFailure {
    if err.is_timeout() {
        DownstreamFailure::Timeout(format!("{} request timed out: {}", service, err))
    } else if err.is_decode() {
        DownstreamFailure::Other(format!("Failed to decode {} response: {}", service, err))
    } else {
        DownstreamFailure::Other(format!("{} request failed: {}", service, err))
    }
}

async fn map_error_response(service: &str, response: Response) -> DownstreamFailure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| json.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("{} responded with {}", service, status));

    match status {
        StatusCode::NOT_FOUND => DownstreamFailure::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DownstreamFailure::InvalidInput(message)
        }
        _ => {
            warn!(service = %service, status = %status, "Unexpected HTTP status: {}", message);
            DownstreamFailure::Other(message)
        }
    }
}

/// One downstream service reachable under `base_url`
#[derive(Debug, Clone)]
struct Endpoint {
    service: &'static str,
    base_url: String,
    http: Client,
}

impl Endpoint {
    fn new(service: &'static str, http: Client, base_url: String) -> Self {
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> DownstreamOutcome<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(self.service, e))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(map_error_response(self.service, response).await)
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> DownstreamOutcome<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| map_transport_error(self.service, e))
    }

    /// Decodes the body, or returns `sent` when the service answered with no body
    async fn read_created<T: DeserializeOwned>(&self, response: Response, sent: T) -> DownstreamOutcome<T> {
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(self.service, e))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(sent);
        }

        serde_json::from_slice(&body).map_err(|e| {
            DownstreamFailure::Other(format!("Failed to decode {} response: {}", self.service, e))
        })
    }

    async fn health(&self) -> DownstreamOutcome<()> {
        let url = self.url("actuator/health");
        let response = self.send(self.http.get(&url)).await?;

        let body: Option<Value> = response.json().await.ok();
        match body.as_ref().and_then(|b| b.get("status")).and_then(Value::as_str) {
            Some(status) if !status.eq_ignore_ascii_case("UP") => Err(DownstreamFailure::Other(format!(
                "{} reports status {}",
                self.service, status
            ))),
            _ => Ok(()),
        }
    }
}

/// Product service over HTTP
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    endpoint: Endpoint,
}

impl HttpProductClient {
    pub fn new<S: Into<String>>(http: Client, base_url: S) -> Self {
        Self {
            endpoint: Endpoint::new("product", http, base_url.into()),
        }
    }
}

#[async_trait]
impl ProductClient for HttpProductClient {
    async fn get_product(
        &self,
        product_id: ProductId,
        delay: u32,
        fault_percent: u32,
    ) -> DownstreamOutcome<Product> {
        let url = self.endpoint.url(&format!("product/{}", product_id));
        debug!("Will call the getProduct API on URL: {}", url);

        let request = self
            .endpoint
            .http
            .get(&url)
            .query(&[("delay", delay), ("faultPercent", fault_percent)]);

        let response = self.endpoint.send(request).await?;
        self.endpoint.read_json(response).await
    }

    async fn create_product(&self, product: Product) -> DownstreamOutcome<Product> {
        let url = self.endpoint.url("product");
        debug!(product_id = %product.product_id, "Will post a new product to URL: {}", url);

        let response = self.endpoint.send(self.endpoint.http.post(&url).json(&product)).await?;
        self.endpoint.read_created(response, product).await
    }

    async fn delete_product(&self, product_id: ProductId) -> DownstreamOutcome<()> {
        let url = self.endpoint.url(&format!("product/{}", product_id));
        debug!("Will call the deleteProduct API on URL: {}", url);

        self.endpoint.send(self.endpoint.http.delete(&url)).await?;
        Ok(())
    }

    async fn health(&self) -> DownstreamOutcome<()> {
        self.endpoint.health().await
    }
}

/// Recommendation service over HTTP
#[derive(Debug, Clone)]
pub struct HttpRecommendationClient {
    endpoint: Endpoint,
}

impl HttpRecommendationClient {
    pub fn new<S: Into<String>>(http: Client, base_url: S) -> Self {
        Self {
            endpoint: Endpoint::new("recommendation", http, base_url.into()),
        }
    }
}

#[async_trait]
impl RecommendationClient for HttpRecommendationClient {
    async fn get_recommendations(&self, product_id: ProductId) -> DownstreamOutcome<Vec<Recommendation>> {
        let url = self.endpoint.url("recommendation");
        debug!(product_id = %product_id, "Will call the getRecommendations API on URL: {}", url);

        let request = self.endpoint.http.get(&url).query(&[("productId", product_id)]);
        let response = self.endpoint.send(request).await?;
        self.endpoint.read_json(response).await
    }

    async fn create_recommendation(&self, recommendation: Recommendation) -> DownstreamOutcome<Recommendation> {
        let url = self.endpoint.url("recommendation");
        debug!(
            product_id = %recommendation.product_id,
            recommendation_id = %recommendation.recommendation_id,
            "Will post a new recommendation to URL: {}", url
        );

        let response = self
            .endpoint
            .send(self.endpoint.http.post(&url).json(&recommendation))
            .await?;
        self.endpoint.read_created(response, recommendation).await
    }

    async fn delete_recommendations(&self, product_id: ProductId) -> DownstreamOutcome<()> {
        let url = self.endpoint.url("recommendation");
        debug!(product_id = %product_id, "Will call the deleteRecommendations API on URL: {}", url);

        let request = self.endpoint.http.delete(&url).query(&[("productId", product_id)]);
        self.endpoint.send(request).await?;
        Ok(())
    }

    async fn health(&self) -> DownstreamOutcome<()> {
        self.endpoint.health().await
    }
}

/// Review service over HTTP
#[derive(Debug, Clone)]
pub struct HttpReviewClient {
    endpoint: Endpoint,
}

impl HttpReviewClient {
    pub fn new<S: Into<String>>(http: Client, base_url: S) -> Self {
        Self {
            endpoint: Endpoint::new("review", http, base_url.into()),
        }
    }
}

#[async_trait]
impl ReviewClient for HttpReviewClient {
    async fn get_reviews(&self, product_id: ProductId) -> DownstreamOutcome<Vec<Review>> {
        let url = self.endpoint.url("review");
        debug!(product_id = %product_id, "Will call the getReviews API on URL: {}", url);

        let request = self.endpoint.http.get(&url).query(&[("productId", product_id)]);
        let response = self.endpoint.send(request).await?;
        self.endpoint.read_json(response).await
    }

    async fn create_review(&self, review: Review) -> DownstreamOutcome<Review> {
        let url = self.endpoint.url("review");
        debug!(
            product_id = %review.product_id,
            review_id = %review.review_id,
            "Will post a new review to URL: {}", url
        );

        let response = self.endpoint.send(self.endpoint.http.post(&url).json(&review)).await?;
        self.endpoint.read_created(response, review).await
    }

    async fn delete_reviews(&self, product_id: ProductId) -> DownstreamOutcome<()> {
        let url = self.endpoint.url("review");
        debug!(product_id = %product_id, "Will call the deleteReviews API on URL: {}", url);

        let request = self.endpoint.http.delete(&url).query(&[("productId", product_id)]);
        self.endpoint.send(request).await?;
        Ok(())
    }

    async fn health(&self) -> DownstreamOutcome<()> {
        self.endpoint.health().await
    }
}
