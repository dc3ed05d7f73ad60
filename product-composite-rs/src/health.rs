//! Health probes for the downstream services and the product circuit breaker.

use std::collections::BTreeMap;
use std::sync::Arc;

use error_handling::{CircuitState, Resilience};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::downstream::DownstreamClients;

pub const DOWNSTREAMS: [&str; 3] = ["product", "recommendation", "review"];
pub const PRODUCT_CIRCUIT_COMPONENT: &str = "productCircuitBreaker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down(String),
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: BTreeMap<String, HealthStatus>,
}

/// Probes each downstream through its port
#[derive(Clone)]
pub struct DownstreamHealth {
    clients: DownstreamClients,
    product_resilience: Arc<Resilience>,
}

impl DownstreamHealth {
    pub fn new(clients: DownstreamClients, product_resilience: Arc<Resilience>) -> Self {
        Self {
            clients,
            product_resilience,
        }
    }

    /// Probes one downstream by name; unknown names are reported down
    pub async fn probe(&self, name: &str) -> HealthStatus {
        let outcome = match name {
            "product" => self.clients.product.health().await,
            "recommendation" => self.clients.recommendation.health().await,
            "review" => self.clients.review.health().await,
            other => return HealthStatus::Down(format!("Unknown downstream: {}", other)),
        };

        match outcome {
            Ok(()) => HealthStatus::Up,
            Err(failure) => {
                warn!(downstream = %name, "Health probe failed: {}", failure);
                HealthStatus::Down(failure.to_string())
            }
        }
    }

    fn circuit_status(&self) -> HealthStatus {
        let health = self.product_resilience.circuit_health();
        match health.state {
            CircuitState::Open => HealthStatus::Down(format!(
                "Circuit breaker '{}' is open, failure rate {:.2}",
                self.product_resilience.name(),
                health.error_rate
            )),
            CircuitState::Closed | CircuitState::HalfOpen => HealthStatus::Up,
        }
    }

    /// Probes every downstream concurrently and adds the product breaker state
    pub async fn report(&self) -> HealthReport {
        let statuses = join_all(DOWNSTREAMS.iter().map(|name| self.probe(name))).await;

        let mut components: BTreeMap<String, HealthStatus> = DOWNSTREAMS
            .iter()
            .map(|name| name.to_string())
            .zip(statuses)
            .collect();
        components.insert(PRODUCT_CIRCUIT_COMPONENT.to_string(), self.circuit_status());

        let status = components
            .values()
            .find(|status| !status.is_up())
            .map(|_| HealthStatus::Down("One or more components are down".to_string()))
            .unwrap_or(HealthStatus::Up);

        HealthReport { status, components }
    }
}
