//! Substitute product served when the product service is rejected by its
//! circuit breaker or exhausts its retries.

use tracing::warn;

use crate::downstream::{DownstreamFailure, DownstreamOutcome};
use crate::model::{Product, ProductId};

/// Product id reserved to exercise a fallback that itself fails
pub const FALLBACK_MISSING_PRODUCT_ID: ProductId = 13;

pub fn product_fallback(product_id: ProductId, service_address: &str) -> DownstreamOutcome<Product> {
    if product_id == FALLBACK_MISSING_PRODUCT_ID {
        let message = format!("Product Id: {} not found in fallback cache!", product_id);
        warn!(product_id = %product_id, "{}", message);
        return Err(DownstreamFailure::NotFound(message));
    }

    Ok(Product {
        product_id,
        name: format!("Fallback product{}", product_id),
        weight: product_id,
        service_address: service_address.to_string(),
    })
}
