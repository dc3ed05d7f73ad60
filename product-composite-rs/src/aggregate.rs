//! Merges the three downstream results into one aggregate.

use crate::model::{
    Product, ProductAggregate, Recommendation, RecommendationSummary, Review, ReviewSummary,
    ServiceAddresses,
};

/// Builds the aggregate view without touching the inputs
///
/// Recommendation and review addresses come from the first element of each
/// sequence, or are empty when the sequence is empty. Ordering is kept as
/// received.
pub fn build_aggregate(
    product: &Product,
    recommendations: &[Recommendation],
    reviews: &[Review],
    service_address: &str,
) -> ProductAggregate {
    let service_addresses = ServiceAddresses {
        composite: service_address.to_string(),
        product: product.service_address.clone(),
        recommendation: recommendations
            .first()
            .map(|r| r.service_address.clone())
            .unwrap_or_default(),
        review: reviews
            .first()
            .map(|r| r.service_address.clone())
            .unwrap_or_default(),
    };

    ProductAggregate {
        product_id: product.product_id,
        name: product.name.clone(),
        weight: product.weight,
        recommendations: recommendations.iter().map(RecommendationSummary::from).collect(),
        reviews: reviews.iter().map(ReviewSummary::from).collect(),
        service_addresses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            product_id: 1,
            name: "name".into(),
            weight: 1,
            service_address: "product-1:7001".into(),
        }
    }

    fn recommendation(id: i32, address: &str) -> Recommendation {
        Recommendation {
            product_id: 1,
            recommendation_id: id,
            author: "author".into(),
            rate: 5,
            content: "content".into(),
            service_address: address.into(),
        }
    }

    #[test]
    fn test_empty_sequences_give_empty_addresses() {
        let aggregate = build_aggregate(&product(), &[], &[], "composite-1:7000");

        assert!(aggregate.recommendations.is_empty());
        assert!(aggregate.reviews.is_empty());
        assert_eq!(aggregate.service_addresses.composite, "composite-1:7000");
        assert_eq!(aggregate.service_addresses.product, "product-1:7001");
        assert_eq!(aggregate.service_addresses.recommendation, "");
        assert_eq!(aggregate.service_addresses.review, "");
    }

    #[test]
    fn test_first_element_address_and_order_preserved() {
        let recommendations = vec![recommendation(6, "A"), recommendation(5, "B")];
        let before = recommendations.clone();

        let aggregate = build_aggregate(&product(), &recommendations, &[], "c");

        assert_eq!(aggregate.service_addresses.recommendation, "A");
        let ids: Vec<i32> = aggregate.recommendations.iter().map(|r| r.recommendation_id).collect();
        assert_eq!(ids, vec![6, 5]);
        assert_eq!(recommendations, before);
    }
}
