//! Read path tests for the product composite orchestrator

#[cfg(test)]
mod tests {
    use error_handling::{CircuitState, ErrorKind};

    use crate::downstream::{
        DownstreamFailure, MockProductClient, MockRecommendationClient, MockReviewClient,
    };
    use crate::tests::support::{product, recommendation, review, service_with, COMPOSITE_ADDRESS};

    fn empty_recommendations() -> MockRecommendationClient {
        let mut recommendations = MockRecommendationClient::new();
        recommendations.expect_get_recommendations().returning(|_| Ok(vec![]));
        recommendations
    }

    fn empty_reviews() -> MockReviewClient {
        let mut reviews = MockReviewClient::new();
        reviews.expect_get_reviews().returning(|_| Ok(vec![]));
        reviews
    }

    #[tokio::test]
    async fn test_invalid_product_id_issues_no_calls() {
        // Mocks without expectations panic on any call
        let service = service_with(
            MockProductClient::new(),
            MockRecommendationClient::new(),
            MockReviewClient::new(),
        );

        for product_id in [0, -1, i32::MIN] {
            let err = service.get_aggregate(product_id, 0, 0).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput);
            assert_eq!(err.message, format!("Invalid productId: {}", product_id));
            assert_eq!(err.path, Some(format!("/product-composite/{}", product_id)));
        }
    }

    #[tokio::test]
    async fn test_get_aggregate_merges_results() {
        let mut products = MockProductClient::new();
        products
            .expect_get_product()
            .withf(|id, delay, fault| *id == 1 && *delay == 3 && *fault == 25)
            .times(1)
            .returning(|id, _, _| Ok(product(id)));

        let mut recommendations = MockRecommendationClient::new();
        recommendations
            .expect_get_recommendations()
            .times(1)
            .returning(|id| Ok(vec![recommendation(id, 6, "A"), recommendation(id, 5, "B")]));

        let mut reviews = MockReviewClient::new();
        reviews
            .expect_get_reviews()
            .times(1)
            .returning(|id| Ok(vec![review(id, 1, "C")]));

        let service = service_with(products, recommendations, reviews);
        let aggregate = service.get_aggregate(1, 3, 25).await.unwrap();

        assert_eq!(aggregate.product_id, 1);
        assert_eq!(aggregate.name, "name-1");
        assert_eq!(aggregate.weight, 10);

        let ids: Vec<i32> = aggregate.recommendations.iter().map(|r| r.recommendation_id).collect();
        assert_eq!(ids, vec![6, 5]);
        assert_eq!(aggregate.reviews.len(), 1);

        assert_eq!(aggregate.service_addresses.composite, COMPOSITE_ADDRESS);
        assert_eq!(aggregate.service_addresses.product, "product-1:7001");
        assert_eq!(aggregate.service_addresses.recommendation, "A");
        assert_eq!(aggregate.service_addresses.review, "C");
    }

    #[tokio::test]
    async fn test_empty_sequences_give_empty_summaries_and_addresses() {
        let mut products = MockProductClient::new();
        products.expect_get_product().returning(|id, _, _| Ok(product(id)));

        let service = service_with(products, empty_recommendations(), empty_reviews());
        let aggregate = service.get_aggregate(2, 0, 0).await.unwrap();

        assert!(aggregate.recommendations.is_empty());
        assert!(aggregate.reviews.is_empty());
        assert_eq!(aggregate.service_addresses.recommendation, "");
        assert_eq!(aggregate.service_addresses.review, "");
    }

    #[tokio::test]
    async fn test_circuit_open_product_uses_fallback() {
        let mut products = MockProductClient::new();
        products.expect_get_product().times(1).returning(|_, _, _| {
            Err(DownstreamFailure::CircuitOpen {
                circuit: "product".into(),
            })
        });

        let service = service_with(products, empty_recommendations(), empty_reviews());
        let aggregate = service.get_aggregate(7, 0, 0).await.unwrap();

        assert_eq!(aggregate.product_id, 7);
        assert_eq!(aggregate.name, "Fallback product7");
        assert_eq!(aggregate.weight, 7);
        assert_eq!(aggregate.service_addresses.product, COMPOSITE_ADDRESS);
    }

    #[tokio::test]
    async fn test_fallback_for_reserved_id_is_not_found() {
        let mut products = MockProductClient::new();
        products.expect_get_product().times(1).returning(|_, _, _| {
            Err(DownstreamFailure::CircuitOpen {
                circuit: "product".into(),
            })
        });

        let service = service_with(products, empty_recommendations(), empty_reviews());
        let err = service.get_aggregate(13, 0, 0).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "Product Id: 13 not found in fallback cache!");
        assert_eq!(err.path.as_deref(), Some("/product-composite/13"));
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_retries_then_open_breaker() {
        let mut products = MockProductClient::new();
        // Three attempts on the first read, two more trip the breaker on the second
        products
            .expect_get_product()
            .times(5)
            .returning(|_, _, _| Err(DownstreamFailure::Other("503 Service Unavailable".into())));

        let service = service_with(products, empty_recommendations(), empty_reviews());

        let first = service.get_aggregate(3, 0, 0).await.unwrap();
        assert_eq!(first.name, "Fallback product3");
        assert_eq!(service.product_resilience().circuit_state(), CircuitState::Closed);

        let second = service.get_aggregate(3, 0, 0).await.unwrap();
        assert_eq!(second.name, "Fallback product3");
        assert_eq!(service.product_resilience().circuit_state(), CircuitState::Open);

        // Rejected without reaching the product client
        let third = service.get_aggregate(4, 0, 0).await.unwrap();
        assert_eq!(third.name, "Fallback product4");
    }

    #[tokio::test]
    async fn test_product_not_found_is_not_masked_or_retried() {
        let mut products = MockProductClient::new();
        products
            .expect_get_product()
            .times(1)
            .returning(|id, _, _| Err(DownstreamFailure::NotFound(format!("No product found for productId: {}", id))));

        let service = service_with(products, empty_recommendations(), empty_reviews());
        let err = service.get_aggregate(4, 0, 0).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "No product found for productId: 4");
        assert_eq!(err.service.as_deref(), Some("product"));
        assert_eq!(err.path.as_deref(), Some("/product-composite/4"));
        assert_eq!(service.product_resilience().circuit_health().request_count, 0);
    }

    #[tokio::test]
    async fn test_product_invalid_input_propagates() {
        let mut products = MockProductClient::new();
        products
            .expect_get_product()
            .times(1)
            .returning(|_, _, _| Err(DownstreamFailure::InvalidInput("Invalid productId: 5".into())));

        let service = service_with(products, empty_recommendations(), empty_reviews());
        let err = service.get_aggregate(5, 0, 0).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_recommendation_circuit_open_has_no_fallback() {
        let mut products = MockProductClient::new();
        products.expect_get_product().returning(|id, _, _| Ok(product(id)));

        let mut recommendations = MockRecommendationClient::new();
        recommendations.expect_get_recommendations().returning(|_| {
            Err(DownstreamFailure::CircuitOpen {
                circuit: "recommendation".into(),
            })
        });

        let service = service_with(products, recommendations, empty_reviews());
        let err = service.get_aggregate(1, 0, 0).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        assert_eq!(err.service.as_deref(), Some("recommendation"));
    }

    #[tokio::test]
    async fn test_review_failure_is_internal() {
        let mut products = MockProductClient::new();
        products.expect_get_product().returning(|id, _, _| Ok(product(id)));

        let mut reviews = MockReviewClient::new();
        reviews
            .expect_get_reviews()
            .returning(|_| Err(DownstreamFailure::Other("review responded with 500".into())));

        let service = service_with(products, empty_recommendations(), reviews);
        let err = service.get_aggregate(1, 0, 0).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.message, "review responded with 500");
        assert_eq!(err.to_http_error_info().path, "/product-composite/1");
    }
}
