//! Data model shared by the composite and its downstream services
//!
//! Field names are camelCase on the wire. Absent or `null` recommendation and
//! review lists deserialize as empty.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a product; values below 1 are rejected on reads
pub type ProductId = i32;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub weight: i32,
    /// Address of the instance that served this product, empty until fetched
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product_id: ProductId,
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub product_id: ProductId,
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSummary {
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
}

impl RecommendationSummary {
    /// Expands the summary into a full recommendation for `product_id`
    pub fn to_recommendation(&self, product_id: ProductId) -> Recommendation {
        Recommendation {
            product_id,
            recommendation_id: self.recommendation_id,
            author: self.author.clone(),
            rate: self.rate,
            content: self.content.clone(),
            service_address: String::new(),
        }
    }
}

impl From<&Recommendation> for RecommendationSummary {
    fn from(r: &Recommendation) -> Self {
        Self {
            recommendation_id: r.recommendation_id,
            author: r.author.clone(),
            rate: r.rate,
            content: r.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
}

impl ReviewSummary {
    /// Expands the summary into a full review for `product_id`
    pub fn to_review(&self, product_id: ProductId) -> Review {
        Review {
            product_id,
            review_id: self.review_id,
            author: self.author.clone(),
            subject: self.subject.clone(),
            content: self.content.clone(),
            service_address: String::new(),
        }
    }
}

impl From<&Review> for ReviewSummary {
    fn from(r: &Review) -> Self {
        Self {
            review_id: r.review_id,
            author: r.author.clone(),
            subject: r.subject.clone(),
            content: r.content.clone(),
        }
    }
}

/// Addresses of the instances that contributed to an aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAddresses {
    #[serde(rename = "cmp", default)]
    pub composite: String,
    #[serde(rename = "pro", default)]
    pub product: String,
    #[serde(rename = "rec", default)]
    pub recommendation: String,
    #[serde(rename = "rev", default)]
    pub review: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAggregate {
    pub product_id: ProductId,
    pub name: String,
    pub weight: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<RecommendationSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reviews: Vec<ReviewSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_addresses: ServiceAddresses,
}
