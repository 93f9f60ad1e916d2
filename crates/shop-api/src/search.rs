//! # Trieve Recommendations
//!
//! [`Recommender`] over Trieve's chunk recommendation API. Products are
//! indexed with their Stripe id as the chunk `tracking_id` and display data
//! in chunk metadata.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shop_core::{Recommendation, Recommender, StoreError, StoreResult};
use std::time::Duration;
use tracing::{debug, instrument};

const TRIEVE_API_BASE: &str = "https://api.trieve.ai";

#[derive(Debug)]
pub struct TrieveRecommender {
    client: Client,
    api_key: SecretString,
    dataset_id: String,
    base_url: String,
}

impl TrieveRecommender {
    pub fn new(api_key: impl Into<String>, dataset_id: impl Into<String>) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key.into()),
            dataset_id: dataset_id.into(),
            base_url: TRIEVE_API_BASE.to_string(),
        })
    }

    /// `None` when `TRIEVE_API_KEY` is unset; an error when the dataset id is
    /// missing alongside it
    pub fn from_env() -> Option<StoreResult<Self>> {
        let api_key = std::env::var("TRIEVE_API_KEY").ok().filter(|k| !k.is_empty())?;
        Some(match std::env::var("TRIEVE_DATASET_ID") {
            Ok(dataset_id) if !dataset_id.is_empty() => Self::new(api_key, dataset_id),
            _ => Err(StoreError::Configuration(
                "TRIEVE_DATASET_ID not set".to_string(),
            )),
        })
    }

    /// Builder: point at another API host (tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct RecommendRequest<'a> {
    positive_tracking_ids: [&'a str; 1],
    limit: u32,
    strategy: &'static str,
    slim_chunks: bool,
}

/// Trieve has answered with both a bare array and a `chunks` wrapper
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecommendResponse {
    Wrapped { chunks: Vec<ScoredChunk> },
    Bare(Vec<ScoredChunk>),
}

impl RecommendResponse {
    fn into_chunks(self) -> Vec<ScoredChunk> {
        match self {
            Self::Wrapped { chunks } | Self::Bare(chunks) => chunks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoredChunk {
    chunk: Chunk,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    tracking_id: Option<String>,
    #[serde(default)]
    metadata: ChunkMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default, alias = "image_url")]
    image: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

impl Chunk {
    fn into_recommendation(self) -> Option<Recommendation> {
        let product_id = self.tracking_id?;
        Some(Recommendation {
            name: self.metadata.name.unwrap_or_else(|| product_id.clone()),
            product_id,
            slug: self.metadata.slug,
            image: self.metadata.image,
            amount: self.metadata.amount,
            currency: self.metadata.currency,
        })
    }
}

#[async_trait]
impl Recommender for TrieveRecommender {
    #[instrument(skip(self))]
    async fn recommend(&self, product_id: &str, limit: u32) -> StoreResult<Vec<Recommendation>> {
        let body = RecommendRequest {
            positive_tracking_ids: [product_id],
            // One extra in case the product itself comes back
            limit: limit.saturating_add(1),
            strategy: "average_vector",
            slim_chunks: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chunk/recommend", self.base_url))
            .header("Authorization", self.api_key.expose_secret())
            .header("TR-Dataset", &self.dataset_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::ProviderError {
                provider: "trieve".to_string(),
                message: format!("HTTP {}: {}", status, text),
            });
        }

        let parsed: RecommendResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Serialization(format!("Bad Trieve response: {}", e)))?;

        let items: Vec<Recommendation> = parsed
            .into_chunks()
            .into_iter()
            .filter_map(|c| c.chunk.into_recommendation())
            .filter(|r| r.product_id != product_id)
            .take(limit as usize)
            .collect();

        debug!("{} recommendations for {}", items.len(), product_id);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunk(id: &str, name: &str) -> serde_json::Value {
        json!({
            "chunk": {
                "tracking_id": id,
                "metadata": { "name": name, "slug": name.to_lowercase(), "image_url": "https://img/x.png", "amount": 1200, "currency": "usd" }
            },
            "score": 0.9
        })
    }

    #[tokio::test]
    async fn test_recommend_skips_self_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chunk/recommend"))
            .and(header("TR-Dataset", "ds_1"))
            .and(body_partial_json(json!({ "positive_tracking_ids": ["prod_1"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chunks": [chunk("prod_1", "Self"), chunk("prod_2", "Blush"), chunk("prod_3", "Bronzer")]
            })))
            .mount(&server)
            .await;

        let trieve = TrieveRecommender::new("tr_key", "ds_1")
            .unwrap()
            .with_base_url(server.uri());
        let items = trieve.recommend("prod_1", 1).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, "prod_2");
        assert_eq!(items[0].slug.as_deref(), Some("blush"));
        assert_eq!(items[0].image.as_deref(), Some("https://img/x.png"));
        assert_eq!(items[0].amount, Some(1200));
    }

    #[tokio::test]
    async fn test_bare_array_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([chunk("prod_9", "Liner")])))
            .mount(&server)
            .await;

        let trieve = TrieveRecommender::new("k", "d").unwrap().with_base_url(server.uri());
        let items = trieve.recommend("prod_1", 4).await.unwrap();
        assert_eq!(items[0].name, "Liner");
    }

    #[tokio::test]
    async fn test_http_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let trieve = TrieveRecommender::new("k", "d").unwrap().with_base_url(server.uri());
        let err = trieve.recommend("prod_1", 4).await.unwrap_err();
        assert_eq!(err.status_code(), 502);
    }
}
