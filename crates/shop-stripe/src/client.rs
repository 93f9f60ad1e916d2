//! # Stripe Client
//!
//! Form-encoded calls against the Stripe Products and PaymentIntents APIs.
//! Implements [`CommerceProvider`] so the storefront never talks to Stripe
//! directly.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use shop_core::{
    CommerceProvider, Currency, PaymentIntent, Price, Product, StoreError, StoreResult,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Largest page Stripe returns from list/search endpoints
pub const MAX_PAGE_SIZE: u32 = 100;

/// Stripe REST client
pub struct StripeClient {
    config: StripeConfig,
    client: Client,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(config: StripeConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_base_url, path);
        self.client
            .request(method, url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .header("Stripe-Version", &self.config.api_version)
    }

    /// Send a request and decode the JSON body.
    ///
    /// A 404 becomes `not_found` when one is given.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        not_found: Option<StoreError>,
    ) -> StoreResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            return Err(map_stripe_error(status, &body, retry_after, not_found));
        }

        serde_json::from_str(&body).map_err(|e| {
            StoreError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl CommerceProvider for StripeClient {
    #[instrument(skip(self))]
    async fn list_products(&self, limit: u32) -> StoreResult<Vec<Product>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        let request = self.request(Method::GET, "/v1/products").query(&[
            ("active", "true"),
            ("limit", limit.as_str()),
            ("expand[]", "data.default_price"),
        ]);

        let list: StripeList<StripeProduct> = self.send(request, None).await?;
        debug!("Listed {} Stripe products", list.data.len());
        Ok(list.data.into_iter().map(Product::from).collect())
    }

    #[instrument(skip(self))]
    async fn products_by_slug(&self, slug: &str) -> StoreResult<Vec<Product>> {
        let query = slug_search_query(slug);
        let request = self.request(Method::GET, "/v1/products/search").query(&[
            ("query", query.as_str()),
            ("limit", "100"),
            ("expand[]", "data.default_price"),
        ]);

        let list: StripeList<StripeProduct> = self.send(request, None).await?;
        Ok(list.data.into_iter().map(Product::from).collect())
    }

    #[instrument(skip(self))]
    async fn retrieve_product(&self, product_id: &str) -> StoreResult<Product> {
        let not_found = || StoreError::ProductNotFound {
            product_id: product_id.to_string(),
        };
        let path = object_path("products", product_id).ok_or_else(not_found)?;
        let request = self
            .request(Method::GET, &path)
            .query(&[("expand[]", "default_price")]);

        let product: StripeProduct = self.send(request, Some(not_found())).await?;
        Ok(product.into())
    }

    #[instrument(skip(self, metadata), fields(keys = metadata.len()))]
    async fn update_product_metadata(
        &self,
        product_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<Product> {
        let not_found = || StoreError::ProductNotFound {
            product_id: product_id.to_string(),
        };
        let path = object_path("products", product_id).ok_or_else(not_found)?;
        let mut form = metadata_params(metadata);
        form.push(("expand[]".to_string(), "default_price".to_string()));

        let request = self.request(Method::POST, &path).form(&form);
        let product: StripeProduct = self.send(request, Some(not_found())).await?;
        info!("Updated metadata on product {}", product_id);
        Ok(product.into())
    }

    #[instrument(skip(self, images), fields(count = images.len()))]
    async fn set_product_images(
        &self,
        product_id: &str,
        images: &[String],
    ) -> StoreResult<Product> {
        let not_found = || StoreError::ProductNotFound {
            product_id: product_id.to_string(),
        };
        let path = object_path("products", product_id).ok_or_else(not_found)?;
        let mut form: Vec<(String, String)> = images
            .iter()
            .enumerate()
            .map(|(i, url)| (format!("images[{}]", i), url.clone()))
            .collect();
        form.push(("expand[]".to_string(), "default_price".to_string()));

        let request = self.request(Method::POST, &path).form(&form);
        let product: StripeProduct = self.send(request, Some(not_found())).await?;
        Ok(product.into())
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, intent_id: &str) -> StoreResult<PaymentIntent> {
        let not_found = || StoreError::CartNotFound {
            cart_id: intent_id.to_string(),
        };
        let path = object_path("payment_intents", intent_id).ok_or_else(not_found)?;
        let request = self.request(Method::GET, &path);
        self.send(request, Some(not_found())).await
    }

    #[instrument(skip(self, metadata))]
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &Currency,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent> {
        let mut form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.as_str().to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(metadata_params(metadata));

        let request = self
            .request(Method::POST, "/v1/payment_intents")
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&form);

        let intent: PaymentIntent = self.send(request, None).await?;
        info!("Created PaymentIntent {} for {} {}", intent.id, amount, currency);
        Ok(intent)
    }

    #[instrument(skip(self, metadata))]
    async fn update_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent> {
        let not_found = || StoreError::CartNotFound {
            cart_id: intent_id.to_string(),
        };
        let path = object_path("payment_intents", intent_id).ok_or_else(not_found)?;
        let mut form = Vec::new();
        if let Some(amount) = amount {
            form.push(("amount".to_string(), amount.to_string()));
        }
        form.extend(metadata_params(metadata));

        let request = self.request(Method::POST, &path).form(&form);
        self.send(request, Some(not_found())).await
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

/// `/v1/{collection}/{id}`, or `None` when `id` is not a Stripe object id
/// (`[A-Za-z0-9_]+`) and cannot be placed in a path as is
fn object_path(collection: &str, id: &str) -> Option<String> {
    let valid = !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    valid.then(|| format!("/v1/{}/{}", collection, id))
}

/// Stripe search query selecting active products by slug metadata
fn slug_search_query(slug: &str) -> String {
    let escaped = slug.replace('\\', "\\\\").replace('\'', "\\'");
    format!("active:'true' AND metadata['slug']:'{}'", escaped)
}

/// `metadata[key]=value` form pairs
pub(crate) fn metadata_params(metadata: &BTreeMap<String, String>) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
        .collect()
}

pub(crate) fn map_stripe_error(
    status: StatusCode,
    body: &str,
    retry_after_secs: u64,
    not_found: Option<StoreError>,
) -> StoreError {
    if status == StatusCode::NOT_FOUND {
        if let Some(err) = not_found {
            return err;
        }
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return StoreError::RateLimited {
            provider: "stripe".to_string(),
            retry_after_secs,
        };
    }

    error!("Stripe API error: status={}, body={}", status, body);

    match serde_json::from_str::<StripeErrorResponse>(body) {
        Ok(parsed) => StoreError::stripe(parsed.error.message),
        Err(_) => StoreError::stripe(format!("HTTP {}: {}", status, body)),
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeProduct {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    default_price: Option<StripeDefaultPrice>,
}

fn default_true() -> bool {
    true
}

/// `default_price` is an id unless expanded
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StripeDefaultPrice {
    Expanded(StripePrice),
    Id(String),
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    #[serde(default)]
    unit_amount: Option<i64>,
    currency: String,
}

impl From<StripeProduct> for Product {
    fn from(p: StripeProduct) -> Self {
        let default_price = match p.default_price {
            Some(StripeDefaultPrice::Expanded(price)) => match Currency::parse(&price.currency) {
                Some(currency) => Some(Price {
                    id: Some(price.id),
                    amount: price.unit_amount.unwrap_or(0),
                    currency,
                }),
                None => {
                    warn!(
                        "Product {} has an unreadable price currency {:?}",
                        p.id, price.currency
                    );
                    None
                }
            },
            Some(StripeDefaultPrice::Id(_)) | None => None,
        };

        Product {
            id: p.id,
            name: p.name,
            description: p.description,
            active: p.active,
            images: p.images,
            metadata: p.metadata,
            default_price,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}
