//! # Provider Traits
//!
//! Seams between the storefront and the hosted services it leans on.
//!
//! ```text
//! ┌──────────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │ CommerceProvider     │  │ ImageStore       │  │ Recommender      │
//! │  products, intents   │  │  upload -> URL   │  │  similar items   │
//! └──────────┬───────────┘  └────────┬─────────┘  └────────┬─────────┘
//!            │                       │                     │
//!     StripeClient          StripeFileStore /        TrieveRecommender
//!                           VercelBlobStore
//! ```

use crate::cart::PaymentIntent;
use crate::error::StoreResult;
use crate::product::{Currency, Product};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Catalog and PaymentIntent operations of the commerce backend.
///
/// Every call goes to the provider; nothing is cached at this layer.
#[async_trait]
pub trait CommerceProvider: Send + Sync {
    /// List active products with their default price expanded.
    async fn list_products(&self, limit: u32) -> StoreResult<Vec<Product>>;

    /// All active products whose `slug` metadata equals `slug` (variants).
    async fn products_by_slug(&self, slug: &str) -> StoreResult<Vec<Product>>;

    /// Retrieve one product with its default price expanded.
    async fn retrieve_product(&self, product_id: &str) -> StoreResult<Product>;

    /// Replace the product's metadata keys with `metadata`.
    async fn update_product_metadata(
        &self,
        product_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<Product>;

    /// Replace the product's primary images.
    async fn set_product_images(&self, product_id: &str, images: &[String])
        -> StoreResult<Product>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> StoreResult<PaymentIntent>;

    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &Currency,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent>;

    /// Update amount (when given) and metadata of an existing intent.
    async fn update_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent>;

    /// Provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared commerce provider (dynamic dispatch)
pub type BoxedCommerceProvider = Arc<dyn CommerceProvider>;

/// An uploaded image file
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub product_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        product_id: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Destination for admin-uploaded product images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the file and return a publicly reachable URL.
    async fn upload(&self, upload: ImageUpload) -> StoreResult<String>;

    /// Store name (for logging and config).
    fn store_name(&self) -> &'static str;
}

pub type BoxedImageStore = Arc<dyn ImageStore>;

/// A product suggested by the search service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Similar-product lookup backed by a hosted search service.
#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, product_id: &str, limit: u32) -> StoreResult<Vec<Recommendation>>;
}

pub type BoxedRecommender = Arc<dyn Recommender>;
