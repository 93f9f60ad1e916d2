//! In-memory collaborators for tests.

use async_trait::async_trait;
use shop_core::{
    CommerceProvider, Currency, ImageStore, ImageUpload, PaymentIntent, Product, Recommendation,
    Recommender, StoreError, StoreResult,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Products and PaymentIntents held in memory, with Stripe's metadata
/// merge semantics (empty value deletes a key)
#[derive(Default)]
pub struct InMemoryCommerce {
    products: Mutex<BTreeMap<String, Product>>,
    intents: Mutex<BTreeMap<String, PaymentIntent>>,
    next_id: AtomicU64,
    product_updates: AtomicUsize,
}

impl InMemoryCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: Product) {
        self.products
            .lock()
            .unwrap()
            .insert(product.id.clone(), product);
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.products.lock().unwrap().get(id).cloned()
    }

    /// Store a bare intent and return its id
    pub fn insert_intent(&self, amount: i64, metadata: BTreeMap<String, String>) -> String {
        let id = format!("pi_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let intent = PaymentIntent {
            id: id.clone(),
            amount,
            currency: "usd".to_string(),
            client_secret: Some(format!("{}_secret", id)),
            status: "requires_payment_method".to_string(),
            metadata,
        };
        self.intents.lock().unwrap().insert(id.clone(), intent);
        id
    }

    pub fn intent(&self, id: &str) -> Option<PaymentIntent> {
        self.intents.lock().unwrap().get(id).cloned()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    /// Number of product metadata/image writes
    pub fn product_updates(&self) -> usize {
        self.product_updates.load(Ordering::SeqCst)
    }
}

fn merge(target: &mut BTreeMap<String, String>, update: &BTreeMap<String, String>) {
    for (key, value) in update {
        if value.is_empty() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl CommerceProvider for InMemoryCommerce {
    async fn list_products(&self, limit: u32) -> StoreResult<Vec<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.active)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn products_by_slug(&self, slug: &str) -> StoreResult<Vec<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.active && p.slug() == Some(slug))
            .cloned()
            .collect())
    }

    async fn retrieve_product(&self, product_id: &str) -> StoreResult<Product> {
        self.product(product_id)
            .ok_or_else(|| StoreError::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    async fn update_product_metadata(
        &self,
        product_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<Product> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        merge(&mut product.metadata, metadata);
        self.product_updates.fetch_add(1, Ordering::SeqCst);
        Ok(product.clone())
    }

    async fn set_product_images(&self, product_id: &str, images: &[String]) -> StoreResult<Product> {
        let mut products = self.products.lock().unwrap();
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        product.images = images.to_vec();
        self.product_updates.fetch_add(1, Ordering::SeqCst);
        Ok(product.clone())
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> StoreResult<PaymentIntent> {
        self.intent(intent_id).ok_or_else(|| StoreError::CartNotFound {
            cart_id: intent_id.to_string(),
        })
    }

    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &Currency,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent> {
        let id = self.insert_intent(amount, metadata.clone());
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(&id).ok_or_else(|| StoreError::Internal(id.clone()))?;
        intent.currency = currency.as_str().to_string();
        Ok(intent.clone())
    }

    async fn update_payment_intent(
        &self,
        intent_id: &str,
        amount: Option<i64>,
        metadata: &BTreeMap<String, String>,
    ) -> StoreResult<PaymentIntent> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| StoreError::CartNotFound {
                cart_id: intent_id.to_string(),
            })?;
        if let Some(amount) = amount {
            intent.amount = amount;
        }
        merge(&mut intent.metadata, metadata);
        Ok(intent.clone())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Image store that hands out predictable URLs; uploads named
/// `fail_on` are rejected
#[derive(Default)]
pub struct FakeImageStore {
    pub fail_on: Option<String>,
    pub uploads: Mutex<Vec<String>>,
}

impl FakeImageStore {
    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            uploads: Mutex::default(),
        }
    }
}

#[async_trait]
impl ImageStore for FakeImageStore {
    async fn upload(&self, upload: ImageUpload) -> StoreResult<String> {
        if self.fail_on.as_deref() == Some(upload.file_name.as_str()) {
            return Err(StoreError::UploadFailed(upload.file_name));
        }
        self.uploads.lock().unwrap().push(upload.file_name.clone());
        Ok(format!(
            "https://cdn.test/{}/{}",
            upload.product_id, upload.file_name
        ))
    }

    fn store_name(&self) -> &'static str {
        "fake"
    }
}

/// Recommender returning a fixed list and counting calls
#[derive(Default)]
pub struct StaticRecommender {
    pub items: Vec<Recommendation>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Recommender for StaticRecommender {
    async fn recommend(&self, product_id: &str, limit: u32) -> StoreResult<Vec<Recommendation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .items
            .iter()
            .filter(|r| r.product_id != product_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
