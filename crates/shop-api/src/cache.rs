//! # Tag Cache
//!
//! Response cache for catalog reads. Every entry carries a set of tags;
//! invalidating a tag drops all entries carrying it. Values are stored as
//! JSON so one cache serves every response type.

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shop_core::StoreResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tags shared across handlers
pub mod tags {
    pub const PRODUCTS: &str = "products";
    pub const SEARCH: &str = "search";
    pub const RECOMMENDED: &str = "getRecommendedProducts";
    pub const ADMIN_ORDERS: &str = "admin-orders";

    pub fn product(product_id: &str) -> String {
        format!("product-{}", product_id)
    }

    pub fn cart(cart_id: &str) -> String {
        format!("cart-{}", cart_id)
    }
}

const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug)]
struct TaggedEntry {
    tags: Vec<String>,
    value: serde_json::Value,
}

/// Tag-invalidated cache over moka
#[derive(Clone)]
pub struct TagCache {
    entries: Cache<String, Arc<TaggedEntry>>,
}

impl TagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Return the cached value under `key`, or run `loader` and cache its
    /// result under `tags`. Loader errors are returned and not cached.
    pub async fn get_or_insert_with<T, F, Fut>(
        &self,
        key: &str,
        tags: &[&str],
        loader: F,
    ) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        self.get_or_insert_tagged(key, loader, move |_| tags).await
    }

    /// Like [`TagCache::get_or_insert_with`], with tags derived from the
    /// loaded value (e.g. `product-{id}` once the id is known)
    pub async fn get_or_insert_tagged<T, F, Fut, G>(
        &self,
        key: &str,
        loader: F,
        tags_for: G,
    ) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
        G: FnOnce(&T) -> Vec<String>,
    {
        if let Some(entry) = self.entries.get(key).await {
            match serde_json::from_value(entry.value.clone()) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let value = loader().await?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                let entry = TaggedEntry {
                    tags: tags_for(&value),
                    value: json,
                };
                self.entries.insert(key.to_string(), Arc::new(entry)).await;
            }
            Err(e) => warn!("Not caching {}: {}", key, e),
        }
        Ok(value)
    }

    /// Drop every entry carrying `tag`
    pub fn invalidate_tag(&self, tag: &str) {
        let tag = tag.to_string();
        debug!("Invalidating cache tag {}", tag);
        let result = self
            .entries
            .invalidate_entries_if(move |_key, entry| entry.tags.iter().any(|t| *t == tag));
        if let Err(e) = result {
            warn!("Cache invalidation failed: {}", e);
        }
    }

    pub fn invalidate_tags(&self, tags: &[&str]) {
        for tag in tags {
            self.invalidate_tag(tag);
        }
    }

    /// Whether `key` currently holds a live entry
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.get(key).await.is_some()
    }
}
