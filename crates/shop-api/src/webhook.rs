//! # Stock Webhook Handler
//!
//! Applies `payment_intent.succeeded` to product stock. The PaymentIntent is
//! re-fetched before any write and skipped once it carries
//! `stockApplied=true`, so a redelivered event never decrements twice.

use crate::cache::{tags, TagCache};
use async_trait::async_trait;
use shop_core::cart::STOCK_APPLIED_KEY;
use shop_core::product::STOCK_KEY;
use shop_core::{BoxedCommerceProvider, CartMetadata, Stock, StoreError, StoreResult, WebhookEvent};
use shop_stripe::WebhookHandler;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument};

pub struct StockWebhookHandler {
    commerce: BoxedCommerceProvider,
    cache: TagCache,
}

impl StockWebhookHandler {
    pub fn new(commerce: BoxedCommerceProvider, cache: TagCache) -> Self {
        Self { commerce, cache }
    }

    /// Take `quantity` units of `product_id` off its stock
    async fn take_stock(&self, product_id: &str, quantity: u32) -> StoreResult<()> {
        let product = self.commerce.retrieve_product(product_id).await?;

        let stock = product.stock();
        let Stock::Limited(before) = stock else {
            debug!("Product {} has unlimited stock", product_id);
            return Ok(());
        };

        let after = stock.decrement(quantity);
        let mut metadata = product.metadata.clone();
        metadata.insert(STOCK_KEY.to_string(), after.to_string());
        self.commerce
            .update_product_metadata(product_id, &metadata)
            .await?;

        self.cache.invalidate_tag(&tags::product(product_id));
        info!("Stock for {}: {} -> {}", product_id, before, after);
        Ok(())
    }
}

#[async_trait]
impl WebhookHandler for StockWebhookHandler {
    #[instrument(skip(self, event), fields(event_id = %event.event_id))]
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> StoreResult<()> {
        let intent_id = event
            .payment_intent
            .as_ref()
            .map(|pi| pi.id.clone())
            .ok_or_else(|| StoreError::WebhookParseError("Missing PaymentIntent".to_string()))?;

        let intent = self.commerce.retrieve_payment_intent(&intent_id).await?;
        if intent.stock_applied() {
            info!("Stock already applied for {}", intent_id);
            return Ok(());
        }

        let Some(lines) = CartMetadata::decode(&intent.metadata) else {
            debug!("PaymentIntent {} carries no cart lines", intent_id);
            self.cache.invalidate_tag(&tags::cart(&intent_id));
            return Ok(());
        };

        for (product_id, quantity) in &lines.entries {
            if let Err(e) = self.take_stock(product_id, *quantity).await {
                error!("Failed to update stock for {}: {}", product_id, e);
            }
        }

        let marker = BTreeMap::from([(STOCK_APPLIED_KEY.to_string(), "true".to_string())]);
        self.commerce
            .update_payment_intent(&intent_id, None, &marker)
            .await?;

        self.cache.invalidate_tag(&tags::cart(&intent_id));
        info!("Applied stock for {} ({} lines)", intent_id, lines.len());
        Ok(())
    }
}
