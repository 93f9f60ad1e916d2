//! # shop-stripe
//!
//! Stripe integration for storefront-rs.
//!
//! This crate provides:
//!
//! 1. **StripeClient** - Products and PaymentIntents over the REST API
//!    - implements `CommerceProvider`
//!    - product search by slug metadata
//!    - PaymentIntents used as cart containers
//!
//! 2. **StripeFileStore** - product image uploads to Stripe Files
//!    - implements `ImageStore`
//!    - returns public file-link URLs
//!
//! 3. **WebhookVerifier** - `Stripe-Signature` verification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripeClient;
//! use shop_core::CommerceProvider;
//!
//! let stripe = StripeClient::from_env()?;
//! let products = stripe.list_products(100).await?;
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use shop_stripe::{dispatch_webhook_event, WebhookHandler, WebhookVerifier};
//!
//! struct MyHandler;
//!
//! #[async_trait]
//! impl WebhookHandler for MyHandler {
//!     async fn on_payment_succeeded(&self, event: &WebhookEvent) -> StoreResult<()> {
//!         // Take stock
//!         Ok(())
//!     }
//! }
//!
//! let event = WebhookVerifier::new(secret).verify(payload, signature)?;
//! dispatch_webhook_event(&MyHandler, &event).await?;
//! ```

pub mod client;
pub mod config;
pub mod files;
pub mod webhook;

// Re-exports
pub use client::StripeClient;
pub use config::StripeConfig;
pub use files::StripeFileStore;
pub use webhook::{dispatch_webhook_event, sign_payload, WebhookHandler, WebhookVerifier};
