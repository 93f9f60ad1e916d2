//! # shop-core
//!
//! Core types and traits for the storefront.
//!
//! This crate provides:
//! - `Product`, `Price` and `ProductCatalog` read from the commerce backend
//! - the PaymentIntent-backed cart model (`CartCookie`, `CartMetadata`, `Cart`)
//! - `WebhookEvent` for verified payment webhooks
//! - `CommerceProvider`, `ImageStore` and `Recommender` traits
//! - `StoreConfig` for categories and contact details
//! - `StoreError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{Cart, Currency, CommerceProvider};
//!
//! let product = provider.retrieve_product("prod_123").await?;
//! let mut cart = Cart::empty(&Currency::USD);
//! cart.add(product, 2)?;
//!
//! let intent = provider
//!     .create_payment_intent(cart.total(), &Currency::USD, &cart.encoded_metadata())
//!     .await?;
//! ```

pub mod cart;
pub mod error;
pub mod event;
pub mod product;
pub mod provider;
pub mod secure;
pub mod store;

// Re-exports for convenience
pub use cart::{Cart, CartCookie, CartLine, CartMetadata, PaymentIntent, CART_COOKIE_NAME};
pub use error::{StoreError, StoreResult};
pub use event::{WebhookEvent, WebhookEventType};
pub use product::{select_variant, Currency, Price, Product, ProductCatalog, Stock};
pub use provider::{
    BoxedCommerceProvider, BoxedImageStore, BoxedRecommender, CommerceProvider, ImageStore,
    ImageUpload, Recommendation, Recommender,
};
pub use store::{Category, Contact, SocialLinks, StoreConfig};
