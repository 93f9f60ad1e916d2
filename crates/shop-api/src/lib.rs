//! # shop-api
//!
//! HTTP API layer for storefront-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - catalog, cart and admin endpoints over the Stripe backend
//! - the Stripe webhook that takes stock on successful payments
//! - a tag-invalidated response cache
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/products` | List products |
//! | GET | `/api/products/{slug}` | Product detail and variants |
//! | GET | `/api/products/{slug}/recommendations` | Related products |
//! | GET | `/api/categories/{slug}` | Products in a category |
//! | GET/POST/DELETE | `/api/cart` | Read, add to, or forget the cart |
//! | POST | `/api/admin/login` | Admin login |
//! | POST | `/api/admin/upload-product-images` | Upload product images |
//! | POST | `/api/stripe-webhook` | Stripe webhook |
//! | GET/POST | `/api/revalidate/products` | Drop cached catalog data |

pub mod auth;
pub mod cache;
pub mod cart;
pub mod cookies;
pub mod handlers;
pub mod routes;
pub mod search;
pub mod state;
pub mod storage;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
