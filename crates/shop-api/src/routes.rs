//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers::{self, admin, cart, catalog, revalidate, webhook};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/products - List listed products (`?first=N`)
///   - GET  /api/products/{slug} - Product detail with variants (`?variant=V`)
///   - GET  /api/products/{slug}/recommendations - Related products
///   - GET  /api/categories, /api/categories/{slug}
///   - GET  /api/store - Categories, social links, contact
///
/// - Cart (cookie `yns_cart`):
///   - GET|POST|DELETE /api/cart
///   - PUT  /api/cart/lines/{product_id}
///   - POST /api/cart/lines/{product_id}/increase|decrease
///   - POST /api/cart/init, /api/cart/id
///
/// - Admin:
///   - POST /api/admin/login, /api/admin/logout
///   - GET  /api/admin/products
///   - POST /api/admin/upload-product-images (multipart)
///
/// - Webhooks and cache:
///   - POST /api/stripe-webhook
///   - GET|POST /api/revalidate/products
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let catalog_routes = Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::get_product))
        .route(
            "/products/{slug}/recommendations",
            get(catalog::get_recommendations),
        )
        .route("/categories", get(catalog::list_categories))
        .route("/categories/{slug}", get(catalog::get_category))
        .route("/store", get(catalog::get_store));

    let cart_routes = Router::new()
        .route(
            "/",
            get(cart::get_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route("/lines/{product_id}", put(cart::set_line_quantity))
        .route("/lines/{product_id}/increase", post(cart::increase_line))
        .route("/lines/{product_id}/decrease", post(cart::decrease_line))
        .route("/init", post(cart::init_cart))
        .route("/id", post(cart::find_or_create_cart_id));

    let admin_routes = Router::new()
        .route("/login", post(admin::login))
        .route("/logout", post(admin::logout))
        .route("/products", get(admin::list_products))
        .route(
            "/upload-product-images",
            post(admin::upload_product_images)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        );

    let api_routes = Router::new()
        .merge(catalog_routes)
        .nest("/cart", cart_routes)
        .nest("/admin", admin_routes)
        .route("/stripe-webhook", post(webhook::stripe_webhook))
        .route(
            "/revalidate/products",
            get(revalidate::revalidate_products).post(revalidate::revalidate_products),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
