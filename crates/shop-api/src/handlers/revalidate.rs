//! Manual cache invalidation for catalog data.

use crate::cache::tags;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    pub message: String,
    /// RFC 3339
    pub timestamp: String,
}

/// `POST|GET /api/revalidate/products`
pub async fn revalidate_products(State(state): State<AppState>) -> Json<RevalidateResponse> {
    state
        .cache
        .invalidate_tags(&[tags::SEARCH, tags::PRODUCTS, tags::RECOMMENDED]);
    info!("Product cache revalidated");

    Json(RevalidateResponse {
        message: "Product cache revalidated successfully".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
