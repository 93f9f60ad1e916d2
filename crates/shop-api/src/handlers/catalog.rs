//! Catalog reads: product listing and detail, categories, recommendations
//! and store details. Stripe reads go through the tag cache.

use super::{store_error_to_response, ApiError};
use crate::cache::tags;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{
    select_variant, Category, Price, Product, ProductCatalog, Recommendation, Stock, StoreConfig,
    StoreError, StoreResult,
};
use tracing::{instrument, warn};

/// Stripe's page size ceiling and the default listing size
pub const MAX_PRODUCTS: u32 = 100;

const DEFAULT_RECOMMENDATIONS: u32 = 4;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub first: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub limit: Option<u32>,
}

/// A product shaped for display
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub variant: Option<String>,
    pub price: Option<Price>,
    /// Formatted price, e.g. `$19.99`
    pub formatted_price: Option<String>,
    pub gallery: Vec<String>,
    pub in_stock: bool,
    /// `None` when stock is unlimited
    pub stock: Option<u64>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let stock = match product.stock() {
            Stock::Unlimited => None,
            Stock::Limited(n) => Some(n),
        };
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            slug: product.slug().map(str::to_string),
            category: product.category().map(str::to_string),
            variant: product.variant().map(str::to_string),
            price: product.default_price.clone(),
            formatted_price: product.default_price.as_ref().map(Price::display),
            gallery: product.gallery(),
            in_stock: stock != Some(0),
            stock,
        }
    }
}

/// One entry of the variant picker
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantOption {
    pub id: String,
    pub variant: Option<String>,
    pub formatted_price: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailResponse {
    pub product: ProductView,
    pub variants: Vec<VariantOption>,
    pub category: Option<Category>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub category: Category,
    pub products: Vec<ProductView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api/products?first=N`
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let first = query.first.unwrap_or(MAX_PRODUCTS).clamp(1, MAX_PRODUCTS);
    let catalog = cached_catalog(&state, first)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(catalog.listed().map(ProductView::from).collect()))
}

/// `GET /api/products/{slug}?variant=V`
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductDetailResponse>, ApiError> {
    let variants = cached_variants(&state, &slug)
        .await
        .map_err(store_error_to_response)?;
    let selected = select_variant(&variants, query.variant.as_deref()).ok_or_else(|| {
        store_error_to_response(StoreError::ProductNotFound {
            product_id: slug.clone(),
        })
    })?;

    let options = variants
        .iter()
        .map(|p| VariantOption {
            id: p.id.clone(),
            variant: p.variant().map(str::to_string),
            formatted_price: p.default_price.as_ref().map(Price::display),
            selected: p.id == selected.id,
        })
        .collect();

    let category = selected
        .category()
        .and_then(|c| state.store.category(c))
        .cloned();

    Ok(Json(ProductDetailResponse {
        product: ProductView::from(selected),
        variants: options,
        category,
    }))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<AppState>) -> Json<Vec<Category>> {
    Json(state.store.categories.clone())
}

/// `GET /api/categories/{slug}`
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let category = state
        .store
        .category(&slug)
        .cloned()
        .ok_or_else(|| store_error_to_response(StoreError::CategoryNotFound { slug: slug.clone() }))?;

    let catalog = cached_catalog(&state, MAX_PRODUCTS)
        .await
        .map_err(store_error_to_response)?;

    Ok(Json(CategoryResponse {
        category,
        products: catalog.in_category(&slug).map(ProductView::from).collect(),
    }))
}

/// `GET /api/products/{slug}/recommendations?limit=N`
///
/// Empty when search is not configured or the slug is unknown. Search
/// failures are logged and also read as empty.
#[instrument(skip(state))]
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let Some(recommender) = state.recommender.clone() else {
        return Ok(Json(Vec::new()));
    };
    let limit = query.limit.unwrap_or(DEFAULT_RECOMMENDATIONS).clamp(1, 20);

    let variants = cached_variants(&state, &slug)
        .await
        .map_err(store_error_to_response)?;
    let Some(product) = variants.first() else {
        return Ok(Json(Vec::new()));
    };

    let key = format!("recommend:{}:{}", product.id, limit);
    let result = state
        .cache
        .get_or_insert_with(&key, &[tags::RECOMMENDED], || {
            recommender.recommend(&product.id, limit)
        })
        .await;

    match result {
        Ok(items) => Ok(Json(items)),
        Err(e) => {
            warn!("Recommendations unavailable for {}: {}", product.id, e);
            Ok(Json(Vec::new()))
        }
    }
}

/// `GET /api/store`
pub async fn get_store(State(state): State<AppState>) -> Json<StoreConfig> {
    Json(state.store.as_ref().clone())
}

/// Listed products sharing `slug`
async fn cached_variants(state: &AppState, slug: &str) -> StoreResult<Vec<Product>> {
    let variants: Vec<Product> = state
        .cache
        .get_or_insert_tagged(
            &format!("product-slug:{}", slug),
            || state.commerce.products_by_slug(slug),
            |variants: &Vec<Product>| {
                let mut t = vec![tags::PRODUCTS.to_string()];
                t.extend(variants.iter().map(|p| tags::product(&p.id)));
                t
            },
        )
        .await?;
    Ok(variants.into_iter().filter(Product::is_listed).collect())
}

/// First `first` products, tagged per product so a stock change drops the
/// listing too
async fn cached_catalog(state: &AppState, first: u32) -> StoreResult<ProductCatalog> {
    let products = state
        .cache
        .get_or_insert_tagged(
            &format!("products:{}", first),
            || state.commerce.list_products(first),
            |products: &Vec<Product>| {
                let mut t = vec![tags::PRODUCTS.to_string(), tags::SEARCH.to_string()];
                t.extend(products.iter().map(|p| tags::product(&p.id)));
                t
            },
        )
        .await?;
    Ok(ProductCatalog::new(products))
}
