//! Admin endpoints: login, logout, product listing and image upload.

use super::catalog::MAX_PRODUCTS;
use super::{error_response, store_error_to_response, ApiError, JsonOrForm};
use crate::auth::{RequireAdmin, ADMIN_SESSION_COOKIE};
use crate::cache::tags;
use crate::cookies::{removal_cookie, set_cookie_headers};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::product::next_free_slot;
use shop_core::{ImageUpload, Product, StoreError, StoreResult};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

const UPLOAD_FAILED: &str = "Failed to upload images. Please try again.";

/// First metadata slot used for uploaded images; `image1` is reserved
const FIRST_UPLOAD_SLOT: u32 = 2;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub image_urls: Vec<String>,
}

/// A file read from the upload form
#[derive(Debug)]
pub struct PendingImage {
    /// Sort key: N for `imageN`, after all numbered fields for `images`
    pub order: u32,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub product_id: Option<String>,
    pub images: Vec<PendingImage>,
}

/// Form field carrying an image, with its sort key
pub fn image_field_order(name: &str) -> Option<u32> {
    if name == "images" {
        return Some(u32::MAX);
    }
    name.strip_prefix("image")?.parse().ok()
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/admin/login`
#[instrument(skip(state))]
pub async fn login(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<LoginRequest>,
) -> Result<(HeaderMap, Json<SuccessResponse>), ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        ));
    }

    state
        .admin
        .verify(&request.username, &request.password)
        .map_err(|e| match e {
            StoreError::Unauthorized(_) => {
                warn!("Rejected admin login for {}", request.username);
                error_response(StatusCode::UNAUTHORIZED, "Invalid credentials")
            }
            other => {
                error!("Admin login failed: {}", other);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Admin login is not configured")
            }
        })?;

    let cookie = state
        .admin
        .session_cookie(state.config.secure_cookies())
        .map_err(store_error_to_response)?;

    info!("Admin {} logged in", request.username);
    Ok((set_cookie_headers([cookie]), Json(SuccessResponse { success: true })))
}

/// `POST /api/admin/logout`
pub async fn logout() -> (HeaderMap, Json<SuccessResponse>) {
    (
        set_cookie_headers([removal_cookie(ADMIN_SESSION_COOKIE)]),
        Json(SuccessResponse { success: true }),
    )
}

/// `GET /api/admin/products` - every product, hidden ones included
#[instrument(skip_all)]
pub async fn list_products(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .commerce
        .list_products(MAX_PRODUCTS)
        .await
        .map_err(store_error_to_response)?;
    Ok(Json(products))
}

/// `POST /api/admin/upload-product-images` (multipart)
#[instrument(skip_all)]
pub async fn upload_product_images(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_upload_form(multipart).await?;

    let product_id = form
        .product_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Product ID is required"))?;
    if form.images.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "No images provided"));
    }

    let image_urls = attach_images(&state, &product_id, form.images)
        .await
        .map_err(|e| {
            error!("Image upload for {} failed: {}", product_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILED)
        })?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("Successfully uploaded {} images", image_urls.len()),
        image_urls,
    }))
}

/// Collect `productId` and image fields; other fields are ignored
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "productId" {
            let value = field
                .text()
                .await
                .map_err(|e| error_response(e.status(), e.body_text()))?;
            form.product_id = Some(value.trim().to_string());
            continue;
        }

        let Some(order) = image_field_order(&name) else {
            continue;
        };
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| error_response(e.status(), e.body_text()))?;

        if bytes.is_empty() {
            continue;
        }
        form.images.push(PendingImage {
            order,
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    form.images.sort_by_key(|image| image.order);
    Ok(form)
}

/// Upload each image and record the URLs on the product. Individual upload
/// failures are skipped; the URLs that made it are returned.
async fn attach_images(
    state: &AppState,
    product_id: &str,
    images: Vec<PendingImage>,
) -> StoreResult<Vec<String>> {
    let product = state.commerce.retrieve_product(product_id).await?;

    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        let file_name = image.file_name.clone();
        let upload = ImageUpload::new(product_id, image.file_name, image.content_type, image.bytes);
        match state.images.upload(upload).await {
            Ok(url) => urls.push(url),
            Err(e) => warn!("Skipping {} for {}: {}", file_name, product_id, e),
        }
    }

    let slots = assign_image_slots(&product.metadata, &urls);
    if !slots.is_empty() {
        state
            .commerce
            .update_product_metadata(product_id, &slots)
            .await?;
    }

    if product.images.is_empty() {
        if let Some(first) = urls.first() {
            state
                .commerce
                .set_product_images(product_id, std::slice::from_ref(first))
                .await?;
        }
    }

    state
        .cache
        .invalidate_tags(&[&tags::product(product_id), tags::PRODUCTS]);
    info!(
        "Attached {} images to {} via {}",
        urls.len(),
        product_id,
        state.images.store_name()
    );
    Ok(urls)
}

/// `imageK` keys for `urls`, starting at `image2` and skipping slots
/// already present in `existing`
pub fn assign_image_slots(
    existing: &BTreeMap<String, String>,
    urls: &[String],
) -> BTreeMap<String, String> {
    let mut taken = existing.clone();
    let mut assigned = BTreeMap::new();
    let mut slot = FIRST_UPLOAD_SLOT;

    for url in urls {
        slot = next_free_slot(&taken, slot);
        let key = format!("image{}", slot);
        taken.insert(key.clone(), url.clone());
        assigned.insert(key, url.clone());
        slot += 1;
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_field_order() {
        assert_eq!(image_field_order("image0"), Some(0));
        assert_eq!(image_field_order("image12"), Some(12));
        assert_eq!(image_field_order("images"), Some(u32::MAX));
        assert_eq!(image_field_order("productId"), None);
        assert_eq!(image_field_order("imagex"), None);
    }

    #[test]
    fn test_assign_image_slots_skips_taken() {
        let existing = BTreeMap::from([
            ("image2".to_string(), "https://img/2.png".to_string()),
            ("image4".to_string(), "https://img/4.png".to_string()),
            ("stock".to_string(), "3".to_string()),
        ]);
        let urls = vec![
            "https://new/a.png".to_string(),
            "https://new/b.png".to_string(),
            "https://new/c.png".to_string(),
        ];

        let slots = assign_image_slots(&existing, &urls);

        assert_eq!(
            slots,
            BTreeMap::from([
                ("image3".to_string(), "https://new/a.png".to_string()),
                ("image5".to_string(), "https://new/b.png".to_string()),
                ("image6".to_string(), "https://new/c.png".to_string()),
            ])
        );
    }

    #[test]
    fn test_assign_image_slots_empty() {
        assert!(assign_image_slots(&BTreeMap::new(), &[]).is_empty());
    }
}
