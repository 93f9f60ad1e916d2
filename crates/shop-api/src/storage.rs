//! # Vercel Blob Storage
//!
//! [`ImageStore`] that PUTs product images to Vercel Blob under
//! `products/{productId}/{filename}` and returns the public URL.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shop_core::{ImageStore, ImageUpload, StoreError, StoreResult};
use std::time::Duration;
use tracing::{info, instrument};

const BLOB_API_BASE: &str = "https://blob.vercel-storage.com";
const BLOB_API_VERSION: &str = "7";

/// Vercel Blob client authenticated with a read-write token
#[derive(Debug, Clone)]
pub struct VercelBlobStore {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl VercelBlobStore {
    pub fn new(token: impl Into<String>) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token: SecretString::from(token.into()),
            base_url: BLOB_API_BASE.to_string(),
        })
    }

    /// Load from `BLOB_READ_WRITE_TOKEN`
    pub fn from_env() -> StoreResult<Self> {
        let token = std::env::var("BLOB_READ_WRITE_TOKEN").map_err(|_| {
            StoreError::Configuration("BLOB_READ_WRITE_TOKEN not set".to_string())
        })?;
        Self::new(token)
    }

    /// Builder: point at another API host (tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Blob pathname for an upload; the file name is reduced to URL-safe
/// characters
pub fn blob_pathname(product_id: &str, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let safe = if safe.trim_matches('-').is_empty() {
        "image".to_string()
    } else {
        safe
    };
    format!("products/{}/{}", product_id, safe)
}

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct BlobErrorResponse {
    error: BlobError,
}

#[derive(Debug, Deserialize)]
struct BlobError {
    message: String,
}

#[async_trait]
impl ImageStore for VercelBlobStore {
    #[instrument(skip(self, upload), fields(product_id = %upload.product_id, file = %upload.file_name, size = upload.size()))]
    async fn upload(&self, upload: ImageUpload) -> StoreResult<String> {
        let pathname = blob_pathname(&upload.product_id, &upload.file_name);

        let response = self
            .client
            .put(format!("{}/{}", self.base_url, pathname))
            .bearer_auth(self.token.expose_secret())
            .header("x-api-version", BLOB_API_VERSION)
            .header("x-content-type", &upload.content_type)
            .header("x-add-random-suffix", "1")
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<BlobErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
            return Err(StoreError::UploadFailed(message));
        }

        let blob: BlobPutResponse = serde_json::from_str(&body)
            .map_err(|e| StoreError::Serialization(format!("Bad blob response: {}", e)))?;

        info!("Uploaded {} to {}", pathname, blob.url);
        Ok(blob.url)
    }

    fn store_name(&self) -> &'static str {
        "blob"
    }
}
