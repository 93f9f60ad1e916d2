//! # Stripe Files
//!
//! Product images uploaded through the Stripe Files API. Each upload asks
//! Stripe for a public file link so the storefront can render it without
//! credentials.

use crate::client::{StripeClient, StripeList};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use shop_core::{ImageStore, ImageUpload, StoreError, StoreResult};
use std::sync::Arc;
use tracing::{info, instrument};

/// Purpose tag used for uploads; one of the purposes Stripe allows links for
pub const DEFAULT_FILE_PURPOSE: &str = "dispute_evidence";

/// [`ImageStore`] backed by Stripe Files
pub struct StripeFileStore {
    client: Arc<StripeClient>,
    purpose: String,
}

impl StripeFileStore {
    pub fn new(client: Arc<StripeClient>) -> Self {
        Self {
            client,
            purpose: DEFAULT_FILE_PURPOSE.to_string(),
        }
    }

    /// Builder: override the file purpose
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }
}

#[async_trait]
impl ImageStore for StripeFileStore {
    #[instrument(skip(self, upload), fields(product_id = %upload.product_id, file = %upload.file_name, size = upload.size()))]
    async fn upload(&self, upload: ImageUpload) -> StoreResult<String> {
        let config = self.client.config();
        let file_name = upload.file_name.clone();

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| StoreError::InvalidRequest(format!("Bad content type: {}", e)))?;

        let form = Form::new()
            .text("purpose", self.purpose.clone())
            .text("file_link_data[create]", "true")
            .part("file", part);

        let request = self
            .client
            .http()
            .post(format!("{}/v1/files", config.files_base_url))
            .bearer_auth(config.secret_key.expose_secret())
            .header("Stripe-Version", &config.api_version)
            .multipart(form);

        let file: StripeFile = self.client.send(request, None).await?;
        let url = file
            .public_url()
            .ok_or_else(|| StoreError::UploadFailed(format!("Stripe file {} has no URL", file.id)))?;

        info!("Uploaded {} to Stripe as {}", file_name, file.id);
        Ok(url)
    }

    fn store_name(&self) -> &'static str {
        "stripe"
    }
}

#[derive(Debug, Deserialize)]
struct StripeFile {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    links: Option<StripeList<StripeFileLink>>,
}

#[derive(Debug, Deserialize)]
struct StripeFileLink {
    #[serde(default)]
    url: Option<String>,
}

impl StripeFile {
    /// Public link when one was created, else the authenticated file URL
    fn public_url(&self) -> Option<String> {
        self.links
            .as_ref()
            .and_then(|links| links.data.iter().find_map(|l| l.url.clone()))
            .or_else(|| self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_public_url_prefers_link() {
        let file: StripeFile = serde_json::from_value(json!({
            "id": "file_1",
            "url": "https://files.stripe.com/v1/files/file_1/contents",
            "links": { "data": [ { "url": "https://files.stripe.com/links/abc" } ] }
        }))
        .unwrap();
        assert_eq!(file.public_url().as_deref(), Some("https://files.stripe.com/links/abc"));

        let bare: StripeFile = serde_json::from_value(json!({ "id": "file_2" })).unwrap();
        assert_eq!(bare.public_url(), None);
    }

    #[tokio::test]
    async fn test_upload_posts_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .and(body_string_contains("dispute_evidence"))
            .and(body_string_contains("filename=\"rose.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file_1",
                "links": { "data": [ { "url": "https://files.stripe.com/links/rose" } ] }
            })))
            .mount(&server)
            .await;

        let config = StripeConfig::new("sk_test_abc").with_files_base_url(server.uri());
        let store = StripeFileStore::new(Arc::new(StripeClient::new(config).unwrap()));

        let url = store
            .upload(ImageUpload::new("prod_1", "rose.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(url, "https://files.stripe.com/links/rose");
    }
}
