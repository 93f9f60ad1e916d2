//! # Stripe Configuration
//!
//! Keys and endpoints for the catalog, PaymentIntent and Files APIs, read
//! from the environment. Keys are held as [`SecretString`] and only exposed
//! where a request needs them.

use secrecy::{ExposeSecret, SecretString};
use shop_core::StoreError;
use std::env;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_FILES_BASE_URL: &str = "https://files.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Credentials and endpoints for one Stripe account
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_..., sk_live_... or a restricted rk_ key)
    pub secret_key: SecretString,

    /// Webhook signing secret (whsec_...). The webhook endpoint refuses
    /// events when this is absent.
    pub webhook_secret: Option<SecretString>,

    /// REST host; overridden to point at a mock server
    pub api_base_url: String,

    /// Files API base URL (uploads go to a separate host)
    pub files_base_url: String,

    /// API version
    pub api_version: String,
}

impl StripeConfig {
    /// Read the account config from the environment (`.env` honoured).
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    ///
    /// Optional:
    /// - `STRIPE_WEBHOOK_SECRET`
    /// - `STRIPE_API_BASE_URL`, `STRIPE_FILES_BASE_URL` (local mocks)
    pub fn from_env() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();

        let secret_key = env::var("STRIPE_SECRET_KEY")
            .map(SecretString::from)
            .map_err(|_| StoreError::Configuration("STRIPE_SECRET_KEY not set".to_string()))?;

        let webhook_secret = env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let config = Self {
            secret_key,
            webhook_secret,
            api_base_url: env::var("STRIPE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            files_base_url: env::var("STRIPE_FILES_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_FILES_BASE_URL.to_string()),
            api_version: DEFAULT_API_VERSION.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::from(secret_key.into()),
            webhook_secret: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            files_base_url: DEFAULT_FILES_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Check key formats
    pub fn validate(&self) -> Result<(), StoreError> {
        let key_ok = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"]
            .iter()
            .any(|prefix| self.secret_key.expose_secret().starts_with(prefix));
        if !key_ok {
            return Err(StoreError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_, sk_live_, rk_test_ or rk_live_"
                    .to_string(),
            ));
        }

        if let Some(secret) = &self.webhook_secret {
            if !secret.expose_secret().starts_with("whsec_") {
                return Err(StoreError::Configuration(
                    "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// `sk_test_` / `rk_test_` keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.expose_secret().contains("_test_")
    }

    /// `sk_live_` / `rk_live_` keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.expose_secret().contains("_live_")
    }

    /// Builder: set webhook signing secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Point REST calls at another host
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Point file uploads at another host
    pub fn with_files_base_url(mut self, url: impl Into<String>) -> Self {
        self.files_base_url = url.into();
        self
    }
}
