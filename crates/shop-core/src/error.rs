//! # Store Error Types
//!
//! Typed error handling for the storefront.
//! All catalog, cart and upload operations return `Result<T, StoreError>`.

use thiserror::Error;

/// Core error type for all storefront operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Product not found in the catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Product exists but has no usable default price
    #[error("Product price not found: {product_id}")]
    PriceNotFound { product_id: String },

    /// Cart (PaymentIntent) missing or unreadable
    #[error("Cart not found: {cart_id}")]
    CartNotFound { cart_id: String },

    /// Category slug not configured for this store
    #[error("Category not found: {slug}")]
    CategoryNotFound { slug: String },

    /// Commerce provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// File or blob upload rejected
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Admin credentials missing or wrong
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::NetworkError(_)
                | StoreError::RateLimited { .. }
                | StoreError::ProviderError { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Configuration(_) => 500,
            StoreError::InvalidRequest(_) => 400,
            StoreError::ProductNotFound { .. } => 404,
            StoreError::PriceNotFound { .. } => 422,
            StoreError::CartNotFound { .. } => 404,
            StoreError::CategoryNotFound { .. } => 404,
            StoreError::ProviderError { .. } => 502,
            StoreError::NetworkError(_) => 503,
            StoreError::WebhookVerificationFailed(_) => 401,
            StoreError::WebhookParseError(_) => 400,
            StoreError::UploadFailed(_) => 502,
            StoreError::Unauthorized(_) => 401,
            StoreError::RateLimited { .. } => 429,
            StoreError::Internal(_) => 500,
            StoreError::Serialization(_) => 500,
        }
    }

    /// Shorthand for a Stripe-side failure
    pub fn stripe(message: impl Into<String>) -> Self {
        StoreError::ProviderError {
            provider: "stripe".to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for storefront operations
pub type StoreResult<T> = Result<T, StoreError>;
