//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the commerce backend, image store, recommender, tag cache and
//! admin credentials, plus the configuration they were built from.

use crate::auth::AdminCredentials;
use crate::cache::TagCache;
use crate::cart::CartService;
use crate::search::TrieveRecommender;
use crate::storage::VercelBlobStore;
use crate::webhook::StockWebhookHandler;
use moka::future::Cache;
use secrecy::ExposeSecret;
use shop_core::{BoxedCommerceProvider, BoxedImageStore, BoxedRecommender, StoreConfig};
use shop_stripe::{StripeClient, StripeFileStore, WebhookVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// How long processed webhook event ids are remembered
const PROCESSED_EVENT_TTL: Duration = Duration::from_secs(72 * 60 * 60);

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Where uploaded product images are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStorage {
    Stripe,
    Blob,
}

impl ImageStorage {
    /// Unknown values fall back to Stripe Files
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "blob" | "vercel" | "vercel-blob" => Self::Blob,
            _ => Self::Stripe,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the storefront
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    pub log_format: LogFormat,
    pub image_storage: ImageStorage,
    /// Explicit path to `store.toml`
    pub store_config_path: Option<String>,
    /// Request body limit for image uploads
    pub max_upload_bytes: usize,
    /// TTL of tag-cached catalog responses
    pub cache_ttl: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_format: match std::env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            image_storage: std::env::var("IMAGE_STORAGE")
                .map(|v| ImageStorage::parse(&v))
                .unwrap_or(ImageStorage::Stripe),
            store_config_path: std::env::var("STORE_CONFIG").ok(),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            cache_ttl: Duration::from_secs(
                std::env::var("CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            ),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Cookies get the `Secure` flag in production or behind https
    pub fn secure_cookies(&self) -> bool {
        self.is_production() || self.base_url.starts_with("https://")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
            image_storage: ImageStorage::Stripe,
            store_config_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Catalog and PaymentIntent backend
    pub commerce: BoxedCommerceProvider,
    /// Destination for admin image uploads
    pub images: BoxedImageStore,
    /// Product recommendations; `None` when search is not configured
    pub recommender: Option<BoxedRecommender>,
    /// Categories, social links and contact details
    pub store: Arc<StoreConfig>,
    pub admin: AdminCredentials,
    /// `None` when `STRIPE_WEBHOOK_SECRET` is unset
    pub webhook: Option<WebhookVerifier>,
    pub cache: TagCache,
    /// Webhook event ids already handled
    pub processed_events: Cache<String, ()>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build the state from environment variables
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(AppConfig::from_env())
    }

    /// Build the Stripe-backed state for an already loaded config
    pub fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        let stripe = StripeClient::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
        let webhook = stripe
            .config()
            .webhook_secret
            .as_ref()
            .map(|secret| WebhookVerifier::new(secret.expose_secret()));
        let stripe = Arc::new(stripe);

        let images: BoxedImageStore = match config.image_storage {
            ImageStorage::Stripe => Arc::new(StripeFileStore::new(stripe.clone())),
            ImageStorage::Blob => Arc::new(
                VercelBlobStore::from_env()
                    .map_err(|e| anyhow::anyhow!("Failed to initialize blob storage: {}", e))?,
            ),
        };

        let recommender = match TrieveRecommender::from_env() {
            Some(trieve) => Some(Arc::new(
                trieve.map_err(|e| anyhow::anyhow!("Failed to initialize search: {}", e))?,
            ) as BoxedRecommender),
            None => {
                tracing::warn!("TRIEVE_API_KEY not set, recommendations disabled");
                None
            }
        };

        let store = load_store_config(config.store_config_path.as_deref())?;

        Ok(Self::from_parts(config, stripe, images)
            .with_store(store)
            .with_admin(AdminCredentials::from_env())
            .with_recommender(recommender)
            .with_webhook(webhook))
    }

    /// State over explicit collaborators, with empty store config, no
    /// recommender, no webhook secret and no admin password
    pub fn from_parts(
        config: AppConfig,
        commerce: BoxedCommerceProvider,
        images: BoxedImageStore,
    ) -> Self {
        Self {
            commerce,
            images,
            recommender: None,
            store: Arc::new(StoreConfig::default()),
            admin: AdminCredentials::default(),
            webhook: None,
            cache: TagCache::new(config.cache_ttl),
            processed_events: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(PROCESSED_EVENT_TTL)
                .build(),
            config,
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn with_admin(mut self, admin: AdminCredentials) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_recommender(mut self, recommender: Option<BoxedRecommender>) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn with_webhook(mut self, webhook: Option<WebhookVerifier>) -> Self {
        self.webhook = webhook;
        self
    }

    /// Cart operations over this state's backend and cache
    pub fn carts(&self) -> CartService {
        CartService::new(self.commerce.clone(), self.cache.clone())
    }

    /// Handler applying `payment_intent.succeeded` to stock
    pub fn stock_handler(&self) -> StockWebhookHandler {
        StockWebhookHandler::new(self.commerce.clone(), self.cache.clone())
    }
}

/// Load store config from `STORE_CONFIG` or the usual `config/` locations
fn load_store_config(explicit: Option<&str>) -> anyhow::Result<StoreConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
        return parse_store_config(&content, path);
    }

    let config_paths = [
        "config/store.toml",
        "../config/store.toml",
        "../../config/store.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_store_config(&content, path);
        }
    }

    tracing::warn!("No store config found, using empty store config");
    Ok(StoreConfig::default())
}

fn parse_store_config(content: &str, path: &str) -> anyhow::Result<StoreConfig> {
    let store = StoreConfig::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    tracing::info!("Loaded {} categories from {}", store.categories.len(), path);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_secure_cookies() {
        assert!(!AppConfig::default().secure_cookies());

        let prod = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(prod.secure_cookies());

        let https = AppConfig {
            base_url: "https://shop.example.com".to_string(),
            ..AppConfig::default()
        };
        assert!(https.secure_cookies());
    }

    #[test]
    fn test_image_storage_parse() {
        assert_eq!(ImageStorage::parse("blob"), ImageStorage::Blob);
        assert_eq!(ImageStorage::parse(" Vercel "), ImageStorage::Blob);
        assert_eq!(ImageStorage::parse("stripe"), ImageStorage::Stripe);
        assert_eq!(ImageStorage::parse("s3"), ImageStorage::Stripe);
    }

    #[test]
    fn test_parse_store_config_reports_path() {
        let err = parse_store_config("categories = 3", "config/store.toml").unwrap_err();
        assert!(err.to_string().contains("config/store.toml"));
    }
}
