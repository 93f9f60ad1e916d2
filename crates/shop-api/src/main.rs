//! # storefront
//!
//! Stripe-backed storefront API.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export ADMIN_PASSWORD=...
//!
//! # Run the server
//! storefront
//! ```

use shop_api::state::LogFormat;
use shop_api::{routes, AppConfig, AppState};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(config.log_format);

    print_banner();

    let state = AppState::with_config(config)?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Commerce provider: {}", state.commerce.provider_name());
    info!("Image storage: {}", state.images.store_name());
    info!("Categories: {}", state.store.categories.len());
    if state.webhook.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set, webhook will answer 500");
    }
    if !state.admin.is_configured() {
        warn!("ADMIN_PASSWORD not set, admin login disabled");
    }

    let app = routes::create_router(state);

    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Products: GET http://{}/api/products", addr);
        info!("Webhook: POST http://{}/api/stripe-webhook", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
    }
}

fn print_banner() {
    println!(
        r#"
  storefront-rs
  ━━━━━━━━━━━━━━━━━━━━━━━
  Stripe-backed storefront
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
