//! Stripe webhook endpoint.

use super::{error_response, store_error_to_response, ApiError};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use shop_core::StoreError;
use shop_stripe::dispatch_webhook_event;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

impl WebhookAck {
    fn received() -> Self {
        Self {
            received: true,
            error: None,
            duplicate: false,
        }
    }
}

/// `POST /api/stripe-webhook`
///
/// Processing failures are still acknowledged with 200, so Stripe does not
/// redeliver on its own; the failure is logged. A failed event id is not
/// recorded, so a manual resend is processed again. Event ids already
/// processed are acknowledged without work.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let verifier = state.webhook.as_ref().ok_or_else(|| {
        error!("STRIPE_WEBHOOK_SECRET is not configured");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "STRIPE_WEBHOOK_SECRET is not configured",
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "No signature"))?;

    let event = verifier.verify(&body, signature).map_err(|e| match e {
        StoreError::WebhookVerificationFailed(reason) => {
            warn!("Webhook signature rejected: {}", reason);
            error_response(StatusCode::UNAUTHORIZED, "Invalid signature")
        }
        other => {
            warn!("Webhook payload rejected: {}", other);
            store_error_to_response(other)
        }
    })?;

    info!(
        "Received webhook: type={}, id={}",
        event.raw_type, event.event_id
    );

    if state.processed_events.contains_key(&event.event_id) {
        info!("Webhook {} already processed", event.event_id);
        return Ok(Json(WebhookAck {
            duplicate: true,
            ..WebhookAck::received()
        }));
    }

    let handler = state.stock_handler();
    match dispatch_webhook_event(&handler, &event).await {
        Ok(()) => {
            state
                .processed_events
                .insert(event.event_id.clone(), ())
                .await;
            Ok(Json(WebhookAck::received()))
        }
        Err(e) => {
            error!("Webhook {} processing failed: {}", event.event_id, e);
            Ok(Json(WebhookAck {
                error: Some("Processing failed but acknowledged".to_string()),
                ..WebhookAck::received()
            }))
        }
    }
}
