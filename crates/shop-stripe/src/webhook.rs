//! # Stripe Webhook Handling
//!
//! Signature verification for `Stripe-Signature` headers and an async
//! handler trait the storefront implements to react to events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shop_core::secure::constant_time_eq;
use shop_core::{PaymentIntent, StoreError, StoreResult, WebhookEvent, WebhookEventType};
use tracing::{debug, info, warn};

/// Maximum age of a signed payload, in seconds
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// Verifies webhook signatures with the endpoint's signing secret
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Verify against the current time and parse the event
    pub fn verify(&self, payload: &[u8], signature: &str) -> StoreResult<WebhookEvent> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }

    /// Verify against an explicit clock (unix seconds)
    pub fn verify_at(&self, payload: &[u8], signature: &str, now: i64) -> StoreResult<WebhookEvent> {
        let sig_parts = parse_signature_header(signature)?;

        // A timestamp far enough from `now` to overflow the difference is stale too
        let fresh = now
            .checked_sub(sig_parts.timestamp)
            .map(i64::unsigned_abs)
            .is_some_and(|age| age <= self.tolerance_secs);
        if !fresh {
            return Err(StoreError::WebhookVerificationFailed(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        let expected_sig = compute_signature(self.secret.expose_secret(), sig_parts.timestamp, payload);

        let valid = sig_parts
            .signatures
            .iter()
            .any(|sig| constant_time_eq(sig, &expected_sig));

        if !valid {
            return Err(StoreError::WebhookVerificationFailed(
                "Signature mismatch".to_string(),
            ));
        }

        parse_event(payload)
    }
}

/// Build a `Stripe-Signature` header for `payload` (local tooling and tests)
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},v1={}", timestamp, compute_signature(secret, timestamp, payload))
}

fn parse_event(payload: &[u8]) -> StoreResult<WebhookEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        StoreError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    debug!("Verified Stripe webhook: type={}", event.event_type);

    let payment_intent = if event.event_type.starts_with("payment_intent.") {
        let intent: PaymentIntent =
            serde_json::from_value(serde_json::Value::Object(event.data.object)).map_err(
                |e| StoreError::WebhookParseError(format!("Bad PaymentIntent object: {}", e)),
            )?;
        Some(intent)
    } else {
        None
    };

    Ok(WebhookEvent {
        event_id: event.id,
        event_type: WebhookEventType::from_stripe(&event.event_type),
        raw_type: event.event_type,
        payment_intent,
        timestamp: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

/// Webhook event handler trait
///
/// Implement this trait to handle different webhook events.
#[async_trait]
#[allow(unused_variables)]
pub trait WebhookHandler: Send + Sync {
    /// Called when a PaymentIntent succeeds
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> StoreResult<()> {
        info!(
            "Payment succeeded: {:?}",
            event.payment_intent.as_ref().map(|pi| &pi.id)
        );
        Ok(())
    }

    /// Called when a PaymentIntent fails
    async fn on_payment_failed(&self, event: &WebhookEvent) -> StoreResult<()> {
        warn!(
            "Payment failed: {:?}",
            event.payment_intent.as_ref().map(|pi| &pi.id)
        );
        Ok(())
    }

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &WebhookEvent) -> StoreResult<()> {
        info!("Unhandled event type: {}", event.raw_type);
        Ok(())
    }
}

/// Dispatch a webhook event to the appropriate handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &WebhookEvent,
) -> StoreResult<()> {
    match &event.event_type {
        WebhookEventType::PaymentSucceeded => handler.on_payment_succeeded(event).await,
        WebhookEventType::PaymentFailed => handler.on_payment_failed(event).await,
        WebhookEventType::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Webhook Signature Verification
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> StoreResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        StoreError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(StoreError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    fn succeeded_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "created": NOW,
            "data": { "object": {
                "id": "pi_1",
                "object": "payment_intent",
                "amount": 2000,
                "currency": "usd",
                "client_secret": null,
                "status": "succeeded",
                "metadata": { "productIds": "prod_1", "productQuantities": "2" }
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v1=def456,v0=old").unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);
        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=1").is_err());
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let header = sign_payload(SECRET, NOW, b"{}");
        let sig = header.split("v1=").nth(1).unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_verify_valid_event() {
        let payload = succeeded_payload();
        let header = sign_payload(SECRET, NOW, &payload);

        let event = WebhookVerifier::new(SECRET)
            .verify_at(&payload, &header, NOW + 10)
            .unwrap();

        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.event_type, WebhookEventType::PaymentSucceeded);
        let intent = event.payment_intent.unwrap();
        assert_eq!(intent.id, "pi_1");
        assert_eq!(intent.metadata["productQuantities"], "2");
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let payload = succeeded_payload();
        let header = sign_payload(SECRET, NOW, &payload);
        let mut tampered = payload.clone();
        tampered.extend_from_slice(b" ");

        let err = WebhookVerifier::new(SECRET)
            .verify_at(&tampered, &header, NOW)
            .unwrap_err();
        assert!(matches!(err, StoreError::WebhookVerificationFailed(_)));
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_stale_timestamp() {
        let payload = succeeded_payload();
        let header = sign_payload("whsec_other", NOW, &payload);
        assert!(WebhookVerifier::new(SECRET).verify_at(&payload, &header, NOW).is_err());

        let header = sign_payload(SECRET, NOW, &payload);
        assert!(WebhookVerifier::new(SECRET)
            .verify_at(&payload, &header, NOW + SIGNATURE_TOLERANCE_SECS as i64 + 1)
            .is_err());
    }

    #[test]
    fn test_verify_rejects_extreme_timestamps() {
        let verifier = WebhookVerifier::new(SECRET);

        let err = verifier
            .verify_at(b"{}", "t=-9223372036854775808,v1=00", NOW)
            .unwrap_err();
        assert!(matches!(err, StoreError::WebhookVerificationFailed(_)));

        let header = format!("t={},v1=00", i64::MAX);
        assert!(verifier.verify_at(b"{}", &header, -NOW).is_err());
        assert!(verifier.verify_at(b"{}", &header, NOW).is_err());
    }

    #[test]
    fn test_verifier_debug_hides_secret() {
        let rendered = format!("{:?}", WebhookVerifier::new(SECRET));
        assert!(!rendered.contains(SECRET));
    }

    #[tokio::test]
    async fn test_dispatch_webhook() {
        struct TestHandler {
            called: AtomicBool,
        }

        #[async_trait]
        impl WebhookHandler for TestHandler {
            async fn on_payment_succeeded(&self, _event: &WebhookEvent) -> StoreResult<()> {
                self.called.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let handler = TestHandler {
            called: AtomicBool::new(false),
        };

        let payload = succeeded_payload();
        let header = sign_payload(SECRET, NOW, &payload);
        let event = WebhookVerifier::new(SECRET).verify_at(&payload, &header, NOW).unwrap();
        dispatch_webhook_event(&handler, &event).await.unwrap();

        assert!(handler.called.load(Ordering::SeqCst));
    }
}
