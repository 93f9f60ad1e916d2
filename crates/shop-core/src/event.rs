//! # Webhook Event Types
//!
//! Provider-neutral view of a verified payment webhook.

use crate::cart::PaymentIntent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Webhook event types the storefront reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Payment succeeded; stock is taken
    PaymentSucceeded,
    /// Payment failed
    PaymentFailed,
    /// Unknown event (passthrough)
    Unknown(String),
}

impl WebhookEventType {
    /// Map a Stripe event type string
    pub fn from_stripe(kind: &str) -> Self {
        match kind {
            "payment_intent.succeeded" => WebhookEventType::PaymentSucceeded,
            "payment_intent.payment_failed" => WebhookEventType::PaymentFailed,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }
}

/// A verified and parsed webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider (evt_...)
    pub event_id: String,

    /// Event type
    pub event_type: WebhookEventType,

    /// Raw provider type string
    pub raw_type: String,

    /// PaymentIntent carried by `payment_intent.*` events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent: Option<PaymentIntent>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}
