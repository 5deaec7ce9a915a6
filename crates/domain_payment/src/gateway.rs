//! Card gateway value types
//!
//! Gateway-neutral shapes for payment intents, refunds and webhook events.
//! Amounts crossing this boundary are integer minor units and currencies are
//! lower-case ISO codes, which is what card gateways expect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a gateway payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// A payment intent as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub id: String,
    pub status: IntentStatus,
    pub client_secret: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    /// Charge created when the intent settled
    pub latest_charge: Option<String>,
    /// Decline or error message from the last attempt
    pub last_error: Option<String>,
    /// Full gateway payload
    pub raw: Value,
}

/// Parameters for creating a payment intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub description: Option<String>,
    pub receipt_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Replays with the same key return the original intent
    pub idempotency_key: Option<String>,
}

/// Parameters for refunding a settled charge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub charge_id: Option<String>,
    pub intent_id: Option<String>,
    pub amount_minor: i64,
    pub reason: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// A refund as reported by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
    pub amount_minor: i64,
    pub raw: Value,
}

/// Webhook event types the service reconciles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    IntentSucceeded,
    IntentPaymentFailed,
    IntentProcessing,
    IntentCanceled,
    ChargeRefunded,
    /// Anything else; acknowledged and ignored
    Other(String),
}

impl GatewayEventKind {
    /// Maps a Stripe-style `type` string
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => GatewayEventKind::IntentSucceeded,
            "payment_intent.payment_failed" => GatewayEventKind::IntentPaymentFailed,
            "payment_intent.processing" => GatewayEventKind::IntentProcessing,
            "payment_intent.canceled" => GatewayEventKind::IntentCanceled,
            "charge.refunded" => GatewayEventKind::ChargeRefunded,
            other => GatewayEventKind::Other(other.to_string()),
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    pub kind: GatewayEventKind,
    pub intent_id: Option<String>,
    pub charge_id: Option<String>,
    /// Cumulative refunded amount on the charge, for `charge.refunded`
    pub amount_refunded_minor: Option<i64>,
    pub failure_message: Option<String>,
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_intent_status_deserializes() {
        let status: IntentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, IntentStatus::Unknown);

        let status: IntentStatus = serde_json::from_str("\"requires_payment_method\"").unwrap();
        assert_eq!(status, IntentStatus::RequiresPaymentMethod);
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            GatewayEventKind::from_type("payment_intent.succeeded"),
            GatewayEventKind::IntentSucceeded
        );
        assert_eq!(
            GatewayEventKind::from_type("customer.created"),
            GatewayEventKind::Other("customer.created".to_string())
        );
    }
}
