//! Stripe webhook verification and event parsing
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! The signed payload is `"{t}.{body}"` under HMAC-SHA256 with the endpoint
//! secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use domain_payment::{GatewayEvent, GatewayEventKind};

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook signature is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing a timestamp or v1 signature")]
    MalformedHeader,

    #[error("signature timestamp is not a number")]
    InvalidTimestamp,

    #[error("signature timestamp is {age_secs}s from now, tolerance is {tolerance_secs}s")]
    OutsideTolerance { age_secs: i64, tolerance_secs: i64 },

    #[error("webhook secret is not configured")]
    MissingSecret,

    #[error("no v1 signature matches the payload")]
    Mismatch,
}

/// Checks a `Stripe-Signature` header against the raw request body
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(v1) = part.strip_prefix("v1=") {
            signatures.push(v1);
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    let age_secs = now.timestamp() - ts;
    if age_secs.abs() > tolerance_secs {
        tracing::warn!(age_secs, tolerance_secs, "Stripe webhook signature outside tolerance");
        return Err(SignatureError::OutsideTolerance {
            age_secs,
            tolerance_secs,
        });
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Builds a `Stripe-Signature` header for `payload`
///
/// Used by tests and local tooling that replays events.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

/// Maps a Stripe event body onto a [`GatewayEvent`]
///
/// `payment_intent.*` events carry the intent as their object; for
/// `charge.refunded` the object is the charge and the intent is referenced by
/// its `payment_intent` field.
pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent, serde_json::Error> {
    let event: StripeEvent = serde_json::from_slice(payload)?;
    let kind = GatewayEventKind::from_type(&event.event_type);
    let object = &event.data.object;
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    let (intent_id, charge_id) = match kind {
        GatewayEventKind::ChargeRefunded => (text("payment_intent"), text("id")),
        _ => (text("id"), expandable_id(object.get("latest_charge"))),
    };
    let failure_message = object
        .get("last_payment_error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| text("failure_message"));

    Ok(GatewayEvent {
        id: event.id,
        kind,
        intent_id,
        charge_id,
        amount_refunded_minor: object.get("amount_refunded").and_then(Value::as_i64),
        failure_message,
        raw: event.data.object,
    })
}

/// Stripe fields that are either an id string or an expanded object
pub(crate) fn expandable_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
