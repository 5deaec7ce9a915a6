//! Stripe adapter tests against a local mock HTTP server

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use core_kernel::PortError;
use domain_payment::{
    CreateIntentRequest, GatewayEventKind, IntentStatus, PaymentGateway, RefundRequest,
};
use infra_gateway::{sign_payload, StripeConfig, StripeGateway};

const WEBHOOK_SECRET: &str = "whsec_test";

async fn gateway() -> (MockServer, StripeGateway) {
    let server = MockServer::start().await;
    let config = StripeConfig::new("sk_test_123", WEBHOOK_SECRET).api_base(server.uri());
    let gateway = StripeGateway::new(config).unwrap();
    (server, gateway)
}

fn intent_body(status: &str) -> serde_json::Value {
    json!({
        "id": "pi_123",
        "object": "payment_intent",
        "status": status,
        "client_secret": "pi_123_secret_abc",
        "amount": 95000,
        "currency": "gbp",
        "latest_charge": null,
        "last_payment_error": null
    })
}

// ============================================================================
// Payment intents
// ============================================================================

mod intent_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_intent_sends_form_and_idempotency_key() {
        let (server, gateway) = gateway().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header_exists("authorization"))
            .and(header("Idempotency-Key", "create-abc"))
            .and(body_string_contains("amount=95000"))
            .and(body_string_contains("currency=gbp"))
            .and(body_string_contains("metadata%5Bpayment_id%5D=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(intent_body("requires_payment_method")))
            .expect(1)
            .mount(&server)
            .await;

        let mut metadata = BTreeMap::new();
        metadata.insert("payment_id".to_string(), "abc".to_string());
        let intent = gateway
            .create_intent(CreateIntentRequest {
                amount_minor: 95000,
                currency: "GBP".to_string(),
                description: Some("April rent".to_string()),
                receipt_email: None,
                metadata,
                idempotency_key: Some("create-abc".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
        assert_eq!(intent.amount_minor, 95000);
    }

    #[tokio::test]
    async fn test_confirm_intent_reads_latest_charge() {
        let (server, gateway) = gateway().await;
        let mut body = intent_body("succeeded");
        body["latest_charge"] = json!("ch_789");
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_123/confirm"))
            .and(body_string_contains("payment_method=pm_card_visa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let intent = gateway
            .confirm_intent("pi_123", Some("pm_card_visa"))
            .await
            .unwrap();

        assert_eq!(intent.status, IntentStatus::Succeeded);
        assert_eq!(intent.latest_charge.as_deref(), Some("ch_789"));
    }

    #[tokio::test]
    async fn test_retrieve_unknown_status_is_preserved_as_unknown() {
        let (server, gateway) = gateway().await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(intent_body("brand_new_status")))
            .mount(&server)
            .await;

        let intent = gateway.retrieve_intent("pi_123").await.unwrap();
        assert_eq!(intent.status, IntentStatus::Unknown);
    }

    #[tokio::test]
    async fn test_cancel_intent() {
        let (server, gateway) = gateway().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_123/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(intent_body("canceled")))
            .expect(1)
            .mount(&server)
            .await;

        let intent = gateway.cancel_intent("pi_123").await.unwrap();
        assert_eq!(intent.status, IntentStatus::Canceled);
    }
}

// ============================================================================
// Refunds
// ============================================================================

mod refund_tests {
    use super::*;

    #[tokio::test]
    async fn test_refund_prefers_charge_id() {
        let (server, gateway) = gateway().await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_string_contains("charge=ch_789"))
            .and(body_string_contains("amount=10000"))
            .and(body_string_contains("reason=requested_by_customer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "re_1",
                "object": "refund",
                "status": "succeeded",
                "amount": 10000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let refund = gateway
            .create_refund(RefundRequest {
                charge_id: Some("ch_789".to_string()),
                intent_id: Some("pi_123".to_string()),
                amount_minor: 10000,
                reason: Some("Boiler outage".to_string()),
                ..RefundRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(refund.id, "re_1");
        assert_eq!(refund.status, "succeeded");
        assert_eq!(refund.amount_minor, 10000);
    }

    #[tokio::test]
    async fn test_refund_without_target_is_validation_error() {
        let (_server, gateway) = gateway().await;
        let err = gateway
            .create_refund(RefundRequest {
                amount_minor: 100,
                ..RefundRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));
    }
}

// ============================================================================
// Error mapping
// ============================================================================

mod error_tests {
    use super::*;

    async fn failing(status: u16, body: serde_json::Value) -> PortError {
        let (server, gateway) = gateway().await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_123"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        gateway.retrieve_intent("pi_123").await.unwrap_err()
    }

    #[tokio::test]
    async fn test_card_error_is_rejected_with_decline_code() {
        let err = failing(
            402,
            json!({ "error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "insufficient_funds",
                "message": "Your card has insufficient funds."
            }}),
        )
        .await;

        match err {
            PortError::Rejected { service, message, code } => {
                assert_eq!(service, "stripe");
                assert_eq!(message, "Your card has insufficient funds.");
                assert_eq!(code.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_key_is_unauthorized() {
        let err = failing(401, json!({ "error": { "message": "Invalid API Key" } })).await;
        assert!(matches!(err, PortError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_missing_intent_is_not_found() {
        let err = failing(404, json!({ "error": { "message": "No such payment_intent" } })).await;
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let err = failing(503, json!({})).await;
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let err = failing(429, json!({ "error": { "message": "Too many requests" } })).await;
        assert!(matches!(err, PortError::RateLimited { .. }));
        assert!(err.is_transient());
    }
}

// ============================================================================
// Webhooks
// ============================================================================

mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_webhook_round_trip() {
        let (_server, gateway) = gateway().await;
        let body = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "latest_charge": "ch_1" } }
        })
        .to_string();
        let signature = sign_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());

        let event = gateway.verify_webhook(body.as_bytes(), &signature).unwrap();
        assert_eq!(event.kind, GatewayEventKind::IntentSucceeded);
        assert_eq!(event.intent_id.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_unauthorized() {
        let (_server, gateway) = gateway().await;
        let body = br#"{"id":"evt_1","type":"charge.refunded","data":{"object":{}}}"#;
        let signature = sign_payload(body, "whsec_other", Utc::now().timestamp());

        let err = gateway.verify_webhook(body, &signature).unwrap_err();
        assert!(matches!(err, PortError::Unauthorized { .. }));
    }
}
