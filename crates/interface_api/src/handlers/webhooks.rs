//! Card gateway webhook ingestion

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use tracing::{info, warn};

use domain_payment::{PaymentError, WebhookOutcome};

use crate::dto::payment::ApiResponse;
use crate::error::ApiError;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies and reconciles a Stripe event
///
/// The raw body is needed for the signature, so it is read as bytes.
/// Events for unknown intents or out-of-order deliveries are acknowledged
/// with 200 so the sender does not retry them.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookOutcome>>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let event = state
        .service
        .verify_webhook(&body, signature)
        .map_err(|e| {
            warn!(error = %e, "Webhook rejected");
            match e {
                PaymentError::GatewayNotConfigured => ApiError::BadRequest(e.to_string()),
                _ => ApiError::BadRequest("Webhook signature verification failed".to_string()),
            }
        })?;

    info!(event_id = %event.id, kind = ?event.kind, "Webhook received");
    let outcome = state.service.handle_gateway_event(event).await?;
    Ok(Json(ApiResponse::new("Webhook processed", outcome)))
}
