//! Stripe Payment Intents adapter
//!
//! Talks to the Stripe REST API with form-encoded requests and basic auth,
//! and implements the `PaymentGateway` port on top of it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use core_kernel::{DomainPort, PortError};
use domain_payment::{
    CreateIntentRequest, GatewayEvent, GatewayIntent, GatewayRefund, IntentStatus,
    PaymentGateway, RefundRequest,
};

use crate::config::StripeConfig;
use crate::webhook::{self, expandable_id, SignatureError};

const SERVICE: &str = "stripe";

/// Stripe-backed implementation of the `PaymentGateway` port
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: IntentStatus,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    latest_charge: Option<Value>,
    last_payment_error: Option<StripeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    status: Option<String>,
    amount: i64,
}

impl StripeGateway {
    /// Creates a gateway with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns `PortError::Internal` if the HTTP client cannot be built
    pub fn new(config: StripeConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PortError::internal(format!("failed to build Stripe client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base, path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .basic_auth(&self.config.secret_key, None::<&str>)
    }

    async fn send<T>(&self, operation: &str, request: RequestBuilder) -> Result<(T, Value), PortError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let started = std::time::Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, e, self.config.timeout))?;
        let status = response.status();
        debug!(operation, status = %status, elapsed_ms = started.elapsed().as_millis() as u64, "Stripe response");

        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| PortError::transformation(format!("unreadable Stripe response: {}", e)))?;
        let parsed = serde_json::from_value(raw.clone()).map_err(|e| {
            PortError::transformation(format!("unexpected Stripe {} response: {}", operation, e))
        })?;
        Ok((parsed, raw))
    }
}

impl DomainPort for StripeGateway {}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        SERVICE
    }

    #[instrument(skip(self, request), fields(amount_minor = request.amount_minor, currency = %request.currency))]
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<GatewayIntent, PortError> {
        let mut form = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(description) = request.description {
            form.push(("description".to_string(), description));
        }
        if let Some(email) = request.receipt_email {
            form.push(("receipt_email".to_string(), email));
        }
        for (key, value) in request.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let mut builder = self.post("payment_intents").form(&form);
        if let Some(key) = request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let (intent, raw): (StripeIntent, Value) = self.send("create_intent", builder).await?;
        info!(intent_id = %intent.id, status = ?intent.status, "Stripe payment intent created");
        Ok(intent.into_gateway(raw))
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError> {
        let builder = self
            .client
            .get(self.url(&format!("payment_intents/{}", intent_id)))
            .basic_auth(&self.config.secret_key, None::<&str>);
        let (intent, raw): (StripeIntent, Value) = self.send("retrieve_intent", builder).await?;
        Ok(intent.into_gateway(raw))
    }

    #[instrument(skip(self))]
    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> Result<GatewayIntent, PortError> {
        let mut form: Vec<(&str, &str)> = Vec::new();
        if let Some(method) = payment_method {
            form.push(("payment_method", method));
        }
        let builder = self
            .post(&format!("payment_intents/{}/confirm", intent_id))
            .form(&form);
        let (intent, raw): (StripeIntent, Value) = self.send("confirm_intent", builder).await?;
        info!(intent_id, status = ?intent.status, "Stripe payment intent confirmed");
        Ok(intent.into_gateway(raw))
    }

    #[instrument(skip(self))]
    async fn cancel_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError> {
        let builder = self.post(&format!("payment_intents/{}/cancel", intent_id));
        let (intent, raw): (StripeIntent, Value) = self.send("cancel_intent", builder).await?;
        info!(intent_id, "Stripe payment intent cancelled");
        Ok(intent.into_gateway(raw))
    }

    #[instrument(skip(self, request), fields(amount_minor = request.amount_minor))]
    async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PortError> {
        let mut form = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("reason".to_string(), "requested_by_customer".to_string()),
        ];
        match (request.charge_id, request.intent_id) {
            (Some(charge), _) => form.push(("charge".to_string(), charge)),
            (None, Some(intent)) => form.push(("payment_intent".to_string(), intent)),
            (None, None) => {
                return Err(PortError::validation(
                    "a refund needs a charge id or a payment intent id",
                ))
            }
        }
        if let Some(reason) = request.reason {
            form.push(("metadata[refund_reason]".to_string(), reason));
        }
        for (key, value) in request.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let mut builder = self.post("refunds").form(&form);
        if let Some(key) = request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let (refund, raw): (StripeRefund, Value) = self.send("create_refund", builder).await?;
        info!(refund_id = %refund.id, amount_minor = refund.amount, "Stripe refund created");
        Ok(GatewayRefund {
            id: refund.id,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
            amount_minor: refund.amount,
            raw,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, PortError> {
        webhook::verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_secs,
            Utc::now(),
        )
        .map_err(|e| match e {
            SignatureError::MissingSecret => PortError::ServiceUnavailable {
                service: "stripe webhooks".to_string(),
            },
            other => PortError::Unauthorized {
                message: other.to_string(),
            },
        })?;

        webhook::parse_event(payload)
            .map_err(|e| PortError::transformation(format!("invalid Stripe event: {}", e)))
    }
}

impl StripeIntent {
    fn into_gateway(self, raw: Value) -> GatewayIntent {
        GatewayIntent {
            latest_charge: expandable_id(self.latest_charge.as_ref()),
            last_error: self.last_payment_error.and_then(|e| e.message),
            id: self.id,
            status: self.status,
            client_secret: self.client_secret,
            amount_minor: self.amount,
            currency: self.currency,
            raw,
        }
    }
}

fn transport_error(operation: &str, error: reqwest::Error, timeout: Duration) -> PortError {
    if error.is_timeout() {
        PortError::Timeout {
            operation: format!("stripe {}", operation),
            duration_ms: timeout.as_millis() as u64,
        }
    } else if error.is_connect() {
        PortError::Connection {
            message: format!("could not reach Stripe: {}", error),
            source: Some(Box::new(error)),
        }
    } else {
        PortError::ServiceUnavailable {
            service: format!("{} ({})", SERVICE, error),
        }
    }
}

/// Maps a non-2xx Stripe response onto a port error
async fn status_error(response: Response) -> PortError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<StripeErrorBody>(&body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let code = detail
        .as_ref()
        .and_then(|d| d.decline_code.clone().or_else(|| d.code.clone()));

    warn!(
        status = %status,
        code = code.as_deref().unwrap_or(""),
        error_type = detail.as_ref().and_then(|d| d.kind.as_deref()).unwrap_or(""),
        "Stripe request failed"
    );

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized { message },
        StatusCode::NOT_FOUND => PortError::NotFound {
            entity_type: "stripe object".to_string(),
            id: message,
        },
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        StatusCode::CONFLICT => PortError::conflict(message),
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: SERVICE.to_string(),
        },
        _ => PortError::rejected(SERVICE, message, code),
    }
}
