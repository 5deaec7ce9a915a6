//! Payment use cases
//!
//! [`PaymentService`] orchestrates the entity, the repository and the card
//! gateway. It never assigns a status directly: every change is a lifecycle
//! event applied through [`Payment`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use core_kernel::{trailing_months, Currency, Money, PaymentId, UserId};

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::{
    CreateIntentRequest, GatewayEvent, GatewayEventKind, GatewayIntent, IntentStatus,
    RefundRequest,
};
use crate::lifecycle::PaymentEvent;
use crate::payment::{
    positive_amount, NewPayment, Payment, PaymentDetails, PaymentMethod, PaymentPatch,
    PaymentStatus, PaymentType,
};
use crate::ports::{Dimension, PaymentGateway, PaymentRepository};
use crate::query::{Page, PaymentFilter, PaymentQuery};
use crate::recurrence::{plan_next_cycle, RecurringRunReport};
use crate::stats::{average_amount, zero_filled, CountAmount, DashboardStats, MonthlyTrend};

/// Tunables for [`PaymentService`]
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Applied when a new payment does not name a currency
    pub default_currency: Currency,
    /// How far back a recurring run looks for due anchors
    pub recurring_lookback: Duration,
    pub top_properties: u32,
    pub recent_payments: u32,
    pub trend_months: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            default_currency: Currency::GBP,
            recurring_lookback: Duration::hours(24),
            top_properties: 10,
            recent_payments: 10,
            trend_months: 12,
        }
    }
}

/// Input for processing a payment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessPayment {
    /// Overrides the intent stored on the payment
    pub payment_intent_id: Option<String>,
    /// Card to confirm the intent with
    pub payment_method_id: Option<String>,
}

/// Input for refunding a payment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundPayment {
    /// Defaults to the full payment amount
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Input for a standalone gateway intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentInput {
    pub amount: Decimal,
    pub currency: Option<Currency>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WebhookOutcome {
    Applied {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
    Ignored {
        reason: String,
    },
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        WebhookOutcome::Ignored {
            reason: reason.into(),
        }
    }
}

/// Payment lifecycle service
pub struct PaymentService {
    repository: Arc<dyn PaymentRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    settings: ServiceSettings,
}

impl PaymentService {
    /// Creates a service without a card gateway
    ///
    /// Card payments then stay `pending` until processed manually.
    pub fn new(repository: Arc<dyn PaymentRepository>) -> Self {
        Self {
            repository,
            gateway: None,
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn repository(&self) -> &Arc<dyn PaymentRepository> {
        &self.repository
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    fn gateway(&self) -> PaymentResult<&Arc<dyn PaymentGateway>> {
        self.gateway.as_ref().ok_or(PaymentError::GatewayNotConfigured)
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Creates a pending payment
    ///
    /// Card payments also get a gateway intent when a gateway is wired in. A
    /// gateway failure is logged and the payment is returned still pending.
    #[instrument(skip(self, input), fields(actor = %actor))]
    pub async fn create(&self, input: NewPayment, actor: UserId) -> PaymentResult<Payment> {
        let mut payment = Payment::create(input, actor, self.settings.default_currency, Utc::now())?;
        self.repository.insert(&payment).await?;

        if payment.method.is_card_based() {
            if let Some(gateway) = &self.gateway {
                match gateway.create_intent(intent_request_for(&payment)?).await {
                    Ok(intent) => {
                        payment.attach_intent(intent.id, intent.client_secret, Utc::now())?;
                        payment.gateway_response = Some(intent.raw);
                        self.repository.update(&payment).await?;
                    }
                    Err(e) => {
                        warn!(
                            payment_id = %payment.id,
                            gateway = gateway.name(),
                            error = %e,
                            "Gateway intent creation failed; payment left pending"
                        );
                    }
                }
            }
        }

        info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            amount = %payment.amount,
            status = %payment.status,
            "Payment created"
        );
        Ok(payment)
    }

    /// Loads a payment, soft-deleted or not
    pub async fn get(&self, id: PaymentId) -> PaymentResult<Payment> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }

    /// Loads a payment that can still be changed
    async fn get_live(&self, id: PaymentId) -> PaymentResult<Payment> {
        let payment = self.get(id).await?;
        if payment.is_deleted() {
            return Err(PaymentError::NotFound(id.to_string()));
        }
        Ok(payment)
    }

    /// A payment with its relations expanded
    pub async fn find_by_id(&self, id: PaymentId) -> PaymentResult<PaymentDetails> {
        let payment = self.get(id).await?;
        let relations = self.repository.load_relations(&payment).await?;
        Ok(PaymentDetails { payment, relations })
    }

    pub async fn find_many(&self, query: &PaymentQuery) -> PaymentResult<Page<Payment>> {
        Ok(self.repository.find_many(query).await?)
    }

    #[instrument(skip(self, patch), fields(payment_id = %id, actor = %actor))]
    pub async fn update(
        &self,
        id: PaymentId,
        patch: PaymentPatch,
        actor: UserId,
    ) -> PaymentResult<Payment> {
        let mut payment = self.get_live(id).await?;
        payment.apply_patch(patch, actor, Utc::now())?;
        self.repository.update(&payment).await?;

        info!(payment_id = %id, "Payment updated");
        Ok(payment)
    }

    /// Soft-deletes a payment, cancelling any open gateway intent first
    #[instrument(skip(self), fields(payment_id = %id, actor = %actor))]
    pub async fn delete(&self, id: PaymentId, actor: UserId) -> PaymentResult<Payment> {
        let mut payment = self.get_live(id).await?;
        payment.status.apply(PaymentEvent::Delete)?;

        if let (Some(intent_id), Some(gateway)) = (payment.gateway_intent_id.clone(), &self.gateway) {
            if payment.status.permits(PaymentEvent::GatewayCanceled) {
                match gateway.cancel_intent(&intent_id).await {
                    Ok(intent) => {
                        payment.cancel(Some("Payment deleted"), Utc::now())?;
                        payment.gateway_response = Some(intent.raw);
                    }
                    Err(e) => {
                        warn!(payment_id = %id, intent_id = %intent_id, error = %e, "Could not cancel gateway intent");
                    }
                }
            }
        }

        payment.soft_delete(actor, Utc::now())?;
        self.repository.update(&payment).await?;

        info!(payment_id = %id, "Payment deleted");
        Ok(payment)
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Settles a payment through the gateway, or manually when it has no intent
    ///
    /// Once the entry guard passes, any gateway or persistence error marks
    /// the payment failed before the error is returned.
    /// An intent that does not match the payment is refused and leaves it
    /// untouched.
    #[instrument(skip(self, input), fields(payment_id = %id, actor = %actor))]
    pub async fn process(
        &self,
        id: PaymentId,
        input: ProcessPayment,
        actor: UserId,
    ) -> PaymentResult<Payment> {
        let original = self.get_live(id).await?;
        original.status.apply(PaymentEvent::BeginProcessing)?;
        if let (Some(requested), Some(linked)) =
            (&input.payment_intent_id, &original.gateway_intent_id)
        {
            if requested != linked {
                return Err(PaymentError::validation(format!(
                    "payment is linked to intent {}, not {}",
                    linked, requested
                )));
            }
        }

        let intent_id = input
            .payment_intent_id
            .clone()
            .or_else(|| original.gateway_intent_id.clone());
        let gateway = match intent_id {
            Some(_) => Some(self.gateway()?.clone()),
            None => None,
        };

        let mut payment = original.clone();
        let outcome = match (intent_id, gateway) {
            (Some(intent_id), Some(gateway)) => {
                settle_with_gateway(
                    gateway.as_ref(),
                    &mut payment,
                    &intent_id,
                    input.payment_method_id.as_deref(),
                )
                .await
            }
            _ => payment.settle_manually(actor, Utc::now()),
        };
        payment.updated_by = Some(actor);

        let outcome = match outcome {
            Ok(()) => self.repository.update(&payment).await.map_err(PaymentError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(payment_id = %id, status = %payment.status, manual = payment.is_manual, "Payment processed");
                Ok(payment)
            }
            Err(e @ PaymentError::Validation(_)) => {
                warn!(payment_id = %id, error = %e, "Payment processing rejected");
                Err(e)
            }
            Err(e) => {
                warn!(payment_id = %id, error = %e, "Payment processing failed");
                let mut failed = original;
                if failed.mark_failed(e.to_string(), Utc::now()).is_ok() {
                    failed.updated_by = Some(actor);
                    if let Err(persist) = self.repository.update(&failed).await {
                        error!(payment_id = %id, error = %persist, "Could not record processing failure");
                    }
                }
                Err(e)
            }
        }
    }

    /// Refunds part or all of a settled payment
    #[instrument(skip(self, input), fields(payment_id = %id, actor = %actor))]
    pub async fn refund(
        &self,
        id: PaymentId,
        input: RefundPayment,
        actor: UserId,
    ) -> PaymentResult<Payment> {
        let original = self.get_live(id).await?;
        original.status.apply(PaymentEvent::Refund { full: false })?;
        let amount = original.refund_amount(input.amount)?;

        let through_gateway =
            original.gateway_charge_id.is_some() || original.gateway_intent_id.is_some();
        let gateway = if through_gateway {
            Some(self.gateway()?.clone())
        } else {
            None
        };

        let mut payment = original.clone();
        let outcome = self
            .execute_refund(gateway.as_deref(), &mut payment, amount, input.reason, actor)
            .await;

        match outcome {
            Ok(()) => {
                info!(
                    payment_id = %id,
                    amount = %amount,
                    refunded = %payment.refunded_amount,
                    status = %payment.status,
                    "Payment refunded"
                );
                Ok(payment)
            }
            Err(e) => {
                warn!(payment_id = %id, error = %e, "Refund failed");
                let mut failed = original;
                failed.mark_refund_failed(Utc::now());
                failed.updated_by = Some(actor);
                if let Err(persist) = self.repository.update(&failed).await {
                    error!(payment_id = %id, error = %persist, "Could not record refund failure");
                }
                Err(e)
            }
        }
    }

    async fn execute_refund(
        &self,
        gateway: Option<&dyn PaymentGateway>,
        payment: &mut Payment,
        amount: Money,
        reason: Option<String>,
        actor: UserId,
    ) -> PaymentResult<()> {
        if let Some(gateway) = gateway {
            let mut metadata = BTreeMap::new();
            metadata.insert("payment_id".to_string(), payment.id.to_string());
            metadata.insert("reference".to_string(), payment.reference.clone());
            let request = RefundRequest {
                charge_id: payment.gateway_charge_id.clone(),
                intent_id: match payment.gateway_charge_id {
                    Some(_) => None,
                    None => payment.gateway_intent_id.clone(),
                },
                amount_minor: amount.to_minor()?,
                reason: reason.clone(),
                metadata,
                idempotency_key: Some(format!(
                    "refund-{}-{}-{}",
                    payment.id.as_uuid(),
                    payment.refunded_amount.to_minor()?,
                    amount.to_minor()?
                )),
            };
            let refund = gateway
                .create_refund(request)
                .await
                .map_err(PaymentError::Gateway)?;
            payment.gateway_response = Some(refund.raw);
        }

        payment.apply_refund(amount, reason, Utc::now())?;
        payment.updated_by = Some(actor);
        self.repository.update(payment).await?;
        Ok(())
    }

    // ========================================================================
    // Gateway
    // ========================================================================

    /// Creates a gateway intent that is not tied to a stored payment
    #[instrument(skip(self, input), fields(actor = %actor))]
    pub async fn create_gateway_intent(
        &self,
        input: IntentInput,
        actor: UserId,
    ) -> PaymentResult<GatewayIntent> {
        let gateway = self.gateway()?;
        let currency = input.currency.unwrap_or(self.settings.default_currency);
        let amount = positive_amount(input.amount, currency)?;
        let mut metadata = input.metadata;
        metadata.insert("user_id".to_string(), actor.to_string());

        let request = CreateIntentRequest {
            amount_minor: amount.to_minor()?,
            currency: currency.code().to_lowercase(),
            description: input.description,
            receipt_email: None,
            metadata,
            idempotency_key: None,
        };
        let intent = gateway
            .create_intent(request)
            .await
            .map_err(PaymentError::Gateway)?;

        info!(intent_id = %intent.id, gateway = gateway.name(), "Gateway intent created");
        Ok(intent)
    }

    /// Verifies a raw webhook delivery
    pub fn verify_webhook(&self, payload: &[u8], signature: &str) -> PaymentResult<GatewayEvent> {
        self.gateway()?
            .verify_webhook(payload, signature)
            .map_err(PaymentError::Gateway)
    }

    /// Reconciles a verified gateway event onto its payment
    ///
    /// Replays and out-of-order deliveries are acknowledged without change.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> PaymentResult<WebhookOutcome> {
        let Some(intent_id) = event.intent_id.clone() else {
            return Ok(WebhookOutcome::ignored("event carries no payment intent"));
        };
        let Some(mut payment) = self.repository.find_by_gateway_intent(&intent_id).await? else {
            info!(intent_id = %intent_id, "Webhook for unknown intent ignored");
            return Ok(WebhookOutcome::ignored(format!("no payment for intent {}", intent_id)));
        };

        let now = Utc::now();
        let applied = match &event.kind {
            GatewayEventKind::IntentSucceeded => payment
                .apply_intent_status(IntentStatus::Succeeded, event.charge_id.as_deref(), None, now)
                .map(|_| ()),
            GatewayEventKind::IntentPaymentFailed => payment
                .apply_intent_status(
                    IntentStatus::RequiresPaymentMethod,
                    None,
                    event.failure_message.as_deref(),
                    now,
                )
                .map(|_| ()),
            GatewayEventKind::IntentProcessing => {
                if payment.status == PaymentStatus::Pending {
                    payment.transition(PaymentEvent::IntentCreated).map(|_| ())
                } else {
                    return Ok(WebhookOutcome::ignored("payment already in flight"));
                }
            }
            GatewayEventKind::IntentCanceled => {
                payment.cancel(event.failure_message.as_deref(), now)
            }
            GatewayEventKind::ChargeRefunded => {
                let total = Money::from_minor(event.amount_refunded_minor.unwrap_or(0), payment.currency);
                let delta = total.checked_sub(&payment.refunded_amount)?;
                if !delta.is_positive() {
                    return Ok(WebhookOutcome::ignored("refund already recorded"));
                }
                payment.apply_refund(delta, None, now)
            }
            GatewayEventKind::Other(kind) => {
                return Ok(WebhookOutcome::ignored(format!("unhandled event type {}", kind)));
            }
        };

        match applied {
            Ok(()) => {
                payment.gateway_response = Some(event.raw);
                payment.updated_at = now;
                self.repository.update(&payment).await?;
                info!(payment_id = %payment.id, status = %payment.status, "Webhook applied");
                Ok(WebhookOutcome::Applied {
                    payment_id: payment.id,
                    status: payment.status,
                })
            }
            Err(e @ PaymentError::InvalidTransition { .. }) => {
                info!(payment_id = %payment.id, reason = %e, "Webhook ignored");
                Ok(WebhookOutcome::ignored(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Reporting and batch jobs
    // ========================================================================

    /// Builds the dashboard from live aggregates
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self, now: DateTime<Utc>) -> PaymentResult<DashboardStats> {
        let repo = &self.repository;

        let total = repo.summarize(&PaymentFilter::default()).await?;
        let pending = repo.summarize(&PaymentFilter::for_status(PaymentStatus::Pending)).await?;
        let completed = repo.summarize(&PaymentFilter::for_status(PaymentStatus::Completed)).await?;
        let failed = repo.summarize(&PaymentFilter::for_status(PaymentStatus::Failed)).await?;
        let refunded = repo
            .summarize(&PaymentFilter {
                statuses: vec![PaymentStatus::Refunded, PaymentStatus::PartiallyRefunded],
                ..Default::default()
            })
            .await?;

        let by_type = repo.breakdown(Dimension::PaymentType).await?;
        let by_method = repo.breakdown(Dimension::Method).await?;
        let by_status = repo.breakdown(Dimension::Status).await?;

        let mut monthly_trend = Vec::with_capacity(self.settings.trend_months as usize);
        for window in trailing_months(now, self.settings.trend_months)? {
            let summary = repo
                .summarize(&PaymentFilter::default().created_between(window.start, window.end))
                .await?;
            monthly_trend.push(MonthlyTrend::from_summary(window.label(), &summary));
        }

        let total = CountAmount::new(total.count, total.amount);
        Ok(DashboardStats {
            average_amount: average_amount(&total),
            total,
            pending: CountAmount::new(pending.count, pending.amount),
            completed: CountAmount::new(completed.count, completed.amount),
            failed: CountAmount::new(failed.count, failed.amount),
            refunded: CountAmount::new(refunded.count, refunded.refunded_amount),
            by_type: zero_filled(PaymentType::ALL, &by_type, PaymentType::as_str),
            by_method: zero_filled(PaymentMethod::ALL, &by_method, PaymentMethod::as_str),
            by_status: zero_filled(PaymentStatus::ALL, &by_status, PaymentStatus::as_str),
            monthly_trend,
            top_properties: repo.top_properties(self.settings.top_properties).await?,
            recent: repo.recent(self.settings.recent_payments).await?,
            currency: self.settings.default_currency,
            generated_at: now,
        })
    }

    /// Spawns the next instalment of every recurring series due at `now`
    ///
    /// Anchors are handled one at a time; a failing anchor is logged and
    /// skipped without stopping the batch.
    #[instrument(skip(self))]
    pub async fn process_recurring_payments(
        &self,
        now: DateTime<Utc>,
    ) -> PaymentResult<RecurringRunReport> {
        let due = self
            .repository
            .due_recurring(now - self.settings.recurring_lookback, now)
            .await?;
        let mut report = RecurringRunReport {
            examined: due.len(),
            ..Default::default()
        };

        for anchor in due {
            let anchor_id = anchor.id;
            match self.spawn_successor(anchor, now).await {
                Ok(successor) => report.created.push(successor),
                Err(e) => {
                    warn!(payment_id = %anchor_id, error = %e, "Recurring payment cycle failed");
                    report.failed.push(anchor_id);
                }
            }
        }

        info!(
            examined = report.examined,
            created = report.created.len(),
            failed = report.failed.len(),
            "Recurring payment run complete"
        );
        Ok(report)
    }

    async fn spawn_successor(&self, mut anchor: Payment, now: DateTime<Utc>) -> PaymentResult<PaymentId> {
        let plan = plan_next_cycle(&anchor)?;
        let successor = anchor.successor(plan.due_date, now)?;
        anchor.advance_schedule(&plan, now);
        self.repository.record_cycle(&anchor, &successor).await?;
        Ok(successor.id)
    }
}

/// Retrieves, optionally confirms, and maps an intent onto the payment
async fn settle_with_gateway(
    gateway: &dyn PaymentGateway,
    payment: &mut Payment,
    intent_id: &str,
    payment_method: Option<&str>,
) -> PaymentResult<()> {
    let mut intent = gateway
        .retrieve_intent(intent_id)
        .await
        .map_err(PaymentError::Gateway)?;
    ensure_intent_matches(payment, &intent)?;
    if payment_method.is_some() || intent.status == IntentStatus::RequiresConfirmation {
        intent = gateway
            .confirm_intent(intent_id, payment_method)
            .await
            .map_err(PaymentError::Gateway)?;
    }

    payment.gateway_intent_id = Some(intent.id.clone());
    payment.apply_intent_status(
        intent.status,
        intent.latest_charge.as_deref(),
        intent.last_error.as_deref(),
        Utc::now(),
    )?;
    payment.gateway_response = Some(intent.raw);
    Ok(())
}

/// Refuses an intent whose amount, currency or owning payment differ
fn ensure_intent_matches(payment: &Payment, intent: &GatewayIntent) -> PaymentResult<()> {
    let amount_minor = payment.amount.to_minor()?;
    let currency = payment.currency.code();
    if intent.amount_minor != amount_minor || !intent.currency.eq_ignore_ascii_case(currency) {
        return Err(PaymentError::validation(format!(
            "intent {} is for {} {}, payment is for {} {}",
            intent.id,
            intent.amount_minor,
            intent.currency.to_uppercase(),
            amount_minor,
            currency
        )));
    }
    let owner = intent
        .raw
        .pointer("/metadata/payment_id")
        .and_then(serde_json::Value::as_str);
    if let Some(owner) = owner {
        if owner != payment.id.to_string() {
            return Err(PaymentError::validation(format!(
                "intent {} belongs to payment {}",
                intent.id, owner
            )));
        }
    }
    Ok(())
}

fn intent_request_for(payment: &Payment) -> PaymentResult<CreateIntentRequest> {
    let mut metadata = BTreeMap::new();
    metadata.insert("payment_id".to_string(), payment.id.to_string());
    metadata.insert("reference".to_string(), payment.reference.clone());
    metadata.insert("payer_id".to_string(), payment.payer_id.to_string());

    Ok(CreateIntentRequest {
        amount_minor: payment.amount.to_minor()?,
        currency: payment.currency.code().to_lowercase(),
        description: Some(payment.title.clone()),
        receipt_email: payment.billing_email.clone(),
        metadata,
        idempotency_key: Some(format!("create-{}", payment.id.as_uuid())),
    })
}
