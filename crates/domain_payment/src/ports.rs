//! Payment Domain Ports
//!
//! The payment service depends on two ports:
//!
//! - [`PaymentRepository`]: persistence and read-side aggregation. The
//!   PostgreSQL adapter lives in `infra_db`.
//! - [`PaymentGateway`]: card collection, refunds and webhook verification.
//!   The Stripe adapter lives in `infra_gateway`.
//!
//! Both are injected into [`crate::PaymentService`] as trait objects:
//!
//! ```rust,ignore
//! let service = PaymentService::new(Arc::new(PostgresPaymentRepository::new(pool)))
//!     .with_gateway(Arc::new(StripeGateway::new(stripe_config)?));
//! ```
//!
//! In-memory implementations of both are available under the `mock` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, PaymentId, PortError, PropertyId};

use crate::gateway::{
    CreateIntentRequest, GatewayEvent, GatewayIntent, GatewayRefund, RefundRequest,
};
use crate::payment::{Payment, PaymentRelations, RecentPayment};
use crate::query::{Page, PaymentFilter, PaymentQuery};

/// Count and amount totals over a filtered set of payments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountSummary {
    pub count: u64,
    /// Sum of `amount`
    pub amount: Decimal,
    pub completed_count: u64,
    /// Sum of `amount` over completed payments
    pub completed_amount: Decimal,
    /// Sum of `refunded_amount`
    pub refunded_amount: Decimal,
}

/// Columns the dashboard breaks totals down by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    PaymentType,
    Method,
    Status,
}

impl Dimension {
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::PaymentType => "payment_type",
            Dimension::Method => "method",
            Dimension::Status => "status",
        }
    }

    /// Stored value of `payment` along this dimension
    pub fn key_of(&self, payment: &Payment) -> &'static str {
        match self {
            Dimension::PaymentType => payment.payment_type.as_str(),
            Dimension::Method => payment.method.as_str(),
            Dimension::Status => payment.status.as_str(),
        }
    }
}

/// One grouped row of a breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub key: String,
    pub count: u64,
    pub amount: Decimal,
}

/// Payment totals for one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTotal {
    pub property_id: PropertyId,
    pub title: Option<String>,
    pub count: u64,
    pub amount: Decimal,
}

/// Persistence port for payments
///
/// Soft-deleted rows are returned by id lookups and hidden from every
/// aggregate and search unless the filter asks for them.
#[async_trait]
pub trait PaymentRepository: DomainPort + HealthCheckable {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts a new payment; a duplicate id or reference is a `Conflict`
    async fn insert(&self, payment: &Payment) -> Result<(), PortError>;

    /// Overwrites an existing payment; a missing row is `NotFound`
    async fn update(&self, payment: &Payment) -> Result<(), PortError>;

    /// Inserts a recurring successor and saves its advanced anchor atomically
    async fn record_cycle(&self, anchor: &Payment, successor: &Payment) -> Result<(), PortError>;

    // ========================================================================
    // Lookups
    // ========================================================================

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, PortError>;

    async fn find_by_gateway_intent(&self, intent_id: &str) -> Result<Option<Payment>, PortError>;

    /// Expands payer, recipient, property, linked records, parent and children
    async fn load_relations(&self, payment: &Payment) -> Result<PaymentRelations, PortError>;

    /// Filtered, sorted page plus the filtered total
    async fn find_many(&self, query: &PaymentQuery) -> Result<Page<Payment>, PortError>;

    /// Recurring anchors that are completed, not deleted and due in `[from, to]`
    async fn due_recurring(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Payment>, PortError>;

    // ========================================================================
    // Aggregates
    // ========================================================================

    async fn summarize(&self, filter: &PaymentFilter) -> Result<AmountSummary, PortError>;

    /// Grouped totals over non-deleted payments; members with no rows are absent
    async fn breakdown(&self, dimension: Dimension) -> Result<Vec<BreakdownRow>, PortError>;

    /// Properties ranked by total payment amount
    async fn top_properties(&self, limit: u32) -> Result<Vec<PropertyTotal>, PortError>;

    /// Newest payments with payer and property expanded
    async fn recent(&self, limit: u32) -> Result<Vec<RecentPayment>, PortError>;
}

/// Card gateway port
#[async_trait]
pub trait PaymentGateway: DomainPort {
    /// Short adapter name used in logs
    fn name(&self) -> &'static str;

    async fn create_intent(&self, request: CreateIntentRequest) -> Result<GatewayIntent, PortError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError>;

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> Result<GatewayIntent, PortError>;

    async fn cancel_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError>;

    async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PortError>;

    /// Verifies a webhook signature and parses the event
    ///
    /// A bad or stale signature is `PortError::Unauthorized`.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, PortError>;
}

/// In-memory adapters for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult, UserId};

    use crate::gateway::IntentStatus;
    use crate::payment::{LinkedRecord, PaymentStatus, PropertySummary, UserSummary};

    /// In-memory payment store
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryPaymentRepository {
        payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
        users: Arc<RwLock<HashMap<UserId, UserSummary>>>,
        properties: Arc<RwLock<HashMap<PropertyId, PropertySummary>>>,
        linked: Arc<RwLock<HashMap<uuid::Uuid, LinkedRecord>>>,
    }

    impl InMemoryPaymentRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with payments
        pub async fn with_payments(payments: Vec<Payment>) -> Self {
            let repo = Self::new();
            for payment in payments {
                repo.payments.write().await.insert(payment.id, payment);
            }
            repo
        }

        pub async fn add_user(&self, user: UserSummary) {
            self.users.write().await.insert(user.id, user);
        }

        pub async fn add_property(&self, property: PropertySummary) {
            self.properties.write().await.insert(property.id, property);
        }

        /// Registers a tenancy, booking or maintenance request by raw id
        pub async fn add_linked_record(&self, record: LinkedRecord) {
            self.linked.write().await.insert(record.id, record);
        }

        /// Every stored payment, including soft-deleted ones
        pub async fn all(&self) -> Vec<Payment> {
            self.payments.read().await.values().cloned().collect()
        }

        async fn visible(&self) -> Vec<Payment> {
            self.payments
                .read()
                .await
                .values()
                .filter(|p| !p.is_deleted())
                .cloned()
                .collect()
        }
    }

    impl DomainPort for InMemoryPaymentRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryPaymentRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-payments".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl PaymentRepository for InMemoryPaymentRepository {
        async fn insert(&self, payment: &Payment) -> Result<(), PortError> {
            let mut payments = self.payments.write().await;
            if payments.contains_key(&payment.id)
                || payments.values().any(|p| p.reference == payment.reference)
            {
                return Err(PortError::conflict(format!(
                    "payment {} already exists",
                    payment.reference
                )));
            }
            payments.insert(payment.id, payment.clone());
            Ok(())
        }

        async fn update(&self, payment: &Payment) -> Result<(), PortError> {
            let mut payments = self.payments.write().await;
            match payments.get_mut(&payment.id) {
                Some(existing) => {
                    *existing = payment.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Payment", payment.id)),
            }
        }

        async fn record_cycle(&self, anchor: &Payment, successor: &Payment) -> Result<(), PortError> {
            let mut payments = self.payments.write().await;
            if !payments.contains_key(&anchor.id) {
                return Err(PortError::not_found("Payment", anchor.id));
            }
            if payments.values().any(|p| p.reference == successor.reference) {
                return Err(PortError::conflict(format!(
                    "payment {} already exists",
                    successor.reference
                )));
            }
            payments.insert(anchor.id, anchor.clone());
            payments.insert(successor.id, successor.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, PortError> {
            Ok(self.payments.read().await.get(&id).cloned())
        }

        async fn find_by_gateway_intent(&self, intent_id: &str) -> Result<Option<Payment>, PortError> {
            Ok(self
                .payments
                .read()
                .await
                .values()
                .find(|p| p.gateway_intent_id.as_deref() == Some(intent_id))
                .cloned())
        }

        async fn load_relations(&self, payment: &Payment) -> Result<PaymentRelations, PortError> {
            let users = self.users.read().await;
            let properties = self.properties.read().await;
            let linked = self.linked.read().await;
            let payments = self.payments.read().await;

            let mut children: Vec<Payment> = payments
                .values()
                .filter(|p| p.parent_payment_id == Some(payment.id))
                .cloned()
                .collect();
            children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

            Ok(PaymentRelations {
                payer: users.get(&payment.payer_id).cloned(),
                recipient: payment.recipient_id.and_then(|id| users.get(&id).cloned()),
                property: payment.property_id.and_then(|id| properties.get(&id).cloned()),
                tenancy: payment.tenancy_id.and_then(|id| linked.get(id.as_uuid()).cloned()),
                booking: payment.booking_id.and_then(|id| linked.get(id.as_uuid()).cloned()),
                maintenance_request: payment
                    .maintenance_request_id
                    .and_then(|id| linked.get(id.as_uuid()).cloned()),
                parent: payment
                    .parent_payment_id
                    .and_then(|id| payments.get(&id).cloned())
                    .map(Box::new),
                children,
            })
        }

        async fn find_many(&self, query: &PaymentQuery) -> Result<Page<Payment>, PortError> {
            let mut matching: Vec<Payment> = self
                .payments
                .read()
                .await
                .values()
                .filter(|p| query.filter.matches(p))
                .cloned()
                .collect();
            matching.sort_by(|a, b| query.compare(a, b));

            let total = matching.len() as u64;
            let data = matching
                .into_iter()
                .skip(query.pagination.offset() as usize)
                .take(query.pagination.limit as usize)
                .collect();
            Ok(Page::new(data, total, query.pagination))
        }

        async fn due_recurring(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Payment>, PortError> {
            let mut due: Vec<Payment> = self
                .visible()
                .await
                .into_iter()
                .filter(|p| {
                    p.is_recurring
                        && p.status == PaymentStatus::Completed
                        && p.next_payment_date.is_some_and(|d| d >= from && d <= to)
                })
                .collect();
            due.sort_by(|a, b| a.next_payment_date.cmp(&b.next_payment_date).then(a.id.cmp(&b.id)));
            Ok(due)
        }

        async fn summarize(&self, filter: &PaymentFilter) -> Result<AmountSummary, PortError> {
            let payments = self.payments.read().await;
            let mut summary = AmountSummary::default();
            for p in payments.values().filter(|p| filter.matches(p)) {
                summary.count += 1;
                summary.amount += p.amount.amount();
                summary.refunded_amount += p.refunded_amount.amount();
                if p.status == PaymentStatus::Completed {
                    summary.completed_count += 1;
                    summary.completed_amount += p.amount.amount();
                }
            }
            Ok(summary)
        }

        async fn breakdown(&self, dimension: Dimension) -> Result<Vec<BreakdownRow>, PortError> {
            let mut groups: HashMap<&'static str, BreakdownRow> = HashMap::new();
            for p in self.visible().await {
                let key = dimension.key_of(&p);
                let row = groups.entry(key).or_insert_with(|| BreakdownRow {
                    key: key.to_string(),
                    count: 0,
                    amount: Decimal::ZERO,
                });
                row.count += 1;
                row.amount += p.amount.amount();
            }
            Ok(groups.into_values().collect())
        }

        async fn top_properties(&self, limit: u32) -> Result<Vec<PropertyTotal>, PortError> {
            let properties = self.properties.read().await;
            let mut totals: HashMap<PropertyId, PropertyTotal> = HashMap::new();
            for p in self.visible().await {
                let Some(property_id) = p.property_id else {
                    continue;
                };
                let entry = totals.entry(property_id).or_insert_with(|| PropertyTotal {
                    property_id,
                    title: properties.get(&property_id).map(|s| s.title.clone()),
                    count: 0,
                    amount: Decimal::ZERO,
                });
                entry.count += 1;
                entry.amount += p.amount.amount();
            }
            let mut ranked: Vec<PropertyTotal> = totals.into_values().collect();
            ranked.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.property_id.cmp(&b.property_id)));
            ranked.truncate(limit as usize);
            Ok(ranked)
        }

        async fn recent(&self, limit: u32) -> Result<Vec<RecentPayment>, PortError> {
            let users = self.users.read().await;
            let properties = self.properties.read().await;
            let mut visible = self.visible().await;
            visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(visible
                .into_iter()
                .take(limit as usize)
                .map(|payment| RecentPayment {
                    payer: users.get(&payment.payer_id).cloned(),
                    property: payment.property_id.and_then(|id| properties.get(&id).cloned()),
                    payment,
                })
                .collect())
        }
    }

    /// Gateway calls that can be scripted to fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum GatewayCall {
        CreateIntent,
        RetrieveIntent,
        ConfirmIntent,
        CancelIntent,
        CreateRefund,
    }

    /// Scripted in-memory card gateway
    ///
    /// New intents start in `requires_payment_method`; confirming one moves
    /// it to the configured outcome (default `succeeded`) and attaches a
    /// charge id.
    #[derive(Debug)]
    pub struct MockPaymentGateway {
        intents: RwLock<HashMap<String, GatewayIntent>>,
        created: RwLock<Vec<CreateIntentRequest>>,
        refunds: RwLock<Vec<RefundRequest>>,
        cancelled: RwLock<Vec<String>>,
        failing: RwLock<HashSet<GatewayCall>>,
        confirm_outcome: RwLock<IntentStatus>,
        webhook_signature: String,
        sequence: AtomicU64,
    }

    impl Default for MockPaymentGateway {
        fn default() -> Self {
            Self {
                intents: RwLock::default(),
                created: RwLock::default(),
                refunds: RwLock::default(),
                cancelled: RwLock::default(),
                failing: RwLock::default(),
                confirm_outcome: RwLock::new(IntentStatus::Succeeded),
                webhook_signature: Self::VALID_SIGNATURE.to_string(),
                sequence: AtomicU64::new(1),
            }
        }
    }

    impl MockPaymentGateway {
        /// Signature accepted by `verify_webhook`
        pub const VALID_SIGNATURE: &'static str = "mock-signature";

        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent `call` fail with `ServiceUnavailable`
        pub async fn fail(&self, call: GatewayCall) {
            self.failing.write().await.insert(call);
        }

        pub async fn recover(&self, call: GatewayCall) {
            self.failing.write().await.remove(&call);
        }

        /// Status that `confirm_intent` moves intents to
        pub async fn set_confirm_outcome(&self, status: IntentStatus) {
            *self.confirm_outcome.write().await = status;
        }

        /// Overrides the stored status of an intent
        pub async fn set_intent_status(&self, intent_id: &str, status: IntentStatus) {
            if let Some(intent) = self.intents.write().await.get_mut(intent_id) {
                intent.status = status;
            }
        }

        /// Seeds an intent and returns its id
        pub async fn insert_intent(&self, status: IntentStatus, amount_minor: i64) -> String {
            let id = self.next_id("pi");
            let intent = GatewayIntent {
                id: id.clone(),
                status,
                client_secret: Some(format!("{}_secret", id)),
                amount_minor,
                currency: "gbp".to_string(),
                latest_charge: (status == IntentStatus::Succeeded).then(|| self.next_id("ch")),
                last_error: None,
                raw: serde_json::json!({ "id": id }),
            };
            self.intents.write().await.insert(id.clone(), intent);
            id
        }

        pub async fn created_requests(&self) -> Vec<CreateIntentRequest> {
            self.created.read().await.clone()
        }

        pub async fn refund_requests(&self) -> Vec<RefundRequest> {
            self.refunds.read().await.clone()
        }

        pub async fn cancelled_intents(&self) -> Vec<String> {
            self.cancelled.read().await.clone()
        }

        fn next_id(&self, prefix: &str) -> String {
            format!("{}_mock_{}", prefix, self.sequence.fetch_add(1, Ordering::SeqCst))
        }

        async fn check(&self, call: GatewayCall) -> Result<(), PortError> {
            if self.failing.read().await.contains(&call) {
                return Err(PortError::ServiceUnavailable {
                    service: format!("mock gateway ({:?})", call),
                });
            }
            Ok(())
        }

        async fn stored(&self, intent_id: &str) -> Result<GatewayIntent, PortError> {
            self.intents
                .read()
                .await
                .get(intent_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("PaymentIntent", intent_id))
        }
    }

    impl DomainPort for MockPaymentGateway {}

    #[async_trait]
    impl PaymentGateway for MockPaymentGateway {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn create_intent(&self, request: CreateIntentRequest) -> Result<GatewayIntent, PortError> {
            self.check(GatewayCall::CreateIntent).await?;
            let id = self.next_id("pi");
            let intent = GatewayIntent {
                id: id.clone(),
                status: IntentStatus::RequiresPaymentMethod,
                client_secret: Some(format!("{}_secret", id)),
                amount_minor: request.amount_minor,
                currency: request.currency.clone(),
                latest_charge: None,
                last_error: None,
                raw: serde_json::json!({
                    "id": id,
                    "object": "payment_intent",
                    "metadata": request.metadata,
                }),
            };
            self.created.write().await.push(request);
            self.intents.write().await.insert(id, intent.clone());
            Ok(intent)
        }

        async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError> {
            self.check(GatewayCall::RetrieveIntent).await?;
            self.stored(intent_id).await
        }

        async fn confirm_intent(
            &self,
            intent_id: &str,
            _payment_method: Option<&str>,
        ) -> Result<GatewayIntent, PortError> {
            self.check(GatewayCall::ConfirmIntent).await?;
            let outcome = *self.confirm_outcome.read().await;
            let charge = self.next_id("ch");
            let mut intents = self.intents.write().await;
            let intent = intents
                .get_mut(intent_id)
                .ok_or_else(|| PortError::not_found("PaymentIntent", intent_id))?;
            intent.status = outcome;
            match outcome {
                IntentStatus::Succeeded => intent.latest_charge = Some(charge),
                IntentStatus::RequiresPaymentMethod => {
                    intent.last_error = Some("Your card was declined.".to_string())
                }
                _ => {}
            }
            Ok(intent.clone())
        }

        async fn cancel_intent(&self, intent_id: &str) -> Result<GatewayIntent, PortError> {
            self.check(GatewayCall::CancelIntent).await?;
            let mut intents = self.intents.write().await;
            let intent = intents
                .get_mut(intent_id)
                .ok_or_else(|| PortError::not_found("PaymentIntent", intent_id))?;
            intent.status = IntentStatus::Canceled;
            self.cancelled.write().await.push(intent_id.to_string());
            Ok(intent.clone())
        }

        async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PortError> {
            self.check(GatewayCall::CreateRefund).await?;
            let refund = GatewayRefund {
                id: self.next_id("re"),
                status: "succeeded".to_string(),
                amount_minor: request.amount_minor,
                raw: serde_json::json!({ "object": "refund", "amount": request.amount_minor }),
            };
            self.refunds.write().await.push(request);
            Ok(refund)
        }

        fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent, PortError> {
            if signature != self.webhook_signature {
                return Err(PortError::Unauthorized {
                    message: "webhook signature mismatch".to_string(),
                });
            }
            serde_json::from_slice(payload)
                .map_err(|e| PortError::transformation(format!("invalid webhook payload: {}", e)))
        }
    }
}
