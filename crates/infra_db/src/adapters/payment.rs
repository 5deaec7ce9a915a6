//! PostgreSQL Payment Adapter
//!
//! Implements the `PaymentRepository` port over [`PaymentStore`], converting
//! rows to domain values and [`DatabaseError`] to `PortError`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::adapters::PostgresPaymentAdapter;
//! use domain_payment::PaymentService;
//!
//! let service = PaymentService::new(Arc::new(PostgresPaymentAdapter::new(pool)));
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    Currency, DomainPort, HealthCheckResult, HealthCheckable, Money, PaymentId, PortError,
    PropertyId, UserId,
};
use domain_payment::{
    AmountSummary, BreakdownRow, Dimension, LinkedRecord, Page, Payment, PaymentFilter,
    PaymentQuery, PaymentRelations, PaymentRepository, PropertySummary, PropertyTotal,
    RecentPayment, UserSummary,
};

use crate::error::DatabaseError;
use crate::repositories::payment::{
    LinkedRow, LinkedTable, PaymentRow, PaymentStore, PropertyRow, UserRow,
};

const ADAPTER_ID: &str = "postgres-payments";

/// PostgreSQL-backed implementation of the `PaymentRepository` port
#[derive(Debug, Clone)]
pub struct PostgresPaymentAdapter {
    store: PaymentStore,
}

impl PostgresPaymentAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: PaymentStore::new(pool),
        }
    }

    /// The underlying SQL store, for queries the port does not expose
    pub fn store(&self) -> &PaymentStore {
        &self.store
    }

    fn rows_to_payments(rows: Vec<PaymentRow>) -> Result<Vec<Payment>, PortError> {
        rows.into_iter()
            .map(|row| row_to_payment(row).map_err(PortError::from))
            .collect()
    }
}

impl DomainPort for PostgresPaymentAdapter {}

#[async_trait]
impl HealthCheckable for PostgresPaymentAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.store.pool())
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentAdapter {
    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn insert(&self, payment: &Payment) -> Result<(), PortError> {
        debug!("Inserting payment");
        Ok(self.store.insert(payment).await?)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, status = %payment.status))]
    async fn update(&self, payment: &Payment) -> Result<(), PortError> {
        debug!("Updating payment");
        Ok(self.store.update(payment).await?)
    }

    #[instrument(skip(self, anchor, successor), fields(anchor_id = %anchor.id, successor_id = %successor.id))]
    async fn record_cycle(&self, anchor: &Payment, successor: &Payment) -> Result<(), PortError> {
        Ok(self.store.record_cycle(anchor, successor).await?)
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        match self.store.find_by_id(*id.as_uuid()).await? {
            Some(row) => Ok(Some(row_to_payment(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_gateway_intent(&self, intent_id: &str) -> Result<Option<Payment>, PortError> {
        match self.store.find_by_gateway_intent(intent_id).await? {
            Some(row) => Ok(Some(row_to_payment(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn load_relations(&self, payment: &Payment) -> Result<PaymentRelations, PortError> {
        let user_ids: Vec<Uuid> = std::iter::once(payment.payer_id)
            .chain(payment.recipient_id)
            .map(Uuid::from)
            .collect();
        let users = self.store.users(&user_ids).await?;
        let properties = self
            .store
            .properties(&payment.property_id.map(Uuid::from).into_iter().collect::<Vec<_>>())
            .await?;

        let tenancy = self.linked(LinkedTable::Tenancies, payment.tenancy_id.map(Uuid::from)).await?;
        let booking = self.linked(LinkedTable::Bookings, payment.booking_id.map(Uuid::from)).await?;
        let maintenance_request = self
            .linked(
                LinkedTable::MaintenanceRequests,
                payment.maintenance_request_id.map(Uuid::from),
            )
            .await?;

        let parent = match payment.parent_payment_id {
            Some(parent_id) => self.find_by_id(parent_id).await?.map(Box::new),
            None => None,
        };
        let children = Self::rows_to_payments(self.store.find_children(*payment.id.as_uuid()).await?)?;

        Ok(PaymentRelations {
            payer: users.get(payment.payer_id.as_uuid()).map(user_summary),
            recipient: payment
                .recipient_id
                .and_then(|id| users.get(id.as_uuid()))
                .map(user_summary),
            property: payment
                .property_id
                .and_then(|id| properties.get(id.as_uuid()))
                .map(property_summary),
            tenancy,
            booking,
            maintenance_request,
            parent,
            children,
        })
    }

    #[instrument(skip(self, query), fields(page = query.pagination.page, limit = query.pagination.limit))]
    async fn find_many(&self, query: &PaymentQuery) -> Result<Page<Payment>, PortError> {
        let (rows, total) = self.store.search(query).await?;
        let data = Self::rows_to_payments(rows)?;
        debug!(total, returned = data.len(), "Payment search complete");
        Ok(Page::new(data, total.max(0) as u64, query.pagination))
    }

    #[instrument(skip(self))]
    async fn due_recurring(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Payment>, PortError> {
        let rows = self.store.due_recurring(from, to).await?;
        Self::rows_to_payments(rows)
    }

    #[instrument(skip(self, filter))]
    async fn summarize(&self, filter: &PaymentFilter) -> Result<AmountSummary, PortError> {
        let row = self.store.summarize(filter).await?;
        Ok(AmountSummary {
            count: row.count.max(0) as u64,
            amount: row.amount,
            completed_count: row.completed_count.max(0) as u64,
            completed_amount: row.completed_amount,
            refunded_amount: row.refunded_amount,
        })
    }

    #[instrument(skip(self))]
    async fn breakdown(&self, dimension: Dimension) -> Result<Vec<BreakdownRow>, PortError> {
        let rows = self.store.breakdown(dimension).await?;
        Ok(rows
            .into_iter()
            .map(|r| BreakdownRow {
                key: r.key,
                count: r.count.max(0) as u64,
                amount: r.amount,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn top_properties(&self, limit: u32) -> Result<Vec<PropertyTotal>, PortError> {
        let rows = self.store.top_properties(limit).await?;
        Ok(rows
            .into_iter()
            .map(|r| PropertyTotal {
                property_id: PropertyId::from(r.property_id),
                title: r.title,
                count: r.count.max(0) as u64,
                amount: r.amount,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn recent(&self, limit: u32) -> Result<Vec<RecentPayment>, PortError> {
        let payments = Self::rows_to_payments(self.store.recent(limit).await?)?;

        let payer_ids: Vec<Uuid> = payments.iter().map(|p| Uuid::from(p.payer_id)).collect();
        let property_ids: Vec<Uuid> = payments
            .iter()
            .filter_map(|p| p.property_id.map(Uuid::from))
            .collect();
        let users = self.store.users(&payer_ids).await?;
        let properties: HashMap<Uuid, PropertyRow> = self.store.properties(&property_ids).await?;

        Ok(payments
            .into_iter()
            .map(|payment| RecentPayment {
                payer: users.get(payment.payer_id.as_uuid()).map(user_summary),
                property: payment
                    .property_id
                    .and_then(|id| properties.get(id.as_uuid()))
                    .map(property_summary),
                payment,
            })
            .collect())
    }
}

impl PostgresPaymentAdapter {
    async fn linked(&self, table: LinkedTable, id: Option<Uuid>) -> Result<Option<LinkedRecord>, PortError> {
        let Some(id) = id else {
            return Ok(None);
        };
        Ok(self.store.linked(table, id).await?.map(linked_record))
    }
}

// ============================================================================
// Row conversions
// ============================================================================

fn user_summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: UserId::from(row.id),
        name: row.name.clone(),
        email: row.email.clone(),
    }
}

fn property_summary(row: &PropertyRow) -> PropertySummary {
    PropertySummary {
        id: PropertyId::from(row.id),
        title: row.title.clone(),
        address: row.address.clone(),
    }
}

fn linked_record(row: LinkedRow) -> LinkedRecord {
    LinkedRecord {
        id: row.id,
        label: row.label,
        status: row.status,
    }
}

fn parse<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| DatabaseError::corrupt(format!("payments.{}: {}", column, e)))
}

/// Converts a stored row back into a domain payment
pub fn row_to_payment(row: PaymentRow) -> Result<Payment, DatabaseError> {
    let currency: Currency = parse("currency", &row.currency)?;
    let remaining_payments = row
        .remaining_payments
        .map(u32::try_from)
        .transpose()
        .map_err(|e| DatabaseError::corrupt(format!("payments.remaining_payments: {}", e)))?;

    Ok(Payment {
        id: PaymentId::from(row.id),
        reference: row.reference,
        title: row.title,
        description: row.description,
        payment_type: parse("payment_type", &row.payment_type)?,
        status: parse("status", &row.status)?,
        method: parse("method", &row.method)?,
        currency,
        amount: Money::new(row.amount, currency),
        fee_amount: Money::new(row.fee_amount, currency),
        net_amount: Money::new(row.net_amount, currency),
        refunded_amount: Money::new(row.refunded_amount, currency),
        due_date: row.due_date,
        processed_at: row.processed_at,
        captured_at: row.captured_at,
        payer_id: UserId::from(row.payer_id),
        recipient_id: row.recipient_id.map(UserId::from),
        property_id: row.property_id.map(PropertyId::from),
        tenancy_id: row.tenancy_id.map(Into::into),
        booking_id: row.booking_id.map(Into::into),
        maintenance_request_id: row.maintenance_request_id.map(Into::into),
        parent_payment_id: row.parent_payment_id.map(PaymentId::from),
        is_recurring: row.is_recurring,
        frequency: row
            .frequency
            .as_deref()
            .map(|f| parse("frequency", f))
            .transpose()?,
        next_payment_date: row.next_payment_date,
        recurring_end_date: row.recurring_end_date,
        remaining_payments,
        gateway_intent_id: row.gateway_intent_id,
        gateway_charge_id: row.gateway_charge_id,
        gateway_client_secret: row.gateway_client_secret,
        gateway_response: row.gateway_response,
        failure_reason: row.failure_reason,
        refund_status: parse("refund_status", &row.refund_status)?,
        refund_reason: row.refund_reason,
        refunded_at: row.refunded_at,
        billing_name: row.billing_name,
        billing_email: row.billing_email,
        billing_address: row.billing_address,
        is_test: row.is_test,
        is_manual: row.is_manual,
        requires_review: row.requires_review,
        notes: row.notes,
        metadata: row.metadata,
        created_by: UserId::from(row.created_by),
        updated_by: row.updated_by.map(UserId::from),
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
    })
}
