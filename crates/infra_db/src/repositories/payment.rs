//! Payment repository
//!
//! Raw SQL access to the `payments` table and the records it references.
//! Queries are built at runtime with [`QueryBuilder`]; sort columns and
//! grouping columns come only from the domain allow-lists, every value is a
//! bound parameter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use domain_payment::{Dimension, Payment, PaymentFilter, PaymentQuery, PaymentStatus};

use crate::error::DatabaseError;

/// Every column of `payments`, in the order [`push_payment_values`] binds them
pub const PAYMENT_COLUMNS: &str = "id, reference, title, description, payment_type, status, \
    method, currency, amount, fee_amount, net_amount, refunded_amount, due_date, processed_at, \
    captured_at, payer_id, recipient_id, property_id, tenancy_id, booking_id, \
    maintenance_request_id, parent_payment_id, is_recurring, frequency, next_payment_date, \
    recurring_end_date, remaining_payments, gateway_intent_id, gateway_charge_id, \
    gateway_client_secret, gateway_response, failure_reason, refund_status, refund_reason, \
    refunded_at, billing_name, billing_email, billing_address, is_test, is_manual, \
    requires_review, notes, metadata, created_by, updated_by, created_at, updated_at, deleted_at";

/// A `payments` row as stored
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub payment_type: String,
    pub status: String,
    pub method: String,
    pub currency: String,
    pub amount: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    pub refunded_amount: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub payer_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenancy_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub maintenance_request_id: Option<Uuid>,
    pub parent_payment_id: Option<Uuid>,
    pub is_recurring: bool,
    pub frequency: Option<String>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<i32>,
    pub gateway_intent_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    pub gateway_client_secret: Option<String>,
    pub gateway_response: Option<Value>,
    pub failure_reason: Option<String>,
    pub refund_status: String,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub is_test: bool,
    pub is_manual: bool,
    pub requires_review: bool,
    pub notes: Option<String>,
    pub metadata: Value,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub count: i64,
    pub amount: Decimal,
    pub completed_count: i64,
    pub completed_amount: Decimal,
    pub refunded_amount: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct BreakdownRecord {
    pub key: String,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct PropertyTotalRow {
    pub property_id: Uuid,
    pub title: Option<String>,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct PropertyRow {
    pub id: Uuid,
    pub title: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkedRow {
    pub id: Uuid,
    pub label: String,
    pub status: Option<String>,
}

/// Tables a payment can point at by raw id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedTable {
    Tenancies,
    Bookings,
    MaintenanceRequests,
}

impl LinkedTable {
    fn name(&self) -> &'static str {
        match self {
            LinkedTable::Tenancies => "tenancies",
            LinkedTable::Bookings => "bookings",
            LinkedTable::MaintenanceRequests => "maintenance_requests",
        }
    }
}

/// SQL access to payments
#[derive(Debug, Clone)]
pub struct PaymentStore {
    pool: PgPool,
}

impl PaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn insert(&self, payment: &Payment) -> Result<(), DatabaseError> {
        insert_query(payment).build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn update(&self, payment: &Payment) -> Result<(), DatabaseError> {
        let result = update_query(payment).build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", payment.id));
        }
        Ok(())
    }

    /// Saves the advanced anchor and inserts its successor in one transaction
    pub async fn record_cycle(&self, anchor: &Payment, successor: &Payment) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let result = update_query(anchor).build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", anchor.id));
        }
        insert_query(successor).build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentRow>, DatabaseError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_gateway_intent(&self, intent_id: &str) -> Result<Option<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE gateway_intent_id = $1",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(intent_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_children(&self, parent_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE parent_payment_id = $1 ORDER BY created_at, id",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// One page of matching rows plus the total match count
    pub async fn search(&self, query: &PaymentQuery) -> Result<(Vec<PaymentRow>, i64), DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM payments WHERE TRUE");
        push_filter(&mut count, &query.filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM payments WHERE TRUE",
            PAYMENT_COLUMNS
        ));
        push_filter(&mut select, &query.filter);
        let direction = query.direction.as_sql();
        select.push(format!(
            " ORDER BY {} {} {}, id {}",
            query.sort.column(),
            direction,
            query.direction.nulls_sql(),
            direction
        ));
        select.push(" LIMIT ");
        select.push_bind(i64::from(query.pagination.limit));
        select.push(" OFFSET ");
        select.push_bind(query.pagination.offset() as i64);

        let rows = select
            .build_query_as::<PaymentRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn due_recurring(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payments \
             WHERE is_recurring AND status = $1 AND deleted_at IS NULL \
               AND next_payment_date BETWEEN $2 AND $3 \
             ORDER BY next_payment_date, id",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(PaymentStatus::Completed.as_str())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn recent(&self, limit: u32) -> Result<Vec<PaymentRow>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT $1",
            PAYMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?)
    }

    // ========================================================================
    // Referenced records
    // ========================================================================

    pub async fn users(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, UserRow>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.id, r)).collect())
    }

    pub async fn properties(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PropertyRow>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, PropertyRow>(
            "SELECT id, title, address FROM properties WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.id, r)).collect())
    }

    pub async fn linked(&self, table: LinkedTable, id: Uuid) -> Result<Option<LinkedRow>, DatabaseError> {
        let sql = format!("SELECT id, label, status FROM {} WHERE id = $1", table.name());
        Ok(sqlx::query_as::<_, LinkedRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    pub async fn summarize(&self, filter: &PaymentFilter) -> Result<SummaryRow, DatabaseError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS count, \
                    COALESCE(SUM(amount), 0) AS amount, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_count, \
                    COALESCE(SUM(amount) FILTER (WHERE status = 'completed'), 0) AS completed_amount, \
                    COALESCE(SUM(refunded_amount), 0) AS refunded_amount \
             FROM payments WHERE TRUE",
        );
        push_filter(&mut builder, filter);
        Ok(builder
            .build_query_as::<SummaryRow>()
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn breakdown(&self, dimension: Dimension) -> Result<Vec<BreakdownRecord>, DatabaseError> {
        let column = dimension.column();
        let sql = format!(
            "SELECT {column} AS key, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount \
             FROM payments WHERE deleted_at IS NULL GROUP BY {column}"
        );
        Ok(sqlx::query_as::<_, BreakdownRecord>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn top_properties(&self, limit: u32) -> Result<Vec<PropertyTotalRow>, DatabaseError> {
        Ok(sqlx::query_as::<_, PropertyTotalRow>(
            "SELECT p.property_id AS property_id, pr.title AS title, \
                    COUNT(*) AS count, COALESCE(SUM(p.amount), 0) AS amount \
             FROM payments p \
             LEFT JOIN properties pr ON pr.id = p.property_id \
             WHERE p.deleted_at IS NULL AND p.property_id IS NOT NULL \
             GROUP BY p.property_id, pr.title \
             ORDER BY amount DESC, p.property_id \
             LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?)
    }
}

// ============================================================================
// Query building
// ============================================================================

fn insert_query(payment: &Payment) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO payments ({}) VALUES (", PAYMENT_COLUMNS));
    push_payment_values(&mut builder, payment);
    builder.push(")");
    builder
}

fn update_query(payment: &Payment) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("UPDATE payments SET ({}) = ROW(", PAYMENT_COLUMNS));
    push_payment_values(&mut builder, payment);
    builder.push(") WHERE id = ");
    builder.push_bind(*payment.id.as_uuid());
    builder
}

/// Binds every column of [`PAYMENT_COLUMNS`] in order
fn push_payment_values(builder: &mut QueryBuilder<'static, Postgres>, p: &Payment) {
    let mut values = builder.separated(", ");
    values
        .push_bind(*p.id.as_uuid())
        .push_bind(p.reference.clone())
        .push_bind(p.title.clone())
        .push_bind(p.description.clone())
        .push_bind(p.payment_type.as_str())
        .push_bind(p.status.as_str())
        .push_bind(p.method.as_str())
        .push_bind(p.currency.code())
        .push_bind(p.amount.amount())
        .push_bind(p.fee_amount.amount())
        .push_bind(p.net_amount.amount())
        .push_bind(p.refunded_amount.amount())
        .push_bind(p.due_date)
        .push_bind(p.processed_at)
        .push_bind(p.captured_at)
        .push_bind(*p.payer_id.as_uuid())
        .push_bind(p.recipient_id.map(Uuid::from))
        .push_bind(p.property_id.map(Uuid::from))
        .push_bind(p.tenancy_id.map(Uuid::from))
        .push_bind(p.booking_id.map(Uuid::from))
        .push_bind(p.maintenance_request_id.map(Uuid::from))
        .push_bind(p.parent_payment_id.map(Uuid::from))
        .push_bind(p.is_recurring)
        .push_bind(p.frequency.map(|f| f.as_str()))
        .push_bind(p.next_payment_date)
        .push_bind(p.recurring_end_date)
        .push_bind(p.remaining_payments.map(|n| i32::try_from(n).unwrap_or(i32::MAX)))
        .push_bind(p.gateway_intent_id.clone())
        .push_bind(p.gateway_charge_id.clone())
        .push_bind(p.gateway_client_secret.clone())
        .push_bind(p.gateway_response.clone())
        .push_bind(p.failure_reason.clone())
        .push_bind(p.refund_status.as_str())
        .push_bind(p.refund_reason.clone())
        .push_bind(p.refunded_at)
        .push_bind(p.billing_name.clone())
        .push_bind(p.billing_email.clone())
        .push_bind(p.billing_address.clone())
        .push_bind(p.is_test)
        .push_bind(p.is_manual)
        .push_bind(p.requires_review)
        .push_bind(p.notes.clone())
        .push_bind(p.metadata.clone())
        .push_bind(*p.created_by.as_uuid())
        .push_bind(p.updated_by.map(Uuid::from))
        .push_bind(p.created_at)
        .push_bind(p.updated_at)
        .push_bind(p.deleted_at);
}

/// Appends ` AND ...` clauses for every populated filter field
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    fn eq<'a, T>(builder: &mut QueryBuilder<'a, Postgres>, column: &str, value: Option<T>)
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(value) = value {
            builder.push(format!(" AND {} = ", column));
            builder.push_bind(value);
        }
    }

    eq(builder, "payer_id", filter.payer_id.map(Uuid::from));
    eq(builder, "recipient_id", filter.recipient_id.map(Uuid::from));
    eq(builder, "property_id", filter.property_id.map(Uuid::from));
    eq(builder, "booking_id", filter.booking_id.map(Uuid::from));
    eq(builder, "tenancy_id", filter.tenancy_id.map(Uuid::from));
    eq(builder, "maintenance_request_id", filter.maintenance_request_id.map(Uuid::from));
    eq(builder, "payment_type", filter.payment_type.map(|v| v.as_str()));
    eq(builder, "method", filter.method.map(|v| v.as_str()));
    eq(builder, "frequency", filter.frequency.map(|v| v.as_str()));
    eq(builder, "refund_status", filter.refund_status.map(|v| v.as_str()));
    eq(builder, "currency", filter.currency.map(|c| c.code()));
    eq(builder, "is_recurring", filter.is_recurring);
    eq(builder, "is_test", filter.is_test);
    eq(builder, "is_manual", filter.is_manual);
    eq(builder, "requires_review", filter.requires_review);

    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
        builder.push(" AND status = ANY(");
        builder.push_bind(statuses);
        builder.push(")");
    }

    let ranges: [(&str, &str, Option<DateTime<Utc>>); 5] = [
        ("created_at", ">=", filter.created_from),
        ("created_at", "<=", filter.created_to),
        ("created_at", "<", filter.created_before),
        ("due_date", ">=", filter.due_from),
        ("due_date", "<=", filter.due_to),
    ];
    for (column, op, value) in ranges {
        if let Some(value) = value {
            builder.push(format!(" AND {} {} ", column, op));
            builder.push_bind(value);
        }
    }
    if let Some(min) = filter.amount_min {
        builder.push(" AND amount >= ");
        builder.push_bind(min);
    }
    if let Some(max) = filter.amount_max {
        builder.push(" AND amount <= ");
        builder.push_bind(max);
    }

    if let Some(email) = filter.billing_email.as_deref().filter(|s| !s.trim().is_empty()) {
        builder.push(" AND billing_email ILIKE ");
        builder.push_bind(like_pattern(email));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR reference ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR billing_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if !filter.include_deleted {
        builder.push(" AND deleted_at IS NULL");
    }
}

/// `%term%` with LIKE wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
