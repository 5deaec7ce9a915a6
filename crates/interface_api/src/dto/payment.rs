//! Payment DTOs

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Currency, PaymentId, PropertyId, UserId};
use domain_payment::{
    BreakdownEntry, CountAmount, DashboardStats, GatewayIntent, IntentInput, IntentStatus,
    LinkedRecord, MonthlyTrend, NewPayment, Page, Pagination, Payment, PaymentDetails,
    PaymentFilter, PaymentFrequency, PaymentMethod, PaymentPatch, PaymentQuery, PaymentStatus,
    PaymentType, ProcessPayment, PropertySummary, PropertyTotal, RecentPayment,
    RecurringRunReport, RefundPayment, RefundStatus, SortDirection, SortField, UserSummary,
};

use crate::error::ApiError;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub fee_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub payer_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenancy_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub maintenance_request_id: Option<Uuid>,
    #[serde(default)]
    pub is_recurring: bool,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,
    #[validate(length(max = 255, message = "Billing name is too long"))]
    pub billing_name: Option<String>,
    #[validate(email(message = "Invalid billing email"))]
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub requires_review: bool,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreatePaymentRequest {
    pub fn into_input(self) -> Result<NewPayment, ApiError> {
        Ok(NewPayment {
            currency: parse_currency(self.currency.as_deref())?,
            title: self.title,
            description: self.description,
            payment_type: self.payment_type,
            method: self.method,
            amount: self.amount,
            fee_amount: self.fee_amount,
            due_date: self.due_date,
            payer_id: self.payer_id.map(Into::into),
            recipient_id: self.recipient_id.map(Into::into),
            property_id: self.property_id.map(Into::into),
            tenancy_id: self.tenancy_id.map(Into::into),
            booking_id: self.booking_id.map(Into::into),
            maintenance_request_id: self.maintenance_request_id.map(Into::into),
            is_recurring: self.is_recurring,
            frequency: self.frequency,
            next_payment_date: self.next_payment_date,
            recurring_end_date: self.recurring_end_date,
            remaining_payments: self.remaining_payments,
            billing_name: self.billing_name,
            billing_email: self.billing_email,
            billing_address: self.billing_address,
            is_test: self.is_test,
            requires_review: self.requires_review,
            notes: self.notes,
            metadata: self.metadata,
        })
    }
}

/// Editable fields; `status` and `currency` are refused as unknown fields
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdatePaymentRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "Description is too long"))]
    pub description: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub method: Option<PaymentMethod>,
    pub amount: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub recipient_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenancy_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub maintenance_request_id: Option<Uuid>,
    pub is_recurring: Option<bool>,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,
    #[validate(length(max = 255, message = "Billing name is too long"))]
    pub billing_name: Option<String>,
    #[validate(email(message = "Invalid billing email"))]
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub requires_review: Option<bool>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl From<UpdatePaymentRequest> for PaymentPatch {
    fn from(req: UpdatePaymentRequest) -> Self {
        PaymentPatch {
            title: req.title,
            description: req.description,
            payment_type: req.payment_type,
            method: req.method,
            amount: req.amount,
            fee_amount: req.fee_amount,
            due_date: req.due_date,
            recipient_id: req.recipient_id.map(Into::into),
            property_id: req.property_id.map(Into::into),
            tenancy_id: req.tenancy_id.map(Into::into),
            booking_id: req.booking_id.map(Into::into),
            maintenance_request_id: req.maintenance_request_id.map(Into::into),
            is_recurring: req.is_recurring,
            frequency: req.frequency,
            next_payment_date: req.next_payment_date,
            recurring_end_date: req.recurring_end_date,
            remaining_payments: req.remaining_payments,
            billing_name: req.billing_name,
            billing_email: req.billing_email,
            billing_address: req.billing_address,
            requires_review: req.requires_review,
            notes: req.notes,
            metadata: req.metadata,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProcessPaymentRequest {
    #[validate(length(min = 1, message = "Payment intent id cannot be empty"))]
    pub payment_intent_id: Option<String>,
    #[validate(length(min = 1, message = "Payment method id cannot be empty"))]
    pub payment_method_id: Option<String>,
}

impl From<ProcessPaymentRequest> for ProcessPayment {
    fn from(req: ProcessPaymentRequest) -> Self {
        ProcessPayment {
            payment_intent_id: req.payment_intent_id,
            payment_method_id: req.payment_method_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    /// Defaults to the full amount
    pub amount: Option<Decimal>,
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
}

impl From<RefundPaymentRequest> for RefundPayment {
    fn from(req: RefundPaymentRequest) -> Self {
        RefundPayment {
            amount: req.amount,
            reason: req.reason,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentIntentRequest {
    pub amount: Decimal,
    pub currency: Option<String>,
    #[validate(length(max = 1000, message = "Description is too long"))]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntentRequest {
    pub fn into_input(self) -> Result<IntentInput, ApiError> {
        Ok(IntentInput {
            currency: parse_currency(self.currency.as_deref())?,
            amount: self.amount,
            description: self.description,
            metadata: self.metadata,
        })
    }
}

/// Query string of `GET /payments`
///
/// `status` takes a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortDirection>,
    pub status: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub method: Option<PaymentMethod>,
    pub frequency: Option<PaymentFrequency>,
    pub refund_status: Option<RefundStatus>,
    pub payer_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub tenancy_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub maintenance_request_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub is_recurring: Option<bool>,
    pub is_test: Option<bool>,
    pub is_manual: Option<bool>,
    pub requires_review: Option<bool>,
    pub billing_email: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl ListPaymentsQuery {
    pub fn into_query(self) -> Result<PaymentQuery, ApiError> {
        let statuses = match self.status.as_deref() {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| PaymentStatus::from_str(s).map_err(|e| ApiError::BadRequest(e.to_string())))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(ApiError::BadRequest(
                    "min_amount cannot exceed max_amount".to_string(),
                ));
            }
        }

        Ok(PaymentQuery {
            filter: PaymentFilter {
                payer_id: self.payer_id.map(Into::into),
                recipient_id: self.recipient_id.map(Into::into),
                property_id: self.property_id.map(Into::into),
                booking_id: self.booking_id.map(Into::into),
                tenancy_id: self.tenancy_id.map(Into::into),
                maintenance_request_id: self.maintenance_request_id.map(Into::into),
                payment_type: self.payment_type,
                statuses,
                method: self.method,
                frequency: self.frequency,
                refund_status: self.refund_status,
                created_from: self.start_date,
                created_to: self.end_date,
                created_before: None,
                due_from: self.due_from,
                due_to: self.due_to,
                amount_min: self.min_amount,
                amount_max: self.max_amount,
                currency: parse_currency(self.currency.as_deref())?,
                is_recurring: self.is_recurring,
                is_test: self.is_test,
                is_manual: self.is_manual,
                requires_review: self.requires_review,
                billing_email: non_blank(self.billing_email),
                search: non_blank(self.search),
                include_deleted: self.include_deleted,
            },
            sort: self.sort_by.unwrap_or_default(),
            direction: self.sort_order.unwrap_or_default(),
            pagination: Pagination::new(self.page, self.limit),
        })
    }
}

fn parse_currency(code: Option<&str>) -> Result<Option<Currency>, ApiError> {
    code.map(|c| Currency::from_str(c).map_err(|e| ApiError::BadRequest(e.to_string())))
        .transpose()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Responses
// ============================================================================

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub currency: Currency,
    pub amount: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    pub refunded_amount: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub payer_id: UserId,
    pub recipient_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub tenancy_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub maintenance_request_id: Option<Uuid>,
    pub parent_payment_id: Option<PaymentId>,
    pub is_recurring: bool,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,
    pub gateway_intent_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    /// Handed to the browser to confirm a card payment
    pub client_secret: Option<String>,
    pub failure_reason: Option<String>,
    pub refund_status: RefundStatus,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub is_test: bool,
    pub is_manual: bool,
    pub requires_review: bool,
    pub notes: Option<String>,
    pub metadata: serde_json::Value,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            reference: p.reference,
            title: p.title,
            description: p.description,
            payment_type: p.payment_type,
            status: p.status,
            method: p.method,
            currency: p.currency,
            amount: p.amount.amount(),
            fee_amount: p.fee_amount.amount(),
            net_amount: p.net_amount.amount(),
            refunded_amount: p.refunded_amount.amount(),
            due_date: p.due_date,
            processed_at: p.processed_at,
            captured_at: p.captured_at,
            payer_id: p.payer_id,
            recipient_id: p.recipient_id,
            property_id: p.property_id,
            tenancy_id: p.tenancy_id.map(Into::into),
            booking_id: p.booking_id.map(Into::into),
            maintenance_request_id: p.maintenance_request_id.map(Into::into),
            parent_payment_id: p.parent_payment_id,
            is_recurring: p.is_recurring,
            frequency: p.frequency,
            next_payment_date: p.next_payment_date,
            recurring_end_date: p.recurring_end_date,
            remaining_payments: p.remaining_payments,
            gateway_intent_id: p.gateway_intent_id,
            gateway_charge_id: p.gateway_charge_id,
            client_secret: p.gateway_client_secret,
            failure_reason: p.failure_reason,
            refund_status: p.refund_status,
            refund_reason: p.refund_reason,
            refunded_at: p.refunded_at,
            billing_name: p.billing_name,
            billing_email: p.billing_email,
            billing_address: p.billing_address,
            is_test: p.is_test,
            is_manual: p.is_manual,
            requires_review: p.requires_review,
            notes: p.notes,
            metadata: p.metadata,
            created_by: p.created_by,
            updated_by: p.updated_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
            deleted_at: p.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentDetailsResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub payer: Option<UserSummary>,
    pub recipient: Option<UserSummary>,
    pub property: Option<PropertySummary>,
    pub tenancy: Option<LinkedRecord>,
    pub booking: Option<LinkedRecord>,
    pub maintenance_request: Option<LinkedRecord>,
    pub parent: Option<Box<PaymentResponse>>,
    pub children: Vec<PaymentResponse>,
}

impl From<PaymentDetails> for PaymentDetailsResponse {
    fn from(details: PaymentDetails) -> Self {
        let r = details.relations;
        Self {
            payment: details.payment.into(),
            payer: r.payer,
            recipient: r.recipient,
            property: r.property,
            tenancy: r.tenancy,
            booking: r.booking,
            maintenance_request: r.maintenance_request,
            parent: r.parent.map(|p| Box::new(PaymentResponse::from(*p))),
            children: r.children.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<PaymentResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl From<Page<Payment>> for PaymentListResponse {
    fn from(page: Page<Payment>) -> Self {
        Self {
            pagination: PaginationMeta {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
            },
            payments: page.data.into_iter().map(PaymentResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecentPaymentResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub payer: Option<UserSummary>,
    pub property: Option<PropertySummary>,
}

impl From<RecentPayment> for RecentPaymentResponse {
    fn from(recent: RecentPayment) -> Self {
        Self {
            payment: recent.payment.into(),
            payer: recent.payer,
            property: recent.property,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total: CountAmount,
    pub pending: CountAmount,
    pub completed: CountAmount,
    pub failed: CountAmount,
    pub refunded: CountAmount,
    pub average_amount: Decimal,
    pub by_type: Vec<BreakdownEntry<PaymentType>>,
    pub by_method: Vec<BreakdownEntry<PaymentMethod>>,
    pub by_status: Vec<BreakdownEntry<PaymentStatus>>,
    pub monthly_trend: Vec<MonthlyTrend>,
    pub top_properties: Vec<PropertyTotal>,
    pub recent_payments: Vec<RecentPaymentResponse>,
    pub currency: Currency,
    pub generated_at: DateTime<Utc>,
}

impl From<DashboardStats> for DashboardResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total: stats.total,
            pending: stats.pending,
            completed: stats.completed,
            failed: stats.failed,
            refunded: stats.refunded,
            average_amount: stats.average_amount,
            by_type: stats.by_type,
            by_method: stats.by_method,
            by_status: stats.by_status,
            monthly_trend: stats.monthly_trend,
            top_properties: stats.top_properties,
            recent_payments: stats.recent.into_iter().map(Into::into).collect(),
            currency: stats.currency,
            generated_at: stats.generated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount_minor: i64,
    pub currency: String,
}

impl From<GatewayIntent> for PaymentIntentResponse {
    fn from(intent: GatewayIntent) -> Self {
        Self {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecurringRunResponse {
    pub examined: usize,
    pub created: Vec<PaymentId>,
    pub failed: Vec<PaymentId>,
}

impl From<RecurringRunReport> for RecurringRunResponse {
    fn from(report: RecurringRunReport) -> Self {
        Self {
            examined: report.examined,
            created: report.created,
            failed: report.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn list_query(raw: &str) -> ListPaymentsQuery {
        let uri: axum::http::Uri = format!("/payments?{}", raw).parse().unwrap();
        axum::extract::Query::<ListPaymentsQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[test]
    fn test_status_list_is_split() {
        let query = list_query("status=pending,completed&page=2&limit=500")
            .into_query()
            .unwrap();
        assert_eq!(
            query.filter.statuses,
            vec![PaymentStatus::Pending, PaymentStatus::Completed]
        );
        assert_eq!(query.pagination.page, 2);
        assert_eq!(query.pagination.limit, 100);
    }

    #[test]
    fn test_unknown_status_is_bad_request() {
        let err = list_query("status=paid").into_query().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_sort_accepts_camel_case_alias() {
        let query = list_query("sort_by=dueDate&sort_order=asc").into_query().unwrap();
        assert_eq!(query.sort, SortField::DueDate);
        assert_eq!(query.direction, SortDirection::Asc);
    }

    #[test]
    fn test_amount_bounds_and_currency() {
        let query = list_query("min_amount=10&max_amount=99.50&currency=eur")
            .into_query()
            .unwrap();
        assert_eq!(query.filter.amount_min, Some(dec!(10)));
        assert_eq!(query.filter.amount_max, Some(dec!(99.50)));
        assert_eq!(query.filter.currency, Some(Currency::EUR));

        let err = list_query("min_amount=100&max_amount=10").into_query().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_search_terms_are_trimmed() {
        let query = list_query("search=%20%20march%20&billing_email=%20").into_query().unwrap();
        assert_eq!(query.filter.search.as_deref(), Some("march"));
        assert_eq!(query.filter.billing_email, None);
    }

    #[test]
    fn test_update_refuses_status_field() {
        let result: Result<UpdatePaymentRequest, _> =
            serde_json::from_str(r#"{"title":"x","status":"completed"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_billing_email_fails_validation() {
        let req = UpdatePaymentRequest {
            billing_email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
