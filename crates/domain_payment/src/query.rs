//! Payment search: filters, allow-listed sorting and pagination

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    BookingId, Currency, MaintenanceRequestId, PropertyId, TenancyId, UserId,
};

use crate::payment::{
    Payment, PaymentFrequency, PaymentMethod, PaymentStatus, PaymentType, RefundStatus,
};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Filter criteria; every populated field must match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub payer_id: Option<UserId>,
    pub recipient_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub booking_id: Option<BookingId>,
    pub tenancy_id: Option<TenancyId>,
    pub maintenance_request_id: Option<MaintenanceRequestId>,
    pub payment_type: Option<PaymentType>,
    /// Any of these statuses; empty means any status
    pub statuses: Vec<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub frequency: Option<PaymentFrequency>,
    pub refund_status: Option<RefundStatus>,
    /// Inclusive creation range
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time, for calendar windows
    pub created_before: Option<DateTime<Utc>>,
    /// Inclusive due-date range
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    /// Inclusive amount range
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
    pub currency: Option<Currency>,
    pub is_recurring: Option<bool>,
    pub is_test: Option<bool>,
    pub is_manual: Option<bool>,
    pub requires_review: Option<bool>,
    /// Case-insensitive substring of the billing email
    pub billing_email: Option<String>,
    /// Case-insensitive substring of title, description, reference or billing name
    pub search: Option<String>,
    /// Soft-deleted rows are hidden unless set
    pub include_deleted: bool,
}

impl PaymentFilter {
    pub fn for_status(status: PaymentStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    /// Restricts to payments created inside `[from, to)`
    pub fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_before = Some(to);
        self
    }

    /// In-process evaluation, used by the in-memory repository
    pub fn matches(&self, p: &Payment) -> bool {
        fn eq<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().map_or(true, |w| w == actual)
        }
        fn eq_opt<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
            wanted.as_ref().map_or(true, |w| actual.as_ref() == Some(w))
        }
        fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
            haystack.map_or(false, |h| h.to_lowercase().contains(needle))
        }

        if !self.include_deleted && p.is_deleted() {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&p.status) {
            return false;
        }
        if !(eq(&self.payer_id, &p.payer_id)
            && eq_opt(&self.recipient_id, &p.recipient_id)
            && eq_opt(&self.property_id, &p.property_id)
            && eq_opt(&self.booking_id, &p.booking_id)
            && eq_opt(&self.tenancy_id, &p.tenancy_id)
            && eq_opt(&self.maintenance_request_id, &p.maintenance_request_id)
            && eq(&self.payment_type, &p.payment_type)
            && eq(&self.method, &p.method)
            && eq_opt(&self.frequency, &p.frequency)
            && eq(&self.refund_status, &p.refund_status)
            && eq(&self.currency, &p.currency)
            && eq(&self.is_recurring, &p.is_recurring)
            && eq(&self.is_test, &p.is_test)
            && eq(&self.is_manual, &p.is_manual)
            && eq(&self.requires_review, &p.requires_review))
        {
            return false;
        }

        if self.created_from.is_some_and(|from| p.created_at < from)
            || self.created_to.is_some_and(|to| p.created_at > to)
            || self.created_before.is_some_and(|before| p.created_at >= before)
        {
            return false;
        }
        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = p.due_date else {
                return false;
            };
            if self.due_from.is_some_and(|from| due < from)
                || self.due_to.is_some_and(|to| due > to)
            {
                return false;
            }
        }
        let amount = p.amount.amount();
        if self.amount_min.is_some_and(|min| amount < min)
            || self.amount_max.is_some_and(|max| amount > max)
        {
            return false;
        }

        if let Some(email) = &self.billing_email {
            if !contains_ci(p.billing_email.as_deref(), &email.trim().to_lowercase()) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.trim().to_lowercase();
            let hit = contains_ci(Some(&p.title), &term)
                || contains_ci(p.description.as_deref(), &term)
                || contains_ci(Some(&p.reference), &term)
                || contains_ci(p.billing_name.as_deref(), &term);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Columns a caller may sort by
///
/// Deserialization fails for anything else, so an unknown column is a 400
/// before any query is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    #[serde(alias = "createdAt")]
    CreatedAt,
    #[serde(alias = "updatedAt")]
    UpdatedAt,
    #[serde(alias = "dueDate")]
    DueDate,
    #[serde(alias = "processedAt")]
    ProcessedAt,
    Amount,
    #[serde(alias = "netAmount")]
    NetAmount,
    Status,
    #[serde(alias = "paymentType", alias = "type")]
    PaymentType,
    Method,
    Reference,
    Title,
}

impl SortField {
    /// Database column backing this sort key
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::DueDate => "due_date",
            SortField::ProcessedAt => "processed_at",
            SortField::Amount => "amount",
            SortField::NetAmount => "net_amount",
            SortField::Status => "status",
            SortField::PaymentType => "payment_type",
            SortField::Method => "method",
            SortField::Reference => "reference",
            SortField::Title => "title",
        }
    }

    /// Ascending comparison on this key alone; missing dates sort first
    pub fn compare(&self, a: &Payment, b: &Payment) -> Ordering {
        match self {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::ProcessedAt => a.processed_at.cmp(&b.processed_at),
            SortField::Amount => a.amount.amount().cmp(&b.amount.amount()),
            SortField::NetAmount => a.net_amount.amount().cmp(&b.net_amount.amount()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::PaymentType => a.payment_type.as_str().cmp(b.payment_type.as_str()),
            SortField::Method => a.method.as_str().cmp(b.method.as_str()),
            SortField::Reference => a.reference.cmp(&b.reference),
            SortField::Title => a.title.cmp(&b.title),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc", alias = "ASC", alias = "Asc")]
    Asc,
    #[default]
    #[serde(rename = "desc", alias = "DESC", alias = "Desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// NULL placement matching `Option` ordering (None first when ascending)
    pub fn nulls_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "NULLS FIRST",
            SortDirection::Desc => "NULLS LAST",
        }
    }
}

/// Effective page window after defaulting and clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Defaults to page 1 of 10; page is at least 1, limit is clamped to 1..=100
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// A complete search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentQuery {
    pub filter: PaymentFilter,
    pub sort: SortField,
    pub direction: SortDirection,
    pub pagination: Pagination,
}

impl PaymentQuery {
    /// Total order used for paging: the sort key, then id as a tiebreak
    pub fn compare(&self, a: &Payment, b: &Payment) -> Ordering {
        let ordering = self.sort.compare(a, b).then_with(|| a.id.cmp(&b.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Count of all rows matching the filter
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let limit = u64::from(pagination.limit);
        let total_pages = total.div_ceil(limit) as u32;
        Self {
            data,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::new(Some(3), Some(500)).limit, MAX_LIMIT);
        assert_eq!(Pagination::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_unknown_sort_field_is_rejected() {
        let parsed: Result<SortField, _> = serde_json::from_str("\"amount; DROP TABLE payments\"");
        assert!(parsed.is_err());

        let parsed: SortField = serde_json::from_str("\"dueDate\"").unwrap();
        assert_eq!(parsed, SortField::DueDate);
    }

    #[test]
    fn test_sort_direction_accepts_upper_case() {
        let parsed: SortDirection = serde_json::from_str("\"ASC\"").unwrap();
        assert_eq!(parsed, SortDirection::Asc);
    }

    #[test]
    fn test_search_ignores_surrounding_whitespace() {
        use crate::payment::{NewPayment, Payment, PaymentMethod, PaymentType};
        use chrono::Utc;
        use core_kernel::{Currency, UserId};
        use rust_decimal_macros::dec;

        let mut input = NewPayment::new("March rent", PaymentType::Rent, PaymentMethod::Cash, dec!(10));
        input.billing_email = Some("tenant@example.com".to_string());
        let payment = Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap();

        let filter = PaymentFilter {
            search: Some("  MARCH ".to_string()),
            billing_email: Some(" Tenant@ ".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&payment));
    }

    #[test]
    fn test_page_counts() {
        let page: Page<u8> = Page::new(vec![], 21, Pagination::new(Some(1), Some(10)));
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 0);
    }
}
