//! Payment Domain
//!
//! Payment lifecycle for property management: rent, deposits, booking and
//! maintenance charges collected from payers and paid out to recipients.
//!
//! - [`Payment`]: the canonical payment record and its edit rules
//! - [`lifecycle`]: the status transition table
//! - [`PaymentService`]: create, search, process, refund, reconcile webhooks,
//!   dashboard statistics and the recurring batch
//! - [`ports`]: repository and card gateway traits, with in-memory adapters
//!   under the `mock` feature

pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod payment;
pub mod ports;
pub mod query;
pub mod recurrence;
pub mod reference;
pub mod service;
pub mod stats;

pub use error::{PaymentError, PaymentResult};
pub use gateway::{
    CreateIntentRequest, GatewayEvent, GatewayEventKind, GatewayIntent, GatewayRefund,
    IntentStatus, RefundRequest,
};
pub use lifecycle::PaymentEvent;
pub use payment::{
    LinkedRecord, NewPayment, Payment, PaymentDetails, PaymentFrequency, PaymentMethod,
    PaymentPatch, PaymentRelations, PaymentStatus, PaymentType, PropertySummary, RecentPayment,
    RefundStatus, UserSummary,
};
pub use ports::{
    AmountSummary, BreakdownRow, Dimension, PaymentGateway, PaymentRepository, PropertyTotal,
};
pub use query::{
    Page, Pagination, PaymentFilter, PaymentQuery, SortDirection, SortField, DEFAULT_LIMIT,
    DEFAULT_PAGE, MAX_LIMIT,
};
pub use recurrence::{plan_next_cycle, CyclePlan, RecurringRunReport};
pub use service::{
    IntentInput, PaymentService, ProcessPayment, RefundPayment, ServiceSettings, WebhookOutcome,
};
pub use stats::{BreakdownEntry, CountAmount, DashboardStats, MonthlyTrend};
