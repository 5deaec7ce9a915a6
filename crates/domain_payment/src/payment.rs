//! Payment entity
//!
//! A `Payment` is the single canonical record for money moving between a
//! payer and a recipient: rent, deposits, booking charges, maintenance
//! invoices and platform fees. Every status change goes through
//! [`Payment::transition`], which consults the lifecycle table in
//! [`crate::lifecycle`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{
    BookingId, Currency, MaintenanceRequestId, Money, PaymentId, PropertyId, TenancyId, UserId,
};

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::IntentStatus;
use crate::lifecycle::PaymentEvent;
use crate::recurrence::CyclePlan;
use crate::reference;

const MAX_TITLE_LEN: usize = 255;

/// Declares a closed set of snake_case values stored as text in the database
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every member, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The stored and serialized form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PaymentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(PaymentError::Validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// What the payment is for
    PaymentType {
        Rent => "rent",
        Deposit => "deposit",
        Booking => "booking",
        Maintenance => "maintenance",
        Utility => "utility",
        ServiceFee => "service_fee",
        LateFee => "late_fee",
        Commission => "commission",
        Other => "other",
    }
}

text_enum! {
    /// Lifecycle status of a payment
    PaymentStatus {
        /// Created, nothing collected yet
        Pending => "pending",
        /// A gateway intent exists and is in flight
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Refunded => "refunded",
        PartiallyRefunded => "partially_refunded",
    }
}

text_enum! {
    /// How the payer settles
    PaymentMethod {
        Card => "card",
        Stripe => "stripe",
        BankTransfer => "bank_transfer",
        DirectDebit => "direct_debit",
        StandingOrder => "standing_order",
        Cash => "cash",
        Cheque => "cheque",
        Paypal => "paypal",
        Other => "other",
    }
}

text_enum! {
    /// Billing cycle of a recurring series
    PaymentFrequency {
        OneTime => "one_time",
        Weekly => "weekly",
        Fortnightly => "fortnightly",
        Monthly => "monthly",
        Quarterly => "quarterly",
        Annually => "annually",
    }
}

text_enum! {
    /// Refund progress, tracked separately from the top-level status
    RefundStatus {
        None => "none",
        Pending => "pending",
        PartialRefund => "partial_refund",
        FullRefund => "full_refund",
        Failed => "failed",
    }
}

impl PaymentMethod {
    /// Methods collected through the card gateway
    pub fn is_card_based(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::Stripe)
    }
}

impl Default for RefundStatus {
    fn default() -> Self {
        RefundStatus::None
    }
}

/// Input for creating a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub title: String,
    pub description: Option<String>,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub fee_amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub due_date: Option<DateTime<Utc>>,
    /// Defaults to the acting user
    pub payer_id: Option<UserId>,
    pub recipient_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub tenancy_id: Option<TenancyId>,
    pub booking_id: Option<BookingId>,
    pub maintenance_request_id: Option<MaintenanceRequestId>,
    pub is_recurring: bool,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub is_test: bool,
    pub requires_review: bool,
    pub notes: Option<String>,
    pub metadata: Option<Value>,
}

impl NewPayment {
    /// Minimal input; everything else takes its default
    pub fn new(
        title: impl Into<String>,
        payment_type: PaymentType,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            payment_type,
            method,
            amount,
            fee_amount: None,
            currency: None,
            due_date: None,
            payer_id: None,
            recipient_id: None,
            property_id: None,
            tenancy_id: None,
            booking_id: None,
            maintenance_request_id: None,
            is_recurring: false,
            frequency: None,
            next_payment_date: None,
            recurring_end_date: None,
            remaining_payments: None,
            billing_name: None,
            billing_email: None,
            billing_address: None,
            is_test: false,
            requires_review: false,
            notes: None,
            metadata: None,
        }
    }
}

/// Partial update. Status and currency are not editable here: status moves
/// only through lifecycle events, and currency is fixed at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub method: Option<PaymentMethod>,
    pub amount: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub recipient_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub tenancy_id: Option<TenancyId>,
    pub booking_id: Option<BookingId>,
    pub maintenance_request_id: Option<MaintenanceRequestId>,
    pub is_recurring: Option<bool>,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,
    pub billing_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_address: Option<String>,
    pub requires_review: Option<bool>,
    pub notes: Option<String>,
    pub metadata: Option<Value>,
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Human-readable reference, `PAY-<timestamp>-<suffix>`
    pub reference: String,
    pub title: String,
    pub description: Option<String>,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub currency: Currency,
    pub amount: Money,
    pub fee_amount: Money,
    /// Always `amount - fee_amount`
    pub net_amount: Money,
    pub refunded_amount: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,

    pub payer_id: UserId,
    pub recipient_id: Option<UserId>,
    pub property_id: Option<PropertyId>,
    pub tenancy_id: Option<TenancyId>,
    pub booking_id: Option<BookingId>,
    pub maintenance_request_id: Option<MaintenanceRequestId>,
    pub parent_payment_id: Option<PaymentId>,

    pub is_recurring: bool,
    pub frequency: Option<PaymentFrequency>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub recurring_end_date: Option<DateTime<Utc>>,
    pub remaining_payments: Option<u32>,

    pub gateway_intent_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    pub gateway_client_secret: Option<String>,
    /// Last raw gateway payload, kept for audit
    pub gateway_response: Option<Value>,
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
    pub metadata: Value,

    pub created_by: UserId,
    pub updated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Builds a new pending payment from validated input
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Validation` when the title is blank, the amount
    /// is not positive, the fee is negative or larger than the amount, or a
    /// recurring payment lacks a usable schedule.
    pub fn create(
        input: NewPayment,
        actor: UserId,
        default_currency: Currency,
        now: DateTime<Utc>,
    ) -> PaymentResult<Self> {
        let title = validate_title(&input.title)?;
        let currency = input.currency.unwrap_or(default_currency);
        let amount = positive_amount(input.amount, currency)?;
        let fee_amount = fee_amount(input.fee_amount.unwrap_or(Decimal::ZERO), currency)?;

        let (frequency, next_payment_date) = if input.is_recurring {
            let frequency = match input.frequency {
                Some(PaymentFrequency::OneTime) | None => {
                    return Err(PaymentError::validation(
                        "recurring payments need a repeating frequency",
                    ))
                }
                Some(frequency) => frequency,
            };
            let next = input.next_payment_date.or(input.due_date).ok_or_else(|| {
                PaymentError::validation("recurring payments need a next payment date or due date")
            })?;
            (Some(frequency), Some(next))
        } else {
            (input.frequency, input.next_payment_date)
        };

        if input.remaining_payments == Some(0) {
            return Err(PaymentError::validation("remaining payments must be at least 1"));
        }

        let mut payment = Self {
            id: PaymentId::new_v7(),
            reference: reference::generate(now),
            title,
            description: input.description,
            payment_type: input.payment_type,
            status: PaymentStatus::Pending,
            method: input.method,
            currency,
            amount,
            fee_amount,
            net_amount: amount,
            refunded_amount: Money::zero(currency),
            due_date: input.due_date,
            processed_at: None,
            captured_at: None,
            payer_id: input.payer_id.unwrap_or(actor),
            recipient_id: input.recipient_id,
            property_id: input.property_id,
            tenancy_id: input.tenancy_id,
            booking_id: input.booking_id,
            maintenance_request_id: input.maintenance_request_id,
            parent_payment_id: None,
            is_recurring: input.is_recurring,
            frequency,
            next_payment_date,
            recurring_end_date: input.recurring_end_date,
            remaining_payments: input.remaining_payments,
            gateway_intent_id: None,
            gateway_charge_id: None,
            gateway_client_secret: None,
            gateway_response: None,
            failure_reason: None,
            refund_status: RefundStatus::None,
            refund_reason: None,
            refunded_at: None,
            billing_name: input.billing_name,
            billing_email: input.billing_email,
            billing_address: input.billing_address,
            is_test: input.is_test,
            is_manual: false,
            requires_review: input.requires_review,
            notes: input.notes,
            metadata: input.metadata.unwrap_or_else(|| Value::Object(Default::default())),
            created_by: actor,
            updated_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        payment.recompute_net()?;
        Ok(payment)
    }

    /// Returns true once the payment has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Wraps a decimal in this payment's currency at minor-unit precision
    pub fn money(&self, amount: Decimal) -> PaymentResult<Money> {
        Ok(Money::exact(amount, self.currency)?)
    }

    /// Re-derives `net_amount` from `amount` and `fee_amount`
    pub fn recompute_net(&mut self) -> PaymentResult<()> {
        if self.fee_amount.amount() > self.amount.amount() {
            return Err(PaymentError::validation("fee amount cannot exceed amount"));
        }
        self.net_amount = self.amount.checked_sub(&self.fee_amount)?;
        Ok(())
    }

    /// Fires a lifecycle event and stores the resulting status
    pub fn transition(&mut self, event: PaymentEvent) -> PaymentResult<PaymentStatus> {
        self.status = self.status.apply(event)?;
        Ok(self.status)
    }

    /// Merges an edit onto the payment
    pub fn apply_patch(
        &mut self,
        patch: PaymentPatch,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> PaymentResult<()> {
        self.transition(PaymentEvent::Edit)?;

        if let Some(title) = patch.title {
            self.title = validate_title(&title)?;
        }
        let money_changed = patch.amount.is_some() || patch.fee_amount.is_some();
        if let Some(amount) = patch.amount {
            self.amount = positive_amount(amount, self.currency)?;
        }
        if let Some(fee) = patch.fee_amount {
            self.fee_amount = fee_amount(fee, self.currency)?;
        }
        if money_changed {
            self.recompute_net()?;
        }

        if let Some(v) = patch.description {
            self.description = Some(v);
        }
        if let Some(v) = patch.payment_type {
            self.payment_type = v;
        }
        if let Some(v) = patch.method {
            self.method = v;
        }
        if let Some(v) = patch.due_date {
            self.due_date = Some(v);
        }
        if let Some(v) = patch.recipient_id {
            self.recipient_id = Some(v);
        }
        if let Some(v) = patch.property_id {
            self.property_id = Some(v);
        }
        if let Some(v) = patch.tenancy_id {
            self.tenancy_id = Some(v);
        }
        if let Some(v) = patch.booking_id {
            self.booking_id = Some(v);
        }
        if let Some(v) = patch.maintenance_request_id {
            self.maintenance_request_id = Some(v);
        }
        if let Some(v) = patch.is_recurring {
            self.is_recurring = v;
        }
        if let Some(v) = patch.frequency {
            self.frequency = Some(v);
        }
        if let Some(v) = patch.next_payment_date {
            self.next_payment_date = Some(v);
        }
        if let Some(v) = patch.recurring_end_date {
            self.recurring_end_date = Some(v);
        }
        if let Some(v) = patch.remaining_payments {
            if v == 0 {
                return Err(PaymentError::validation("remaining payments must be at least 1"));
            }
            self.remaining_payments = Some(v);
        }
        if let Some(v) = patch.billing_name {
            self.billing_name = Some(v);
        }
        if let Some(v) = patch.billing_email {
            self.billing_email = Some(v);
        }
        if let Some(v) = patch.billing_address {
            self.billing_address = Some(v);
        }
        if let Some(v) = patch.requires_review {
            self.requires_review = v;
        }
        if let Some(v) = patch.notes {
            self.notes = Some(v);
        }
        if let Some(v) = patch.metadata {
            self.metadata = v;
        }

        if self.is_recurring {
            if self.frequency.is_none() {
                return Err(PaymentError::validation("recurring payments need a frequency"));
            }
            if self.next_payment_date.is_none() {
                self.next_payment_date = self.due_date;
            }
            if self.next_payment_date.is_none() {
                return Err(PaymentError::validation(
                    "recurring payments need a next payment date or due date",
                ));
            }
        }

        self.touch(actor, now);
        Ok(())
    }

    /// Records a freshly created gateway intent
    pub fn attach_intent(
        &mut self,
        intent_id: impl Into<String>,
        client_secret: Option<String>,
        now: DateTime<Utc>,
    ) -> PaymentResult<()> {
        self.transition(PaymentEvent::IntentCreated)?;
        self.gateway_intent_id = Some(intent_id.into());
        self.gateway_client_secret = client_secret;
        self.updated_at = now;
        Ok(())
    }

    /// Settles without a gateway (bank transfer, cash, cheque)
    pub fn settle_manually(&mut self, actor: UserId, now: DateTime<Utc>) -> PaymentResult<()> {
        self.transition(PaymentEvent::ManualSettlement)?;
        self.is_manual = true;
        self.processed_at = Some(now);
        self.failure_reason = None;
        self.touch(actor, now);
        Ok(())
    }

    /// Maps a gateway intent status onto the local lifecycle
    ///
    /// `succeeded` completes the payment, `requires_payment_method` fails it
    /// and every other status leaves it where it is.
    pub fn apply_intent_status(
        &mut self,
        status: IntentStatus,
        charge_id: Option<&str>,
        failure_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentStatus> {
        match status {
            IntentStatus::Succeeded => {
                self.transition(PaymentEvent::GatewaySucceeded)?;
                self.processed_at = Some(now);
                self.captured_at = Some(now);
                self.failure_reason = None;
                if let Some(charge) = charge_id {
                    self.gateway_charge_id = Some(charge.to_string());
                }
            }
            IntentStatus::RequiresPaymentMethod => {
                self.transition(PaymentEvent::GatewayRequiresPaymentMethod)?;
                self.failure_reason = Some(
                    failure_message
                        .unwrap_or("Payment requires a new payment method")
                        .to_string(),
                );
            }
            _ => {
                self.transition(PaymentEvent::GatewayPending)?;
            }
        }
        self.updated_at = now;
        Ok(self.status)
    }

    /// Marks the payment failed with a reason
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> PaymentResult<()> {
        self.transition(PaymentEvent::ProcessingFailed)?;
        self.failure_reason = Some(reason.into());
        self.updated_at = now;
        Ok(())
    }

    /// Marks the payment cancelled after the gateway cancelled its intent
    pub fn cancel(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> PaymentResult<()> {
        self.transition(PaymentEvent::GatewayCanceled)?;
        if let Some(reason) = reason {
            self.failure_reason = Some(reason.to_string());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Resolves and validates a requested refund amount
    ///
    /// Defaults to the full original amount. The cap is the original amount,
    /// not the unrefunded balance.
    pub fn refund_amount(&self, requested: Option<Decimal>) -> PaymentResult<Money> {
        let requested = match requested {
            Some(amount) => self.money(amount)?,
            None => self.amount,
        };
        if !requested.is_positive() {
            return Err(PaymentError::validation("refund amount must be greater than zero"));
        }
        if requested.amount() > self.amount.amount() {
            return Err(PaymentError::validation(format!(
                "refund amount {} exceeds payment amount {}",
                requested, self.amount
            )));
        }
        Ok(requested)
    }

    /// Accumulates a refund and mirrors the result into the status
    pub fn apply_refund(
        &mut self,
        amount: Money,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> PaymentResult<()> {
        let accumulated = self.refunded_amount.checked_add(&amount)?;
        let full = accumulated.amount() >= self.amount.amount();
        self.transition(PaymentEvent::Refund { full })?;

        self.refunded_amount = accumulated;
        self.refund_status = if full {
            RefundStatus::FullRefund
        } else {
            RefundStatus::PartialRefund
        };
        if reason.is_some() {
            self.refund_reason = reason;
        }
        self.refunded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records a failed refund attempt without touching the top-level status
    pub fn mark_refund_failed(&mut self, now: DateTime<Utc>) {
        self.refund_status = RefundStatus::Failed;
        self.updated_at = now;
    }

    /// Soft-deletes the payment
    pub fn soft_delete(&mut self, actor: UserId, now: DateTime<Utc>) -> PaymentResult<()> {
        self.transition(PaymentEvent::Delete)?;
        self.deleted_at = Some(now);
        self.touch(actor, now);
        Ok(())
    }

    /// Clones this payment into the next pending instalment of its series
    ///
    /// The successor does not recur itself; only the series anchor spawns.
    pub fn successor(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> PaymentResult<Payment> {
        let mut next = Payment {
            id: PaymentId::new_v7(),
            reference: reference::generate(now),
            status: PaymentStatus::Pending,
            due_date: Some(due_date),
            processed_at: None,
            captured_at: None,
            parent_payment_id: Some(self.id),
            is_recurring: false,
            next_payment_date: None,
            recurring_end_date: None,
            remaining_payments: None,
            gateway_intent_id: None,
            gateway_charge_id: None,
            gateway_client_secret: None,
            gateway_response: None,
            failure_reason: None,
            refunded_amount: Money::zero(self.currency),
            refund_status: RefundStatus::None,
            refund_reason: None,
            refunded_at: None,
            is_manual: false,
            updated_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            ..self.clone()
        };
        next.recompute_net()?;
        Ok(next)
    }

    /// Moves the series anchor on by one cycle
    pub fn advance_schedule(&mut self, plan: &CyclePlan, now: DateTime<Utc>) {
        self.next_payment_date = Some(plan.next_payment_date);
        self.remaining_payments = plan.remaining_payments;
        self.is_recurring = plan.keeps_recurring;
        self.updated_at = now;
    }

    fn touch(&mut self, actor: UserId, now: DateTime<Utc>) {
        self.updated_by = Some(actor);
        self.updated_at = now;
    }
}

fn validate_title(title: &str) -> PaymentResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PaymentError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(PaymentError::validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Validates a payment amount in whole minor units of `currency`
pub(crate) fn positive_amount(amount: Decimal, currency: Currency) -> PaymentResult<Money> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::validation("amount must be greater than zero"));
    }
    Ok(Money::exact(amount, currency)?)
}

fn fee_amount(fee: Decimal, currency: Currency) -> PaymentResult<Money> {
    if fee < Decimal::ZERO {
        return Err(PaymentError::validation("fee amount cannot be negative"));
    }
    Ok(Money::exact(fee, currency)?)
}

// ============================================================================
// Read-side relation summaries
// ============================================================================

/// Display fields of a user referenced by a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Display fields of a property referenced by a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub title: String,
    pub address: Option<String>,
}

/// A tenancy, booking or maintenance request linked to a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedRecord {
    pub id: uuid::Uuid,
    pub label: String,
    pub status: Option<String>,
}

/// Everything a payment points at, expanded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRelations {
    pub payer: Option<UserSummary>,
    pub recipient: Option<UserSummary>,
    pub property: Option<PropertySummary>,
    pub tenancy: Option<LinkedRecord>,
    pub booking: Option<LinkedRecord>,
    pub maintenance_request: Option<LinkedRecord>,
    pub parent: Option<Box<Payment>>,
    pub children: Vec<Payment>,
}

/// A payment with its relations expanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    #[serde(flatten)]
    pub relations: PaymentRelations,
}

/// Dashboard row: a payment with payer and property expanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPayment {
    #[serde(flatten)]
    pub payment: Payment,
    pub payer: Option<UserSummary>,
    pub property: Option<PropertySummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rent(amount: Decimal) -> NewPayment {
        NewPayment::new("March rent", PaymentType::Rent, PaymentMethod::BankTransfer, amount)
    }

    #[test]
    fn test_create_computes_net_amount() {
        let mut input = rent(dec!(100.00));
        input.fee_amount = Some(dec!(5.00));

        let payment = Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap();

        assert_eq!(payment.net_amount.amount(), dec!(95.00));
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, Currency::GBP);
        assert!(payment.reference.starts_with("PAY-"));
    }

    #[test]
    fn test_create_defaults_payer_to_actor() {
        let actor = UserId::new();
        let payment = Payment::create(rent(dec!(10)), actor, Currency::GBP, Utc::now()).unwrap();
        assert_eq!(payment.payer_id, actor);
        assert_eq!(payment.created_by, actor);
    }

    #[test]
    fn test_create_rejects_fee_above_amount() {
        let mut input = rent(dec!(10.00));
        input.fee_amount = Some(dec!(10.01));
        let result = Payment::create(input, UserId::new(), Currency::GBP, Utc::now());
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_create_rejects_non_positive_amount() {
        let result = Payment::create(rent(dec!(0)), UserId::new(), Currency::GBP, Utc::now());
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_recurring_requires_schedule() {
        let mut input = rent(dec!(900));
        input.is_recurring = true;
        input.frequency = Some(PaymentFrequency::Monthly);
        let result = Payment::create(input, UserId::new(), Currency::GBP, Utc::now());
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_recurring_falls_back_to_due_date() {
        let due = Utc::now();
        let mut input = rent(dec!(900));
        input.is_recurring = true;
        input.frequency = Some(PaymentFrequency::Monthly);
        input.due_date = Some(due);

        let payment = Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap();
        assert_eq!(payment.next_payment_date, Some(due));
    }

    #[test]
    fn test_patch_recomputes_net_amount() {
        let mut input = rent(dec!(100.00));
        input.fee_amount = Some(dec!(5.00));
        let mut payment = Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap();

        let patch = PaymentPatch {
            amount: Some(dec!(120.00)),
            ..Default::default()
        };
        payment.apply_patch(patch, UserId::new(), Utc::now()).unwrap();

        assert_eq!(payment.net_amount.amount(), dec!(115.00));
    }

    #[test]
    fn test_text_enums_round_trip_through_str() {
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentStatus::PartiallyRefunded).unwrap(),
            "\"partially_refunded\""
        );
        assert!("bogus".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_card_based_methods() {
        assert!(PaymentMethod::Card.is_card_based());
        assert!(PaymentMethod::Stripe.is_card_based());
        assert!(!PaymentMethod::BankTransfer.is_card_based());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn amount_and_fee() -> impl Strategy<Value = (Decimal, Decimal)> {
            (1i64..10_000_000i64)
                .prop_flat_map(|amount| (Just(amount), 0i64..=amount))
                .prop_map(|(amount, fee)| (Decimal::new(amount, 2), Decimal::new(fee, 2)))
        }

        fn settled(amount: Decimal) -> Payment {
            let mut payment =
                Payment::create(rent(amount), UserId::new(), Currency::GBP, Utc::now()).unwrap();
            payment.settle_manually(UserId::new(), Utc::now()).unwrap();
            payment
        }

        proptest! {
            #[test]
            fn prop_net_is_amount_minus_fee((amount, fee) in amount_and_fee()) {
                let mut input = rent(amount);
                input.fee_amount = Some(fee);
                let payment = Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap();
                prop_assert_eq!(payment.net_amount.amount(), amount - fee);
            }

            #[test]
            fn prop_refund_above_amount_rejected(
                (amount, already) in amount_and_fee(),
                excess in 1i64..1_000_000i64,
            ) {
                let mut payment = settled(amount);
                if already > Decimal::ZERO && already < amount {
                    let partial = payment.refund_amount(Some(already)).unwrap();
                    payment.apply_refund(partial, None, Utc::now()).unwrap();
                }
                let requested = amount + Decimal::new(excess, 2);
                prop_assert!(matches!(
                    payment.refund_amount(Some(requested)),
                    Err(PaymentError::Validation(_))
                ));
            }

            #[test]
            fn prop_settled_payments_refuse_edits((amount, _) in amount_and_fee()) {
                let mut payment = settled(amount);
                let patch = PaymentPatch {
                    title: Some("Edited".to_string()),
                    ..Default::default()
                };
                prop_assert!(payment.apply_patch(patch, UserId::new(), Utc::now()).is_err());
            }
        }
    }
}
