//! Test Data Builders
//!
//! Builders for payment inputs and stored payments. Tests set only the
//! fields they care about; everything else takes a sensible default.

use chrono::{DateTime, Utc};
use core_kernel::{Currency, PropertyId, UserId};
use domain_payment::{
    NewPayment, Payment, PaymentFrequency, PaymentMethod, PaymentStatus, PaymentType,
};
use rust_decimal::Decimal;

use crate::fixtures::{IdFixtures, MoneyFixtures, StringFixtures, TemporalFixtures};

/// Builder for payments in a chosen lifecycle state
pub struct TestPaymentBuilder {
    input: NewPayment,
    actor: UserId,
    now: DateTime<Utc>,
    status: PaymentStatus,
    intent_id: Option<String>,
}

impl Default for TestPaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPaymentBuilder {
    /// A pending bank transfer for the standard rent, paid by the fixture tenant
    pub fn new() -> Self {
        let mut input = NewPayment::new(
            StringFixtures::rent_title(),
            PaymentType::Rent,
            PaymentMethod::BankTransfer,
            MoneyFixtures::gbp_rent().amount(),
        );
        input.payer_id = Some(IdFixtures::tenant_id());
        input.recipient_id = Some(IdFixtures::landlord_id());
        input.property_id = Some(IdFixtures::property_id());
        input.due_date = Some(TemporalFixtures::rent_due());

        Self {
            input,
            actor: IdFixtures::agent_id(),
            now: TemporalFixtures::now(),
            status: PaymentStatus::Pending,
            intent_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.input.title = title.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.input.amount = amount;
        self
    }

    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.input.fee_amount = Some(fee);
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.input.currency = Some(currency);
        self
    }

    pub fn with_type(mut self, payment_type: PaymentType) -> Self {
        self.input.payment_type = payment_type;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.input.method = method;
        self
    }

    pub fn with_payer(mut self, payer: UserId) -> Self {
        self.input.payer_id = Some(payer);
        self
    }

    pub fn with_property(mut self, property: Option<PropertyId>) -> Self {
        self.input.property_id = property;
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.input.due_date = Some(due);
        self
    }

    /// Makes the payment the anchor of a recurring series starting at `next`
    pub fn recurring(mut self, frequency: PaymentFrequency, next: DateTime<Utc>) -> Self {
        self.input.is_recurring = true;
        self.input.frequency = Some(frequency);
        self.input.next_payment_date = Some(next);
        self
    }

    pub fn with_remaining_payments(mut self, remaining: u32) -> Self {
        self.input.remaining_payments = Some(remaining);
        self
    }

    pub fn with_recurring_end(mut self, end: DateTime<Utc>) -> Self {
        self.input.recurring_end_date = Some(end);
        self
    }

    pub fn created_by(mut self, actor: UserId) -> Self {
        self.actor = actor;
        self
    }

    pub fn created_at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Drives the payment into `status` when built
    ///
    /// Supported targets: pending, processing, completed, failed and
    /// cancelled. Processing and cancelled attach a gateway intent.
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    /// The raw creation input
    pub fn input(self) -> NewPayment {
        self.input
    }

    /// Builds a stored payment in the requested state
    ///
    /// # Panics
    ///
    /// Panics if the input is invalid or the requested status cannot be
    /// reached from pending.
    pub fn build(self) -> Payment {
        let mut payment = Payment::create(self.input, self.actor, Currency::GBP, self.now)
            .expect("valid payment input");
        let intent_id = self
            .intent_id
            .unwrap_or_else(|| format!("pi_test_{}", payment.id.as_uuid().simple()));

        match self.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Processing => {
                payment
                    .attach_intent(intent_id, Some("secret_test".to_string()), self.now)
                    .expect("pending payment accepts an intent");
            }
            PaymentStatus::Completed => {
                payment
                    .settle_manually(self.actor, self.now)
                    .expect("pending payment settles");
            }
            PaymentStatus::Failed => {
                payment
                    .mark_failed("Card declined", self.now)
                    .expect("pending payment fails");
            }
            PaymentStatus::Cancelled => {
                payment
                    .attach_intent(intent_id, None, self.now)
                    .expect("pending payment accepts an intent");
                payment
                    .cancel(Some("Cancelled by payer"), self.now)
                    .expect("processing payment cancels");
            }
            other => panic!("TestPaymentBuilder cannot build a {} payment directly", other),
        }
        payment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_builder() {
        let payment = TestPaymentBuilder::new().build();

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount.amount(), dec!(950.00));
        assert_eq!(payment.payer_id, IdFixtures::tenant_id());
        assert_eq!(payment.created_by, IdFixtures::agent_id());
    }

    #[test]
    fn test_builder_reaches_completed() {
        let payment = TestPaymentBuilder::new()
            .with_fee(dec!(10.00))
            .with_status(PaymentStatus::Completed)
            .build();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.is_manual);
        assert_eq!(payment.net_amount.amount(), dec!(940.00));
    }

    #[test]
    fn test_builder_processing_has_intent() {
        let payment = TestPaymentBuilder::new()
            .with_method(PaymentMethod::Card)
            .with_intent("pi_123")
            .with_status(PaymentStatus::Processing)
            .build();

        assert_eq!(payment.gateway_intent_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn test_recurring_builder() {
        let payment = TestPaymentBuilder::new()
            .recurring(PaymentFrequency::Monthly, TemporalFixtures::month_end())
            .with_remaining_payments(3)
            .build();

        assert!(payment.is_recurring);
        assert_eq!(payment.frequency, Some(PaymentFrequency::Monthly));
        assert_eq!(payment.remaining_payments, Some(3));
    }
}
