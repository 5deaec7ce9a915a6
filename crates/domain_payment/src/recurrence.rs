//! Recurring series scheduling
//!
//! A recurring payment is the anchor of its series. Each batch run spawns one
//! pending successor per due anchor and moves the anchor's
//! `next_payment_date` forward by one cycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{add_months_clamped, PaymentId};

use crate::error::{PaymentError, PaymentResult};
use crate::payment::{Payment, PaymentFrequency};

impl PaymentFrequency {
    /// Advances a date by one cycle
    ///
    /// Month-based cycles clamp to the end of the target month
    /// (2024-01-31 + 1 month = 2024-02-29). `OneTime` does not move.
    pub fn advance(&self, from: DateTime<Utc>) -> PaymentResult<DateTime<Utc>> {
        let next = match self {
            PaymentFrequency::OneTime => from,
            PaymentFrequency::Weekly => from + Duration::days(7),
            PaymentFrequency::Fortnightly => from + Duration::days(14),
            PaymentFrequency::Monthly => add_months_clamped(from, 1)?,
            PaymentFrequency::Quarterly => add_months_clamped(from, 3)?,
            PaymentFrequency::Annually => add_months_clamped(from, 12)?,
        };
        Ok(next)
    }
}

/// The outcome of one billing cycle for a series anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePlan {
    /// Due date of the spawned successor
    pub due_date: DateTime<Utc>,
    /// Anchor's next payment date after this cycle
    pub next_payment_date: DateTime<Utc>,
    pub remaining_payments: Option<u32>,
    /// False once the series is exhausted
    pub keeps_recurring: bool,
}

/// Works out the next cycle for a due anchor
///
/// # Errors
///
/// `PaymentError::Validation` when the anchor has no next payment date.
pub fn plan_next_cycle(anchor: &Payment) -> PaymentResult<CyclePlan> {
    let current = anchor.next_payment_date.ok_or_else(|| {
        PaymentError::validation(format!("payment {} has no next payment date", anchor.id))
    })?;
    let frequency = anchor.frequency.unwrap_or(PaymentFrequency::OneTime);
    let next = frequency.advance(current)?;

    let remaining_payments = anchor.remaining_payments.map(|n| n.saturating_sub(1));
    let mut keeps_recurring = frequency != PaymentFrequency::OneTime;
    if remaining_payments == Some(0) {
        keeps_recurring = false;
    }
    if let Some(end) = anchor.recurring_end_date {
        if next > end {
            keeps_recurring = false;
        }
    }

    Ok(CyclePlan {
        due_date: next,
        next_payment_date: next,
        remaining_payments,
        keeps_recurring,
    })
}

/// Summary of one recurring batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringRunReport {
    /// Due anchors found in the window
    pub examined: usize,
    /// Successors created
    pub created: Vec<PaymentId>,
    /// Anchors whose cycle failed and was skipped
    pub failed: Vec<PaymentId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Currency, UserId};
    use rust_decimal_macros::dec;

    use crate::payment::{NewPayment, PaymentMethod, PaymentType};

    fn anchor(frequency: PaymentFrequency, next: DateTime<Utc>) -> Payment {
        let mut input = NewPayment::new("Rent", PaymentType::Rent, PaymentMethod::DirectDebit, dec!(950));
        input.is_recurring = true;
        input.frequency = Some(frequency);
        input.next_payment_date = Some(next);
        Payment::create(input, UserId::new(), Currency::GBP, Utc::now()).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_from_month_end_clamps() {
        let plan = plan_next_cycle(&anchor(PaymentFrequency::Monthly, utc(2024, 1, 31))).unwrap();
        assert_eq!(plan.due_date, utc(2024, 2, 29));
        assert_eq!(plan.next_payment_date, utc(2024, 2, 29));
        assert!(plan.keeps_recurring);
    }

    #[test]
    fn test_fixed_day_frequencies() {
        let start = utc(2024, 3, 1);
        assert_eq!(PaymentFrequency::Weekly.advance(start).unwrap(), utc(2024, 3, 8));
        assert_eq!(PaymentFrequency::Fortnightly.advance(start).unwrap(), utc(2024, 3, 15));
        assert_eq!(PaymentFrequency::Quarterly.advance(start).unwrap(), utc(2024, 6, 1));
        assert_eq!(PaymentFrequency::Annually.advance(utc(2024, 2, 29)).unwrap(), utc(2025, 2, 28));
    }

    #[test]
    fn test_last_remaining_payment_ends_series() {
        let mut payment = anchor(PaymentFrequency::Weekly, utc(2024, 3, 1));
        payment.remaining_payments = Some(1);

        let plan = plan_next_cycle(&payment).unwrap();
        assert_eq!(plan.remaining_payments, Some(0));
        assert!(!plan.keeps_recurring);
    }

    #[test]
    fn test_end_date_ends_series() {
        let mut payment = anchor(PaymentFrequency::Monthly, utc(2024, 3, 1));
        payment.recurring_end_date = Some(utc(2024, 3, 20));

        let plan = plan_next_cycle(&payment).unwrap();
        assert!(!plan.keeps_recurring);
    }

    #[test]
    fn test_one_time_does_not_move() {
        let mut payment = anchor(PaymentFrequency::Monthly, utc(2024, 3, 1));
        payment.frequency = Some(PaymentFrequency::OneTime);

        let plan = plan_next_cycle(&payment).unwrap();
        assert_eq!(plan.next_payment_date, utc(2024, 3, 1));
        assert!(!plan.keeps_recurring);
    }
}
