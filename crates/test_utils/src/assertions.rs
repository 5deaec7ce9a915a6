//! Custom Test Assertions
//!
//! Assertion helpers for payment invariants that give more useful failure
//! messages than bare `assert!`.

use core_kernel::Money;
use domain_payment::{Page, Payment, PaymentStatus, RefundStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are equal in amount and currency
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Amount mismatch: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

pub fn assert_status(payment: &Payment, expected: PaymentStatus) {
    assert_eq!(
        payment.status, expected,
        "Payment {} has status {}, expected {}",
        payment.reference, payment.status, expected
    );
}

/// Asserts `net_amount == amount - fee_amount` and that every money field
/// shares the payment currency
pub fn assert_net_consistent(payment: &Payment) {
    for (field, money) in [
        ("amount", &payment.amount),
        ("fee_amount", &payment.fee_amount),
        ("net_amount", &payment.net_amount),
        ("refunded_amount", &payment.refunded_amount),
    ] {
        assert_eq!(
            money.currency(),
            payment.currency,
            "{} is in {} but the payment is in {}",
            field,
            money.currency(),
            payment.currency
        );
    }
    assert_eq!(
        payment.net_amount.amount(),
        payment.amount.amount() - payment.fee_amount.amount(),
        "net amount {} != amount {} - fee {}",
        payment.net_amount,
        payment.amount,
        payment.fee_amount
    );
}

/// Asserts the refund bookkeeping agrees with the status
pub fn assert_refund_state(payment: &Payment, refunded: Decimal) {
    assert_eq!(payment.refunded_amount.amount(), refunded, "refunded amount");
    let (status, refund_status) = if refunded >= payment.amount.amount() {
        (PaymentStatus::Refunded, RefundStatus::FullRefund)
    } else {
        (PaymentStatus::PartiallyRefunded, RefundStatus::PartialRefund)
    };
    assert_status(payment, status);
    assert_eq!(payment.refund_status, refund_status, "refund status");
    assert!(payment.refunded_at.is_some(), "refunded_at should be set");
}

/// Asserts page metadata is internally consistent
pub fn assert_page_consistent<T>(page: &Page<T>) {
    assert!(page.limit > 0, "page limit must be positive");
    assert!(
        page.data.len() <= page.limit as usize,
        "page holds {} rows but limit is {}",
        page.data.len(),
        page.limit
    );
    let expected_pages = page.total.div_ceil(u64::from(page.limit)) as u32;
    assert_eq!(page.total_pages, expected_pages, "total_pages");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::TestPaymentBuilder;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_eq_passes() {
        assert_money_eq(
            &Money::new(dec!(10.00), Currency::GBP),
            &Money::new(dec!(10.00), Currency::GBP),
        );
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_assert_money_eq_currency_mismatch() {
        assert_money_eq(
            &Money::new(dec!(10.00), Currency::GBP),
            &Money::new(dec!(10.00), Currency::EUR),
        );
    }

    #[test]
    fn test_net_consistent_for_built_payment() {
        let payment = TestPaymentBuilder::new().with_fee(dec!(25.00)).build();
        assert_net_consistent(&payment);
        assert_money_zero(&payment.refunded_amount);
    }

    #[test]
    #[should_panic(expected = "has status")]
    fn test_assert_status_mismatch() {
        let payment = TestPaymentBuilder::new().build();
        assert_status(&payment, PaymentStatus::Completed);
    }
}
