//! Property-Based Test Generators
//!
//! Proptest strategies for payment data that respects domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{Currency, Money};
use domain_payment::{NewPayment, PaymentFrequency, PaymentMethod, PaymentType};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating supported Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    proptest::sample::select(Currency::ALL.to_vec())
}

/// Strategy for positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive two-decimal amounts
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    positive_amount_minor_strategy().prop_map(|minor| Decimal::new(minor, 2))
}

/// Strategy for an amount and a fee no larger than it
pub fn amount_and_fee_strategy() -> impl Strategy<Value = (Decimal, Decimal)> {
    positive_amount_minor_strategy()
        .prop_flat_map(|amount| (Just(amount), 0i64..=amount))
        .prop_map(|(amount, fee)| (Decimal::new(amount, 2), Decimal::new(fee, 2)))
}

/// Strategy for positive Money values in any supported currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

pub fn payment_type_strategy() -> impl Strategy<Value = PaymentType> {
    proptest::sample::select(PaymentType::ALL.to_vec())
}

pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    proptest::sample::select(PaymentMethod::ALL.to_vec())
}

/// Methods settled without the card gateway
pub fn manual_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    payment_method_strategy().prop_filter("manual method", |m| !m.is_card_based())
}

/// Frequencies that actually repeat
pub fn repeating_frequency_strategy() -> impl Strategy<Value = PaymentFrequency> {
    proptest::sample::select(PaymentFrequency::ALL.to_vec())
        .prop_filter("repeating", |f| *f != PaymentFrequency::OneTime)
}

/// Strategy for timestamps between 2020 and 2030
pub fn datetime_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..3653i64, 0i64..86_400i64).prop_map(|(days, secs)| {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
            + Duration::days(days)
            + Duration::seconds(secs)
    })
}

/// Strategy for valid one-off payment input
pub fn new_payment_strategy() -> impl Strategy<Value = NewPayment> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,40}",
        payment_type_strategy(),
        payment_method_strategy(),
        amount_and_fee_strategy(),
    )
        .prop_map(|(title, payment_type, method, (amount, fee))| {
            let mut input = NewPayment::new(title, payment_type, method, amount);
            input.fee_amount = Some(fee);
            input
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_fee_never_exceeds_amount((amount, fee) in amount_and_fee_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(fee >= Decimal::ZERO);
            prop_assert!(fee <= amount);
        }

        #[test]
        fn prop_manual_methods_skip_gateway(method in manual_method_strategy()) {
            prop_assert!(!method.is_card_based());
        }

        #[test]
        fn prop_repeating_frequency(frequency in repeating_frequency_strategy()) {
            prop_assert_ne!(frequency, PaymentFrequency::OneTime);
        }
    }
}
