//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for payments. Values are fixed so assertions stay
//! predictable across runs.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{Currency, Money, PaymentId, PropertyId, UserId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Standard monthly rent
    pub fn gbp_rent() -> Money {
        Money::new(dec!(950.00), Currency::GBP)
    }

    /// Tenancy deposit, five weeks of rent
    pub fn gbp_deposit() -> Money {
        Money::new(dec!(1096.15), Currency::GBP)
    }

    pub fn gbp_zero() -> Money {
        Money::zero(Currency::GBP)
    }

    /// Booking amount in a second currency
    pub fn eur_booking() -> Money {
        Money::new(dec!(420.00), Currency::EUR)
    }

    /// Zero decimal places
    pub fn jpy_10000() -> Money {
        Money::new(dec!(10000), Currency::JPY)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Reference "now" for deterministic tests (15 Mar 2024, 09:00 UTC)
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    /// First rent due date of a monthly series
    pub fn rent_due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
    }

    /// Month-end anchor for clamping tests
    pub fn month_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
    }

    /// End of a twelve month tenancy
    pub fn tenancy_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn payment_id() -> PaymentId {
        PaymentId::from_uuid(Uuid::parse_str("018e4a5c-0000-7000-8000-000000000001").unwrap())
    }

    /// Staff member acting on payments
    pub fn agent_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("018e4a5c-0000-7000-8000-000000000002").unwrap())
    }

    pub fn tenant_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("018e4a5c-0000-7000-8000-000000000003").unwrap())
    }

    pub fn landlord_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("018e4a5c-0000-7000-8000-000000000004").unwrap())
    }

    pub fn property_id() -> PropertyId {
        PropertyId::from_uuid(Uuid::parse_str("018e4a5c-0000-7000-8000-000000000005").unwrap())
    }
}

/// Fixture for decimal test data
pub struct DecimalFixtures;

impl DecimalFixtures {
    /// Card processing fee on the standard rent
    pub fn card_fee() -> Decimal {
        dec!(14.25)
    }

    /// Partial refund amount
    pub fn partial_refund() -> Decimal {
        dec!(100.00)
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn rent_title() -> &'static str {
        "April rent"
    }

    pub fn property_title() -> &'static str {
        "Flat 2, 14 Harbour Street"
    }

    pub fn billing_email() -> &'static str {
        "tenant@example.com"
    }

    pub fn refund_reason() -> &'static str {
        "Boiler outage for five days"
    }
}
