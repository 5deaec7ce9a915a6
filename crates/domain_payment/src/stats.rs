//! Dashboard statistics
//!
//! Aggregates are read fresh from the repository on every call. Amounts are
//! summed numerically across currencies and labelled with the configured
//! default currency.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use core_kernel::Currency;

use crate::payment::{PaymentMethod, PaymentStatus, PaymentType, RecentPayment};
use crate::ports::{AmountSummary, BreakdownRow, PropertyTotal};

/// A count with its summed amount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountAmount {
    pub count: u64,
    pub amount: Decimal,
}

impl CountAmount {
    pub fn new(count: u64, amount: Decimal) -> Self {
        Self { count, amount }
    }
}

/// One bucket of a breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry<K> {
    pub key: K,
    pub count: u64,
    pub amount: Decimal,
}

/// Totals for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub total_count: u64,
    pub total_amount: Decimal,
    pub completed_count: u64,
    pub completed_amount: Decimal,
}

impl MonthlyTrend {
    pub fn from_summary(month: String, summary: &AmountSummary) -> Self {
        Self {
            month,
            total_count: summary.count,
            total_amount: summary.amount,
            completed_count: summary.completed_count,
            completed_amount: summary.completed_amount,
        }
    }
}

/// Everything the payments dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: CountAmount,
    pub pending: CountAmount,
    pub completed: CountAmount,
    pub failed: CountAmount,
    /// Fully and partially refunded payments; amount is the refunded sum
    pub refunded: CountAmount,
    /// Mean payment amount, rounded to a whole unit
    pub average_amount: Decimal,
    pub by_type: Vec<BreakdownEntry<PaymentType>>,
    pub by_method: Vec<BreakdownEntry<PaymentMethod>>,
    pub by_status: Vec<BreakdownEntry<PaymentStatus>>,
    /// Oldest month first
    pub monthly_trend: Vec<MonthlyTrend>,
    pub top_properties: Vec<PropertyTotal>,
    pub recent: Vec<RecentPayment>,
    pub currency: Currency,
    pub generated_at: DateTime<Utc>,
}

/// Mean of `total / count`, rounded half away from zero to a whole unit
///
/// Zero when there are no payments.
pub fn average_amount(total: &CountAmount) -> Decimal {
    if total.count == 0 {
        return Decimal::ZERO;
    }
    (total.amount / Decimal::from(total.count))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Expands grouped rows to one entry per member of `all`
///
/// Members with no rows get zero totals, so the dashboard shape is stable.
/// Rows whose key is not a member are dropped.
pub fn zero_filled<K>(all: &[K], rows: &[BreakdownRow], key: impl Fn(&K) -> &'static str) -> Vec<BreakdownEntry<K>>
where
    K: Copy,
{
    all.iter()
        .map(|member| {
            let (count, amount) = rows
                .iter()
                .filter(|row| row.key == key(member))
                .fold((0u64, Decimal::ZERO), |(c, a), row| (c + row.count, a + row.amount));
            BreakdownEntry {
                key: *member,
                count,
                amount,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_average_rounds_half_away_from_zero() {
        assert_eq!(average_amount(&CountAmount::new(2, dec!(101))), dec!(51));
        assert_eq!(average_amount(&CountAmount::new(3, dec!(100))), dec!(33));
        assert_eq!(average_amount(&CountAmount::new(0, dec!(0))), dec!(0));
    }

    #[test]
    fn test_zero_filled_covers_every_member() {
        let rows = vec![BreakdownRow {
            key: "rent".to_string(),
            count: 2,
            amount: dec!(1900),
        }];
        let entries = zero_filled(PaymentType::ALL, &rows, PaymentType::as_str);

        assert_eq!(entries.len(), PaymentType::ALL.len());
        let rent = entries.iter().find(|e| e.key == PaymentType::Rent).unwrap();
        assert_eq!(rent.count, 2);
        assert_eq!(rent.amount, dec!(1900));
        let deposit = entries.iter().find(|e| e.key == PaymentType::Deposit).unwrap();
        assert_eq!(deposit.count, 0);
        assert_eq!(deposit.amount, Decimal::ZERO);
    }
}
