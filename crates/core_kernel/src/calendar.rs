//! Calendar arithmetic for billing cycles and monthly reporting
//!
//! Month arithmetic clamps to the last valid day of the target month, so a
//! cycle anchored on the 31st lands on Feb 29 in a leap year and Feb 28
//! otherwise. Callers that chain cycles should always advance from the
//! previous result, which means an anchor drifts to the clamped day once a
//! short month has been crossed.

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Adds calendar months, clamping the day-of-month to the target month's end
pub fn add_months_clamped(at: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, CoreError> {
    at.checked_add_months(Months::new(months))
        .ok_or_else(|| CoreError::calendar(format!("cannot add {} months to {}", months, at)))
}

/// Midnight UTC on the first day of the month containing `at`
pub fn month_start(at: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| CoreError::calendar(format!("no month start for {}", at)))
}

/// A half-open `[start, end)` calendar month window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    /// `YYYY-MM` label used in reports
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// The `count` calendar months ending with the month containing `now`,
/// oldest first
pub fn trailing_months(now: DateTime<Utc>, count: u32) -> Result<Vec<MonthWindow>, CoreError> {
    let current = month_start(now)?;
    let mut windows = Vec::with_capacity(count as usize);

    for back in (0..count).rev() {
        let start = current
            .checked_sub_months(Months::new(back))
            .ok_or_else(|| CoreError::calendar(format!("cannot step back {} months", back)))?;
        let end = add_months_clamped(start, 1)?;
        windows.push(MonthWindow {
            year: start.year(),
            month: start.month(),
            start,
            end,
        });
    }

    Ok(windows)
}
