//! Common domain types used across ECP
//!
//! The central type here is [`TargetPeriod`]: one (year, month) unit of
//! processing. A period is validated on construction and immutable after,
//! and every derived name (source file name, period label, month date) is
//! computed from it in exactly one place.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EcpError;

/// Default lower bound for supported processing years.
///
/// The portal publishes monthly extracts starting in 2020; anything earlier
/// cannot exist and is rejected up front.
pub const DEFAULT_MIN_YEAR: i32 = 2020;

/// One (year, month) processing unit.
///
/// Invariants: `month` is 1-12 and `year` lies within the supported range
/// checked at construction. Use [`TargetPeriod::new`] for the default range
/// or [`TargetPeriod::with_min_year`] when the lower bound is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPeriod {
    year: i32,
    month: u32,
}

impl TargetPeriod {
    /// Create a period validated against the default year range
    /// ([`DEFAULT_MIN_YEAR`] through the current UTC year).
    pub fn new(year: i32, month: u32) -> Result<Self, EcpError> {
        Self::with_min_year(year, month, DEFAULT_MIN_YEAR)
    }

    /// Create a period with a configured lower year bound.
    ///
    /// The upper bound is always the current UTC year: the portal cannot
    /// have published a file for a month that has not started yet.
    pub fn with_min_year(year: i32, month: u32, min_year: i32) -> Result<Self, EcpError> {
        let max_year = Utc::now().year();

        if !(1..=12).contains(&month) {
            return Err(EcpError::InvalidPeriod(format!(
                "month must be 1-12, got {}",
                month
            )));
        }

        if year < min_year || year > max_year {
            return Err(EcpError::InvalidPeriod(format!(
                "year must be {}-{}, got {}",
                min_year, max_year, year
            )));
        }

        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Canonical period label, e.g. `2024-07`.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// Canonical source file name, e.g. `2024-07.csv`.
    pub fn file_name(&self) -> String {
        format!("{}-{:02}.csv", self.year, self.month)
    }

    /// First day of the period's month.
    pub fn month_start(&self) -> NaiveDate {
        // Safe: month is validated to 1-12 and day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("validated period")
    }

    /// First day of the period's month at midnight UTC.
    pub fn month_start_utc(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.month_start().and_hms_opt(0, 0, 0).expect("midnight"))
    }
}

impl std::fmt::Display for TargetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// First day of the month immediately before `month`.
///
/// `month` is expected to already be normalized to the first of a month.
pub fn previous_month(month: NaiveDate) -> NaiveDate {
    let (year, mon) = if month.month() == 1 {
        (month.year() - 1, 12)
    } else {
        (month.year(), month.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, mon, 1).expect("valid month")
}

/// First day of the month immediately after `month`.
pub fn next_month(month: NaiveDate) -> NaiveDate {
    let (year, mon) = if month.month() == 12 {
        (month.year() + 1, 1)
    } else {
        (month.year(), month.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, mon, 1).expect("valid month")
}

/// First day of the current UTC calendar month.
pub fn current_month() -> NaiveDate {
    let now = Utc::now();
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1).expect("current month")
}
