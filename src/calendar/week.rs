use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An ISO-8601 week: weeks run Monday to Sunday and belong to the year
/// that contains their Thursday.
///
/// Ordering is lexicographic on `(year, week)`, which is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Compute the ISO week containing `date`.
    ///
    /// The date is moved to the Thursday of its Monday-based week. That
    /// Thursday decides the week-year, and its day-of-year decides the
    /// week number. Without this shift, dates around New Year land in the
    /// wrong year.
    ///
    /// `None` only at the very ends of chrono's range, where that Thursday
    /// is not representable.
    pub fn from_date(date: NaiveDate) -> Option<Self> {
        let offset = 3 - i64::from(date.weekday().num_days_from_monday());
        let thursday = date.checked_add_signed(Duration::days(offset))?;
        let days_since_jan1 = thursday.ordinal0();
        Some(Self {
            year: thursday.year(),
            week: (days_since_jan1 + 1).div_ceil(7),
        })
    }

    /// Same as [`IsoWeek::from_date`] after normalizing to the UTC day.
    pub fn from_datetime(at: DateTime<Utc>) -> Option<Self> {
        Self::from_date(at.date_naive())
    }

    /// First day (Monday) of this week, or `None` when the week does not
    /// exist in its year (e.g. week 53 of a 52-week year).
    pub fn monday(self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, chrono::Weekday::Mon)
    }

    /// The week that follows this one, rolling over into the next year.
    pub fn next(self) -> Self {
        self.monday()
            .and_then(|monday| monday.checked_add_signed(Duration::weeks(1)))
            .and_then(Self::from_date)
            .unwrap_or(Self::new(self.year.saturating_add(1), 1))
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Convenience wrapper returning the `(year, week)` pair for a date.
pub fn iso_week(date: NaiveDate) -> Option<(i32, u32)> {
    IsoWeek::from_date(date).map(|w| (w.year, w.week))
}
