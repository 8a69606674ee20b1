use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::week::IsoWeek;

/// The last ISO week in which orders may still be placed or modified.
///
/// Persisted as the opaque JSON value `{"year": 2026, "week": 46}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffConfig {
    pub year: i32,
    pub week: u32,
}

impl CutoffConfig {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Reject week numbers that can never occur.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=53).contains(&self.week) {
            return Err(format!(
                "Invalid cutoff week {}: must be between 1 and 53",
                self.week
            ));
        }
        Ok(())
    }

    /// Whether ordering is still open on `date`.
    pub fn allows(&self, date: NaiveDate) -> bool {
        is_before_cutoff(self.year, self.week, date)
    }

    pub fn as_week(&self) -> IsoWeek {
        IsoWeek::new(self.year, self.week)
    }
}

/// Returns true while `current_date` falls in or before the cutoff week.
///
/// The year comparison is authoritative; week counts are compared only
/// within the same year. Years with 53 ISO weeks get no special treatment.
pub fn is_before_cutoff(cutoff_year: i32, cutoff_week: u32, current_date: NaiveDate) -> bool {
    let Some(current) = IsoWeek::from_date(current_date) else {
        // Only the ends of the date range; the calendar year decides.
        return current_date.year() < cutoff_year;
    };
    if current.year < cutoff_year {
        true
    } else if current.year > cutoff_year {
        false
    } else {
        current.week <= cutoff_week
    }
}
