//! Projection of breeds and hatches into orderable weekly slots.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::week::IsoWeek;
use crate::errors::CalendarError;
use crate::models::{Allocation, Breed, Hatch};

/// Number of weeks the storefront projects by default.
pub const DEFAULT_HORIZON_WEEKS: u32 = 16;

/// One purchasable week for one breed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSlot {
    pub year: i32,
    pub week: u32,
    pub delivery_date: NaiveDate,
    pub available: u32,
    /// At least one hatch falls in this week, even if it is sold out.
    pub scheduled: bool,
}

impl WeekSlot {
    pub fn iso_week(&self) -> IsoWeek {
        IsoWeek::new(self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedAvailability {
    pub breed_id: i64,
    pub slug: String,
    pub name: String,
    pub slots: Vec<WeekSlot>,
}

/// A hatch that was left out of the projection because of bad data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWarning {
    pub hatch_id: i64,
    pub breed_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub reference_date: NaiveDate,
    pub horizon_weeks: u32,
    pub breeds: Vec<BreedAvailability>,
    pub warnings: Vec<DataWarning>,
}

impl Calendar {
    pub fn breed(&self, breed_id: i64) -> Option<&BreedAvailability> {
        self.breeds.iter().find(|b| b.breed_id == breed_id)
    }

    pub fn slot(&self, breed_id: i64, week: IsoWeek) -> Option<&WeekSlot> {
        self.breed(breed_id)?
            .slots
            .iter()
            .find(|s| s.iso_week() == week)
    }

    /// First and last week covered by the horizon.
    pub fn span(&self) -> Option<(IsoWeek, IsoWeek)> {
        let slots = &self.breeds.first()?.slots;
        Some((slots.first()?.iso_week(), slots.last()?.iso_week()))
    }
}

#[derive(Default)]
struct SlotTotals {
    count: u64,
    earliest: Option<NaiveDate>,
}

/// Builds a [`Calendar`] from read-only snapshots of catalog data.
///
/// The reference date stands in for "now", so the same inputs always
/// produce the same calendar.
pub struct CalendarBuilder<'a> {
    reference_date: NaiveDate,
    horizon_weeks: u32,
    allocations: &'a [Allocation],
}

impl<'a> CalendarBuilder<'a> {
    pub fn new(reference_date: NaiveDate, horizon_weeks: u32) -> Self {
        Self {
            reference_date,
            horizon_weeks,
            allocations: &[],
        }
    }

    /// Subtract already ordered quantities from the matching slots.
    pub fn with_allocations(mut self, allocations: &'a [Allocation]) -> Self {
        self.allocations = allocations;
        self
    }

    pub fn build(&self, breeds: &[Breed], hatches: &[Hatch]) -> Result<Calendar, CalendarError> {
        if self.horizon_weeks == 0 {
            return Err(CalendarError::InvalidHorizon {
                horizon: self.horizon_weeks,
            });
        }

        let weeks = self.horizon().ok_or(CalendarError::DateOutOfRange {
            date: self.reference_date,
        })?;
        let active: HashSet<i64> = breeds.iter().filter(|b| b.active).map(|b| b.id).collect();

        let mut warnings = Vec::new();
        let mut totals: HashMap<(i64, IsoWeek), SlotTotals> = HashMap::new();
        for hatch in hatches {
            if !hatch.active || !active.contains(&hatch.breed_id) {
                continue;
            }
            let parsed = hatch.parsed_date().and_then(|date| {
                IsoWeek::from_date(date)
                    .map(|week| (date, week))
                    .ok_or_else(|| format!("Hatch date {} has no ISO week", date))
            });
            let (date, week) = match parsed {
                Ok(found) => found,
                Err(message) => {
                    warn!(
                        hatch_id = hatch.id,
                        breed_id = hatch.breed_id,
                        "Skipping hatch: {}",
                        message
                    );
                    warnings.push(DataWarning {
                        hatch_id: hatch.id,
                        breed_id: hatch.breed_id,
                        message,
                    });
                    continue;
                }
            };
            let entry = totals.entry((hatch.breed_id, week)).or_default();
            entry.count += u64::from(hatch.initial_count);
            entry.earliest = Some(entry.earliest.map_or(date, |d| d.min(date)));
        }

        let mut allocated: HashMap<(i64, IsoWeek), u64> = HashMap::new();
        for a in self.allocations {
            *allocated
                .entry((a.breed_id, IsoWeek::new(a.year, a.week)))
                .or_default() += u64::from(a.quantity);
        }

        let breeds: Vec<BreedAvailability> = breeds
            .iter()
            .filter(|b| b.active)
            .map(|breed| {
                let slots = weeks
                    .iter()
                    .map(|&(week, monday)| {
                        let key = (breed.id, week);
                        let slot = totals.get(&key);
                        let taken = allocated.get(&key).copied().unwrap_or(0);
                        let remaining = slot.map_or(0, |s| s.count).saturating_sub(taken);
                        WeekSlot {
                            year: week.year,
                            week: week.week,
                            delivery_date: slot.and_then(|s| s.earliest).unwrap_or(monday),
                            available: u32::try_from(remaining).unwrap_or(u32::MAX),
                            scheduled: slot.is_some(),
                        }
                    })
                    .collect();
                BreedAvailability {
                    breed_id: breed.id,
                    slug: breed.slug.clone(),
                    name: breed.name.clone(),
                    slots,
                }
            })
            .collect();

        debug!(
            breeds = breeds.len(),
            horizon = self.horizon_weeks,
            skipped = warnings.len(),
            "Built availability calendar"
        );

        Ok(Calendar {
            reference_date: self.reference_date,
            horizon_weeks: self.horizon_weeks,
            breeds,
            warnings,
        })
    }

    /// Consecutive weeks starting with the reference week, paired with
    /// their Mondays. `None` when the horizon leaves chrono's date range.
    fn horizon(&self) -> Option<Vec<(IsoWeek, NaiveDate)>> {
        let back = i64::from(self.reference_date.weekday().num_days_from_monday());
        let first_monday = self.reference_date.checked_sub_signed(Duration::days(back))?;
        // Reject up front rather than after filling most of the vector.
        let last_offset = Duration::try_weeks(i64::from(self.horizon_weeks - 1))?;
        let last_monday = first_monday.checked_add_signed(last_offset)?;
        IsoWeek::from_date(last_monday)?;

        (0..self.horizon_weeks)
            .map(|i| {
                let monday = first_monday.checked_add_signed(Duration::weeks(i64::from(i)))?;
                Some((IsoWeek::from_date(monday)?, monday))
            })
            .collect()
    }
}

/// Build the availability calendar for `horizon_weeks` weeks starting
/// with the week of `reference_date`.
pub fn build_availability_calendar(
    breeds: &[Breed],
    hatches: &[Hatch],
    horizon_weeks: u32,
    reference_date: NaiveDate,
) -> Result<Calendar, CalendarError> {
    CalendarBuilder::new(reference_date, horizon_weeks).build(breeds, hatches)
}
