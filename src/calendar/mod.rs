//! Hatch availability core.
//!
//! Pure, synchronous date arithmetic with no I/O:
//!
//! | Module    | Responsibility                                         |
//! |-----------|--------------------------------------------------------|
//! | `week`    | ISO-8601 `(year, week)` from a calendar date           |
//! | `cutoff`  | Whether ordering is still open for a given date        |
//! | `builder` | Breeds + hatches → per-breed weekly slots for N weeks  |
//!
//! Callers fetch breeds, hatches and allocations from the store and pass
//! an explicit reference date; nothing in here reads the wall clock.

pub mod builder;
pub mod cutoff;
pub mod week;

pub use builder::{
    BreedAvailability, Calendar, CalendarBuilder, DEFAULT_HORIZON_WEEKS, DataWarning, WeekSlot,
    build_availability_calendar,
};
pub use cutoff::{CutoffConfig, is_before_cutoff};
pub use week::{IsoWeek, iso_week};
