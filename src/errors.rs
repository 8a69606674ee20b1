//! Typed error hierarchy for the storefront back end.
//!
//! Four top-level enums cover the subsystems:
//! - `CalendarError` - caller contract violations in the availability core
//! - `StorefrontError` - store, order and cutoff failures behind the API
//! - `CodeValidationError` - remote rebate/referral code validation
//! - `SessionError` - admin login and token verification

use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::IsoWeek;

/// Errors from the availability calendar core.
///
/// Bad data (e.g. a malformed hatch date) is never an error here; it is
/// skipped and reported as a warning on the calendar instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid horizon {horizon}: must be at least one week")]
    InvalidHorizon { horizon: u32 },

    #[error("Date {date} is too close to the end of the supported date range")]
    DateOutOfRange { date: NaiveDate },
}

/// Errors from the storefront service layer.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Breed '{slug}' not found")]
    BreedNotFound { slug: String },

    #[error("Order {reference} not found")]
    OrderNotFound { reference: String },

    #[error("Ordering closed: cutoff was {cutoff}, current week is {current}")]
    CutoffPassed { cutoff: IsoWeek, current: IsoWeek },

    #[error("Week {week} is outside the orderable horizon")]
    WeekOutsideHorizon { week: IsoWeek },

    #[error("Only {available} available for {breed} in {week}, requested {requested}")]
    InsufficientAvailability {
        breed: String,
        week: IsoWeek,
        available: u32,
        requested: u32,
    },

    #[error("Order {reference} is cancelled")]
    OrderCancelled { reference: String },

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the remote code validation procedure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodeValidationError {
    /// The remote procedure answered and rejected the code.
    #[error("Invalid code: {reason}")]
    InvalidCode { reason: String },

    /// The remote procedure could not be reached or answered garbage.
    #[error("Code validation unavailable: {0}")]
    Transient(String),
}

impl CodeValidationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from session issuance and verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}
