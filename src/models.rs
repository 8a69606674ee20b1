//! Shared domain records: catalog (breeds, hatches) and chicken orders.

use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A sellable product line with its own pricing and availability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breed {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub display_order: i32,
    /// Price per chick in minor currency units (øre).
    pub unit_price: i64,
}

/// A scheduled batch of chicks from one breed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hatch {
    pub id: i64,
    pub breed_id: i64,
    /// ISO date string as stored; may be malformed in legacy rows.
    pub hatch_date: String,
    pub initial_count: u32,
    pub active: bool,
}

impl Hatch {
    /// Parse `hatch_date` as `YYYY-MM-DD` or an RFC 3339 timestamp
    /// normalized to its UTC day.
    pub fn parsed_date(&self) -> Result<NaiveDate, String> {
        parse_date(&self.hatch_date)
    }
}

/// Years accepted from user input and stored hatch dates.
pub const DATE_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| format!("Malformed date '{}'", raw))?;
    if !DATE_YEARS.contains(&date.year()) {
        return Err(format!(
            "Malformed date '{}': year must be between {} and {}",
            raw,
            DATE_YEARS.start(),
            DATE_YEARS.end()
        ));
    }
    Ok(date)
}

/// Capacity already taken from a (breed, week) slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub breed_id: i64,
    pub year: i32,
    pub week: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(Self::Placed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChickenOrder {
    pub id: i64,
    /// Public order reference handed to the customer.
    pub reference: String,
    pub breed_id: i64,
    pub year: i32,
    pub week: u32,
    pub quantity: u32,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub status: OrderStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to insert a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub breed_id: i64,
    pub year: i32,
    pub week: u32,
    pub quantity: u32,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
}
