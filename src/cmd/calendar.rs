//! Calendar and week printing - `farmgate calendar`, `farmgate week`.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use farmgate::calendar::{Calendar, IsoWeek};
use farmgate::config::AppConfig;
use farmgate::models::parse_date;
use farmgate::storefront::server::open_store;
use farmgate::storefront::service::calendar_snapshot;

fn date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(raw) => parse_date(raw).map_err(anyhow::Error::msg),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}

pub fn cmd_calendar(
    config: &AppConfig,
    weeks: Option<u32>,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let weeks = weeks.unwrap_or(config.calendar.horizon_weeks);
    if weeks > config.calendar.max_horizon_weeks {
        bail!(
            "Horizon {} exceeds the maximum of {} weeks",
            weeks,
            config.calendar.max_horizon_weeks
        );
    }
    let reference = date_or_today(date)?;
    let db = open_store(config)?;
    let calendar = calendar_snapshot(&db, reference, weeks, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&calendar)?);
    } else {
        print_calendar(&calendar);
    }
    Ok(())
}

fn print_calendar(calendar: &Calendar) {
    if let Some((first, last)) = calendar.span() {
        println!(
            "Availability {} to {} (as of {})",
            first, last, calendar.reference_date
        );
    }
    if calendar.breeds.is_empty() {
        println!("No active breeds.");
    }
    for breed in &calendar.breeds {
        println!();
        println!("{} ({})", breed.name, breed.slug);
        for slot in &breed.slots {
            // "-" marks weeks with no hatch at all, as opposed to sold out.
            let available = if slot.scheduled {
                slot.available.to_string()
            } else {
                "-".to_string()
            };
            println!(
                "  {}  {}  {:>6}",
                slot.iso_week(),
                slot.delivery_date,
                available
            );
        }
    }
    if !calendar.warnings.is_empty() {
        println!();
        for warning in &calendar.warnings {
            println!("warning: hatch {}: {}", warning.hatch_id, warning.message);
        }
    }
}

pub fn cmd_week(date: Option<&str>) -> Result<()> {
    let date = date_or_today(date)?;
    let week = IsoWeek::from_date(date).context("Date is outside the ISO week range")?;
    match week.monday() {
        Some(monday) => println!("{}  (week of {})", week, monday),
        None => println!("{}", week),
    }
    Ok(())
}
