//! Breed and hatch management - `farmgate breed`, `farmgate hatch`.

use anyhow::{Context, Result, bail};

use farmgate::calendar::IsoWeek;
use farmgate::config::AppConfig;
use farmgate::models::parse_date;
use farmgate::storefront::db::StoreDb;
use farmgate::storefront::server::open_store;

use super::super::{BreedCommands, HatchCommands};

pub fn cmd_breed(config: &AppConfig, command: BreedCommands) -> Result<()> {
    let db = open_store(config)?;

    match command {
        BreedCommands::Add {
            slug,
            name,
            order,
            price,
        } => {
            if db.get_breed_by_slug(&slug)?.is_some() {
                bail!("Breed '{}' already exists", slug);
            }
            let breed = db.create_breed(&slug, &name, order, price)?;
            tracing::info!(id = breed.id, slug = %breed.slug, "Breed added");
            println!("Added breed {} ({})", breed.name, breed.slug);
        }
        BreedCommands::List { all } => {
            let breeds = db.list_breeds(all)?;
            if breeds.is_empty() {
                println!("No breeds.");
                return Ok(());
            }
            for breed in breeds {
                let flag = if breed.active { "" } else { "  (inactive)" };
                println!(
                    "{:>4}  {:<20} {:<28} {:>8}{}",
                    breed.display_order, breed.slug, breed.name, breed.unit_price, flag
                );
            }
        }
        BreedCommands::Disable { slug } => set_active(&db, &slug, false)?,
        BreedCommands::Enable { slug } => set_active(&db, &slug, true)?,
    }

    Ok(())
}

fn set_active(db: &StoreDb, slug: &str, active: bool) -> Result<()> {
    match db.set_breed_active(slug, active)? {
        Some(breed) => {
            let state = if active { "enabled" } else { "disabled" };
            println!("Breed {} {}", breed.slug, state);
            Ok(())
        }
        None => bail!("Breed '{}' not found", slug),
    }
}

pub fn cmd_hatch(config: &AppConfig, command: HatchCommands) -> Result<()> {
    let db = open_store(config)?;

    match command {
        HatchCommands::Add { breed, date, count } => {
            let date = parse_date(&date).map_err(anyhow::Error::msg)?;
            let breed = db
                .get_breed_by_slug(&breed)?
                .with_context(|| format!("Breed '{}' not found", breed))?;
            let week = IsoWeek::from_date(date)
                .with_context(|| format!("Hatch date {} has no ISO week", date))?;
            let hatch = db.create_hatch(breed.id, &date.format("%Y-%m-%d").to_string(), count)?;
            println!(
                "Scheduled {} {} chicks on {} ({})",
                hatch.initial_count, breed.name, hatch.hatch_date, week
            );
        }
        HatchCommands::List { all } => {
            let hatches = db.list_hatches(!all)?;
            if hatches.is_empty() {
                println!("No hatches.");
                return Ok(());
            }
            let breeds = db.list_breeds(true)?;
            for hatch in hatches {
                let breed = breeds
                    .iter()
                    .find(|b| b.id == hatch.breed_id)
                    .map(|b| b.slug.as_str())
                    .unwrap_or("?");
                let week = hatch
                    .parsed_date()
                    .ok()
                    .and_then(IsoWeek::from_date)
                    .map_or_else(|| "malformed".to_string(), |w| w.to_string());
                println!(
                    "{:>4}  {:<20} {:<12} {:<9} {:>6}",
                    hatch.id, breed, hatch.hatch_date, week, hatch.initial_count
                );
            }
        }
    }

    Ok(())
}
