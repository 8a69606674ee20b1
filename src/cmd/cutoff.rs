//! Order cutoff commands - `farmgate cutoff`.

use anyhow::{Result, bail};

use farmgate::calendar::CutoffConfig;
use farmgate::config::AppConfig;
use farmgate::models::parse_date;
use farmgate::storefront::server::open_store;
use farmgate::storefront::service::cutoff_status;

use super::super::CutoffCommands;

pub fn cmd_cutoff(config: &AppConfig, command: CutoffCommands) -> Result<()> {
    let db = open_store(config)?;

    match command {
        CutoffCommands::Show { date } => {
            let today = match date {
                Some(raw) => parse_date(&raw).map_err(anyhow::Error::msg)?,
                None => chrono::Utc::now().date_naive(),
            };
            let status = cutoff_status(db.get_cutoff()?, today)?;
            match status.cutoff {
                Some(cutoff) => println!("Cutoff:       {}", cutoff.as_week()),
                None => println!("Cutoff:       not set"),
            }
            println!("Current week: {}", status.current);
            println!(
                "Ordering:     {}",
                if status.open { "open" } else { "closed" }
            );
        }
        CutoffCommands::Set { year, week } => {
            let cutoff = CutoffConfig::new(year, week);
            if let Err(msg) = cutoff.validate() {
                bail!(msg);
            }
            db.set_cutoff(&cutoff)?;
            tracing::info!(year, week, "Order cutoff updated");
            println!("Cutoff set to {}", cutoff.as_week());
        }
    }

    Ok(())
}
