//! Configuration view and validation commands - `farmgate config`.

use std::path::Path;

use anyhow::{Result, bail};

use farmgate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use farmgate::session::hash_password;

use super::super::ConfigCommands;

pub fn cmd_config(
    config: &AppConfig,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            // Secrets are skipped on serialization.
            println!("{}", toml::to_string_pretty(config)?);
            let set = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };
            println!("# remote api_key: {}", set(&config.remote.api_key));
            println!("# session secret: {}", set(&config.session.secret));
            println!(
                "# admin password hash: {}",
                set(&config.session.admin_password_hash)
            );
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save(path)?;
            println!("Wrote {}", path.display());
        }
        Some(ConfigCommands::HashPassword { password }) => {
            println!("{}", hash_password(&password)?);
        }
    }

    Ok(())
}
