use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use farmgate::config::AppConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "farmgate")]
#[command(version, about = "Farm-direct storefront with a hatch availability calendar")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to farmgate.toml (defaults to ./farmgate.toml when present)
    #[arg(long, global = true, env = "FARMGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the storefront HTTP server
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Allow cross-origin requests from any origin
        #[arg(long)]
        cors: bool,
    },
    /// Create the database and apply migrations
    InitDb,
    /// Manage breeds
    Breed {
        #[command(subcommand)]
        command: BreedCommands,
    },
    /// Manage hatches
    Hatch {
        #[command(subcommand)]
        command: HatchCommands,
    },
    /// Print the availability calendar
    Calendar {
        /// Number of weeks to show (defaults to config)
        #[arg(short, long)]
        weeks: Option<u32>,

        /// Reference date, YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show or set the order cutoff
    Cutoff {
        #[command(subcommand)]
        command: CutoffCommands,
    },
    /// Print the ISO week of a date (defaults to today, UTC)
    Week { date: Option<String> },
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BreedCommands {
    /// Add a breed
    Add {
        /// URL-safe identifier, e.g. "light-sussex"
        slug: String,
        /// Display name
        name: String,
        /// Position in listings (lower first)
        #[arg(long, default_value = "0")]
        order: i32,
        /// Unit price in minor currency units
        #[arg(long, default_value = "0")]
        price: i64,
    },
    /// List breeds
    List {
        /// Include inactive breeds
        #[arg(long)]
        all: bool,
    },
    /// Hide a breed from the calendar and from ordering
    Disable { slug: String },
    /// Show a previously disabled breed again
    Enable { slug: String },
}

#[derive(Subcommand, Clone)]
pub enum HatchCommands {
    /// Schedule a hatch
    Add {
        /// Breed slug
        breed: String,
        /// Hatch date, YYYY-MM-DD
        date: String,
        /// Number of chicks expected
        count: u32,
    },
    /// List hatches
    List {
        /// Include inactive hatches
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum CutoffCommands {
    /// Show the cutoff and whether ordering is open
    Show {
        /// Evaluate as of this date instead of today
        #[arg(long)]
        date: Option<String>,
    },
    /// Set the last ISO week in which orders are accepted
    Set {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        week: u32,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets hidden)
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default farmgate.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print an argon2 hash for session.admin_password_hash
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.command {
        // The file being created may not exist yet.
        Commands::Config {
            command: Some(ConfigCommands::Init { .. }),
        } => AppConfig::default(),
        _ => AppConfig::load_or_default(cli.config.as_deref())?,
    };
    farmgate::logging::init(&config.logging, cli.verbose);

    match &cli.command {
        Commands::Serve { port, host, cors } => {
            cmd::cmd_serve(config, *port, host.clone(), *cors).await?;
        }
        Commands::InitDb => cmd::cmd_init_db(&config)?,
        Commands::Breed { command } => cmd::cmd_breed(&config, command.clone())?,
        Commands::Hatch { command } => cmd::cmd_hatch(&config, command.clone())?,
        Commands::Calendar { weeks, date, json } => {
            cmd::cmd_calendar(&config, *weeks, date.as_deref(), *json)?
        }
        Commands::Cutoff { command } => cmd::cmd_cutoff(&config, command.clone())?,
        Commands::Week { date } => cmd::cmd_week(date.as_deref())?,
        Commands::Config { command } => {
            cmd::cmd_config(&config, cli.config.as_deref(), command.clone())?
        }
    }

    Ok(())
}
