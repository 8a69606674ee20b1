//! Configuration for the farmgate service.
//!
//! Settings are layered: `farmgate.toml` → `.env` / environment → CLI.
//! Every field has a default, so an empty or missing file is valid.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3141
//! db_path = ".farmgate/farmgate.db"
//!
//! [calendar]
//! horizon_weeks = 16
//! max_horizon_weeks = 104
//!
//! [remote]
//! base_url = "https://project.example.co"
//! api_key = "anon-key"
//! rebate_function = "validate_rebate_code"
//! referral_function = "validate_referral_code"
//! timeout_secs = 10
//! max_retries = 2
//!
//! [session]
//! ttl_secs = 43200
//! admin_username = "admin"
//! admin_password_hash = "$argon2id$v=19$…"  # farmgate config hash-password
//!
//! [logging]
//! json = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calendar::DEFAULT_HORIZON_WEEKS;

pub const DEFAULT_CONFIG_FILE: &str = "farmgate.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Allow any origin (local front-end development).
    #[serde(default)]
    pub cors_permissive: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".farmgate/farmgate.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            cors_permissive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSection {
    /// Weeks projected when a request does not ask for a horizon
    #[serde(default = "default_horizon_weeks")]
    pub horizon_weeks: u32,
    /// Upper bound accepted from requests
    #[serde(default = "default_max_horizon_weeks")]
    pub max_horizon_weeks: u32,
}

fn default_horizon_weeks() -> u32 {
    DEFAULT_HORIZON_WEEKS
}

fn default_max_horizon_weeks() -> u32 {
    104
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            horizon_weeks: default_horizon_weeks(),
            max_horizon_weeks: default_max_horizon_weeks(),
        }
    }
}

/// Connection settings for the hosted database's RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_rebate_function")]
    pub rebate_function: String,
    #[serde(default = "default_referral_function")]
    pub referral_function: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_rebate_function() -> String {
    "validate_rebate_code".to_string()
}

fn default_referral_function() -> String {
    "validate_referral_code".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            rebate_function: default_rebate_function(),
            referral_function: default_referral_function(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// HMAC secret for session tokens
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Argon2 PHC string of the admin password
    #[serde(default, skip_serializing)]
    pub admin_password_hash: Option<String>,
}

fn default_ttl_secs() -> i64 {
    12 * 60 * 60
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_secs: default_ttl_secs(),
            admin_username: default_admin_username(),
            admin_password_hash: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

/// Top-level `farmgate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub calendar: CalendarSection,
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse farmgate.toml")
    }

    /// Load `path` if given, else `./farmgate.toml` when present, else defaults.
    /// Environment overrides (including a `.env` file) are applied last.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `FARMGATE_*` overrides from `lookup` (normally the process env).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FARMGATE_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup("FARMGATE_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = lookup("FARMGATE_REMOTE_URL") {
            self.remote.base_url = Some(url);
        }
        if let Some(key) = lookup("FARMGATE_REMOTE_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Some(secret) = lookup("FARMGATE_JWT_SECRET") {
            self.session.secret = Some(secret);
        }
        if let Some(hash) = lookup("FARMGATE_ADMIN_PASSWORD_HASH") {
            self.session.admin_password_hash = Some(hash);
        }
        if let Some(json) = lookup("FARMGATE_LOG_JSON") {
            self.logging.json = json != "0" && json != "false";
        }
    }

    /// Save configuration to a TOML file. Secrets are never written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize farmgate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Return warnings for settings that will make parts of the service
    /// unusable. An empty list means the configuration is complete.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.calendar.horizon_weeks == 0 {
            warnings.push("calendar.horizon_weeks must be at least 1".to_string());
        }
        if self.calendar.horizon_weeks > self.calendar.max_horizon_weeks {
            warnings.push(format!(
                "calendar.horizon_weeks ({}) exceeds calendar.max_horizon_weeks ({})",
                self.calendar.horizon_weeks, self.calendar.max_horizon_weeks
            ));
        }
        if self.remote.base_url.is_none() {
            warnings.push(
                "remote.base_url is not set; rebate and referral codes cannot be validated"
                    .to_string(),
            );
        }
        if self.session.secret.is_none() {
            warnings.push("session secret is not set; admin login is disabled".to_string());
        }
        match self.session.admin_password_hash.as_deref() {
            None => warnings.push(
                "session.admin_password_hash is not set; admin login is disabled".to_string(),
            ),
            Some(hash) if !crate::session::is_password_hash(hash) => warnings.push(
                "session.admin_password_hash is not an argon2 PHC string; \
                 generate one with `farmgate config hash-password`"
                    .to_string(),
            ),
            Some(_) => {}
        }
        warnings
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
