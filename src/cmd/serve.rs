//! Server and database setup commands - `farmgate serve`, `farmgate init-db`.

use anyhow::Result;

use farmgate::config::AppConfig;
use farmgate::storefront::server;

pub async fn cmd_serve(
    mut config: AppConfig,
    port: Option<u16>,
    host: Option<String>,
    cors: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    config.server.cors_permissive |= cors;

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    server::start_server(config).await
}

pub fn cmd_init_db(config: &AppConfig) -> Result<()> {
    server::open_store(config)?;
    println!(
        "Storefront database initialized at {}",
        config.server.db_path.display()
    );
    Ok(())
}
