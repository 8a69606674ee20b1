use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState};
use super::db::{DbHandle, StoreDb};
use super::service::{Storefront, system_today};
use crate::codes::{CodeValidator, RemoteCodeClient, RemoteConfig, UnconfiguredValidator};
use crate::config::AppConfig;
use crate::session::SessionService;

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open (and migrate) the store at the configured path.
pub fn open_store(config: &AppConfig) -> Result<StoreDb> {
    let db_path = &config.server.db_path;
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    StoreDb::new(db_path)
        .with_context(|| format!("Failed to open store at {}", db_path.display()))
}

/// Build every client from explicit config.
pub fn build_state(config: &AppConfig, db: StoreDb) -> Result<Arc<AppState>> {
    let validator: Arc<dyn CodeValidator> = match RemoteConfig::from_section(&config.remote) {
        Some(remote) => {
            info!(base_url = %remote.base_url, "Remote code validation enabled");
            Arc::new(RemoteCodeClient::new(remote).context("Failed to build code validator")?)
        }
        None => {
            warn!("No remote base_url configured; code validation will report unavailable");
            Arc::new(UnconfiguredValidator)
        }
    };

    let sessions = SessionService::from_config(&config.session);
    if sessions.is_none() {
        warn!("Session secret or admin password hash missing; admin routes disabled");
    }

    Ok(Arc::new(AppState {
        storefront: Storefront::new(DbHandle::new(db), config.calendar.horizon_weeks),
        validator,
        sessions,
        today: system_today(),
        max_horizon_weeks: config.calendar.max_horizon_weeks,
    }))
}

/// Start the storefront server and run until Ctrl+C.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let db = open_store(&config)?;
    let state = build_state(&config, db)?;
    let app = build_router(state, config.server.cors_permissive);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, db = %config.server.db_path.display(), "Farmgate storefront running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
