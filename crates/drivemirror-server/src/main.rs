//! DriveMirror server - HTTP API for the tree-sync engine
//!
//! This binary wires the adapters together and serves the JSON API:
//! - Loads configuration and opens the SQLite store
//! - Builds the Drive provider from the configured access token
//! - Exposes the sync service over HTTP
//! - Shuts down gracefully on SIGTERM/SIGINT

mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use drivemirror_core::config::Config;
use drivemirror_core::ports::tree_provider::ITreeProvider;
use drivemirror_drive::{DriveClient, DriveTreeProvider};
use drivemirror_store::{DatabasePool, SqliteTreeStore};
use drivemirror_sync::SyncService;

use crate::http::{ApiContext, ApiServer};

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so its log level can seed the filter
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(config_path = %config_path.display(), "DriveMirror server starting (drivemirrord)");

    // Open the database
    let pool = DatabasePool::new(&config.database.path)
        .await
        .context("Failed to open database")?;
    let store = Arc::new(SqliteTreeStore::new(pool.pool().clone()));

    // Build the Drive provider; without an access token the API still
    // serves read routes, but mutating routes reject as unauthorized
    let access_token = config.drive.access_token.clone().unwrap_or_default();
    let authorized = !access_token.is_empty();
    if !authorized {
        warn!("No Drive access token configured; sync routes will reject requests");
    }

    let client = match &config.drive.api_base {
        Some(base) => DriveClient::with_base_url(access_token, base.clone()),
        None => DriveClient::new(access_token),
    };
    let provider: Arc<dyn ITreeProvider> = Arc::new(DriveTreeProvider::new(client));

    let service = Arc::new(SyncService::new(
        Arc::clone(&provider),
        store,
        config.polling.page_size,
    ));

    let ctx = ApiContext {
        service,
        provider,
        authorized,
        default_page_budget: config.polling.default_page_budget,
    };
    let server = ApiServer::new(ctx, &config.server.bind)
        .context("Failed to configure API server")?;

    // Graceful shutdown on SIGTERM/SIGINT
    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let result = server.run(shutdown_token).await;

    match &result {
        Ok(()) => info!("DriveMirror server shut down gracefully"),
        Err(e) => error!(error = %e, "DriveMirror server exiting with error"),
    }

    result
}
