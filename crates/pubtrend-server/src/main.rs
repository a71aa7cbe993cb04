//! pubtrend REST API Server
//!
//! Starts the HTTP API and the daily quick-sync scheduler.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use pubtrend_client::OaiPmhClient;
use pubtrend_core::load_settings;

use pubtrend_server::{AppState, ServerConfig, create_router, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::parse();

    let settings = load_settings(config.config.clone()).context("Failed to load settings")?;

    info!("Opening database...");
    let repo = pubtrend_db::connect(&config.database_url, 5)
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let client = OaiPmhClient::with_config(&settings.harvest.base_url, &settings.http)
        .context("Failed to create OAI-PMH client")?;

    let shutdown_token = CancellationToken::new();
    let app_state = AppState::new(repo, client, &settings, shutdown_token.clone());

    app_state
        .harvest_service
        .seed_categories()
        .await
        .context("Failed to seed categories")?;

    let scheduler_handle = if config.no_scheduler {
        info!("Daily quick sync disabled");
        None
    } else {
        Some(tokio::spawn(scheduler::run_daily_quick_sync(
            app_state.clone(),
            config.sync_hour,
        )))
    };

    let sync_tasks = app_state.sync_tasks.clone();
    let app = create_router(app_state, &config.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting pubtrend API server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    // Cancelled runs still log their report before exiting.
    sync_tasks.close();
    if !sync_tasks.is_empty() {
        info!("Waiting for {} background sync(s) to stop...", sync_tasks.len());
    }
    sync_tasks.wait().await;

    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    // Running syncs hold child tokens; they stop and keep their checkpoint.
    shutdown_token.cancel();
}
