use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nailmatch::api::auth::purge_expired_sessions;
use nailmatch::api::metrics::init_metrics;
use nailmatch::api::rate_limit::spawn_cleanup_task;
use nailmatch::config::Config;
use nailmatch::AppState;

/// Seconds between sweeps of expired sessions
const SESSION_PURGE_INTERVAL_SECS: u64 = 3600;

#[derive(Parser, Debug)]
#[command(name = "nailmatch")]
#[command(author, version, about = "Marketplace API for nail-art clients and pros", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "nailmatch.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NailMatch v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.server.data_dir.display())
    })?;
    let upload_dir = config.upload_dir();
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("Failed to create upload directory {}", upload_dir.display()))?;

    let db = nailmatch::db::init(&config.server.data_dir).await?;

    match &config.auth.admin_password {
        Some(password) => {
            nailmatch::db::ensure_admin_user(&db, &config.auth.admin_email, password).await?;
        }
        None => tracing::warn!("No admin password configured; skipping admin bootstrap"),
    }

    let metrics_handle = init_metrics().context("Failed to install Prometheus recorder")?;
    let state = Arc::new(AppState::new(config.clone(), db.clone()).with_metrics(metrics_handle));

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    tokio::spawn(async move {
        let interval = Duration::from_secs(SESSION_PURGE_INTERVAL_SECS);
        loop {
            match purge_expired_sessions(&db).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(removed = n, "Purged expired sessions"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
            }
            tokio::time::sleep(interval).await;
        }
    });

    let app = nailmatch::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);
    if !config.server.public_url.is_empty() {
        tracing::info!("Public URL: {}", config.server.public_url);
    }

    // Peer addresses key the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
