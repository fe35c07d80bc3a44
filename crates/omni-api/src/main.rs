//! # omni-api: Binary Entry Point
//!
//! Starts the webhook server. Configuration comes from flags or `OMNI_*`
//! environment variables; see [`omni_api::config::ServerConfig`].

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use omni_api::config::ServerConfig;
use omni_api::feed::{self, CrdDirWatcher};
use tokio::sync::mpsc;

/// Buffered schema events between the watcher and the registry.
const FEED_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_json);

    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {e}");
            None
        }
    };

    let state = omni_api::bootstrap::bootstrap(&config)
        .inspect_err(|e| tracing::error!("Bootstrap failed: {e}"))?
        .with_prometheus(prometheus);

    // Dropping the watcher stops the feed, so it lives as long as the server.
    let _watcher = match config.watched_dir() {
        Some(dir) => {
            let (tx, rx) = mpsc::channel(FEED_CAPACITY);
            let mut watcher = CrdDirWatcher::new(dir);
            watcher.prime();
            tokio::spawn(feed::apply_events(state.clone(), rx));
            let watcher = watcher
                .watch(tx)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
            Some(watcher)
        }
        None => None,
    };

    let app = omni_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("omni webhook listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
