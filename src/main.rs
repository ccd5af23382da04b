//! Uptrail - HTTP uptime monitoring service.
//!
//! Probes registered endpoints on demand, records every outcome, and serves
//! uptime and latency summaries over trailing windows.

mod checks;
mod config;
mod db;
mod probe;
mod stats;
mod web;

#[cfg(test)]
mod test_support;

use checks::Checker;
use config::ServerConfig;
use db::Store;
use probe::Prober;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("uptrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Uptrail on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!(
        "Probe timeout {:?}, up to {} probes in flight",
        cfg.probe_timeout,
        cfg.max_concurrent_probes
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Create checker
    let prober = Prober::new(cfg.probe_timeout)?;
    let checker = Arc::new(Checker::new(
        store.clone(),
        prober,
        cfg.max_concurrent_probes,
    ));

    // Start web server
    let server = Server::new(cfg, store, checker);
    server.start().await?;

    Ok(())
}
