//! RelayCraft Daemon Binary
//!
//! Runs the rendezvous relay and its health endpoint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use relaycraft_daemon::{serve_health, StatsReporter};
use relaycraft_logging::init_logging;
use relaycraft_relay::RelayServer;
use relaycraft_settings::Settings;

/// RelayCraft - rendezvous TCP relay
#[derive(Parser)]
#[command(name = "relaycraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    info!("Starting RelayCraft relay...");

    let relay_addr = settings.relay_addr();
    let relay = RelayServer::bind(relay_addr.as_str(), settings.relay.clone())
        .await
        .with_context(|| format!("Failed to bind relay on {}", relay_addr))?;
    let monitor = relay.monitor();

    let (stop_tx, stop_rx) = watch::channel(false);

    if settings.health_enabled {
        let health_addr = settings.health_addr();
        let listener = TcpListener::bind(&health_addr)
            .await
            .with_context(|| format!("Failed to bind health endpoint on {}", health_addr))?;
        let mut stop = stop_rx.clone();
        let monitor = monitor.clone();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = serve_health(listener, monitor, shutdown).await {
                error!("Health endpoint error: {}", e);
            }
        });
    }

    if let Some(interval) = settings.stats_interval() {
        tokio::spawn(StatsReporter::new(monitor.clone(), interval).run());
    }

    let mut stop = stop_rx;
    let relay_task = tokio::spawn(relay.run_until(async move {
        let _ = stop.wait_for(|stopped| *stopped).await;
    }));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Received shutdown signal");

    let _ = stop_tx.send(true);
    if let Err(e) = relay_task.await {
        error!("Relay task failed: {}", e);
    }

    let status = monitor.status();
    info!(
        "Relay stopped after {}s: {} connections, {} bytes relayed",
        status.uptime_secs, status.total_connections, status.data_transferred
    );
    Ok(())
}
