//! edge-agent: connects to the three wearable BLE sensors, persists every
//! reading locally, and forwards it to the telemetry server.

use clap::Parser;
use edge_agent::{config, supervisor::Supervisor};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

/// Field agent for firefighter wearable telemetry.
#[derive(Debug, Parser)]
#[command(name = "edge-agent", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "/etc/fireline/edge-agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "edge-agent starting");

    let cfg = match config::load_config_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let supervisor = Supervisor::new(cfg);
    match supervisor.run(shutdown_rx).await {
        Ok(()) => {
            info!("edge-agent shut down cleanly");
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "edge-agent exited with fatal error");
            std::process::exit(1);
        }
    }
}
