//! Risk gating service entry point.
//!
//! Connects the configured transport (Redis, or in-process for standalone
//! runs) and gates orders until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use gate_service::{RiskGateService, ServiceConfig, Transport, DEFAULT_CONFIG_PATH};
use tracing::{error, info};

/// Risk gating service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GATE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    gate_telemetry::init_logging()?;

    info!("Starting risk gate service v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > GATE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GATE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = ServiceConfig::load(&config_path)?;

    info!(transport = ?config.transport.kind, "Connecting transport");
    let transport = Transport::connect(&config.transport).await?;
    let mut service = RiskGateService::start(&config, transport.store, transport.bus).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = service.stop().await {
        error!(error = %e, "Shutdown completed with errors");
        return Err(e.into());
    }
    Ok(())
}
