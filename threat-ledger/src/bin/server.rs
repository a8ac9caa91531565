//! Ledger server binary
//!
//! Usage: `threat-ledger-server [config.toml]`. Without a path the
//! configuration comes from `THREAT_LEDGER_*` environment variables.

use anyhow::Context;
use std::sync::Arc;
use threat_ledger::{config::LogFormat, spawn_ledger_actor, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => Config::from_env().context("loading configuration from environment")?,
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        difficulty = config.sealing.difficulty,
        seal_trigger = config.sealing.seal_trigger,
        "Starting threat ledger"
    );

    // Open ledger
    let mailbox_capacity = config.actor.mailbox_capacity;
    let ledger = Arc::new(Ledger::open(config).context("opening ledger")?);
    let stats = ledger.statistics();
    tracing::info!(
        blocks = stats.total_blocks,
        pending = stats.pending_transactions,
        chain_valid = stats.chain_valid,
        "Ledger opened"
    );

    let handle = spawn_ledger_actor(ledger, mailbox_capacity);

    // Sensors and the API layer attach to `handle` in-process
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down threat ledger");
    handle.shutdown().await.context("final ledger flush")?;
    Ok(())
}
