//! # Courier Agent
//!
//! Headless process that keeps the local queue draining in the background.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tracing (RUST_LOG, default info,courier_sync=debug)                │
//! │  2. CourierConfig::load(COURIER_CONFIG | platform config dir)          │
//! │  3. open courier.db (or memory with --ephemeral)                       │
//! │  4. SubmissionCoordinator::from_config                                 │
//! │  5. SyncScheduler::initialize  (restores sync-config, sync-stats)      │
//! │  6. wait for Ctrl-C / SIGTERM, then stop + close                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use courier_store::{Database, DbConfig, KeyValueStore, MemoryKvStore, SqliteKvStore};
use courier_sync::{
    CourierConfig, ProbeNetworkMonitor, SubmissionCoordinator, SyncScheduler, TracingEmitter,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,courier_sync=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let ephemeral = std::env::args().any(|arg| arg == "--ephemeral");
    let config_path = std::env::var_os("COURIER_CONFIG").map(PathBuf::from);

    let config = CourierConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        store_id = %config.store_id(),
        relay = %config.cloud.relay_url,
        desktop = ?config.desktop_host(),
        ephemeral,
        "Configuration loaded"
    );

    let (kv, db): (Arc<dyn KeyValueStore>, Option<Database>) = if ephemeral {
        warn!("Running with an in-memory store, queued transactions will not survive restart");
        (Arc::new(MemoryKvStore::new()), None)
    } else {
        let path = config
            .database_path()
            .context("No database path configured and no platform data directory")?;
        let db = Database::new(DbConfig::new(&path))
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        info!(path = %path.display(), "Database opened");
        (Arc::new(SqliteKvStore::new(db.pool().clone())), Some(db))
    };

    let coordinator = Arc::new(
        SubmissionCoordinator::from_config(&config, kv)
            .await
            .context("Failed to build submission coordinator")?,
    );

    let network = ProbeNetworkMonitor::for_url(
        &config.cloud.relay_url,
        config.network.kind,
        Duration::from_secs(config.network.probe_timeout_secs),
    )?;

    let scheduler = SyncScheduler::with_emitter(
        coordinator.clone(),
        Arc::new(network),
        config.scheduler,
        Arc::new(TracingEmitter),
    );
    scheduler.initialize().await?;

    let summary = coordinator.queue_summary().await?;
    info!(
        pending = summary.pending,
        failed = summary.failed,
        running = scheduler.is_running().await,
        "Courier agent ready"
    );

    shutdown_signal().await;

    scheduler.stop().await;
    if let Some(db) = db {
        db.close().await;
    }

    info!("Courier agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
