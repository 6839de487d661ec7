//! # Background Scheduler
//!
//! Drives periodic drain passes and health checks on top of the
//! [`SubmissionCoordinator`].
//!
//! ## Timers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start()                                                                │
//! │    ├── sync loop    tick at 0, then every sync_interval (120s)          │
//! │    │     └── perform_sync()                                             │
//! │    └── health loop  every health_interval (60s)                         │
//! │          └── perform_health_check()                                     │
//! │                                                                         │
//! │  stop()  ── cancel token ──► both loops exit at their next await        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## perform_sync
//! ```text
//!  attempts += 1, status = syncing
//!     ├── wifi_only && metered link ──────────────► waiting_for_wifi
//!     ├── not connected && desktop unreachable ───► offline
//!     └── drain_queue()
//!           ├── Ok  ──► items_processed += delivered, idle
//!           │           (sync_completed only when something was delivered)
//!           └── Err ──► failed_syncs += 1, emit sync_error, error
//!  persist sync-stats
//! ```

use chrono::Utc;
use courier_store::keys;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerSettings;
use crate::coordinator::{DrainOutcome, SubmissionCoordinator};
use crate::error::SyncResult;
use crate::events::{
    BroadcastEmitter, DesktopHealth, HealthSnapshot, NoOpEmitter, SyncEvent, SyncEventEmitter,
};
use crate::network::NetworkMonitor;
use crate::status::{SyncStatistics, SyncStatus};

const EVENT_CAPACITY: usize = 64;

/// Periodic drain and health driver.
///
/// Cheap to clone; clones share the same timers and counters.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    coordinator: Arc<SubmissionCoordinator>,
    network: Arc<dyn NetworkMonitor>,
    settings: RwLock<SchedulerSettings>,
    stats: RwLock<SyncStatistics>,
    broadcast: BroadcastEmitter,
    emitter: Arc<dyn SyncEventEmitter>,
    running: Mutex<Option<CancellationToken>>,
}

impl SyncScheduler {
    pub fn new(
        coordinator: Arc<SubmissionCoordinator>,
        network: Arc<dyn NetworkMonitor>,
        settings: SchedulerSettings,
    ) -> Self {
        Self::with_emitter(coordinator, network, settings, Arc::new(NoOpEmitter))
    }

    /// Creates a scheduler that also forwards every event to `emitter`.
    pub fn with_emitter(
        coordinator: Arc<SubmissionCoordinator>,
        network: Arc<dyn NetworkMonitor>,
        settings: SchedulerSettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncScheduler {
            inner: Arc::new(Inner {
                coordinator,
                network,
                settings: RwLock::new(settings),
                stats: RwLock::new(SyncStatistics::default()),
                broadcast: BroadcastEmitter::new(EVENT_CAPACITY),
                emitter,
                running: Mutex::new(None),
            }),
        }
    }

    /// Restores persisted `sync-config` and `sync-stats`, then starts the
    /// timers when `auto_start` is set.
    pub async fn initialize(&self) -> SyncResult<()> {
        let store = self.inner.coordinator.settings();

        match store.load_json::<SchedulerSettings>(keys::SYNC_CONFIG).await {
            Ok(Some(saved)) if saved.validate().is_ok() => {
                debug!(?saved, "Restored scheduler settings");
                *self.inner.settings.write().await = saved;
            }
            Ok(Some(saved)) => warn!(?saved, "Ignoring invalid persisted scheduler settings"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load scheduler settings"),
        }

        match store.load_json::<SyncStatistics>(keys::SYNC_STATS).await {
            Ok(Some(mut saved)) => {
                saved.current_status = SyncStatus::Idle;
                *self.inner.stats.write().await = saved;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load sync statistics"),
        }

        if self.inner.settings.read().await.auto_start {
            self.start().await;
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Arms both timers. The first sync runs immediately. No-op if running.
    pub async fn start(&self) {
        {
            let mut running = self.inner.running.lock().await;
            if running.is_some() {
                debug!("Scheduler already running");
                return;
            }
            *running = Some(self.spawn_loops().await);
        }

        info!("Sync scheduler started");
        self.emit(SyncEvent::Started);
    }

    /// Cancels both timers and persists statistics. In-flight work may
    /// finish but no further tick is scheduled.
    pub async fn stop(&self) {
        let token = self.inner.running.lock().await.take();
        let Some(token) = token else {
            return;
        };
        token.cancel();

        self.persist_stats().await;
        info!("Sync scheduler stopped");
        self.emit(SyncEvent::Stopped);
    }

    pub async fn is_running(&self) -> bool {
        self.inner.running.lock().await.is_some()
    }

    async fn spawn_loops(&self) -> CancellationToken {
        let settings = *self.inner.settings.read().await;
        let token = CancellationToken::new();

        let sync = self.clone();
        let sync_token = token.clone();
        tokio::spawn(async move {
            let mut ticker = interval(settings.sync_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = sync_token.cancelled() => break,
                    _ = ticker.tick() => sync.perform_sync().await,
                }
            }
            debug!("Sync loop exited");
        });

        let health = self.clone();
        let health_token = token.clone();
        tokio::spawn(async move {
            let period = settings.health_interval();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = health_token.cancelled() => break,
                    _ = ticker.tick() => {
                        health.perform_health_check().await;
                    }
                }
            }
            debug!("Health loop exited");
        });

        token
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Runs one sync now, outside the timer.
    pub async fn force_sync(&self) {
        info!("Forced sync requested");
        self.perform_sync().await;
    }

    /// One scheduled sync. Never fails; outcomes land in statistics and events.
    pub async fn perform_sync(&self) {
        {
            let mut stats = self.inner.stats.write().await;
            stats.sync_attempts += 1;
            stats.last_sync_time = Some(Utc::now());
        }
        self.set_status(SyncStatus::Syncing).await;

        let wifi_only = self.inner.settings.read().await.wifi_only;
        let network = self.inner.network.current().await;

        if wifi_only && !network.kind.is_unmetered() {
            debug!(kind = %network.kind, "Wi-Fi only and on a metered link, skipping drain");
            self.set_status(SyncStatus::WaitingForWifi).await;
            self.persist_stats().await;
            return;
        }
        // The monitor only watches the relay; a reachable desktop still means the LAN is up
        if !network.connected && !self.inner.coordinator.is_desktop_reachable().await {
            debug!("No connectivity, skipping drain");
            self.set_status(SyncStatus::Offline).await;
            self.persist_stats().await;
            return;
        }

        match self.inner.coordinator.drain_queue().await {
            Ok(DrainOutcome::Ran(report)) => {
                let stats = {
                    let mut stats = self.inner.stats.write().await;
                    stats.items_processed += report.delivered as u64;
                    if report.delivered > 0 {
                        stats.successful_syncs += 1;
                        stats.last_successful_sync = Some(Utc::now());
                    }
                    stats.clone()
                };
                if report.delivered > 0 {
                    self.emit(SyncEvent::SyncCompleted {
                        items_processed: report.delivered,
                        failed: report.retained + report.parked,
                        stats,
                    });
                }
                self.set_status(SyncStatus::Idle).await;
            }
            Ok(DrainOutcome::Skipped) => {
                debug!("Drain already running, nothing to do this tick");
                self.set_status(SyncStatus::Idle).await;
            }
            Err(e) => {
                error!(error = %e, "Drain pass failed");
                let stats = {
                    let mut stats = self.inner.stats.write().await;
                    stats.failed_syncs += 1;
                    stats.clone()
                };
                self.emit(SyncEvent::SyncError {
                    message: e.to_string(),
                    stats,
                });
                self.set_status(SyncStatus::Error).await;
            }
        }

        self.persist_stats().await;
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Re-probes the desktop and reports queue, network and sync state.
    pub async fn perform_health_check(&self) -> Option<HealthSnapshot> {
        let coordinator = &self.inner.coordinator;

        let reachable = coordinator.refresh_desktop().await;
        let queue = match coordinator.queue_summary().await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Health check could not read the queue");
                return None;
            }
        };

        let snapshot = HealthSnapshot {
            timestamp: Utc::now(),
            desktop: DesktopHealth {
                configured: coordinator.is_desktop_configured(),
                reachable,
                target: coordinator.desktop_target(),
            },
            queue,
            network: self.inner.network.current().await,
            sync: self.statistics().await,
        };

        self.emit(SyncEvent::HealthCheck(snapshot.clone()));
        Some(snapshot)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Applies new settings and persists them under `sync-config`. Timers
    /// restart when an interval changes while running.
    pub async fn configure(&self, settings: SchedulerSettings) -> SyncResult<()> {
        settings.validate()?;

        let previous = {
            let mut current = self.inner.settings.write().await;
            std::mem::replace(&mut *current, settings)
        };
        self.inner
            .coordinator
            .settings()
            .save_json(keys::SYNC_CONFIG, &settings)
            .await?;

        info!(
            sync_interval_secs = settings.sync_interval_secs,
            health_interval_secs = settings.health_interval_secs,
            wifi_only = settings.wifi_only,
            auto_start = settings.auto_start,
            "Scheduler settings updated"
        );

        let intervals_changed = previous.sync_interval_secs != settings.sync_interval_secs
            || previous.health_interval_secs != settings.health_interval_secs;
        if intervals_changed {
            let mut running = self.inner.running.lock().await;
            if let Some(old) = running.take() {
                old.cancel();
                *running = Some(self.spawn_loops().await);
                debug!("Timers restarted with new intervals");
            }
        }
        Ok(())
    }

    pub async fn settings(&self) -> SchedulerSettings {
        *self.inner.settings.read().await
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn statistics(&self) -> SyncStatistics {
        self.inner.stats.read().await.clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.inner.stats.read().await.current_status
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.broadcast.subscribe()
    }

    pub fn coordinator(&self) -> &Arc<SubmissionCoordinator> {
        &self.inner.coordinator
    }

    async fn set_status(&self, status: SyncStatus) {
        {
            let mut stats = self.inner.stats.write().await;
            if stats.current_status == status {
                return;
            }
            stats.current_status = status;
        }
        self.emit(SyncEvent::StatusChanged { status });
    }

    async fn persist_stats(&self) {
        let stats = self.statistics().await;
        if let Err(e) = self
            .inner
            .coordinator
            .settings()
            .save_json(keys::SYNC_STATS, &stats)
            .await
        {
            error!(error = %e, "Failed to persist sync statistics");
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.inner.emitter.emit(&event);
        self.inner.broadcast.emit(&event);
    }
}
