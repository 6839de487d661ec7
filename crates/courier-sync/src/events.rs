//! # Scheduler Events
//!
//! Typed observer stream for the UI shell and the agent log.
//!
//! ```text
//!  SyncScheduler ──emit──► broadcast::Sender<SyncEvent> ──► subscribe() receivers
//!                 └─emit──► Arc<dyn SyncEventEmitter>   ──► NoOp / Tracing / custom
//! ```

use chrono::{DateTime, Utc};
use courier_core::QueueSummary;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::network::NetworkState;
use crate::status::{SyncStatistics, SyncStatus};

/// Desktop part of a health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopHealth {
    pub configured: bool,
    pub reachable: bool,
    pub target: Option<String>,
}

/// Payload of a `health_check` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub desktop: DesktopHealth,
    pub queue: QueueSummary,
    pub network: NetworkState,
    pub sync: SyncStatistics,
}

/// Events emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Stopped,
    #[serde(rename_all = "camelCase")]
    SyncCompleted {
        items_processed: usize,
        failed: usize,
        stats: SyncStatistics,
    },
    #[serde(rename_all = "camelCase")]
    SyncError { message: String, stats: SyncStatistics },
    HealthCheck(HealthSnapshot),
    #[serde(rename_all = "camelCase")]
    StatusChanged { status: SyncStatus },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Started => "started",
            SyncEvent::Stopped => "stopped",
            SyncEvent::SyncCompleted { .. } => "sync_completed",
            SyncEvent::SyncError { .. } => "sync_error",
            SyncEvent::HealthCheck(_) => "health_check",
            SyncEvent::StatusChanged { .. } => "status_changed",
        }
    }
}

// =============================================================================
// Emitters
// =============================================================================

/// Sink for scheduler events.
pub trait SyncEventEmitter: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Drops every event.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Writes events to the log.
pub struct TracingEmitter;

impl SyncEventEmitter for TracingEmitter {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::SyncError { message, stats } => {
                warn!(event = event.name(), failed_syncs = stats.failed_syncs, %message, "Sync event")
            }
            SyncEvent::SyncCompleted {
                items_processed,
                failed,
                ..
            } => info!(event = event.name(), items_processed, failed, "Sync event"),
            SyncEvent::HealthCheck(snapshot) => debug!(
                event = event.name(),
                desktop_reachable = snapshot.desktop.reachable,
                pending = snapshot.queue.pending,
                failed = snapshot.queue.failed,
                connected = snapshot.network.connected,
                "Sync event"
            ),
            _ => info!(event = event.name(), "Sync event"),
        }
    }
}

/// Fans events out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<SyncEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastEmitter { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl SyncEventEmitter for BroadcastEmitter {
    fn emit(&self, event: &SyncEvent) {
        // No receivers is not an error
        let _ = self.tx.send(event.clone());
    }
}
