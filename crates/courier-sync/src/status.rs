//! # Status Snapshots
//!
//! Plain data handed to callers and event listeners: the coordinator's view
//! of the channels and the scheduler's counters.

use chrono::{DateTime, Utc};
use courier_core::DeliveryMethod;
use serde::{Deserialize, Serialize};

// =============================================================================
// Sync Status
// =============================================================================

/// What the scheduler is doing right now.
///
/// ```text
///  idle ──► syncing ──┬──► idle              (drain finished)
///                     ├──► waiting_for_wifi  (wifi_only, metered link)
///                     ├──► offline           (no connectivity)
///                     └──► error             (drain raised)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    WaitingForWifi,
    Offline,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::WaitingForWifi => write!(f, "waiting_for_wifi"),
            SyncStatus::Offline => write!(f, "offline"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Sync Statistics
// =============================================================================

/// Scheduler counters, persisted under `sync-stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatistics {
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_successful_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_attempts: u64,
    #[serde(default)]
    pub successful_syncs: u64,
    #[serde(default)]
    pub failed_syncs: u64,
    #[serde(default)]
    pub items_processed: u64,
    #[serde(default)]
    pub current_status: SyncStatus,
}

// =============================================================================
// Connection State
// =============================================================================

/// The coordinator's view of the two channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_cloud_reachable: bool,
    pub is_desktop_reachable: bool,
    pub last_cloud_check: Option<DateTime<Utc>>,
    pub last_desktop_check: Option<DateTime<Utc>>,
    /// True while a drain pass runs.
    pub queue_processing: bool,
    /// Method of the most recent successful delivery. Advisory only.
    pub preferred_method: Option<DeliveryMethod>,
}
