//! # Reachability Cache
//!
//! TTL-cached answers to "is this target worth trying right now?".
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_reachable(Desktop)                                                  │
//! │       │                                                                 │
//! │       ├── no target configured ─────────────────► false (no I/O)       │
//! │       ├── entry younger than TTL ───────────────► cached value (no I/O)│
//! │       └── miss ──► one health probe, bounded by probe_timeout          │
//! │                         │                                               │
//! │                         └──► entry updated whatever the outcome        │
//! │                                                                         │
//! │  is_reachable(Cloud)                                                    │
//! │       ├── recent failed send within TTL ────────► false                │
//! │       └── otherwise ────────────────────────────► true (assumed)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the probe-driven desktop entry gates delivery. The cloud entry is
//! advisory and feeds the connection snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::channel::DeliveryChannel;

/// Class of delivery target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Cloud,
    Desktop,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Cloud => write!(f, "cloud"),
            Target::Desktop => write!(f, "desktop"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    reachable: bool,
    checked_at: Instant,
    checked_wall: DateTime<Utc>,
}

/// Per-target reachability with a shared TTL.
pub struct ReachabilityCache {
    desktop: Arc<dyn DeliveryChannel>,
    ttl: Duration,
    probe_timeout: Duration,
    entries: Mutex<HashMap<Target, Entry>>,
}

impl ReachabilityCache {
    pub fn new(desktop: Arc<dyn DeliveryChannel>, ttl: Duration, probe_timeout: Duration) -> Self {
        ReachabilityCache {
            desktop,
            ttl,
            probe_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Answers from the cache, probing the desktop at most once on a miss.
    pub async fn is_reachable(&self, target: Target) -> bool {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(&target) {
            if entry.checked_at.elapsed() < self.ttl {
                return entry.reachable;
            }
        }

        match target {
            Target::Cloud => true,
            Target::Desktop => {
                let reachable = self.probe_desktop().await;
                entries.insert(target, Self::entry(reachable));
                reachable
            }
        }
    }

    /// Bypasses the TTL. Used by the scheduler health check.
    pub async fn refresh(&self, target: Target) -> bool {
        let mut entries = self.entries.lock().await;
        match target {
            Target::Cloud => {
                entries.remove(&Target::Cloud);
                true
            }
            Target::Desktop => {
                let reachable = self.probe_desktop().await;
                entries.insert(target, Self::entry(reachable));
                reachable
            }
        }
    }

    /// Records what a real send just proved.
    pub async fn record(&self, target: Target, reachable: bool) {
        self.entries
            .lock()
            .await
            .insert(target, Self::entry(reachable));
    }

    /// Forgets the entry for `target`.
    pub async fn invalidate(&self, target: Target) {
        self.entries.lock().await.remove(&target);
    }

    /// Wall-clock time of the last check, if any.
    pub async fn last_checked(&self, target: Target) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .await
            .get(&target)
            .map(|e| e.checked_wall)
    }

    /// Last known value without probing. Cloud defaults to reachable.
    pub async fn peek(&self, target: Target) -> bool {
        match self.entries.lock().await.get(&target) {
            Some(entry) => entry.reachable,
            None => target == Target::Cloud,
        }
    }

    async fn probe_desktop(&self) -> bool {
        if !self.desktop.is_configured() {
            return false;
        }

        let reachable = matches!(
            tokio::time::timeout(self.probe_timeout, self.desktop.health()).await,
            Ok(Ok(()))
        );
        debug!(reachable, "Desktop health probe finished");
        reachable
    }

    fn entry(reachable: bool) -> Entry {
        Entry {
            reachable,
            checked_at: Instant::now(),
            checked_wall: Utc::now(),
        }
    }
}
