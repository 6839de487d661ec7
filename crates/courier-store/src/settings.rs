//! # Settings Store
//!
//! Typed access to the small JSON values kept next to the queue.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// Logical key names. Changing any of these orphans data on devices in the field.
pub mod keys {
    /// JSON array of queue items.
    pub const QUEUE: &str = "queue-store";
    /// Desktop host or URL configured by the operator.
    pub const DESKTOP_URL: &str = "desktop-url-config";
    /// Store identifier attached to cloud relay requests.
    pub const STORE_ID: &str = "store-id";
    /// Scheduler configuration.
    pub const SYNC_CONFIG: &str = "sync-config";
    /// Scheduler counters.
    pub const SYNC_STATS: &str = "sync-stats";
}

/// Settings accessor over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        SettingsStore { kv }
    }

    // =========================================================================
    // Typed keys
    // =========================================================================

    pub async fn store_id(&self) -> StoreResult<Option<String>> {
        self.load_json(keys::STORE_ID).await
    }

    pub async fn set_store_id(&self, store_id: &str) -> StoreResult<()> {
        info!(store_id = %store_id, "Persisting store id");
        self.save_json(keys::STORE_ID, &store_id).await
    }

    pub async fn desktop_target(&self) -> StoreResult<Option<String>> {
        Ok(self
            .load_json::<String>(keys::DESKTOP_URL)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    /// Stores the desktop target, or removes it when `None`.
    pub async fn set_desktop_target(&self, target: Option<&str>) -> StoreResult<()> {
        match target {
            Some(t) => {
                info!(target = %t, "Persisting desktop target");
                self.save_json(keys::DESKTOP_URL, &t).await
            }
            None => {
                info!("Clearing desktop target");
                self.kv.remove(keys::DESKTOP_URL).await
            }
        }
    }

    // =========================================================================
    // Generic JSON access
    // =========================================================================

    /// Reads and decodes `key`. Undecodable values are reported, never reset.
    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::corrupt(key, e)),
            None => Ok(None),
        }
    }

    pub async fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        debug!(key = %key, "Saving setting");
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }
}
