//! # Engine Configuration
//!
//! Configuration management for the submission engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Key-value store (highest priority, applied at startup)             │
//! │     store-id, desktop-url-config, sync-config                          │
//! │     Written at runtime by set_store_id / set_desktop_target / configure│
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     COURIER_STORE_ID=store-042                                         │
//! │     COURIER_DESKTOP_HOST=192.168.1.20                                  │
//! │                                                                         │
//! │  3. TOML Config File                                                   │
//! │     ~/.config/courier-pos/courier.toml (Linux)                         │
//! │     ~/Library/Application Support/com.courier.pos/courier.toml (macOS) │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! id = "store-042"
//!
//! [cloud]
//! relay_url = "https://relay.example.com"
//! timeout_secs = 10
//!
//! [desktop]
//! host = "192.168.1.20"
//! port = 4000
//!
//! [scheduler]
//! sync_interval_secs = 120
//! wifi_only = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::direct_local::desktop_base_url;
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkKind;

const CONFIG_FILE: &str = "courier.toml";
const DATABASE_FILE: &str = "courier.db";

// =============================================================================
// Store
// =============================================================================

/// Identity of the store this device belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Sent as `storeId` on every cloud relay request.
    #[serde(default = "default_store_id")]
    pub id: String,
}

fn default_store_id() -> String {
    "default-store".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            id: default_store_id(),
        }
    }
}

// =============================================================================
// Cloud Relay
// =============================================================================

/// Cloud relay channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSettings {
    /// Base URL; the relay endpoint is `{relay_url}/relay/invoice`.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    #[serde(default = "default_cloud_timeout")]
    pub timeout_secs: u64,
}

fn default_relay_url() -> String {
    "http://localhost:8787".to_string()
}

fn default_cloud_timeout() -> u64 {
    10
}

impl Default for CloudSettings {
    fn default() -> Self {
        CloudSettings {
            relay_url: default_relay_url(),
            timeout_secs: default_cloud_timeout(),
        }
    }
}

// =============================================================================
// Desktop (direct local)
// =============================================================================

/// Direct local channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopSettings {
    /// Host name, IP, or full URL of the desktop server. Unset means the
    /// direct local channel is never attempted.
    #[serde(default)]
    pub host: Option<String>,

    /// Port used when `host` carries none.
    #[serde(default = "default_desktop_port")]
    pub port: u16,

    #[serde(default = "default_desktop_timeout")]
    pub timeout_secs: u64,

    /// Bound on a single health probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// How long a probe result is trusted.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_desktop_port() -> u16 {
    4000
}

fn default_desktop_timeout() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_cache_ttl() -> u64 {
    30
}

impl Default for DesktopSettings {
    fn default() -> Self {
        DesktopSettings {
            host: None,
            port: default_desktop_port(),
            timeout_secs: default_desktop_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

// =============================================================================
// Queue
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Failed drain attempts before an item is parked as `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    courier_core::DEFAULT_MAX_RETRIES
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            max_retries: default_max_retries(),
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Background scheduler settings.
///
/// The same shape is persisted under `sync-config` when changed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    #[serde(default = "default_sync_interval", alias = "sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default = "default_health_interval", alias = "health_interval_secs")]
    pub health_interval_secs: u64,

    /// Skip drains unless the device is on Wi-Fi.
    #[serde(default, alias = "wifi_only")]
    pub wifi_only: bool,

    /// Start the timers from `SyncScheduler::initialize`.
    #[serde(default = "default_true", alias = "auto_start")]
    pub auto_start: bool,
}

fn default_sync_interval() -> u64 {
    120
}

fn default_health_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            sync_interval_secs: default_sync_interval(),
            health_interval_secs: default_health_interval(),
            wifi_only: false,
            auto_start: true,
        }
    }
}

impl SchedulerSettings {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.sync_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync_interval_secs must be greater than 0".into(),
            ));
        }
        if self.health_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "health_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Network
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Link type reported by the monitor. The agent cannot observe the radio
    /// directly, so the operator declares it.
    #[serde(default)]
    pub kind: NetworkKind,

    /// Bound on the connectivity probe.
    #[serde(default = "default_network_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_network_probe_timeout() -> u64 {
    3
}

impl Default for NetworkSettings {
    fn default() -> Self {
        NetworkSettings {
            kind: NetworkKind::default(),
            probe_timeout_secs: default_network_probe_timeout(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub cloud: CloudSettings,

    #[serde(default)]
    pub desktop: DesktopSettings,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl CourierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (courier.toml)
    /// 3. Environment variables
    ///
    /// Runtime overrides from the key-value store are applied later by the
    /// coordinator and scheduler, once the store is open.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading courier config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load courier config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Courier config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.store.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("store.id must not be empty".into()));
        }

        let relay = url::Url::parse(&self.cloud.relay_url)?;
        if !matches!(relay.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Cloud relay URL must start with http:// or https://, got: {}",
                self.cloud.relay_url
            )));
        }

        if let Some(ref host) = self.desktop.host {
            desktop_base_url(host, self.desktop.port)?;
        }

        if self.cloud.timeout_secs == 0 || self.desktop.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "channel timeouts must be greater than 0".into(),
            ));
        }

        if self.queue.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "queue.max_retries must be greater than 0".into(),
            ));
        }

        self.scheduler.validate()
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("COURIER_STORE_ID") {
            debug!(store_id = %id, "Overriding store ID from environment");
            self.store.id = id;
        }

        if let Ok(url) = std::env::var("COURIER_CLOUD_URL") {
            debug!(url = %url, "Overriding cloud relay URL from environment");
            self.cloud.relay_url = url;
        }

        if let Ok(host) = std::env::var("COURIER_DESKTOP_HOST") {
            debug!(host = %host, "Overriding desktop host from environment");
            self.desktop.host = Some(host).filter(|h| !h.trim().is_empty());
        }

        if let Ok(path) = std::env::var("COURIER_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("COURIER_SYNC_INTERVAL") {
            match secs.parse::<u64>() {
                Ok(s) => self.scheduler.sync_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid COURIER_SYNC_INTERVAL"),
            }
        }

        if let Ok(flag) = std::env::var("COURIER_WIFI_ONLY") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.scheduler.wifi_only = true,
                "0" | "false" | "no" => self.scheduler.wifi_only = false,
                _ => warn!(value = %flag, "Ignoring invalid COURIER_WIFI_ONLY"),
            }
        }

        if let Ok(kind) = std::env::var("COURIER_NETWORK_KIND") {
            match kind.parse() {
                Ok(k) => self.network.kind = k,
                Err(e) => warn!(value = %kind, error = %e, "Ignoring invalid COURIER_NETWORK_KIND"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "courier", "pos")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Resolved database path: explicit setting, else the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE)))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn store_id(&self) -> &str {
        &self.store.id
    }

    pub fn desktop_host(&self) -> Option<&str> {
        self.desktop.host.as_deref()
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud.timeout_secs)
    }

    pub fn desktop_timeout(&self) -> Duration {
        Duration::from_secs(self.desktop.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.desktop.probe_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.desktop.cache_ttl_secs)
    }
}
