//! # Network Monitor
//!
//! The scheduler asks a [`NetworkMonitor`] before every drain whether the
//! device is online and what kind of link it is on.
//!
//! ```text
//!  performSync()
//!       │
//!       ▼
//!  monitor.current() ──► NetworkState { connected, kind }
//!       │
//!       ├── wifi_only && !kind.is_unmetered() ──► waiting_for_wifi
//!       ├── !connected                        ──► offline
//!       └── otherwise                         ──► drain queue
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Link type of the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    #[default]
    Wifi,
    Ethernet,
    Cellular,
    Unknown,
}

impl NetworkKind {
    /// Wi-Fi and wired links both satisfy the Wi-Fi-only policy.
    pub fn is_unmetered(&self) -> bool {
        matches!(self, NetworkKind::Wifi | NetworkKind::Ethernet)
    }
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkKind::Wifi => write!(f, "wifi"),
            NetworkKind::Ethernet => write!(f, "ethernet"),
            NetworkKind::Cellular => write!(f, "cellular"),
            NetworkKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for NetworkKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wifi" | "wi-fi" | "wlan" => Ok(NetworkKind::Wifi),
            "ethernet" | "wired" => Ok(NetworkKind::Ethernet),
            "cellular" | "mobile" => Ok(NetworkKind::Cellular),
            "unknown" => Ok(NetworkKind::Unknown),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown network kind: '{}'. Valid options: wifi, ethernet, cellular, unknown",
                other
            ))),
        }
    }
}

/// Snapshot of connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub connected: bool,
    pub kind: NetworkKind,
}

impl NetworkState {
    pub fn online(kind: NetworkKind) -> Self {
        NetworkState {
            connected: true,
            kind,
        }
    }

    pub fn offline() -> Self {
        NetworkState {
            connected: false,
            kind: NetworkKind::Unknown,
        }
    }
}

/// Source of connectivity information.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    async fn current(&self) -> NetworkState;
}

// =============================================================================
// Fixed monitor
// =============================================================================

/// Reports whatever it was last told. Used by tests and by deployments that
/// are always wired.
#[derive(Debug)]
pub struct FixedNetwork {
    state: RwLock<NetworkState>,
}

impl FixedNetwork {
    pub fn new(state: NetworkState) -> Self {
        FixedNetwork {
            state: RwLock::new(state),
        }
    }

    pub fn set(&self, state: NetworkState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }
}

#[async_trait]
impl NetworkMonitor for FixedNetwork {
    async fn current(&self) -> NetworkState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or_else(|_| NetworkState::offline())
    }
}

// =============================================================================
// Probe monitor
// =============================================================================

/// Decides connectivity by opening a TCP connection to the relay host.
pub struct ProbeNetworkMonitor {
    address: String,
    kind: NetworkKind,
    timeout: Duration,
}

impl ProbeNetworkMonitor {
    pub fn new(address: impl Into<String>, kind: NetworkKind, timeout: Duration) -> Self {
        ProbeNetworkMonitor {
            address: address.into(),
            kind,
            timeout,
        }
    }

    /// Probes the host and port of `relay_url`.
    pub fn for_url(relay_url: &str, kind: NetworkKind, timeout: Duration) -> SyncResult<Self> {
        let url = Url::parse(relay_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{} has no host", relay_url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidUrl(format!("{} has no port", relay_url)))?;

        Ok(Self::new(format!("{}:{}", host, port), kind, timeout))
    }
}

#[async_trait]
impl NetworkMonitor for ProbeNetworkMonitor {
    async fn current(&self) -> NetworkState {
        let connected = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        );
        debug!(address = %self.address, connected, "Network probe finished");

        // The link kind is declared, so it holds even when the relay is down
        NetworkState {
            connected,
            kind: self.kind,
        }
    }
}
