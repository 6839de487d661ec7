//! # Sync Error Types
//!
//! Error types for submission, delivery and scheduling.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Validation     │  │  Channel        │  │  Storage                │ │
//! │  │                 │  │  unavailable    │  │                         │ │
//! │  │  Validation     │  │  Http           │  │  Storage                │ │
//! │  │  (fail fast,    │  │  Timeout        │  │  (scheduler: sync_error │ │
//! │  │   never retry)  │  │  Rejected       │  │   submit: best effort)  │ │
//! │  │                 │  │  MalformedResp  │  │                         │ │
//! │  │                 │  │  NotConfigured  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Configuration  │  │  Images         │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidConfig  │  │  ImageUnreadable│  (per page, becomes a null   │
//! │  │  InvalidUrl     │  │                 │   slot; never aborts)        │
//! │  │  ConfigLoad/Save│  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use courier_core::ValidationError;
use courier_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all submission and scheduling failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Validation
    // =========================================================================
    /// The transaction was rejected before any I/O.
    #[error("Invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL or host.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Channel Errors
    // =========================================================================
    /// Transport-level HTTP failure (connect refused, DNS, reset).
    #[error("{channel} request failed: {reason}")]
    Http { channel: String, reason: String },

    /// The channel did not answer within its timeout.
    #[error("{channel} timed out after {secs}s")]
    Timeout { channel: String, secs: u64 },

    /// Non-2xx response.
    #[error("{channel} rejected the request with HTTP {status}")]
    Rejected { channel: String, status: u16 },

    /// 2xx response whose body could not be understood.
    #[error("{channel} returned a malformed response: {reason}")]
    MalformedResponse { channel: String, reason: String },

    /// The channel has no target to send to.
    #[error("{0} has no target configured")]
    NotConfigured(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Queue or settings persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    // =========================================================================
    // Image Errors
    // =========================================================================
    /// A page image could not be read or decoded.
    #[error("Image '{uri}' could not be read: {reason}")]
    ImageUnreadable { uri: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Serialization failure outside the channels.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Maps a reqwest error raised by `channel`.
    pub fn from_reqwest(channel: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout {
                channel: channel.to_string(),
                secs: timeout_secs,
            }
        } else if err.is_decode() {
            SyncError::MalformedResponse {
                channel: channel.to_string(),
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            SyncError::Rejected {
                channel: channel.to_string(),
                status: status.as_u16(),
            }
        } else {
            SyncError::Http {
                channel: channel.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True for failures that mean "try the next channel".
    pub fn is_channel_unavailable(&self) -> bool {
        matches!(
            self,
            SyncError::Http { .. }
                | SyncError::Timeout { .. }
                | SyncError::Rejected { .. }
                | SyncError::MalformedResponse { .. }
                | SyncError::NotConfigured(_)
        )
    }

    /// True when the caller handed in a malformed transaction.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// True for persistence failures.
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
