//! # Delivery Channel Contract
//!
//! Both channels are thin request/response wrappers: one POST per call, their
//! own timeout, no internal retry. Every failure comes back as an error the
//! coordinator treats as "channel unavailable".
//!
//! ```text
//!  send(&Transaction)
//!       │
//!       ├── 2xx + JSON ─────► Ok(ChannelResponse { success, delivered, queued, data })
//!       ├── non-2xx ────────► Err(SyncError::Rejected)
//!       ├── timeout ────────► Err(SyncError::Timeout)
//!       ├── bad body ───────► Err(SyncError::MalformedResponse)
//!       └── connect error ──► Err(SyncError::Http)
//! ```

use async_trait::async_trait;
use courier_core::Transaction;
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Header carrying the transaction `requestId` so backends can deduplicate.
pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

/// Parsed channel reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    #[serde(default)]
    pub success: bool,

    /// The backend applied the transaction.
    #[serde(default)]
    pub delivered: bool,

    /// The backend took custody and will deliver later.
    #[serde(default)]
    pub queued: bool,

    /// Full response body.
    #[serde(skip)]
    pub data: Option<serde_json::Value>,
}

impl ChannelResponse {
    /// Accepted outright, as the direct local channel reports any 2xx.
    pub fn accepted(data: serde_json::Value) -> Self {
        ChannelResponse {
            success: true,
            delivered: true,
            queued: false,
            data: Some(data),
        }
    }

    /// Interprets a relay body shaped `{ success, delivered?, queued? }`.
    pub fn from_body(data: serde_json::Value) -> SyncResult<Self> {
        let mut parsed: ChannelResponse =
            serde_json::from_value(data.clone()).map_err(|e| SyncError::MalformedResponse {
                channel: "cloud relay".to_string(),
                reason: e.to_string(),
            })?;
        parsed.data = Some(data);
        Ok(parsed)
    }
}

/// A delivery channel.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// False when the channel has nowhere to send to.
    fn is_configured(&self) -> bool {
        true
    }

    /// Sends the transaction once.
    async fn send(&self, transaction: &Transaction) -> SyncResult<ChannelResponse>;

    /// One bounded liveness probe.
    async fn health(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Where the channel currently sends, for status displays.
    fn target(&self) -> Option<String> {
        None
    }

    /// Channels that tag requests with the store id override this.
    fn set_store_id(&self, _store_id: &str) {}

    /// Points the channel at a new target, or clears it.
    fn set_target(&self, _target: Option<&str>) -> SyncResult<()> {
        Err(SyncError::InvalidConfig(format!(
            "{} does not accept a runtime target",
            self.name()
        )))
    }
}
