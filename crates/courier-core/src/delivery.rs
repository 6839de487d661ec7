//! # Delivery Results
//!
//! What the collaborator gets back from `submit()`. Every successful
//! validation resolves to `success = true`; the `method` tag tells the UI how
//! to phrase its message.
//!
//! | Method | Meaning for the cashier |
//! |--------|-------------------------|
//! | `cloud_relay_delivered` | Desktop already has it |
//! | `cloud_relay_queued` | Cloud has custody, desktop will get it |
//! | `direct_local` | Sent straight to the desktop on the LAN |
//! | `local_queue` | Saved on this device, will retry |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Channel that took custody of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    CloudRelayDelivered,
    CloudRelayQueued,
    DirectLocal,
    LocalQueue,
}

impl DeliveryMethod {
    /// True when the transaction has left this device.
    pub fn is_remote(&self) -> bool {
        !matches!(self, DeliveryMethod::LocalQueue)
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMethod::CloudRelayDelivered => write!(f, "cloud_relay_delivered"),
            DeliveryMethod::CloudRelayQueued => write!(f, "cloud_relay_queued"),
            DeliveryMethod::DirectLocal => write!(f, "direct_local"),
            DeliveryMethod::LocalQueue => write!(f, "local_queue"),
        }
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub success: bool,
    pub method: DeliveryMethod,
    pub request_id: String,
    pub message: String,

    /// Set when the transaction was written to the local queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_item_id: Option<String>,

    /// Response body returned by the channel that accepted the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub data: Option<serde_json::Value>,

    /// Present when the engine could not guarantee durability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DeliveryResult {
    /// Builds a successful result with the default message for `method`.
    pub fn delivered(method: DeliveryMethod, request_id: impl Into<String>) -> Self {
        let message = match method {
            DeliveryMethod::CloudRelayDelivered => "Delivered to desktop via cloud relay",
            DeliveryMethod::CloudRelayQueued => {
                "Accepted by cloud relay; desktop will receive it when online"
            }
            DeliveryMethod::DirectLocal => "Delivered directly to desktop",
            DeliveryMethod::LocalQueue => "Saved on this device; will retry automatically",
        };

        DeliveryResult {
            success: true,
            method,
            request_id: request_id.into(),
            message: message.to_string(),
            queue_item_id: None,
            data: None,
            warning: None,
        }
    }

    pub fn with_data(mut self, data: Option<serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_queue_item(mut self, id: impl Into<String>) -> Self {
        self.queue_item_id = Some(id.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}
