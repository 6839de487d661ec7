//! # Queue Items
//!
//! Durable wrapper around a [`Transaction`] that could not be delivered.
//!
//! ## Status State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │              attempt ok                                                 │
//! │   ┌─────────┐ ─────────────────────────────► ┌───────────┐             │
//! │   │ PENDING │                                 │ COMPLETED │ (terminal)  │
//! │   └─────────┘ ◄──┐                            └───────────┘             │
//! │     │    │       │ attempt failed,                                      │
//! │     │    └───────┘ attempts < max_retries                               │
//! │     │                                                                   │
//! │     │ attempt failed, attempts >= max_retries                           │
//! │     ▼                                                                   │
//! │   ┌────────┐   reset() (retry_failed)                                  │
//! │   │ FAILED │ ─────────────────────────────► PENDING, attempts = 0       │
//! │   └────────┘                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;

// =============================================================================
// Queue Status
// =============================================================================

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for the next drain pass.
    #[default]
    Pending,
    /// Delivered through one of the channels.
    Completed,
    /// Exhausted its retries; parked until `retry_failed`.
    Failed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Completed => write!(f, "completed"),
            QueueStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// A durable record of an undelivered transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Local identifier, distinct from `data.request_id`.
    pub id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub data: Transaction,
    pub attempts: u32,
    pub status: QueueStatus,
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Wraps a transaction as a fresh `pending` item with zero attempts.
    pub fn new(data: Transaction, now: DateTime<Utc>) -> Self {
        QueueItem {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            data,
            attempts: 0,
            status: QueueStatus::Pending,
            last_error: None,
        }
    }

    /// The idempotency key of the wrapped transaction.
    pub fn request_id(&self) -> &str {
        &self.data.request_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::Pending
    }

    /// Records a delivery attempt that succeeded.
    pub fn record_success(&mut self) -> CoreResult<()> {
        self.ensure_pending("record a delivery attempt")?;
        self.attempts += 1;
        self.status = QueueStatus::Completed;
        self.last_error = None;
        Ok(())
    }

    /// Records a delivery attempt that failed on every channel.
    ///
    /// The item moves to `failed` once `attempts` reaches `max_retries`.
    pub fn record_failure(&mut self, error: impl Into<String>, max_retries: u32) -> CoreResult<()> {
        self.ensure_pending("record a delivery attempt")?;
        self.attempts += 1;
        self.last_error = Some(error.into());
        if self.attempts >= max_retries {
            self.status = QueueStatus::Failed;
        }
        Ok(())
    }

    /// Puts a `failed` item back into rotation.
    pub fn reset(&mut self) -> CoreResult<()> {
        if self.status != QueueStatus::Failed {
            return Err(self.invalid("reset"));
        }
        self.status = QueueStatus::Pending;
        self.attempts = 0;
        self.last_error = None;
        Ok(())
    }

    fn ensure_pending(&self, operation: &str) -> CoreResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &str) -> CoreError {
        CoreError::InvalidQueueTransition {
            id: self.id.clone(),
            status: self.status.to_string(),
            operation: operation.to_string(),
        }
    }
}

// =============================================================================
// Queue Summary
// =============================================================================

/// Counts per status, used by health checks and the UI badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueSummary {
    pub fn from_items(items: &[QueueItem]) -> Self {
        items.iter().fold(
            QueueSummary {
                total: items.len(),
                ..Default::default()
            },
            |mut acc, item| {
                match item.status {
                    QueueStatus::Pending => acc.pending += 1,
                    QueueStatus::Completed => acc.completed += 1,
                    QueueStatus::Failed => acc.failed += 1,
                }
                acc
            },
        )
    }
}
