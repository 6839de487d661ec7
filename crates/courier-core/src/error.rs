//! # Error Types
//!
//! Domain-specific error types for courier-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  courier-core (this file)                                              │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Malformed transaction, rejected before I/O     │
//! │                                                                         │
//! │  courier-store                                                         │
//! │  └── StoreError       - Key-value / queue persistence failures         │
//! │                                                                         │
//! │  courier-sync                                                          │
//! │  └── SyncError        - Channel, config and scheduler failures         │
//! │                                                                         │
//! │  Flow: ValidationError → SyncError::Validation → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A queue item was asked to make a transition its status does not allow.
    ///
    /// ## When This Occurs
    /// - Recording an attempt on a `completed` item
    /// - Resetting an item that is not `failed`
    #[error("Queue item {id} is {status}, cannot {operation}")]
    InvalidQueueTransition {
        id: String,
        status: String,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Transaction validation errors.
///
/// Raised synchronously by `submit()` before any network call or queue write.
/// Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The transaction carries no line items.
    #[error("transaction must contain at least one item")]
    NoItems,

    /// A required item field is missing or blank.
    #[error("item {index}: {field} is required")]
    Required { index: usize, field: String },

    /// An item field must be strictly greater than zero.
    #[error("item {index}: {field} must be greater than zero")]
    MustBePositive { index: usize, field: String },

    /// An item field must not be negative.
    #[error("item {index}: {field} must not be negative")]
    Negative { index: usize, field: String },

    /// A field is present but unusable (NaN, infinite, malformed).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
