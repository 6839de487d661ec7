//! # courier-core: Pure Domain Types for Courier POS
//!
//! This crate holds the payloads that flow through the offline-first
//! submission engine. Everything here is deterministic and free of I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Courier POS Data Flow                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Companion UI (camera, OCR, price edits)                │   │
//! │  │                 produces a TransactionDraft                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ courier-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐    │   │
//! │  │   │ transaction │  │    queue    │  │      delivery       │    │   │
//! │  │   │ Draft →     │  │  QueueItem  │  │  DeliveryMethod     │    │   │
//! │  │   │ Transaction │  │  QueueStatus│  │  DeliveryResult     │    │   │
//! │  │   └─────────────┘  └─────────────┘  └─────────────────────┘    │   │
//! │  │   ┌─────────────┐                                              │   │
//! │  │   │ validation  │   NO I/O • NO NETWORK • NO STORAGE           │   │
//! │  │   └─────────────┘                                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      courier-store (queue persistence) / courier-sync (I/O)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transaction`] - `TransactionDraft` (collaborator input) and `Transaction` (wire payload)
//! - [`queue`] - `QueueItem` and its status state machine
//! - [`delivery`] - `DeliveryMethod` and `DeliveryResult`
//! - [`validation`] - Pre-flight checks run before any I/O
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use courier_core::{DraftItem, Transaction, TransactionDraft};
//!
//! let draft = TransactionDraft {
//!     items: vec![DraftItem::new("Cola 330ml", 2, 1.5)],
//!     ..Default::default()
//! };
//!
//! courier_core::validation::validate_draft(&draft).unwrap();
//!
//! let tx = Transaction::from_draft(draft, Vec::new(), Utc::now());
//! assert_eq!(tx.items[0].total, 3.0);
//! assert!(!tx.request_id.is_empty());
//! ```

pub mod delivery;
pub mod error;
pub mod queue;
pub mod transaction;
pub mod validation;

pub use delivery::{DeliveryMethod, DeliveryResult};
pub use error::{CoreError, CoreResult, ValidationError};
pub use queue::{QueueItem, QueueStatus, QueueSummary};
pub use transaction::{
    DraftItem, ImageRef, InvoiceImage, LineItem, Transaction, TransactionDraft,
    TransactionMetadata,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Delivery attempts before a queue item is parked as `failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Vendor used when the collaborator does not supply one.
pub const DEFAULT_VENDOR: &str = "Unknown Vendor";

/// Provenance tag written into `metadata.source` when none is supplied.
pub const DEFAULT_SOURCE: &str = "courier_mobile";
