//! # courier-store: Persistence Layer for Courier POS
//!
//! Durable key-value storage for the offline-first submission engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Courier POS Storage                              │
//! │                                                                         │
//! │  SubmissionCoordinator / SyncScheduler                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   courier-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  QueueStore   │    │ SettingsStore │    │  Migrations  │  │   │
//! │  │   │  (queue.rs)   │    │ (settings.rs) │    │  (embedded)  │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           └──────────┬─────────┘                               │   │
//! │  │                      ▼                                          │   │
//! │  │           dyn KeyValueStore (kv.rs)                             │   │
//! │  │           ├── SqliteKvStore  (pool.rs, production)              │   │
//! │  │           └── MemoryKvStore  (tests, ephemeral runs)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  courier.db  (single kv_store table, WAL mode)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_store::{Database, DbConfig, QueueStore, SqliteKvStore};
//!
//! let db = Database::new(DbConfig::new("./courier.db")).await?;
//! let kv = Arc::new(SqliteKvStore::new(db.pool().clone()));
//! let queue = QueueStore::new(kv.clone());
//!
//! let summary = queue.stats_summary().await?;
//! ```

pub mod error;
pub mod kv;
pub mod migrations;
pub mod pool;
pub mod queue;
pub mod settings;

pub use error::{StoreError, StoreResult};
pub use kv::{KeyValueStore, MemoryKvStore, SqliteKvStore};
pub use pool::{Database, DbConfig};
pub use queue::QueueStore;
pub use settings::{keys, SettingsStore};
