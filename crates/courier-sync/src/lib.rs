//! # courier-sync: Submission & Synchronization Engine for Courier POS
//!
//! Gets every finished transaction to the back office, whatever the state
//! of the network.
//!
//! ## Delivery Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Courier POS Delivery Layer                         │
//! │                                                                         │
//! │   TransactionDraft                                                      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌───────────────────────┐      1. POST /relay/invoice                  │
//! │  │ SubmissionCoordinator │ ───────────────────────────► Cloud Relay     │
//! │  │                       │      2. POST /invoices/finalize              │
//! │  │  validate • prepare   │ ───────────────────────────► Desktop :4000   │
//! │  │  fall through         │      3. enqueue                              │
//! │  │                       │ ───────────────────────────► QueueStore      │
//! │  └───────────▲───────────┘                                (SQLite kv)   │
//! │              │ drain_queue()                                            │
//! │  ┌───────────┴───────────┐                                              │
//! │  │    SyncScheduler      │  sync timer (120s) • health timer (60s)      │
//! │  │  stats • SyncEvent    │  network policy (wifi_only)                  │
//! │  └───────────────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`] - `submit()`, the drain pass, queue maintenance, targets
//! - [`scheduler`] - Timers, network policy, statistics, events
//! - [`channel`] - The `DeliveryChannel` contract
//! - [`cloud_relay`] / [`direct_local`] - reqwest channel implementations
//! - [`reachability`] - TTL cache in front of the desktop health probe
//! - [`images`] - Resolving image URIs into inline base64 pages
//! - [`network`] - Connectivity monitors
//! - [`config`] - TOML + environment configuration
//! - [`events`] / [`status`] - Observer stream and snapshots
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_sync::{CourierConfig, SubmissionCoordinator, SyncScheduler};
//!
//! let config = CourierConfig::load_or_default(None);
//! let coordinator = Arc::new(SubmissionCoordinator::from_config(&config, kv).await?);
//!
//! let result = coordinator.submit(draft).await?;
//! println!("{} via {}", result.request_id, result.method);
//!
//! let scheduler = SyncScheduler::new(coordinator, network, config.scheduler);
//! scheduler.initialize().await?;
//! ```

pub mod channel;
pub mod cloud_relay;
pub mod config;
pub mod coordinator;
pub mod direct_local;
pub mod error;
pub mod events;
pub mod images;
pub mod network;
pub mod reachability;
pub mod scheduler;
pub mod status;

// =============================================================================
// Re-exports
// =============================================================================

pub use channel::{ChannelResponse, DeliveryChannel};
pub use cloud_relay::CloudRelayClient;
pub use config::{CourierConfig, SchedulerSettings};
pub use coordinator::{CoordinatorBuilder, DrainOutcome, DrainReport, SubmissionCoordinator};
pub use direct_local::DirectLocalClient;
pub use error::{SyncError, SyncResult};
pub use events::{
    BroadcastEmitter, HealthSnapshot, NoOpEmitter, SyncEvent, SyncEventEmitter, TracingEmitter,
};
pub use images::{FsImageSource, ImageSource};
pub use network::{FixedNetwork, NetworkKind, NetworkMonitor, NetworkState, ProbeNetworkMonitor};
pub use reachability::{ReachabilityCache, Target};
pub use scheduler::SyncScheduler;
pub use status::{ConnectionState, SyncStatistics, SyncStatus};
