//! # Submission Coordinator
//!
//! Entry point for finished transactions and the engine behind every drain
//! pass.
//!
//! ## Submission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit(draft)                                                          │
//! │    │                                                                    │
//! │    ├── validate_draft ── invalid ──► Err(Validation)   (no I/O at all) │
//! │    │                                                                    │
//! │    ├── prepare: normalize fields, item totals, inline page images      │
//! │    │                                                                    │
//! │    ├── CloudRelay.send                                                  │
//! │    │     ├── delivered ──────────────────► cloud_relay_delivered       │
//! │    │     ├── queued ─────────────────────► cloud_relay_queued (done,   │
//! │    │     │                                 cloud owns the retry)       │
//! │    │     └── error / neither ──┐                                        │
//! │    │                           ▼                                        │
//! │    ├── ReachabilityCache(Desktop)?                                      │
//! │    │     └── yes ── DirectLocal.send ── ok ──► direct_local             │
//! │    │                           │                                        │
//! │    │                           ▼ error / unreachable                    │
//! │    └── QueueStore.enqueue(pending, attempts=0) ──► local_queue         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drain Pass
//! A drain walks `pending` items in insertion order and sends each through
//! the same two channels. Only one pass runs at a time; a second caller gets
//! [`DrainOutcome::Skipped`] immediately.

use chrono::Utc;
use courier_core::validation::validate_draft;
use courier_core::{
    DeliveryMethod, DeliveryResult, QueueItem, QueueStatus, QueueSummary, Transaction,
    TransactionDraft,
};
use courier_store::{KeyValueStore, QueueStore, SettingsStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::channel::DeliveryChannel;
use crate::cloud_relay::CloudRelayClient;
use crate::config::CourierConfig;
use crate::direct_local::DirectLocalClient;
use crate::error::{SyncError, SyncResult};
use crate::images::{encode_images, FsImageSource, ImageSource};
use crate::reachability::{ReachabilityCache, Target};
use crate::status::ConnectionState;

// =============================================================================
// Drain results
// =============================================================================

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items a delivery was attempted for.
    pub attempted: usize,
    /// Items that reached `completed`.
    pub delivered: usize,
    /// Items that failed but stay `pending`.
    pub retained: usize,
    /// Items that reached `failed` on this pass.
    pub parked: usize,
}

/// Result of asking for a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another pass was already running.
    Skipped,
    Ran(DrainReport),
}

impl DrainOutcome {
    pub fn report(&self) -> Option<DrainReport> {
        match self {
            DrainOutcome::Skipped => None,
            DrainOutcome::Ran(report) => Some(*report),
        }
    }
}

/// Clears the processing flag when the pass ends, including on early return.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Validates, prepares and delivers transactions; drains the local queue.
pub struct SubmissionCoordinator {
    queue: Arc<QueueStore>,
    settings: SettingsStore,
    cloud: Arc<dyn DeliveryChannel>,
    local: Arc<dyn DeliveryChannel>,
    reachability: ReachabilityCache,
    images: Arc<dyn ImageSource>,
    max_retries: u32,
    queue_processing: AtomicBool,
    preferred_method: RwLock<Option<DeliveryMethod>>,
}

impl SubmissionCoordinator {
    pub fn builder(kv: Arc<dyn KeyValueStore>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(kv)
    }

    /// Builds real HTTP channels from `config`, letting persisted
    /// `store-id` and `desktop-url-config` values win over the file.
    pub async fn from_config(config: &CourierConfig, kv: Arc<dyn KeyValueStore>) -> SyncResult<Self> {
        let settings = SettingsStore::new(kv.clone());

        let store_id = settings
            .store_id()
            .await?
            .unwrap_or_else(|| config.store_id().to_string());
        let desktop_target = settings
            .desktop_target()
            .await?
            .or_else(|| config.desktop_host().map(str::to_string));

        info!(
            store_id = %store_id,
            relay = %config.cloud.relay_url,
            desktop = ?desktop_target,
            "Building submission coordinator"
        );

        let cloud = CloudRelayClient::new(&config.cloud.relay_url, store_id, config.cloud_timeout())?;
        let local = DirectLocalClient::new(
            desktop_target.as_deref(),
            config.desktop.port,
            config.desktop_timeout(),
            config.probe_timeout(),
        )?;

        Self::builder(kv)
            .cloud(Arc::new(cloud))
            .local(Arc::new(local))
            .max_retries(config.queue.max_retries)
            .cache_ttl(config.cache_ttl())
            .probe_timeout(config.probe_timeout())
            .build()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Delivers a transaction, or queues it locally.
    ///
    /// Only validation failures are returned as errors. Every valid
    /// transaction resolves to `success = true` with a method tag.
    pub async fn submit(&self, draft: TransactionDraft) -> SyncResult<DeliveryResult> {
        validate_draft(&draft)?;

        let transaction = self.prepare(draft).await;
        let request_id = transaction.request_id.clone();
        info!(
            request_id = %request_id,
            items = transaction.items.len(),
            pages = transaction.metadata.page_count,
            "Submitting transaction"
        );

        let last_error = match self.deliver(&transaction).await {
            Ok((method, data)) => {
                info!(request_id = %request_id, method = %method, "Transaction delivered");
                return Ok(DeliveryResult::delivered(method, request_id).with_data(data));
            }
            Err(e) => e,
        };

        debug!(request_id = %request_id, error = %last_error, "All channels unavailable, queuing");
        let result = DeliveryResult::delivered(DeliveryMethod::LocalQueue, request_id.clone());

        match self.queue.enqueue(QueueItem::new(transaction, Utc::now())).await {
            Ok(item) => {
                info!(request_id = %request_id, item_id = %item.id, "Transaction queued locally");
                Ok(result.with_queue_item(item.id))
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Failed to persist queued transaction");
                Ok(result.with_warning(format!("Transaction could not be saved on this device: {}", e)))
            }
        }
    }

    async fn prepare(&self, draft: TransactionDraft) -> Transaction {
        let images = encode_images(self.images.as_ref(), &draft.images).await;
        Transaction::from_draft(draft, images, Utc::now())
    }

    /// One attempt through cloud, then desktop.
    async fn deliver(
        &self,
        transaction: &Transaction,
    ) -> SyncResult<(DeliveryMethod, Option<serde_json::Value>)> {
        let request_id = &transaction.request_id;

        let cloud_error = match self.cloud.send(transaction).await {
            Ok(response) => {
                self.reachability.record(Target::Cloud, true).await;
                if response.success && response.delivered {
                    self.set_preferred(DeliveryMethod::CloudRelayDelivered).await;
                    return Ok((DeliveryMethod::CloudRelayDelivered, response.data));
                }
                if response.success && response.queued {
                    self.set_preferred(DeliveryMethod::CloudRelayQueued).await;
                    return Ok((DeliveryMethod::CloudRelayQueued, response.data));
                }
                SyncError::MalformedResponse {
                    channel: self.cloud.name().to_string(),
                    reason: "relay neither delivered nor queued the transaction".into(),
                }
            }
            Err(e) => {
                self.reachability.record(Target::Cloud, false).await;
                e
            }
        };
        warn!(request_id = %request_id, error = %cloud_error, "Cloud relay unavailable");

        if !self.reachability.is_reachable(Target::Desktop).await {
            debug!(request_id = %request_id, "Desktop not reachable, skipping direct local");
            return Err(cloud_error);
        }

        match self.local.send(transaction).await {
            Ok(response) => {
                self.reachability.record(Target::Desktop, true).await;
                self.set_preferred(DeliveryMethod::DirectLocal).await;
                Ok((DeliveryMethod::DirectLocal, response.data))
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Direct local delivery failed");
                self.reachability.record(Target::Desktop, false).await;
                Err(e)
            }
        }
    }

    async fn set_preferred(&self, method: DeliveryMethod) {
        *self.preferred_method.write().await = Some(method);
    }

    // =========================================================================
    // Queue drain
    // =========================================================================

    /// Retries every `pending` item once.
    pub async fn drain_queue(&self) -> SyncResult<DrainOutcome> {
        let Some(_guard) = ProcessingGuard::acquire(&self.queue_processing) else {
            debug!("Drain already in progress, skipping");
            return Ok(DrainOutcome::Skipped);
        };

        let pending = self.queue.pending().await?;
        let mut report = DrainReport::default();
        if pending.is_empty() {
            return Ok(DrainOutcome::Ran(report));
        }

        info!(count = pending.len(), "Draining local queue");

        for item in pending {
            report.attempted += 1;

            match self.deliver(&item.data).await {
                Ok((method, _)) => {
                    if self.apply(&item.id, |i| i.record_success()).await?.is_some() {
                        report.delivered += 1;
                        info!(item_id = %item.id, request_id = %item.request_id(), method = %method, "Queued transaction delivered");
                    }
                }
                Err(e) => {
                    let reason = e.to_string();
                    let max_retries = self.max_retries;
                    let updated = self
                        .apply(&item.id, |i| i.record_failure(reason, max_retries))
                        .await?;

                    match updated {
                        Some(i) if i.status == QueueStatus::Failed => {
                            report.parked += 1;
                            warn!(item_id = %i.id, attempts = i.attempts, "Queued transaction exhausted its retries");
                        }
                        Some(i) => {
                            report.retained += 1;
                            debug!(item_id = %i.id, attempts = i.attempts, "Queued transaction will be retried");
                        }
                        None => {}
                    }
                }
            }
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            retained = report.retained,
            parked = report.parked,
            "Drain pass finished"
        );
        Ok(DrainOutcome::Ran(report))
    }

    /// Updates one item; an item that vanished or changed status under us is skipped.
    async fn apply<F>(&self, id: &str, mutate: F) -> SyncResult<Option<QueueItem>>
    where
        F: FnOnce(&mut QueueItem) -> courier_core::CoreResult<()>,
    {
        match self.queue.update(id, mutate).await {
            Ok(item) => Ok(Some(item)),
            Err(e @ (StoreError::NotFound { .. } | StoreError::InvalidTransition(_))) => {
                warn!(item_id = %id, error = %e, "Queue item changed during drain, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Queue maintenance
    // =========================================================================

    /// Resets `failed` items to `pending` and immediately runs one pass.
    pub async fn retry_failed(&self) -> SyncResult<(usize, DrainOutcome)> {
        let reset = self.queue.reset_failed().await?;
        info!(reset, "Retrying failed transactions");
        let outcome = self.drain_queue().await?;
        Ok((reset, outcome))
    }

    pub async fn clear_completed(&self) -> SyncResult<usize> {
        Ok(self.queue.clear_completed().await?)
    }

    pub async fn queue_summary(&self) -> SyncResult<QueueSummary> {
        Ok(self.queue.stats_summary().await?)
    }

    pub async fn queue_items(&self) -> SyncResult<Vec<QueueItem>> {
        Ok(self.queue.list_all().await?)
    }

    // =========================================================================
    // Targets and identity
    // =========================================================================

    /// Points the direct local channel at `target` and persists it.
    pub async fn set_desktop_target(&self, target: &str) -> SyncResult<()> {
        let target = target.trim();
        self.local.set_target(Some(target))?;
        self.settings.set_desktop_target(Some(target)).await?;
        self.reachability.invalidate(Target::Desktop).await;
        Ok(())
    }

    pub async fn clear_desktop_target(&self) -> SyncResult<()> {
        self.local.set_target(None)?;
        self.settings.set_desktop_target(None).await?;
        self.reachability.invalidate(Target::Desktop).await;
        Ok(())
    }

    pub async fn set_store_id(&self, store_id: &str) -> SyncResult<()> {
        let store_id = store_id.trim();
        if store_id.is_empty() {
            return Err(SyncError::InvalidConfig("store id must not be empty".into()));
        }
        self.settings.set_store_id(store_id).await?;
        self.cloud.set_store_id(store_id);
        Ok(())
    }

    pub fn desktop_target(&self) -> Option<String> {
        self.local.target()
    }

    pub fn is_desktop_configured(&self) -> bool {
        self.local.is_configured()
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Cached desktop reachability, checked again on a miss.
    pub async fn is_desktop_reachable(&self) -> bool {
        self.reachability.is_reachable(Target::Desktop).await
    }

    /// Forces a desktop probe.
    pub async fn refresh_desktop(&self) -> bool {
        self.reachability.refresh(Target::Desktop).await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        ConnectionState {
            is_cloud_reachable: self.reachability.peek(Target::Cloud).await,
            is_desktop_reachable: self.reachability.peek(Target::Desktop).await,
            last_cloud_check: self.reachability.last_checked(Target::Cloud).await,
            last_desktop_check: self.reachability.last_checked(Target::Desktop).await,
            queue_processing: self.queue_processing.load(Ordering::Acquire),
            preferred_method: *self.preferred_method.read().await,
        }
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SubmissionCoordinator`].
pub struct CoordinatorBuilder {
    kv: Arc<dyn KeyValueStore>,
    cloud: Option<Arc<dyn DeliveryChannel>>,
    local: Option<Arc<dyn DeliveryChannel>>,
    images: Arc<dyn ImageSource>,
    max_retries: u32,
    cache_ttl: Duration,
    probe_timeout: Duration,
}

impl CoordinatorBuilder {
    fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        CoordinatorBuilder {
            kv,
            cloud: None,
            local: None,
            images: Arc::new(FsImageSource),
            max_retries: courier_core::DEFAULT_MAX_RETRIES,
            cache_ttl: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
        }
    }

    pub fn cloud(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.cloud = Some(channel);
        self
    }

    pub fn local(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.local = Some(channel);
        self
    }

    pub fn images(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.images = source;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn build(self) -> SyncResult<SubmissionCoordinator> {
        let cloud = self
            .cloud
            .ok_or_else(|| SyncError::InvalidConfig("cloud channel not set".into()))?;
        let local = self
            .local
            .ok_or_else(|| SyncError::InvalidConfig("local channel not set".into()))?;
        if self.max_retries == 0 {
            return Err(SyncError::InvalidConfig("max_retries must be greater than 0".into()));
        }

        Ok(SubmissionCoordinator {
            queue: Arc::new(QueueStore::new(self.kv.clone())),
            settings: SettingsStore::new(self.kv),
            reachability: ReachabilityCache::new(local.clone(), self.cache_ttl, self.probe_timeout),
            cloud,
            local,
            images: self.images,
            max_retries: self.max_retries,
            queue_processing: AtomicBool::new(false),
            preferred_method: RwLock::new(None),
        })
    }
}
