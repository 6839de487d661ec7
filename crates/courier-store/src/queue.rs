//! # Persistent Queue Store
//!
//! Undelivered transactions live as a single JSON array under the
//! `queue-store` key. Every mutation is a read-modify-write of the whole
//! array, serialized by one async mutex.
//!
//! ## Drain Interaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit() ── both channels down ──► enqueue(item)                      │
//! │                                          │                              │
//! │                                          ▼                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  queue-store: [ item-1 (pending), item-2 (failed), item-3 ... ] │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                          ▲                              │
//! │  drain pass:                             │                              │
//! │    1. pending()            snapshot, insertion order                   │
//! │    2. deliver item-1       (network, lock NOT held)                    │
//! │    3. update(item-1, ..)   RMW under lock, one item at a time          │
//! │    4. deliver item-3 ...                                               │
//! │                                                                         │
//! │  Updating per item keeps items enqueued mid-pass, and means a crash    │
//! │  mid-pass never resends an item already marked completed.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use courier_core::{CoreResult, QueueItem, QueueStatus, QueueSummary};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use crate::settings::keys;

/// Queue of undelivered transactions.
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        QueueStore {
            kv,
            lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Core operations
    // =========================================================================

    /// Appends an item.
    ///
    /// If a non-completed item already carries the same `request_id`, nothing
    /// is written and the existing item is returned instead.
    pub async fn enqueue(&self, item: QueueItem) -> StoreResult<QueueItem> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;

        if let Some(existing) = items
            .iter()
            .find(|i| i.request_id() == item.request_id() && i.status != QueueStatus::Completed)
        {
            info!(
                request_id = %item.request_id(),
                existing_id = %existing.id,
                "Transaction already queued, skipping duplicate"
            );
            return Ok(existing.clone());
        }

        debug!(id = %item.id, request_id = %item.request_id(), "Enqueuing item");
        items.push(item.clone());
        self.save(&items).await?;

        Ok(item)
    }

    /// Returns every item in insertion order.
    pub async fn list_all(&self) -> StoreResult<Vec<QueueItem>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Overwrites the whole queue.
    pub async fn replace_all(&self, items: Vec<QueueItem>) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.save(&items).await
    }

    /// Counts per status.
    pub async fn stats_summary(&self) -> StoreResult<QueueSummary> {
        let items = self.list_all().await?;
        Ok(QueueSummary::from_items(&items))
    }

    // =========================================================================
    // Drain helpers
    // =========================================================================

    /// Returns `pending` items in insertion order.
    pub async fn pending(&self) -> StoreResult<Vec<QueueItem>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(QueueItem::is_pending)
            .collect())
    }

    /// Applies `mutate` to the item with `id` and persists the result.
    pub async fn update<F>(&self, id: &str, mutate: F) -> StoreResult<QueueItem>
    where
        F: FnOnce(&mut QueueItem) -> CoreResult<()>,
    {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;

        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::not_found("QueueItem", id))?;
        mutate(item)?;
        let updated = item.clone();

        self.save(&items).await?;
        Ok(updated)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Removes `completed` items. Returns how many were removed.
    pub async fn clear_completed(&self) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;

        let before = items.len();
        items.retain(|i| i.status != QueueStatus::Completed);
        let removed = before - items.len();

        if removed > 0 {
            self.save(&items).await?;
            info!(removed, "Cleared completed queue items");
        }
        Ok(removed)
    }

    /// Moves every `failed` item back to `pending` with zero attempts.
    /// Returns how many were reset.
    pub async fn reset_failed(&self) -> StoreResult<usize> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;

        let mut reset = 0;
        for item in items.iter_mut().filter(|i| i.status == QueueStatus::Failed) {
            item.reset()?;
            reset += 1;
        }

        if reset > 0 {
            self.save(&items).await?;
            info!(reset, "Reset failed queue items");
        }
        Ok(reset)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    async fn load(&self) -> StoreResult<Vec<QueueItem>> {
        match self.kv.get(keys::QUEUE).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| StoreError::corrupt(keys::QUEUE, e))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, items: &[QueueItem]) -> StoreResult<()> {
        let raw = serde_json::to_string(items)?;
        self.kv.set(keys::QUEUE, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use chrono::Utc;
    use courier_core::{DraftItem, Transaction, TransactionDraft};

    fn store() -> (Arc<MemoryKvStore>, QueueStore) {
        let kv = Arc::new(MemoryKvStore::new());
        (kv.clone(), QueueStore::new(kv))
    }

    fn item(request_id: &str) -> QueueItem {
        let draft = TransactionDraft {
            request_id: Some(request_id.to_string()),
            items: vec![DraftItem::new("Rice 1kg", 2, 3.1)],
            ..Default::default()
        };
        QueueItem::new(Transaction::from_draft(draft, Vec::new(), Utc::now()), Utc::now())
    }

    #[tokio::test]
    async fn test_enqueue_and_list_in_order() {
        let (_, queue) = store();
        queue.enqueue(item("a")).await.unwrap();
        queue.enqueue(item("b")).await.unwrap();
        queue.enqueue(item("c")).await.unwrap();

        let ids: Vec<String> = queue
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|i| i.request_id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_by_request_id() {
        let (_, queue) = store();
        let first = queue.enqueue(item("same")).await.unwrap();
        let second = queue.enqueue(item("same")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(queue.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_request_id_can_be_queued_again() {
        let (_, queue) = store();
        let first = queue.enqueue(item("r1")).await.unwrap();
        queue.update(&first.id, |i| i.record_success()).await.unwrap();

        let second = queue.enqueue(item("r1")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(queue.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_summary() {
        let (_, queue) = store();
        let a = queue.enqueue(item("a")).await.unwrap();
        let b = queue.enqueue(item("b")).await.unwrap();
        queue.enqueue(item("c")).await.unwrap();

        queue.update(&a.id, |i| i.record_success()).await.unwrap();
        queue
            .update(&b.id, |i| i.record_failure("down", 1))
            .await
            .unwrap();

        let summary = queue.stats_summary().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.pending, 1);

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request_id(), "c");
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let (_, queue) = store();
        let err = queue.update("nope", |i| i.record_success()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_transition() {
        let (_, queue) = store();
        let a = queue.enqueue(item("a")).await.unwrap();
        queue.update(&a.id, |i| i.record_success()).await.unwrap();

        let err = queue.update(&a.id, |i| i.record_success()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_clear_completed_and_reset_failed() {
        let (_, queue) = store();
        let a = queue.enqueue(item("a")).await.unwrap();
        let b = queue.enqueue(item("b")).await.unwrap();
        queue.update(&a.id, |i| i.record_success()).await.unwrap();
        for _ in 0..3 {
            queue.update(&b.id, |i| i.record_failure("offline", 3)).await.unwrap();
        }

        assert_eq!(queue.clear_completed().await.unwrap(), 1);
        assert_eq!(queue.clear_completed().await.unwrap(), 0);

        assert_eq!(queue.reset_failed().await.unwrap(), 1);
        let items = queue.list_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, QueueStatus::Pending);
        assert_eq!(items[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_replace_all() {
        let (_, queue) = store();
        queue.enqueue(item("a")).await.unwrap();
        queue.replace_all(vec![item("x"), item("y")]).await.unwrap();

        let items = queue.list_all().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].request_id(), "x");
    }

    #[tokio::test]
    async fn test_corrupt_queue_is_reported() {
        let (kv, queue) = store();
        kv.set(keys::QUEUE, "{not json").await.unwrap();

        let err = queue.list_all().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_are_not_lost() {
        let (_, queue) = store();
        let queue = Arc::new(queue);

        let mut handles = Vec::new();
        for n in 0..20 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(item(&format!("req-{n}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(queue.list_all().await.unwrap().len(), 20);
    }
}
