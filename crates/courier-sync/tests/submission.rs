//! End-to-end submission and drain scenarios against mock HTTP backends.

use async_trait::async_trait;
use courier_core::{DeliveryMethod, DraftItem, QueueStatus, TransactionDraft};
use courier_store::{KeyValueStore, MemoryKvStore, StoreError, StoreResult};
use courier_sync::{
    CloudRelayClient, DirectLocalClient, DrainOutcome, FixedNetwork, NetworkKind, NetworkState,
    ProbeNetworkMonitor, SchedulerSettings, SubmissionCoordinator, SyncEvent, SyncScheduler,
    SyncStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn draft(request_id: &str) -> TransactionDraft {
    TransactionDraft {
        request_id: Some(request_id.into()),
        vendor: Some("Metro Wholesale".into()),
        items: vec![
            DraftItem::new("Rice 5kg", 2, 12.5).with_barcode("8901"),
            DraftItem::new("Sugar 1kg", 3, 1.2),
        ],
        ..Default::default()
    }
}

async fn cloud_down(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/relay/invoice"))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

async fn cloud_delivers(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/relay/invoice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "delivered": true })))
        .mount(server)
        .await;
}

fn coordinator(
    kv: Arc<dyn KeyValueStore>,
    cloud: &MockServer,
    desktop: Option<&MockServer>,
) -> SubmissionCoordinator {
    let desktop_uri = desktop.map(|d| d.uri());
    SubmissionCoordinator::builder(kv)
        .cloud(Arc::new(
            CloudRelayClient::new(&cloud.uri(), "store-042", TIMEOUT).unwrap(),
        ))
        .local(Arc::new(
            DirectLocalClient::new(desktop_uri.as_deref(), 4000, TIMEOUT, TIMEOUT).unwrap(),
        ))
        .build()
        .unwrap()
}

// =============================================================================
// Submission scenarios
// =============================================================================

#[tokio::test]
async fn scenario_a_cloud_delivers() {
    let cloud = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay/invoice"))
        .and(header("idempotency-key", "req-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "delivered": true })))
        .expect(1)
        .mount(&cloud)
        .await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, None);
    let result = coordinator.submit(draft("req-a")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, DeliveryMethod::CloudRelayDelivered);
    assert_eq!(result.request_id, "req-a");
    assert_eq!(coordinator.queue_summary().await.unwrap().total, 0);
}

#[tokio::test]
async fn scenario_b_cloud_down_desktop_accepts() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let desktop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&desktop)
        .await;
    Mock::given(method("POST"))
        .and(path("/invoices/finalize"))
        .and(header("idempotency-key", "req-b"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "invoiceId": 77 })))
        .expect(1)
        .mount(&desktop)
        .await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, Some(&desktop));
    let result = coordinator.submit(draft("req-b")).await.unwrap();

    assert_eq!(result.method, DeliveryMethod::DirectLocal);
    assert_eq!(result.data, Some(json!({ "invoiceId": 77 })));
    assert_eq!(coordinator.queue_summary().await.unwrap().total, 0);

    let state = coordinator.connection_state().await;
    assert!(!state.is_cloud_reachable);
    assert!(state.is_desktop_reachable);
    assert_eq!(state.preferred_method, Some(DeliveryMethod::DirectLocal));
}

#[tokio::test]
async fn scenario_c_no_desktop_queues_locally() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, None);
    let result = coordinator.submit(draft("req-c")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, DeliveryMethod::LocalQueue);
    assert!(result.warning.is_none());

    let items = coordinator.queue_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(result.queue_item_id.as_deref(), Some(items[0].id.as_str()));
    assert_eq!(items[0].status, QueueStatus::Pending);
    assert_eq!(items[0].attempts, 0);
    assert_eq!(items[0].data.request_id, "req-c");
}

#[tokio::test]
async fn unreachable_desktop_is_not_posted_to() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let desktop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&desktop)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&desktop)
        .await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, Some(&desktop));
    let result = coordinator.submit(draft("req-unhealthy")).await.unwrap();
    assert_eq!(result.method, DeliveryMethod::LocalQueue);
}

#[tokio::test]
async fn scenario_d_and_e_retries_park_then_retry_failed_drains() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, None);
    coordinator.submit(draft("req-d")).await.unwrap();

    for pass in 1..=3 {
        let report = coordinator.drain_queue().await.unwrap().report().unwrap();
        assert_eq!(report.attempted, 1, "pass {}", pass);
    }

    let item = &coordinator.queue_items().await.unwrap()[0];
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.attempts, 3);
    assert!(item.last_error.is_some());

    // Parked items are excluded from later passes
    let report = coordinator.drain_queue().await.unwrap().report().unwrap();
    assert_eq!(report.attempted, 0);

    // Still down: reset to attempts=0, then exactly one pass runs
    let (reset, outcome) = coordinator.retry_failed().await.unwrap();
    assert_eq!(reset, 1);
    assert_eq!(outcome.report().unwrap().attempted, 1);
    let item = &coordinator.queue_items().await.unwrap()[0];
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.attempts, 1);

    for _ in 0..2 {
        coordinator.drain_queue().await.unwrap();
    }
    assert_eq!(coordinator.queue_summary().await.unwrap().failed, 1);

    // Cloud recovers: the retry pass delivers it
    cloud.reset().await;
    cloud_delivers(&cloud).await;

    let (reset, outcome) = coordinator.retry_failed().await.unwrap();
    assert_eq!(reset, 1);
    assert_eq!(outcome.report().unwrap().delivered, 1);

    let summary = coordinator.queue_summary().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(coordinator.clear_completed().await.unwrap(), 1);
    assert_eq!(coordinator.queue_summary().await.unwrap().total, 0);
}

// =============================================================================
// Validation, idempotence, storage failure
// =============================================================================

#[tokio::test]
async fn invalid_drafts_fail_without_io_or_queue_writes() {
    let cloud = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cloud)
        .await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, None);

    let empty = TransactionDraft::default();
    let zero_qty = TransactionDraft {
        items: vec![DraftItem::new("Tea", 0, 2.0)],
        ..Default::default()
    };
    let negative_price = TransactionDraft {
        items: vec![DraftItem::new("Tea", 1, -2.0)],
        ..Default::default()
    };

    for bad in [empty, zero_qty, negative_price] {
        let err = coordinator.submit(bad).await.unwrap_err();
        assert!(err.is_validation());
    }
    assert_eq!(coordinator.queue_summary().await.unwrap().total, 0);
}

#[tokio::test]
async fn drain_delivers_each_request_id_once() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let coordinator = coordinator(Arc::new(MemoryKvStore::new()), &cloud, None);
    coordinator.submit(draft("req-idem")).await.unwrap();
    // Same requestId again while offline does not create a second item
    coordinator.submit(draft("req-idem")).await.unwrap();
    assert_eq!(coordinator.queue_summary().await.unwrap().pending, 1);

    cloud.reset().await;
    Mock::given(method("POST"))
        .and(path("/relay/invoice"))
        .and(header("idempotency-key", "req-idem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "delivered": true })))
        .expect(1)
        .mount(&cloud)
        .await;

    let first = coordinator.drain_queue().await.unwrap();
    let second = coordinator.drain_queue().await.unwrap();

    assert_eq!(first.report().unwrap().delivered, 1);
    assert_eq!(second.report().unwrap().attempted, 0);
}

#[tokio::test]
async fn concurrent_drains_run_one_pass() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let kv = Arc::new(MemoryKvStore::new());
    let coordinator = Arc::new(coordinator(kv, &cloud, None));
    coordinator.submit(draft("req-conc")).await.unwrap();

    cloud.reset().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "delivered": true }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&cloud)
        .await;

    let (a, b) = tokio::join!(coordinator.drain_queue(), coordinator.drain_queue());
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| **o == DrainOutcome::Skipped).count(), 1);
    assert_eq!(coordinator.queue_summary().await.unwrap().completed, 1);
}

struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::QueryFailed("disk full".into()))
    }

    async fn remove(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn storage_failure_still_resolves_with_warning() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let coordinator = coordinator(Arc::new(BrokenStore), &cloud, None);
    let result = coordinator.submit(draft("req-disk")).await.unwrap();

    assert!(result.success);
    assert_eq!(result.method, DeliveryMethod::LocalQueue);
    assert!(result.queue_item_id.is_none());
    assert!(result.warning.unwrap().contains("disk full"));
}

// =============================================================================
// Scheduler
// =============================================================================

#[tokio::test]
async fn forced_sync_drains_and_reports() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let coordinator = Arc::new(coordinator(Arc::new(MemoryKvStore::new()), &cloud, None));
    coordinator.submit(draft("req-s1")).await.unwrap();
    coordinator.submit(draft("req-s2")).await.unwrap();

    cloud.reset().await;
    cloud_delivers(&cloud).await;

    let scheduler = SyncScheduler::new(
        coordinator.clone(),
        Arc::new(FixedNetwork::new(NetworkState::online(NetworkKind::Wifi))),
        SchedulerSettings::default(),
    );
    let mut events = scheduler.subscribe();

    scheduler.force_sync().await;

    let stats = scheduler.statistics().await;
    assert_eq!(stats.items_processed, 2);
    assert_eq!(stats.successful_syncs, 1);
    assert!(stats.last_successful_sync.is_some());
    assert_eq!(stats.current_status, SyncStatus::Idle);
    assert_eq!(coordinator.queue_summary().await.unwrap().completed, 2);

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::SyncCompleted { items_processed, .. } = event {
            completed = Some(items_processed);
        }
    }
    assert_eq!(completed, Some(2));
}

#[tokio::test]
async fn health_check_reports_without_touching_queue() {
    let cloud = MockServer::start().await;
    cloud_down(&cloud).await;

    let desktop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&desktop)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&desktop)
        .await;

    let coordinator = Arc::new(coordinator(Arc::new(MemoryKvStore::new()), &cloud, Some(&desktop)));
    coordinator.submit(draft("req-h")).await.unwrap();
    let before = coordinator.queue_items().await.unwrap();

    let scheduler = SyncScheduler::new(
        coordinator.clone(),
        Arc::new(FixedNetwork::new(NetworkState::online(NetworkKind::Ethernet))),
        SchedulerSettings::default(),
    );
    let snapshot = scheduler.perform_health_check().await.unwrap();

    assert!(snapshot.desktop.configured);
    assert!(snapshot.desktop.reachable);
    assert_eq!(snapshot.queue.pending, 1);
    assert!(snapshot.network.connected);
    assert_eq!(coordinator.queue_items().await.unwrap(), before);
}

#[tokio::test]
async fn relay_down_desktop_up_still_drains() {
    // Nothing listens on this port once the listener is dropped
    let relay_url = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let desktop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&desktop)
        .await;
    Mock::given(method("POST"))
        .and(path("/invoices/finalize"))
        .and(header("idempotency-key", "req-lan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&desktop)
        .await;

    let coordinator = Arc::new(
        SubmissionCoordinator::builder(Arc::new(MemoryKvStore::new()))
            .cloud(Arc::new(
                CloudRelayClient::new(&relay_url, "store-042", TIMEOUT).unwrap(),
            ))
            .local(Arc::new(
                DirectLocalClient::new(None, 4000, TIMEOUT, TIMEOUT).unwrap(),
            ))
            .build()
            .unwrap(),
    );

    let queued = coordinator.submit(draft("req-lan")).await.unwrap();
    assert_eq!(queued.method, DeliveryMethod::LocalQueue);
    coordinator.set_desktop_target(&desktop.uri()).await.unwrap();

    let network = ProbeNetworkMonitor::for_url(&relay_url, NetworkKind::Wifi, TIMEOUT).unwrap();
    let scheduler = SyncScheduler::new(
        coordinator.clone(),
        Arc::new(network),
        SchedulerSettings {
            wifi_only: true,
            ..Default::default()
        },
    );

    scheduler.force_sync().await;

    assert_eq!(scheduler.status().await, SyncStatus::Idle);
    let item = &coordinator.queue_items().await.unwrap()[0];
    assert_eq!(item.status, QueueStatus::Completed);
    assert_eq!(scheduler.statistics().await.items_processed, 1);
}
