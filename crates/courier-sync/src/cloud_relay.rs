//! # Cloud Relay Client
//!
//! Posts transactions to the store's cloud relay, which either forwards them
//! to the desktop straight away (`delivered`) or holds them until the desktop
//! comes online (`queued`).
//!
//! ```text
//!  POST {relay_url}/relay/invoice
//!  Idempotency-Key: <requestId>
//!  { "storeId": "store-042", "invoice": { ...Transaction... } }
//!
//!  ◄── 200 { "success": true, "delivered": true }
//!  ◄── 202 { "success": true, "queued": true }
//! ```

use async_trait::async_trait;
use courier_core::Transaction;
use reqwest::Client;
use serde::Serialize;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::channel::{ChannelResponse, DeliveryChannel, IDEMPOTENCY_KEY};
use crate::error::{SyncError, SyncResult};

const CHANNEL: &str = "cloud relay";
const RELAY_PATH: &str = "/relay/invoice";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    store_id: &'a str,
    invoice: &'a Transaction,
}

/// HTTP client for the cloud relay.
pub struct CloudRelayClient {
    client: Client,
    endpoint: String,
    store_id: RwLock<String>,
    timeout: Duration,
}

impl CloudRelayClient {
    pub fn new(relay_url: &str, store_id: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(CloudRelayClient {
            client,
            endpoint: format!("{}{}", relay_url.trim_end_matches('/'), RELAY_PATH),
            store_id: RwLock::new(store_id.into()),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn store_id(&self) -> String {
        self.store_id
            .read()
            .map(|id| id.clone())
            .unwrap_or_default()
    }

    fn map_err(&self, err: reqwest::Error) -> SyncError {
        SyncError::from_reqwest(CHANNEL, self.timeout.as_secs(), err)
    }
}

#[async_trait]
impl DeliveryChannel for CloudRelayClient {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    fn target(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }

    /// Changes the `storeId` sent with subsequent requests.
    fn set_store_id(&self, store_id: &str) {
        if let Ok(mut guard) = self.store_id.write() {
            *guard = store_id.to_string();
        }
    }

    async fn send(&self, transaction: &Transaction) -> SyncResult<ChannelResponse> {
        let store_id = self.store_id();
        debug!(
            request_id = %transaction.request_id,
            store_id = %store_id,
            "Sending transaction to cloud relay"
        );

        let body = RelayRequest {
            store_id: &store_id,
            invoice: transaction,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(IDEMPOTENCY_KEY, transaction.request_id.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                request_id = %transaction.request_id,
                status = status.as_u16(),
                "Cloud relay rejected transaction"
            );
            return Err(SyncError::Rejected {
                channel: CHANNEL.to_string(),
                status: status.as_u16(),
            });
        }

        let data: serde_json::Value = response.json().await.map_err(|e| self.map_err(e))?;
        ChannelResponse::from_body(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{DraftItem, TransactionDraft};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transaction() -> Transaction {
        let draft = TransactionDraft {
            request_id: Some("req-cloud-1".into()),
            items: vec![DraftItem::new("Flour", 2, 1.5)],
            ..Default::default()
        };
        Transaction::from_draft(draft, Vec::new(), chrono::Utc::now())
    }

    #[tokio::test]
    async fn test_delivered_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/relay/invoice"))
            .and(header("idempotency-key", "req-cloud-1"))
            .and(body_partial_json(json!({
                "storeId": "store-1",
                "invoice": { "requestId": "req-cloud-1" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "delivered": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudRelayClient::new(&server.uri(), "store-1", Duration::from_secs(10)).unwrap();
        let response = client.send(&transaction()).await.unwrap();

        assert!(response.success);
        assert!(response.delivered);
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = CloudRelayClient::new(&server.uri(), "store-1", Duration::from_secs(10)).unwrap();
        let err = client.send(&transaction()).await.unwrap_err();

        assert!(matches!(err, SyncError::Rejected { status: 503, .. }));
        assert!(err.is_channel_unavailable());
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = CloudRelayClient::new(&server.uri(), "store-1", Duration::from_secs(10)).unwrap();
        let err = client.send(&transaction()).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true }))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let client = CloudRelayClient::new(&server.uri(), "store-1", Duration::from_secs(1)).unwrap();
        let err = client.send(&transaction()).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_store_id_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "storeId": "store-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "queued": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CloudRelayClient::new(&format!("{}/", server.uri()), "store-1", Duration::from_secs(10)).unwrap();
        client.set_store_id("store-2");

        assert!(client.endpoint().ends_with("/relay/invoice"));
        assert!(!client.endpoint().contains("//relay"));
        let response = client.send(&transaction()).await.unwrap();
        assert!(response.queued);
    }
}
