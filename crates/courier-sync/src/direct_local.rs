//! # Direct Local Client
//!
//! Posts transactions straight to the desktop server on the store LAN.
//!
//! ```text
//!  POST http://{desktop}:4000/invoices/finalize     body = Transaction JSON
//!  GET  http://{desktop}:4000/health                2xx = alive
//! ```
//!
//! The target is operator-configured and can change at runtime, so it sits
//! behind a lock. Without a target the channel reports itself unconfigured
//! and the coordinator never tries it.

use async_trait::async_trait;
use courier_core::Transaction;
use reqwest::Client;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::channel::{ChannelResponse, DeliveryChannel, IDEMPOTENCY_KEY};
use crate::error::{SyncError, SyncResult};

const CHANNEL: &str = "direct local";
const FINALIZE_PATH: &str = "invoices/finalize";
const HEALTH_PATH: &str = "health";

/// Resolves an operator-entered target into a base URL.
///
/// Accepts a bare host (`192.168.1.20`), `host:port`, or a full URL. A bare
/// host without a port gets `default_port`; full URLs keep their own.
pub fn desktop_base_url(target: &str, default_port: u16) -> SyncResult<Url> {
    let target = target.trim();
    if target.is_empty() {
        return Err(SyncError::InvalidUrl("desktop target is empty".into()));
    }

    let explicit_scheme = target.contains("://");
    let with_scheme = if explicit_scheme {
        target.to_string()
    } else {
        format!("http://{}", target)
    };

    let mut url = Url::parse(&with_scheme)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SyncError::InvalidUrl(format!(
            "Desktop target must use http or https, got: {}",
            target
        )));
    }
    if url.host_str().is_none() {
        return Err(SyncError::InvalidUrl(format!("{} has no host", target)));
    }
    if !explicit_scheme && url.port().is_none() {
        url.set_port(Some(default_port))
            .map_err(|_| SyncError::InvalidUrl(format!("{} cannot carry a port", target)))?;
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// HTTP client for the desktop server.
pub struct DirectLocalClient {
    client: Client,
    base_url: RwLock<Option<Url>>,
    default_port: u16,
    timeout: Duration,
    probe_timeout: Duration,
}

impl DirectLocalClient {
    pub fn new(
        target: Option<&str>,
        default_port: u16,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = target
            .map(|t| desktop_base_url(t, default_port))
            .transpose()?;

        Ok(DirectLocalClient {
            client,
            base_url: RwLock::new(base_url),
            default_port,
            timeout,
            probe_timeout,
        })
    }

    /// Current base URL, if a target is configured.
    pub fn base_url(&self) -> Option<Url> {
        self.base_url.read().ok().and_then(|guard| guard.clone())
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        let base = self
            .base_url()
            .ok_or_else(|| SyncError::NotConfigured(CHANNEL.to_string()))?;
        Ok(base.join(path)?)
    }

    fn map_err(&self, secs: u64, err: reqwest::Error) -> SyncError {
        SyncError::from_reqwest(CHANNEL, secs, err)
    }
}

#[async_trait]
impl DeliveryChannel for DirectLocalClient {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    fn is_configured(&self) -> bool {
        self.base_url().is_some()
    }

    fn target(&self) -> Option<String> {
        self.base_url().map(|url| url.to_string())
    }

    async fn send(&self, transaction: &Transaction) -> SyncResult<ChannelResponse> {
        let url = self.endpoint(FINALIZE_PATH)?;
        debug!(request_id = %transaction.request_id, url = %url, "Sending transaction to desktop");

        let response = self
            .client
            .post(url)
            .header(IDEMPOTENCY_KEY, transaction.request_id.as_str())
            .json(transaction)
            .send()
            .await
            .map_err(|e| self.map_err(self.timeout.as_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                request_id = %transaction.request_id,
                status = status.as_u16(),
                "Desktop rejected transaction"
            );
            return Err(SyncError::Rejected {
                channel: CHANNEL.to_string(),
                status: status.as_u16(),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.map_err(self.timeout.as_secs(), e))?;
        Ok(ChannelResponse::accepted(data))
    }

    async fn health(&self) -> SyncResult<()> {
        let url = self.endpoint(HEALTH_PATH)?;

        let response = self
            .client
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| self.map_err(self.probe_timeout.as_secs(), e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SyncError::Rejected {
                channel: CHANNEL.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    fn set_target(&self, target: Option<&str>) -> SyncResult<()> {
        let resolved = target
            .map(|t| desktop_base_url(t, self.default_port))
            .transpose()?;

        match &resolved {
            Some(url) => info!(url = %url, "Desktop target updated"),
            None => info!("Desktop target cleared"),
        }

        let mut guard = self
            .base_url
            .write()
            .map_err(|_| SyncError::Internal("desktop target lock poisoned".into()))?;
        *guard = resolved;
        Ok(())
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
            request_id: Some("req-local-1".into()),
            items: vec![DraftItem::new("Oil 1L", 1, 4.2)],
            ..Default::default()
        };
        Transaction::from_draft(draft, Vec::new(), chrono::Utc::now())
    }

    fn client(target: Option<&str>) -> DirectLocalClient {
        DirectLocalClient::new(target, 4000, Duration::from_secs(5), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_base_url_resolution() {
        assert_eq!(
            desktop_base_url("192.168.1.20", 4000).unwrap().as_str(),
            "http://192.168.1.20:4000/"
        );
        assert_eq!(
            desktop_base_url("desk.local:8080", 4000).unwrap().as_str(),
            "http://desk.local:8080/"
        );
        assert_eq!(
            desktop_base_url("https://desk.local/api?x=1", 4000).unwrap().as_str(),
            "https://desk.local/"
        );
        assert!(desktop_base_url("  ", 4000).is_err());
        assert!(desktop_base_url("ftp://desk", 4000).is_err());
    }

    #[tokio::test]
    async fn test_send_posts_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoices/finalize"))
            .and(header("idempotency-key", "req-local-1"))
            .and(body_partial_json(json!({ "requestId": "req-local-1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "invoiceId": 77 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(Some(&server.uri()));
        let response = client.send(&transaction()).await.unwrap();

        assert!(response.success);
        assert!(response.delivered);
        assert_eq!(response.data, Some(json!({ "invoiceId": 77 })));
    }

    #[tokio::test]
    async fn test_send_rejects_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let err = client(Some(&server.uri())).send(&transaction()).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 422, .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_channel() {
        let client = client(None);
        assert!(!client.is_configured());

        let err = client.send(&transaction()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured(_)));
        assert!(client.health().await.is_err());
    }

    #[tokio::test]
    async fn test_health_check_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client(Some(&server.uri()));
        assert!(client.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_set_target() {
        let client = client(None);
        client.set_target(Some("10.0.0.9")).unwrap();
        assert!(client.is_configured());
        assert_eq!(client.base_url().unwrap().as_str(), "http://10.0.0.9:4000/");

        assert!(client.set_target(Some("ftp://nope")).is_err());
        assert!(client.is_configured());

        client.set_target(None).unwrap();
        assert!(!client.is_configured());
    }
}
