//! Outbound webhook notifications.
//!
//! After an ingestion, extraction or audit finishes, a [`WebhookEvent`] is
//! POSTed to `[webhook] url` from a background task. Delivery never blocks
//! or fails the operation that triggered it; errors are logged. Pending
//! deliveries are tracked so [`WebhookNotifier::flush`] can wait for them
//! before a CLI command exits.
//!
//! When `[webhook] secret` is set the request carries
//! `X-Signature-256: sha256=<hex>`, an HMAC-SHA256 of the raw JSON body.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::WebhookConfig;

pub const SIGNATURE_HEADER: &str = "X-Signature-256";

pub const INGEST_COMPLETE: &str = "ingest_complete";
pub const EXTRACT_COMPLETE: &str = "extract_complete";
pub const AUDIT_COMPLETE: &str = "audit_complete";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub document_id: String,
    /// `"success"` or `"error"`.
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn success(event_type: &str, document_id: &str, message: impl Into<String>) -> Self {
        Self::new(event_type, document_id, "success", message.into())
    }

    pub fn error(event_type: &str, document_id: &str, message: impl Into<String>) -> Self {
        Self::new(event_type, document_id, "error", message.into())
    }

    fn new(event_type: &str, document_id: &str, status: &str, message: String) -> Self {
        Self {
            event_type: event_type.to_string(),
            document_id: document_id.to_string(),
            status: status.to_string(),
            message: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// `sha256=<hex>` HMAC of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {}", e))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Background webhook sender. Clones share the set of pending deliveries.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: Option<String>,
    secret: Option<String>,
    client: reqwest::Client,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl WebhookNotifier {
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            secret: config.secret.clone(),
            client,
            pending: Arc::new(Mutex::new(JoinSet::new())),
        })
    }

    fn pending(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver `event` and wait for the response.
    pub async fn deliver(&self, event: &WebhookEvent) -> Result<()> {
        let Some(url) = self.url.as_deref() else {
            return Ok(());
        };

        let body = serde_json::to_vec(event)?;
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = self.secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, sign(secret, &body)?);
        }

        request.body(body).send().await?.error_for_status()?;
        Ok(())
    }

    /// Deliver `event` from a background task. No-op without a URL.
    pub fn emit(&self, event: WebhookEvent) {
        if !self.is_enabled() {
            return;
        }
        let notifier = self.clone();
        let mut pending = self.pending();
        // Reap finished deliveries.
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match notifier.deliver(&event).await {
                Ok(()) => tracing::debug!(
                    event_type = %event.event_type,
                    document_id = %event.document_id,
                    "webhook delivered"
                ),
                Err(e) => tracing::warn!(
                    event_type = %event.event_type,
                    document_id = %event.document_id,
                    error = %e,
                    "webhook delivery failed"
                ),
            }
        });
    }

    /// Wait for every delivery started by [`emit`](Self::emit) to finish.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.pending());
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "webhook task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_known_vector() {
        // RFC 4231 test case 2.
        let sig = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = WebhookEvent::success(INGEST_COMPLETE, "doc-1", "Ingested 3 pages");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "ingest_complete");
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Ingested 3 pages");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));

        let back: WebhookEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    /// One-shot HTTP receiver returning the raw request it got.
    async fn receive_one() -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8(raw).unwrap()
        });
        (url, handle)
    }

    #[tokio::test]
    async fn test_flush_waits_for_signed_delivery() {
        let (url, received) = receive_one().await;
        let notifier = WebhookNotifier::from_config(&WebhookConfig {
            url: Some(url),
            secret: Some("s3cret".to_string()),
            timeout_secs: 5,
        })
        .unwrap();

        let event = WebhookEvent::success(EXTRACT_COMPLETE, "doc-9", "Extracted 11 fields");
        notifier.emit(event.clone());
        notifier.flush().await;

        let raw = received.await.unwrap();
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /hook"));
        let expected = sign("s3cret", body.as_bytes()).unwrap();
        assert!(head
            .lines()
            .any(|l| l.eq_ignore_ascii_case(&format!("x-signature-256: {}", expected))));

        let delivered: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(delivered, event);
    }

    #[tokio::test]
    async fn test_flush_logs_unreachable_receiver() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let notifier = WebhookNotifier::from_config(&WebhookConfig {
            url: Some(url),
            secret: None,
            timeout_secs: 2,
        })
        .unwrap();
        notifier.emit(WebhookEvent::error(AUDIT_COMPLETE, "doc-1", "boom"));
        notifier.flush().await;
        assert!(notifier.pending().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = WebhookNotifier::from_config(&WebhookConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
        let event = WebhookEvent::error(AUDIT_COMPLETE, "doc-1", "boom");
        notifier.deliver(&event).await.unwrap();
        notifier.emit(event);
        assert!(notifier.pending().is_empty());
        notifier.flush().await;
    }
}
