//! Webhook notifier
//!
//! POSTs `{"wallet", "amount", "amount_sun"}` as JSON. Any 2xx response is
//! an acceptance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::NotificationSink;
use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::types::{Address, Sun};

/// Body sent to the webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    /// Deposit address that received funds
    pub wallet: String,
    /// TRX amount as a decimal string ("50.000000")
    pub amount: String,
    /// Same amount in sun
    pub amount_sun: u64,
}

impl WebhookPayload {
    pub fn new(wallet: &Address, amount: Sun) -> Self {
        Self {
            wallet: wallet.to_string(),
            amount: amount.to_string(),
            amount_sun: amount.as_u64(),
        }
    }
}

/// HTTP webhook delivery
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn deliver(&self, wallet: &Address, amount: Sun) -> Result<()> {
        let payload = WebhookPayload::new(wallet, amount);
        debug!("Sending webhook for {} ({} TRX)", wallet, payload.amount);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Notification(format!("webhook returned {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Local webhook receiver answering every POST with `status`
    async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/hook", addr), received)
    }

    fn notifier(url: String) -> WebhookNotifier {
        WebhookNotifier::new(&WebhookConfig {
            url,
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let payload = WebhookPayload::new(&Address::new("TA"), Sun::from_trx(50));
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["wallet"], "TA");
        assert_eq!(json["amount"], "50.000000");
        assert_eq!(json["amount_sun"], 50_000_000);
    }

    #[tokio::test]
    async fn test_delivery_accepted() {
        let (url, received) = spawn_receiver(StatusCode::OK).await;

        notifier(url)
            .deliver(&Address::new("TA"), Sun::from_trx(50))
            .await
            .unwrap();

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["wallet"], "TA");
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let (url, _received) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;

        let err = notifier(url)
            .deliver(&Address::new("TA"), Sun(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Notification(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = notifier(format!("http://{}/hook", addr))
            .deliver(&Address::new("TA"), Sun(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Notification(_)));
    }
}
