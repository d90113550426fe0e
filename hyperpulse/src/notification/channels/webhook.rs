//! Generic webhook notification channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tracing::{debug, warn};

use super::{NotificationChannel, OutboundMessage};
use crate::notification::endpoint::NotificationEndpoint;
use crate::{Error, Result};

/// Posts JSON event payloads to an HTTP endpoint.
pub struct WebhookChannel {
    url: String,
    headers: HeaderMap,
    timeout: Duration,
    client: Client,
}

impl WebhookChannel {
    pub fn new(endpoint: &NotificationEndpoint, client: Client) -> Self {
        Self {
            url: endpoint.url.clone(),
            headers: build_headers(endpoint),
            timeout: endpoint.timeout(),
            client,
        }
    }
}

fn build_headers(endpoint: &NotificationEndpoint) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &endpoint.headers {
        match (
            name.parse::<HeaderName>(),
            value.parse::<HeaderValue>(),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(
                endpoint = %endpoint.id,
                header = %name,
                "Skipping invalid webhook header"
            ),
        }
    }
    headers
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "webhook returned {}: {}",
                status,
                body.chars().take(256).collect::<String>()
            )));
        }

        debug!(url = %self.url, event = %message.event, "Webhook delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::events::EventKind;
    use crate::utils::http_client;
    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use std::sync::Arc;

    type Received = Arc<parking_lot::Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn record(
        State(sink): State<Received>,
        headers: axum::http::HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let token = headers
            .get("x-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        sink.lock().push((token, body));
        StatusCode::NO_CONTENT
    }

    /// Local receiver: `/ok` records the request, `/fail` always answers 500.
    async fn spawn_receiver() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/ok", post(record))
            .route(
                "/fail",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    #[tokio::test]
    async fn test_delivers_json_with_custom_headers() {
        let (base, received) = spawn_receiver().await;
        let mut endpoint = NotificationEndpoint::new(format!("{}/ok", base));
        endpoint
            .headers
            .insert("X-Token".to_string(), "secret".to_string());
        let client = http_client::build_client(Duration::from_secs(2));
        let channel = WebhookChannel::new(&endpoint, client);

        let message = OutboundMessage::new(
            EventKind::JobFailed,
            serde_json::json!({"job_id": "j9", "error": "disk full"}),
        );
        channel.send(&message).await.unwrap();

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("secret"));
        assert_eq!(received[0].1["event"], "job.failed");
        assert_eq!(received[0].1["data"]["error"], "disk full");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let (base, _received) = spawn_receiver().await;
        let endpoint = NotificationEndpoint::new(format!("{}/fail", base));
        let client = http_client::build_client(Duration::from_secs(2));
        let channel = WebhookChannel::new(&endpoint, client);

        let err = channel
            .send(&OutboundMessage::new(EventKind::Test, serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let mut endpoint = NotificationEndpoint::new("https://hooks.example.com/a");
        endpoint
            .headers
            .insert("X-Token".to_string(), "secret".to_string());
        endpoint
            .headers
            .insert("bad header".to_string(), "x".to_string());

        let headers = build_headers(&endpoint);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-token").unwrap(), "secret");
    }

    #[test]
    fn test_message_envelope_shape() {
        let message = OutboundMessage::new(
            EventKind::JobCompleted,
            serde_json::json!({"job_id": "j1"}),
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event"], "job.completed");
        assert_eq!(json["data"]["job_id"], "j1");
        assert!(json["timestamp"].is_string());
    }
}
