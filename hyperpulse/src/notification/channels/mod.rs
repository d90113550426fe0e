//! Notification channels.

mod webhook;

pub use webhook::WebhookChannel;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::endpoint::NotificationEndpoint;
use super::events::EventKind;
use crate::Result;

/// Body posted to an endpoint for one event.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl OutboundMessage {
    pub fn new(event: EventKind, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Perform a single delivery attempt.
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Builds the channel used to reach an endpoint.
pub type ChannelBuilder =
    Arc<dyn Fn(&NotificationEndpoint) -> Arc<dyn NotificationChannel> + Send + Sync>;

/// Channel builder producing HTTP webhooks over a shared client.
pub fn webhook_builder(client: reqwest::Client) -> ChannelBuilder {
    Arc::new(move |endpoint: &NotificationEndpoint| {
        Arc::new(WebhookChannel::new(endpoint, client.clone())) as Arc<dyn NotificationChannel>
    })
}
