//! Outbound event notification.
//!
//! Job-lifecycle events are delivered to registered HTTP endpoints with
//! bounded retries. Delivery is at-least-once: an event whose retries are
//! exhausted is logged and dropped.

pub mod channels;
pub mod delivery;
pub mod endpoint;
pub mod events;
pub mod service;

pub use channels::{ChannelBuilder, NotificationChannel, OutboundMessage, WebhookChannel};
pub use delivery::{AttemptOutcome, DeliveryAttempt, DeliveryOutcome, DeliveryReport};
pub use endpoint::{EndpointSource, NotificationEndpoint};
pub use events::{EventKind, EventKindInfo, event_kinds};
pub use service::{NotificationDispatcher, NotificationDispatcherConfig, NotificationStats};

use crate::Result;

/// Parse a JSON array of endpoints, as found in the endpoints file.
pub fn parse_endpoints(json: &str) -> Result<Vec<NotificationEndpoint>> {
    let mut endpoints: Vec<NotificationEndpoint> = serde_json::from_str(json)?;
    for endpoint in &mut endpoints {
        endpoint.source = EndpointSource::Config;
    }
    Ok(endpoints)
}

/// Read configured endpoints from `path`.
pub async fn load_endpoints_file(path: &std::path::Path) -> Result<Vec<NotificationEndpoint>> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_endpoints(&contents)
}
