//! Notification endpoint database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Result;
use crate::database::time::now_ms;
use crate::notification::endpoint::{EndpointSource, NotificationEndpoint};

/// Persisted webhook endpoint.
///
/// `events` and `headers` are JSON-encoded columns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationEndpointDbModel {
    pub id: String,
    pub name: String,
    pub url: String,
    pub events: String,
    pub headers: String,
    pub timeout_ms: i64,
    pub max_attempts: i64,
    pub enabled: bool,
    pub created_at: i64,
}

impl NotificationEndpointDbModel {
    pub fn from_endpoint(endpoint: &NotificationEndpoint) -> Result<Self> {
        Ok(Self {
            id: endpoint.id.clone(),
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            events: serde_json::to_string(&endpoint.events)?,
            headers: serde_json::to_string(&endpoint.headers)?,
            timeout_ms: i64::try_from(endpoint.timeout_ms).unwrap_or(i64::MAX),
            max_attempts: i64::from(endpoint.max_attempts),
            enabled: endpoint.enabled,
            created_at: now_ms(),
        })
    }

    pub fn into_endpoint(self) -> Result<NotificationEndpoint> {
        Ok(NotificationEndpoint {
            id: self.id,
            name: self.name,
            url: self.url,
            events: serde_json::from_str(&self.events)?,
            headers: serde_json::from_str(&self.headers)?,
            timeout_ms: u64::try_from(self.timeout_ms).unwrap_or_default(),
            max_attempts: u32::try_from(self.max_attempts).unwrap_or(1),
            enabled: self.enabled,
            source: EndpointSource::Database,
        })
    }
}
