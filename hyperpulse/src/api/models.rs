//! API request and response models (DTOs).
//!
//! - **Health**: system health checks
//! - **History**: range and trend query parameters
//! - **Notifications**: endpoint administration and test delivery
//! - **Events**: job lifecycle ingest
//! - **Logging**: runtime filter changes

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::history::HistoryRecord;
use crate::notification::NotificationEndpoint;
use crate::snapshot::RecentJob;

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub cpu_usage: f32,
    pub memory_usage: f32,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
}

/// Liveness check response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LivenessResponse {
    /// Always "alive" if responding
    pub status: String,
    pub uptime_secs: u64,
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// History query parameters.
///
/// Either a named `range` or both `start` and `end` (RFC3339).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// One of `1h`, `6h`, `24h`, `7d`, `30d` (default `24h`)
    pub range: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
    /// With `format=csv`, send as an attachment
    #[serde(default)]
    pub download: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub range: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
    pub records: Vec<HistoryRecord>,
}

/// Trend query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TrendQuery {
    /// One of `1h`, `6h`, `24h`, `7d`, `30d` (default `7d`)
    pub range: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointListResponse {
    pub endpoints: Vec<NotificationEndpoint>,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

/// Request to register a webhook endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEndpointRequest {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Event kinds to deliver; empty means all
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub enabled: Option<bool>,
}

impl CreateEndpointRequest {
    pub fn into_endpoint(self) -> NotificationEndpoint {
        let mut endpoint = NotificationEndpoint::new(self.url).with_events(self.events);
        endpoint.name = self.name.unwrap_or_default();
        endpoint.headers = self.headers;
        if let Some(timeout_ms) = self.timeout_ms {
            endpoint.timeout_ms = timeout_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            endpoint.max_attempts = max_attempts;
        }
        if let Some(enabled) = self.enabled {
            endpoint.enabled = enabled;
        }
        endpoint
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TestDeliveryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<RecentJob>,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventAcceptedResponse {
    pub accepted: bool,
    pub kind: String,
    pub job_id: String,
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogFilterResponse {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateLogFilterRequest {
    /// `EnvFilter` directive, e.g. `hyperpulse=debug,sqlx=warn`
    pub filter: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::EndpointSource;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateEndpointRequest =
            serde_json::from_str(r#"{"url":"https://hooks.example/ops"}"#).unwrap();
        let endpoint = req.into_endpoint();
        assert_eq!(endpoint.max_attempts, 3);
        assert_eq!(endpoint.timeout_ms, 10_000);
        assert!(endpoint.enabled);
        assert!(endpoint.events.is_empty());
        assert_eq!(endpoint.source, EndpointSource::Dynamic);
    }

    #[test]
    fn test_history_query_format() {
        let query: HistoryQuery =
            serde_json::from_str(r#"{"format":"csv","download":true}"#).unwrap();
        assert_eq!(query.format, ExportFormat::Csv);
        assert!(query.download);
    }
}
