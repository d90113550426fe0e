//! Notification endpoint configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::events::{EventKind, WILDCARD};
use crate::{Error, Result};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of attempts per event.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Where an endpoint definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSource {
    /// Loaded from the endpoints file at startup.
    Config,
    /// Added at runtime without persistence.
    Dynamic,
    /// Persisted in the database.
    Database,
}

/// An external target for event delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationEndpoint {
    #[serde(default = "new_endpoint_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    /// Subscribed event kinds. Empty or `"*"` means all.
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_source")]
    pub source: EndpointSource,
}

fn new_endpoint_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_enabled() -> bool {
    true
}

fn default_source() -> EndpointSource {
    EndpointSource::Config
}

impl NotificationEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: new_endpoint_id(),
            name: String::new(),
            url: url.into(),
            events: Vec::new(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            enabled: true,
            source: EndpointSource::Dynamic,
        }
    }

    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Whether an event of `kind` should be delivered here.
    pub fn matches(&self, kind: EventKind) -> bool {
        self.events.is_empty()
            || self
                .events
                .iter()
                .any(|event| event == WILDCARD || event == kind.as_str())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::validation("url is required"));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::validation(format!("invalid url '{}': {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::validation("max_attempts must be at least 1"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::validation("timeout_ms must be greater than 0"));
        }
        for event in &self.events {
            if event != WILDCARD && EventKind::parse(event).is_none() {
                return Err(Error::validation(format!("unknown event kind '{}'", event)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_subscription_filters_other_kinds() {
        let endpoint = NotificationEndpoint::new("https://hooks.example.com/a")
            .with_events(["job.completed"]);
        assert!(endpoint.matches(EventKind::JobCompleted));
        assert!(!endpoint.matches(EventKind::JobFailed));
        assert!(!endpoint.matches(EventKind::JobCreated));
    }

    #[test]
    fn test_empty_and_wildcard_match_everything() {
        let all = NotificationEndpoint::new("https://hooks.example.com/all");
        let wildcard =
            NotificationEndpoint::new("https://hooks.example.com/star").with_events(["*"]);
        for kind in EventKind::LIFECYCLE {
            assert!(all.matches(kind));
            assert!(wildcard.matches(kind));
        }
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let endpoint: NotificationEndpoint =
            serde_json::from_str(r#"{"url":"https://hooks.example.com/x"}"#).unwrap();
        assert_eq!(endpoint.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(endpoint.timeout(), Duration::from_secs(10));
        assert!(endpoint.enabled);
        assert_eq!(endpoint.source, EndpointSource::Config);
        assert!(!endpoint.id.is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(NotificationEndpoint::new("").validate().is_err());
        assert!(NotificationEndpoint::new("ftp://x").validate().is_err());
        assert!(
            NotificationEndpoint::new("https://x.example.com")
                .with_events(["job.exploded"])
                .validate()
                .is_err()
        );
        let mut zero = NotificationEndpoint::new("https://x.example.com");
        zero.max_attempts = 0;
        assert!(zero.validate().is_err());
        assert!(
            NotificationEndpoint::new("http://127.0.0.1:9000/hook")
                .with_events(["*", "job.failed"])
                .validate()
                .is_ok()
        );
    }
}
