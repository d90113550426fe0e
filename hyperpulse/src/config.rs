//! Environment-driven daemon configuration.
//!
//! Every setting has a default. Values that fail to parse are ignored with a
//! warning so a typo never prevents startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::collector::CollectorConfig;
use crate::database::MaintenanceConfig;
use crate::history::DEFAULT_RETENTION_DAYS;
use crate::hub::HubConfig;
use crate::notification::NotificationDispatcherConfig;

/// A cluster status endpoint sampled by a `ClusterSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSourceConfig {
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiServerConfig,
    /// SQLite URL. `None` disables the history store.
    pub database_url: Option<String>,
    pub log_dir: String,
    pub collector: CollectorConfig,
    pub retention_days: u32,
    pub maintenance: MaintenanceConfig,
    pub hub: HubConfig,
    pub notifications: NotificationDispatcherConfig,
    /// JSON array of endpoints loaded at startup.
    pub notification_endpoints_file: Option<PathBuf>,
    pub cluster_sources: Vec<ClusterSourceConfig>,
    pub enable_system_source: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiServerConfig::default(),
            database_url: None,
            log_dir: "logs".to_string(),
            collector: CollectorConfig::default(),
            retention_days: DEFAULT_RETENTION_DAYS,
            maintenance: MaintenanceConfig::default(),
            hub: HubConfig::default(),
            notifications: NotificationDispatcherConfig::default(),
            notification_endpoints_file: None,
            cluster_sources: Vec::new(),
            enable_system_source: true,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok());
        config.api = ApiServerConfig::from_env_or_default();
        config
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = EnvReader { lookup };
        let mut config = Self::default();

        config.database_url = env.string("DATABASE_URL");
        if let Some(dir) = env.string("LOG_DIR") {
            config.log_dir = dir;
        }

        if let Some(ms) = env.positive::<u64>("COLLECT_INTERVAL_MS") {
            config.collector.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env.positive::<u64>("SOURCE_TIMEOUT_MS") {
            config.collector.source_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = env.positive::<u64>("HISTORY_INTERVAL_SECS") {
            config.collector.history_interval = Duration::from_secs(secs);
        }
        if let Some(days) = env.positive::<u32>("HISTORY_RETENTION_DAYS") {
            config.retention_days = days;
        }
        if let Some(secs) = env.positive::<u64>("CLEANUP_INTERVAL_SECS") {
            config.maintenance.cleanup_interval = Duration::from_secs(secs);
        }

        if let Some(max) = env.positive::<usize>("HUB_MAX_SUBSCRIBERS") {
            config.hub.max_subscribers = max;
        }
        if let Some(n) = env.positive::<usize>("HUB_PUBLISH_QUEUE") {
            config.hub.publish_queue = n;
        }
        if let Some(n) = env.positive::<usize>("HUB_SUBSCRIBER_BUFFER") {
            config.hub.subscriber_buffer = n;
        }
        if let Some(secs) = env.positive::<u64>("HUB_IDLE_TIMEOUT_SECS") {
            config.hub.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(origins) = env.string("HUB_ALLOWED_ORIGINS") {
            config.hub.allowed_origins = split_list(&origins);
        }

        config.notification_endpoints_file =
            env.string("NOTIFICATION_ENDPOINTS_FILE").map(PathBuf::from);
        if let Some(ms) = env.positive::<u64>("NOTIFICATION_BACKOFF_UNIT_MS") {
            config.notifications.backoff_unit = Duration::from_millis(ms);
        }

        if let Some(raw) = env.string("CLUSTER_SOURCES") {
            config.cluster_sources = parse_cluster_sources(&raw);
        }
        if let Some(enabled) = env.parsed::<bool>("ENABLE_SYSTEM_SOURCE") {
            config.enable_system_source = enabled;
        }

        config
    }

    pub fn history_enabled(&self) -> bool {
        self.database_url.is_some()
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    /// Trimmed non-empty value.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring invalid configuration value");
                None
            }
        }
    }

    fn positive<T: FromStr + PartialOrd + Default>(&self, key: &str) -> Option<T> {
        let value = self.parsed::<T>(key)?;
        if value > T::default() {
            Some(value)
        } else {
            warn!(key, "Ignoring non-positive configuration value");
            None
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `name=url` pairs separated by commas. Malformed pairs are skipped.
pub fn parse_cluster_sources(raw: &str) -> Vec<ClusterSourceConfig> {
    split_list(raw)
        .into_iter()
        .filter_map(|pair| match pair.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                Some(ClusterSourceConfig {
                    name: name.trim().to_string(),
                    base_url: url.trim().to_string(),
                })
            }
            _ => {
                warn!(entry = %pair, "Ignoring malformed CLUSTER_SOURCES entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert!(!config.history_enabled());
        assert_eq!(config.collector.interval, Duration::from_secs(1));
        assert_eq!(config.collector.history_interval, Duration::from_secs(300));
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.hub.max_subscribers, 100);
        assert!(config.enable_system_source);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("DATABASE_URL", "sqlite:hyperpulse.db"),
            ("COLLECT_INTERVAL_MS", "250"),
            ("HUB_MAX_SUBSCRIBERS", "5"),
            ("HUB_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("NOTIFICATION_BACKOFF_UNIT_MS", "10"),
            ("ENABLE_SYSTEM_SOURCE", "false"),
        ]);
        assert!(config.history_enabled());
        assert_eq!(config.collector.interval, Duration::from_millis(250));
        assert_eq!(config.hub.max_subscribers, 5);
        assert_eq!(
            config.hub.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.notifications.backoff_unit, Duration::from_millis(10));
        assert!(!config.enable_system_source);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("DATABASE_URL", "  "),
            ("HUB_MAX_SUBSCRIBERS", "many"),
            ("SOURCE_TIMEOUT_MS", "0"),
        ]);
        assert!(config.database_url.is_none());
        assert_eq!(config.hub.max_subscribers, 100);
        assert_eq!(config.collector.source_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_cluster_sources() {
        let sources =
            parse_cluster_sources("east=http://east:8080, broken, =http://x,west=http://west");
        assert_eq!(
            sources,
            vec![
                ClusterSourceConfig {
                    name: "east".to_string(),
                    base_url: "http://east:8080".to_string(),
                },
                ClusterSourceConfig {
                    name: "west".to_string(),
                    base_url: "http://west".to_string(),
                },
            ]
        );
    }
}
