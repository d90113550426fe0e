//! Health check implementation.
//!
//! Components register a synchronous check closure; `check_all` runs them
//! together with a host CPU and memory sample.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::{Mutex, RwLock};

use crate::history::HistoryStore;
use crate::hub::BroadcastHub;
use crate::snapshot::{HealthState, SnapshotReader};

/// Health status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Health information for a single component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    /// Last check time (RFC3339).
    pub last_check: Option<String>,
    pub check_duration_ms: Option<u64>,
}

impl ComponentHealth {
    fn with_status(name: impl Into<String>, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message,
            last_check: Some(Utc::now().to_rfc3339()),
            check_duration_ms: None,
        }
    }

    pub fn healthy(name: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Healthy, None)
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Unhealthy, Some(message.into()))
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(name, HealthStatus::Degraded, Some(message.into()))
    }

    /// Attach an informational message without changing the status.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Overall system health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    /// Host CPU usage percentage (0-100).
    pub cpu_usage: f32,
    /// Host memory usage percentage (0-100).
    pub memory_usage: f32,
}

impl SystemHealth {
    /// Healthy and degraded systems still serve traffic.
    pub fn is_ready(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Health check function type.
pub type HealthCheckFn = Arc<dyn Fn() -> ComponentHealth + Send + Sync>;

/// Health checker for the daemon.
pub struct HealthChecker {
    checks: RwLock<HashMap<String, HealthCheckFn>>,
    start_time: Instant,
    version: String,
    system: Mutex<System>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            system: Mutex::new(System::new_with_specifics(
                RefreshKind::nothing()
                    .with_cpu(CpuRefreshKind::everything())
                    .with_memory(MemoryRefreshKind::everything()),
            )),
        }
    }

    /// Register a health check.
    pub async fn register(&self, name: impl Into<String>, check: HealthCheckFn) {
        self.checks.write().await.insert(name.into(), check);
    }

    /// Unregister a health check.
    ///
    /// Returns true if the check was removed, false if it didn't exist.
    pub async fn unregister(&self, name: &str) -> bool {
        self.checks.write().await.remove(name).is_some()
    }

    /// Run all health checks.
    pub async fn check_all(&self) -> SystemHealth {
        let (cpu_usage, memory_usage) = {
            let mut system = self.system.lock().await;
            system.refresh_cpu_all();
            system.refresh_memory();

            let total_mem = system.total_memory();
            let mem_usage = if total_mem > 0 {
                (system.used_memory() as f64 / total_mem as f64 * 100.0) as f32
            } else {
                0.0
            };
            (system.global_cpu_usage(), mem_usage)
        };

        let checks = self.checks.read().await;
        let mut components = HashMap::with_capacity(checks.len());
        let mut overall_status = HealthStatus::Healthy;

        for (name, check) in checks.iter() {
            let start = Instant::now();
            let health = check().with_duration(start.elapsed());

            match health.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded;
                }
                _ => {}
            }

            components.insert(name.clone(), health);
        }

        SystemHealth {
            status: overall_status,
            components,
            version: self.version.clone(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            timestamp: Utc::now().to_rfc3339(),
            cpu_usage,
            memory_usage,
        }
    }

    /// Check readiness (for Kubernetes probes).
    pub async fn check_ready(&self) -> bool {
        self.check_all().await.is_ready()
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Collector check: unhealthy when no source answers, degraded when the
/// current snapshot is older than `max_age` or carries stale sources.
pub fn collector_check(reader: SnapshotReader, max_age: Duration) -> HealthCheckFn {
    Arc::new(move || {
        let snapshot = reader.current();
        if snapshot.sequence == 0 {
            return ComponentHealth::degraded("collector", "No snapshot collected yet");
        }

        let age = (Utc::now() - snapshot.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            return ComponentHealth::degraded(
                "collector",
                format!("Snapshot is {}s old", age.as_secs()),
            );
        }

        match snapshot.health {
            HealthState::Healthy => ComponentHealth::healthy("collector"),
            HealthState::Degraded => {
                let names: Vec<&str> = snapshot.unavailable_sources().collect();
                let message = if names.is_empty() {
                    "Serving stale data for some sources".to_string()
                } else {
                    format!("Unavailable sources: {}", names.join(", "))
                };
                ComponentHealth::degraded("collector", message)
            }
            HealthState::Unavailable => {
                ComponentHealth::unhealthy("collector", "All sources unavailable")
            }
        }
    })
}

/// Hub check: degraded while the subscriber cap is reached.
pub fn hub_check(hub: Arc<BroadcastHub>) -> HealthCheckFn {
    Arc::new(move || {
        let stats = hub.stats();
        if stats.subscribers >= stats.max_subscribers {
            ComponentHealth::degraded(
                "hub",
                format!("At capacity ({} subscribers)", stats.max_subscribers),
            )
        } else {
            ComponentHealth::healthy("hub")
                .with_message(format!("{} subscribers", stats.subscribers))
        }
    })
}

/// History check: a disabled store is reported but never unhealthy.
pub fn history_check(history: Arc<HistoryStore>) -> HealthCheckFn {
    Arc::new(move || {
        if history.is_enabled() {
            ComponentHealth::healthy("history")
                .with_message(format!("retention {} days", history.retention_days()))
        } else {
            ComponentHealth::healthy("history").with_message("disabled")
        }
    })
}
