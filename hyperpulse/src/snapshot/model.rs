use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::BoundedList;

/// Maximum number of recent jobs carried by a snapshot.
pub const RECENT_JOBS_CAP: usize = 50;

/// Maximum number of alerts carried by a snapshot.
pub const ALERTS_CAP: usize = 20;

/// Job lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobCounts {
    pub active: u64,
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub queue_length: u64,
}

impl JobCounts {
    pub fn merge(&mut self, other: &JobCounts) {
        self.active = self.active.saturating_add(other.active);
        self.pending = self.pending.saturating_add(other.pending);
        self.completed = self.completed.saturating_add(other.completed);
        self.failed = self.failed.saturating_add(other.failed);
        self.cancelled = self.cancelled.saturating_add(other.cancelled);
        self.queue_length = self.queue_length.saturating_add(other.queue_length);
    }
}

/// Host and cluster resource usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceUsage {
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Highest CPU usage reported by any source.
    pub cpu_usage_percent: f64,
    pub total_cpus: u64,
    pub total_memory_gib: f64,
}

impl ResourceUsage {
    pub fn merge(&mut self, other: &ResourceUsage) {
        self.memory_used_bytes = self.memory_used_bytes.saturating_add(other.memory_used_bytes);
        self.memory_total_bytes = self
            .memory_total_bytes
            .saturating_add(other.memory_total_bytes);
        self.cpu_usage_percent = self.cpu_usage_percent.max(other.cpu_usage_percent);
        self.total_cpus = self.total_cpus.saturating_add(other.total_cpus);
        self.total_memory_gib += other.total_memory_gib;
    }
}

/// Virtual machine tallies across clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct VmCounts {
    pub total: u64,
    pub running: u64,
    pub stopped: u64,
    pub failed: u64,
}

impl VmCounts {
    pub fn merge(&mut self, other: &VmCounts) {
        self.total = self.total.saturating_add(other.total);
        self.running = self.running.saturating_add(other.running);
        self.stopped = self.stopped.saturating_add(other.stopped);
        self.failed = self.failed.saturating_add(other.failed);
    }
}

/// Backup or restore workload tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WorkloadCounts {
    pub total: u64,
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl WorkloadCounts {
    pub fn merge(&mut self, other: &WorkloadCounts) {
        self.total = self.total.saturating_add(other.total);
        self.pending = self.pending.saturating_add(other.pending);
        self.running = self.running.saturating_add(other.running);
        self.completed = self.completed.saturating_add(other.completed);
        self.failed = self.failed.saturating_add(other.failed);
    }
}

/// Carbon-aware scheduling statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CarbonStats {
    pub carbon_aware_vms: u64,
    pub average_intensity_gco2_kwh: f64,
    pub estimated_savings_kg: f64,
}

/// A job as shown in the recent activity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentJob {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// Operational alert raised during collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub level: AlertLevel,
    pub source: String,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(level: AlertLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// Freshness of the data a source contributed to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Fetched successfully this tick.
    Fresh,
    /// Fetch failed; last-known-good data was used.
    Stale,
    /// Fetch failed and no earlier data exists.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceStatus {
    pub state: SourceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn is_available(&self) -> bool {
        self.state != SourceState::Unavailable
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Healthy,
    Degraded,
    Unavailable,
}

/// Immutable, point-in-time measurement of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Snapshot {
    /// Monotonic per-process sequence number.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub jobs: JobCounts,
    pub resources: ResourceUsage,
    pub virtual_machines: VmCounts,
    pub backups: WorkloadCounts,
    pub restores: WorkloadCounts,
    pub jobs_by_provider: BTreeMap<String, u64>,
    pub carbon: CarbonStats,
    #[schema(value_type = Vec<RecentJob>)]
    pub recent_jobs: BoundedList<RecentJob>,
    #[schema(value_type = Vec<Alert>)]
    pub alerts: BoundedList<Alert>,
    pub sources: BTreeMap<String, SourceStatus>,
    /// Live viewer count at assembly time.
    pub subscribers: usize,
    pub health: HealthState,
}

impl Snapshot {
    /// Placeholder published before the first collection tick.
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            jobs: JobCounts::default(),
            resources: ResourceUsage::default(),
            virtual_machines: VmCounts::default(),
            backups: WorkloadCounts::default(),
            restores: WorkloadCounts::default(),
            jobs_by_provider: BTreeMap::new(),
            carbon: CarbonStats::default(),
            recent_jobs: BoundedList::new(RECENT_JOBS_CAP),
            alerts: BoundedList::new(ALERTS_CAP),
            sources: BTreeMap::new(),
            subscribers: 0,
            health: HealthState::Healthy,
        }
    }

    /// Names of sources that contributed no data this tick.
    pub fn unavailable_sources(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter(|(_, status)| !status.is_available())
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_counts_merge_is_additive() {
        let mut a = JobCounts {
            active: 3,
            failed: 1,
            ..Default::default()
        };
        a.merge(&JobCounts {
            active: 2,
            completed: 7,
            ..Default::default()
        });
        assert_eq!(a.active, 5);
        assert_eq!(a.completed, 7);
        assert_eq!(a.failed, 1);
    }

    #[test]
    fn test_resource_merge_takes_peak_cpu() {
        let mut a = ResourceUsage {
            cpu_usage_percent: 35.0,
            total_cpus: 8,
            ..Default::default()
        };
        a.merge(&ResourceUsage {
            cpu_usage_percent: 80.0,
            total_cpus: 16,
            ..Default::default()
        });
        assert_eq!(a.cpu_usage_percent, 80.0);
        assert_eq!(a.total_cpus, 24);
    }

    #[test]
    fn test_empty_snapshot_serializes_bounded_lists_as_arrays() {
        let json = serde_json::to_value(Snapshot::empty()).unwrap();
        assert!(json["recent_jobs"].is_array());
        assert!(json["alerts"].is_array());
        assert_eq!(json["health"], "healthy");
        assert_eq!(json["sequence"], 0);
    }
}
