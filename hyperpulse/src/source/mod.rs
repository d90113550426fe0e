//! Data sources sampled by the collector.
//!
//! A [`Source`] returns a partial view of the platform. The collector merges
//! every report additively, so several clusters aggregate to a sum.

mod cluster;
mod jobs;
mod system;

pub use cluster::{ClusterSource, ClusterStatus};
pub use jobs::JobBoardSource;
pub use system::SystemSource;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;
use crate::snapshot::{Alert, JobCounts, RecentJob, ResourceUsage, VmCounts, WorkloadCounts};

/// Carbon-aware scheduling inputs from one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CarbonReading {
    #[serde(default)]
    pub carbon_aware_vms: u64,
    #[serde(default)]
    pub average_intensity_gco2_kwh: f64,
}

impl CarbonReading {
    /// Combine two readings, weighting intensity by carbon-aware VM count.
    pub fn merge(&mut self, other: &CarbonReading) {
        let vms = self.carbon_aware_vms + other.carbon_aware_vms;
        self.average_intensity_gco2_kwh = if vms > 0 {
            (self.average_intensity_gco2_kwh * self.carbon_aware_vms as f64
                + other.average_intensity_gco2_kwh * other.carbon_aware_vms as f64)
                / vms as f64
        } else {
            0.0
        };
        self.carbon_aware_vms = vms;
    }
}

/// Partial snapshot contributed by one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceReport {
    pub jobs: JobCounts,
    pub resources: ResourceUsage,
    pub virtual_machines: VmCounts,
    pub backups: WorkloadCounts,
    pub restores: WorkloadCounts,
    pub jobs_by_provider: BTreeMap<String, u64>,
    pub carbon: CarbonReading,
    pub recent_jobs: Vec<RecentJob>,
    pub alerts: Vec<Alert>,
}

impl SourceReport {
    pub fn merge(&mut self, other: &SourceReport) {
        self.jobs.merge(&other.jobs);
        self.resources.merge(&other.resources);
        self.virtual_machines.merge(&other.virtual_machines);
        self.backups.merge(&other.backups);
        self.restores.merge(&other.restores);
        for (provider, count) in &other.jobs_by_provider {
            *self.jobs_by_provider.entry(provider.clone()).or_default() += count;
        }
        self.carbon.merge(&other.carbon);
        self.recent_jobs.extend(other.recent_jobs.iter().cloned());
        self.alerts.extend(other.alerts.iter().cloned());
    }
}

/// A collaborator supplying raw counters for one sub-system.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable name used in snapshot source status.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<SourceReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carbon_merge_is_weighted() {
        let mut a = CarbonReading {
            carbon_aware_vms: 3,
            average_intensity_gco2_kwh: 100.0,
        };
        a.merge(&CarbonReading {
            carbon_aware_vms: 1,
            average_intensity_gco2_kwh: 300.0,
        });
        assert_eq!(a.carbon_aware_vms, 4);
        assert_eq!(a.average_intensity_gco2_kwh, 150.0);

        let mut empty = CarbonReading::default();
        empty.merge(&CarbonReading::default());
        assert_eq!(empty.average_intensity_gco2_kwh, 0.0);
    }

    #[test]
    fn test_report_merge_sums_providers() {
        let mut a = SourceReport::default();
        a.jobs_by_provider.insert("vsphere".to_string(), 2);
        let mut b = SourceReport::default();
        b.jobs_by_provider.insert("vsphere".to_string(), 1);
        b.jobs_by_provider.insert("hyperv".to_string(), 4);
        b.virtual_machines.total = 9;

        a.merge(&b);
        assert_eq!(a.jobs_by_provider["vsphere"], 3);
        assert_eq!(a.jobs_by_provider["hyperv"], 4);
        assert_eq!(a.virtual_machines.total, 9);
    }
}
