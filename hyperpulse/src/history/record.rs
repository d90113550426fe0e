use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::database::models::{HistoryRecordDbModel, HistoryTrendRow};
use crate::database::time::{datetime_to_ms, ms_to_datetime, now_ms};
use crate::snapshot::Snapshot;

/// A persisted, coarse-grained snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub total_vms: u64,
    pub running_vms: u64,
    pub stopped_vms: u64,
    pub failed_vms: u64,
    pub total_backups: u64,
    pub completed_backups: u64,
    pub failed_backups: u64,
    pub total_restores: u64,
    pub active_jobs: u64,
    pub failed_jobs: u64,
    pub total_cpus: u64,
    pub total_memory_gib: f64,
    pub avg_carbon_intensity: f64,
    pub carbon_aware_vms: u64,
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_u64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or_default()
}

impl HistoryRecord {
    /// Flatten the numeric columns of `snapshot`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            total_vms: snapshot.virtual_machines.total,
            running_vms: snapshot.virtual_machines.running,
            stopped_vms: snapshot.virtual_machines.stopped,
            failed_vms: snapshot.virtual_machines.failed,
            total_backups: snapshot.backups.total,
            completed_backups: snapshot.backups.completed,
            failed_backups: snapshot.backups.failed,
            total_restores: snapshot.restores.total,
            active_jobs: snapshot.jobs.active,
            failed_jobs: snapshot.jobs.failed,
            total_cpus: snapshot.resources.total_cpus,
            total_memory_gib: snapshot.resources.total_memory_gib,
            avg_carbon_intensity: snapshot.carbon.average_intensity_gco2_kwh,
            carbon_aware_vms: snapshot.carbon.carbon_aware_vms,
        }
    }

    pub(crate) fn into_db_model(self, raw_snapshot: String) -> HistoryRecordDbModel {
        HistoryRecordDbModel {
            timestamp_ms: datetime_to_ms(self.timestamp),
            total_vms: to_i64(self.total_vms),
            running_vms: to_i64(self.running_vms),
            stopped_vms: to_i64(self.stopped_vms),
            failed_vms: to_i64(self.failed_vms),
            total_backups: to_i64(self.total_backups),
            completed_backups: to_i64(self.completed_backups),
            failed_backups: to_i64(self.failed_backups),
            total_restores: to_i64(self.total_restores),
            active_jobs: to_i64(self.active_jobs),
            failed_jobs: to_i64(self.failed_jobs),
            total_cpus: to_i64(self.total_cpus),
            total_memory_gib: self.total_memory_gib,
            avg_carbon_intensity: self.avg_carbon_intensity,
            carbon_aware_vms: to_i64(self.carbon_aware_vms),
            raw_snapshot,
            created_at: now_ms(),
        }
    }
}

impl From<HistoryRecordDbModel> for HistoryRecord {
    fn from(row: HistoryRecordDbModel) -> Self {
        Self {
            timestamp: ms_to_datetime(row.timestamp_ms),
            total_vms: to_u64(row.total_vms),
            running_vms: to_u64(row.running_vms),
            stopped_vms: to_u64(row.stopped_vms),
            failed_vms: to_u64(row.failed_vms),
            total_backups: to_u64(row.total_backups),
            completed_backups: to_u64(row.completed_backups),
            failed_backups: to_u64(row.failed_backups),
            total_restores: to_u64(row.total_restores),
            active_jobs: to_u64(row.active_jobs),
            failed_jobs: to_u64(row.failed_jobs),
            total_cpus: to_u64(row.total_cpus),
            total_memory_gib: row.total_memory_gib,
            avg_carbon_intensity: row.avg_carbon_intensity,
            carbon_aware_vms: to_u64(row.carbon_aware_vms),
        }
    }
}

/// Min, max and mean of one column over a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl FieldStats {
    fn from_parts(min: Option<f64>, max: Option<f64>, mean: Option<f64>) -> Self {
        Self {
            min: min.unwrap_or_default(),
            max: max.unwrap_or_default(),
            mean: mean.unwrap_or_default(),
        }
    }
}

/// Summary over a history range. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrendAggregate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
    pub total_vms: FieldStats,
    pub running_vms: FieldStats,
    pub active_jobs: FieldStats,
    pub failed_jobs: FieldStats,
    pub total_cpus: FieldStats,
    pub total_memory_gib: FieldStats,
    pub avg_carbon_intensity: FieldStats,
    /// Completed backups gained over the range.
    pub backup_delta: u64,
    /// Restores gained over the range.
    pub restore_delta: u64,
}

impl TrendAggregate {
    /// Aggregate for a range with no rows.
    pub fn zero(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::from_row(start, end, HistoryTrendRow::default())
    }

    pub(crate) fn from_row(start: DateTime<Utc>, end: DateTime<Utc>, row: HistoryTrendRow) -> Self {
        Self {
            start,
            end,
            count: to_u64(row.data_points),
            total_vms: FieldStats::from_parts(row.min_vms, row.max_vms, row.avg_vms),
            running_vms: FieldStats::from_parts(
                row.min_running_vms,
                row.max_running_vms,
                row.avg_running_vms,
            ),
            active_jobs: FieldStats::from_parts(
                row.min_active_jobs,
                row.max_active_jobs,
                row.avg_active_jobs,
            ),
            failed_jobs: FieldStats::from_parts(
                row.min_failed_jobs,
                row.max_failed_jobs,
                row.avg_failed_jobs,
            ),
            total_cpus: FieldStats::from_parts(row.min_cpus, row.max_cpus, row.avg_cpus),
            total_memory_gib: FieldStats::from_parts(
                row.min_memory_gib,
                row.max_memory_gib,
                row.avg_memory_gib,
            ),
            avg_carbon_intensity: FieldStats::from_parts(
                row.min_carbon,
                row.max_carbon,
                row.avg_carbon,
            ),
            backup_delta: row.backup_delta.map(to_u64).unwrap_or_default(),
            restore_delta: row.restore_delta.map(to_u64).unwrap_or_default(),
        }
    }
}
