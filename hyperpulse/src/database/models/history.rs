//! Snapshot history rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of `metrics_snapshots`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HistoryRecordDbModel {
    /// Unix epoch milliseconds of the snapshot.
    pub timestamp_ms: i64,
    pub total_vms: i64,
    pub running_vms: i64,
    pub stopped_vms: i64,
    pub failed_vms: i64,
    pub total_backups: i64,
    pub completed_backups: i64,
    pub failed_backups: i64,
    pub total_restores: i64,
    pub active_jobs: i64,
    pub failed_jobs: i64,
    pub total_cpus: i64,
    pub total_memory_gib: f64,
    pub avg_carbon_intensity: f64,
    pub carbon_aware_vms: i64,
    /// Full serialized snapshot. Range queries leave it empty.
    #[sqlx(default)]
    pub raw_snapshot: String,
    #[sqlx(default)]
    pub created_at: i64,
}

/// Single-pass aggregate over a `metrics_snapshots` range.
///
/// Every aggregate is `NULL` when no row matches.
#[derive(Debug, Clone, Default, FromRow)]
pub struct HistoryTrendRow {
    pub data_points: i64,
    pub min_vms: Option<f64>,
    pub max_vms: Option<f64>,
    pub avg_vms: Option<f64>,
    pub min_running_vms: Option<f64>,
    pub max_running_vms: Option<f64>,
    pub avg_running_vms: Option<f64>,
    pub min_active_jobs: Option<f64>,
    pub max_active_jobs: Option<f64>,
    pub avg_active_jobs: Option<f64>,
    pub min_failed_jobs: Option<f64>,
    pub max_failed_jobs: Option<f64>,
    pub avg_failed_jobs: Option<f64>,
    pub min_cpus: Option<f64>,
    pub max_cpus: Option<f64>,
    pub avg_cpus: Option<f64>,
    pub min_memory_gib: Option<f64>,
    pub max_memory_gib: Option<f64>,
    pub avg_memory_gib: Option<f64>,
    pub min_carbon: Option<f64>,
    pub max_carbon: Option<f64>,
    pub avg_carbon: Option<f64>,
    pub backup_delta: Option<i64>,
    pub restore_delta: Option<i64>,
}
