//! Snapshot history repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{HistoryRecordDbModel, HistoryTrendRow};
use crate::database::retry::retry_on_sqlite_busy;

const RECORD_COLUMNS: &str = r#"
    timestamp_ms, total_vms, running_vms, stopped_vms, failed_vms,
    total_backups, completed_backups, failed_backups, total_restores,
    active_jobs, failed_jobs, total_cpus, total_memory_gib,
    avg_carbon_intensity, carbon_aware_vms
"#;

/// Append-only access to `metrics_snapshots`.
///
/// All range bounds are inclusive epoch milliseconds.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn insert(&self, record: &HistoryRecordDbModel) -> Result<()>;
    async fn list_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<HistoryRecordDbModel>>;
    async fn trend(&self, start_ms: i64, end_ms: i64) -> Result<HistoryTrendRow>;
    async fn latest(&self) -> Result<Option<HistoryRecordDbModel>>;
    /// Delete rows strictly older than `cutoff_ms`, returning the count removed.
    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64>;
    async fn count(&self) -> Result<i64>;
}

/// SQLx implementation of HistoryRepository.
pub struct SqlxHistoryRepository {
    pool: SqlitePool,
}

impl SqlxHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqlxHistoryRepository {
    async fn insert(&self, record: &HistoryRecordDbModel) -> Result<()> {
        retry_on_sqlite_busy("history_insert", || async {
            sqlx::query(
                r#"
                INSERT INTO metrics_snapshots (
                    timestamp_ms, total_vms, running_vms, stopped_vms, failed_vms,
                    total_backups, completed_backups, failed_backups, total_restores,
                    active_jobs, failed_jobs, total_cpus, total_memory_gib,
                    avg_carbon_intensity, carbon_aware_vms, raw_snapshot, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.timestamp_ms)
            .bind(record.total_vms)
            .bind(record.running_vms)
            .bind(record.stopped_vms)
            .bind(record.failed_vms)
            .bind(record.total_backups)
            .bind(record.completed_backups)
            .bind(record.failed_backups)
            .bind(record.total_restores)
            .bind(record.active_jobs)
            .bind(record.failed_jobs)
            .bind(record.total_cpus)
            .bind(record.total_memory_gib)
            .bind(record.avg_carbon_intensity)
            .bind(record.carbon_aware_vms)
            .bind(&record.raw_snapshot)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn list_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<HistoryRecordDbModel>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM metrics_snapshots \
             WHERE timestamp_ms BETWEEN ? AND ? \
             ORDER BY timestamp_ms ASC, id ASC"
        );
        let records = sqlx::query_as::<_, HistoryRecordDbModel>(&query)
            .bind(start_ms)
            .bind(end_ms)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn trend(&self, start_ms: i64, end_ms: i64) -> Result<HistoryTrendRow> {
        let row = sqlx::query_as::<_, HistoryTrendRow>(
            r#"
            SELECT
                COUNT(*) AS data_points,
                CAST(MIN(total_vms) AS REAL) AS min_vms,
                CAST(MAX(total_vms) AS REAL) AS max_vms,
                AVG(total_vms) AS avg_vms,
                CAST(MIN(running_vms) AS REAL) AS min_running_vms,
                CAST(MAX(running_vms) AS REAL) AS max_running_vms,
                AVG(running_vms) AS avg_running_vms,
                CAST(MIN(active_jobs) AS REAL) AS min_active_jobs,
                CAST(MAX(active_jobs) AS REAL) AS max_active_jobs,
                AVG(active_jobs) AS avg_active_jobs,
                CAST(MIN(failed_jobs) AS REAL) AS min_failed_jobs,
                CAST(MAX(failed_jobs) AS REAL) AS max_failed_jobs,
                AVG(failed_jobs) AS avg_failed_jobs,
                CAST(MIN(total_cpus) AS REAL) AS min_cpus,
                CAST(MAX(total_cpus) AS REAL) AS max_cpus,
                AVG(total_cpus) AS avg_cpus,
                CAST(MIN(total_memory_gib) AS REAL) AS min_memory_gib,
                CAST(MAX(total_memory_gib) AS REAL) AS max_memory_gib,
                AVG(total_memory_gib) AS avg_memory_gib,
                CAST(MIN(avg_carbon_intensity) AS REAL) AS min_carbon,
                CAST(MAX(avg_carbon_intensity) AS REAL) AS max_carbon,
                AVG(avg_carbon_intensity) AS avg_carbon,
                CAST(MAX(completed_backups) - MIN(completed_backups) AS INTEGER) AS backup_delta,
                CAST(MAX(total_restores) - MIN(total_restores) AS INTEGER) AS restore_delta
            FROM metrics_snapshots
            WHERE timestamp_ms BETWEEN ? AND ?
            "#,
        )
        .bind(start_ms)
        .bind(end_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn latest(&self) -> Result<Option<HistoryRecordDbModel>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS}, raw_snapshot, created_at FROM metrics_snapshots \
             ORDER BY timestamp_ms DESC, id DESC LIMIT 1"
        );
        let record = sqlx::query_as::<_, HistoryRecordDbModel>(&query)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        retry_on_sqlite_busy("history_cleanup", || async {
            let result = sqlx::query("DELETE FROM metrics_snapshots WHERE timestamp_ms < ?")
                .bind(cutoff_ms)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM metrics_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
