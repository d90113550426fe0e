//! Database maintenance.
//!
//! Runs history retention cleanup on its own interval and reclaims free
//! pages with an incremental vacuum once enough space is freeable.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::Result;
use crate::database::DbPool;
use crate::history::HistoryStore;
use crate::metrics::MetricsCollector;

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval between retention cleanups (default: 24 hours).
    pub cleanup_interval: Duration,
    /// Minimum freeable space in bytes to trigger vacuum (default: 16MB).
    pub vacuum_threshold_bytes: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            vacuum_threshold_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub history_removed: u64,
    pub vacuumed: bool,
}

pub struct MaintenanceScheduler {
    pool: DbPool,
    history: Arc<HistoryStore>,
    config: MaintenanceConfig,
    metrics: Option<Arc<MetricsCollector>>,
    cancellation_token: CancellationToken,
}

impl MaintenanceScheduler {
    pub fn new(
        pool: DbPool,
        history: Arc<HistoryStore>,
        config: MaintenanceConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            pool,
            history,
            config,
            metrics: None,
            cancellation_token,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start the cleanup loop. The first pass runs immediately.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = self.cancellation_token.cancelled() => {
                        debug!("Maintenance scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_maintenance().await {
                            error!("Maintenance error: {}", e);
                        }
                    }
                }
            }
        })
    }

    pub async fn run_maintenance(&self) -> Result<MaintenanceReport> {
        let history_removed = self.history.cleanup().await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_history_cleanup(history_removed);
        }
        let vacuumed = if self.get_freeable_space().await? >= self.config.vacuum_threshold_bytes {
            self.run_vacuum().await?;
            true
        } else {
            false
        };
        Ok(MaintenanceReport {
            history_removed,
            vacuumed,
        })
    }

    async fn get_freeable_space(&self) -> Result<i64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT freelist_count * page_size FROM pragma_freelist_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(result.0)
    }

    async fn get_database_size(&self) -> Result<i64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(result.0)
    }

    async fn run_vacuum(&self) -> Result<()> {
        let start = std::time::Instant::now();
        let before_size = self.get_database_size().await?;

        sqlx::query("PRAGMA incremental_vacuum")
            .execute(&self.pool)
            .await?;

        let after_size = self.get_database_size().await?;
        info!(
            "Vacuum completed in {:?}, reclaimed {} bytes",
            start.elapsed(),
            before_size - after_size
        );
        Ok(())
    }
}
