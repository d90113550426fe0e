use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::range::TimeRange;
use super::record::{HistoryRecord, TrendAggregate};
use crate::database::repositories::HistoryRepository;
use crate::database::time::{datetime_to_ms, datetime_to_ms_ceil, retention_cutoff_ms};
use crate::snapshot::Snapshot;
use crate::{Error, Result};

/// Default number of days history rows are kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Snapshot history backed by an optional repository.
///
/// Without a repository the store is disabled: writes and cleanup succeed
/// as no-ops, reads fail with [`Error::StoreDisabled`].
pub struct HistoryStore {
    repo: Option<Arc<dyn HistoryRepository>>,
    retention_days: u32,
}

impl HistoryStore {
    pub fn new(repo: Arc<dyn HistoryRepository>, retention_days: u32) -> Self {
        Self {
            repo: Some(repo),
            retention_days,
        }
    }

    pub fn disabled() -> Self {
        Self {
            repo: None,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.repo.is_some()
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    fn repo(&self) -> Result<&Arc<dyn HistoryRepository>> {
        self.repo.as_ref().ok_or(Error::StoreDisabled)
    }

    pub async fn record_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(repo) = &self.repo else {
            return Ok(());
        };
        let raw = serde_json::to_string(snapshot)?;
        let row = HistoryRecord::from_snapshot(snapshot).into_db_model(raw);
        repo.insert(&row).await?;
        debug!(sequence = snapshot.sequence, "Recorded history snapshot");
        Ok(())
    }

    /// Records in `range`, ascending by timestamp, bounds inclusive.
    pub async fn get_history(&self, range: &TimeRange) -> Result<Vec<HistoryRecord>> {
        let repo = self.repo()?;
        let rows = repo
            .list_range(datetime_to_ms_ceil(range.start), datetime_to_ms(range.end))
            .await?;
        Ok(rows.into_iter().map(HistoryRecord::from).collect())
    }

    pub async fn get_trend(&self, range: &TimeRange) -> Result<TrendAggregate> {
        let repo = self.repo()?;
        let row = repo
            .trend(datetime_to_ms_ceil(range.start), datetime_to_ms(range.end))
            .await?;
        if row.data_points == 0 {
            return Ok(TrendAggregate::zero(range.start, range.end));
        }
        Ok(TrendAggregate::from_row(range.start, range.end, row))
    }

    pub async fn latest(&self) -> Result<Option<HistoryRecord>> {
        let repo = self.repo()?;
        Ok(repo.latest().await?.map(HistoryRecord::from))
    }

    /// Delete records older than the retention window.
    pub async fn cleanup(&self) -> Result<u64> {
        let Some(repo) = &self.repo else {
            return Ok(0);
        };
        let cutoff = retention_cutoff_ms(Utc::now(), self.retention_days);
        let removed = repo.delete_older_than(cutoff).await?;
        if removed > 0 {
            info!(
                removed,
                retention_days = self.retention_days,
                "Cleaned up old history records"
            );
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_store() {
        let store = HistoryStore::disabled();
        assert!(!store.is_enabled());
        store.record_snapshot(&Snapshot::empty()).await.unwrap();
        assert_eq!(store.cleanup().await.unwrap(), 0);

        let range = TimeRange::named("1h", Utc::now()).unwrap();
        assert!(matches!(
            store.get_history(&range).await,
            Err(Error::StoreDisabled)
        ));
        assert!(matches!(
            store.get_trend(&range).await,
            Err(Error::StoreDisabled)
        ));
        assert!(matches!(store.latest().await, Err(Error::StoreDisabled)));
    }
}
