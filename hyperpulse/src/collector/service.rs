use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::assemble::{Assembly, SourceOutcome, assemble};
use crate::Error;
use crate::history::HistoryStore;
use crate::hub::BroadcastHub;
use crate::metrics::MetricsCollector;
use crate::snapshot::{
    BaselineSavingsPolicy, SavingsPolicy, Snapshot, SnapshotReader, SnapshotWriter,
};
use crate::source::{Source, SourceReport};

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Interval between collection ticks (default: 1 second).
    pub interval: Duration,
    /// Upper bound on each source fetch (default: 2 seconds).
    pub source_timeout: Duration,
    /// Interval between history writes (default: 5 minutes).
    pub history_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            source_timeout: Duration::from_secs(2),
            history_interval: Duration::from_secs(5 * 60),
        }
    }
}

struct LastGood {
    report: SourceReport,
    at: DateTime<Utc>,
}

/// Periodic sampler that owns the current snapshot.
pub struct Collector {
    config: CollectorConfig,
    sources: Vec<Arc<dyn Source>>,
    writer: SnapshotWriter,
    hub: Arc<BroadcastHub>,
    history: Arc<HistoryStore>,
    savings: Arc<dyn SavingsPolicy>,
    metrics: Option<Arc<MetricsCollector>>,
    last_good: Mutex<HashMap<String, LastGood>>,
    sequence: AtomicU64,
    cancellation_token: CancellationToken,
}

impl Collector {
    pub fn new(
        config: CollectorConfig,
        writer: SnapshotWriter,
        hub: Arc<BroadcastHub>,
        history: Arc<HistoryStore>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            sources: Vec::new(),
            writer,
            hub,
            history,
            savings: Arc::new(BaselineSavingsPolicy::default()),
            metrics: None,
            last_good: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            cancellation_token,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn Source>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn with_savings_policy(mut self, policy: Arc<dyn SavingsPolicy>) -> Self {
        self.savings = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn reader(&self) -> SnapshotReader {
        self.writer.reader()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Sample every source, publish the assembled snapshot and make it current.
    ///
    /// Completes within the source timeout plus assembly time. Failing
    /// sources fall back to their last good report or are marked unavailable.
    pub async fn tick(&self) -> Arc<Snapshot> {
        let started = Instant::now();
        let timeout = self.config.source_timeout;

        let fetches = self.sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(timeout, source.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(Error::source_unavailable(
                    source.name(),
                    format!("timed out after {}ms", timeout.as_millis()),
                )),
            };
            (source.name().to_string(), result)
        });
        let results = join_all(fetches).await;

        let timestamp = Utc::now();
        let outcomes = {
            let mut last_good = self.last_good.lock();
            results
                .into_iter()
                .map(|(name, result)| {
                    let outcome = match result {
                        Ok(report) => {
                            last_good.insert(
                                name.clone(),
                                LastGood {
                                    report: report.clone(),
                                    at: timestamp,
                                },
                            );
                            SourceOutcome::Fresh(report)
                        }
                        Err(e) => {
                            let error = match e {
                                Error::SourceUnavailable { reason, .. } => reason,
                                other => other.to_string(),
                            };
                            warn!(source = %name, error = %error, "Source fetch failed");
                            if let Some(metrics) = &self.metrics {
                                metrics.record_source_failure(&name);
                            }
                            match last_good.get(&name) {
                                Some(good) => SourceOutcome::Stale {
                                    report: good.report.clone(),
                                    last_success: good.at,
                                    error,
                                },
                                None => SourceOutcome::Unavailable { error },
                            }
                        }
                    };
                    (name, outcome)
                })
                .collect()
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = assemble(Assembly {
            sequence,
            timestamp,
            outcomes,
            subscribers: self.hub.len(),
            savings: self.savings.as_ref(),
        });

        let snapshot = self.writer.replace(snapshot);
        if !self.hub.publish(&snapshot) {
            debug!(sequence, "Publish queue full, snapshot dropped for fan-out");
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_tick(started.elapsed());
        }
        snapshot
    }

    /// Persist the current snapshot. Skipped before the first tick.
    pub async fn record_history(&self) {
        if !self.history.is_enabled() {
            return;
        }
        let snapshot = self.writer.reader().current();
        if snapshot.sequence == 0 {
            return;
        }
        let result = self.history.record_snapshot(&snapshot).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_history_write(result.is_ok());
        }
        if let Err(e) = result {
            warn!(sequence = snapshot.sequence, "Failed to record history: {}", e);
        }
    }

    /// Spawn the collection loop and the history loop.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            sources = self.sources.len(),
            interval_ms = self.config.interval.as_millis() as u64,
            history_interval_secs = self.config.history_interval.as_secs(),
            "Starting collector"
        );

        let collector = self.clone();
        let collect = tokio::spawn(async move {
            let mut interval = tokio::time::interval(collector.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = collector.cancellation_token.cancelled() => {
                        debug!("Collection loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        collector.tick().await;
                    }
                }
            }
        });

        let collector = self;
        let history = tokio::spawn(async move {
            let period = collector.config.history_interval;
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = collector.cancellation_token.cancelled() => {
                        debug!("History loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        collector.record_history().await;
                    }
                }
            }
        });

        vec![collect, history]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::Result;
    use crate::hub::HubConfig;
    use crate::snapshot::{SourceState, snapshot_cell};

    struct FlakySource {
        calls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl Source for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self) -> Result<SourceReport> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_after {
                return Err(Error::source_unavailable("flaky", "connection refused"));
            }
            let mut report = SourceReport::default();
            report.virtual_machines.total = 5;
            Ok(report)
        }
    }

    fn collector(source: Arc<dyn Source>) -> Collector {
        let (writer, _) = snapshot_cell();
        Collector::new(
            CollectorConfig {
                source_timeout: Duration::from_millis(50),
                ..Default::default()
            },
            writer,
            Arc::new(BroadcastHub::new(HubConfig::default())),
            Arc::new(HistoryStore::disabled()),
            CancellationToken::new(),
        )
        .with_source(source)
        .with_metrics(Arc::new(MetricsCollector::new()))
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_last_good() {
        let collector = collector(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        }));

        let first = collector.tick().await;
        assert_eq!(first.sequence, 1);
        assert_eq!(first.sources["flaky"].state, SourceState::Fresh);

        let second = collector.tick().await;
        assert_eq!(second.sequence, 2);
        assert_eq!(second.sources["flaky"].state, SourceState::Stale);
        assert_eq!(second.virtual_machines.total, 5);
        assert_eq!(
            second.sources["flaky"].error.as_deref(),
            Some("connection refused")
        );

        assert_eq!(collector.reader().current().sequence, 2);
        let metrics = collector.metrics.as_ref().unwrap().snapshot();
        assert_eq!(metrics.ticks_total, 2);
        assert_eq!(metrics.source_failures["flaky"], 1);
    }

    #[tokio::test]
    async fn test_never_successful_source_is_unavailable() {
        let collector = collector(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_after: 0,
        }));
        let snapshot = collector.tick().await;
        assert_eq!(snapshot.sources["flaky"].state, SourceState::Unavailable);
        assert_eq!(snapshot.health, crate::snapshot::HealthState::Unavailable);
    }

    #[tokio::test]
    async fn test_record_history_skips_disabled_store() {
        let collector = collector(Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        }));
        collector.tick().await;
        collector.record_history().await;
        let metrics = collector.metrics.as_ref().unwrap().snapshot();
        assert_eq!(metrics.history_writes_total, 0);
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let (writer, reader) = snapshot_cell();
        let token = CancellationToken::new();
        let collector = Arc::new(
            Collector::new(
                CollectorConfig {
                    interval: Duration::from_millis(10),
                    ..Default::default()
                },
                writer,
                Arc::new(BroadcastHub::new(HubConfig::default())),
                Arc::new(HistoryStore::disabled()),
                token.clone(),
            ),
        );

        let handles = collector.start();
        for _ in 0..100 {
            if reader.current().sequence >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(reader.current().sequence >= 2);

        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
