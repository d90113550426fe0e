//! Self-metrics for the collection pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Counters describing the health of the pipeline itself.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    // Collection
    ticks_total: AtomicU64,
    tick_duration_total_ms: AtomicU64,
    last_tick_duration_ms: AtomicU64,
    source_failures: DashMap<String, AtomicU64>,

    // History
    history_writes_total: AtomicU64,
    history_write_errors: AtomicU64,
    history_rows_cleaned: AtomicU64,

    // Ingest
    events_ingested: DashMap<String, AtomicU64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed collection tick.
    pub fn record_tick(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        self.tick_duration_total_ms
            .fetch_add(ms, Ordering::Relaxed);
        self.last_tick_duration_ms.store(ms, Ordering::Relaxed);
    }

    pub fn record_source_failure(&self, source: &str) {
        self.source_failures
            .entry(source.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_history_write(&self, ok: bool) {
        if ok {
            self.history_writes_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.history_write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_history_cleanup(&self, rows: u64) {
        self.history_rows_cleaned
            .fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_event_ingested(&self, kind: &str) {
        self.events_ingested
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ticks_total = self.ticks_total.load(Ordering::Relaxed);
        let tick_duration_total_ms = self.tick_duration_total_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            ticks_total,
            avg_tick_duration_ms: if ticks_total > 0 {
                tick_duration_total_ms as f64 / ticks_total as f64
            } else {
                0.0
            },
            last_tick_duration_ms: self.last_tick_duration_ms.load(Ordering::Relaxed),
            source_failures: collect_map(&self.source_failures),
            history_writes_total: self.history_writes_total.load(Ordering::Relaxed),
            history_write_errors: self.history_write_errors.load(Ordering::Relaxed),
            history_rows_cleaned: self.history_rows_cleaned.load(Ordering::Relaxed),
            events_ingested: collect_map(&self.events_ingested),
        }
    }
}

fn collect_map(map: &DashMap<String, AtomicU64>) -> HashMap<String, u64> {
    map.iter()
        .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
        .collect()
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_total: u64,
    pub avg_tick_duration_ms: f64,
    pub last_tick_duration_ms: u64,
    pub source_failures: HashMap<String, u64>,
    pub history_writes_total: u64,
    pub history_write_errors: u64,
    pub history_rows_cleaned: u64,
    pub events_ingested: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_average() {
        let metrics = MetricsCollector::new();
        metrics.record_tick(Duration::from_millis(10));
        metrics.record_tick(Duration::from_millis(30));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks_total, 2);
        assert_eq!(snapshot.avg_tick_duration_ms, 20.0);
        assert_eq!(snapshot.last_tick_duration_ms, 30);
    }

    #[test]
    fn test_labelled_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_source_failure("east");
        metrics.record_source_failure("east");
        metrics.record_event_ingested("job.completed");
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.source_failures["east"], 2);
        assert_eq!(snapshot.events_ingested["job.completed"], 1);
    }
}
