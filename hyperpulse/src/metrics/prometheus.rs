//! Prometheus metrics exporter.
//!
//! Renders pipeline counters, the current snapshot, hub and dispatcher
//! statistics in the Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use super::collector::MetricsCollector;
use crate::hub::BroadcastHub;
use crate::notification::NotificationDispatcher;
use crate::snapshot::{HealthState, SnapshotReader};

#[derive(Debug, Clone, Copy)]
enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Prometheus metrics exporter.
pub struct PrometheusExporter {
    collector: Arc<MetricsCollector>,
    namespace: String,
    snapshot: Option<SnapshotReader>,
    hub: Option<Arc<BroadcastHub>>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
}

impl PrometheusExporter {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self::with_namespace(collector, "hyperpulse")
    }

    pub fn with_namespace(collector: Arc<MetricsCollector>, namespace: impl Into<String>) -> Self {
        Self {
            collector,
            namespace: namespace.into(),
            snapshot: None,
            hub: None,
            dispatcher: None,
        }
    }

    pub fn with_snapshot(mut self, reader: SnapshotReader) -> Self {
        self.snapshot = Some(reader);
        self
    }

    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let mut output = String::new();
        self.write_pipeline(&mut output);
        if let Some(reader) = &self.snapshot {
            self.write_snapshot(&mut output, reader);
        }
        if let Some(hub) = &self.hub {
            self.write_hub(&mut output, hub);
        }
        if let Some(dispatcher) = &self.dispatcher {
            self.write_dispatcher(&mut output, dispatcher);
        }
        output
    }

    fn write_pipeline(&self, output: &mut String) {
        let m = self.collector.snapshot();

        self.write_counter(
            output,
            "collection_ticks_total",
            "Completed collection ticks",
            m.ticks_total as f64,
        );
        self.write_gauge(
            output,
            "collection_tick_duration_ms",
            "Duration of the last collection tick",
            m.last_tick_duration_ms as f64,
        );
        self.write_gauge(
            output,
            "collection_tick_duration_avg_ms",
            "Average collection tick duration",
            m.avg_tick_duration_ms,
        );

        let mut failures: Vec<_> = m.source_failures.iter().collect();
        failures.sort();
        self.write_family(
            output,
            "source_failures_total",
            "Failed source fetches by source",
            MetricKind::Counter,
            failures
                .into_iter()
                .map(|(source, count)| (vec![("source", source.as_str())], *count as f64)),
        );

        self.write_counter(
            output,
            "history_writes_total",
            "History rows written",
            m.history_writes_total as f64,
        );
        self.write_counter(
            output,
            "history_write_errors_total",
            "Failed history writes",
            m.history_write_errors as f64,
        );
        self.write_counter(
            output,
            "history_rows_cleaned_total",
            "History rows removed by retention cleanup",
            m.history_rows_cleaned as f64,
        );

        let mut events: Vec<_> = m.events_ingested.iter().collect();
        events.sort();
        self.write_family(
            output,
            "events_ingested_total",
            "Job lifecycle events ingested by kind",
            MetricKind::Counter,
            events
                .into_iter()
                .map(|(kind, count)| (vec![("kind", kind.as_str())], *count as f64)),
        );
    }

    fn write_snapshot(&self, output: &mut String, reader: &SnapshotReader) {
        let s = reader.current();

        self.write_gauge(
            output,
            "snapshot_sequence",
            "Sequence of the current snapshot",
            s.sequence as f64,
        );
        self.write_family(
            output,
            "jobs",
            "Jobs by state",
            MetricKind::Gauge,
            [
                ("active", s.jobs.active),
                ("pending", s.jobs.pending),
                ("completed", s.jobs.completed),
                ("failed", s.jobs.failed),
                ("cancelled", s.jobs.cancelled),
            ]
            .into_iter()
            .map(|(state, v)| (vec![("state", state)], v as f64)),
        );
        self.write_gauge(output, "job_queue_length", "Queued jobs", s.jobs.queue_length as f64);
        self.write_family(
            output,
            "virtual_machines",
            "Virtual machines by state",
            MetricKind::Gauge,
            [
                ("running", s.virtual_machines.running),
                ("stopped", s.virtual_machines.stopped),
                ("failed", s.virtual_machines.failed),
            ]
            .into_iter()
            .map(|(state, v)| (vec![("state", state)], v as f64)),
        );
        self.write_family(
            output,
            "workloads",
            "Backup and restore workloads by state",
            MetricKind::Gauge,
            [("backup", &s.backups), ("restore", &s.restores)]
                .into_iter()
                .flat_map(|(kind, w)| {
                    [
                        ("pending", w.pending),
                        ("running", w.running),
                        ("completed", w.completed),
                        ("failed", w.failed),
                    ]
                    .into_iter()
                    .map(move |(state, v)| (vec![("kind", kind), ("state", state)], v as f64))
                }),
        );
        self.write_gauge(
            output,
            "cpu_usage_percent",
            "Peak CPU usage across sources",
            s.resources.cpu_usage_percent,
        );
        self.write_gauge(
            output,
            "memory_used_bytes",
            "Memory in use",
            s.resources.memory_used_bytes as f64,
        );
        self.write_gauge(
            output,
            "carbon_intensity_gco2_kwh",
            "Average grid carbon intensity",
            s.carbon.average_intensity_gco2_kwh,
        );
        self.write_gauge(
            output,
            "carbon_savings_kg",
            "Estimated carbon savings",
            s.carbon.estimated_savings_kg,
        );
        self.write_family(
            output,
            "source_up",
            "Whether a source contributed fresh data",
            MetricKind::Gauge,
            s.sources.iter().map(|(name, status)| {
                let up = matches!(status.state, crate::snapshot::SourceState::Fresh);
                (vec![("source", name.as_str())], if up { 1.0 } else { 0.0 })
            }),
        );
        let health = match s.health {
            HealthState::Healthy => 0.0,
            HealthState::Degraded => 1.0,
            HealthState::Unavailable => 2.0,
        };
        self.write_gauge(
            output,
            "health_state",
            "Snapshot health (0 healthy, 1 degraded, 2 unavailable)",
            health,
        );
    }

    fn write_hub(&self, output: &mut String, hub: &BroadcastHub) {
        let stats = hub.stats();
        self.write_gauge(
            output,
            "hub_subscribers",
            "Connected live subscribers",
            stats.subscribers as f64,
        );
        self.write_gauge(
            output,
            "hub_max_subscribers",
            "Subscriber cap",
            stats.max_subscribers as f64,
        );
        self.write_counter(
            output,
            "hub_published_total",
            "Snapshots accepted for fan-out",
            stats.published as f64,
        );
        self.write_counter(
            output,
            "hub_dropped_total",
            "Snapshots dropped on a full publish queue",
            stats.dropped as f64,
        );
        self.write_counter(
            output,
            "hub_delivered_total",
            "Frames queued to subscribers",
            stats.delivered as f64,
        );
        self.write_counter(
            output,
            "hub_lagged_total",
            "Frames skipped for slow subscribers",
            stats.lagged as f64,
        );
        self.write_counter(
            output,
            "hub_rejected_total",
            "Connections rejected at capacity",
            stats.rejected as f64,
        );
    }

    fn write_dispatcher(&self, output: &mut String, dispatcher: &NotificationDispatcher) {
        let stats = dispatcher.stats();
        self.write_gauge(
            output,
            "notification_endpoints",
            "Registered notification endpoints",
            stats.endpoint_count as f64,
        );
        self.write_gauge(
            output,
            "notification_in_flight",
            "Deliveries in progress",
            stats.in_flight as f64,
        );
        self.write_family(
            output,
            "notification_deliveries_total",
            "Finished deliveries by outcome",
            MetricKind::Counter,
            [
                ("delivered", stats.delivered),
                ("exhausted", stats.exhausted),
                ("cancelled", stats.cancelled),
            ]
            .into_iter()
            .map(|(outcome, v)| (vec![("outcome", outcome)], v as f64)),
        );
        self.write_counter(
            output,
            "notification_attempts_total",
            "Webhook attempts made",
            stats.attempts as f64,
        );
    }

    fn write_gauge(&self, output: &mut String, name: &str, help: &str, value: f64) {
        self.write_family(
            output,
            name,
            help,
            MetricKind::Gauge,
            std::iter::once((Vec::new(), value)),
        );
    }

    fn write_counter(&self, output: &mut String, name: &str, help: &str, value: f64) {
        self.write_family(
            output,
            name,
            help,
            MetricKind::Counter,
            std::iter::once((Vec::new(), value)),
        );
    }

    /// One HELP/TYPE header followed by every series of the family.
    fn write_family<'a>(
        &self,
        output: &mut String,
        name: &str,
        help: &str,
        kind: MetricKind,
        series: impl IntoIterator<Item = (Vec<(&'a str, &'a str)>, f64)>,
    ) {
        let full_name = format!("{}_{}", self.namespace, name);
        let _ = writeln!(output, "# HELP {} {}", full_name, help);
        let _ = writeln!(output, "# TYPE {} {}", full_name, kind.as_str());

        for (labels, value) in series {
            if labels.is_empty() {
                let _ = writeln!(output, "{} {}", full_name, value);
            } else {
                let labels_str = labels
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                let _ = writeln!(output, "{}{{{}}} {}", full_name, labels_str, value);
            }
        }
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
