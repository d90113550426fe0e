//! Pipeline self-metrics, Prometheus export and health checks.

mod collector;
mod health;
mod prometheus;

pub use collector::{MetricsCollector, MetricsSnapshot};
pub use health::{
    ComponentHealth, HealthCheckFn, HealthChecker, HealthStatus, SystemHealth, collector_check,
    history_check, hub_check,
};
pub use prometheus::PrometheusExporter;
