//! OpenAPI documentation configuration.
//!
//! The generated document is served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::api::models::{
    ComponentHealth, CreateEndpointRequest, EndpointListResponse, EventAcceptedResponse,
    ExportFormat, HealthResponse, HistoryResponse, JobListResponse, LivenessResponse,
    LogFilterResponse, TestDeliveryResponse, UpdateLogFilterRequest,
};

/// OpenAPI documentation for the hyperpulse API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "hyperpulse API",
        version = "0.1.0",
        description = "Live operational telemetry for the conversion platform. Serves the current snapshot, a WebSocket feed at /api/live, persisted history and webhook administration.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:12555", description = "Local development server")
    ),
    tags(
        (name = "health", description = "Health check endpoints for monitoring and orchestration"),
        (name = "snapshot", description = "Current platform snapshot"),
        (name = "history", description = "Persisted snapshot history and trends"),
        (name = "jobs", description = "Recently seen jobs"),
        (name = "notifications", description = "Webhook endpoint management"),
        (name = "events", description = "Job lifecycle ingest"),
        (name = "logging", description = "Runtime log filter"),
        (name = "metrics", description = "Prometheus exposition")
    ),
    paths(
        // Health endpoints
        crate::api::routes::health::health_check,
        crate::api::routes::health::readiness_check,
        crate::api::routes::health::liveness_check,
        // Snapshot endpoints
        crate::api::routes::snapshot::get_snapshot,
        // History endpoints
        crate::api::routes::history::get_history,
        crate::api::routes::history::get_trend,
        crate::api::routes::history::get_latest,
        // Job endpoints
        crate::api::routes::jobs::list_jobs,
        crate::api::routes::jobs::get_job,
        // Notification endpoints
        crate::api::routes::notifications::list_endpoints,
        crate::api::routes::notifications::create_endpoint,
        crate::api::routes::notifications::delete_endpoint,
        crate::api::routes::notifications::test_endpoint,
        crate::api::routes::notifications::list_event_kinds,
        crate::api::routes::notifications::get_stats,
        // Event ingest
        crate::api::routes::events::ingest_event,
        // Logging endpoints
        crate::api::routes::logging::get_filter,
        crate::api::routes::logging::update_filter,
        // Metrics
        crate::api::routes::metrics::prometheus_metrics,
    ),
    components(
        schemas(
            // Health schemas
            HealthResponse,
            ComponentHealth,
            LivenessResponse,
            // Error schema
            crate::api::error::ApiErrorResponse,
            // Snapshot schemas
            crate::snapshot::Snapshot,
            crate::snapshot::JobCounts,
            crate::snapshot::ResourceUsage,
            crate::snapshot::VmCounts,
            crate::snapshot::WorkloadCounts,
            crate::snapshot::CarbonStats,
            crate::snapshot::RecentJob,
            crate::snapshot::Alert,
            crate::snapshot::AlertLevel,
            crate::snapshot::SourceStatus,
            crate::snapshot::SourceState,
            crate::snapshot::HealthState,
            // History schemas
            ExportFormat,
            HistoryResponse,
            crate::history::HistoryRecord,
            crate::history::TrendAggregate,
            crate::history::FieldStats,
            // Job schemas
            JobListResponse,
            // Notification schemas
            CreateEndpointRequest,
            EndpointListResponse,
            TestDeliveryResponse,
            crate::notification::NotificationEndpoint,
            crate::notification::EndpointSource,
            crate::notification::EventKind,
            crate::notification::EventKindInfo,
            crate::notification::NotificationStats,
            // Event schemas
            crate::jobs::JobEvent,
            EventAcceptedResponse,
            // Logging schemas
            LogFilterResponse,
            UpdateLogFilterRequest,
        )
    )
)]
pub struct ApiDoc;
