//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::models::{ComponentHealth, HealthResponse, LivenessResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Full health report.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Component health report", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_secs = state.start_time.elapsed().as_secs();

    let Some(health_checker) = &state.health_checker else {
        return Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            components: vec![],
        });
    };

    let system_health = health_checker.check_all().await;
    let mut components: Vec<ComponentHealth> = system_health
        .components
        .into_iter()
        .map(|(name, health)| ComponentHealth {
            name,
            status: health.status.to_string(),
            message: health.message,
        })
        .collect();
    components.sort_by(|a, b| a.name.cmp(&b.name));

    Json(HealthResponse {
        status: system_health.status.to_string(),
        version: system_health.version,
        uptime_secs,
        cpu_usage: system_health.cpu_usage,
        memory_usage: system_health.memory_usage,
        components,
    })
}

/// Readiness probe: 200 when healthy or degraded, 503 otherwise.
#[utoipa::path(
    get,
    path = "/api/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve traffic"),
        (status = 503, description = "Not ready")
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = match &state.health_checker {
        Some(health_checker) => health_checker.check_ready().await,
        None => true,
    };
    if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is responsive", body = LivenessResponse)
    )
)]
pub async fn liveness_check(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
