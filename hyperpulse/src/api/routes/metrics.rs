//! Prometheus scrape endpoint.

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::api::error::ApiError;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(prometheus_metrics))
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Prometheus text exposition", body = String, content_type = "text/plain")
    )
)]
pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.exporter {
        Some(exporter) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            exporter.export(),
        )
            .into_response(),
        None => ApiError::service_unavailable("Metrics not available").into_response(),
    }
}
