//! Job lifecycle ingest.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::EventAcceptedResponse;
use crate::api::server::AppState;
use crate::jobs::JobEvent;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(ingest_event))
}

/// Accept one lifecycle event from the job engine.
///
/// The event updates the job board and is delivered to matching
/// notification endpoints asynchronously.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "events",
    request_body = JobEvent,
    responses(
        (status = 202, description = "Event accepted", body = EventAcceptedResponse),
        (status = 422, description = "Invalid event", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    payload: Result<Json<JobEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EventAcceptedResponse>)> {
    let broadcaster = state
        .job_events
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Event ingest not available"))?;
    let Json(event) = payload?;
    event.validate()?;

    let kind = event.kind();
    let job_id = event.job_id().to_string();
    let listeners = broadcaster.publish(event);
    if let Some(metrics) = &state.metrics {
        metrics.record_event_ingested(kind.as_str());
    }
    debug!(kind = %kind, job_id = %job_id, listeners, "Ingested job event");

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAcceptedResponse {
            accepted: true,
            kind: kind.as_str().to_string(),
            job_id,
        }),
    ))
}
