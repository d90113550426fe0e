//! Current snapshot route.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::snapshot::Snapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_snapshot))
}

/// The most recently collected snapshot.
#[utoipa::path(
    get,
    path = "/api/snapshot",
    tag = "snapshot",
    responses(
        (status = 200, description = "Current snapshot", body = Snapshot),
        (status = 503, description = "Collector not running", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_snapshot(State(state): State<AppState>) -> ApiResult<Json<Arc<Snapshot>>> {
    let reader = state
        .snapshot
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Snapshot collection is not running"))?;
    Ok(Json(reader.current()))
}
