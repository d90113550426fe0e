//! Runtime log filter routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LogFilterResponse, UpdateLogFilterRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/filter", get(get_filter).put(update_filter))
}

#[utoipa::path(
    get,
    path = "/api/logging/filter",
    tag = "logging",
    responses(
        (status = 200, description = "Active filter directive", body = LogFilterResponse)
    )
)]
pub async fn get_filter(State(state): State<AppState>) -> ApiResult<Json<LogFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))?;
    Ok(Json(LogFilterResponse {
        filter: config.get_filter(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/logging/filter",
    tag = "logging",
    request_body = UpdateLogFilterRequest,
    responses(
        (status = 200, description = "Filter updated", body = LogFilterResponse),
        (status = 422, description = "Invalid directive", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn update_filter(
    State(state): State<AppState>,
    payload: Result<Json<UpdateLogFilterRequest>, JsonRejection>,
) -> ApiResult<Json<LogFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging configuration not available"))?;
    let Json(request) = payload?;
    config.set_filter(&request.filter)?;
    Ok(Json(LogFilterResponse {
        filter: config.get_filter(),
    }))
}
