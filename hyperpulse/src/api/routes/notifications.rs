//! Notification endpoint administration routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateEndpointRequest, EndpointListResponse, TestDeliveryResponse};
use crate::api::server::AppState;
use crate::notification::{
    DeliveryOutcome, EventKindInfo, NotificationDispatcher, NotificationEndpoint,
    NotificationStats, event_kinds,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/endpoints", get(list_endpoints).post(create_endpoint))
        .route("/endpoints/{id}", delete(delete_endpoint))
        .route("/endpoints/{id}/test", post(test_endpoint))
        .route("/event-kinds", get(list_event_kinds))
        .route("/stats", get(get_stats))
}

fn dispatcher(state: &AppState) -> ApiResult<&Arc<NotificationDispatcher>> {
    state
        .dispatcher
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Notification service not available"))
}

#[utoipa::path(
    get,
    path = "/api/notifications/endpoints",
    tag = "notifications",
    responses(
        (status = 200, description = "Registered endpoints", body = EndpointListResponse)
    )
)]
pub async fn list_endpoints(
    State(state): State<AppState>,
) -> ApiResult<Json<EndpointListResponse>> {
    let endpoints = dispatcher(&state)?.list_endpoints();
    Ok(Json(EndpointListResponse {
        total: endpoints.len(),
        endpoints,
        timestamp: Utc::now(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/endpoints",
    tag = "notifications",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created", body = NotificationEndpoint),
        (status = 422, description = "Invalid endpoint", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn create_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<CreateEndpointRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<NotificationEndpoint>)> {
    let Json(request) = payload?;
    let endpoint = dispatcher(&state)?
        .add_endpoint(request.into_endpoint())
        .await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/endpoints/{id}",
    tag = "notifications",
    params(("id" = String, Path, description = "Endpoint ID")),
    responses(
        (status = 204, description = "Endpoint removed"),
        (status = 404, description = "Endpoint not found", body = crate::api::error::ApiErrorResponse),
        (status = 409, description = "Endpoint comes from configuration", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    dispatcher(&state)?.remove_endpoint(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a synthetic `test` event to one endpoint with a single attempt.
#[utoipa::path(
    post,
    path = "/api/notifications/endpoints/{id}/test",
    tag = "notifications",
    params(("id" = String, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Delivery result", body = TestDeliveryResponse),
        (status = 404, description = "Endpoint not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn test_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TestDeliveryResponse>> {
    let report = dispatcher(&state)?.test_delivery(&id).await?;
    let error = match report.outcome {
        DeliveryOutcome::Delivered => None,
        DeliveryOutcome::Exhausted { ref last_error } => Some(last_error.clone()),
        DeliveryOutcome::Cancelled => Some("delivery cancelled".to_string()),
    };
    Ok(Json(TestDeliveryResponse {
        success: error.is_none(),
        error,
        attempts: report.attempt_count(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/notifications/event-kinds",
    tag = "notifications",
    responses(
        (status = 200, description = "Known event kinds", body = Vec<EventKindInfo>)
    )
)]
pub async fn list_event_kinds() -> Json<Vec<EventKindInfo>> {
    Json(event_kinds())
}

#[utoipa::path(
    get,
    path = "/api/notifications/stats",
    tag = "notifications",
    responses(
        (status = 200, description = "Dispatcher counters", body = NotificationStats)
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<NotificationStats>> {
    Ok(Json(dispatcher(&state)?.stats()))
}
