//! API route modules.
//!
//! Organizes routes by resource type.

pub mod events;
pub mod health;
pub mod history;
pub mod jobs;
pub mod live;
pub mod logging;
pub mod metrics;
pub mod notifications;
pub mod snapshot;

use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::api::openapi::ApiDoc;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/snapshot", snapshot::router())
        .nest("/api/live", live::router())
        .nest("/api/history", history::router())
        .nest("/api/jobs", jobs::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/events", events::router())
        .nest("/api/logging", logging::router())
        .route("/api/openapi.json", get(openapi_json))
        .merge(metrics::router())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
