//! Recent job routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::JobListResponse;
use crate::api::server::AppState;
use crate::jobs::JobBoard;
use crate::snapshot::RecentJob;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/{id}", get(get_job))
}

fn job_board(state: &AppState) -> ApiResult<&Arc<JobBoard>> {
    state
        .job_board
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Job tracking not available"))
}

/// Recently seen jobs, oldest first.
#[utoipa::path(
    get,
    path = "/api/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "Recent jobs", body = JobListResponse)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<JobListResponse>> {
    let jobs = job_board(&state)?.recent_jobs();
    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs,
        timestamp: Utc::now(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Latest state of the job", body = RecentJob),
        (status = 404, description = "Job not in the recent list", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecentJob>> {
    job_board(&state)?
        .job(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job with id '{}' not found", id)))
}
