//! History and trend routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ExportFormat, HistoryQuery, HistoryResponse, TrendQuery};
use crate::api::server::AppState;
use crate::history::{
    DEFAULT_HISTORY_RANGE, DEFAULT_TREND_RANGE, HistoryRecord, HistoryStore, TimeRange,
    TrendAggregate, to_csv,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_history))
        .route("/trend", get(get_trend))
        .route("/latest", get(get_latest))
}

fn store(state: &AppState) -> ApiResult<&HistoryStore> {
    state
        .history
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("History is not available: store is disabled"))
}

/// Records in a named or explicit time range, as JSON or CSV.
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History records, ascending by timestamp", body = HistoryResponse),
        (status = 400, description = "Invalid range", body = crate::api::error::ApiErrorResponse),
        (status = 503, description = "History store disabled", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Response> {
    let range = TimeRange::from_query(
        query.range.as_deref(),
        query.start.as_deref(),
        query.end.as_deref(),
        DEFAULT_HISTORY_RANGE,
        Utc::now(),
    )?;
    let records = store(&state)?.get_history(&range).await?;

    match query.format {
        ExportFormat::Json => Ok(Json(HistoryResponse {
            range: range.label,
            start: range.start,
            end: range.end,
            count: records.len(),
            records,
        })
        .into_response()),
        ExportFormat::Csv => {
            let body = to_csv(&records);
            if query.download {
                let disposition = format!("attachment; filename=\"history-{}.csv\"", range.label);
                Ok((
                    [
                        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    body,
                )
                    .into_response())
            } else {
                Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
            }
        }
    }
}

/// Count plus min/max/mean over a time range.
#[utoipa::path(
    get,
    path = "/api/history/trend",
    tag = "history",
    params(TrendQuery),
    responses(
        (status = 200, description = "Trend aggregate", body = TrendAggregate),
        (status = 400, description = "Invalid range", body = crate::api::error::ApiErrorResponse),
        (status = 503, description = "History store disabled", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Json<TrendAggregate>> {
    let range = TimeRange::from_query(
        query.range.as_deref(),
        query.start.as_deref(),
        query.end.as_deref(),
        DEFAULT_TREND_RANGE,
        Utc::now(),
    )?;
    Ok(Json(store(&state)?.get_trend(&range).await?))
}

/// Newest history record.
#[utoipa::path(
    get,
    path = "/api/history/latest",
    tag = "history",
    responses(
        (status = 200, description = "Newest record", body = HistoryRecord),
        (status = 404, description = "No history yet", body = crate::api::error::ApiErrorResponse),
        (status = 503, description = "History store disabled", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_latest(State(state): State<AppState>) -> ApiResult<Json<HistoryRecord>> {
    store(&state)?
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No history records yet"))
}
