//! HTTP request handlers.

use super::AppState;
use crate::checks::CheckError;
use crate::db::{DbError, HistoryStore};
use crate::stats::{read_history, read_recent, summarize, StatsError, DEFAULT_RECENT_LIMIT};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn db_error_response(e: DbError, id: i64) -> Response {
    match e {
        DbError::NotFound => error_response(StatusCode::NOT_FOUND, format!("target {} not found", id)),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn stats_error_response(e: StatsError) -> Response {
    match e {
        StatsError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        StatsError::Store(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn handle_root() -> impl IntoResponse {
    "Uptrail API is running"
}

// ============================================================================
// API: Targets
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub server_url: String,
}

impl TargetRequest {
    fn validated(&self) -> Option<(&str, &str)> {
        let name = self.server_name.trim();
        let url = self.server_url.trim();
        if name.is_empty() || url.is_empty() {
            None
        } else {
            Some((name, url))
        }
    }
}

pub async fn handle_list_targets(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_targets() {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn handle_create_target(
    State(state): State<AppState>,
    Json(req): Json<TargetRequest>,
) -> impl IntoResponse {
    let Some((name, url)) = req.validated() else {
        return error_response(StatusCode::BAD_REQUEST, "Name and URL are required");
    };

    match state.store.add_target(name, url) {
        Ok(target) => {
            tracing::info!("Registered target {} ({})", target.name, target.url);
            (StatusCode::CREATED, Json(target)).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn handle_update_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TargetRequest>,
) -> impl IntoResponse {
    let Some((name, url)) = req.validated() else {
        return error_response(StatusCode::BAD_REQUEST, "Name and URL are required");
    };

    match state.store.update_target(id, name, url) {
        Ok(target) => Json(target).into_response(),
        Err(e) => db_error_response(e, id),
    }
}

pub async fn handle_delete_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_target(id) {
        Ok(()) => {
            state.checker.forget(id).await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => db_error_response(e, id),
    }
}

// ============================================================================
// API: History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub status: Option<String>,
}

pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    match read_history(state.store.as_ref(), id, query.limit, query.status.as_deref()) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => stats_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

pub async fn handle_summary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    match summarize(state.store.as_ref(), id, query.days) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => stats_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

pub async fn handle_latest_status(State(state): State<AppState>) -> impl IntoResponse {
    match read_recent(&state.store, Some(DEFAULT_RECENT_LIMIT)) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => stats_error_response(e),
    }
}

pub async fn handle_global_history(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    match read_recent(&state.store, query.limit) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => stats_error_response(e),
    }
}

// ============================================================================
// API: Checks
// ============================================================================

pub async fn handle_run_all(State(state): State<AppState>) -> impl IntoResponse {
    match state.checker.run_all().await {
        Ok(report) => {
            let status = if report.all_failed() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, Json(report)).into_response()
        }
        Err(e) => {
            tracing::error!("Run-all failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn handle_run_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.checker.run_one(id).await {
        Ok(result) => Json(result).into_response(),
        Err(e @ CheckError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
