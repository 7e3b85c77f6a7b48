//! Chat query, export and history endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Query};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::export::render_csv;
use crate::nlq::QueryOrchestrator;
use crate::ports::{HistoryStore, HistorySummary, QueryExecutor};
use crate::server::error::ApiError;
use crate::types::{CallerIdentity, QueryAnswer, QueryRequest};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Shared handles for every handler.
pub struct AppState {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub history: Arc<dyn HistoryStore>,
    pub executor: Arc<dyn QueryExecutor>,
}

#[derive(Debug, Deserialize)]
pub struct ChatQueryBody {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
}

#[derive(Serialize)]
pub struct QuerySuccess {
    pub success: bool,
    #[serde(flatten)]
    pub answer: QueryAnswer,
}

#[derive(Serialize)]
pub struct HistoryList {
    pub success: bool,
    pub history: Vec<HistorySummary>,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(b)| b).map_err(|e| {
        info!("malformed request body: {}", e);
        ApiError::missing_field("body", "Request body must be a JSON object")
    })
}

/// POST /api/chat/query
pub async fn chat_query(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    body: Result<Json<ChatQueryBody>, JsonRejection>,
) -> Result<Json<QuerySuccess>, ApiError> {
    let body = json_body(body)?;
    if body.query.trim().is_empty() {
        return Err(ApiError::missing_field("query", "Query is required"));
    }

    let request = QueryRequest::new(body.query, caller);
    let answer = state.orchestrator.answer(&request).await?;
    Ok(Json(QuerySuccess {
        success: true,
        answer,
    }))
}

/// POST /api/chat/download
pub async fn chat_download(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(body)?;
    if body.query.trim().is_empty() {
        return Err(ApiError::missing_field("query", "Query is required"));
    }
    if body.sql.trim().is_empty() {
        return Err(ApiError::missing_field("sql", "SQL query is required for export"));
    }

    let rows = state
        .orchestrator
        .rerun(&body.sql, &caller)
        .await
        .map_err(|e| ApiError::Export(e.to_string()))?;

    let file = render_csv(&rows, &body.query, caller.role).map_err(|e| {
        error!("export rendering failed: {}", e);
        ApiError::Export(e.to_string())
    })?;
    info!(rows = rows.len(), filename = %file.filename, "export ready");

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

/// GET /api/chat/history
pub async fn chat_history(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryList>, ApiError> {
    let limit = history_limit(params.limit.as_deref());
    let history = state.history.recent(&caller, limit).await.map_err(|e| {
        error!("chat history lookup failed: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(HistoryList {
        success: true,
        history,
    }))
}

/// Parse `?limit=`; unparsable falls back to the default, then clamp.
pub fn history_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// GET /health
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.executor.ping().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("Route {} {} not found", method, uri.path()))
}
