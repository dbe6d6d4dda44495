//! Lookup history route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use cf_core::history::HistoryEntry;

use crate::context::AppContext;

/// GET /api/history
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, description = "Recent lookups, newest first", body = Vec<HistoryEntry>)
    )
)]
pub async fn list_history(State(ctx): State<AppContext>) -> Json<Vec<HistoryEntry>> {
    Json(ctx.history.list())
}

/// DELETE /api/history
#[utoipa::path(
    delete,
    path = "/api/history",
    responses(
        (status = 204, description = "History cleared")
    )
)]
pub async fn clear_history(State(ctx): State<AppContext>) -> StatusCode {
    let history = ctx.history.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || history.clear()).await {
        tracing::warn!("History clear task failed: {e}");
    }
    StatusCode::NO_CONTENT
}
