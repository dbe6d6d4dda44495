//! Batch zip download route handler.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::archive::{stream_archive, ARCHIVE_FILENAME};
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Request body for an archive.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ZipRequest {
    /// Remote URLs, bundled in this order.
    #[schema(value_type = Option<Vec<String>>)]
    pub urls: Option<Value>,
}

/// Extract a non-empty list of URL strings.
fn url_list(urls: Option<Value>) -> cf_core::Result<Vec<String>> {
    let invalid = || cf_core::Error::Validation("URLs array is required".into());

    let Some(Value::Array(items)) = urls else {
        return Err(invalid());
    };
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            _ => Err(invalid()),
        })
        .collect()
}

/// POST /api/zip
#[utoipa::path(
    post,
    path = "/api/zip",
    request_body = ZipRequest,
    responses(
        (status = 200, description = "Zip attachment, streamed"),
        (status = 400, description = "Missing, empty or malformed URL list")
    )
)]
pub async fn download_zip(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ZipRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|e| request_id.error(e))?;
    let urls = url_list(payload.urls).map_err(|e| request_id.error(e))?;

    tracing::info!(count = urls.len(), "Archive requested");

    let stream = stream_archive(ctx.fetcher.clone(), urls);
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{ARCHIVE_FILENAME}\""),
        ),
    ];
    Ok((headers, Body::from_stream(stream)).into_response())
}
