//! Media resolution route handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use cf_core::{MediaItem, MediaKind};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Request body for a media lookup.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct InfoRequest {
    /// Post URL to resolve.
    pub url: Option<String>,
}

/// Media found for a post.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct InfoResponse {
    pub found: bool,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// First item, for the preview player.
    pub video_url: String,
    pub variants: Vec<MediaItem>,
}

/// POST /api/info
#[utoipa::path(
    post,
    path = "/api/info",
    request_body = InfoRequest,
    responses(
        (status = 200, description = "Media resolved", body = InfoResponse),
        (status = 400, description = "Missing URL"),
        (status = 404, description = "No media in the post"),
        (status = 500, description = "Resolver failure")
    )
)]
pub async fn resolve_media(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> Result<Json<InfoResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| request_id.error(e))?;
    let url = payload
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| request_id.error(cf_core::Error::Validation("URL is required".into())))?;

    let descriptor = ctx
        .resolver
        .resolve(url)
        .await
        .and_then(|d| d.into_usable(url))
        .map_err(|e| request_id.error(e))?;

    let history = ctx.history.clone();
    let (page, recorded) = (url.to_string(), descriptor.clone());
    if let Err(e) = tokio::task::spawn_blocking(move || history.record(&page, &recorded)).await {
        tracing::warn!("History update task failed: {e}");
    }

    let video_url = descriptor
        .primary()
        .map(|item| item.url.clone())
        .unwrap_or_default();

    Ok(Json(InfoResponse {
        found: true,
        kind: descriptor.kind,
        video_url,
        variants: descriptor.items,
    }))
}
