//! Clip conversion and audio extraction route handlers.
//!
//! Both stream the transcoded file as an attachment. Errors raised before
//! the first byte become JSON error responses; the scratch workspace is
//! released once the body has been sent or dropped.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use cf_core::ConversionRequest;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Request body for a GIF conversion.
///
/// Numeric fields accept numbers or numeric strings; anything unusable falls
/// back to a 0 s start and a 3 s duration.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ConvertRequest {
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub start: Option<Value>,
    #[schema(value_type = Option<f64>)]
    pub duration: Option<Value>,
    /// `balanced` (default), `high` or `retro`.
    #[schema(value_type = Option<String>)]
    pub quality: Option<Value>,
}

/// Query parameters for audio extraction.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct AudioParams {
    /// Video URL to extract from.
    pub url: Option<String>,
}

/// POST /api/convert
#[utoipa::path(
    post,
    path = "/api/convert",
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Animated GIF attachment"),
        (status = 400, description = "Missing or invalid video URL"),
        (status = 500, description = "Download or transcode failed")
    )
)]
pub async fn convert_clip(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|e| request_id.error(e))?;
    let request = ConversionRequest::from_lenient(
        payload.video_url.as_deref(),
        payload.start.as_ref(),
        payload.duration.as_ref(),
        payload.quality.as_ref().and_then(Value::as_str),
    )
    .map_err(|e| request_id.error(e))?;

    tracing::info!(
        url = %request.source_url,
        start = request.window.start_secs,
        duration = request.window.duration_secs,
        quality = %request.profile,
        "Clip conversion requested"
    );

    let output = ctx
        .converter
        .convert(&request)
        .await
        .map_err(|e| request_id.error(e))?;
    Ok(output.into_response())
}

/// GET /api/audio
#[utoipa::path(
    get,
    path = "/api/audio",
    params(AudioParams),
    responses(
        (status = 200, description = "MP3 attachment"),
        (status = 400, description = "Missing or invalid URL"),
        (status = 500, description = "Download or transcode failed")
    )
)]
pub async fn extract_audio(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<AudioParams>,
) -> Result<Response, AppError> {
    let url = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| request_id.error(cf_core::Error::Validation("URL is required".into())))?;

    tracing::info!(url = %url, "Audio extraction requested");

    let output = ctx
        .converter
        .extract_audio(url)
        .await
        .map_err(|e| request_id.error(e))?;
    Ok(output.into_response())
}
