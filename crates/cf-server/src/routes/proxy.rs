//! Single-asset relay.
//!
//! Re-streams a remote resource so the browser can preview or save media
//! that the origin would not serve cross-site.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Used when the upstream sends no usable content type.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Query parameters for the proxy.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ProxyParams {
    /// Remote URL to relay.
    pub url: Option<String>,
    /// `true` forces an attachment disposition.
    pub download: Option<String>,
}

/// Download name for a relayed asset of `content_type`.
pub fn download_filename(content_type: &str) -> &'static str {
    if content_type.contains("mp4") {
        "twitter_video.mp4"
    } else {
        "twitter_video.bin"
    }
}

/// GET /api/proxy
#[utoipa::path(
    get,
    path = "/api/proxy",
    params(ProxyParams),
    responses(
        (status = 200, description = "Upstream body with its content type"),
        (status = 400, description = "Missing or invalid URL"),
        (status = 500, description = "Upstream fetch failed (empty body)")
    )
)]
pub async fn proxy(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<ProxyParams>,
) -> Result<Response, AppError> {
    let url = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| request_id.error(cf_core::Error::Validation("URL is required".into())))?;

    let media = match ctx.fetcher.fetch(url).await {
        Ok(media) => media,
        Err(e @ cf_core::Error::Validation(_)) => return Err(request_id.error(e)),
        Err(e) => {
            tracing::warn!(url = %url, "Proxy fetch failed: {e}");
            return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let content_type = media
        .content_type()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string();
    let content_length = media.content_length();

    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or(HeaderValue::from_static(FALLBACK_CONTENT_TYPE)),
    );
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if params.download.as_deref() == Some("true") {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            download_filename(&content_type)
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    *response.body_mut() = media.into_body();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_follows_content_type() {
        assert_eq!(download_filename("video/mp4"), "twitter_video.mp4");
        assert_eq!(download_filename("application/x-mpegURL"), "twitter_video.bin");
        assert_eq!(download_filename(FALLBACK_CONTENT_TYPE), "twitter_video.bin");
    }
}
