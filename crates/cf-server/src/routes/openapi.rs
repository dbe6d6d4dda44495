//! OpenAPI document.

use axum::Json;
use utoipa::OpenApi;

use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::info::resolve_media,
        routes::clips::convert_clip,
        routes::clips::extract_audio,
        routes::proxy::proxy,
        routes::archive::download_zip,
        routes::history::list_history,
        routes::history::clear_history,
        routes::tools::tools,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::info::InfoRequest,
        routes::info::InfoResponse,
        routes::clips::ConvertRequest,
        routes::archive::ZipRequest,
        cf_core::MediaKind,
        cf_core::MediaItem,
        cf_core::QualityProfile,
        cf_core::history::HistoryEntry,
        cf_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
