//! Axum router construction.
//!
//! Builds the full application router with all routes, middleware layers,
//! and static file serving for the browser UI.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/info", post(routes::info::resolve_media))
        .route("/convert", post(routes::clips::convert_clip))
        .route("/audio", get(routes::clips::extract_audio))
        .route("/proxy", get(routes::proxy::proxy))
        .route("/zip", post(routes::archive::download_zip))
        .route(
            "/history",
            get(routes::history::list_history).delete(routes::history::clear_history),
        )
        .route("/tools", get(routes::tools::tools));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(routes::openapi::openapi_json))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        } else {
            tracing::debug!("Static directory {:?} not found; UI disabled", dir);
        }
    }

    app
}
