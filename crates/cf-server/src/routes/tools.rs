//! External tool availability.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;
use crate::error::AppError;

/// GET /api/tools
#[utoipa::path(
    get,
    path = "/api/tools",
    responses(
        (status = 200, description = "List external tool availability", body = Vec<cf_av::ToolInfo>)
    )
)]
pub async fn tools(State(ctx): State<AppContext>) -> Result<Json<Vec<cf_av::ToolInfo>>, AppError> {
    // Version detection spawns the tool synchronously.
    let registry = ctx.tools.clone();
    let infos = tokio::task::spawn_blocking(move || registry.check_all())
        .await
        .map_err(|e| cf_core::Error::Internal(format!("tool check panicked: {e}")))?;
    Ok(Json(infos))
}
