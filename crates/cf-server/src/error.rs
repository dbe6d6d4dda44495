//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`cf_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on library calls.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: cf_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: cf_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &cf_core::Error {
        &self.inner
    }
}

impl From<cf_core::Error> for AppError {
    fn from(e: cf_core::Error) -> Self {
        Self::new(e)
    }
}

/// A body that is missing, untyped or not the expected JSON is a validation
/// failure like any other bad input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(cf_core::Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
