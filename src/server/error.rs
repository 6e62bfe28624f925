//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`reelstream_common::Error`] so that route
//! handlers can return `Result<T, AppError>` directly. Only errors raised
//! before a response is produced come through here; failures after the
//! headers are committed are handled by the streaming body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reelstream_common::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
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
                "Server error in streaming handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelstream_common::RangeError;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(Error::not_found("file", "/media/x.mkv"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn missing_range_produces_400() {
        let err = AppError::from(Error::from(RangeError::MissingRange));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn spawn_failure_produces_500() {
        let err = AppError::new(Error::spawn("ffmpeg", "failed to spawn: not found"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn overloaded_produces_503() {
        let err = AppError::new(Error::Overloaded("full".into()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
