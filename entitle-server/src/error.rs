//! API error type implementing [`IntoResponse`].
//!
//! Client endpoints answer domain outcomes with HTTP 200 and a result code in
//! the envelope, so deployed clients switch on `code` alone. Malformed input,
//! operator-route failures and infrastructure errors use real statuses.
//! Internal error details never reach the response body.

use crate::wire::Envelope;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use entitle_license::LicenseError;
use entitle_notify::NotifyError;
use entitle_types::ResultCode;
use thiserror::Error;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body missing, not JSON, or wrong shape (400).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Body exceeds [`crate::BODY_LIMIT`] (413).
    #[error("request body too large")]
    PayloadTooLarge,

    /// License operation refused or failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// Notification queue refused or failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Missing or wrong admin bearer token (401).
    #[error("unauthorized")]
    Unauthorized,

    /// Unknown resource on an operator route (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else that is not the caller's fault (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, ResultCode::InvalidRequest.as_str()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, ResultCode::InvalidRequest.as_str()),
            Self::License(e) if e.is_internal() => {
                (StatusCode::INTERNAL_SERVER_ERROR, ResultCode::InternalError.as_str())
            }
            Self::License(e) => (StatusCode::OK, e.code().as_str()),
            Self::Notify(NotifyError::AlreadyRunning(_) | NotifyError::Starting) => {
                (StatusCode::CONFLICT, "TASK_RUNNING")
            }
            Self::Notify(NotifyError::NotRunning(_)) => (StatusCode::BAD_REQUEST, "TASK_NOT_RUNNING"),
            Self::Notify(NotifyError::TaskNotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Notify(NotifyError::EmptyMessage | NotifyError::NoRecipients) => {
                (StatusCode::BAD_REQUEST, ResultCode::InvalidRequest.as_str())
            }
            Self::Notify(NotifyError::Mail(_) | NotifyError::Background(_) | NotifyError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ResultCode::InternalError.as_str())
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ResultCode::InternalError.as_str()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Envelope {
            success: false,
            code: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
