//! Bearer-token guard for operator routes.

use crate::AppState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Rejects requests without `Authorization: Bearer <admin token>`.
///
/// With no admin token configured every operator route answers 401.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        warn!(path = %request.uri().path(), "admin route called but no admin token is configured");
        return ApiError::Unauthorized.into_response();
    };

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token_eq(token, expected));

    if !authorized {
        warn!(path = %request.uri().path(), "rejected admin request");
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

fn token_eq(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
