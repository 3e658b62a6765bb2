//! HTTP API for the entitlement server.
//!
//! Client routes (`/request-sn`, `/activate`, ...) are public and answer with
//! the `{success, code, message}` envelope. Operator routes under `/admin`
//! require a bearer token. Store work runs on the blocking pool so the
//! runtime threads only ever wait on I/O.

mod auth;
mod error;
mod origin;
pub mod routes;
pub mod wire;

pub use error::{ApiError, ApiResult};
pub use origin::ClientAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use entitle_license::LicenseEngine;
use entitle_notify::{Mailer, SendQueue};
use routes::{admin, client};
use std::sync::Arc;
use wire::HealthResponse;

/// Maximum accepted request body.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Shared handler state.
pub struct AppState {
    pub engine: LicenseEngine,
    pub queue: SendQueue,
    /// Delivers "your SN" emails after an issue.
    pub mailer: Arc<dyn Mailer>,
    /// Bearer token for `/admin`; `None` locks the operator routes.
    pub admin_token: Option<String>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Build the HTTP router with the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/admin/licenses", post(admin::create_licenses))
        .route("/admin/licenses/active", post(admin::set_active))
        .route("/admin/licenses/delete", post(admin::force_delete))
        .route("/admin/licenses/purge-disabled", post(admin::purge_disabled))
        .route("/admin/notify/tasks", post(admin::start_task))
        .route("/admin/notify/tasks/{id}", get(admin::task_progress))
        .route("/admin/notify/tasks/{id}/cancel", post(admin::cancel_task))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/request-sn", post(client::request_sn))
        .route("/request-free-sn", post(client::request_free_sn))
        .route("/request-oss-sn", post(client::request_oss_sn))
        .route("/activate", post(client::activate))
        .route("/report-usage", post(client::report_usage))
        .route("/api/interop/auth", post(client::interop_auth))
        .route("/api/interop/verify", post(client::interop_verify));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
