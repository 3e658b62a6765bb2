//! Client-facing endpoints: SN requests, activation, usage and interop.
//!
//! Refusals come back as HTTP 200 with `success: false` and a result code;
//! see [`crate::ApiError`].

use super::{blocking, parse_body};
use crate::AppState;
use crate::error::ApiResult;
use crate::origin::ClientAddr;
use crate::wire::{
    ActivateResponse, InteropAuthBody, InteropAuthResponse, InteropVerifyBody,
    InteropVerifyResponse, ReportUsageBody, RequestSnBody, SnBody, SnResponse, UsageResponse,
};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use entitle_crypto::TOKEN_TTL_SECS;
use entitle_license::{Allocation, SnRequest, UsageOutcome};
use entitle_notify::dispatch_sn_email;
use entitle_types::{BindingKind, ResultCode};
use std::sync::Arc;
use tracing::info;

// ── SN requests ──────────────────────────────────────────────────

/// `POST /request-sn`
pub async fn request_sn(
    State(state): State<Arc<AppState>>,
    ClientAddr(origin): ClientAddr,
    payload: Result<Json<RequestSnBody>, JsonRejection>,
) -> ApiResult<Json<SnResponse>> {
    let req = sn_request(parse_body(payload)?, origin);
    let worker = state.clone();
    let allocation = blocking(move || Ok(worker.engine.request_sn(&req)?)).await?;
    Ok(Json(allocation_response(&state, allocation)))
}

/// `POST /request-free-sn`
pub async fn request_free_sn(
    State(state): State<Arc<AppState>>,
    ClientAddr(origin): ClientAddr,
    payload: Result<Json<RequestSnBody>, JsonRejection>,
) -> ApiResult<Json<SnResponse>> {
    request_pool_sn(state, origin, parse_body(payload)?, BindingKind::Free).await
}

/// `POST /request-oss-sn`
pub async fn request_oss_sn(
    State(state): State<Arc<AppState>>,
    ClientAddr(origin): ClientAddr,
    payload: Result<Json<RequestSnBody>, JsonRejection>,
) -> ApiResult<Json<SnResponse>> {
    request_pool_sn(state, origin, parse_body(payload)?, BindingKind::Oss).await
}

async fn request_pool_sn(
    state: Arc<AppState>,
    origin: String,
    body: RequestSnBody,
    kind: BindingKind,
) -> ApiResult<Json<SnResponse>> {
    let req = sn_request(body, origin);
    let worker = state.clone();
    let allocation = blocking(move || Ok(worker.engine.request_free_sn(&req, kind)?)).await?;
    Ok(Json(allocation_response(&state, allocation)))
}

fn sn_request(body: RequestSnBody, origin: String) -> SnRequest {
    SnRequest {
        email: body.email,
        product_id: body.product_id,
        origin,
    }
}

fn allocation_response(state: &AppState, allocation: Allocation) -> SnResponse {
    let code = allocation.code();
    let sn = allocation.sn().to_string();
    let message = match &allocation {
        Allocation::Issued(_) => "SN issued",
        Allocation::AlreadyBound(_) => "this email already holds an SN for the product",
        Allocation::Existing(_) => "existing SN returned",
    };

    if let Allocation::Issued(issued) = allocation {
        info!(sn = %issued.sn, kind = %issued.kind, product_id = issued.product_id, "SN issued");
        dispatch_sn_email(state.mailer.clone(), issued);
    }

    SnResponse {
        success: code.is_success(),
        code,
        message: message.to_string(),
        sn: Some(sn),
    }
}

// ── Activation ───────────────────────────────────────────────────

/// `POST /activate`
pub async fn activate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SnBody>, JsonRejection>,
) -> ApiResult<Json<ActivateResponse>> {
    let body = parse_body(payload)?;
    let activation = blocking(move || Ok(state.engine.activate(&body.sn)?)).await?;

    Ok(Json(ActivateResponse {
        success: true,
        code: ResultCode::Success,
        message: "activated".to_string(),
        encrypted_data: Some(activation.encrypted_data),
        expires_at: activation.expires_at,
    }))
}

// ── Usage ────────────────────────────────────────────────────────

/// `POST /report-usage`
pub async fn report_usage(
    State(state): State<Arc<AppState>>,
    ClientAddr(origin): ClientAddr,
    payload: Result<Json<ReportUsageBody>, JsonRejection>,
) -> ApiResult<Json<UsageResponse>> {
    let body = parse_body(payload)?;
    let outcome =
        blocking(move || Ok(state.engine.report_usage(&body.sn, body.used_credits, &origin)?))
            .await?;

    let code = match outcome {
        UsageOutcome::Recorded => None,
        UsageOutcome::Throttled => Some(ResultCode::Throttled),
    };
    Ok(Json(UsageResponse {
        success: true,
        code,
    }))
}

// ── Interop ──────────────────────────────────────────────────────

/// `POST /api/interop/auth`
pub async fn interop_auth(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InteropAuthBody>, JsonRejection>,
) -> ApiResult<Json<InteropAuthResponse>> {
    let body = parse_body(payload)?;
    let token =
        blocking(move || Ok(state.engine.issue_interop_token(&body.sn, &body.email)?)).await?;

    Ok(Json(InteropAuthResponse {
        success: true,
        token,
        expires_in: TOKEN_TTL_SECS,
    }))
}

/// `POST /api/interop/verify`
pub async fn interop_verify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InteropVerifyBody>, JsonRejection>,
) -> ApiResult<Json<InteropVerifyResponse>> {
    let body = parse_body(payload)?;
    let claims = state.engine.verify_interop_token(&body.token)?;

    Ok(Json(InteropVerifyResponse {
        success: true,
        sn: claims.sn,
        email: claims.email,
    }))
}
