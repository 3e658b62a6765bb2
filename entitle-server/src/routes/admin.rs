//! Operator endpoints: inventory maintenance and notification tasks.
//!
//! Mounted behind [`crate::auth::require_admin`].

use super::{blocking, parse_body};
use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::wire::{
    AckResponse, CreateLicensesBody, CreateLicensesResponse, NotifyProgressResponse,
    NotifyTaskBody, NotifyTaskResponse, PurgeResponse, SetActiveBody, SnBody,
};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use entitle_license::LicenseError;
use entitle_notify::{NewTask, TaskProgress};
use entitle_store::time::format_timestamp;
use entitle_store::{DEFAULT_DAILY_ANALYSIS, DEFAULT_VALID_DAYS, FREE_VALID_DAYS, NewLicense};
use entitle_types::Sn;
use std::sync::Arc;

/// Largest batch accepted by `POST /admin/licenses`.
pub const MAX_LICENSE_BATCH: usize = 1000;

// ── Inventory ────────────────────────────────────────────────────

/// `POST /admin/licenses`
pub async fn create_licenses(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLicensesBody>, JsonRejection>,
) -> ApiResult<Json<CreateLicensesResponse>> {
    let body = parse_body(payload)?;
    if body.count == 0 || body.count > MAX_LICENSE_BATCH {
        return Err(ApiError::InvalidRequest(format!(
            "count must be between 1 and {MAX_LICENSE_BATCH}"
        )));
    }

    let valid_days = body.valid_days.unwrap_or(DEFAULT_VALID_DAYS);
    if !(1..=FREE_VALID_DAYS).contains(&valid_days) {
        return Err(ApiError::InvalidRequest(format!(
            "validDays must be between 1 and {FREE_VALID_DAYS}"
        )));
    }

    let count = body.count;
    let template = NewLicense {
        valid_days,
        description: body.description,
        daily_analysis: body.daily_analysis.unwrap_or(DEFAULT_DAILY_ANALYSIS),
        total_credits: body.total_credits,
        credits_mode: body.credits_mode,
        product_id: body.product_id.max(0),
        license_group_id: body.license_group_id,
        llm_group_id: body.llm_group_id,
        search_group_id: body.search_group_id,
        ..NewLicense::new(Sn::generate())
    };

    let sns = blocking(move || Ok(state.engine.create_licenses(count, &template)?)).await?;
    Ok(Json(CreateLicensesResponse {
        sns: sns.into_iter().map(Sn::into_string).collect(),
    }))
}

/// `POST /admin/licenses/active`
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetActiveBody>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let body = parse_body(payload)?;
    blocking(move || state.engine.set_sn_active(&body.sn, body.active).map_err(unknown_sn)).await?;
    Ok(Json(AckResponse { success: true }))
}

/// `POST /admin/licenses/delete`
pub async fn force_delete(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SnBody>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let body = parse_body(payload)?;
    blocking(move || state.engine.force_delete_sn(&body.sn).map_err(unknown_sn)).await?;
    Ok(Json(AckResponse { success: true }))
}

/// `POST /admin/licenses/purge-disabled`
pub async fn purge_disabled(State(state): State<Arc<AppState>>) -> ApiResult<Json<PurgeResponse>> {
    let purged = blocking(move || Ok(state.engine.purge_unused_disabled()?)).await?;
    Ok(Json(PurgeResponse { purged }))
}

fn unknown_sn(err: LicenseError) -> ApiError {
    match err {
        LicenseError::InvalidSn => ApiError::NotFound("SN".to_string()),
        other => other.into(),
    }
}

// ── Notification tasks ───────────────────────────────────────────

/// `POST /admin/notify/tasks`
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NotifyTaskBody>, JsonRejection>,
) -> ApiResult<Json<NotifyTaskResponse>> {
    let body = parse_body(payload)?;
    let task_id = state.queue.start(NewTask {
        subject: body.subject,
        body: body.body,
        emails: body.emails,
        product_id: body.product_id,
    })
    .await?;

    let progress = state
        .queue
        .progress(task_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("task {task_id} vanished after start")))?;

    Ok(Json(NotifyTaskResponse {
        task_id,
        total_count: progress.task.total_count,
        status: progress.task.status.to_string(),
    }))
}

/// `GET /admin/notify/tasks/{id}`
pub async fn task_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<NotifyProgressResponse>> {
    let progress = state
        .queue
        .progress(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    Ok(Json(progress_response(progress)))
}

/// `POST /admin/notify/tasks/{id}/cancel`
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<AckResponse>> {
    state.queue.cancel(task_id)?;
    Ok(Json(AckResponse { success: true }))
}

fn progress_response(progress: TaskProgress) -> NotifyProgressResponse {
    let TaskProgress { task, counts } = progress;
    NotifyProgressResponse {
        task_id: task.id,
        subject: task.subject,
        status: task.status.to_string(),
        total_count: task.total_count,
        sent_count: task.sent_count,
        failed_count: task.failed_count,
        pending: counts.pending,
        sent: counts.sent,
        failed: counts.failed,
        cancelled: counts.cancelled,
        created_at: format_timestamp(task.created_at),
        completed_at: task.completed_at.map(format_timestamp),
    }
}
