//! JSON request and response bodies.
//!
//! Field names are camelCase; the snake_case spellings older clients send are
//! accepted as aliases.

use entitle_types::ResultCode;
use serde::{Deserialize, Serialize};

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnBody {
    pub email: String,
    #[serde(default, alias = "product_id")]
    pub product_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnBody {
    pub sn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUsageBody {
    pub sn: String,
    #[serde(alias = "used_credits")]
    pub used_credits: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteropAuthBody {
    pub sn: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteropVerifyBody {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTaskBody {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default, alias = "product_id")]
    pub product_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicensesBody {
    pub count: usize,
    #[serde(default, alias = "product_id")]
    pub product_id: i64,
    #[serde(default, alias = "valid_days")]
    pub valid_days: Option<i64>,
    #[serde(default, alias = "daily_analysis")]
    pub daily_analysis: Option<i64>,
    #[serde(default, alias = "total_credits")]
    pub total_credits: f64,
    #[serde(default, alias = "credits_mode")]
    pub credits_mode: bool,
    #[serde(default, alias = "license_group_id")]
    pub license_group_id: Option<String>,
    #[serde(default, alias = "llm_group_id")]
    pub llm_group_id: Option<String>,
    #[serde(default, alias = "search_group_id")]
    pub search_group_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActiveBody {
    pub sn: String,
    pub active: bool,
}

// ── Responses ────────────────────────────────────────────────────

/// Failure body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnResponse {
    pub success: bool,
    pub code: ResultCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub success: bool,
    pub code: ResultCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ResultCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropAuthResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteropVerifyResponse {
    pub success: bool,
    pub sn: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTaskResponse {
    pub task_id: i64,
    pub total_count: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyProgressResponse {
    pub task_id: i64,
    pub subject: String,
    pub status: String,
    pub total_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicensesResponse {
    pub sns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
