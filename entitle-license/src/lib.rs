//! License lifecycle engine.
//!
//! This crate handles:
//! - SN requests: email admission, per-origin rate limits and the atomic claim
//! - Free and open-source issuance, minted on demand
//! - Activation: trust-tier resolution, provider selection and the sealed
//!   configuration payload
//! - Usage accounting behind a one-hour per-SN throttle
//! - Interop tokens for partner services
//!
//! # Design Principles
//!
//! - **Synchronous core**: every operation is a short, store-bound call;
//!   async callers run it on a blocking thread
//! - **No mutation on refusal**: policy denials and state errors never write
//! - **Monotonic accounting**: used credits only move up
//! - **Free tiers see no paid credentials**: provider lookup is skipped for
//!   permanent-free and open-source licenses

mod activation;
mod allocation;
mod engine;
mod error;
mod interop;
mod inventory;
mod policy;
mod usage;

pub use activation::{Activation, ActivationPayload, is_valid_on, select_provider};
pub use allocation::{Allocation, IssuedSn, SnRequest};
pub use engine::LicenseEngine;
pub use error::{LicenseError, LicenseResult};
pub use policy::{
    DEFAULT_DAILY_LIMIT, PolicySettings, Routing, SETTING_BLACKLIST_ENABLED,
    SETTING_CONDITIONS_ENABLED, SETTING_DAILY_EMAIL_LIMIT, SETTING_DAILY_REQUEST_LIMIT,
    SETTING_WHITELIST_ENABLED, normalize_email, pattern_matches,
};
pub use usage::{REPORT_INTERVAL_SECS, UsageOutcome};
