//! Core type definitions for the entitlement server.
//!
//! This crate defines the small vocabulary shared by every other crate:
//! - Serial numbers (normalization and generation)
//! - Trust tiers, binding kinds and provider families
//! - Wire result codes returned to clients
//! - An injectable clock so time-dependent rules can be tested

mod clock;
mod code;
mod sn;
mod tier;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::ResultCode;
pub use sn::{Sn, SN_ALPHABET, SN_GROUP_LEN, SN_GROUPS};
pub use tier::{BindingKind, ProviderFamily, TrustTier};

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}
