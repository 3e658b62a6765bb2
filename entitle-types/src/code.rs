//! Result codes carried in every client response envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable outcome of a client request.
///
/// Serialized as `SCREAMING_SNAKE_CASE` (`"NO_AVAILABLE_SN"`), which is the
/// form deployed clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Success,
    InvalidRequest,
    InvalidSn,
    SnDisabled,
    SnExpired,
    EncryptFailed,
    InvalidEmail,
    EmailBlacklisted,
    EmailNotWhitelisted,
    EmailAlreadyUsed,
    NoAvailableSn,
    RateLimitExceeded,
    EmailLimitExceeded,
    InvalidValue,
    /// Soft success: the usage report arrived inside the minimum interval.
    Throttled,
    EmailMismatch,
    InvalidToken,
    TokenExpired,
    InternalError,
}

impl ResultCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidSn => "INVALID_SN",
            Self::SnDisabled => "SN_DISABLED",
            Self::SnExpired => "SN_EXPIRED",
            Self::EncryptFailed => "ENCRYPT_FAILED",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::EmailBlacklisted => "EMAIL_BLACKLISTED",
            Self::EmailNotWhitelisted => "EMAIL_NOT_WHITELISTED",
            Self::EmailAlreadyUsed => "EMAIL_ALREADY_USED",
            Self::NoAvailableSn => "NO_AVAILABLE_SN",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::EmailLimitExceeded => "EMAIL_LIMIT_EXCEEDED",
            Self::InvalidValue => "INVALID_VALUE",
            Self::Throttled => "THROTTLED",
            Self::EmailMismatch => "EMAIL_MISMATCH",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true for codes reported with `success: true`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Throttled | Self::EmailAlreadyUsed)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
