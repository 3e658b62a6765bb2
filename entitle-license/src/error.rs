//! Error types for the license engine.

use entitle_store::StoreError;
use entitle_types::ResultCode;
use thiserror::Error;

/// Failures of license operations. Every variant maps onto one client
/// result code; see [`LicenseError::code`].
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Email is blank or lacks `@` / `.`.
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// Email matched the blacklist.
    #[error("email is blacklisted")]
    EmailBlacklisted,

    /// Whitelist mode is on and the email did not match it.
    #[error("email is not whitelisted")]
    EmailNotWhitelisted,

    /// Too many requests from one origin today.
    #[error("daily request limit of {limit} reached")]
    RateLimitExceeded { limit: i64 },

    /// Too many distinct emails bound from one origin today.
    #[error("daily email limit of {limit} reached")]
    EmailLimitExceeded { limit: i64 },

    /// No eligible inventory.
    #[error("no available SN")]
    NoAvailableSn,

    /// SN unknown.
    #[error("invalid SN")]
    InvalidSn,

    /// SN exists but is disabled.
    #[error("SN is disabled")]
    SnDisabled,

    /// SN is past its expiry (or was never bound).
    #[error("SN expired")]
    SnExpired,

    /// Reported usage is negative or not a number.
    #[error("invalid usage value: {0}")]
    InvalidValue(String),

    /// Activation payload could not be sealed.
    #[error("failed to encrypt activation payload: {0}")]
    EncryptFailed(String),

    /// SN and email do not belong together.
    #[error("email does not match SN")]
    EmailMismatch,

    /// No interop secret configured.
    #[error("interop tokens are not configured")]
    InteropDisabled,

    /// Token malformed or signature invalid.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// The wire code reported for this failure.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidEmail(_) => ResultCode::InvalidEmail,
            Self::EmailBlacklisted => ResultCode::EmailBlacklisted,
            Self::EmailNotWhitelisted => ResultCode::EmailNotWhitelisted,
            Self::RateLimitExceeded { .. } => ResultCode::RateLimitExceeded,
            Self::EmailLimitExceeded { .. } => ResultCode::EmailLimitExceeded,
            Self::NoAvailableSn => ResultCode::NoAvailableSn,
            Self::InvalidSn => ResultCode::InvalidSn,
            Self::SnDisabled => ResultCode::SnDisabled,
            Self::SnExpired => ResultCode::SnExpired,
            Self::InvalidValue(_) => ResultCode::InvalidValue,
            Self::EncryptFailed(_) => ResultCode::EncryptFailed,
            Self::EmailMismatch => ResultCode::EmailMismatch,
            Self::InvalidToken(_) => ResultCode::InvalidToken,
            Self::TokenExpired => ResultCode::TokenExpired,
            Self::InteropDisabled | Self::Store(_) | Self::Serialization(_) => {
                ResultCode::InternalError
            }
        }
    }

    /// Returns true for infrastructure failures that the client cannot act on.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.code() == ResultCode::InternalError
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
