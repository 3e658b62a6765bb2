//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// No signing secret configured.
    #[error("token signing secret is not configured")]
    MissingSecret,

    /// Token is not three well-formed base64url segments.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Recomputed signature does not match.
    #[error("token signature invalid")]
    InvalidSignature,

    /// Token is past its `exp` claim.
    #[error("token expired at {0}")]
    TokenExpired(i64),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
