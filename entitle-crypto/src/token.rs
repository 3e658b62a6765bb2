//! HMAC-SHA256 interop tokens.
//!
//! Format: `base64url(header).base64url(claims).base64url(signature)`, no
//! padding, where the signature covers the ASCII string `header.claims`.

use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime in seconds (5 minutes).
pub const TOKEN_TTL_SECS: i64 = 5 * 60;

/// Value of the `purpose` claim.
pub const INTEROP_PURPOSE: &str = "marketplace_auth";

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by an interop token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropClaims {
    pub sn: String,
    pub email: String,
    pub purpose: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Issues and verifies interop tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Zeroizing<Vec<u8>>,
}

impl TokenSigner {
    /// Creates a signer. An empty secret is rejected.
    pub fn new(secret: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(CryptoError::MissingSecret);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
        })
    }

    fn mac(&self) -> CryptoResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| CryptoError::MissingSecret)
    }

    /// Issues a token for `sn`/`email` valid for [`TOKEN_TTL_SECS`] after `now`.
    pub fn issue(&self, sn: &str, email: &str, now: i64) -> CryptoResult<String> {
        let claims = InteropClaims {
            sn: sn.to_string(),
            email: email.to_string(),
            purpose: INTEROP_PURPOSE.to_string(),
            exp: now + TOKEN_TTL_SECS,
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(HEADER_JSON.as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{sig_b64}"))
    }

    /// Verifies signature then expiry, returning the claims.
    ///
    /// A token is expired once `now` is strictly past `exp`.
    pub fn verify(&self, token: &str, now: i64) -> CryptoResult<InteropClaims> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(CryptoError::MalformedToken(
                "token must have exactly three parts".to_string(),
            ));
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|e| CryptoError::MalformedToken(format!("invalid signature base64: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(parts[0].as_bytes());
        mac.update(b".");
        mac.update(parts[1].as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| CryptoError::InvalidSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|e| CryptoError::MalformedToken(format!("invalid claims base64: {e}")))?;
        let claims: InteropClaims = serde_json::from_slice(&claims_json)
            .map_err(|e| CryptoError::MalformedToken(format!("invalid claims JSON: {e}")))?;

        if now > claims.exp {
            return Err(CryptoError::TokenExpired(claims.exp));
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
