//! Short-lived tokens proving that an SN holder owns an email.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use entitle_crypto::{CryptoError, InteropClaims};
use entitle_types::Sn;
use tracing::{debug, info};

impl LicenseEngine {
    /// Issues a token for an active, unexpired SN bound to `email`.
    pub fn issue_interop_token(&self, raw_sn: &str, email: &str) -> LicenseResult<String> {
        let signer = self.signer.as_ref().ok_or(LicenseError::InteropDisabled)?;
        let sn = Sn::normalize(raw_sn);
        let email = email.trim().to_lowercase();

        let license = self.store.get_license(&sn)?.ok_or(LicenseError::InvalidSn)?;
        if !license.is_active {
            return Err(LicenseError::SnDisabled);
        }
        let now = self.now();
        if license.is_expired_at(now) {
            return Err(LicenseError::SnExpired);
        }

        let bound = self
            .store
            .bindings_for_sn(&sn)?
            .iter()
            .any(|b| b.email.eq_ignore_ascii_case(&email));
        if !bound {
            info!(sn = %sn, "interop token refused: email not bound to SN");
            return Err(LicenseError::EmailMismatch);
        }

        let token = signer
            .issue(sn.as_str(), &email, now.timestamp())
            .map_err(|e| LicenseError::InvalidToken(e.to_string()))?;
        debug!(sn = %sn, "interop token issued");
        Ok(token)
    }

    /// Verifies a token and returns its claims.
    pub fn verify_interop_token(&self, token: &str) -> LicenseResult<InteropClaims> {
        let signer = self.signer.as_ref().ok_or(LicenseError::InteropDisabled)?;
        signer
            .verify(token, self.now().timestamp())
            .map_err(|e| match e {
                CryptoError::MissingSecret => LicenseError::InteropDisabled,
                CryptoError::TokenExpired(_) => LicenseError::TokenExpired,
                other => LicenseError::InvalidToken(other.to_string()),
            })
    }
}
