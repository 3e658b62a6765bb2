//! The license engine handle.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use entitle_crypto::TokenSigner;
use entitle_store::Store;
use entitle_types::{Clock, SystemClock};
use std::sync::Arc;

/// Entry point for every license operation.
///
/// All operations are synchronous and touch only the local store; async
/// callers should run them on a blocking thread.
#[derive(Clone)]
pub struct LicenseEngine {
    pub(crate) store: Arc<Store>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) signer: Option<TokenSigner>,
}

impl LicenseEngine {
    /// Creates an engine over `store` using the system clock and no interop secret.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            signer: None,
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enables interop tokens signed with `secret`. An empty secret is an error.
    pub fn with_interop_secret(mut self, secret: &str) -> LicenseResult<Self> {
        let signer = TokenSigner::new(secret).map_err(|_| LicenseError::InteropDisabled)?;
        self.signer = Some(signer);
        Ok(self)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for LicenseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseEngine")
            .field("store_pool", &self.store.pool_size())
            .field("interop", &self.signer.is_some())
            .finish()
    }
}
