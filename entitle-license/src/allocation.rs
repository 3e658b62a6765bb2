//! SN requests: commercial allocation and free / open-source issuance.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use crate::policy::{PolicySettings, normalize_email};
use chrono::{DateTime, Utc};
use entitle_store::{ClaimOutcome, Claimant, FREE_VALID_DAYS, IssueOutcome, SnCriteria};
use entitle_types::{BindingKind, ResultCode, Sn};
use serde::Serialize;
use tracing::info;

/// A client's request for an SN.
#[derive(Debug, Clone)]
pub struct SnRequest {
    /// Raw email as typed by the user.
    pub email: String,
    pub product_id: i64,
    /// Client network address used for rate limiting.
    pub origin: String,
}

/// Details of a newly bound SN, enough to notify the claimant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedSn {
    pub sn: Sn,
    pub email: String,
    pub kind: BindingKind,
    pub product_id: i64,
    pub product_name: String,
    pub valid_days: i64,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of an SN request.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// A new SN was bound to the email.
    Issued(IssuedSn),
    /// The email already holds a commercial SN for this product.
    AlreadyBound(Sn),
    /// The email already holds a free / open-source SN for this product.
    Existing(Sn),
}

impl Allocation {
    #[must_use]
    pub fn sn(&self) -> &Sn {
        match self {
            Self::Issued(issued) => &issued.sn,
            Self::AlreadyBound(sn) | Self::Existing(sn) => sn,
        }
    }

    /// Wire code: an existing commercial binding is reported as a soft success.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Issued(_) | Self::Existing(_) => ResultCode::Success,
            Self::AlreadyBound(_) => ResultCode::EmailAlreadyUsed,
        }
    }
}

impl LicenseEngine {
    /// Allocates a commercial SN to an email.
    ///
    /// Email policy runs first, then the existing-binding check (which does
    /// not consume rate allowance), then the per-origin limits, then the
    /// atomic claim.
    pub fn request_sn(&self, req: &SnRequest) -> LicenseResult<Allocation> {
        let email = normalize_email(&req.email)?;
        let product_id = req.product_id.max(0);
        let settings = PolicySettings::load(&self.store)?;
        let routing = self.admit_email(&email, &settings)?;

        if let Some(sn) = self
            .store
            .live_binding(&email, product_id, BindingKind::Commercial)?
        {
            info!(email, sn = %sn, "email already holds an SN");
            return Ok(Allocation::AlreadyBound(sn));
        }

        self.enforce_rate_limits(&req.origin, &settings)?;

        let exclude_grouped = settings.conditions_enabled && !routing.is_grouped();
        let criteria = SnCriteria::for_product(product_id)
            .with_groups(routing.llm_group.as_deref(), routing.search_group.as_deref())
            .excluding_grouped(exclude_grouped)
            .excluding_free_pools(true);

        let claimant = Claimant {
            email: email.clone(),
            origin: req.origin.clone(),
            product_id,
        };
        let now = self.now();
        match self.store.claim_license(&claimant, &criteria, now)? {
            ClaimOutcome::Claimed {
                sn,
                expires_at,
                valid_days,
            } => Ok(Allocation::Issued(IssuedSn {
                sn,
                email,
                kind: BindingKind::Commercial,
                product_id,
                product_name: self.store.product_name(product_id)?,
                valid_days,
                expires_at,
            })),
            ClaimOutcome::AlreadyBound(sn) => Ok(Allocation::AlreadyBound(sn)),
            ClaimOutcome::Exhausted => Err(LicenseError::NoAvailableSn),
        }
    }

    /// Mints a free (`BindingKind::Free`) or open-source (`BindingKind::Oss`) SN.
    ///
    /// Idempotent per (email, product, kind): a repeat request returns the
    /// SN already issued. Blacklist and whitelist apply; routing does not.
    pub fn request_free_sn(&self, req: &SnRequest, kind: BindingKind) -> LicenseResult<Allocation> {
        if kind == BindingKind::Commercial {
            return self.request_sn(req);
        }
        let email = normalize_email(&req.email)?;
        let product_id = req.product_id.max(0);
        let settings = PolicySettings::load(&self.store)?;
        self.admit_email(&email, &settings)?;

        if let Some(sn) = self.store.live_binding(&email, product_id, kind)? {
            return Ok(Allocation::Existing(sn));
        }

        self.enforce_rate_limits(&req.origin, &settings)?;

        let claimant = Claimant {
            email: email.clone(),
            origin: req.origin.clone(),
            product_id,
        };
        match self
            .store
            .issue_license(&claimant, kind, Sn::generate(), self.now())?
        {
            IssueOutcome::Issued { sn, expires_at } => Ok(Allocation::Issued(IssuedSn {
                sn,
                email,
                kind,
                product_id,
                product_name: self.store.product_name(product_id)?,
                valid_days: FREE_VALID_DAYS,
                expires_at,
            })),
            IssueOutcome::Existing(sn) => Ok(Allocation::Existing(sn)),
        }
    }
}
