//! Usage reporting with a one-hour per-SN throttle.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use chrono::Duration;
use entitle_store::time::parse_timestamp;
use entitle_types::{ResultCode, Sn};
use tracing::{debug, warn};

/// Minimum spacing between accepted reports for one SN, in seconds.
pub const REPORT_INTERVAL_SECS: i64 = 60 * 60;

/// Outcome of a usage report. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    /// Logged, and used credits raised to at least the reported value.
    Recorded,
    /// Arrived inside [`REPORT_INTERVAL_SECS`]; nothing was written.
    Throttled,
}

impl UsageOutcome {
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Self::Recorded => ResultCode::Success,
            Self::Throttled => ResultCode::Throttled,
        }
    }
}

impl LicenseEngine {
    /// Records reported credit usage for an SN.
    ///
    /// The most recent log entry decides throttling. An entry whose timestamp
    /// cannot be parsed does not throttle.
    pub fn report_usage(
        &self,
        raw_sn: &str,
        used_credits: f64,
        origin: &str,
    ) -> LicenseResult<UsageOutcome> {
        let sn = Sn::normalize(raw_sn);
        if sn.is_empty() || self.store.get_license(&sn)?.is_none() {
            return Err(LicenseError::InvalidSn);
        }
        if !used_credits.is_finite() || used_credits < 0.0 {
            return Err(LicenseError::InvalidValue(used_credits.to_string()));
        }

        let now = self.now();
        if let Some(last) = self.store.last_usage_report(&sn)? {
            match parse_timestamp(&last.reported_at) {
                Some(at) if now - at < Duration::seconds(REPORT_INTERVAL_SECS) => {
                    debug!(sn = %sn, last = %last.reported_at, "usage report throttled");
                    return Ok(UsageOutcome::Throttled);
                }
                Some(_) => {}
                None => {
                    warn!(
                        sn = %sn,
                        reported_at = %last.reported_at,
                        "unparsable usage timestamp, accepting report"
                    );
                }
            }
        }

        self.store.record_usage_report(&sn, used_credits, origin, now)?;
        debug!(sn = %sn, used_credits, "usage recorded");
        Ok(UsageOutcome::Recorded)
    }
}
