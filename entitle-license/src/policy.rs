//! Email admission and per-origin rate limits.
//!
//! Filter order: blacklist (on by default) denies on a match, whitelist (off
//! by default) denies on a miss, then conditional routing (off by default)
//! maps the first matching pattern to provider groups for the matcher.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use entitle_store::{FilterList, Store, StoreResult, time::format_date};
use tracing::{debug, info};

pub const SETTING_DAILY_REQUEST_LIMIT: &str = "daily_request_limit";
pub const SETTING_DAILY_EMAIL_LIMIT: &str = "daily_email_limit";
pub const SETTING_BLACKLIST_ENABLED: &str = "blacklist_enabled";
pub const SETTING_WHITELIST_ENABLED: &str = "whitelist_enabled";
pub const SETTING_CONDITIONS_ENABLED: &str = "conditions_enabled";

/// Default per-origin daily allowance for both limits.
pub const DEFAULT_DAILY_LIMIT: i64 = 5;

/// Policy knobs read from the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySettings {
    /// Requests per origin per UTC day. `<= 0` disables the limit.
    pub daily_request_limit: i64,
    /// Distinct bound emails per origin per UTC day. `<= 0` disables the limit.
    pub daily_email_limit: i64,
    pub blacklist_enabled: bool,
    pub whitelist_enabled: bool,
    pub conditions_enabled: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            daily_request_limit: DEFAULT_DAILY_LIMIT,
            daily_email_limit: DEFAULT_DAILY_LIMIT,
            blacklist_enabled: true,
            whitelist_enabled: false,
            conditions_enabled: false,
        }
    }
}

impl PolicySettings {
    /// Loads the settings, falling back to defaults for missing or bad values.
    pub fn load(store: &Store) -> StoreResult<Self> {
        let defaults = Self::default();
        let int = |key: &str, default: i64| -> StoreResult<i64> {
            Ok(store
                .setting(key)?
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default))
        };
        let flag = |key: &str, default: bool| -> StoreResult<bool> {
            Ok(match store.setting(key)?.as_deref().map(str::trim) {
                None | Some("") => default,
                Some(v) => v == "true",
            })
        };
        Ok(Self {
            daily_request_limit: int(SETTING_DAILY_REQUEST_LIMIT, defaults.daily_request_limit)?,
            daily_email_limit: int(SETTING_DAILY_EMAIL_LIMIT, defaults.daily_email_limit)?,
            blacklist_enabled: flag(SETTING_BLACKLIST_ENABLED, defaults.blacklist_enabled)?,
            whitelist_enabled: flag(SETTING_WHITELIST_ENABLED, defaults.whitelist_enabled)?,
            conditions_enabled: flag(SETTING_CONDITIONS_ENABLED, defaults.conditions_enabled)?,
        })
    }
}

/// Provider groups an admitted email is routed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    pub llm_group: Option<String>,
    pub search_group: Option<String>,
}

impl Routing {
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.llm_group.is_some() || self.search_group.is_some()
    }
}

/// Lower-cases and trims an email, rejecting obviously invalid ones.
pub fn normalize_email(raw: &str) -> LicenseResult<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') || !email.contains('.') {
        return Err(LicenseError::InvalidEmail(raw.to_string()));
    }
    Ok(email)
}

/// A pattern is either a full address or an `@domain` suffix.
#[must_use]
pub fn pattern_matches(pattern: &str, email: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    let email = email.to_lowercase();
    if pattern.starts_with('@') {
        email.ends_with(&pattern)
    } else {
        email == pattern
    }
}

impl LicenseEngine {
    /// Applies the filter lists to a normalized email.
    pub fn admit_email(&self, email: &str, settings: &PolicySettings) -> LicenseResult<Routing> {
        if settings.blacklist_enabled {
            let black = self.store.email_filters(FilterList::Blacklist)?;
            if black.iter().any(|f| pattern_matches(&f.pattern, email)) {
                info!(email, "email rejected by blacklist");
                return Err(LicenseError::EmailBlacklisted);
            }
        }

        if settings.whitelist_enabled {
            let white = self.store.email_filters(FilterList::Whitelist)?;
            if !white.iter().any(|f| pattern_matches(&f.pattern, email)) {
                info!(email, "email not on whitelist");
                return Err(LicenseError::EmailNotWhitelisted);
            }
        }

        if settings.conditions_enabled {
            let conditions = self.store.email_filters(FilterList::Condition)?;
            if let Some(hit) = conditions.iter().find(|f| pattern_matches(&f.pattern, email)) {
                debug!(email, pattern = %hit.pattern, "email routed by condition");
                return Ok(Routing {
                    llm_group: hit.llm_group_id.clone(),
                    search_group: hit.search_group_id.clone(),
                });
            }
        }

        Ok(Routing::default())
    }

    /// Checks both daily limits for `origin` and counts this request.
    pub(crate) fn enforce_rate_limits(
        &self,
        origin: &str,
        settings: &PolicySettings,
    ) -> LicenseResult<()> {
        let day = format_date(self.now());

        if settings.daily_request_limit > 0 {
            let count = self.store.request_count(origin, &day)?;
            if count >= settings.daily_request_limit {
                info!(origin, count, "daily request limit reached");
                return Err(LicenseError::RateLimitExceeded {
                    limit: settings.daily_request_limit,
                });
            }
        }

        if settings.daily_email_limit > 0 {
            let emails = self.store.distinct_emails_for_origin(origin, &day)?;
            if emails >= settings.daily_email_limit {
                info!(origin, emails, "daily email limit reached");
                return Err(LicenseError::EmailLimitExceeded {
                    limit: settings.daily_email_limit,
                });
            }
        }

        self.store.increment_request_count(origin, &day)?;
        Ok(())
    }
}
