//! Activation: trust resolution, provider selection and the sealed payload.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, SecondsFormat, Utc};
use entitle_crypto::{PayloadKey, seal_json};
use entitle_store::{License, ProviderConfig, time::format_date};
use entitle_types::{ProviderFamily, Sn, TrustTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Start bound used for configs with an empty start date.
const OPEN_START: &str = "1970-01-01";

/// The JSON record sealed into `encryptedData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationPayload {
    pub llm_type: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_start_date: String,
    pub llm_end_date: String,
    pub search_type: String,
    pub search_api_key: String,
    pub search_start_date: String,
    pub search_end_date: String,
    /// RFC 3339, empty when the license carries no expiry.
    pub expires_at: String,
    pub activated_at: String,
    pub daily_analysis: i64,
    pub total_credits: f64,
    pub credits_mode: bool,
    pub used_credits: f64,
    pub product_id: i64,
    pub product_name: String,
    pub trust_level: TrustTier,
    /// Days until the client should activate again.
    pub refresh_interval: u32,
    pub extra_info: BTreeMap<String, serde_json::Value>,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// base64(nonce || ciphertext) of the JSON payload.
    pub encrypted_data: String,
    /// Expiry date (`YYYY-MM-DD`), when set.
    pub expires_at: Option<String>,
    pub trust_level: TrustTier,
}

/// Returns true if `config` covers `today` (`YYYY-MM-DD`), bounds inclusive.
#[must_use]
pub fn is_valid_on(config: &ProviderConfig, today: &str) -> bool {
    let start = if config.start_date.is_empty() {
        OPEN_START
    } else {
        config.start_date.as_str()
    };
    if today < start {
        return false;
    }
    config.end_date.is_empty() || today <= config.end_date.as_str()
}

/// Picks the config valid on `today` with the latest start date; an active
/// config wins a tie, otherwise the first one listed is kept.
#[must_use]
pub fn select_provider<'a>(configs: &'a [ProviderConfig], today: &str) -> Option<&'a ProviderConfig> {
    let mut best: Option<&ProviderConfig> = None;
    for config in configs.iter().filter(|c| is_valid_on(c, today)) {
        let Some(current) = best else {
            best = Some(config);
            continue;
        };
        let (start, current_start) = (effective_start(config), effective_start(current));
        if start > current_start || (start == current_start && config.is_active && !current.is_active) {
            best = Some(config);
        }
    }
    best
}

fn effective_start(config: &ProviderConfig) -> &str {
    if config.start_date.is_empty() {
        OPEN_START
    } else {
        &config.start_date
    }
}

impl LicenseEngine {
    /// Activates an SN and returns the sealed configuration payload.
    ///
    /// Every successful call bumps the activation counter, so repeated
    /// activations double as a client heartbeat.
    pub fn activate(&self, raw_sn: &str) -> LicenseResult<Activation> {
        let sn = Sn::normalize(raw_sn);
        if sn.is_empty() {
            return Err(LicenseError::InvalidSn);
        }
        let license = self.store.get_license(&sn)?.ok_or(LicenseError::InvalidSn)?;
        if !license.is_active {
            return Err(LicenseError::SnDisabled);
        }

        let now = self.now();
        let group = match license.license_group_id.as_deref() {
            Some(id) => self.store.get_license_group(id)?,
            None => None,
        };
        let tier = group.as_ref().map(|g| g.trust_level).unwrap_or_default();

        if tier.enforces_expiry() && license.is_expired_at(now) {
            info!(sn = %sn, tier = %tier, "activation refused: expired");
            return Err(LicenseError::SnExpired);
        }

        self.store.record_activation(&sn, now)?;

        let mut payload = ActivationPayload {
            expires_at: license
                .expires_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            activated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            daily_analysis: license.daily_analysis,
            total_credits: license.total_credits,
            credits_mode: license.credits_mode,
            used_credits: license.used_credits,
            product_id: license.product_id,
            product_name: self.store.product_name(license.product_id)?,
            trust_level: tier,
            refresh_interval: tier.refresh_interval_days(),
            extra_info: self.store.product_extra_info(license.product_id)?,
            ..ActivationPayload::default()
        };

        if !tier.is_free() {
            let llm_group = license
                .llm_group_id
                .clone()
                .or_else(|| group.as_ref().and_then(|g| g.llm_group_id.clone()));
            let search_group = license
                .search_group_id
                .clone()
                .or_else(|| group.as_ref().and_then(|g| g.search_group_id.clone()));
            self.fill_providers(&mut payload, llm_group.as_deref(), search_group.as_deref(), now)?;
        }

        let key = PayloadKey::from_sn(sn.as_str());
        let encrypted_data = seal_json(&key, &payload).map_err(|e| {
            warn!(sn = %sn, error = %e, "failed to seal activation payload");
            LicenseError::EncryptFailed(e.to_string())
        })?;

        debug!(sn = %sn, tier = %tier, "SN activated");
        Ok(Activation {
            encrypted_data,
            expires_at: expiry_date(&license),
            trust_level: tier,
        })
    }

    fn fill_providers(
        &self,
        payload: &mut ActivationPayload,
        llm_group: Option<&str>,
        search_group: Option<&str>,
        now: DateTime<Utc>,
    ) -> LicenseResult<()> {
        let today = format_date(now);

        let llm = self.store.provider_configs(ProviderFamily::Llm, llm_group)?;
        if let Some(config) = select_provider(&llm, &today) {
            payload.llm_type = config.provider_type.clone();
            payload.llm_base_url = config.base_url.clone();
            payload.llm_api_key = config.api_key.clone();
            payload.llm_model = config.model.clone();
            payload.llm_start_date = config.start_date.clone();
            payload.llm_end_date = config.end_date.clone();
        }

        let search = self.store.provider_configs(ProviderFamily::Search, search_group)?;
        if let Some(config) = select_provider(&search, &today) {
            payload.search_type = config.provider_type.clone();
            payload.search_api_key = config.api_key.clone();
            payload.search_start_date = config.start_date.clone();
            payload.search_end_date = config.end_date.clone();
        }
        Ok(())
    }
}

fn expiry_date(license: &License) -> Option<String> {
    license.expires_at.map(format_date)
}
