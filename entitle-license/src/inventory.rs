//! Inventory maintenance: minting, disabling and removing SNs.

use crate::engine::LicenseEngine;
use crate::error::{LicenseError, LicenseResult};
use entitle_store::{FREE_VALID_DAYS, NewLicense};
use entitle_types::Sn;
use tracing::info;

impl LicenseEngine {
    /// Mints `count` licenses with fresh SNs, copying every other field from
    /// `template`. Returns the new SNs in insertion order.
    ///
    /// `valid_days` must lie in `1..=FREE_VALID_DAYS` unless the template
    /// carries a preset expiry.
    pub fn create_licenses(&self, count: usize, template: &NewLicense) -> LicenseResult<Vec<Sn>> {
        if template.expires_at.is_none() && !(1..=FREE_VALID_DAYS).contains(&template.valid_days) {
            return Err(LicenseError::InvalidValue(format!(
                "valid_days {} outside 1..={FREE_VALID_DAYS}",
                template.valid_days
            )));
        }
        let batch: Vec<NewLicense> = (0..count)
            .map(|_| NewLicense {
                sn: Sn::generate(),
                ..template.clone()
            })
            .collect();
        self.store.insert_licenses(&batch, self.now())?;
        Ok(batch.into_iter().map(|l| l.sn).collect())
    }

    /// Enables or disables an SN.
    pub fn set_sn_active(&self, raw_sn: &str, active: bool) -> LicenseResult<()> {
        let sn = Sn::normalize(raw_sn);
        if !self.store.set_license_active(&sn, active)? {
            return Err(LicenseError::InvalidSn);
        }
        info!(sn = %sn, active, "SN state changed");
        Ok(())
    }

    /// Deletes an SN together with its bindings.
    pub fn force_delete_sn(&self, raw_sn: &str) -> LicenseResult<()> {
        let sn = Sn::normalize(raw_sn);
        if !self.store.force_delete_license(&sn)? {
            return Err(LicenseError::InvalidSn);
        }
        Ok(())
    }

    /// Removes disabled licenses that were never activated or bound.
    pub fn purge_unused_disabled(&self) -> LicenseResult<usize> {
        Ok(self.store.purge_unused_disabled()?)
    }
}
