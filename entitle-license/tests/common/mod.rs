//! Shared helpers for license engine tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use entitle_license::{LicenseEngine, SnRequest};
use entitle_store::{LicenseGroup, NewLicense, Store, StoreConfig};
use entitle_types::{ManualClock, Sn, TrustTier};
use std::sync::Arc;
use tempfile::TempDir;

pub const SECRET: &str = "interop-test-secret";

/// A fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// An engine over a pooled on-disk store with a manual clock at [`t0`].
pub struct Harness {
    pub engine: LicenseEngine,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("licenses.db"), &StoreConfig::default()).unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = LicenseEngine::new(Arc::new(store))
            .with_clock(clock.clone())
            .with_interop_secret(SECRET)
            .unwrap();
        Self {
            engine,
            clock,
            _dir: dir,
        }
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }

    /// Inserts an unbound default-product license created a day before [`t0`].
    pub fn seed(&self, value: &str) {
        self.seed_with(NewLicense::new(sn(value)));
    }

    pub fn seed_with(&self, license: NewLicense) {
        self.store()
            .insert_license(&license, t0() - chrono::Duration::days(1))
            .unwrap();
    }

    pub fn group(&self, id: &str, tier: TrustTier) {
        self.store()
            .upsert_license_group(
                &LicenseGroup {
                    id: id.to_string(),
                    name: id.to_string(),
                    trust_level: tier,
                    llm_group_id: None,
                    search_group_id: None,
                },
                t0(),
            )
            .unwrap();
    }

    pub fn set(&self, key: &str, value: &str) {
        self.store().set_setting(key, value).unwrap();
    }
}

pub fn sn(s: &str) -> Sn {
    Sn::from_stored(s)
}

pub fn request(email: &str) -> SnRequest {
    SnRequest {
        email: email.to_string(),
        product_id: 0,
        origin: "203.0.113.7".to_string(),
    }
}

pub fn request_from(email: &str, origin: &str) -> SnRequest {
    SnRequest {
        origin: origin.to_string(),
        ..request(email)
    }
}
