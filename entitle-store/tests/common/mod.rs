//! Shared helpers for store tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use entitle_store::{Claimant, NewLicense, Store, StoreConfig};
use entitle_types::Sn;
use tempfile::TempDir;

/// A fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// Opens a pooled on-disk store inside a fresh temp dir.
pub fn file_store() -> (Store, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("licenses.db"), &StoreConfig::default()).unwrap();
    (store, dir)
}

pub fn sn(s: &str) -> Sn {
    Sn::from_stored(s)
}

/// Inserts an unbound default-product license created at `at`.
pub fn seed(store: &Store, value: &str, at: DateTime<Utc>) {
    store.insert_license(&NewLicense::new(sn(value)), at).unwrap();
}

pub fn seed_with(store: &Store, license: NewLicense, at: DateTime<Utc>) {
    store.insert_license(&license, at).unwrap();
}

pub fn claimant(email: &str) -> Claimant {
    Claimant {
        email: email.to_string(),
        origin: "10.0.0.1".to_string(),
        product_id: 0,
    }
}
