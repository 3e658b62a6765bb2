mod common;

use chrono::Duration;
use common::{Harness, request};
use entitle_crypto::TOKEN_TTL_SECS;
use entitle_license::{LicenseEngine, LicenseError};
use entitle_store::Store;
use entitle_types::ResultCode;
use std::sync::Arc;

fn bound_sn(h: &Harness) -> String {
    h.seed("AAAA-BBBB-CCCC-DDDD");
    h.engine
        .request_sn(&request("owner@example.com"))
        .unwrap()
        .sn()
        .as_str()
        .to_string()
}

#[test]
fn token_round_trip_for_bound_email() {
    let h = Harness::new();
    let value = bound_sn(&h);

    let token = h.engine.issue_interop_token(&value, "Owner@Example.com").unwrap();
    assert_eq!(token.split('.').count(), 3);

    let claims = h.engine.verify_interop_token(&token).unwrap();
    assert_eq!(claims.sn, value);
    assert_eq!(claims.email, "owner@example.com");
}

#[test]
fn token_for_other_email_is_refused() {
    let h = Harness::new();
    let value = bound_sn(&h);
    let err = h
        .engine
        .issue_interop_token(&value, "intruder@example.com")
        .unwrap_err();
    assert!(matches!(err, LicenseError::EmailMismatch));
    assert_eq!(err.code(), ResultCode::EmailMismatch);
}

#[test]
fn token_for_disabled_sn_is_refused() {
    let h = Harness::new();
    let value = bound_sn(&h);
    h.engine.set_sn_active(&value, false).unwrap();
    let err = h
        .engine
        .issue_interop_token(&value, "owner@example.com")
        .unwrap_err();
    assert!(matches!(err, LicenseError::SnDisabled));
}

#[test]
fn token_expires_after_ttl() {
    let h = Harness::new();
    let value = bound_sn(&h);
    let token = h.engine.issue_interop_token(&value, "owner@example.com").unwrap();

    h.clock.advance(Duration::seconds(TOKEN_TTL_SECS));
    assert!(h.engine.verify_interop_token(&token).is_ok());

    h.clock.advance(Duration::seconds(1));
    let err = h.engine.verify_interop_token(&token).unwrap_err();
    assert!(matches!(err, LicenseError::TokenExpired));
}

#[test]
fn tampered_token_is_invalid() {
    let h = Harness::new();
    let value = bound_sn(&h);
    let token = h.engine.issue_interop_token(&value, "owner@example.com").unwrap();

    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    parts[2] = parts[2].chars().rev().collect();
    let err = h.engine.verify_interop_token(&parts.join(".")).unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidToken);

    let err = h.engine.verify_interop_token("garbage").unwrap_err();
    assert!(matches!(err, LicenseError::InvalidToken(_)));
}

#[test]
fn interop_requires_a_secret() {
    let engine = LicenseEngine::new(Arc::new(Store::open_in_memory().unwrap()));
    assert!(matches!(
        engine.issue_interop_token("AAAA", "a@b.com").unwrap_err(),
        LicenseError::InteropDisabled
    ));
    assert!(matches!(
        engine.verify_interop_token("a.b.c").unwrap_err(),
        LicenseError::InteropDisabled
    ));
    assert!(LicenseEngine::new(Arc::new(Store::open_in_memory().unwrap()))
        .with_interop_secret("")
        .is_err());
}
