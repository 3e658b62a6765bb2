mod common;

use chrono::Duration;
use common::{claimant, file_store, seed, seed_with, sn, t0};
use entitle_store::{
    ClaimOutcome, Claimant, FREE_VALID_DAYS, IssueOutcome, NewLicense, SnCriteria, Store,
    StoreError,
};
use entitle_types::{BindingKind, Sn, TrustTier};
use std::collections::HashSet;
use std::sync::Arc;

fn criteria() -> SnCriteria {
    SnCriteria::for_product(0).excluding_free_pools(true)
}

// ── Commercial claims ─────────────────────────────────────────────

#[test]
fn claim_stamps_expiry_from_valid_days() {
    let (store, _dir) = file_store();
    seed_with(
        &store,
        NewLicense {
            valid_days: 30,
            ..NewLicense::new(sn("A"))
        },
        t0() - Duration::days(1),
    );

    let outcome = store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    assert_eq!(
        outcome,
        ClaimOutcome::Claimed {
            sn: sn("A"),
            expires_at: t0() + Duration::days(30),
            valid_days: 30,
        }
    );

    let license = store.get_license(&sn("A")).unwrap().unwrap();
    assert_eq!(license.expires_at, Some(t0() + Duration::days(30)));
    assert_eq!(license.description, "Email request: x@y.com");
}

#[test]
fn claim_keeps_preset_expiry() {
    let (store, _dir) = file_store();
    let preset = t0() + Duration::days(10);
    seed_with(
        &store,
        NewLicense {
            expires_at: Some(preset),
            valid_days: 30,
            ..NewLicense::new(sn("A"))
        },
        t0() - Duration::days(1),
    );

    store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    let license = store.get_license(&sn("A")).unwrap().unwrap();
    assert_eq!(license.expires_at, Some(preset));
}

#[test]
fn unrepresentable_validity_fails_the_claim_without_binding() {
    let (store, _dir) = file_store();
    seed_with(
        &store,
        NewLicense {
            valid_days: 100_000_000,
            ..NewLicense::new(sn("A"))
        },
        t0() - Duration::days(1),
    );

    for _ in 0..2 {
        let err = store
            .claim_license(&claimant("x@y.com"), &criteria(), t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)), "{err}");
    }

    let license = store.get_license(&sn("A")).unwrap().unwrap();
    assert_eq!(license.expires_at, None);
    assert!(store.bindings_for_sn(&sn("A")).unwrap().is_empty());
}

#[test]
fn second_claim_returns_existing_sn() {
    let (store, _dir) = file_store();
    seed(&store, "A", t0() - Duration::days(2));
    seed(&store, "B", t0() - Duration::days(1));

    store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    let again = store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    assert_eq!(again, ClaimOutcome::AlreadyBound(sn("A")));
    // B is still unbound.
    assert!(store.bindings_for_sn(&sn("B")).unwrap().is_empty());
}

#[test]
fn same_email_other_product_gets_own_sn() {
    let (store, _dir) = file_store();
    seed(&store, "DEF", t0());
    seed_with(
        &store,
        NewLicense {
            product_id: 2,
            ..NewLicense::new(sn("P2"))
        },
        t0(),
    );
    store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    let other = Claimant {
        product_id: 2,
        ..claimant("x@y.com")
    };
    let outcome = store
        .claim_license(&other, &SnCriteria::for_product(2), t0())
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed { sn, .. } if sn.as_str() == "P2"));
}

#[test]
fn exhausted_inventory() {
    let (store, _dir) = file_store();
    let outcome = store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    assert_eq!(outcome, ClaimOutcome::Exhausted);
}

#[test]
fn orphaned_binding_is_replaced() {
    let (store, dir) = file_store();
    seed(&store, "GONE", t0() - Duration::days(2));
    seed(&store, "NEXT", t0() - Duration::days(1));
    store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();

    // Remove the license row behind the store's back, leaving the binding.
    let raw = rusqlite::Connection::open(dir.path().join("licenses.db")).unwrap();
    raw.execute("DELETE FROM licenses WHERE sn = 'GONE'", []).unwrap();

    let outcome = store.claim_license(&claimant("x@y.com"), &criteria(), t0()).unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed { sn, .. } if sn.as_str() == "NEXT"));
    assert!(store.bindings_for_sn(&sn("GONE")).unwrap().is_empty());
}

#[test]
fn bound_sn_is_never_offered_again() {
    let (store, _dir) = file_store();
    seed(&store, "ONLY", t0());
    store.claim_license(&claimant("a@y.com"), &criteria(), t0()).unwrap();
    let outcome = store.claim_license(&claimant("b@y.com"), &criteria(), t0()).unwrap();
    assert_eq!(outcome, ClaimOutcome::Exhausted);
}

#[test]
fn concurrent_claims_never_share_an_sn() {
    let (store, _dir) = file_store();
    for i in 0..5 {
        seed(&store, &format!("SN-{i}"), t0() - Duration::days(10 - i));
    }
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .claim_license(&claimant(&format!("user{i}@y.com")), &criteria(), t0())
                    .unwrap()
            })
        })
        .collect();
    let outcomes: Vec<ClaimOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let claimed: Vec<Sn> = outcomes
        .iter()
        .filter_map(|o| match o {
            ClaimOutcome::Claimed { sn, .. } => Some(sn.clone()),
            _ => None,
        })
        .collect();
    let distinct: HashSet<&Sn> = claimed.iter().collect();
    assert_eq!(claimed.len(), 5);
    assert_eq!(distinct.len(), 5);
    assert_eq!(
        outcomes.iter().filter(|o| **o == ClaimOutcome::Exhausted).count(),
        3
    );
}

#[test]
fn concurrent_identical_requests_bind_once() {
    let (store, _dir) = file_store();
    for i in 0..4 {
        seed(&store, &format!("SN-{i}"), t0() - Duration::days(10 - i));
    }
    let store = Arc::new(store);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .claim_license(&claimant("same@y.com"), &criteria(), t0())
                    .unwrap()
            })
        })
        .collect();
    let outcomes: Vec<ClaimOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let claimed = outcomes
        .iter()
        .filter(|o| matches!(o, ClaimOutcome::Claimed { .. }))
        .count();
    assert_eq!(claimed, 1);
    let bound = store
        .live_binding("same@y.com", 0, BindingKind::Commercial)
        .unwrap()
        .unwrap();
    for o in &outcomes {
        if let ClaimOutcome::AlreadyBound(sn) = o {
            assert_eq!(sn, &bound);
        }
    }
}

// ── Free / open-source issuance ───────────────────────────────────

fn issue(store: &Store, kind: BindingKind, email: &str, product_id: i64) -> IssueOutcome {
    let who = Claimant {
        product_id,
        ..claimant(email)
    };
    store.issue_license(&who, kind, Sn::generate(), t0()).unwrap()
}

#[test]
fn free_issue_mints_license_in_builtin_group() {
    let (store, _dir) = file_store();
    let IssueOutcome::Issued { sn, expires_at } = issue(&store, BindingKind::Free, "f@y.com", 4)
    else {
        panic!("expected a new SN");
    };
    assert_eq!(expires_at, t0() + Duration::days(FREE_VALID_DAYS));

    let license = store.get_license(&sn).unwrap().unwrap();
    assert_eq!(license.license_group_id.as_deref(), Some("free_4"));
    assert_eq!(license.product_id, 4);
    assert_eq!(license.valid_days, FREE_VALID_DAYS);

    let group = store.get_license_group("free_4").unwrap().unwrap();
    assert_eq!(group.trust_level, TrustTier::PermanentFree);
}

#[test]
fn free_issue_is_idempotent_per_kind() {
    let (store, _dir) = file_store();
    let IssueOutcome::Issued { sn: first, .. } = issue(&store, BindingKind::Oss, "o@y.com", 1)
    else {
        panic!("expected a new SN");
    };
    assert_eq!(
        issue(&store, BindingKind::Oss, "o@y.com", 1),
        IssueOutcome::Existing(first.clone())
    );
    // A different kind for the same email and product is a separate binding.
    assert!(matches!(
        issue(&store, BindingKind::Free, "o@y.com", 1),
        IssueOutcome::Issued { .. }
    ));
    assert_eq!(
        store.get_license_group("oss_1").unwrap().unwrap().trust_level,
        TrustTier::OpenSource
    );
}

#[test]
fn commercial_kind_cannot_be_minted() {
    let (store, _dir) = file_store();
    let err = store
        .issue_license(&claimant("c@y.com"), BindingKind::Commercial, Sn::generate(), t0())
        .unwrap_err();
    assert!(err.to_string().contains("cannot be minted"));
}

#[test]
fn minted_free_sn_is_not_commercial_inventory() {
    let (store, _dir) = file_store();
    issue(&store, BindingKind::Free, "f@y.com", 0);
    let outcome = store.claim_license(&claimant("z@y.com"), &criteria(), t0()).unwrap();
    assert_eq!(outcome, ClaimOutcome::Exhausted);
}
