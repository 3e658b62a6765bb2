mod common;

use chrono::Duration;
use common::{Harness, request, sn, t0};
use entitle_crypto::{PayloadKey, open_json};
use entitle_license::{Activation, ActivationPayload, LicenseError, is_valid_on, select_provider};
use entitle_store::{ExtraValue, LicenseGroup, NewLicense, NewProviderConfig, ProviderConfig};
use entitle_types::{BindingKind, ProviderFamily, ResultCode, TrustTier};
use pretty_assertions::assert_eq;

fn open(sn_value: &str, activation: &Activation) -> ActivationPayload {
    open_json(&PayloadKey::from_sn(sn_value), &activation.encrypted_data).unwrap()
}

fn config(id: i64, start: &str, end: &str, active: bool) -> ProviderConfig {
    ProviderConfig {
        id,
        family: ProviderFamily::Llm,
        name: format!("cfg-{id}"),
        provider_type: "openai".to_string(),
        base_url: String::new(),
        api_key: format!("key-{id}"),
        model: String::new(),
        is_active: active,
        start_date: start.to_string(),
        end_date: end.to_string(),
        group_id: None,
    }
}

fn provider(family: ProviderFamily, key: &str, group: Option<&str>) -> NewProviderConfig {
    NewProviderConfig {
        group_id: group.map(str::to_string),
        ..NewProviderConfig::new(family, "test", key)
    }
}

// ── State checks ─────────────────────────────────────────────────

#[test]
fn unknown_or_blank_sn_is_invalid() {
    let h = Harness::new();
    for raw in ["", "   ", "NOPE-NOPE"] {
        let err = h.engine.activate(raw).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidSn, "{raw:?}");
    }
}

#[test]
fn disabled_sn_is_refused() {
    let h = Harness::new();
    h.seed("AAAA");
    h.engine.request_sn(&request("a@b.com")).unwrap();
    h.engine.set_sn_active("aaaa", false).unwrap();

    let err = h.engine.activate("AAAA").unwrap_err();
    assert!(matches!(err, LicenseError::SnDisabled));
}

#[test]
fn input_is_normalized() {
    let h = Harness::new();
    h.seed("ABCD-EFGH");
    h.engine.request_sn(&request("a@b.com")).unwrap();
    assert!(h.engine.activate("  abcd-efgh \n").is_ok());
}

#[test]
fn low_tier_past_expiry_is_refused() {
    let h = Harness::new();
    h.seed_with(NewLicense {
        expires_at: Some(t0() - Duration::days(1)),
        ..NewLicense::new(sn("OLD1"))
    });
    let err = h.engine.activate("OLD1").unwrap_err();
    assert!(matches!(err, LicenseError::SnExpired));
    assert_eq!(err.code(), ResultCode::SnExpired);
}

#[test]
fn unbound_low_tier_sn_counts_as_expired() {
    let h = Harness::new();
    h.seed("AAAA");
    assert!(matches!(
        h.engine.activate("AAAA").unwrap_err(),
        LicenseError::SnExpired
    ));
}

#[test]
fn permanent_free_past_expiry_still_activates() {
    let h = Harness::new();
    h.group("forever", TrustTier::PermanentFree);
    h.seed_with(NewLicense {
        expires_at: Some(t0() - Duration::days(1)),
        license_group_id: Some("forever".to_string()),
        ..NewLicense::new(sn("OLD1"))
    });

    let activation = h.engine.activate("OLD1").unwrap();
    assert_eq!(activation.trust_level, TrustTier::PermanentFree);
    assert_eq!(open("OLD1", &activation).refresh_interval, 365);
}

#[test]
fn missing_group_falls_back_to_low_tier() {
    let h = Harness::new();
    h.seed_with(NewLicense {
        expires_at: Some(t0() + Duration::days(5)),
        license_group_id: Some("deleted".to_string()),
        ..NewLicense::new(sn("AAAA"))
    });
    let activation = h.engine.activate("AAAA").unwrap();
    assert_eq!(activation.trust_level, TrustTier::Low);
    assert_eq!(open("AAAA", &activation).refresh_interval, 1);
}

// ── Payload ──────────────────────────────────────────────────────

#[test]
fn payload_decrypts_with_sn_derived_key() {
    let h = Harness::new();
    h.group("trusted", TrustTier::High);
    h.seed_with(NewLicense {
        valid_days: 30,
        daily_analysis: 12,
        total_credits: 100.0,
        credits_mode: true,
        license_group_id: Some("trusted".to_string()),
        ..NewLicense::new(sn("AAAA"))
    });
    h.store()
        .set_product_extra(0, "max_docs", &ExtraValue::Number(50.0))
        .unwrap();
    h.engine.request_sn(&request("a@b.com")).unwrap();

    let activation = h.engine.activate("AAAA").unwrap();
    assert_eq!(activation.expires_at.as_deref(), Some("2025-03-31"));

    let payload = open("AAAA", &activation);
    assert_eq!(payload.trust_level, TrustTier::High);
    assert_eq!(payload.refresh_interval, 30);
    assert_eq!(payload.daily_analysis, 12);
    assert_eq!(payload.total_credits, 100.0);
    assert!(payload.credits_mode);
    assert_eq!(payload.product_id, 0);
    assert_eq!(payload.product_name, "Default");
    assert_eq!(payload.expires_at, "2025-03-31T09:00:00Z");
    assert_eq!(payload.activated_at, "2025-03-01T09:00:00Z");
    assert_eq!(payload.extra_info["max_docs"], serde_json::json!(50.0));

    // Another SN's key cannot open it.
    let wrong: Result<ActivationPayload, _> =
        open_json(&PayloadKey::from_sn("BBBB"), &activation.encrypted_data);
    assert!(wrong.is_err());
}

#[test]
fn each_activation_uses_a_fresh_nonce() {
    let h = Harness::new();
    h.seed("AAAA");
    h.engine.request_sn(&request("a@b.com")).unwrap();
    let first = h.engine.activate("AAAA").unwrap();
    let second = h.engine.activate("AAAA").unwrap();
    assert_ne!(first.encrypted_data, second.encrypted_data);
}

#[test]
fn activation_counts_as_heartbeat() {
    let h = Harness::new();
    h.seed("AAAA");
    h.engine.request_sn(&request("a@b.com")).unwrap();
    h.engine.activate("AAAA").unwrap();
    h.clock.advance(Duration::hours(2));
    h.engine.activate("AAAA").unwrap();

    let license = h.store().get_license(&sn("AAAA")).unwrap().unwrap();
    assert_eq!(license.usage_count, 2);
    assert_eq!(license.last_used_at, Some(t0() + Duration::hours(2)));
}

#[test]
fn refused_activation_does_not_count() {
    let h = Harness::new();
    h.seed("AAAA");
    assert!(h.engine.activate("AAAA").is_err());
    let license = h.store().get_license(&sn("AAAA")).unwrap().unwrap();
    assert_eq!(license.usage_count, 0);
}

// ── Provider resolution ──────────────────────────────────────────

#[test]
fn providers_resolved_from_license_group() {
    let h = Harness::new();
    let store = h.store();
    store
        .insert_provider_config(&provider(ProviderFamily::Llm, "llm-any", None))
        .unwrap();
    store
        .insert_provider_config(&provider(ProviderFamily::Llm, "llm-gold", Some("gold")))
        .unwrap();
    store
        .insert_provider_config(&provider(ProviderFamily::Search, "search-any", None))
        .unwrap();
    h.seed_with(NewLicense {
        llm_group_id: Some("gold".to_string()),
        ..NewLicense::new(sn("AAAA"))
    });
    h.engine.request_sn(&request("a@b.com")).unwrap();

    let payload = open("AAAA", &h.engine.activate("AAAA").unwrap());
    assert_eq!(payload.llm_api_key, "llm-gold");
    // Ungrouped search resolves across all configs.
    assert_eq!(payload.search_api_key, "search-any");
}

#[test]
fn providers_inherit_org_group_routing() {
    let h = Harness::new();
    h.store()
        .upsert_license_group(
            &LicenseGroup {
                id: "team".to_string(),
                name: "Team".to_string(),
                trust_level: TrustTier::High,
                llm_group_id: Some("team-llm".to_string()),
                search_group_id: None,
            },
            t0(),
        )
        .unwrap();
    h.store()
        .insert_provider_config(&provider(ProviderFamily::Llm, "llm-other", Some("other")))
        .unwrap();
    h.store()
        .insert_provider_config(&provider(ProviderFamily::Llm, "llm-team", Some("team-llm")))
        .unwrap();
    h.seed_with(NewLicense {
        license_group_id: Some("team".to_string()),
        ..NewLicense::new(sn("AAAA"))
    });
    h.engine.request_sn(&request("a@b.com")).unwrap();

    let payload = open("AAAA", &h.engine.activate("AAAA").unwrap());
    assert_eq!(payload.llm_api_key, "llm-team");
}

#[test]
fn free_tier_never_receives_credentials() {
    let h = Harness::new();
    h.store()
        .insert_provider_config(&provider(ProviderFamily::Llm, "paid-llm", None))
        .unwrap();
    h.store()
        .insert_provider_config(&provider(ProviderFamily::Search, "paid-search", None))
        .unwrap();

    let allocation = h
        .engine
        .request_free_sn(&request("oss@x.com"), BindingKind::Oss)
        .unwrap();
    let value = allocation.sn().as_str().to_string();
    let activation = h.engine.activate(&value).unwrap();
    assert_eq!(activation.trust_level, TrustTier::OpenSource);

    let payload = open(&value, &activation);
    assert_eq!(payload.llm_api_key, "");
    assert_eq!(payload.llm_type, "");
    assert_eq!(payload.search_api_key, "");
    assert_eq!(payload.refresh_interval, 365);
}

#[test]
fn validity_window_is_inclusive_and_open_ended() {
    assert!(is_valid_on(&config(1, "", "", true), "2025-03-01"));
    assert!(is_valid_on(&config(1, "2025-03-01", "2025-03-01", true), "2025-03-01"));
    assert!(!is_valid_on(&config(1, "2025-03-02", "", true), "2025-03-01"));
    assert!(!is_valid_on(&config(1, "", "2025-02-28", true), "2025-03-01"));
}

#[test]
fn latest_start_wins_and_active_breaks_ties() {
    let configs = vec![
        config(1, "2025-01-01", "", true),
        config(2, "2025-02-01", "", false),
        config(3, "2025-02-01", "", true),
        config(4, "2025-04-01", "", true),
        config(5, "2025-02-01", "", true),
    ];
    let picked = select_provider(&configs, "2025-03-01").unwrap();
    // 4 has not started yet; 3 is the first active of the latest start.
    assert_eq!(picked.id, 3);

    assert!(select_provider(&configs[3..4], "2025-03-01").is_none());
    assert!(select_provider(&[], "2025-03-01").is_none());
}
