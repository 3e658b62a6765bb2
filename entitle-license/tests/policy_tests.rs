mod common;

use common::Harness;
use entitle_license::{PolicySettings, normalize_email, pattern_matches};
use pretty_assertions::assert_eq;

#[test]
fn email_normalization() {
    assert_eq!(normalize_email("  Foo@Bar.COM ").unwrap(), "foo@bar.com");
    assert!(normalize_email("foo.bar").is_err());
    assert!(normalize_email("foo@bar").is_err());
}

#[test]
fn patterns_match_domain_suffix_or_exact_address() {
    assert!(pattern_matches("@example.com", "a@example.com"));
    assert!(pattern_matches("@EXAMPLE.com", "A@example.COM"));
    assert!(!pattern_matches("@example.com", "a@example.com.evil"));
    assert!(pattern_matches("a@example.com", "a@example.com"));
    assert!(!pattern_matches("a@example.com", "b@example.com"));
}

#[test]
fn settings_default_when_unset() {
    let h = Harness::new();
    let settings = PolicySettings::load(h.store()).unwrap();
    assert_eq!(settings, PolicySettings::default());
    assert!(settings.blacklist_enabled);
    assert!(!settings.whitelist_enabled);
    assert_eq!(settings.daily_request_limit, 5);
}

#[test]
fn settings_read_from_store() {
    let h = Harness::new();
    h.set("daily_request_limit", " 12 ");
    h.set("daily_email_limit", "not a number");
    h.set("blacklist_enabled", "false");
    h.set("whitelist_enabled", "true");
    h.set("conditions_enabled", "");

    let settings = PolicySettings::load(h.store()).unwrap();
    assert_eq!(
        settings,
        PolicySettings {
            daily_request_limit: 12,
            daily_email_limit: 5,
            blacklist_enabled: false,
            whitelist_enabled: true,
            conditions_enabled: false,
        }
    );
}
