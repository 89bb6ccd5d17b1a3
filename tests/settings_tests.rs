use std::fs;

use serde_json::Value;
use tempfile::tempdir;
use view_enhancer::page::CreatorIdentity;
use view_enhancer::settings::fingerprint::fingerprint;
use view_enhancer::settings::{
    ConfigurationRequests, IntegrityCheck, Preference, PreferenceSource, SettingsStore, ViewerSettings,
    CREATOR_PAGE, HOME_PAGE,
};

fn identity(id: &str) -> CreatorIdentity {
    CreatorIdentity {
        creator_id: id.into(),
        creator_name: format!("{} name", id),
        avatar_url: format!("https://img.example/{}.png", id),
    }
}

fn read_json(store: &SettingsStore) -> Value {
    serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
}

#[test]
fn test_defaults_without_file() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));

    let expected = Preference {
        enhance_delay_seconds: 5,
        reduce_volume: true,
        active: true,
    };
    // Query order does not matter.
    assert_eq!(store.preferences("UC-unknown").unwrap(), expected);
    assert_eq!(store.preferences("").unwrap(), expected);
    assert_eq!(store.preferences("UC-unknown").unwrap(), expected);
    assert!(store.verify_integrity());
}

#[test]
fn test_install_writes_fingerprinted_defaults() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("nested/settings.json"));
    store.install().unwrap();

    let doc = read_json(&store);
    assert_eq!(doc["viewer_settings"]["global"]["enhanceDelay"], 5);
    assert_eq!(doc["viewer_settings"]["global"]["reduceVolume"], true);
    assert_eq!(
        doc["settings_fingerprint"].as_str().unwrap(),
        fingerprint(&ViewerSettings::default()).unwrap()
    );
    assert!(store.check_integrity().unwrap());
}

#[test]
fn test_tampered_settings_are_reset() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    store.set_global(Preference::default().with_delay(12)).unwrap();
    assert!(store.verify_integrity());

    let mut doc = read_json(&store);
    doc["viewer_settings"]["global"]["enhanceDelay"] = Value::from(0);
    fs::write(store.path(), serde_json::to_string(&doc).unwrap()).unwrap();

    // VERIFY: Rejected once, then defaults are trusted again.
    assert!(!store.verify_integrity());
    assert_eq!(store.settings().unwrap(), ViewerSettings::default());
    assert!(store.verify_integrity());
}

#[test]
fn test_creator_seeded_from_global() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    store.set_global(Preference::default().with_delay(12)).unwrap();

    let created = store.ensure_creator(&identity("UC-a")).unwrap();
    assert_eq!(created.preference.enhance_delay_seconds, 12);
    assert_eq!(created.creator_name, "UC-a name");

    // Later global edits do not leak into the creator entry.
    store.set_global(Preference::default().with_delay(3)).unwrap();
    assert_eq!(store.preferences("UC-a").unwrap().enhance_delay_seconds, 12);
    assert_eq!(store.preferences("UC-b").unwrap().enhance_delay_seconds, 3);

    let doc = read_json(&store);
    let entry = &doc["viewer_settings"]["creators"]["UC-a"];
    assert_eq!(entry["creatorId"], "UC-a");
    assert_eq!(entry["enhanceDelay"], 12);
}

#[test]
fn test_configure_and_remove_creator() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    let muted_only = Preference {
        enhance_delay_seconds: 0,
        reduce_volume: true,
        active: false,
    };
    store.configure_creator_preference(&identity("UC-a"), muted_only).unwrap();
    assert_eq!(store.preferences("UC-a").unwrap(), muted_only);

    assert!(store.remove_creator("UC-a").unwrap());
    assert!(!store.remove_creator("UC-a").unwrap());
    assert_eq!(store.preferences("UC-a").unwrap(), Preference::default());
    assert!(store.verify_integrity());
}

#[test]
fn test_delay_is_clamped() {
    assert_eq!(Preference::default().with_delay(90).enhance_delay_seconds, 30);
    assert_eq!(Preference::default().with_delay(-4).enhance_delay_seconds, 0);
}

#[test]
fn test_page_requests() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    store.install().unwrap();

    store.configure_creator(&identity("UC-a"));
    let request = store.take_page_request().unwrap().unwrap();
    assert_eq!(request.page, CREATOR_PAGE);
    assert_eq!(request.creator, Some(identity("UC-a")));
    assert!(request.timestamp > 0);
    assert_eq!(store.take_page_request().unwrap(), None);

    store.request_home_page().unwrap();
    let request = store.take_page_request().unwrap().unwrap();
    assert_eq!(request.page, HOME_PAGE);
    assert_eq!(request.creator, None);

    // Page requests are not part of the fingerprinted settings.
    assert!(store.verify_integrity());
}

#[test]
fn test_malformed_file_fails_integrity() {
    let dir = tempdir().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    fs::write(store.path(), "{ not json").unwrap();
    assert!(store.settings().is_err());
    assert!(!store.verify_integrity());
}
