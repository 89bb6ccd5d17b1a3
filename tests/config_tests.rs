use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use view_enhancer::EngineConfig;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.poll_interval(), Duration::from_millis(200));
    assert_eq!(config.safety_limit(), Duration::from_secs(30));
    assert_eq!(config.rewind_threshold_secs, 3.0);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "poll_interval_ms": 100 }"#).unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
    assert_eq!(config.safety_limit_ms, 30_000);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(EngineConfig::from_file(dir.path().join("absent.json")).is_err());
}
