//! E2E tests for persistent run configuration
//!
//! Tests config round-trip, defaults for missing fields, and fallback on
//! unreadable files.

use chanmap_conformance::TestConfig;
use std::time::Duration;

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("chanmap.json");

    let config = TestConfig {
        poll_retries: 9,
        schedule_offset_ms: 1500,
        ..TestConfig::with_api_url("http://device:8080/x-nmos/channelmapping/v1.0/")
    };
    config.save(&path).unwrap();

    let loaded = TestConfig::load(&path);
    assert_eq!(loaded, config);
    assert_eq!(loaded.schedule_offset(), Duration::from_millis(1500));
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chanmap.json");
    std::fs::write(&path, r#"{"api_url": "http://x/", "poll_interval_ms": 250}"#).unwrap();

    let loaded = TestConfig::load(&path);
    assert_eq!(loaded.api_url, "http://x/");
    assert_eq!(loaded.poll_interval(), Duration::from_millis(250));
    assert_eq!(loaded.poll_retries, TestConfig::default().poll_retries);
    assert_eq!(loaded.lock_offset_ms, TestConfig::default().lock_offset_ms);
}

#[test]
fn test_corrupt_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chanmap.json");
    std::fs::write(&path, "{not json").unwrap();
    assert_eq!(TestConfig::load(&path), TestConfig::default());
}

#[test]
fn test_missing_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        TestConfig::load(&dir.path().join("absent.json")),
        TestConfig::default()
    );
}
