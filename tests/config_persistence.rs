//! Integration tests for config load/save behavior

use std::fs;
use telemetry_relay::{Level, TelemetryConfig, TELEMETRY_CONFIG_FILENAME};
use tempfile::TempDir;

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let mut cfg = TelemetryConfig::new();
    cfg.enable = true;
    cfg.send_to_log = true;
    cfg.uri = "http://collector:9200".to_string();
    cfg.name = "relay-node".to_string();
    cfg.guid = "host-guid-1".to_string();
    cfg.min_log_level = Level::Error;
    cfg.report_history_level = Level::Info;
    cfg.user_name = "custom-user".to_string();
    cfg.password = "custom-pass".to_string();
    cfg.save(&path).expect("save");

    let loaded = TelemetryConfig::load(&path).expect("load");
    assert!(loaded.enable);
    assert!(loaded.send_to_log);
    assert_eq!(loaded.uri, "http://collector:9200");
    assert_eq!(loaded.name, "relay-node");
    assert_eq!(loaded.guid, "host-guid-1");
    assert_eq!(loaded.min_log_level, Level::Error);
    assert_eq!(loaded.report_history_level, Level::Info);
    assert_eq!(loaded.user_name, "custom-user");
    assert_eq!(loaded.password, "custom-pass");
    assert_eq!(loaded.file_path.as_deref(), Some(path.as_path()));
}

#[test]
fn test_levels_persist_in_legacy_numbering() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let mut cfg = TelemetryConfig::new();
    cfg.min_log_level = Level::Error;
    cfg.report_history_level = Level::Debug;
    cfg.save(&path).expect("save");

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    // Legacy scale is inverted: 2 = Error, 5 = Debug.
    assert_eq!(raw["MinLogLevel"], 2);
    assert_eq!(raw["ReportHistoryLevel"], 5);
}

#[test]
fn test_default_credentials_blanked_on_save_and_refilled_on_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let cfg = TelemetryConfig::new();
    let default_user = cfg.user_name.clone();
    let default_pass = cfg.password.clone();
    cfg.save(&path).expect("save");

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(raw["UserName"], "");
    assert_eq!(raw["Password"], "");

    let loaded = TelemetryConfig::load(&path).expect("load");
    assert_eq!(loaded.user_name, default_user);
    assert_eq!(loaded.password, default_pass);
}

#[test]
fn test_custom_credentials_survive_save() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let mut cfg = TelemetryConfig::new();
    cfg.user_name = "ops".to_string();
    cfg.save(&path).expect("save");

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(raw["UserName"], "ops");
}

#[test]
fn test_load_missing_file_falls_back_to_default() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("does-not-exist.config");

    let (cfg, err) = TelemetryConfig::load_or_default(&path);
    assert!(err.is_some());
    assert!(!cfg.enable);
    assert!(!cfg.guid.is_empty());
}

#[test]
fn test_load_malformed_file_falls_back_to_default() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);
    fs::write(&path, "{ not json").expect("write");

    let (cfg, err) = TelemetryConfig::load_or_default(&path);
    assert!(err.is_some());
    assert!(!cfg.enable);
}

#[test]
fn test_ensure_creates_file_once() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let (first, created) = TelemetryConfig::ensure(&path).expect("ensure");
    assert!(created);
    assert!(path.exists());

    let (second, created) = TelemetryConfig::ensure(&path).expect("ensure again");
    assert!(!created);
    assert_eq!(second.guid, first.guid);
}

#[test]
fn test_unknown_level_code_degrades_to_debug() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);
    fs::write(
        &path,
        r#"{"Enable":true,"MinLogLevel":42,"ReportHistoryLevel":0}"#,
    )
    .expect("write");

    let cfg = TelemetryConfig::load(&path).expect("load");
    assert_eq!(cfg.min_log_level, Level::Debug);
    assert_eq!(cfg.report_history_level, Level::Debug);
}

#[test]
fn test_missing_level_fields_default_to_warn() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);
    fs::write(&path, r#"{"Enable":true,"URI":"http://collector:9200"}"#).expect("write");

    let cfg = TelemetryConfig::load(&path).expect("load");
    assert_eq!(cfg.min_log_level, Level::Warn);
    assert_eq!(cfg.report_history_level, Level::Warn);
}

#[test]
fn test_loaded_name_is_sanitized() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join(TELEMETRY_CONFIG_FILENAME);

    let mut cfg = TelemetryConfig::new();
    cfg.name = "y".repeat(400);
    cfg.save(&path).expect("save");

    let loaded = TelemetryConfig::load(&path).expect("load");
    assert_eq!(loaded.name.len(), 255);
}
