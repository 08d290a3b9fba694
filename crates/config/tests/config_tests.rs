// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use nucleo_config::{
    ConfigError, EventAction, RtcClockSource, ScenarioKind, ScenarioManifest,
};
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_file(prefix: &str, contents: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("nucleo-config-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

#[test]
fn test_full_rtc_manifest_from_file() {
    let path = write_temp_file(
        "rtc",
        r#"
schema_version: "1.0"
name: calendar-with-resets
scenario: rtc_calendar
boards:
  - name: nucleo
    oscillators:
      lse_startup_ms: 50
      lsi_fails: true
      rtc_sync_stuck: true
rtc:
  clock_source: lsi
  use_timeout: true
events:
  - at_ms: 3000
    board: nucleo
    action: reset
  - at_ms: 6000
    board: nucleo
    action: power_cycle
limits:
  max_ms: 9000
  stop_on_terminal: false
"#,
    );

    let manifest = ScenarioManifest::from_file(&path).unwrap();
    assert_eq!(manifest.scenario, ScenarioKind::RtcCalendar);
    assert_eq!(manifest.rtc.clock_source, RtcClockSource::Lsi);
    assert!(manifest.rtc.use_timeout);
    assert_eq!(manifest.boards[0].oscillators.lse_startup_ms, Some(50));
    assert!(manifest.boards[0].oscillators.lsi_fails);
    assert!(manifest.boards[0].oscillators.rtc_sync_stuck);
    assert!(!manifest.boards[0].oscillators.rtc_clock_stuck);
    assert_eq!(manifest.events[1].action, EventAction::PowerCycle);
    assert!(!manifest.limits.stop_on_terminal);
}

#[test]
fn test_bad_schema_version_reported() {
    let yaml = r#"
schema_version: "2.0"
name: future
scenario: rtc_alarm
boards:
  - name: nucleo
"#;
    let err = ScenarioManifest::from_yaml(yaml).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::UnsupportedSchema("2.0".to_string()))
    );
}

#[test]
fn test_missing_file_has_context() {
    let err = ScenarioManifest::from_file("/nonexistent/scenario.yaml").unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read scenario manifest"));
}

#[test]
fn test_builtin_pingpong_is_valid() {
    let manifest = ScenarioManifest::uart_pingpong(500);
    assert!(manifest.validate().is_ok());
    assert_eq!(manifest.events[0].at_ms, 500);
    assert_eq!(manifest.boards.len(), 2);
}
