// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn nucleo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nucleo"))
        .args(args)
        .output()
        .expect("Failed to execute nucleo")
}

fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("nucleo-cli-tests");
    let _ = std::fs::create_dir_all(&dir);
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    dir.join(format!("{}-{}.{}", prefix, nonce, ext))
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not a report ({}): {}", e, stdout))
}

#[test]
fn test_pingpong_passes() {
    let output = nucleo(&["pingpong", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let report = json_stdout(&output);
    assert_eq!(report["outcome"], "pass");
    assert_eq!(report["boards"].as_array().unwrap().len(), 2);
}

#[test]
fn test_pingpong_corruption_exits_with_fault() {
    let output = nucleo(&["pingpong", "--corrupt-byte", "3", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let report = json_stdout(&output);
    assert_eq!(report["outcome"], "fault");
    assert_eq!(report["boards"][1]["status"]["phase"]["phase"], "fail");
    assert_eq!(
        report["boards"][1]["status"]["phase"]["fault"]["class"],
        "mismatch"
    );
}

#[test]
fn test_pingpong_without_button_times_out() {
    let output = nucleo(&["pingpong", "--press-at", "9000", "--max-ticks", "2000"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Running"), "{}", stdout);
}

#[test]
fn test_rtc_calendar_summary() {
    let output = nucleo(&["rtc-calendar", "--run-ms", "3000"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("date=03-31-2015"), "{}", stdout);
}

#[test]
fn test_rtc_calendar_with_resets_writes_report() {
    let report_path = temp_path("calendar", "json");
    let output = nucleo(&[
        "rtc-calendar",
        "--clock-source",
        "lsi",
        "--run-ms",
        "3000",
        "--resets",
        "1",
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    let board = &report["boards"][0];
    assert_eq!(board["resets"], 1);
    assert_eq!(board["status"]["calendar_configured"], false);
    assert_eq!(board["status"]["calendar"]["date"], "03-31-2015");
}

#[test]
fn test_run_scenario_file() {
    let scenario = temp_path("alarm", "yaml");
    std::fs::write(
        &scenario,
        r#"
name: alarm-from-file
scenario: rtc_alarm
boards:
  - name: nucleo
limits:
  max_ms: 32000
  stop_on_terminal: false
"#,
    )
    .unwrap();

    let output = nucleo(&["run", "--scenario", scenario.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let report = json_stdout(&output);
    assert_eq!(report["scenario"], "alarm-from-file");
    assert_eq!(report["elapsed_ms"], 32000);
    assert_eq!(report["boards"][0]["status"]["alarm_fired"], true);
    assert_eq!(report["boards"][0]["led"], "high");
}

#[test]
fn test_invalid_scenario_is_config_error() {
    let scenario = temp_path("broken", "yaml");
    let manifest = nucleo_config::ScenarioManifest::uart_pingpong(100);
    let mut yaml: serde_yaml::Value = serde_yaml::to_value(&manifest).unwrap();
    yaml["boards"][1]["role"] = serde_yaml::Value::String("transmitter".to_string());
    std::fs::write(&scenario, serde_yaml::to_string(&yaml).unwrap()).unwrap();

    let output = nucleo(&["run", "--scenario", scenario.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_scenario_is_config_error() {
    let output = nucleo(&["run", "--scenario", "/nonexistent/scenario.yaml"]);
    assert_eq!(output.status.code(), Some(2));
}
