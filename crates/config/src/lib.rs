// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_max_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    UartPingpong,
    RtcCalendar,
    RtcAlarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRole {
    Transmitter,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcClockSource {
    #[default]
    Lse,
    Lsi,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OscillatorOverrides {
    /// LSE start-up time in milliseconds.
    #[serde(default)]
    pub lse_startup_ms: Option<u32>,
    /// The 32.768 kHz crystal never starts.
    #[serde(default)]
    pub lse_fails: bool,
    /// The LSI RC oscillator never reports ready.
    #[serde(default)]
    pub lsi_fails: bool,
    /// RTCCLK never reaches the RTC, so init mode is never acknowledged.
    #[serde(default)]
    pub rtc_clock_stuck: bool,
    /// The RTC leaves init mode but RSF never comes back.
    #[serde(default)]
    pub rtc_sync_stuck: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardManifest {
    pub name: String,
    /// Only meaningful for `uart_pingpong`.
    #[serde(default)]
    pub role: Option<BoardRole>,
    /// Overrides the 9600 baud the firmware programs; a mismatch with the
    /// other end shows up as framing errors.
    #[serde(default)]
    pub baud_rate: Option<u32>,
    #[serde(default)]
    pub oscillators: OscillatorOverrides,
}

impl BoardManifest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: None,
            baud_rate: None,
            oscillators: OscillatorOverrides::default(),
        }
    }

    pub fn with_role(mut self, role: BoardRole) -> Self {
        self.role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RtcSettings {
    #[serde(default)]
    pub clock_source: RtcClockSource,
    /// Bound the oscillator and RTC flag waits.
    #[serde(default)]
    pub use_timeout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Press the user button and release it shortly after.
    PressButton,
    ReleaseButton,
    Reset,
    PowerCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledEvent {
    pub at_ms: u64,
    pub board: String,
    pub action: EventAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunLimits {
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// End the run as soon as every board passed or one failed.
    #[serde(default = "default_true")]
    pub stop_on_terminal: bool,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_ms: default_max_ms(),
            stop_on_terminal: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultInjection {
    /// Index of a character inverted on its way from the first board to the
    /// second.
    #[serde(default)]
    pub corrupt_byte: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub scenario: ScenarioKind,
    pub boards: Vec<BoardManifest>,
    #[serde(default)]
    pub rtc: RtcSettings,
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
    #[serde(default)]
    pub limits: RunLimits,
    #[serde(default)]
    pub faults: FaultInjection,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    UnsupportedSchema(String),
    #[error("Scenario declares no boards")]
    NoBoards,
    #[error("Board name '{0}' is used more than once")]
    DuplicateBoard(String),
    #[error("uart_pingpong needs exactly one transmitter and one receiver board")]
    PingPongRoles,
    #[error("Board '{0}' has a role but the scenario is not uart_pingpong")]
    UnexpectedRole(String),
    #[error("Event {index} refers to unknown board '{board}'")]
    UnknownBoard { index: usize, board: String },
    #[error("Limit 'max_ms' must be greater than zero")]
    ZeroRunLength,
    #[error("Fault 'corrupt_byte' only applies to uart_pingpong")]
    CorruptByteWithoutLink,
    #[error("Board '{0}' sets a baud rate of zero")]
    ZeroBaudRate(String),
}

impl ScenarioManifest {
    /// Two boards wired together, the transmitter's button pressed at
    /// `press_at_ms`.
    pub fn uart_pingpong(press_at_ms: u64) -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "uart-pingpong".to_string(),
            scenario: ScenarioKind::UartPingpong,
            boards: vec![
                BoardManifest::new("tx").with_role(BoardRole::Transmitter),
                BoardManifest::new("rx").with_role(BoardRole::Receiver),
            ],
            rtc: RtcSettings::default(),
            events: vec![ScheduledEvent {
                at_ms: press_at_ms,
                board: "tx".to_string(),
                action: EventAction::PressButton,
            }],
            limits: RunLimits::default(),
            faults: FaultInjection::default(),
        }
    }

    /// One board running an RTC demo for `run_ms`.
    pub fn rtc(kind: ScenarioKind, rtc: RtcSettings, run_ms: u64) -> Self {
        let name = match kind {
            ScenarioKind::RtcAlarm => "rtc-alarm",
            _ => "rtc-calendar",
        };
        Self {
            schema_version: default_schema_version(),
            name: name.to_string(),
            scenario: kind,
            boards: vec![BoardManifest::new("nucleo")],
            rtc,
            events: Vec::new(),
            limits: RunLimits {
                max_ms: run_ms,
                stop_on_terminal: true,
            },
            faults: FaultInjection::default(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Scenario Manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario manifest at {:?}", path))?;
        let manifest = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid scenario manifest {:?}", path))?;
        tracing::debug!(
            "Loaded scenario '{}' ({} boards) from {:?}",
            manifest.name,
            manifest.boards.len(),
            path
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema(self.schema_version.clone()));
        }
        if self.boards.is_empty() {
            return Err(ConfigError::NoBoards);
        }

        let mut names = HashSet::new();
        for board in &self.boards {
            if !names.insert(board.name.as_str()) {
                return Err(ConfigError::DuplicateBoard(board.name.clone()));
            }
            if board.baud_rate == Some(0) {
                return Err(ConfigError::ZeroBaudRate(board.name.clone()));
            }
        }

        if self.scenario == ScenarioKind::UartPingpong {
            let roles: Vec<Option<BoardRole>> = self.boards.iter().map(|b| b.role).collect();
            let count = |role| roles.iter().filter(|r| **r == Some(role)).count();
            if roles.len() != 2
                || count(BoardRole::Transmitter) != 1
                || count(BoardRole::Receiver) != 1
            {
                return Err(ConfigError::PingPongRoles);
            }
        } else {
            if let Some(board) = self.boards.iter().find(|b| b.role.is_some()) {
                return Err(ConfigError::UnexpectedRole(board.name.clone()));
            }
            if self.faults.corrupt_byte.is_some() {
                return Err(ConfigError::CorruptByteWithoutLink);
            }
        }

        for (index, event) in self.events.iter().enumerate() {
            if !names.contains(event.board.as_str()) {
                return Err(ConfigError::UnknownBoard {
                    index,
                    board: event.board.clone(),
                });
            }
        }

        if self.limits.max_ms == 0 {
            return Err(ConfigError::ZeroRunLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_pingpong_manifest() {
        let yaml = r#"
name: bench
scenario: uart_pingpong
boards:
  - name: left
    role: transmitter
  - name: right
    role: receiver
events:
  - at_ms: 250
    board: left
    action: press_button
"#;
        let manifest = ScenarioManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.schema_version, "1.0");
        assert_eq!(manifest.limits.max_ms, 10_000);
        assert!(manifest.limits.stop_on_terminal);
        assert_eq!(manifest.events[0].action, EventAction::PressButton);
        assert_eq!(manifest.rtc.clock_source, RtcClockSource::Lse);
    }

    #[test]
    fn test_pingpong_needs_both_roles() {
        let mut manifest = ScenarioManifest::uart_pingpong(100);
        manifest.boards[1].role = Some(BoardRole::Transmitter);
        assert_eq!(manifest.validate(), Err(ConfigError::PingPongRoles));

        manifest.boards.pop();
        assert_eq!(manifest.validate(), Err(ConfigError::PingPongRoles));
    }

    #[test]
    fn test_event_for_unknown_board() {
        let mut manifest = ScenarioManifest::uart_pingpong(100);
        manifest.events[0].board = "ghost".to_string();
        assert_eq!(
            manifest.validate(),
            Err(ConfigError::UnknownBoard {
                index: 0,
                board: "ghost".to_string()
            })
        );
    }

    #[test]
    fn test_rtc_scenario_rejects_link_faults() {
        let mut manifest =
            ScenarioManifest::rtc(ScenarioKind::RtcCalendar, RtcSettings::default(), 1000);
        assert!(manifest.validate().is_ok());
        manifest.faults.corrupt_byte = Some(3);
        assert_eq!(manifest.validate(), Err(ConfigError::CorruptByteWithoutLink));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = r#"
name: typo
scenario: rtc_calendar
boards:
  - name: nucleo
    clok_source: lsi
"#;
        assert!(ScenarioManifest::from_yaml(yaml).is_err());
    }
}
