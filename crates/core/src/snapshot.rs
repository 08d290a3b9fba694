// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::board::{BoardStatus, Phase};
use crate::signals::DigitalLevel;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedTransition {
    pub at_ms: u64,
    pub level: DigitalLevel,
}

#[derive(Serialize, Debug, Clone)]
pub struct BoardReport {
    pub name: String,
    pub status: BoardStatus,
    pub led: DigitalLevel,
    pub led_transitions: Vec<LedTransition>,
    pub uptime_ms: u64,
    pub resets: u32,
    pub power_cycles: u32,
    /// Everything USART2 put on the wire, when captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uart_tx: Option<String>,
    /// Register view of every mapped peripheral at the end of the run.
    pub peripherals: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every board ended in `Pass`.
    Pass,
    /// At least one board ended in `Fail`.
    Fault,
    /// Stopped by the tick limit, nothing failed.
    Running,
}

#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub scenario: String,
    pub elapsed_ms: u64,
    pub outcome: RunOutcome,
    pub boards: Vec<BoardReport>,
}

impl RunReport {
    pub fn outcome_of<'a>(phases: impl IntoIterator<Item = &'a Phase>) -> RunOutcome {
        let mut all_pass = true;
        for phase in phases {
            match phase {
                Phase::Fail(_) => return RunOutcome::Fault,
                Phase::Pass => {}
                _ => all_pass = false,
            }
        }
        if all_pass {
            RunOutcome::Pass
        } else {
            RunOutcome::Running
        }
    }

    pub fn board(&self, name: &str) -> Option<&BoardReport> {
        self.boards.iter().find(|b| b.name == name)
    }
}
