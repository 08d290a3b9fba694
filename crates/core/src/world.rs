// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use nucleo_config::{
    BoardManifest, BoardRole, EventAction, RtcClockSource, ScenarioKind, ScenarioManifest,
};

use crate::board::{Board, Firmware};
use crate::demos::{rtc_alarm, rtc_calendar, uart_pingpong};
use crate::demos::{ClockSource, PingPongConfig, Role, RtcDemoConfig};
use crate::mcu::McuConfig;
use crate::network::{Interconnect, UartCrossLink};
use crate::peripherals::rcc::OscillatorTiming;
use crate::snapshot::{RunOutcome, RunReport};
use crate::SimResult;

/// How long a scheduled button press holds the button down.
pub const BUTTON_HOLD_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    PressButton,
    ReleaseButton,
    Reset,
    PowerCycle,
}

impl From<EventAction> for BoardAction {
    fn from(action: EventAction) -> Self {
        match action {
            EventAction::PressButton => BoardAction::PressButton,
            EventAction::ReleaseButton => BoardAction::ReleaseButton,
            EventAction::Reset => BoardAction::Reset,
            EventAction::PowerCycle => BoardAction::PowerCycle,
        }
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    at_ms: u64,
    board: String,
    action: BoardAction,
}

/// The orchestrator for a multi-board simulation.
///
/// Every board shares the world time base. One `step` is one millisecond:
/// due events, then each board's peripherals and interrupts, then the
/// interconnects, then each board's firmware task.
pub struct World {
    pub name: String,
    boards: Vec<Board>,
    links: Vec<Box<dyn Interconnect>>,
    /// Sorted by time; ties keep insertion order.
    events: Vec<Scheduled>,
    now_ms: u64,
}

impl World {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            boards: Vec::new(),
            links: Vec::new(),
            events: Vec::new(),
            now_ms: 0,
        }
    }

    pub fn add_board(&mut self, board: Board) {
        self.boards.push(board);
    }

    pub fn add_link(&mut self, link: Box<dyn Interconnect>) {
        self.links.push(link);
    }

    pub fn schedule(&mut self, at_ms: u64, board: &str, action: BoardAction) {
        let index = self.events.partition_point(|e| e.at_ms <= at_ms);
        self.events.insert(
            index,
            Scheduled {
                at_ms,
                board: board.to_string(),
                action,
            },
        );
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn board(&self, name: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.name() == name)
    }

    pub fn board_mut(&mut self, name: &str) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.name() == name)
    }

    fn apply_due_events(&mut self) {
        while self.events.first().is_some_and(|e| e.at_ms <= self.now_ms) {
            let event = self.events.remove(0);
            let Some(board) = self.board_mut(&event.board) else {
                tracing::warn!("event for unknown board '{}' dropped", event.board);
                continue;
            };
            match event.action {
                BoardAction::PressButton => {
                    board.press_button();
                    let release = self.now_ms + BUTTON_HOLD_MS;
                    self.schedule(release, &event.board, BoardAction::ReleaseButton);
                }
                BoardAction::ReleaseButton => board.release_button(),
                BoardAction::Reset => board.reset(),
                BoardAction::PowerCycle => board.power_cycle(),
            }
        }
    }

    /// Advances every board by one millisecond.
    pub fn step_all(&mut self) -> SimResult<()> {
        self.apply_due_events();
        for board in &mut self.boards {
            board.tick_hardware()?;
        }
        for link in &mut self.links {
            link.tick()?;
        }
        for board in &mut self.boards {
            board.poll_firmware(self.now_ms);
        }
        self.now_ms += 1;
        Ok(())
    }

    pub fn run_for(&mut self, ms: u64) -> SimResult<()> {
        for _ in 0..ms {
            self.step_all()?;
        }
        Ok(())
    }

    /// Steps until `done` holds or `max_ms` elapsed. Returns whether `done`
    /// was reached.
    pub fn run_until(&mut self, max_ms: u64, mut done: impl FnMut(&World) -> bool) -> SimResult<bool> {
        let deadline = self.now_ms + max_ms;
        while self.now_ms < deadline {
            if done(self) {
                return Ok(true);
            }
            self.step_all()?;
        }
        Ok(done(self))
    }

    /// Runs until every board passed or one failed, at most `max_ms`.
    pub fn run_to_completion(&mut self, max_ms: u64) -> SimResult<RunOutcome> {
        self.run_until(max_ms, |w| w.outcome() != RunOutcome::Running)?;
        Ok(self.outcome())
    }

    pub fn outcome(&self) -> RunOutcome {
        let statuses: Vec<_> = self.boards.iter().map(Board::status).collect();
        RunReport::outcome_of(statuses.iter().map(|s| &s.phase))
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            scenario: self.name.clone(),
            elapsed_ms: self.now_ms,
            outcome: self.outcome(),
            boards: self.boards.iter().map(Board::report).collect(),
        }
    }

    /// Builds the boards, links and event schedule a manifest describes.
    pub fn from_manifest(manifest: &ScenarioManifest) -> anyhow::Result<Self> {
        manifest.validate()?;
        let mut world = World::new(&manifest.name);

        for entry in &manifest.boards {
            let firmware = firmware_for(manifest, entry)
                .with_context(|| format!("No firmware for board '{}'", entry.name))?;
            world.add_board(Board::new(&entry.name, mcu_config(entry), firmware));
        }

        if manifest.scenario == ScenarioKind::UartPingpong {
            let (a, b) = (&manifest.boards[0].name, &manifest.boards[1].name);
            let mcu_a = world.board(a).map(Board::mcu).context("first board missing")?;
            let mcu_b = world.board(b).map(Board::mcu).context("second board missing")?;
            let link = UartCrossLink::new(a, mcu_a, b, mcu_b)
                .with_corrupt_byte(manifest.faults.corrupt_byte);
            world.add_link(Box::new(link));
        }

        for event in &manifest.events {
            world.schedule(event.at_ms, &event.board, event.action.into());
        }
        tracing::info!(
            "World '{}': {} boards, {} links, {} events",
            world.name,
            world.boards.len(),
            world.links.len(),
            world.events.len()
        );
        Ok(world)
    }
}

fn mcu_config(entry: &BoardManifest) -> McuConfig {
    let defaults = OscillatorTiming::default();
    McuConfig {
        oscillators: OscillatorTiming {
            lse_startup_ticks: entry
                .oscillators
                .lse_startup_ms
                .unwrap_or(defaults.lse_startup_ticks),
            lse_fails: entry.oscillators.lse_fails,
            lsi_fails: entry.oscillators.lsi_fails,
            rtc_clock_stuck: entry.oscillators.rtc_clock_stuck,
            rtc_sync_stuck: entry.oscillators.rtc_sync_stuck,
            ..defaults
        },
        uart_sink: Some(Arc::new(Mutex::new(Vec::new()))),
    }
}

fn firmware_for(manifest: &ScenarioManifest, entry: &BoardManifest) -> Option<Firmware> {
    let rtc = RtcDemoConfig {
        clock_source: match manifest.rtc.clock_source {
            RtcClockSource::Lse => ClockSource::Lse,
            RtcClockSource::Lsi => ClockSource::Lsi,
        },
        use_timeout: manifest.rtc.use_timeout,
    };
    Some(match manifest.scenario {
        ScenarioKind::UartPingpong => {
            let role = match entry.role? {
                BoardRole::Transmitter => Role::Transmitter,
                BoardRole::Receiver => Role::Receiver,
            };
            let mut config = PingPongConfig::new(role);
            if let Some(baud) = entry.baud_rate {
                config.uart.baud_rate = baud;
            }
            uart_pingpong::firmware(config)
        }
        ScenarioKind::RtcCalendar => rtc_calendar::firmware(rtc),
        ScenarioKind::RtcAlarm => rtc_alarm::firmware(rtc),
    })
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("boards", &self.boards)
            .field("links", &self.links.len())
            .field("now_ms", &self.now_ms)
            .finish()
    }
}
