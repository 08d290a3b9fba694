// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! A board: one MCU, its interrupt vector table, its SysTick clock and the
//! firmware task running on it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::Serialize;

use crate::demos::fault::Fault;
use crate::lock;
use crate::mcu::{Mcu, McuConfig};
use crate::runtime::{Clock, Task};
use crate::signals::DigitalLevel;
use crate::snapshot::{BoardReport, LedTransition};
use crate::SimResult;

pub type SharedMcu = Arc<Mutex<Mcu>>;

pub type IsrHandler = Box<dyn FnMut(&mut Mcu) -> SimResult<()> + Send>;

/// Builds the main task of a board. Called again after every reset.
pub type Firmware = Arc<dyn Fn(BoardContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Where the firmware is in its flow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", content = "fault", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    ClockConfig,
    CalendarConfig,
    WaitingForButton,
    TxPending,
    TxDone,
    RxPending,
    RxDone,
    Verify,
    Running,
    Pass,
    Fail(Fault),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Pass | Phase::Fail(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDisplay {
    /// `hh:mm:ss`
    pub time: String,
    /// `mm-dd-yyyy`
    pub date: String,
}

/// What the firmware reports about itself since its last start.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardStatus {
    pub phase: Phase,
    pub calendar: Option<CalendarDisplay>,
    /// The calendar was (re)programmed during this boot.
    pub calendar_configured: bool,
    pub alarm_fired: bool,
}

/// Interrupt vector table, indexed by device IRQ number.
#[derive(Clone, Default)]
pub struct IsrTable {
    handlers: Arc<Mutex<BTreeMap<u32, IsrHandler>>>,
}

impl IsrTable {
    pub fn register(
        &self,
        irq: u32,
        handler: impl FnMut(&mut Mcu) -> SimResult<()> + Send + 'static,
    ) {
        lock(&self.handlers).insert(irq, Box::new(handler));
    }

    pub fn clear(&self) {
        lock(&self.handlers).clear();
    }

    pub fn is_registered(&self, irq: u32) -> bool {
        lock(&self.handlers).contains_key(&irq)
    }

    /// Runs the handler for `irq`. Returns false when none is installed.
    pub fn dispatch(&self, irq: u32, mcu: &mut Mcu) -> SimResult<bool> {
        let mut handlers = lock(&self.handlers);
        match handlers.get_mut(&irq) {
            Some(handler) => {
                handler(mcu)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for IsrTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(lock(&self.handlers).keys()).finish()
    }
}

/// Handles the firmware holds on its board.
#[derive(Debug, Clone)]
pub struct BoardContext {
    name: Arc<str>,
    mcu: SharedMcu,
    clock: Clock,
    isr: IsrTable,
    status: Arc<Mutex<BoardStatus>>,
}

impl BoardContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mcu(&self) -> &SharedMcu {
        &self.mcu
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn isr(&self) -> &IsrTable {
        &self.isr
    }

    /// Runs `f` with exclusive access to the MCU. Must not be held across
    /// an `.await`.
    pub fn with_mcu<R>(&self, f: impl FnOnce(&mut Mcu) -> R) -> R {
        f(&mut lock(&self.mcu))
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut status = lock(&self.status);
        if status.phase != phase {
            tracing::info!("{}: {:?} -> {:?}", self.name, status.phase, phase);
            status.phase = phase;
        }
    }

    pub fn update_status(&self, f: impl FnOnce(&mut BoardStatus)) {
        f(&mut lock(&self.status));
    }

    pub fn status(&self) -> BoardStatus {
        lock(&self.status).clone()
    }
}

pub struct Board {
    name: String,
    ctx: BoardContext,
    firmware: Firmware,
    task: Task,
    led: DigitalLevel,
    led_transitions: Vec<LedTransition>,
    resets: u32,
    power_cycles: u32,
}

impl Board {
    /// Powers up a board and starts `firmware` on it.
    pub fn new(name: &str, config: McuConfig, firmware: Firmware) -> Self {
        let ctx = BoardContext {
            name: Arc::from(name),
            mcu: Arc::new(Mutex::new(Mcu::cold_start(config))),
            clock: Clock::new(),
            isr: IsrTable::default(),
            status: Arc::default(),
        };
        let task = Task::new(name, firmware(ctx.clone()));
        Self {
            name: name.to_string(),
            ctx,
            firmware,
            task,
            led: DigitalLevel::Low,
            led_transitions: Vec::new(),
            resets: 0,
            power_cycles: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mcu(&self) -> SharedMcu {
        self.ctx.mcu.clone()
    }

    pub fn context(&self) -> &BoardContext {
        &self.ctx
    }

    pub fn status(&self) -> BoardStatus {
        self.ctx.status()
    }

    pub fn led(&self) -> DigitalLevel {
        self.led
    }

    pub fn led_transitions(&self) -> &[LedTransition] {
        &self.led_transitions
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn power_cycles(&self) -> u32 {
        self.power_cycles
    }

    pub fn uptime_ms(&self) -> u64 {
        self.ctx.clock.now_ms()
    }

    pub fn report(&self) -> BoardReport {
        let mcu = lock(&self.ctx.mcu);
        let uart_tx = mcu
            .config()
            .uart_sink
            .as_ref()
            .map(|sink| String::from_utf8_lossy(&lock(sink)).into_owned());
        BoardReport {
            name: self.name.clone(),
            status: self.status(),
            led: self.led,
            led_transitions: self.led_transitions.clone(),
            uptime_ms: self.uptime_ms(),
            resets: self.resets,
            power_cycles: self.power_cycles,
            uart_tx,
            peripherals: mcu.bus.snapshot(),
        }
    }

    /// Peripheral half of a tick: advance the hardware by one millisecond,
    /// take every pending enabled interrupt, then the SysTick.
    pub fn tick_hardware(&mut self) -> SimResult<()> {
        {
            let mut mcu = lock(&self.ctx.mcu);
            for irq in mcu.tick()? {
                mcu.nvic_mut()?.clear_pending(irq);
                if !self.ctx.isr.dispatch(irq, &mut mcu)? {
                    tracing::debug!("{}: IRQ {} has no handler", self.name, irq);
                }
            }
        }
        self.ctx.clock.advance();
        Ok(())
    }

    /// Firmware half of a tick: poll the main task if it was woken and
    /// sample the LED at `world_ms`.
    pub fn poll_firmware(&mut self, world_ms: u64) {
        if self.task.poll_if_woken() {
            tracing::trace!("{}: task polled at {} ms", self.name, world_ms);
        }
        self.sample_led(world_ms);
    }

    fn sample_led(&mut self, world_ms: u64) {
        let level = lock(&self.ctx.mcu).led();
        if level != self.led {
            self.led = level;
            self.led_transitions.push(LedTransition {
                at_ms: world_ms,
                level,
            });
        }
    }

    pub fn press_button(&mut self) {
        tracing::info!("{}: user button pressed", self.name);
        lock(&self.ctx.mcu).set_button(true);
    }

    pub fn release_button(&mut self) {
        lock(&self.ctx.mcu).set_button(false);
    }

    /// System reset: backup domain and RTC keep running, firmware restarts.
    pub fn reset(&mut self) {
        tracing::info!("{}: system reset", self.name);
        lock(&self.ctx.mcu).reset();
        self.resets += 1;
        self.restart_firmware();
    }

    /// Full power loss, backup domain included.
    pub fn power_cycle(&mut self) {
        tracing::info!("{}: power cycle", self.name);
        lock(&self.ctx.mcu).power_cycle();
        self.power_cycles += 1;
        self.restart_firmware();
    }

    fn restart_firmware(&mut self) {
        self.ctx.isr.clear();
        self.ctx.clock = Clock::new();
        self.ctx.update_status(|s| *s = BoardStatus::default());
        self.task = Task::new(&self.name, (self.firmware)(self.ctx.clone()));
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("name", &self.name)
            .field("task", &self.task)
            .field("led", &self.led)
            .field("resets", &self.resets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demos::led;
    use crate::ll;
    use crate::mcu::{BUTTON_PIN, EXTI15_10_IRQ};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn blinky() -> Firmware {
        Arc::new(|ctx: BoardContext| {
            async move {
                if ctx.with_mcu(led::init).is_err() {
                    return;
                }
                ctx.set_phase(Phase::Running);
                loop {
                    let _ = ctx.with_mcu(led::toggle);
                    ctx.clock().delay_ms(10).await;
                }
            }
            .boxed()
        })
    }

    fn run(board: &mut Board, from: u64, ticks: u64) {
        for t in from..from + ticks {
            board.tick_hardware().unwrap();
            board.poll_firmware(t);
        }
    }

    #[test]
    fn test_led_transitions_follow_firmware() {
        let mut board = Board::new("b", McuConfig::default(), blinky());
        run(&mut board, 0, 35);

        let at: Vec<u64> = board.led_transitions().iter().map(|t| t.at_ms).collect();
        assert_eq!(at, vec![0, 10, 20, 30]);
        assert_eq!(board.status().phase, Phase::Running);
    }

    #[test]
    fn test_reset_restarts_firmware_and_clears_vectors() {
        let mut board = Board::new("b", McuConfig::default(), blinky());
        board.context().isr().register(EXTI15_10_IRQ, |_| Ok(()));
        run(&mut board, 0, 15);
        assert!(board.uptime_ms() > 0);

        board.reset();
        assert_eq!(board.uptime_ms(), 0);
        assert_eq!(board.resets(), 1);
        assert_eq!(board.status().phase, Phase::Idle);
        assert!(!board.context().isr().is_registered(EXTI15_10_IRQ));

        run(&mut board, 15, 1);
        assert_eq!(board.status().phase, Phase::Running);
    }

    #[test]
    fn test_pending_interrupt_dispatched_once_per_tick() {
        let mut board = Board::new("b", McuConfig::default(), blinky());
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        board.context().isr().register(EXTI15_10_IRQ, move |mcu| {
            h.fetch_add(1, Ordering::Relaxed);
            ll::exti::clear_flag(mcu, BUTTON_PIN)
        });
        board.context().with_mcu(|mcu| {
            ll::exti::enable_it(mcu, BUTTON_PIN).unwrap();
            ll::exti::enable_falling_trig(mcu, BUTTON_PIN).unwrap();
            ll::nvic::enable_irq(mcu, EXTI15_10_IRQ).unwrap();
        });

        board.press_button();
        run(&mut board, 0, 3);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(!board
            .context()
            .with_mcu(|mcu| ll::exti::is_active_flag(mcu, BUTTON_PIN))
            .unwrap());
    }
}
