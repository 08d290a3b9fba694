// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Two-board interrupt-driven UART exchange.
//!
//! The transmitter waits for the user button, sends [`PAYLOAD`] and expects
//! it back; the receiver waits for it and sends it back. Each board then
//! compares what it received with [`PAYLOAD`] and lights the LED on success.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::buffer::{first_mismatch, PAYLOAD};
use super::clock::system_clock_config;
use super::fault::{error_handler, Fault};
use super::led;
use crate::board::{BoardContext, Firmware, Phase};
use crate::hal::uart::{UartCallbacks, UartErrorFlags, UartHandle, UartInit};
use crate::ll;
use crate::lock;
use crate::mcu::{Mcu, BUTTON_PIN, EXTI15_10_IRQ, GPIOC_BASE, USART2_BASE, USART2_IRQ};
use crate::peripherals::gpio::PinMode;
use crate::peripherals::rcc;
use crate::runtime::TransferSignal;
use crate::SimResult;

/// Transmitter LED toggle period while waiting for the button.
pub const BUTTON_WAIT_TOGGLE_MS: u64 = 100;
/// Receiver double flash: on, off, on, off.
pub const DOUBLE_FLASH_MS: [u64; 4] = [100, 100, 100, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Starts on the button, sends first.
    Transmitter,
    /// Receives first, then echoes.
    Receiver,
}

#[derive(Debug, Clone)]
pub struct PingPongConfig {
    pub role: Role,
    pub uart: UartInit,
}

impl PingPongConfig {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            uart: UartInit::default(),
        }
    }
}

/// Routes the HAL completion callbacks into the transfer signal.
struct SignalCallbacks(TransferSignal);

impl UartCallbacks for SignalCallbacks {
    fn tx_complete(&self) {
        self.0.complete();
    }

    fn rx_complete(&self) {
        self.0.complete();
    }

    fn error(&self, errors: UartErrorFlags) {
        self.0.fail(errors);
    }
}

/// State of one board's run of the demo.
pub struct PingPongSession {
    ctx: BoardContext,
    role: Role,
    uart: Arc<Mutex<UartHandle>>,
    ready: TransferSignal,
    button_pressed: Arc<AtomicBool>,
    tx_buffer: &'static [u8],
    rx_buffer: Vec<u8>,
}

impl PingPongSession {
    pub fn new(ctx: BoardContext, config: PingPongConfig) -> Self {
        Self {
            ctx,
            role: config.role,
            uart: Arc::new(Mutex::new(UartHandle::new(
                USART2_BASE,
                USART2_IRQ,
                config.uart,
            ))),
            ready: TransferSignal::new(),
            button_pressed: Arc::new(AtomicBool::new(false)),
            tx_buffer: PAYLOAD,
            rx_buffer: Vec::new(),
        }
    }

    /// Runs the demo to its end state. Returns only on success.
    pub async fn run(mut self) {
        match self.execute().await {
            Ok(()) => {
                tracing::info!("{}: payload verified", self.ctx.name());
                self.ctx.set_phase(Phase::Pass);
            }
            Err(fault) => error_handler(&self.ctx, fault).await,
        }
    }

    async fn execute(&mut self) -> Result<(), Fault> {
        self.install_vectors();
        self.ctx.with_mcu(led::init)?;
        self.ctx.set_phase(Phase::ClockConfig);
        system_clock_config(&self.ctx).await?;
        self.ctx.with_mcu(|mcu| {
            let mut uart = lock(&self.uart);
            uart.deinit(mcu)?;
            uart.init(mcu)
        })?;

        match self.role {
            Role::Transmitter => self.transmit_first().await?,
            Role::Receiver => self.receive_first().await?,
        }
        self.verify()?;
        self.ctx.with_mcu(led::on)?;
        Ok(())
    }

    fn install_vectors(&self) {
        let uart = self.uart.clone();
        let callbacks = SignalCallbacks(self.ready.clone());
        self.ctx.isr().register(USART2_IRQ, move |mcu| {
            lock(&uart).irq_handler(mcu, &callbacks)
        });

        let pressed = self.button_pressed.clone();
        self.ctx.isr().register(EXTI15_10_IRQ, move |mcu| {
            if ll::exti::is_active_flag(mcu, BUTTON_PIN)? {
                ll::exti::clear_flag(mcu, BUTTON_PIN)?;
                pressed.store(true, Ordering::Release);
            }
            Ok(())
        });
    }

    async fn transmit_first(&mut self) -> Result<(), Fault> {
        self.ctx.with_mcu(button_exti_init)?;
        self.ctx.set_phase(Phase::WaitingForButton);
        while !self.button_pressed.load(Ordering::Acquire) {
            self.ctx.with_mcu(led::toggle)?;
            self.ctx.clock().delay_ms(BUTTON_WAIT_TOGGLE_MS).await;
        }
        self.ctx.with_mcu(led::off)?;

        self.start_transmit()?;
        self.ready.wait().await?;
        self.ctx.set_phase(Phase::TxDone);

        self.start_receive()?;
        self.ready.wait().await?;
        self.ctx.set_phase(Phase::RxDone);
        Ok(())
    }

    async fn receive_first(&mut self) -> Result<(), Fault> {
        self.start_receive()?;
        // The flag is only looked at between two flash sequences.
        loop {
            if let Some(outcome) = self.ready.try_take() {
                outcome?;
                break;
            }
            for (step, ms) in DOUBLE_FLASH_MS.iter().enumerate() {
                if step % 2 == 0 {
                    self.ctx.with_mcu(led::on)?;
                } else {
                    self.ctx.with_mcu(led::off)?;
                }
                self.ctx.clock().delay_ms(*ms).await;
            }
        }
        self.ctx.set_phase(Phase::RxDone);
        self.ctx.with_mcu(led::off)?;

        self.start_transmit()?;
        self.ready.wait().await?;
        self.ctx.set_phase(Phase::TxDone);
        Ok(())
    }

    fn start_transmit(&self) -> Result<(), Fault> {
        self.ready.arm()?;
        self.ctx.set_phase(Phase::TxPending);
        self.ctx
            .with_mcu(|mcu| lock(&self.uart).transmit_it(mcu, self.tx_buffer))?;
        Ok(())
    }

    fn start_receive(&self) -> Result<(), Fault> {
        self.ready.arm()?;
        self.ctx.set_phase(Phase::RxPending);
        self.ctx
            .with_mcu(|mcu| lock(&self.uart).receive_it(mcu, self.tx_buffer.len()))?;
        Ok(())
    }

    fn verify(&mut self) -> Result<(), Fault> {
        self.ctx.set_phase(Phase::Verify);
        self.rx_buffer = lock(&self.uart).take_received().unwrap_or_default();
        match first_mismatch(self.tx_buffer, &self.rx_buffer) {
            None => Ok(()),
            Some(m) => Err(Fault::Mismatch {
                index: m.index,
                remaining: m.remaining,
            }),
        }
    }
}

/// User button B1 on PC13 as an EXTI falling-edge interrupt.
fn button_exti_init(mcu: &mut Mcu) -> SimResult<()> {
    ll::rcc::ahb_enable_clock(mcu, rcc::AHBENR_GPIOCEN)?;
    ll::rcc::apb2_enable_clock(mcu, rcc::APB2ENR_SYSCFGEN)?;
    ll::gpio::set_pin_mode(mcu, GPIOC_BASE, BUTTON_PIN, PinMode::Input)?;
    ll::gpio::set_pin_pull(mcu, GPIOC_BASE, BUTTON_PIN, ll::gpio::PULL_NO)?;
    ll::exti::enable_it(mcu, BUTTON_PIN)?;
    ll::exti::enable_falling_trig(mcu, BUTTON_PIN)?;
    ll::nvic::enable_irq(mcu, EXTI15_10_IRQ)
}

pub fn firmware(config: PingPongConfig) -> Firmware {
    Arc::new(move |ctx: BoardContext| PingPongSession::new(ctx, config.clone()).run().boxed())
}
