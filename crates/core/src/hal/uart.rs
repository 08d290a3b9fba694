// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{HalError, HalResult};
use crate::ll;
use crate::mcu::{Mcu, GPIOA_BASE};
use crate::peripherals::gpio::PinMode;
use crate::peripherals::rcc;
use crate::peripherals::uart::*;
use crate::SimResult;

bitflags::bitflags! {
    /// Transfer errors reported to [`UartCallbacks::error`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, serde::Serialize, serde::Deserialize)]
    pub struct UartErrorFlags: u32 {
        const PARITY = 1 << 0;
        const NOISE = 1 << 1;
        const FRAMING = 1 << 2;
        const OVERRUN = 1 << 3;
    }
}

impl UartErrorFlags {
    pub fn from_status(sr: u32) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::PARITY, sr & SR_PE != 0);
        flags.set(Self::NOISE, sr & SR_NE != 0);
        flags.set(Self::FRAMING, sr & SR_FE != 0);
        flags.set(Self::OVERRUN, sr & SR_ORE != 0);
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordLength {
    #[default]
    Bits8,
    Bits9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UartMode {
    Rx,
    Tx,
    #[default]
    TxRx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartInit {
    pub baud_rate: u32,
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// RTS/CTS hardware flow control.
    pub hw_flow_control: bool,
    pub mode: UartMode,
}

impl Default for UartInit {
    /// 9600 8N1, no flow control.
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            word_length: WordLength::Bits8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            hw_flow_control: false,
            mode: UartMode::TxRx,
        }
    }
}

/// Completion notifications, invoked from [`UartHandle::irq_handler`].
pub trait UartCallbacks {
    fn tx_complete(&self);
    fn rx_complete(&self);
    fn error(&self, errors: UartErrorFlags);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Reset,
    Ready,
}

#[derive(Debug)]
struct TxTransfer {
    data: Vec<u8>,
    next: usize,
}

#[derive(Debug)]
struct RxTransfer {
    data: Vec<u8>,
    expected: usize,
}

/// USART2 on PA2 (TX) / PA3 (RX), AF7.
#[derive(Debug)]
pub struct UartHandle {
    base: u64,
    irq: u32,
    init: UartInit,
    state: HandleState,
    tx: Option<TxTransfer>,
    rx: Option<RxTransfer>,
    received: Option<Vec<u8>>,
    error: UartErrorFlags,
}

const TX_PIN: u8 = 2;
const RX_PIN: u8 = 3;
const AF7_USART2: u32 = 7;

impl UartHandle {
    pub fn new(base: u64, irq: u32, init: UartInit) -> Self {
        Self {
            base,
            irq,
            init,
            state: HandleState::Reset,
            tx: None,
            rx: None,
            received: None,
            error: UartErrorFlags::empty(),
        }
    }

    pub fn error_flags(&self) -> UartErrorFlags {
        self.error
    }

    pub fn is_busy(&self) -> bool {
        self.tx.is_some() || self.rx.is_some()
    }

    fn msp_init(&self, mcu: &mut Mcu) -> HalResult<()> {
        ll::rcc::ahb_enable_clock(mcu, rcc::AHBENR_GPIOAEN)?;
        ll::rcc::apb1_enable_clock(mcu, rcc::APB1ENR_USART2EN)?;
        for pin in [TX_PIN, RX_PIN] {
            ll::gpio::set_pin_mode(mcu, GPIOA_BASE, pin, PinMode::Alternate)?;
            ll::gpio::set_pin_pull(mcu, GPIOA_BASE, pin, ll::gpio::PULL_UP)?;
            ll::gpio::set_af(mcu, GPIOA_BASE, pin, AF7_USART2)?;
        }
        ll::nvic::enable_irq(mcu, self.irq)?;
        Ok(())
    }

    fn msp_deinit(&self, mcu: &mut Mcu) -> HalResult<()> {
        ll::rcc::apb1_disable_clock(mcu, rcc::APB1ENR_USART2EN)?;
        for pin in [TX_PIN, RX_PIN] {
            ll::gpio::set_pin_mode(mcu, GPIOA_BASE, pin, PinMode::Analog)?;
        }
        ll::nvic::disable_irq(mcu, self.irq)?;
        Ok(())
    }

    /// Programs the line format and enables the USART.
    pub fn init(&mut self, mcu: &mut Mcu) -> HalResult<()> {
        if self.init.baud_rate == 0 {
            return Err(HalError::InvalidParameter("baud rate"));
        }
        if self.state == HandleState::Reset {
            self.msp_init(mcu)?;
        }

        let base = self.base;
        mcu.clear_bits(base + CR1, CR1_UE)?;

        let stop = match self.init.stop_bits {
            StopBits::One => 0,
            StopBits::Two => CR2_STOP_2,
        };
        mcu.modify(base + CR2, |v| (v & !CR2_STOP_MASK) | stop)?;

        let mut cr1 = match self.init.mode {
            UartMode::Rx => CR1_RE,
            UartMode::Tx => CR1_TE,
            UartMode::TxRx => CR1_RE | CR1_TE,
        };
        if self.init.word_length == WordLength::Bits9 {
            cr1 |= CR1_M;
        }
        cr1 |= match self.init.parity {
            Parity::None => 0,
            Parity::Even => CR1_PCE,
            Parity::Odd => CR1_PCE | CR1_PS,
        };
        mcu.write(base + CR1, cr1)?;

        let flow = if self.init.hw_flow_control {
            CR3_RTSE | CR3_CTSE
        } else {
            0
        };
        mcu.write(base + CR3, flow)?;

        let baud = self.init.baud_rate;
        mcu.write(base + BRR, (PCLK1_HZ + baud / 2) / baud)?;
        mcu.set_bits(base + CR1, CR1_UE)?;

        self.state = HandleState::Ready;
        self.error = UartErrorFlags::empty();
        tracing::debug!("UART {:#010x} initialized: {:?}", base, self.init);
        Ok(())
    }

    pub fn deinit(&mut self, mcu: &mut Mcu) -> HalResult<()> {
        if self.state == HandleState::Ready {
            mcu.clear_bits(self.base + CR1, CR1_UE)?;
        }
        self.msp_deinit(mcu)?;
        self.state = HandleState::Reset;
        self.tx = None;
        self.rx = None;
        self.received = None;
        self.error = UartErrorFlags::empty();
        Ok(())
    }

    /// Starts an interrupt-driven transmission of `data`.
    pub fn transmit_it(&mut self, mcu: &mut Mcu, data: &[u8]) -> HalResult<()> {
        if self.state != HandleState::Ready {
            return Err(HalError::NotInitialized);
        }
        if self.tx.is_some() {
            return Err(HalError::Busy);
        }
        if data.is_empty() {
            return Err(HalError::InvalidParameter("empty transmit buffer"));
        }
        self.tx = Some(TxTransfer {
            data: data.to_vec(),
            next: 0,
        });
        mcu.set_bits(self.base + CR1, CR1_TXEIE)?;
        tracing::debug!("UART: transmit of {} bytes started", data.len());
        Ok(())
    }

    /// Starts an interrupt-driven reception of exactly `len` bytes.
    pub fn receive_it(&mut self, mcu: &mut Mcu, len: usize) -> HalResult<()> {
        if self.state != HandleState::Ready {
            return Err(HalError::NotInitialized);
        }
        if self.rx.is_some() {
            return Err(HalError::Busy);
        }
        if len == 0 {
            return Err(HalError::InvalidParameter("empty receive buffer"));
        }
        self.rx = Some(RxTransfer {
            data: Vec::with_capacity(len),
            expected: len,
        });
        self.received = None;
        mcu.set_bits(self.base + CR3, CR3_EIE)?;
        mcu.set_bits(self.base + CR1, CR1_PEIE | CR1_RXNEIE)?;
        tracing::debug!("UART: reception of {} bytes armed", len);
        Ok(())
    }

    /// Buffer of the last completed reception.
    pub fn take_received(&mut self) -> Option<Vec<u8>> {
        self.received.take()
    }

    /// Services one USART interrupt.
    pub fn irq_handler(&mut self, mcu: &mut Mcu, callbacks: &dyn UartCallbacks) -> SimResult<()> {
        if self.state != HandleState::Ready {
            return Ok(());
        }
        let base = self.base;
        let sr = mcu.read(base + SR)?;
        let cr1 = mcu.read(base + CR1)?;
        let cr3 = mcu.read(base + CR3)?;
        let rx_ready = sr & SR_RXNE != 0 && cr1 & CR1_RXNEIE != 0;

        let errors = UartErrorFlags::from_status(sr);
        if errors.is_empty() {
            if rx_ready {
                return self.receive_byte(mcu, callbacks);
            }
        } else if cr3 & CR3_EIE != 0 || cr1 & (CR1_RXNEIE | CR1_PEIE) != 0 {
            self.error |= errors;
            if rx_ready {
                self.receive_byte(mcu, callbacks)?;
            } else {
                // Completes the SR-then-DR clear sequence.
                mcu.read(base + DR)?;
            }
            if errors.contains(UartErrorFlags::OVERRUN) {
                self.abort_receive(mcu)?;
            }
            tracing::warn!("UART: transfer error {:?}", errors);
            callbacks.error(errors);
            return Ok(());
        }

        if sr & SR_TXE != 0 && cr1 & CR1_TXEIE != 0 {
            return self.transmit_byte(mcu);
        }
        if sr & SR_TC != 0 && cr1 & CR1_TCIE != 0 {
            return self.end_transmit(mcu, callbacks);
        }
        Ok(())
    }

    fn transmit_byte(&mut self, mcu: &mut Mcu) -> SimResult<()> {
        let Some(tx) = self.tx.as_mut() else {
            return mcu.clear_bits(self.base + CR1, CR1_TXEIE);
        };
        if let Some(&byte) = tx.data.get(tx.next) {
            mcu.write(self.base + DR, byte as u32)?;
            tx.next += 1;
        }
        if tx.next >= tx.data.len() {
            mcu.modify(self.base + CR1, |v| (v & !CR1_TXEIE) | CR1_TCIE)?;
        }
        Ok(())
    }

    fn end_transmit(&mut self, mcu: &mut Mcu, callbacks: &dyn UartCallbacks) -> SimResult<()> {
        mcu.clear_bits(self.base + CR1, CR1_TCIE)?;
        if let Some(tx) = self.tx.take() {
            tracing::debug!("UART: transmit of {} bytes complete", tx.data.len());
            callbacks.tx_complete();
        }
        Ok(())
    }

    fn receive_byte(&mut self, mcu: &mut Mcu, callbacks: &dyn UartCallbacks) -> SimResult<()> {
        let byte = (mcu.read(self.base + DR)? & 0xFF) as u8;
        let Some(rx) = self.rx.as_mut() else {
            return Ok(());
        };
        rx.data.push(byte);
        if rx.data.len() < rx.expected {
            return Ok(());
        }
        self.disable_rx_interrupts(mcu)?;
        if let Some(rx) = self.rx.take() {
            tracing::debug!("UART: reception of {} bytes complete", rx.data.len());
            self.received = Some(rx.data);
        }
        callbacks.rx_complete();
        Ok(())
    }

    fn disable_rx_interrupts(&self, mcu: &mut Mcu) -> SimResult<()> {
        mcu.clear_bits(self.base + CR1, CR1_RXNEIE | CR1_PEIE)?;
        mcu.clear_bits(self.base + CR3, CR3_EIE)
    }

    fn abort_receive(&mut self, mcu: &mut Mcu) -> SimResult<()> {
        self.disable_rx_interrupts(mcu)?;
        self.rx = None;
        Ok(())
    }
}
