// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Peripheral, PeripheralTickResult, SimResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const SR: u64 = 0x00;
pub const DR: u64 = 0x04;
pub const BRR: u64 = 0x08;
pub const CR1: u64 = 0x0C;
pub const CR2: u64 = 0x10;
pub const CR3: u64 = 0x14;

pub const SR_PE: u32 = 1 << 0;
pub const SR_FE: u32 = 1 << 1;
pub const SR_NE: u32 = 1 << 2;
pub const SR_ORE: u32 = 1 << 3;
pub const SR_IDLE: u32 = 1 << 4;
pub const SR_RXNE: u32 = 1 << 5;
pub const SR_TC: u32 = 1 << 6;
pub const SR_TXE: u32 = 1 << 7;
pub const SR_ERRORS: u32 = SR_PE | SR_FE | SR_NE | SR_ORE;

pub const CR1_RE: u32 = 1 << 2;
pub const CR1_TE: u32 = 1 << 3;
pub const CR1_RXNEIE: u32 = 1 << 5;
pub const CR1_TCIE: u32 = 1 << 6;
pub const CR1_TXEIE: u32 = 1 << 7;
pub const CR1_PEIE: u32 = 1 << 8;
pub const CR1_PS: u32 = 1 << 9;
pub const CR1_PCE: u32 = 1 << 10;
pub const CR1_M: u32 = 1 << 12;
pub const CR1_UE: u32 = 1 << 13;

pub const CR2_STOP_MASK: u32 = 0b11 << 12;
pub const CR2_STOP_2: u32 = 0b10 << 12;

pub const CR3_EIE: u32 = 1 << 0;
pub const CR3_RTSE: u32 = 1 << 8;
pub const CR3_CTSE: u32 = 1 << 9;

/// APB1 clock after the 32 MHz system clock configuration.
pub const PCLK1_HZ: u32 = 32_000_000;

const SR_RESET: u32 = SR_TXE | SR_TC;
const TICK_US: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

/// Character format both ends of a line have to agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LineFormat {
    pub baud: u32,
    /// 8 or 9, parity bit included.
    pub word_length: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl LineFormat {
    /// Bits on the wire for one character, start bit included.
    pub fn frame_bits(&self) -> u32 {
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + self.word_length as u32 + stop
    }

    pub fn frame_us(&self) -> u64 {
        if self.baud == 0 {
            return u64::MAX;
        }
        (self.frame_bits() as u64 * 1_000_000).div_ceil(self.baud as u64)
    }

    /// Receivers tolerate a few percent of baud-rate error.
    pub fn compatible_with(&self, other: &LineFormat) -> bool {
        let tolerance = self.baud / 40;
        self.word_length == other.word_length
            && self.parity == other.parity
            && self.stop_bits == other.stop_bits
            && self.baud.abs_diff(other.baud) <= tolerance
    }
}

/// One character as it travels over a cross-link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Frame {
    pub data: u16,
    pub format: LineFormat,
    /// Set by line noise injection.
    pub noisy: bool,
}

/// STM32L1 USART (F1-style register layout: SR/DR/BRR/CR1/CR2/CR3).
///
/// Transmitted characters leave the shift register after one frame time and
/// queue up in [`Uart::take_tx_frames`]; the other end of the line delivers
/// characters with [`Uart::receive_frame`].
#[derive(Debug, serde::Serialize)]
pub struct Uart {
    sr: u32,
    rdr: u16,
    brr: u32,
    cr1: u32,
    cr2: u32,
    cr3: u32,
    tdr: Option<u16>,
    shifter: Option<u16>,
    shift_elapsed_us: u64,
    /// SR was read while an error flag was set; a following DR read clears
    /// the error flags.
    error_read_armed: bool,
    #[serde(skip)]
    wire_out: VecDeque<Frame>,
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
}

impl Default for Uart {
    fn default() -> Self {
        Self {
            sr: SR_RESET,
            rdr: 0,
            brr: 0,
            cr1: 0,
            cr2: 0,
            cr3: 0,
            tdr: None,
            shifter: None,
            shift_elapsed_us: 0,
            error_read_armed: false,
            wire_out: VecDeque::new(),
            sink: None,
        }
    }
}

impl Uart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors every transmitted byte into `sink`.
    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>) {
        self.sink = sink;
    }

    pub fn line_format(&self) -> LineFormat {
        let baud = match self.brr {
            0 => 0,
            brr => PCLK1_HZ / brr,
        };
        let parity = match (self.cr1 & CR1_PCE != 0, self.cr1 & CR1_PS != 0) {
            (false, _) => Parity::None,
            (true, false) => Parity::Even,
            (true, true) => Parity::Odd,
        };
        let stop_bits = if self.cr2 & CR2_STOP_MASK == CR2_STOP_2 {
            StopBits::Two
        } else {
            StopBits::One
        };
        LineFormat {
            baud,
            word_length: if self.cr1 & CR1_M != 0 { 9 } else { 8 },
            parity,
            stop_bits,
        }
    }

    fn enabled(&self, bit: u32) -> bool {
        self.cr1 & CR1_UE != 0 && self.cr1 & bit != 0
    }

    /// Characters that finished shifting out since the last call.
    pub fn take_tx_frames(&mut self) -> Vec<Frame> {
        self.wire_out.drain(..).collect()
    }

    /// Delivers a character from the line into the receiver.
    pub fn receive_frame(&mut self, frame: Frame) {
        if !self.enabled(CR1_RE) {
            tracing::trace!("USART receiver disabled, dropping {:#04x}", frame.data);
            return;
        }
        if self.sr & SR_RXNE != 0 {
            // Previous character not read yet: the new one is lost.
            self.sr |= SR_ORE;
            tracing::debug!("USART overrun, lost {:#04x}", frame.data);
            return;
        }
        let own = self.line_format();
        if !own.compatible_with(&frame.format) {
            self.sr |= SR_FE;
            tracing::debug!(
                "USART framing error: line {:?}, receiver {:?}",
                frame.format,
                own
            );
        }
        if frame.noisy {
            self.sr |= SR_NE;
        }
        self.rdr = frame.data & self.data_mask();
        self.sr |= SR_RXNE;
    }

    fn data_mask(&self) -> u16 {
        if self.cr1 & CR1_M != 0 {
            0x1FF
        } else {
            0xFF
        }
    }

    fn write_dr(&mut self, value: u32) {
        let data = (value as u16) & self.data_mask();
        self.sr &= !SR_TC;
        if !self.enabled(CR1_TE) {
            tracing::warn!("USART DR write with transmitter disabled");
            return;
        }
        if self.shifter.is_none() {
            self.shifter = Some(data);
            self.shift_elapsed_us = 0;
        } else {
            self.tdr = Some(data);
            self.sr &= !SR_TXE;
        }
    }

    fn read_dr(&mut self) -> u32 {
        self.sr &= !SR_RXNE;
        if self.error_read_armed {
            self.sr &= !(SR_ERRORS | SR_IDLE);
            self.error_read_armed = false;
        }
        self.rdr as u32
    }

    fn shift_out(&mut self) {
        if self.shifter.is_none() {
            return;
        }
        let format = self.line_format();
        let frame_us = format.frame_us();
        self.shift_elapsed_us += TICK_US;

        while self.shift_elapsed_us >= frame_us {
            let Some(data) = self.shifter.take() else {
                break;
            };
            self.shift_elapsed_us -= frame_us;
            self.wire_out.push_back(Frame {
                data,
                format,
                noisy: false,
            });
            if let Some(sink) = &self.sink {
                crate::lock(sink).push(data as u8);
            }
            match self.tdr.take() {
                Some(next) => {
                    self.shifter = Some(next);
                    self.sr |= SR_TXE;
                }
                None => {
                    self.sr |= SR_TC;
                    self.shift_elapsed_us = 0;
                }
            }
        }
    }

    fn irq_line(&self) -> bool {
        let sr = self.sr;
        let cr1 = self.cr1;
        (cr1 & CR1_TXEIE != 0 && sr & SR_TXE != 0)
            || (cr1 & CR1_TCIE != 0 && sr & SR_TC != 0)
            || (cr1 & CR1_RXNEIE != 0 && sr & (SR_RXNE | SR_ORE) != 0)
            || (cr1 & CR1_PEIE != 0 && sr & SR_PE != 0)
            || (self.cr3 & CR3_EIE != 0 && sr & (SR_FE | SR_NE | SR_ORE) != 0)
    }
}

impl Peripheral for Uart {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(match offset {
            SR => {
                if self.sr & SR_ERRORS != 0 {
                    self.error_read_armed = true;
                }
                self.sr
            }
            DR => self.read_dr(),
            _ => self.peek(offset),
        })
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        match offset {
            SR => {
                // TC and RXNE are rc_w0; everything else is read-only.
                self.sr &= value | !(SR_TC | SR_RXNE);
            }
            DR => self.write_dr(value),
            BRR => self.brr = value & 0xFFFF,
            CR1 => {
                self.cr1 = value & 0x3FFF;
                if self.cr1 & CR1_UE == 0 {
                    self.tdr = None;
                    self.shifter = None;
                    self.sr |= SR_TXE;
                }
            }
            CR2 => self.cr2 = value & 0x7FFF,
            CR3 => self.cr3 = value & 0x0FFF,
            _ => {}
        }
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        match offset {
            SR => self.sr,
            DR => self.rdr as u32,
            BRR => self.brr,
            CR1 => self.cr1,
            CR2 => self.cr2,
            CR3 => self.cr3,
            _ => 0,
        }
    }

    fn tick(&mut self) -> PeripheralTickResult {
        self.shift_out();
        PeripheralTickResult {
            irq: self.irq_line(),
            ..Default::default()
        }
    }

    super::impl_any!();
}
