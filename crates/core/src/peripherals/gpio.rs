// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::DigitalLevel;
use crate::{Peripheral, SimResult};

pub const MODER: u64 = 0x00;
pub const OTYPER: u64 = 0x04;
pub const OSPEEDR: u64 = 0x08;
pub const PUPDR: u64 = 0x0C;
pub const IDR: u64 = 0x10;
pub const ODR: u64 = 0x14;
pub const BSRR: u64 = 0x18;
pub const LCKR: u64 = 0x1C;
pub const AFRL: u64 = 0x20;
pub const AFRH: u64 = 0x24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input = 0b00,
    Output = 0b01,
    Alternate = 0b10,
    Analog = 0b11,
}

impl PinMode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Self::Output,
            0b10 => Self::Alternate,
            0b11 => Self::Analog,
            _ => Self::Input,
        }
    }
}

/// STM32L1 GPIO port.
///
/// External drivers (the user button) set pin levels through
/// [`GpioPort::drive_input`]; output pins are observed with
/// [`GpioPort::pin_level`].
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioPort {
    moder: u32,
    otyper: u32,
    ospeedr: u32,
    pupdr: u32,
    odr: u32,
    lckr: u32,
    afrl: u32,
    afrh: u32,
    /// Levels driven onto the pins from outside the chip.
    external: u32,
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, pin: u8) -> PinMode {
        PinMode::from_bits(self.moder >> (pin * 2))
    }

    pub fn drive_input(&mut self, pin: u8, level: DigitalLevel) {
        if pin >= 16 {
            return;
        }
        match level {
            DigitalLevel::High => self.external |= 1 << pin,
            DigitalLevel::Low => self.external &= !(1 << pin),
        }
    }

    fn idr(&self) -> u32 {
        let mut idr = 0;
        for pin in 0..16u8 {
            let bit = 1 << pin;
            let high = match self.mode(pin) {
                PinMode::Output => self.odr & bit != 0,
                _ => self.external & bit != 0,
            };
            if high {
                idr |= bit;
            }
        }
        idr
    }

    pub fn pin_level(&self, pin: u8) -> DigitalLevel {
        DigitalLevel::from(pin < 16 && self.idr() & (1 << pin) != 0)
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            MODER => self.moder,
            OTYPER => self.otyper,
            OSPEEDR => self.ospeedr,
            PUPDR => self.pupdr,
            IDR => self.idr(),
            ODR => self.odr,
            LCKR => self.lckr,
            AFRL => self.afrl,
            AFRH => self.afrh,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            MODER => self.moder = value,
            OTYPER => self.otyper = value & 0xFFFF,
            OSPEEDR => self.ospeedr = value,
            PUPDR => self.pupdr = value,
            ODR => self.odr = value & 0xFFFF,
            BSRR => {
                // Set has priority over reset for the same pin.
                let set = value & 0xFFFF;
                let reset = (value >> 16) & 0xFFFF;
                self.odr &= !reset;
                self.odr |= set;
            }
            LCKR => self.lckr = value,
            AFRL => self.afrl = value,
            AFRH => self.afrh = value,
            _ => {}
        }
    }
}

impl Peripheral for GpioPort {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        self.read_reg(offset)
    }

    super::impl_any!();
}
