// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! LD2 (PA5) status LED.

use crate::ll;
use crate::mcu::{Mcu, GPIOA_BASE, LED_PIN};
use crate::peripherals::gpio::PinMode;
use crate::peripherals::rcc;
use crate::SimResult;

/// Push-pull output, no pull, initially off.
pub fn init(mcu: &mut Mcu) -> SimResult<()> {
    ll::rcc::ahb_enable_clock(mcu, rcc::AHBENR_GPIOAEN)?;
    ll::gpio::set_pin_mode(mcu, GPIOA_BASE, LED_PIN, PinMode::Output)?;
    ll::gpio::set_pin_pull(mcu, GPIOA_BASE, LED_PIN, ll::gpio::PULL_NO)?;
    off(mcu)
}

pub fn on(mcu: &mut Mcu) -> SimResult<()> {
    ll::gpio::set_output_pin(mcu, GPIOA_BASE, LED_PIN)
}

pub fn off(mcu: &mut Mcu) -> SimResult<()> {
    ll::gpio::reset_output_pin(mcu, GPIOA_BASE, LED_PIN)
}

pub fn toggle(mcu: &mut Mcu) -> SimResult<()> {
    ll::gpio::toggle_pin(mcu, GPIOA_BASE, LED_PIN)
}
