// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mcu::{Mcu, EXTI_BASE};
use crate::peripherals::exti::{FTSR, IMR, PR, RTSR};
use crate::SimResult;

pub fn enable_it(mcu: &mut Mcu, line: u8) -> SimResult<()> {
    mcu.set_bits(EXTI_BASE + IMR, 1 << line)
}

pub fn enable_rising_trig(mcu: &mut Mcu, line: u8) -> SimResult<()> {
    mcu.set_bits(EXTI_BASE + RTSR, 1 << line)
}

pub fn enable_falling_trig(mcu: &mut Mcu, line: u8) -> SimResult<()> {
    mcu.set_bits(EXTI_BASE + FTSR, 1 << line)
}

pub fn is_active_flag(mcu: &mut Mcu, line: u8) -> SimResult<bool> {
    mcu.is_set(EXTI_BASE + PR, 1 << line)
}

/// PR is write-one-to-clear.
pub fn clear_flag(mcu: &mut Mcu, line: u8) -> SimResult<()> {
    mcu.write(EXTI_BASE + PR, 1 << line)
}
