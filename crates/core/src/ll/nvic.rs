// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mcu::{Mcu, NVIC_BASE};
use crate::peripherals::nvic::{ICER, ICPR, ISER};
use crate::SimResult;

fn bank(irq: u32) -> (u64, u32) {
    ((irq / 32) as u64 * 4, 1 << (irq % 32))
}

pub fn enable_irq(mcu: &mut Mcu, irq: u32) -> SimResult<()> {
    let (offset, bit) = bank(irq);
    mcu.write(NVIC_BASE + ISER + offset, bit)
}

pub fn disable_irq(mcu: &mut Mcu, irq: u32) -> SimResult<()> {
    let (offset, bit) = bank(irq);
    mcu.write(NVIC_BASE + ICER + offset, bit)
}

pub fn clear_pending_irq(mcu: &mut Mcu, irq: u32) -> SimResult<()> {
    let (offset, bit) = bank(irq);
    mcu.write(NVIC_BASE + ICPR + offset, bit)
}
