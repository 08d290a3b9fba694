// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mcu::Mcu;
use crate::peripherals::gpio::{PinMode, AFRH, AFRL, BSRR, IDR, MODER, ODR, PUPDR};
use crate::SimResult;

pub const PULL_NO: u32 = 0b00;
pub const PULL_UP: u32 = 0b01;

pub fn set_pin_mode(mcu: &mut Mcu, port: u64, pin: u8, mode: PinMode) -> SimResult<()> {
    let shift = pin as u32 * 2;
    mcu.modify(port + MODER, |v| (v & !(0b11 << shift)) | ((mode as u32) << shift))
}

pub fn set_pin_pull(mcu: &mut Mcu, port: u64, pin: u8, pull: u32) -> SimResult<()> {
    let shift = pin as u32 * 2;
    mcu.modify(port + PUPDR, |v| (v & !(0b11 << shift)) | ((pull & 0b11) << shift))
}

pub fn set_af(mcu: &mut Mcu, port: u64, pin: u8, af: u32) -> SimResult<()> {
    let (reg, shift) = if pin < 8 {
        (AFRL, pin as u32 * 4)
    } else {
        (AFRH, (pin as u32 - 8) * 4)
    };
    mcu.modify(port + reg, |v| (v & !(0xF << shift)) | ((af & 0xF) << shift))
}

pub fn set_output_pin(mcu: &mut Mcu, port: u64, pin: u8) -> SimResult<()> {
    mcu.write(port + BSRR, 1 << pin)
}

pub fn reset_output_pin(mcu: &mut Mcu, port: u64, pin: u8) -> SimResult<()> {
    mcu.write(port + BSRR, 1 << (pin as u32 + 16))
}

pub fn toggle_pin(mcu: &mut Mcu, port: u64, pin: u8) -> SimResult<()> {
    mcu.modify(port + ODR, |v| v ^ (1 << pin))
}

pub fn is_input_pin_set(mcu: &mut Mcu, port: u64, pin: u8) -> SimResult<bool> {
    Ok(mcu.read(port + IDR)? & (1 << pin) != 0)
}
