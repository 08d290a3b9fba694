// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mcu::{Mcu, PWR_BASE};
use crate::peripherals::pwr::{CR, CR_DBP, CR_VOS_MASK, CSR, CSR_VOSF};
use crate::SimResult;

/// Regulator range 1 (1.8 V), needed for 32 MHz.
pub const REGU_VOLTAGE_SCALE1: u32 = 0b01 << 11;

pub fn enable_backup_access(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(PWR_BASE + CR, CR_DBP)
}

pub fn disable_backup_access(mcu: &mut Mcu) -> SimResult<()> {
    mcu.clear_bits(PWR_BASE + CR, CR_DBP)
}

pub fn set_regul_voltage_scaling(mcu: &mut Mcu, scale: u32) -> SimResult<()> {
    mcu.modify(PWR_BASE + CR, |v| (v & !CR_VOS_MASK) | (scale & CR_VOS_MASK))
}

pub fn is_active_flag_vosf(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(PWR_BASE + CSR, CSR_VOSF)
}
