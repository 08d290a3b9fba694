// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mcu::{Mcu, RCC_BASE};
use crate::peripherals::rcc::*;
use crate::SimResult;

pub fn ahb_enable_clock(mcu: &mut Mcu, periphs: u32) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + AHBENR, periphs)
}

pub fn apb1_enable_clock(mcu: &mut Mcu, periphs: u32) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + APB1ENR, periphs)
}

pub fn apb1_disable_clock(mcu: &mut Mcu, periphs: u32) -> SimResult<()> {
    mcu.clear_bits(RCC_BASE + APB1ENR, periphs)
}

pub fn apb2_enable_clock(mcu: &mut Mcu, periphs: u32) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + APB2ENR, periphs)
}

pub fn hsi_enable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CR, CR_HSION)
}

pub fn hsi_is_ready(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RCC_BASE + CR, CR_HSIRDY)
}

pub fn pll_enable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CR, CR_PLLON)
}

pub fn pll_is_ready(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RCC_BASE + CR, CR_PLLRDY)
}

/// PLL source HSI, multiplier and divider as CFGR field values.
pub fn pll_config_sys_hsi(mcu: &mut Mcu, mul: u32, div: u32) -> SimResult<()> {
    const PLLSRC: u32 = 1 << 16;
    const PLLMUL_MASK: u32 = 0xF << 18;
    const PLLDIV_MASK: u32 = 0b11 << 22;
    mcu.modify(RCC_BASE + CFGR, |v| {
        (v & !(PLLSRC | PLLMUL_MASK | PLLDIV_MASK)) | ((mul << 18) & PLLMUL_MASK) | ((div << 22) & PLLDIV_MASK)
    })
}

pub fn set_sys_clk_source(mcu: &mut Mcu, sw: u32) -> SimResult<()> {
    mcu.modify(RCC_BASE + CFGR, |v| (v & !CFGR_SW_MASK) | (sw & CFGR_SW_MASK))
}

/// SWS field shifted down to SW encoding.
pub fn sys_clk_source_status(mcu: &mut Mcu) -> SimResult<u32> {
    Ok((mcu.read(RCC_BASE + CFGR)? & CFGR_SWS_MASK) >> 2)
}

pub fn lse_enable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CSR, CSR_LSEON)
}

pub fn lse_is_ready(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RCC_BASE + CSR, CSR_LSERDY)
}

pub fn lsi_enable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CSR, CSR_LSION)
}

pub fn lsi_is_ready(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RCC_BASE + CSR, CSR_LSIRDY)
}

pub fn force_backup_domain_reset(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CSR, CSR_RTCRST)
}

pub fn release_backup_domain_reset(mcu: &mut Mcu) -> SimResult<()> {
    mcu.clear_bits(RCC_BASE + CSR, CSR_RTCRST)
}

pub fn set_rtc_clock_source(mcu: &mut Mcu, source: RtcClockSource) -> SimResult<()> {
    mcu.modify(RCC_BASE + CSR, |v| {
        (v & !CSR_RTCSEL_MASK) | (source.bits() << 16)
    })
}

pub fn rtc_clock_source(mcu: &mut Mcu) -> SimResult<RtcClockSource> {
    Ok(RtcClockSource::from_bits(mcu.read(RCC_BASE + CSR)? >> 16))
}

pub fn enable_rtc(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RCC_BASE + CSR, CSR_RTCEN)
}
