// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::fault::Fault;
use crate::board::BoardContext;
use crate::ll;
use crate::peripherals::rcc;
use crate::wait::BoundedWait;

/// CFGR.PLLMUL encoding of x6.
pub const PLL_MUL_6: u32 = 0b0010;
/// CFGR.PLLDIV encoding of /3.
pub const PLL_DIV_3: u32 = 0b10;

/// 32 MHz system clock: HSI (16 MHz) x6 /3 through the PLL, regulator in
/// range 1. None of the ready flags has a timeout.
pub async fn system_clock_config(ctx: &BoardContext) -> Result<(), Fault> {
    let clock = ctx.clock();

    ctx.with_mcu(|mcu| {
        ll::rcc::apb1_enable_clock(mcu, rcc::APB1ENR_PWREN)?;
        ll::pwr::set_regul_voltage_scaling(mcu, ll::pwr::REGU_VOLTAGE_SCALE1)
    })?;
    BoundedWait::unbounded(clock, "VOSF clear")
        .try_until(|| Ok::<_, Fault>(!ctx.with_mcu(ll::pwr::is_active_flag_vosf)?))
        .await?;

    if !ctx.with_mcu(ll::rcc::hsi_is_ready)? {
        ctx.with_mcu(ll::rcc::hsi_enable)?;
        BoundedWait::unbounded(clock, "HSIRDY")
            .try_until(|| Ok::<_, Fault>(ctx.with_mcu(ll::rcc::hsi_is_ready)?))
            .await?;
    }

    ctx.with_mcu(|mcu| {
        ll::rcc::pll_config_sys_hsi(mcu, PLL_MUL_6, PLL_DIV_3)?;
        ll::rcc::pll_enable(mcu)
    })?;
    BoundedWait::unbounded(clock, "PLLRDY")
        .try_until(|| Ok::<_, Fault>(ctx.with_mcu(ll::rcc::pll_is_ready)?))
        .await?;

    ctx.with_mcu(|mcu| ll::rcc::set_sys_clk_source(mcu, rcc::CFGR_SW_PLL))?;
    BoundedWait::unbounded(clock, "SWS = PLL")
        .try_until(|| {
            Ok::<_, Fault>(ctx.with_mcu(ll::rcc::sys_clk_source_status)? == rcc::CFGR_SW_PLL)
        })
        .await?;

    tracing::debug!("{}: system clock at 32 MHz", ctx.name());
    Ok(())
}
