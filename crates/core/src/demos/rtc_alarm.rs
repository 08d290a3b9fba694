// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RTC alarm A: calendar set to 11:59:55 PM, alarm at 12:00:25 AM on any
//! day. The alarm interrupt turns the LED on.

use std::sync::Arc;

use futures::FutureExt;

use super::clock::system_clock_config;
use super::fault::{blink, blink_forever, Fault};
use super::led;
use super::rtc_calendar::{RtcDemo, RtcDemoConfig};
use crate::board::{BoardContext, Firmware, Phase};
use crate::calendar::Meridiem;
use crate::ll;
use crate::mcu::{Mcu, RTC_ALARM_IRQ};
use crate::peripherals::exti::LINE_RTC_ALARM;
use crate::peripherals::rtc::ALRMAR_MSK4;
use crate::wait::timeouts;
use crate::SimResult;

/// RTC_Alarm vector: acknowledge alarm A and its EXTI line.
fn alarm_irq_handler(mcu: &mut Mcu, on_alarm: &dyn Fn(&mut Mcu) -> SimResult<()>) -> SimResult<()> {
    if ll::rtc::is_active_flag_alra(mcu)? {
        ll::rtc::clear_flag_alra(mcu)?;
        on_alarm(mcu)?;
    }
    ll::exti::clear_flag(mcu, LINE_RTC_ALARM)
}

pub struct RtcAlarmDemo {
    rtc: RtcDemo,
}

impl RtcAlarmDemo {
    pub fn new(ctx: BoardContext, config: RtcDemoConfig) -> Self {
        Self {
            rtc: RtcDemo::new(ctx, config),
        }
    }

    fn ctx(&self) -> &BoardContext {
        &self.rtc.ctx
    }

    fn install_vectors(&self) {
        let ctx = self.ctx().clone();
        self.ctx().isr().register(RTC_ALARM_IRQ, move |mcu| {
            alarm_irq_handler(mcu, &|mcu| {
                tracing::info!("{}: alarm A", ctx.name());
                ctx.update_status(|s| s.alarm_fired = true);
                led::on(mcu)
            })
        });
    }

    /// Calendar and alarm A programmed inside one init-mode window.
    pub async fn configure_calendar_and_alarm(&self) -> Result<(), Fault> {
        let ctx = self.ctx();
        ctx.with_mcu(ll::rtc::disable_write_protection)?;
        self.rtc.enter_init_mode().await?;

        ctx.with_mcu(|mcu| {
            RtcDemo::write_calendar(mcu)?;
            ll::rtc::alma_disable(mcu)
        })?;
        self.rtc
            .wait("RTC ALRAWF", timeouts::RTC)
            .try_until(self.rtc.flag::<Fault>(ll::rtc::is_active_flag_alraw))
            .await?;

        ctx.with_mcu(|mcu| {
            ll::rtc::alma_config(mcu, Meridiem::Am, 0x12, 0x00, 0x25, ALRMAR_MSK4)?;
            ll::rtc::alma_enable(mcu)?;
            ll::rtc::clear_flag_alra(mcu)?;
            ll::rtc::enable_it_alra(mcu)?;
            ll::exti::enable_it(mcu, LINE_RTC_ALARM)?;
            ll::exti::enable_rising_trig(mcu, LINE_RTC_ALARM)?;
            ll::nvic::enable_irq(mcu, RTC_ALARM_IRQ)
        })?;

        self.rtc.exit_init_mode().await?;
        ctx.with_mcu(ll::rtc::enable_write_protection)?;
        ctx.update_status(|s| s.calendar_configured = true);
        tracing::info!("{}: alarm A set for 12:00:25 AM", ctx.name());
        Ok(())
    }

    async fn setup(&self) -> Result<(), Fault> {
        let ctx = self.ctx();
        self.install_vectors();
        ctx.set_phase(Phase::ClockConfig);
        system_clock_config(ctx).await?;
        ctx.with_mcu(led::init)?;
        self.rtc.configure_rtc_clock().await?;
        ctx.set_phase(Phase::CalendarConfig);
        self.rtc.configure_rtc().await?;
        self.configure_calendar_and_alarm().await
    }

    pub async fn run(self) {
        let outcome = match self.setup().await {
            Ok(()) => self.rtc.show_forever().await,
            Err(fault) => Err(fault),
        };
        if let Err(fault) = outcome {
            blink_forever(self.ctx(), fault, blink::ERROR).await;
        }
    }
}

pub fn firmware(config: RtcDemoConfig) -> Firmware {
    Arc::new(move |ctx: BoardContext| RtcAlarmDemo::new(ctx, config).run().boxed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcu::{McuConfig, EXTI_BASE};
    use crate::peripherals::exti::SWIER;
    use std::cell::Cell;

    #[test]
    fn test_handler_without_alarm_flag_only_clears_exti() {
        let mut mcu = Mcu::cold_start(McuConfig::default());
        ll::exti::enable_it(&mut mcu, LINE_RTC_ALARM).unwrap();
        mcu.write(EXTI_BASE + SWIER, 1 << LINE_RTC_ALARM).unwrap();
        assert!(ll::exti::is_active_flag(&mut mcu, LINE_RTC_ALARM).unwrap());

        let called = Cell::new(false);
        alarm_irq_handler(&mut mcu, &|_| {
            called.set(true);
            Ok(())
        })
        .unwrap();

        assert!(!called.get());
        assert!(!ll::exti::is_active_flag(&mut mcu, LINE_RTC_ALARM).unwrap());
    }
}
