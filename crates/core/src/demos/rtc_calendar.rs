// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RTC calendar: pick the RTC clock, program Monday 31 March 2015
//! 11:59:55 PM once per backup-domain lifetime, then keep rendering the
//! running time and date.

use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::clock::system_clock_config;
use super::fault::{blink, blink_forever, Fault};
use super::led;
use crate::board::{BoardContext, CalendarDisplay, Firmware, Phase};
use crate::calendar::{format_date, format_time, month, HourFormat, Meridiem, Weekday};
use crate::ll;
use crate::mcu::Mcu;
use crate::peripherals::rcc::{self, RtcClockSource};
use crate::wait::{timeouts, BoundedWait, WaitTimeout};
use crate::{SimResult, SimulationError};

/// DR1 content once the calendar has been programmed.
pub const BKP_DATE_TIME_UPDATED: u32 = 0x32F2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    #[default]
    Lse,
    Lsi,
}

impl ClockSource {
    /// (asynchronous, synchronous) prescalers giving a 1 Hz calendar.
    pub fn prescalers(self) -> (u32, u32) {
        match self {
            ClockSource::Lse => (0x7F, 0x00FF),
            ClockSource::Lsi => (0x7F, 0x122),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RtcDemoConfig {
    pub clock_source: ClockSource,
    /// Bound the oscillator and RTC flag waits.
    pub use_timeout: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RtcError {
    #[error(transparent)]
    Timeout(#[from] WaitTimeout),
    #[error(transparent)]
    Bus(#[from] SimulationError),
}

impl From<RtcError> for Fault {
    fn from(e: RtcError) -> Self {
        match e {
            RtcError::Timeout(t) => t.into(),
            RtcError::Bus(e) => e.into(),
        }
    }
}

/// RTC setup steps shared by the calendar and the alarm demos.
pub struct RtcDemo {
    pub(super) ctx: BoardContext,
    pub(super) config: RtcDemoConfig,
}

impl RtcDemo {
    pub fn new(ctx: BoardContext, config: RtcDemoConfig) -> Self {
        Self { ctx, config }
    }

    pub(super) fn wait(&self, what: &'static str, limit: u32) -> BoundedWait {
        BoundedWait::checked(self.ctx.clock(), what, self.config.use_timeout, limit)
    }

    /// Wraps an LL flag reader as a wait predicate.
    pub(super) fn flag<E: From<SimulationError>>(
        &self,
        read: fn(&mut Mcu) -> SimResult<bool>,
    ) -> impl FnMut() -> Result<bool, E> + '_ {
        move || Ok(self.ctx.with_mcu(read)?)
    }

    /// Backup-domain access, then LSE or LSI as RTCCLK. The backup domain
    /// is only reset when the source actually changes.
    pub async fn configure_rtc_clock(&self) -> Result<(), Fault> {
        self.ctx.with_mcu(|mcu| {
            ll::rcc::apb1_enable_clock(mcu, rcc::APB1ENR_PWREN)?;
            ll::pwr::enable_backup_access(mcu)
        })?;

        match self.config.clock_source {
            ClockSource::Lse => {
                if self.ctx.with_mcu(ll::rcc::lse_is_ready)? {
                    return Ok(());
                }
                self.ctx.with_mcu(|mcu| {
                    ll::rcc::force_backup_domain_reset(mcu)?;
                    ll::rcc::release_backup_domain_reset(mcu)?;
                    ll::rcc::lse_enable(mcu)
                })?;
                let polls = self
                    .wait("LSERDY", timeouts::LSE)
                    .try_until(self.flag::<Fault>(ll::rcc::lse_is_ready))
                    .await?;
                tracing::debug!("{}: LSE ready after {} ms", self.ctx.name(), polls);
                self.ctx
                    .with_mcu(|mcu| ll::rcc::set_rtc_clock_source(mcu, RtcClockSource::Lse))?;
            }
            ClockSource::Lsi => {
                self.ctx.with_mcu(ll::rcc::lsi_enable)?;
                self.wait("LSIRDY", timeouts::LSI)
                    .try_until(self.flag::<Fault>(ll::rcc::lsi_is_ready))
                    .await?;
                if self.ctx.with_mcu(ll::rcc::rtc_clock_source)? != RtcClockSource::Lsi {
                    self.ctx.with_mcu(|mcu| {
                        ll::rcc::force_backup_domain_reset(mcu)?;
                        ll::rcc::release_backup_domain_reset(mcu)?;
                        ll::rcc::set_rtc_clock_source(mcu, RtcClockSource::Lsi)
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Requests init mode and waits for INITF.
    pub async fn enter_init_mode(&self) -> Result<u32, RtcError> {
        self.ctx.with_mcu(ll::rtc::enable_init_mode)?;
        self.wait("RTC INITF", timeouts::RTC)
            .try_until(self.flag(ll::rtc::is_active_flag_init))
            .await
    }

    /// Leaves init mode and waits for the shadow registers to resync.
    pub async fn exit_init_mode(&self) -> Result<u32, RtcError> {
        self.ctx.with_mcu(ll::rtc::disable_init_mode)?;
        self.wait_for_synchro().await
    }

    pub async fn wait_for_synchro(&self) -> Result<u32, RtcError> {
        self.ctx.with_mcu(ll::rtc::clear_flag_rs)?;
        self.wait("RTC RSF", timeouts::RTC)
            .try_until(self.flag(ll::rtc::is_active_flag_rs))
            .await
    }

    /// RTC on, 12-hour format, prescalers for the selected clock.
    pub async fn configure_rtc(&self) -> Result<(), Fault> {
        self.ctx.with_mcu(|mcu| {
            ll::rcc::enable_rtc(mcu)?;
            ll::rtc::disable_write_protection(mcu)
        })?;
        self.enter_init_mode().await?;

        let (prediv_a, prediv_s) = self.config.clock_source.prescalers();
        self.ctx.with_mcu(|mcu| {
            ll::rtc::set_hour_format(mcu, HourFormat::AmPm)?;
            ll::rtc::set_asynch_prescaler(mcu, prediv_a)?;
            ll::rtc::set_synch_prescaler(mcu, prediv_s)
        })?;

        self.exit_init_mode().await?;
        self.ctx.with_mcu(ll::rtc::enable_write_protection)?;
        Ok(())
    }

    /// Monday 31 March 2015, 11:59:55 PM.
    pub(super) fn write_calendar(mcu: &mut Mcu) -> SimResult<()> {
        ll::rtc::date_config(mcu, Weekday::Monday, 0x31, month::MARCH, 0x15)?;
        ll::rtc::time_config(mcu, Meridiem::Pm, 0x11, 0x59, 0x55)
    }

    /// Programs the date and time, then records it in DR1.
    pub async fn configure_calendar(&self) -> Result<(), Fault> {
        self.ctx.with_mcu(ll::rtc::disable_write_protection)?;
        self.enter_init_mode().await?;
        self.ctx.with_mcu(Self::write_calendar)?;
        self.exit_init_mode().await?;
        self.ctx.with_mcu(|mcu| {
            ll::rtc::enable_write_protection(mcu)?;
            ll::rtc::bak_set_register(mcu, ll::rtc::BKP_DR1, BKP_DATE_TIME_UPDATED)
        })?;
        self.ctx.update_status(|s| s.calendar_configured = true);
        tracing::info!("{}: calendar programmed", self.ctx.name());
        Ok(())
    }

    /// Current time as `hh:mm:ss` and date as `mm-dd-yyyy`.
    pub fn show_calendar(&self) -> SimResult<CalendarDisplay> {
        self.ctx.with_mcu(|mcu| {
            let format = ll::rtc::hour_format(mcu)?;
            let time = ll::rtc::time_get(mcu)?;
            let date = ll::rtc::date_get(mcu)?;
            Ok(CalendarDisplay {
                time: format_time(&time, format),
                date: format_date(&date),
            })
        })
    }

    async fn setup(&self) -> Result<(), Fault> {
        self.ctx.set_phase(Phase::ClockConfig);
        system_clock_config(&self.ctx).await?;
        self.ctx.with_mcu(led::init)?;
        self.configure_rtc_clock().await?;

        let marker = self
            .ctx
            .with_mcu(|mcu| ll::rtc::bak_get_register(mcu, ll::rtc::BKP_DR1))?;
        if marker != BKP_DATE_TIME_UPDATED {
            self.ctx.set_phase(Phase::CalendarConfig);
            self.configure_rtc().await?;
            self.configure_calendar().await?;
        } else {
            tracing::info!("{}: calendar already configured", self.ctx.name());
        }
        self.ctx.with_mcu(led::on)?;
        Ok(())
    }

    /// Refreshes the displayed calendar once per tick, forever.
    pub(super) async fn show_forever(&self) -> Result<(), Fault> {
        self.ctx.set_phase(Phase::Running);
        loop {
            let shown = self.show_calendar()?;
            self.ctx.update_status(|s| {
                if s.calendar.as_ref() != Some(&shown) {
                    tracing::trace!("{}: {} {}", self.ctx.name(), shown.date, shown.time);
                }
                s.calendar = Some(shown);
            });
            self.ctx.clock().yield_now().await;
        }
    }

    pub async fn run(self) {
        let outcome = match self.setup().await {
            Ok(()) => self.show_forever().await,
            Err(fault) => Err(fault),
        };
        if let Err(fault) = outcome {
            blink_forever(&self.ctx, fault, blink::ERROR).await;
        }
    }
}

pub fn firmware(config: RtcDemoConfig) -> Firmware {
    Arc::new(move |ctx: BoardContext| RtcDemo::new(ctx, config).run().boxed())
}
