// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::backup::BackupDomain;
use crate::calendar::{advance_second, DateBcd, HourFormat, TimeBcd};
use crate::{Peripheral, PeripheralTickResult, SimResult};
use std::sync::Arc;

pub const TR: u64 = 0x00;
pub const DR: u64 = 0x04;
pub const CR: u64 = 0x08;
pub const ISR: u64 = 0x0C;
pub const PRER: u64 = 0x10;
pub const ALRMAR: u64 = 0x1C;
pub const WPR: u64 = 0x24;
pub const BKP0R: u64 = 0x50;
pub const BKP_COUNT: usize = 32;

pub const CR_FMT: u32 = 1 << 6;
pub const CR_ALRAE: u32 = 1 << 8;
pub const CR_ALRAIE: u32 = 1 << 12;

pub const ISR_ALRAWF: u32 = 1 << 0;
pub const ISR_INITS: u32 = 1 << 4;
pub const ISR_RSF: u32 = 1 << 5;
pub const ISR_INITF: u32 = 1 << 6;
pub const ISR_INIT: u32 = 1 << 7;
pub const ISR_ALRAF: u32 = 1 << 8;

pub const ALRMAR_MSK1: u32 = 1 << 7;
pub const ALRMAR_MSK2: u32 = 1 << 15;
pub const ALRMAR_MSK3: u32 = 1 << 23;
pub const ALRMAR_WDSEL: u32 = 1 << 30;
pub const ALRMAR_MSK4: u32 = 1 << 31;

pub const WPR_KEY1: u32 = 0xCA;
pub const WPR_KEY2: u32 = 0x53;

/// Flags cleared by writing zero.
const ISR_RC_W0: u32 = ISR_RSF | ISR_ALRAF;

const PRER_RESET: u32 = 0x007F_00FF;
const ISR_RESET: u32 = 0x0000_0007;
const DR_RESET: u32 = 0x0000_2101;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
enum WriteProtection {
    #[default]
    Locked,
    FirstKey,
    Unlocked,
}

/// STM32L1 real-time clock with calendar, alarm A, write protection and the
/// backup data registers.
///
/// The model lives in the backup domain: it is carried over a system reset
/// and only cleared by an RCC backup-domain reset.
#[derive(Debug, serde::Serialize)]
pub struct Rtc {
    tr: u32,
    dr: u32,
    cr: u32,
    isr: u32,
    prer: u32,
    alrmar: u32,
    bkp: [u32; BKP_COUNT],
    protection: WriteProtection,
    /// RTCCLK cycles, scaled by 1000, accumulated towards the next second.
    prescaler_acc: u64,
    #[serde(skip)]
    domain: Arc<BackupDomain>,
    seen_generation: u32,
}

impl Rtc {
    pub fn new(domain: Arc<BackupDomain>) -> Self {
        let seen_generation = domain.generation();
        Self {
            tr: 0,
            dr: DR_RESET,
            cr: 0,
            isr: ISR_RESET,
            prer: PRER_RESET,
            alrmar: 0,
            bkp: [0; BKP_COUNT],
            protection: WriteProtection::Locked,
            prescaler_acc: 0,
            domain,
            seen_generation,
        }
    }

    fn sync_domain(&mut self) {
        let generation = self.domain.generation();
        if generation != self.seen_generation {
            tracing::debug!("RTC: backup domain reset, calendar and backup registers cleared");
            *self = Self::new(self.domain.clone());
        }
    }

    pub fn hour_format(&self) -> HourFormat {
        if self.cr & CR_FMT != 0 {
            HourFormat::AmPm
        } else {
            HourFormat::TwentyFour
        }
    }

    pub fn time(&self) -> TimeBcd {
        TimeBcd::from_tr(self.tr)
    }

    pub fn date(&self) -> DateBcd {
        DateBcd::from_dr(self.dr)
    }

    pub fn backup_register(&self, index: usize) -> Option<u32> {
        self.bkp.get(index).copied()
    }

    /// Alarm A interrupt request, routed to EXTI line 17.
    pub fn alarm_output(&self) -> bool {
        self.isr & ISR_ALRAF != 0 && self.cr & CR_ALRAIE != 0
    }

    fn in_init(&self) -> bool {
        self.isr & ISR_INITF != 0
    }

    fn unlocked(&self) -> bool {
        self.protection == WriteProtection::Unlocked
    }

    /// Seconds period in RTCCLK cycles, scaled by 1000 to match the 1 ms tick.
    fn second_period(&self) -> u64 {
        let prediv_a = ((self.prer >> 16) & 0x7F) as u64;
        let prediv_s = (self.prer & 0x7FFF) as u64;
        (prediv_a + 1) * (prediv_s + 1) * 1000
    }

    fn alarm_matches(&self) -> bool {
        let a = self.alrmar;
        let tr = self.tr;
        if a & ALRMAR_MSK1 == 0 && (a & 0x7F) != (tr & 0x7F) {
            return false;
        }
        if a & ALRMAR_MSK2 == 0 && ((a >> 8) & 0x7F) != ((tr >> 8) & 0x7F) {
            return false;
        }
        // Hours compare together with the PM bit.
        if a & ALRMAR_MSK3 == 0 && ((a >> 16) & 0x7F) != ((tr >> 16) & 0x7F) {
            return false;
        }
        if a & ALRMAR_MSK4 == 0 {
            let du = (a >> 24) & 0x3F;
            if a & ALRMAR_WDSEL != 0 {
                if du & 0x0F != (self.dr >> 13) & 0x7 {
                    return false;
                }
            } else if du != self.dr & 0x3F {
                return false;
            }
        }
        true
    }

    fn write_wpr(&mut self, value: u32) {
        self.protection = match (self.protection, value & 0xFF) {
            (WriteProtection::Locked, WPR_KEY1) => WriteProtection::FirstKey,
            (WriteProtection::FirstKey, WPR_KEY2) => WriteProtection::Unlocked,
            _ => WriteProtection::Locked,
        };
        tracing::trace!("RTC write protection: {:?}", self.protection);
    }

    fn write_isr(&mut self, value: u32) {
        self.isr &= value | !ISR_RC_W0;
        if !self.unlocked() {
            if (value ^ self.isr) & ISR_INIT != 0 {
                tracing::warn!("RTC ISR.INIT written while write protected, ignored");
            }
            return;
        }
        let was_init = self.isr & ISR_INIT != 0;
        if value & ISR_INIT != 0 {
            self.isr |= ISR_INIT;
        } else {
            self.isr &= !(ISR_INIT | ISR_INITF);
            if was_init {
                // Leaving init mode restarts the prescalers and resynchronizes
                // the shadow registers.
                self.isr &= !ISR_RSF;
                self.prescaler_acc = 0;
            }
        }
    }

    fn write_cr(&mut self, value: u32) {
        if (value ^ self.cr) & CR_FMT != 0 && !self.in_init() {
            tracing::warn!("RTC CR.FMT changed outside init mode, ignored");
            let fmt = self.cr & CR_FMT;
            self.cr = (value & !CR_FMT) | fmt;
        } else {
            self.cr = value;
        }
        self.cr &= 0x00FF_FF7F;
        if self.cr & CR_ALRAE != 0 {
            self.isr &= !ISR_ALRAWF;
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        if !self.domain.write_access() {
            tracing::warn!(
                "RTC [{:#04x}] written without backup-domain access, ignored",
                offset
            );
            return;
        }
        if offset == WPR {
            self.write_wpr(value);
            return;
        }
        if (BKP0R..BKP0R + 4 * BKP_COUNT as u64).contains(&offset) {
            self.bkp[((offset - BKP0R) / 4) as usize] = value;
            return;
        }
        if offset == ISR {
            self.write_isr(value);
            return;
        }
        if !self.unlocked() {
            tracing::warn!("RTC [{:#04x}] write protected, ignored", offset);
            return;
        }
        match offset {
            TR | DR | PRER if !self.in_init() => {
                tracing::warn!("RTC [{:#04x}] written outside init mode, ignored", offset);
            }
            TR => self.tr = value & 0x007F_7F7F,
            DR => {
                self.dr = value & 0x00FF_FF3F;
                if self.dr >> 16 != 0 {
                    self.isr |= ISR_INITS;
                }
            }
            PRER => {
                self.prer = value & 0x007F_7FFF;
                self.prescaler_acc = 0;
            }
            CR => self.write_cr(value),
            ALRMAR => {
                if self.cr & CR_ALRAE != 0 || self.isr & ISR_ALRAWF == 0 {
                    tracing::warn!("RTC ALRMAR written while alarm A enabled, ignored");
                } else {
                    self.alrmar = value;
                }
            }
            _ => {}
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            TR => self.tr,
            DR => self.dr,
            CR => self.cr,
            ISR => self.isr,
            PRER => self.prer,
            ALRMAR => self.alrmar,
            o if (BKP0R..BKP0R + 4 * BKP_COUNT as u64).contains(&o) => {
                self.bkp[((o - BKP0R) / 4) as usize]
            }
            _ => 0,
        }
    }
}

impl Peripheral for Rtc {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        self.sync_domain();
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.sync_domain();
        tracing::trace!("RTC [{:#04x}] <- {:#010x}", offset, value);
        self.write_reg(offset, value);
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        self.read_reg(offset)
    }

    fn tick(&mut self) -> PeripheralTickResult {
        self.sync_domain();
        let Some(hz) = self.domain.rtc_clock_hz() else {
            return PeripheralTickResult::default();
        };

        if self.cr & CR_ALRAE == 0 {
            self.isr |= ISR_ALRAWF;
        }
        if self.isr & ISR_INIT != 0 {
            self.isr |= ISR_INITF;
            return PeripheralTickResult::default();
        }

        if !self.domain.sync_stuck() {
            self.isr |= ISR_RSF;
        }
        self.prescaler_acc += hz as u64;
        let period = self.second_period();
        while self.prescaler_acc >= period {
            self.prescaler_acc -= period;
            let (time, date) = advance_second(self.time(), self.date(), self.hour_format());
            self.tr = time.to_tr();
            self.dr = date.to_dr();
            if self.cr & CR_ALRAE != 0 && self.alarm_matches() {
                tracing::debug!("RTC: alarm A matched at {:#08x}", self.tr);
                self.isr |= ISR_ALRAF;
            }
        }
        PeripheralTickResult::default()
    }

    super::impl_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{format_date, format_time, month, Meridiem, Weekday};

    fn running_rtc() -> (Rtc, Arc<BackupDomain>) {
        let domain = BackupDomain::new();
        domain.set_write_access(true);
        domain.set_rtc_clock_hz(Some(32_768));
        (Rtc::new(domain.clone()), domain)
    }

    fn unlock(rtc: &mut Rtc) {
        rtc.write(WPR, WPR_KEY1).unwrap();
        rtc.write(WPR, WPR_KEY2).unwrap();
    }

    fn enter_init(rtc: &mut Rtc) {
        let isr = rtc.read(ISR).unwrap();
        rtc.write(ISR, isr | ISR_INIT).unwrap();
        rtc.tick();
        assert_ne!(rtc.read(ISR).unwrap() & ISR_INITF, 0);
    }

    #[test]
    fn test_write_protection_key_sequence() {
        let (mut rtc, _) = running_rtc();
        rtc.write(CR, CR_FMT).unwrap();
        assert_eq!(rtc.peek(CR), 0);

        rtc.write(WPR, WPR_KEY1).unwrap();
        rtc.write(WPR, 0x00).unwrap();
        rtc.write(WPR, WPR_KEY2).unwrap();
        rtc.write(ISR, ISR_INIT).unwrap();
        assert_eq!(rtc.peek(ISR) & ISR_INIT, 0);

        unlock(&mut rtc);
        rtc.write(ISR, ISR_INIT).unwrap();
        assert_ne!(rtc.peek(ISR) & ISR_INIT, 0);
    }

    #[test]
    fn test_calendar_writes_need_init_mode() {
        let (mut rtc, _) = running_rtc();
        unlock(&mut rtc);
        rtc.write(TR, 0x0012_0000).unwrap();
        assert_eq!(rtc.peek(TR), 0);

        enter_init(&mut rtc);
        rtc.write(TR, 0x0012_0000).unwrap();
        assert_eq!(rtc.peek(TR), 0x0012_0000);
    }

    #[test]
    fn test_init_mode_needs_running_clock() {
        let (mut rtc, domain) = running_rtc();
        domain.set_rtc_clock_hz(None);
        unlock(&mut rtc);
        rtc.write(ISR, ISR_INIT).unwrap();
        for _ in 0..10 {
            rtc.tick();
        }
        assert_eq!(rtc.peek(ISR) & ISR_INITF, 0);
    }

    #[test]
    fn test_exit_init_resynchronizes_shadow_registers() {
        let (mut rtc, _) = running_rtc();
        unlock(&mut rtc);
        enter_init(&mut rtc);
        rtc.write(ISR, 0).unwrap();
        assert_eq!(rtc.peek(ISR) & (ISR_INITF | ISR_RSF), 0);
        rtc.tick();
        assert_ne!(rtc.peek(ISR) & ISR_RSF, 0);
    }

    #[test]
    fn test_calendar_counts_one_second_per_thousand_ticks() {
        let (mut rtc, _) = running_rtc();
        unlock(&mut rtc);
        enter_init(&mut rtc);
        rtc.write(CR, CR_FMT).unwrap();
        rtc.write(DR, DateBcd::new(Weekday::Monday, 0x31, month::MARCH, 0x15).to_dr())
            .unwrap();
        rtc.write(TR, TimeBcd::new(Meridiem::Pm, 0x11, 0x59, 0x55).to_tr())
            .unwrap();
        rtc.write(ISR, 0).unwrap();

        for _ in 0..999 {
            rtc.tick();
        }
        assert_eq!(format_time(&rtc.time(), rtc.hour_format()), "23:59:55");
        rtc.tick();
        assert_eq!(format_time(&rtc.time(), rtc.hour_format()), "23:59:56");

        for _ in 0..4000 {
            rtc.tick();
        }
        assert_eq!(format_time(&rtc.time(), rtc.hour_format()), "00:00:00");
        assert_eq!(format_date(&rtc.date()), "04-01-2015");
    }

    #[test]
    fn test_backup_registers_need_dbp_and_clear_on_domain_reset() {
        let (mut rtc, domain) = running_rtc();
        rtc.write(BKP0R + 4, 0x32F2).unwrap();
        assert_eq!(rtc.read(BKP0R + 4).unwrap(), 0x32F2);

        domain.set_write_access(false);
        rtc.write(BKP0R + 4, 0).unwrap();
        assert_eq!(rtc.read(BKP0R + 4).unwrap(), 0x32F2);

        domain.request_reset();
        assert_eq!(rtc.read(BKP0R + 4).unwrap(), 0);
    }

    #[test]
    fn test_alarm_a_fires_on_match() {
        let (mut rtc, _) = running_rtc();
        unlock(&mut rtc);
        enter_init(&mut rtc);
        rtc.write(CR, CR_FMT).unwrap();
        rtc.write(TR, TimeBcd::new(Meridiem::Am, 0x12, 0x00, 0x23).to_tr())
            .unwrap();
        rtc.write(ISR, 0).unwrap();
        rtc.tick();
        assert_ne!(rtc.peek(ISR) & ISR_ALRAWF, 0);

        let alarm = TimeBcd::new(Meridiem::Am, 0x12, 0x00, 0x25).to_tr() | ALRMAR_MSK4;
        rtc.write(ALRMAR, alarm).unwrap();
        rtc.write(CR, rtc.peek(CR) | CR_ALRAE | CR_ALRAIE).unwrap();

        // One tick already elapsed since init exit: 12:00:25 is reached on
        // the 2000th.
        for _ in 0..1998 {
            rtc.tick();
        }
        assert!(!rtc.alarm_output());
        rtc.tick();
        assert!(rtc.alarm_output());

        rtc.write(ISR, rtc.peek(ISR) & !ISR_ALRAF).unwrap();
        assert!(!rtc.alarm_output());
    }
}
