// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::backup::BackupDomain;
use crate::{set_field, Peripheral, PeripheralTickResult, SimResult};
use std::sync::Arc;

pub const CR: u64 = 0x00;
pub const CFGR: u64 = 0x08;
pub const AHBENR: u64 = 0x1C;
pub const APB2ENR: u64 = 0x20;
pub const APB1ENR: u64 = 0x24;
pub const CSR: u64 = 0x34;

pub const CR_HSION: u32 = 1 << 0;
pub const CR_HSIRDY: u32 = 1 << 1;
pub const CR_MSION: u32 = 1 << 8;
pub const CR_MSIRDY: u32 = 1 << 9;
pub const CR_PLLON: u32 = 1 << 24;
pub const CR_PLLRDY: u32 = 1 << 25;

pub const CFGR_SW_MASK: u32 = 0b11;
pub const CFGR_SWS_MASK: u32 = 0b11 << 2;
pub const CFGR_SW_PLL: u32 = 0b11;

pub const AHBENR_GPIOAEN: u32 = 1 << 0;
pub const AHBENR_GPIOCEN: u32 = 1 << 2;
pub const APB1ENR_USART2EN: u32 = 1 << 17;
pub const APB1ENR_PWREN: u32 = 1 << 28;
pub const APB2ENR_SYSCFGEN: u32 = 1 << 0;

pub const CSR_LSION: u32 = 1 << 0;
pub const CSR_LSIRDY: u32 = 1 << 1;
pub const CSR_LSEON: u32 = 1 << 8;
pub const CSR_LSERDY: u32 = 1 << 9;
pub const CSR_RTCSEL_MASK: u32 = 0b11 << 16;
pub const CSR_RTCEN: u32 = 1 << 22;
pub const CSR_RTCRST: u32 = 1 << 23;

/// CSR bits that belong to the backup domain and survive a system reset.
const CSR_BACKUP_MASK: u32 = CSR_LSEON | CSR_LSERDY | CSR_RTCSEL_MASK | CSR_RTCEN;

pub const LSE_HZ: u32 = 32_768;
pub const LSI_HZ: u32 = 37_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtcClockSource {
    #[default]
    None,
    Lse,
    Lsi,
    HseDiv,
}

impl RtcClockSource {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Self::Lse,
            0b10 => Self::Lsi,
            0b11 => Self::HseDiv,
            _ => Self::None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::None => 0b00,
            Self::Lse => 0b01,
            Self::Lsi => 0b10,
            Self::HseDiv => 0b11,
        }
    }
}

/// Start-up behaviour of the low-speed oscillators, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct OscillatorTiming {
    pub lse_startup_ticks: u32,
    pub lsi_startup_ticks: u32,
    /// A missing or broken 32.768 kHz crystal: LSERDY never rises.
    pub lse_fails: bool,
    /// LSIRDY never rises.
    pub lsi_fails: bool,
    /// RTCCLK never reaches the RTC even with a ready source selected.
    pub rtc_clock_stuck: bool,
    /// The APB side never resynchronizes with RTCCLK, so RSF stays low.
    pub rtc_sync_stuck: bool,
}

impl Default for OscillatorTiming {
    fn default() -> Self {
        Self {
            lse_startup_ticks: 300,
            lsi_startup_ticks: 1,
            lse_fails: false,
            lsi_fails: false,
            rtc_clock_stuck: false,
            rtc_sync_stuck: false,
        }
    }
}

/// Backup-domain part of RCC that a system reset leaves untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RccBackupState {
    csr: u32,
    lse_countdown: u32,
}

/// STM32L1 Reset and Clock Control: clock enables, system clock tree
/// handshakes and the LSE/LSI/RTC control bits of CSR.
#[derive(Debug, serde::Serialize)]
pub struct Rcc {
    cr: u32,
    cfgr: u32,
    ahbenr: u32,
    apb2enr: u32,
    apb1enr: u32,
    csr: u32,
    timing: OscillatorTiming,
    lse_countdown: u32,
    lsi_countdown: u32,
    #[serde(skip)]
    domain: Arc<BackupDomain>,
}

impl Rcc {
    pub fn new(domain: Arc<BackupDomain>, timing: OscillatorTiming) -> Self {
        Self::with_backup_state(domain, timing, RccBackupState::default())
    }

    pub fn with_backup_state(
        domain: Arc<BackupDomain>,
        timing: OscillatorTiming,
        backup: RccBackupState,
    ) -> Self {
        let rcc = Self {
            cr: CR_MSION | CR_MSIRDY,
            cfgr: 0,
            ahbenr: 0,
            apb2enr: 0,
            apb1enr: 0,
            csr: backup.csr & CSR_BACKUP_MASK,
            timing,
            lse_countdown: backup.lse_countdown,
            lsi_countdown: 0,
            domain,
        };
        rcc.publish_rtc_clock();
        rcc
    }

    pub fn backup_state(&self) -> RccBackupState {
        RccBackupState {
            csr: self.csr & CSR_BACKUP_MASK,
            lse_countdown: self.lse_countdown,
        }
    }

    pub fn rtc_clock_source(&self) -> RtcClockSource {
        RtcClockSource::from_bits(self.csr >> 16)
    }

    pub fn rtc_clock_hz(&self) -> Option<u32> {
        if self.timing.rtc_clock_stuck {
            return None;
        }
        if self.csr & CSR_RTCEN == 0 || self.csr & CSR_RTCRST != 0 {
            return None;
        }
        match self.rtc_clock_source() {
            RtcClockSource::Lse if self.csr & CSR_LSERDY != 0 => Some(LSE_HZ),
            RtcClockSource::Lsi if self.csr & CSR_LSIRDY != 0 => Some(LSI_HZ),
            _ => None,
        }
    }

    fn publish_rtc_clock(&self) {
        self.domain.set_rtc_clock_hz(self.rtc_clock_hz());
        self.domain.set_sync_stuck(self.timing.rtc_sync_stuck);
    }

    fn write_csr(&mut self, value: u32) {
        // LSI lives in the main domain and is always writable.
        if value & CSR_LSION != 0 && self.csr & CSR_LSION == 0 {
            self.lsi_countdown = self.timing.lsi_startup_ticks;
        }
        if value & CSR_LSION == 0 {
            self.csr &= !CSR_LSIRDY;
        }
        set_field(&mut self.csr, CSR_LSION, value);

        if !self.domain.write_access() {
            if (value ^ self.csr) & (CSR_BACKUP_MASK | CSR_RTCRST) & !CSR_LSERDY != 0 {
                tracing::warn!("RCC CSR: backup-domain bits written without DBP, ignored");
            }
            return;
        }

        if value & CSR_RTCRST != 0 {
            if self.csr & CSR_RTCRST == 0 {
                tracing::debug!("RCC: backup domain reset asserted");
                self.domain.request_reset();
            }
            self.csr = (self.csr & !CSR_BACKUP_MASK) | CSR_RTCRST;
            self.lse_countdown = 0;
            self.publish_rtc_clock();
            return;
        }
        self.csr &= !CSR_RTCRST;

        if value & CSR_LSEON != 0 && self.csr & CSR_LSEON == 0 {
            self.lse_countdown = self.timing.lse_startup_ticks;
        }
        if value & CSR_LSEON == 0 {
            self.csr &= !CSR_LSERDY;
            self.lse_countdown = 0;
        }
        set_field(&mut self.csr, CSR_LSEON | CSR_RTCEN, value);

        let requested = RtcClockSource::from_bits(value >> 16);
        let current = self.rtc_clock_source();
        if requested != current {
            if current == RtcClockSource::None {
                set_field(&mut self.csr, CSR_RTCSEL_MASK, value);
            } else {
                tracing::warn!(
                    "RCC: RTC clock source change {:?} -> {:?} needs a backup domain reset, ignored",
                    current,
                    requested
                );
            }
        }
        self.publish_rtc_clock();
    }

    fn write_cr(&mut self, value: u32) {
        let writable = CR_HSION | CR_MSION | CR_PLLON;
        if value & CR_HSION == 0 {
            self.cr &= !CR_HSIRDY;
        }
        if value & CR_PLLON == 0 {
            self.cr &= !CR_PLLRDY;
        }
        set_field(&mut self.cr, writable, value);
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            CR => self.cr,
            CFGR => self.cfgr,
            AHBENR => self.ahbenr,
            APB2ENR => self.apb2enr,
            APB1ENR => self.apb1enr,
            CSR => self.csr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            CR => self.write_cr(value),
            CFGR => set_field(&mut self.cfgr, !CFGR_SWS_MASK, value),
            AHBENR => self.ahbenr = value,
            APB2ENR => self.apb2enr = value,
            APB1ENR => self.apb1enr = value,
            CSR => self.write_csr(value),
            _ => {}
        }
    }
}

impl Peripheral for Rcc {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        tracing::trace!("RCC [{:#04x}] <- {:#010x}", offset, value);
        self.write_reg(offset, value);
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        self.read_reg(offset)
    }

    fn tick(&mut self) -> PeripheralTickResult {
        if self.cr & CR_HSION != 0 {
            self.cr |= CR_HSIRDY;
        }
        if self.cr & CR_PLLON != 0 && self.cr & CR_HSIRDY != 0 {
            self.cr |= CR_PLLRDY;
        }
        // SWS follows SW once the selected source is ready.
        let sw = self.cfgr & CFGR_SW_MASK;
        let ready = match sw {
            0b00 => self.cr & CR_MSIRDY != 0,
            0b01 => self.cr & CR_HSIRDY != 0,
            CFGR_SW_PLL => self.cr & CR_PLLRDY != 0,
            _ => false,
        };
        if ready {
            set_field(&mut self.cfgr, CFGR_SWS_MASK, sw << 2);
        }

        if self.csr & CSR_LSION != 0 && self.csr & CSR_LSIRDY == 0 && !self.timing.lsi_fails {
            self.lsi_countdown = self.lsi_countdown.saturating_sub(1);
            if self.lsi_countdown == 0 {
                self.csr |= CSR_LSIRDY;
            }
        }
        if self.csr & CSR_LSEON != 0 && self.csr & CSR_LSERDY == 0 && !self.timing.lse_fails {
            self.lse_countdown = self.lse_countdown.saturating_sub(1);
            if self.lse_countdown == 0 {
                tracing::debug!("RCC: LSE ready");
                self.csr |= CSR_LSERDY;
            }
        }
        self.publish_rtc_clock();
        PeripheralTickResult::default()
    }

    super::impl_any!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rcc_with_access() -> (Rcc, Arc<BackupDomain>) {
        let domain = BackupDomain::new();
        domain.set_write_access(true);
        let timing = OscillatorTiming {
            lse_startup_ticks: 3,
            ..Default::default()
        };
        (Rcc::new(domain.clone(), timing), domain)
    }

    #[test]
    fn test_lse_becomes_ready_after_startup_time() {
        let (mut rcc, _) = rcc_with_access();
        rcc.write(CSR, CSR_LSEON).unwrap();
        for _ in 0..2 {
            rcc.tick();
            assert_eq!(rcc.read(CSR).unwrap() & CSR_LSERDY, 0);
        }
        rcc.tick();
        assert_ne!(rcc.read(CSR).unwrap() & CSR_LSERDY, 0);
    }

    #[test]
    fn test_backup_bits_need_write_access() {
        let (mut rcc, domain) = rcc_with_access();
        domain.set_write_access(false);
        rcc.write(CSR, CSR_LSEON | CSR_LSION).unwrap();
        let csr = rcc.read(CSR).unwrap();
        assert_eq!(csr & CSR_LSEON, 0);
        assert_ne!(csr & CSR_LSION, 0);
    }

    #[test]
    fn test_rtc_source_is_write_once_until_backup_reset() {
        let (mut rcc, domain) = rcc_with_access();
        rcc.write(CSR, RtcClockSource::Lse.bits() << 16).unwrap();
        assert_eq!(rcc.rtc_clock_source(), RtcClockSource::Lse);

        rcc.write(CSR, RtcClockSource::Lsi.bits() << 16).unwrap();
        assert_eq!(rcc.rtc_clock_source(), RtcClockSource::Lse);

        let generation = domain.generation();
        rcc.write(CSR, CSR_RTCRST).unwrap();
        rcc.write(CSR, 0).unwrap();
        assert_eq!(domain.generation(), generation + 1);
        assert_eq!(rcc.rtc_clock_source(), RtcClockSource::None);

        rcc.write(CSR, RtcClockSource::Lsi.bits() << 16).unwrap();
        assert_eq!(rcc.rtc_clock_source(), RtcClockSource::Lsi);
    }

    #[test]
    fn test_rtc_clock_published_when_enabled_and_ready() {
        let (mut rcc, domain) = rcc_with_access();
        rcc.write(CSR, CSR_LSION).unwrap();
        rcc.tick();
        rcc.write(
            CSR,
            rcc.peek(CSR) | (RtcClockSource::Lsi.bits() << 16) | CSR_RTCEN,
        )
        .unwrap();
        assert_eq!(domain.rtc_clock_hz(), Some(LSI_HZ));
    }

    #[test]
    fn test_backup_state_survives_rebuild() {
        let (mut rcc, domain) = rcc_with_access();
        rcc.write(CSR, CSR_LSEON | CSR_LSION).unwrap();
        for _ in 0..3 {
            rcc.tick();
        }
        let rebuilt =
            Rcc::with_backup_state(domain, OscillatorTiming::default(), rcc.backup_state());
        let csr = rebuilt.peek(CSR);
        assert_ne!(csr & CSR_LSERDY, 0);
        assert_eq!(csr & CSR_LSION, 0);
    }

    #[test]
    fn test_pll_handshake() {
        let (mut rcc, _) = rcc_with_access();
        rcc.write(CR, rcc.peek(CR) | CR_HSION).unwrap();
        rcc.tick();
        rcc.write(CR, rcc.peek(CR) | CR_PLLON).unwrap();
        rcc.write(CFGR, CFGR_SW_PLL).unwrap();
        rcc.tick();
        assert_ne!(rcc.peek(CR) & CR_PLLRDY, 0);
        assert_eq!(rcc.peek(CFGR) & CFGR_SWS_MASK, CFGR_SW_PLL << 2);
    }
}
