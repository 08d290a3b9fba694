// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::calendar::{DateBcd, HourFormat, Meridiem, TimeBcd, Weekday};
use crate::mcu::{Mcu, RTC_BASE};
use crate::peripherals::rtc::*;
use crate::SimResult;

/// Backup data register holding the "calendar configured" marker.
pub const BKP_DR1: usize = 1;

pub fn disable_write_protection(mcu: &mut Mcu) -> SimResult<()> {
    mcu.write(RTC_BASE + WPR, WPR_KEY1)?;
    mcu.write(RTC_BASE + WPR, WPR_KEY2)
}

pub fn enable_write_protection(mcu: &mut Mcu) -> SimResult<()> {
    mcu.write(RTC_BASE + WPR, 0xFF)
}

pub fn enable_init_mode(mcu: &mut Mcu) -> SimResult<()> {
    // Only INIT is written; RSF and ALRAF are rc_w0 and must read back as 1.
    mcu.write(RTC_BASE + ISR, !0)
}

pub fn disable_init_mode(mcu: &mut Mcu) -> SimResult<()> {
    mcu.write(RTC_BASE + ISR, !ISR_INIT)
}

/// INITF: calendar registers may be written.
pub fn is_active_flag_init(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RTC_BASE + ISR, ISR_INITF)
}

pub fn clear_flag_rs(mcu: &mut Mcu) -> SimResult<()> {
    let isr = mcu.read(RTC_BASE + ISR)?;
    mcu.write(RTC_BASE + ISR, !(ISR_RSF | ISR_INIT) | (isr & ISR_INIT))
}

pub fn is_active_flag_rs(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RTC_BASE + ISR, ISR_RSF)
}

pub fn set_hour_format(mcu: &mut Mcu, format: HourFormat) -> SimResult<()> {
    match format {
        HourFormat::AmPm => mcu.set_bits(RTC_BASE + CR, CR_FMT),
        HourFormat::TwentyFour => mcu.clear_bits(RTC_BASE + CR, CR_FMT),
    }
}

pub fn set_asynch_prescaler(mcu: &mut Mcu, prediv_a: u32) -> SimResult<()> {
    mcu.modify(RTC_BASE + PRER, |v| (v & 0x7FFF) | ((prediv_a & 0x7F) << 16))
}

pub fn set_synch_prescaler(mcu: &mut Mcu, prediv_s: u32) -> SimResult<()> {
    mcu.modify(RTC_BASE + PRER, |v| (v & !0x7FFF) | (prediv_s & 0x7FFF))
}

/// Day, month and year are BCD.
pub fn date_config(
    mcu: &mut Mcu,
    weekday: Weekday,
    day: u8,
    month: u8,
    year: u8,
) -> SimResult<()> {
    let date = DateBcd::new(weekday, day, month, year);
    mcu.write(RTC_BASE + DR, date.to_dr())
}

/// Hours, minutes and seconds are BCD.
pub fn time_config(
    mcu: &mut Mcu,
    meridiem: Meridiem,
    hours: u8,
    minutes: u8,
    seconds: u8,
) -> SimResult<()> {
    let time = TimeBcd::new(meridiem, hours, minutes, seconds);
    mcu.write(RTC_BASE + TR, time.to_tr())
}

pub fn hour_format(mcu: &mut Mcu) -> SimResult<HourFormat> {
    Ok(if mcu.read(RTC_BASE + CR)? & CR_FMT != 0 {
        HourFormat::AmPm
    } else {
        HourFormat::TwentyFour
    })
}

pub fn time_get(mcu: &mut Mcu) -> SimResult<TimeBcd> {
    Ok(TimeBcd::from_tr(mcu.read(RTC_BASE + TR)?))
}

pub fn date_get(mcu: &mut Mcu) -> SimResult<DateBcd> {
    Ok(DateBcd::from_dr(mcu.read(RTC_BASE + DR)?))
}

pub fn bak_get_register(mcu: &mut Mcu, index: usize) -> SimResult<u32> {
    mcu.read(RTC_BASE + BKP0R + 4 * index as u64)
}

pub fn bak_set_register(mcu: &mut Mcu, index: usize, value: u32) -> SimResult<()> {
    mcu.write(RTC_BASE + BKP0R + 4 * index as u64, value)
}

pub fn alma_enable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RTC_BASE + CR, CR_ALRAE)
}

pub fn alma_disable(mcu: &mut Mcu) -> SimResult<()> {
    mcu.clear_bits(RTC_BASE + CR, CR_ALRAE)
}

/// ALRAWF: alarm A registers may be written.
pub fn is_active_flag_alraw(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RTC_BASE + ISR, ISR_ALRAWF)
}

/// Alarm time in BCD; `mask` selects the ALRMAR MSKx bits to ignore.
pub fn alma_config(
    mcu: &mut Mcu,
    meridiem: Meridiem,
    hours: u8,
    minutes: u8,
    seconds: u8,
    mask: u32,
) -> SimResult<()> {
    let time = TimeBcd::new(meridiem, hours, minutes, seconds);
    mcu.write(RTC_BASE + ALRMAR, time.to_tr() | mask)
}

pub fn enable_it_alra(mcu: &mut Mcu) -> SimResult<()> {
    mcu.set_bits(RTC_BASE + CR, CR_ALRAIE)
}

pub fn is_active_flag_alra(mcu: &mut Mcu) -> SimResult<bool> {
    mcu.is_set(RTC_BASE + ISR, ISR_ALRAF)
}

pub fn clear_flag_alra(mcu: &mut Mcu) -> SimResult<()> {
    let isr = mcu.read(RTC_BASE + ISR)?;
    mcu.write(RTC_BASE + ISR, !(ISR_ALRAF | ISR_INIT) | (isr & ISR_INIT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::month;
    use crate::ll;
    use crate::mcu::McuConfig;
    use crate::peripherals::rcc::{self, RtcClockSource};

    fn mcu_with_lsi_rtc() -> Mcu {
        let mut mcu = Mcu::cold_start(McuConfig::default());
        ll::rcc::apb1_enable_clock(&mut mcu, rcc::APB1ENR_PWREN).unwrap();
        ll::pwr::enable_backup_access(&mut mcu).unwrap();
        ll::rcc::lsi_enable(&mut mcu).unwrap();
        mcu.tick().unwrap();
        ll::rcc::set_rtc_clock_source(&mut mcu, RtcClockSource::Lsi).unwrap();
        ll::rcc::enable_rtc(&mut mcu).unwrap();
        mcu
    }

    #[test]
    fn test_init_mode_requires_unlock() {
        let mut mcu = mcu_with_lsi_rtc();
        enable_init_mode(&mut mcu).unwrap();
        mcu.tick().unwrap();
        assert!(!is_active_flag_init(&mut mcu).unwrap());

        disable_write_protection(&mut mcu).unwrap();
        enable_init_mode(&mut mcu).unwrap();
        mcu.tick().unwrap();
        assert!(is_active_flag_init(&mut mcu).unwrap());
    }

    #[test]
    fn test_calendar_written_in_init_mode_reads_back() {
        let mut mcu = mcu_with_lsi_rtc();
        disable_write_protection(&mut mcu).unwrap();
        enable_init_mode(&mut mcu).unwrap();
        mcu.tick().unwrap();
        set_hour_format(&mut mcu, HourFormat::AmPm).unwrap();
        date_config(&mut mcu, Weekday::Monday, 0x31, month::MARCH, 0x15).unwrap();
        time_config(&mut mcu, Meridiem::Pm, 0x11, 0x59, 0x55).unwrap();
        disable_init_mode(&mut mcu).unwrap();
        enable_write_protection(&mut mcu).unwrap();

        assert_eq!(hour_format(&mut mcu).unwrap(), HourFormat::AmPm);
        assert_eq!(mcu.read(RTC_BASE + TR).unwrap(), 0x0051_5955);
        assert_eq!(mcu.read(RTC_BASE + DR).unwrap(), 0x0015_2331);
    }

    #[test]
    fn test_clear_flag_rs_keeps_init_request() {
        let mut mcu = mcu_with_lsi_rtc();
        disable_write_protection(&mut mcu).unwrap();
        mcu.tick().unwrap();
        assert!(is_active_flag_rs(&mut mcu).unwrap());
        clear_flag_rs(&mut mcu).unwrap();
        assert!(!is_active_flag_rs(&mut mcu).unwrap());
        assert_eq!(mcu.read(RTC_BASE + ISR).unwrap() & ISR_INIT, 0);
    }

    #[test]
    fn test_clear_flag_alra_keeps_init_mode() {
        let mut mcu = mcu_with_lsi_rtc();
        disable_write_protection(&mut mcu).unwrap();
        enable_init_mode(&mut mcu).unwrap();
        mcu.tick().unwrap();
        clear_flag_alra(&mut mcu).unwrap();
        assert!(is_active_flag_init(&mut mcu).unwrap());
        assert!(!is_active_flag_alra(&mut mcu).unwrap());
        assert_ne!(mcu.read(RTC_BASE + ISR).unwrap() & ISR_INIT, 0);
    }

    #[test]
    fn test_backup_register_roundtrip() {
        let mut mcu = mcu_with_lsi_rtc();
        bak_set_register(&mut mcu, BKP_DR1, 0x32F2).unwrap();
        assert_eq!(bak_get_register(&mut mcu, BKP_DR1).unwrap(), 0x32F2);
    }
}
