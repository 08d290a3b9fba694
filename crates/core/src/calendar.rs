// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! BCD calendar records as stored in the RTC `TR`/`DR` registers, plus the
//! rendering used by the calendar demo and the one-second rollover used by
//! the RTC model.

use serde::Serialize;

pub fn bin2bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub fn bcd2bin(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl Weekday {
    /// Decodes the 3-bit WDU field. Zero is forbidden by the hardware and
    /// reads back as Monday.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            6 => Weekday::Saturday,
            7 => Weekday::Sunday,
            _ => Weekday::Monday,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        Self::from_bits(self.bits() % 7 + 1)
    }
}

/// Month codes in BCD, as the DR register holds them.
pub mod month {
    pub const JANUARY: u8 = 0x01;
    pub const FEBRUARY: u8 = 0x02;
    pub const MARCH: u8 = 0x03;
    pub const APRIL: u8 = 0x04;
    pub const MAY: u8 = 0x05;
    pub const JUNE: u8 = 0x06;
    pub const JULY: u8 = 0x07;
    pub const AUGUST: u8 = 0x08;
    pub const SEPTEMBER: u8 = 0x09;
    pub const OCTOBER: u8 = 0x10;
    pub const NOVEMBER: u8 = 0x11;
    pub const DECEMBER: u8 = 0x12;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourFormat {
    #[default]
    TwentyFour,
    AmPm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Meridiem {
    #[default]
    Am,
    Pm,
}

/// Time of day with BCD fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeBcd {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub meridiem: Meridiem,
}

const TR_PM: u32 = 1 << 22;

impl TimeBcd {
    pub fn new(meridiem: Meridiem, hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
            meridiem,
        }
    }

    pub fn from_tr(tr: u32) -> Self {
        Self {
            seconds: (tr & 0x7F) as u8,
            minutes: ((tr >> 8) & 0x7F) as u8,
            hours: ((tr >> 16) & 0x3F) as u8,
            meridiem: if tr & TR_PM != 0 {
                Meridiem::Pm
            } else {
                Meridiem::Am
            },
        }
    }

    pub fn to_tr(&self) -> u32 {
        let pm = match self.meridiem {
            Meridiem::Pm => TR_PM,
            Meridiem::Am => 0,
        };
        (self.seconds as u32 & 0x7F)
            | ((self.minutes as u32 & 0x7F) << 8)
            | ((self.hours as u32 & 0x3F) << 16)
            | pm
    }

    /// Hour of day in 0..=23 regardless of the register format.
    pub fn hour_of_day(&self, format: HourFormat) -> u8 {
        let hours = bcd2bin(self.hours);
        match format {
            HourFormat::TwentyFour => hours,
            HourFormat::AmPm => match (self.meridiem, hours) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, h) => h,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, h) => h + 12,
            },
        }
    }
}

/// Calendar date with BCD fields; `year` counts from 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBcd {
    pub weekday: Weekday,
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

impl Default for DateBcd {
    /// DR reset value: Monday 1 January 2000.
    fn default() -> Self {
        Self::from_dr(0x0000_2101)
    }
}

impl DateBcd {
    pub fn new(weekday: Weekday, day: u8, month: u8, year: u8) -> Self {
        Self {
            weekday,
            day,
            month,
            year,
        }
    }

    pub fn from_dr(dr: u32) -> Self {
        Self {
            day: (dr & 0x3F) as u8,
            month: ((dr >> 8) & 0x1F) as u8,
            weekday: Weekday::from_bits(((dr >> 13) & 0x7) as u8),
            year: ((dr >> 16) & 0xFF) as u8,
        }
    }

    pub fn to_dr(&self) -> u32 {
        (self.day as u32 & 0x3F)
            | ((self.month as u32 & 0x1F) << 8)
            | ((self.weekday.bits() as u32) << 13)
            | ((self.year as u32) << 16)
    }

    pub fn full_year(&self) -> u16 {
        2000 + bcd2bin(self.year) as u16
    }
}

/// Renders `hh:mm:ss` on a 24-hour clock.
pub fn format_time(time: &TimeBcd, format: HourFormat) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time.hour_of_day(format),
        bcd2bin(time.minutes),
        bcd2bin(time.seconds)
    )
}

/// Renders `mm-dd-yyyy`.
pub fn format_date(date: &DateBcd) -> String {
    format!(
        "{:02}-{:02}-{}",
        bcd2bin(date.month),
        bcd2bin(date.day),
        date.full_year()
    )
}

fn is_leap_year(year: u8) -> bool {
    // 2000..=2099 only; 2000 is a leap year.
    year % 4 == 0
}

pub fn days_in_month(month: u8, year: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn next_date(date: DateBcd) -> DateBcd {
    let mut day = bcd2bin(date.day) + 1;
    let mut month = bcd2bin(date.month);
    let mut year = bcd2bin(date.year);
    if day > days_in_month(month, year) {
        day = 1;
        month += 1;
        if month > 12 {
            month = 1;
            year = (year + 1) % 100;
        }
    }
    DateBcd {
        weekday: date.weekday.next(),
        day: bin2bcd(day),
        month: bin2bcd(month),
        year: bin2bcd(year),
    }
}

/// Advances the calendar by one second.
pub fn advance_second(time: TimeBcd, date: DateBcd, format: HourFormat) -> (TimeBcd, DateBcd) {
    let mut seconds = bcd2bin(time.seconds) + 1;
    let mut minutes = bcd2bin(time.minutes);
    let mut hours = bcd2bin(time.hours);
    let mut meridiem = time.meridiem;
    let mut new_day = false;

    if seconds == 60 {
        seconds = 0;
        minutes += 1;
    }
    if minutes == 60 {
        minutes = 0;
        match format {
            HourFormat::TwentyFour => {
                hours += 1;
                if hours == 24 {
                    hours = 0;
                    new_day = true;
                }
            }
            HourFormat::AmPm => match hours {
                11 => {
                    hours = 12;
                    meridiem = match meridiem {
                        Meridiem::Am => Meridiem::Pm,
                        Meridiem::Pm => {
                            new_day = true;
                            Meridiem::Am
                        }
                    };
                }
                12 => hours = 1,
                h => hours = h + 1,
            },
        }
    }

    let time = TimeBcd {
        hours: bin2bcd(hours),
        minutes: bin2bcd(minutes),
        seconds: bin2bcd(seconds),
        meridiem,
    };
    let date = if new_day { next_date(date) } else { date };
    (time, date)
}
