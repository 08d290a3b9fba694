// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Board firmware: the UART two-board exchange and the RTC calendar and
//! alarm programs, written against the LL/HAL drivers.

pub mod buffer;
pub mod clock;
pub mod fault;
pub mod led;
pub mod rtc_alarm;
pub mod rtc_calendar;
pub mod uart_pingpong;

pub use fault::Fault;
pub use rtc_calendar::{ClockSource, RtcDemoConfig};
pub use uart_pingpong::{PingPongConfig, Role};
