// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Low-layer drivers: one function per register operation, no state and no
//! callbacks. Every helper works on a locked [`Mcu`](crate::Mcu).

pub mod exti;
pub mod gpio;
pub mod nvic;
pub mod pwr;
pub mod rcc;
pub mod rtc;
