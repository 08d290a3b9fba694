// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Single-threaded, tick-driven async runtime for board firmware.
//!
//! Nothing here sleeps on wall-clock time: a [`Clock`] only moves when the
//! world advances it, and a [`Task`] is only polled when something woke it.

pub mod executor;
pub mod signal;
pub mod time;

pub use executor::Task;
pub use signal::{TransferError, TransferSignal, TransferState};
pub use time::{Clock, Delay};
