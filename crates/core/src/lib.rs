// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod board;
pub mod bus;
pub mod calendar;
pub mod demos;
pub mod hal;
pub mod ll;
pub mod mcu;
pub mod network;
pub mod peripherals;
pub mod runtime;
pub mod signals;
pub mod snapshot;
pub mod wait;
pub mod world;

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use board::Board;
pub use mcu::Mcu;
pub use world::World;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Unaligned access at {0:#x}")]
    Unaligned(u64),
    #[error("Peripheral '{0}' is not mapped on the bus")]
    UnknownPeripheral(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

#[derive(Debug, Clone, Default)]
pub struct PeripheralTickResult {
    /// Level of the peripheral's own interrupt line after this tick.
    pub irq: bool,
    /// Additional interrupt numbers raised this tick (EXTI groups).
    pub explicit_irqs: Vec<u32>,
}

/// A memory-mapped peripheral with 32-bit registers.
///
/// Reads take `&mut self` because several status registers have read side
/// effects (USART SR/DR clear sequence).
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u64) -> SimResult<u32>;
    fn write(&mut self, offset: u64, value: u32) -> SimResult<()>;

    /// Side-effect free register view used by snapshots and tests.
    fn peek(&self, offset: u64) -> u32;

    /// Advance by one simulation tick (1 ms).
    fn tick(&mut self) -> PeripheralTickResult {
        PeripheralTickResult::default()
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Locks a mutex shared between the main task and interrupt handlers.
///
/// A panic inside a handler never leaves register state half-written, so a
/// poisoned lock is recovered instead of propagated.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replace `mask` bits of `reg` with the matching bits of `value`.
#[inline]
pub(crate) fn set_field(reg: &mut u32, mask: u32, value: u32) {
    *reg = (*reg & !mask) | (value & mask);
}
