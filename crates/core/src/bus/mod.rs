// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Peripheral, SimResult, SimulationError};
use std::collections::BTreeMap;

/// RCC enable bit that has to be set for a peripheral's registers to respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGate {
    /// Offset of the enable register inside RCC.
    pub register: u64,
    pub mask: u32,
}

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub irq: Option<u32>,
    pub gate: Option<ClockGate>,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    pub fn new(name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) -> Self {
        Self {
            name: name.to_string(),
            base,
            size,
            irq: None,
            gate: None,
            dev,
        }
    }

    pub fn with_irq(mut self, irq: u32) -> Self {
        self.irq = Some(irq);
        self
    }

    pub fn gated_by(mut self, register: u64, mask: u32) -> Self {
        self.gate = Some(ClockGate { register, mask });
        self
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

impl std::fmt::Debug for PeripheralEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralEntry")
            .field("name", &self.name)
            .field("base", &format_args!("{:#010x}", self.base))
            .field("irq", &self.irq)
            .finish()
    }
}

/// Memory-mapped peripheral space of one MCU.
#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    /// Name of the entry whose registers hold the clock-enable bits.
    clock_controller: Option<String>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: PeripheralEntry) {
        tracing::trace!("Bus: mapping {} at {:#010x}", entry.name, entry.base);
        self.peripherals.push(entry);
    }

    /// Enables clock gating checks against the named peripheral.
    pub fn set_clock_controller(&mut self, name: &str) {
        self.clock_controller = Some(name.to_string());
    }

    fn find(&self, addr: u64) -> SimResult<usize> {
        if addr % 4 != 0 {
            return Err(SimulationError::Unaligned(addr));
        }
        self.peripherals
            .iter()
            .position(|p| p.contains(addr))
            .ok_or(SimulationError::MemoryViolation(addr))
    }

    fn clock_enabled(&self, index: usize) -> bool {
        let Some(gate) = self.peripherals[index].gate else {
            return true;
        };
        let Some(controller) = &self.clock_controller else {
            return true;
        };
        self.peripherals
            .iter()
            .find(|p| &p.name == controller)
            .is_some_and(|rcc| rcc.dev.peek(gate.register) & gate.mask != 0)
    }

    pub fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        let index = self.find(addr)?;
        if !self.clock_enabled(index) {
            tracing::warn!(
                "Bus: read from {} at {:#010x} with its clock disabled",
                self.peripherals[index].name,
                addr
            );
            return Ok(0);
        }
        let p = &mut self.peripherals[index];
        p.dev.read(addr - p.base)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        let index = self.find(addr)?;
        if !self.clock_enabled(index) {
            tracing::warn!(
                "Bus: write {:#010x} to {} at {:#010x} dropped, clock disabled",
                value,
                self.peripherals[index].name,
                addr
            );
            return Ok(());
        }
        let p = &mut self.peripherals[index];
        tracing::trace!("Bus: {} +{:#x} <- {:#010x}", p.name, addr - p.base, value);
        p.dev.write(addr - p.base, value)
    }

    /// Read-modify-write of one register.
    pub fn modify_u32(&mut self, addr: u64, f: impl FnOnce(u32) -> u32) -> SimResult<()> {
        let value = self.read_u32(addr)?;
        self.write_u32(addr, f(value))
    }

    /// Register value without read side effects or clock checks.
    pub fn peek_u32(&self, addr: u64) -> SimResult<u32> {
        let index = self.find(addr)?;
        let p = &self.peripherals[index];
        Ok(p.dev.peek(addr - p.base))
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> SimResult<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> SimResult<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))
    }

    /// Unmaps an entry, handing ownership of the device back to the caller.
    pub fn take_entry(&mut self, name: &str) -> Option<PeripheralEntry> {
        let index = self.peripherals.iter().position(|p| p.name == name)?;
        Some(self.peripherals.remove(index))
    }

    /// Advances every peripheral by one tick and returns the interrupt
    /// numbers asserted afterwards.
    pub fn tick_peripherals(&mut self) -> Vec<u32> {
        let mut interrupts = Vec::new();
        for p in &mut self.peripherals {
            let res = p.dev.tick();
            if res.irq {
                if let Some(irq) = p.irq {
                    interrupts.push(irq);
                }
            }
            interrupts.extend(res.explicit_irqs);
        }
        interrupts
    }

    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.peripherals
            .iter()
            .map(|p| (p.name.clone(), p.dev.snapshot()))
            .collect()
    }
}
