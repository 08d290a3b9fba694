// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::{DigitalLevel, Edge, EdgeDetector};
use crate::{Peripheral, PeripheralTickResult, SimResult};
use std::any::Any;

pub const IMR: u64 = 0x00;
pub const EMR: u64 = 0x04;
pub const RTSR: u64 = 0x08;
pub const FTSR: u64 = 0x0C;
pub const SWIER: u64 = 0x10;
pub const PR: u64 = 0x14;

pub const LINE_COUNT: usize = 23;
const LINE_MASK: u32 = (1 << LINE_COUNT) - 1;

pub const LINE_RTC_ALARM: u8 = 17;

pub const IRQ_EXTI9_5: u32 = 23;
pub const IRQ_EXTI15_10: u32 = 40;
pub const IRQ_RTC_ALARM: u32 = 41;

/// STM32L1 External Interrupt/Event Controller (EXTI)
#[derive(Debug, serde::Serialize)]
pub struct Exti {
    pub imr: u32,   // 0x00 - Interrupt mask register
    pub emr: u32,   // 0x04 - Event mask register
    pub rtsr: u32,  // 0x08 - Rising trigger selection register
    pub ftsr: u32,  // 0x0C - Falling trigger selection register
    pub swier: u32, // 0x10 - Software interrupt event register
    pub pr: u32,    // 0x14 - Pending register
    #[serde(skip)]
    lines: [EdgeDetector; LINE_COUNT],
}

impl Default for Exti {
    fn default() -> Self {
        Self {
            imr: 0,
            emr: 0,
            rtsr: 0,
            ftsr: 0,
            swier: 0,
            pr: 0,
            lines: [EdgeDetector::default(); LINE_COUNT],
        }
    }
}

impl Exti {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the current level of an input line; a configured edge latches
    /// the pending bit.
    pub fn set_line_level(&mut self, line: u8, level: DigitalLevel) {
        let Some(detector) = self.lines.get_mut(line as usize) else {
            return;
        };
        let bit = 1u32 << line;
        match detector.update(level) {
            Some(Edge::Rising) if self.rtsr & bit != 0 => self.pr |= bit,
            Some(Edge::Falling) if self.ftsr & bit != 0 => self.pr |= bit,
            _ => {}
        }
    }

    /// Seeds a line's level without generating an edge.
    pub fn preset_line_level(&mut self, line: u8, level: DigitalLevel) {
        if let Some(detector) = self.lines.get_mut(line as usize) {
            *detector = EdgeDetector::new(level);
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            IMR => self.imr,
            EMR => self.emr,
            RTSR => self.rtsr,
            FTSR => self.ftsr,
            SWIER => self.swier,
            PR => self.pr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            IMR => self.imr = value & LINE_MASK,
            EMR => self.emr = value & LINE_MASK,
            RTSR => self.rtsr = value & LINE_MASK,
            FTSR => self.ftsr = value & LINE_MASK,
            SWIER => {
                let raised = (self.swier ^ value) & value & LINE_MASK;
                self.swier = value & LINE_MASK;
                self.pr |= raised;
            }
            PR => {
                // PR is rc_w1: writing 1 clears the bit, and the matching
                // software trigger with it.
                self.pr &= !value;
                self.swier &= !value;
            }
            _ => {}
        }
    }
}

impl Peripheral for Exti {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset, value);
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        self.read_reg(offset)
    }

    fn tick(&mut self) -> PeripheralTickResult {
        // EXTI interrupts are raised while PR bits are set AND the
        // corresponding IMR bits are set.
        let mut explicit_irqs = Vec::new();
        let active = self.pr & self.imr;

        if active != 0 {
            // Lines 0-4 have dedicated vectors.
            for i in 0..5 {
                if (active & (1 << i)) != 0 {
                    explicit_irqs.push(6 + i); // EXTI0..4 -> IRQ 6..10
                }
            }
            if (active & 0x03E0) != 0 {
                explicit_irqs.push(IRQ_EXTI9_5);
            }
            if (active & 0xFC00) != 0 {
                explicit_irqs.push(IRQ_EXTI15_10);
            }
            if (active & (1 << LINE_RTC_ALARM)) != 0 {
                explicit_irqs.push(IRQ_RTC_ALARM);
            }
        }

        PeripheralTickResult {
            explicit_irqs,
            ..Default::default()
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falling_edge_on_button_line_raises_exti15_10() {
        let mut exti = Exti::new();
        exti.preset_line_level(13, DigitalLevel::High);
        exti.write(IMR, 1 << 13).unwrap();
        exti.write(FTSR, 1 << 13).unwrap();

        exti.set_line_level(13, DigitalLevel::High);
        assert_eq!(exti.pr, 0);
        exti.set_line_level(13, DigitalLevel::Low);
        assert_eq!(exti.pr, 1 << 13);
        assert_eq!(exti.tick().explicit_irqs, vec![IRQ_EXTI15_10]);

        exti.write(PR, 1 << 13).unwrap();
        assert!(exti.tick().explicit_irqs.is_empty());
    }

    #[test]
    fn test_unselected_edge_is_ignored() {
        let mut exti = Exti::new();
        exti.write(IMR, 1 << 13).unwrap();
        exti.write(FTSR, 1 << 13).unwrap();
        exti.set_line_level(13, DigitalLevel::High); // rising
        assert_eq!(exti.pr, 0);
    }

    #[test]
    fn test_masked_line_stays_pending_without_irq() {
        let mut exti = Exti::new();
        exti.write(RTSR, 1 << LINE_RTC_ALARM).unwrap();
        exti.set_line_level(LINE_RTC_ALARM, DigitalLevel::High);
        assert_ne!(exti.pr & (1 << LINE_RTC_ALARM), 0);
        assert!(exti.tick().explicit_irqs.is_empty());

        exti.write(IMR, 1 << LINE_RTC_ALARM).unwrap();
        assert_eq!(exti.tick().explicit_irqs, vec![IRQ_RTC_ALARM]);
    }

    #[test]
    fn test_software_trigger() {
        let mut exti = Exti::new();
        exti.write(IMR, 1 << 2).unwrap();
        exti.write(SWIER, 1 << 2).unwrap();
        assert_eq!(exti.tick().explicit_irqs, vec![8]);
    }
}
