// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Peripheral, SimResult};

pub const ISER: u64 = 0x000;
pub const ICER: u64 = 0x080;
pub const ISPR: u64 = 0x100;
pub const ICPR: u64 = 0x180;

const BANKS: usize = 2;

/// Nested Vectored Interrupt Controller, external interrupts only.
///
/// IRQ numbers are device interrupt numbers (USART2 = 38), not exception
/// numbers.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct Nvic {
    iser: [u32; BANKS],
    ispr: [u32; BANKS],
}

fn locate(irq: u32) -> Option<(usize, u32)> {
    let idx = (irq / 32) as usize;
    (idx < BANKS).then_some((idx, 1 << (irq % 32)))
}

impl Nvic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        locate(irq).is_some_and(|(idx, bit)| self.iser[idx] & bit != 0)
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        locate(irq).is_some_and(|(idx, bit)| self.ispr[idx] & bit != 0)
    }

    pub fn set_pending(&mut self, irq: u32) {
        if let Some((idx, bit)) = locate(irq) {
            self.ispr[idx] |= bit;
        }
    }

    pub fn clear_pending(&mut self, irq: u32) {
        if let Some((idx, bit)) = locate(irq) {
            self.ispr[idx] &= !bit;
        }
    }

    /// Pending and enabled interrupts, lowest number first.
    pub fn active(&self) -> Vec<u32> {
        (0..(BANKS as u32 * 32))
            .filter(|&irq| self.is_enabled(irq) && self.is_pending(irq))
            .collect()
    }

    fn bank(offset: u64, base: u64) -> Option<usize> {
        let idx = ((offset - base) / 4) as usize;
        (idx < BANKS).then_some(idx)
    }
}

impl Peripheral for Nvic {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.peek(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        match offset {
            ISER..=0x01C => {
                if let Some(i) = Self::bank(offset, ISER) {
                    self.iser[i] |= value;
                }
            }
            ICER..=0x09C => {
                if let Some(i) = Self::bank(offset, ICER) {
                    self.iser[i] &= !value;
                }
            }
            ISPR..=0x11C => {
                if let Some(i) = Self::bank(offset, ISPR) {
                    self.ispr[i] |= value;
                }
            }
            ICPR..=0x19C => {
                if let Some(i) = Self::bank(offset, ICPR) {
                    self.ispr[i] &= !value;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        let (regs, base) = match offset {
            ISER..=0x01C => (&self.iser, ISER),
            ICER..=0x09C => (&self.iser, ICER),
            ISPR..=0x11C => (&self.ispr, ISPR),
            ICPR..=0x19C => (&self.ispr, ICPR),
            _ => return 0,
        };
        Self::bank(offset, base).map_or(0, |i| regs[i])
    }

    super::impl_any!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_and_disable_through_registers() {
        let mut nvic = Nvic::new();
        nvic.write(ISER + 4, 1 << (38 - 32)).unwrap();
        assert!(nvic.is_enabled(38));
        assert_eq!(nvic.peek(ICER + 4), 1 << 6);

        nvic.write(ICER + 4, 1 << (38 - 32)).unwrap();
        assert!(!nvic.is_enabled(38));
    }

    #[test]
    fn test_active_requires_enable_and_pending() {
        let mut nvic = Nvic::new();
        nvic.set_pending(40);
        assert!(nvic.active().is_empty());
        nvic.write(ISER + 4, 1 << (40 - 32)).unwrap();
        assert_eq!(nvic.active(), vec![40]);
        nvic.write(ICPR + 4, 1 << (40 - 32)).unwrap();
        assert!(nvic.active().is_empty());
    }

    #[test]
    fn test_out_of_range_irq_is_ignored() {
        let mut nvic = Nvic::new();
        nvic.set_pending(200);
        assert!(!nvic.is_pending(200));
        assert!(!nvic.is_enabled(200));
    }
}
