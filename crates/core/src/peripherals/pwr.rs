// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::backup::BackupDomain;
use crate::{Peripheral, SimResult};
use std::sync::Arc;

pub const CR: u64 = 0x00;
pub const CSR: u64 = 0x04;

pub const CR_DBP: u32 = 1 << 8;
pub const CR_VOS_MASK: u32 = 0b11 << 11;
pub const CSR_VOSF: u32 = 1 << 4;

/// STM32L1 power controller: backup-domain write access and the regulator
/// voltage range.
#[derive(Debug, serde::Serialize)]
pub struct Pwr {
    cr: u32,
    csr: u32,
    #[serde(skip)]
    domain: Arc<BackupDomain>,
}

impl Pwr {
    pub fn new(domain: Arc<BackupDomain>) -> Self {
        domain.set_write_access(false);
        Self {
            cr: 0x0000_1000, // VOS = range 2
            csr: 0,
            domain,
        }
    }
}

impl Peripheral for Pwr {
    fn read(&mut self, offset: u64) -> SimResult<u32> {
        Ok(self.peek(offset))
    }

    fn write(&mut self, offset: u64, value: u32) -> SimResult<()> {
        if offset == CR {
            if (value ^ self.cr) & CR_VOS_MASK != 0 {
                // Regulator settles during the next tick.
                self.csr |= CSR_VOSF;
            }
            self.cr = value & 0x0000_7FFF;
            self.domain.set_write_access(self.cr & CR_DBP != 0);
            tracing::trace!("PWR CR <- {:#010x}", self.cr);
        }
        Ok(())
    }

    fn peek(&self, offset: u64) -> u32 {
        match offset {
            CR => self.cr,
            CSR => self.csr,
            _ => 0,
        }
    }

    fn tick(&mut self) -> crate::PeripheralTickResult {
        self.csr &= !CSR_VOSF;
        crate::PeripheralTickResult::default()
    }

    super::impl_any!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dbp_drives_backup_write_access() {
        let domain = BackupDomain::new();
        let mut pwr = Pwr::new(domain.clone());
        assert!(!domain.write_access());
        pwr.write(CR, pwr.peek(CR) | CR_DBP).unwrap();
        assert!(domain.write_access());
        pwr.write(CR, pwr.peek(CR) & !CR_DBP).unwrap();
        assert!(!domain.write_access());
    }

    #[test]
    fn test_voltage_scaling_sets_vosf_until_next_tick() {
        let mut pwr = Pwr::new(BackupDomain::new());
        pwr.write(CR, 0x0000_0800).unwrap(); // range 1
        assert_ne!(pwr.read(CSR).unwrap() & CSR_VOSF, 0);
        pwr.tick();
        assert_eq!(pwr.read(CSR).unwrap() & CSR_VOSF, 0);
    }
}
