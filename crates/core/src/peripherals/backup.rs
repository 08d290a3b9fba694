// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Signals shared by the peripherals that live in or gate the backup domain.
///
/// PWR owns the write-access bit (DBP), RCC owns the backup-domain reset and
/// the RTC kernel clock, and the RTC consumes all three.
#[derive(Debug, Default)]
pub struct BackupDomain {
    write_access: AtomicBool,
    reset_generation: AtomicU32,
    rtc_clock_hz: AtomicU32,
    sync_stuck: AtomicBool,
}

impl BackupDomain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn write_access(&self) -> bool {
        self.write_access.load(Ordering::SeqCst)
    }

    pub fn set_write_access(&self, enabled: bool) {
        self.write_access.store(enabled, Ordering::SeqCst);
    }

    /// Marks every backup-domain register as reset. Consumers compare the
    /// generation they last saw against [`BackupDomain::generation`].
    pub fn request_reset(&self) {
        self.reset_generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u32 {
        self.reset_generation.load(Ordering::SeqCst)
    }

    /// RTCCLK frequency, `None` while no ready oscillator is routed to an
    /// enabled RTC.
    pub fn rtc_clock_hz(&self) -> Option<u32> {
        match self.rtc_clock_hz.load(Ordering::SeqCst) {
            0 => None,
            hz => Some(hz),
        }
    }

    pub fn set_rtc_clock_hz(&self, hz: Option<u32>) {
        self.rtc_clock_hz.store(hz.unwrap_or(0), Ordering::SeqCst);
    }

    /// Shadow registers never resynchronize (RSF held low).
    pub fn sync_stuck(&self) -> bool {
        self.sync_stuck.load(Ordering::SeqCst)
    }

    pub fn set_sync_stuck(&self, stuck: bool) {
        self.sync_stuck.store(stuck, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::BackupDomain;

    #[test]
    fn test_reset_bumps_generation() {
        let domain = BackupDomain::new();
        let before = domain.generation();
        domain.request_reset();
        assert_eq!(domain.generation(), before + 1);
    }

    #[test]
    fn test_clock_zero_means_stopped() {
        let domain = BackupDomain::new();
        assert_eq!(domain.rtc_clock_hz(), None);
        domain.set_rtc_clock_hz(Some(32_768));
        assert_eq!(domain.rtc_clock_hz(), Some(32_768));
        domain.set_rtc_clock_hz(None);
        assert_eq!(domain.rtc_clock_hz(), None);
    }
}
