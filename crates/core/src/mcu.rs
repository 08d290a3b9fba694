// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! One STM32L152RE: the peripheral set of the NUCLEO-L152RE demos mapped on
//! a [`SystemBus`], plus the fixed wiring between them (button to EXTI,
//! RTC alarm to EXTI, interrupt lines to the NVIC).

use crate::bus::{PeripheralEntry, SystemBus};
use crate::peripherals::backup::BackupDomain;
use crate::peripherals::exti::{self, Exti};
use crate::peripherals::gpio::GpioPort;
use crate::peripherals::nvic::Nvic;
use crate::peripherals::pwr::Pwr;
use crate::peripherals::rcc::{self, OscillatorTiming, Rcc, RccBackupState};
use crate::peripherals::rtc::Rtc;
use crate::peripherals::uart::Uart;
use crate::signals::DigitalLevel;
use crate::SimResult;
use std::sync::{Arc, Mutex};

pub const RCC_BASE: u64 = 0x4002_3800;
pub const PWR_BASE: u64 = 0x4000_7000;
pub const RTC_BASE: u64 = 0x4000_2800;
pub const USART2_BASE: u64 = 0x4000_4400;
pub const GPIOA_BASE: u64 = 0x4002_0000;
pub const GPIOC_BASE: u64 = 0x4002_0800;
pub const EXTI_BASE: u64 = 0x4001_0400;
pub const NVIC_BASE: u64 = 0xE000_E100;

pub const USART2_IRQ: u32 = 38;
pub const EXTI15_10_IRQ: u32 = exti::IRQ_EXTI15_10;
pub const RTC_ALARM_IRQ: u32 = exti::IRQ_RTC_ALARM;

/// LD2 on PA5.
pub const LED_PIN: u8 = 5;
/// B1 on PC13, pulled up, pressed = low.
pub const BUTTON_PIN: u8 = 13;

pub mod names {
    pub const RCC: &str = "rcc";
    pub const PWR: &str = "pwr";
    pub const RTC: &str = "rtc";
    pub const USART2: &str = "usart2";
    pub const GPIOA: &str = "gpioa";
    pub const GPIOC: &str = "gpioc";
    pub const EXTI: &str = "exti";
    pub const NVIC: &str = "nvic";
}

/// Board-level properties that outlive resets.
#[derive(Debug, Clone, Default)]
pub struct McuConfig {
    pub oscillators: OscillatorTiming,
    /// Captures every byte USART2 puts on the wire.
    pub uart_sink: Option<Arc<Mutex<Vec<u8>>>>,
}

#[derive(Debug)]
pub struct Mcu {
    pub bus: SystemBus,
    config: McuConfig,
    domain: Arc<BackupDomain>,
    button: DigitalLevel,
}

impl Mcu {
    /// Power-on: every register, backup domain included, at its reset value.
    pub fn cold_start(config: McuConfig) -> Self {
        let domain = BackupDomain::new();
        let rtc = PeripheralEntry::new(
            names::RTC,
            RTC_BASE,
            0x400,
            Box::new(Rtc::new(domain.clone())),
        );
        Self::assemble(config, domain, rtc, RccBackupState::default())
    }

    /// System reset (NRST, watchdog, software reset). The RTC and the
    /// backup-domain bits of RCC keep running; everything else restarts.
    pub fn reset(&mut self) {
        let backup = self
            .bus
            .peripheral::<Rcc>(names::RCC)
            .map(Rcc::backup_state)
            .unwrap_or_default();
        let rtc = self.bus.take_entry(names::RTC).unwrap_or_else(|| {
            PeripheralEntry::new(
                names::RTC,
                RTC_BASE,
                0x400,
                Box::new(Rtc::new(self.domain.clone())),
            )
        });
        tracing::debug!("MCU: system reset, backup domain retained");
        *self = Self::assemble(self.config.clone(), self.domain.clone(), rtc, backup);
    }

    /// Removes all power, including VBAT.
    pub fn power_cycle(&mut self) {
        tracing::debug!("MCU: power cycle");
        *self = Self::cold_start(self.config.clone());
    }

    fn assemble(
        config: McuConfig,
        domain: Arc<BackupDomain>,
        rtc: PeripheralEntry,
        backup: RccBackupState,
    ) -> Self {
        let mut uart = Uart::new();
        uart.set_sink(config.uart_sink.clone());

        let mut bus = SystemBus::new();
        bus.add(PeripheralEntry::new(
            names::RCC,
            RCC_BASE,
            0x400,
            Box::new(Rcc::with_backup_state(domain.clone(), config.oscillators, backup)),
        ));
        bus.add(
            PeripheralEntry::new(names::PWR, PWR_BASE, 0x400, Box::new(Pwr::new(domain.clone())))
                .gated_by(rcc::APB1ENR, rcc::APB1ENR_PWREN),
        );
        bus.add(rtc);
        bus.add(
            PeripheralEntry::new(names::USART2, USART2_BASE, 0x400, Box::new(uart))
                .with_irq(USART2_IRQ)
                .gated_by(rcc::APB1ENR, rcc::APB1ENR_USART2EN),
        );
        bus.add(
            PeripheralEntry::new(names::GPIOA, GPIOA_BASE, 0x400, Box::new(GpioPort::new()))
                .gated_by(rcc::AHBENR, rcc::AHBENR_GPIOAEN),
        );
        let mut gpioc = GpioPort::new();
        gpioc.drive_input(BUTTON_PIN, DigitalLevel::High);
        bus.add(
            PeripheralEntry::new(names::GPIOC, GPIOC_BASE, 0x400, Box::new(gpioc))
                .gated_by(rcc::AHBENR, rcc::AHBENR_GPIOCEN),
        );
        let mut exti = Exti::new();
        exti.preset_line_level(BUTTON_PIN, DigitalLevel::High);
        bus.add(PeripheralEntry::new(names::EXTI, EXTI_BASE, 0x400, Box::new(exti)));
        bus.add(PeripheralEntry::new(names::NVIC, NVIC_BASE, 0x400, Box::new(Nvic::new())));
        bus.set_clock_controller(names::RCC);

        Self {
            bus,
            config,
            domain,
            button: DigitalLevel::High,
        }
    }

    pub fn config(&self) -> &McuConfig {
        &self.config
    }

    pub fn backup_domain(&self) -> &Arc<BackupDomain> {
        &self.domain
    }

    pub fn read(&mut self, addr: u64) -> SimResult<u32> {
        self.bus.read_u32(addr)
    }

    pub fn write(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.bus.write_u32(addr, value)
    }

    pub fn modify(&mut self, addr: u64, f: impl FnOnce(u32) -> u32) -> SimResult<()> {
        self.bus.modify_u32(addr, f)
    }

    pub fn set_bits(&mut self, addr: u64, bits: u32) -> SimResult<()> {
        self.modify(addr, |v| v | bits)
    }

    pub fn clear_bits(&mut self, addr: u64, bits: u32) -> SimResult<()> {
        self.modify(addr, |v| v & !bits)
    }

    pub fn is_set(&mut self, addr: u64, bits: u32) -> SimResult<bool> {
        Ok(self.read(addr)? & bits == bits)
    }

    pub fn rtc(&self) -> SimResult<&Rtc> {
        self.bus.peripheral::<Rtc>(names::RTC)
    }

    pub fn uart(&mut self) -> SimResult<&mut Uart> {
        self.bus.peripheral_mut::<Uart>(names::USART2)
    }

    pub fn nvic_mut(&mut self) -> SimResult<&mut Nvic> {
        self.bus.peripheral_mut::<Nvic>(names::NVIC)
    }

    pub fn led(&self) -> DigitalLevel {
        self.bus
            .peripheral::<GpioPort>(names::GPIOA)
            .map(|port| port.pin_level(LED_PIN))
            .unwrap_or_default()
    }

    /// Drives the user button; pressed pulls PC13 low.
    pub fn set_button(&mut self, pressed: bool) {
        self.button = DigitalLevel::from(!pressed);
        if let Ok(port) = self.bus.peripheral_mut::<GpioPort>(names::GPIOC) {
            port.drive_input(BUTTON_PIN, self.button);
        }
    }

    /// Copies the external line levels into EXTI. PC13 feeds line 13 and
    /// the RTC alarm feeds line 17.
    fn route_exti_lines(&mut self) -> SimResult<()> {
        let alarm = DigitalLevel::from(self.rtc()?.alarm_output());
        let exti = self.bus.peripheral_mut::<Exti>(names::EXTI)?;
        exti.set_line_level(BUTTON_PIN, self.button);
        exti.set_line_level(exti::LINE_RTC_ALARM, alarm);
        Ok(())
    }

    /// Advances all peripherals by one millisecond, latches asserted lines
    /// as pending in the NVIC and returns the interrupts ready to be taken.
    pub fn tick(&mut self) -> SimResult<Vec<u32>> {
        self.route_exti_lines()?;
        let asserted = self.bus.tick_peripherals();
        let nvic = self.nvic_mut()?;
        for irq in asserted {
            nvic.set_pending(irq);
        }
        Ok(nvic.active())
    }
}
