// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;

use super::led;
use crate::board::{BoardContext, Phase};
use crate::hal::uart::UartErrorFlags;
use crate::hal::HalError;
use crate::runtime::TransferError;
use crate::wait::WaitTimeout;
use crate::SimulationError;

/// LED half-periods in milliseconds.
pub mod blink {
    pub const FAST: u64 = 200;
    pub const SLOW: u64 = 500;
    pub const ERROR: u64 = 1000;
}

/// Why a demo stopped in its terminal error state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Fault {
    #[error("driver rejected the request: {reason}")]
    Rejected { reason: String },
    #[error("transfer error {errors:?}")]
    Transfer { errors: UartErrorFlags },
    #[error("received payload differs at byte {index} ({remaining} bytes left)")]
    Mismatch { index: usize, remaining: usize },
    #[error("timed out waiting for {what} after {polls} polls")]
    Timeout { what: String, polls: u32 },
    #[error("bus error: {reason}")]
    Bus { reason: String },
}

impl From<SimulationError> for Fault {
    fn from(e: SimulationError) -> Self {
        Fault::Bus {
            reason: e.to_string(),
        }
    }
}

impl From<HalError> for Fault {
    fn from(e: HalError) -> Self {
        match e {
            HalError::Bus(e) => e.into(),
            other => Fault::Rejected {
                reason: other.to_string(),
            },
        }
    }
}

impl From<TransferError> for Fault {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Failed(errors) => Fault::Transfer { errors },
            other => Fault::Rejected {
                reason: other.to_string(),
            },
        }
    }
}

impl From<WaitTimeout> for Fault {
    fn from(e: WaitTimeout) -> Self {
        Fault::Timeout {
            what: e.what.to_string(),
            polls: e.polls,
        }
    }
}

/// Records the fault, then keeps the LED toggling every `period` ms.
/// Never returns.
pub async fn blink_forever(ctx: &BoardContext, fault: Fault, period: u64) {
    tracing::error!("{}: {}", ctx.name(), fault);
    ctx.set_phase(Phase::Fail(fault));
    loop {
        if let Err(e) = ctx.with_mcu(led::toggle) {
            tracing::warn!("{}: LED toggle failed: {}", ctx.name(), e);
        }
        ctx.clock().delay_ms(period).await;
    }
}

/// Error handler of the interrupt-driven demos: LED on, then a 1 Hz blink
/// starting with an immediate toggle.
pub async fn error_handler(ctx: &BoardContext, fault: Fault) {
    if let Err(e) = ctx.with_mcu(led::on) {
        tracing::warn!("{}: LED on failed: {}", ctx.name(), e);
    }
    blink_forever(ctx, fault, blink::ERROR).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Firmware};
    use crate::mcu::McuConfig;
    use crate::signals::DigitalLevel;
    use crate::world::World;
    use futures::FutureExt;
    use std::sync::Arc;

    fn failing() -> Firmware {
        Arc::new(|ctx: BoardContext| {
            async move {
                let _ = ctx.with_mcu(led::init);
                let fault = Fault::Bus {
                    reason: "test".into(),
                };
                error_handler(&ctx, fault).await
            }
            .boxed()
        })
    }

    #[test]
    fn test_error_handler_records_fault_and_toggles_at_once() {
        let mut world = World::new("w");
        world.add_board(Board::new("a", McuConfig::default(), failing()));

        world.run_for(1).unwrap();
        let board = world.board("a").unwrap();
        assert!(matches!(board.status().phase, Phase::Fail(Fault::Bus { .. })));
        assert_eq!(board.led(), DigitalLevel::Low);

        world.run_for(blink::ERROR - 1).unwrap();
        assert_eq!(world.board("a").unwrap().led(), DigitalLevel::Low);

        world.run_for(1).unwrap();
        let board = world.board("a").unwrap();
        assert_eq!(board.led(), DigitalLevel::High);
        assert_eq!(board.led_transitions().last().map(|t| t.at_ms), Some(blink::ERROR));
    }

    #[test]
    fn test_conversions_pick_fault_class() {
        assert_eq!(
            Fault::from(TransferError::Failed(UartErrorFlags::OVERRUN)),
            Fault::Transfer {
                errors: UartErrorFlags::OVERRUN
            }
        );
        assert!(matches!(
            Fault::from(HalError::Busy),
            Fault::Rejected { .. }
        ));
        assert!(matches!(
            Fault::from(HalError::Bus(SimulationError::Unaligned(2))),
            Fault::Bus { .. }
        ));
        assert_eq!(
            Fault::from(WaitTimeout {
                what: "INITF",
                polls: 1000
            }),
            Fault::Timeout {
                what: "INITF".into(),
                polls: 1000
            }
        );
    }

    #[test]
    fn test_fault_serializes_with_class_tag() {
        let json = serde_json::to_value(Fault::Mismatch {
            index: 3,
            remaining: 86,
        })
        .unwrap();
        assert_eq!(json["class"], "mismatch");
        assert_eq!(json["remaining"], 86);
    }
}
