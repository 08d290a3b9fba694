// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::board::SharedMcu;
use crate::lock;
use crate::peripherals::uart::Frame;
use crate::SimResult;

/// Trait for virtual interconnects between boards.
pub trait Interconnect: Send {
    /// Moves whatever crossed the link during the current tick.
    fn tick(&mut self) -> SimResult<()>;
}

/// Null-modem cable between the USART2 ports of two boards (TX of one
/// wired to RX of the other, common ground).
pub struct UartCrossLink {
    pub node_a: String,
    pub node_b: String,
    a: SharedMcu,
    b: SharedMcu,
    /// Index of an a-to-b character whose bits get inverted on the way.
    corrupt_byte: Option<usize>,
    a_to_b: usize,
    b_to_a: usize,
}

impl UartCrossLink {
    pub fn new(node_a: &str, a: SharedMcu, node_b: &str, b: SharedMcu) -> Self {
        Self {
            node_a: node_a.to_string(),
            node_b: node_b.to_string(),
            a,
            b,
            corrupt_byte: None,
            a_to_b: 0,
            b_to_a: 0,
        }
    }

    pub fn with_corrupt_byte(mut self, index: Option<usize>) -> Self {
        self.corrupt_byte = index;
        self
    }

    /// Characters carried so far as (a to b, b to a).
    pub fn carried(&self) -> (usize, usize) {
        (self.a_to_b, self.b_to_a)
    }

    fn corrupt(&self, mut frame: Frame, index: usize) -> Frame {
        if self.corrupt_byte == Some(index) {
            tracing::debug!(
                "{} -> {}: corrupting character {} ({:#04x})",
                self.node_a,
                self.node_b,
                index,
                frame.data
            );
            frame.data ^= 0xFF;
        }
        frame
    }
}

impl Interconnect for UartCrossLink {
    fn tick(&mut self) -> SimResult<()> {
        let from_a = lock(&self.a).uart()?.take_tx_frames();
        let from_b = lock(&self.b).uart()?.take_tx_frames();

        if !from_a.is_empty() {
            let frames: Vec<Frame> = from_a
                .into_iter()
                .enumerate()
                .map(|(i, f)| self.corrupt(f, self.a_to_b + i))
                .collect();
            self.a_to_b += frames.len();
            let mut b = lock(&self.b);
            let uart = b.uart()?;
            for frame in frames {
                uart.receive_frame(frame);
            }
        }

        if !from_b.is_empty() {
            self.b_to_a += from_b.len();
            let mut a = lock(&self.a);
            let uart = a.uart()?;
            for frame in from_b {
                uart.receive_frame(frame);
            }
        }
        Ok(())
    }
}
