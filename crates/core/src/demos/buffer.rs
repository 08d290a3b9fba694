// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;

/// Text both boards send; the receive length is agreed out of band.
pub const PAYLOAD: &[u8] =
    b" ****UART_TwoBoards_ComIT****  ****UART_TwoBoards_ComIT****  ****UART_TwoBoards_ComIT**** ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub index: usize,
    /// What [`buffer_cmp`] reports for this mismatch.
    pub remaining: usize,
}

/// Compares `expected.len()` bytes and returns 0 when they match, otherwise
/// the number of bytes left after the first difference. A difference in the
/// last byte therefore also returns 0; use [`first_mismatch`] to verify.
pub fn buffer_cmp(expected: &[u8], actual: &[u8]) -> usize {
    first_mismatch(expected, actual).map_or(0, |m| m.remaining)
}

/// First differing position; missing bytes in `actual` count as different.
pub fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<Mismatch> {
    let len = expected.len();
    (0..len)
        .find(|&i| actual.get(i) != Some(&expected[i]))
        .map(|index| Mismatch {
            index,
            remaining: len - 1 - index,
        })
}
