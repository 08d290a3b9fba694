// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Remembers the previous level of a line and reports transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: DigitalLevel,
}

impl EdgeDetector {
    pub fn new(initial: DigitalLevel) -> Self {
        Self { last: initial }
    }

    pub fn update(&mut self, level: DigitalLevel) -> Option<Edge> {
        let edge = match (self.last, level) {
            (DigitalLevel::Low, DigitalLevel::High) => Some(Edge::Rising),
            (DigitalLevel::High, DigitalLevel::Low) => Some(Edge::Falling),
            _ => None,
        };
        self.last = level;
        edge
    }
}
