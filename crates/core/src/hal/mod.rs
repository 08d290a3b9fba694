// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Stateful drivers with interrupt-driven transfers and completion
//! callbacks, layered on top of [`crate::ll`].

pub mod uart;

use crate::SimulationError;

#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("peripheral busy")]
    Busy,
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("peripheral not initialized")]
    NotInitialized,
    #[error(transparent)]
    Bus(#[from] SimulationError),
}

pub type HalResult<T> = Result<T, HalError>;
