// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod backup;
pub mod exti;
pub mod gpio;
pub mod nvic;
pub mod pwr;
pub mod rcc;
pub mod rtc;
pub mod uart;

/// `as_any`/`snapshot` boilerplate for models that derive `Serialize`.
macro_rules! impl_any {
    () => {
        fn as_any(&self) -> Option<&dyn std::any::Any> {
            Some(self)
        }
        fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
            Some(self)
        }
        fn snapshot(&self) -> serde_json::Value {
            serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
        }
    };
}

pub(crate) use impl_any;
