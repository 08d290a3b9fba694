// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::future::poll_fn;
use std::sync::{Arc, Mutex};
use std::task::Poll;

use futures::task::AtomicWaker;
use serde::Serialize;

use crate::hal::uart::UartErrorFlags;
use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Reset,
    Pending,
    Complete,
    Error(UartErrorFlags),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("a transfer is already pending")]
    AlreadyPending,
    #[error("transfer failed: {0:?}")]
    Failed(UartErrorFlags),
    #[error("signal was never armed")]
    NotArmed,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<TransferState>,
    waker: AtomicWaker,
}

/// Completion flag shared by an interrupt handler and the main task.
///
/// The main side arms it before starting a transfer and consumes the result;
/// the interrupt side only ever moves it out of `Pending`.
#[derive(Debug, Clone, Default)]
pub struct TransferSignal {
    inner: Arc<Inner>,
}

impl TransferSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransferState {
        *lock(&self.inner.state)
    }

    pub fn arm(&self) -> Result<(), TransferError> {
        let mut state = lock(&self.inner.state);
        if *state == TransferState::Pending {
            return Err(TransferError::AlreadyPending);
        }
        *state = TransferState::Pending;
        Ok(())
    }

    pub fn complete(&self) {
        self.settle(TransferState::Complete);
    }

    pub fn fail(&self, errors: UartErrorFlags) {
        self.settle(TransferState::Error(errors));
    }

    fn settle(&self, outcome: TransferState) {
        {
            let mut state = lock(&self.inner.state);
            if *state != TransferState::Pending {
                tracing::warn!("TransferSignal: {:?} while {:?}, ignored", outcome, *state);
                return;
            }
            *state = outcome;
        }
        self.inner.waker.wake();
    }

    /// Consumes a settled outcome and returns the signal to `Reset`.
    /// `None` while the transfer is still pending or nothing was armed.
    pub fn try_take(&self) -> Option<Result<(), TransferError>> {
        let mut state = lock(&self.inner.state);
        let outcome = match *state {
            TransferState::Complete => Ok(()),
            TransferState::Error(errors) => Err(TransferError::Failed(errors)),
            TransferState::Reset | TransferState::Pending => return None,
        };
        *state = TransferState::Reset;
        Some(outcome)
    }

    /// Waits for the armed transfer to settle, then resets the signal.
    pub async fn wait(&self) -> Result<(), TransferError> {
        poll_fn(|cx| {
            self.inner.waker.register(cx.waker());
            if let Some(outcome) = self.try_take() {
                return Poll::Ready(outcome);
            }
            match self.state() {
                TransferState::Pending => Poll::Pending,
                _ => Poll::Ready(Err(TransferError::NotArmed)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_arm_twice_is_rejected() {
        let signal = TransferSignal::new();
        signal.arm().unwrap();
        assert_eq!(signal.arm(), Err(TransferError::AlreadyPending));
        signal.complete();
        assert_eq!(signal.try_take(), Some(Ok(())));
        assert_eq!(signal.state(), TransferState::Reset);
        signal.arm().unwrap();
    }

    #[test]
    fn test_wait_resolves_after_complete() {
        let signal = TransferSignal::new();
        signal.arm().unwrap();
        let mut wait = Box::pin(signal.wait());
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(wait.poll_unpin(&mut cx).is_pending());

        signal.complete();
        assert_eq!(wait.poll_unpin(&mut cx), Poll::Ready(Ok(())));
    }

    #[test]
    fn test_error_is_reported_once() {
        let signal = TransferSignal::new();
        signal.arm().unwrap();
        signal.fail(UartErrorFlags::FRAMING);
        signal.complete();
        assert_eq!(
            signal.wait().now_or_never(),
            Some(Err(TransferError::Failed(UartErrorFlags::FRAMING)))
        );
        assert_eq!(signal.try_take(), None);
    }

    #[test]
    fn test_wait_without_arm() {
        let signal = TransferSignal::new();
        assert_eq!(
            signal.wait().now_or_never(),
            Some(Err(TransferError::NotArmed))
        );
    }
}
