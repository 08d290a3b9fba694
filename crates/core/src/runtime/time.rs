// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::lock;

#[derive(Debug, Default)]
struct ClockState {
    now_ms: u64,
    sleepers: Vec<(u64, Waker)>,
}

/// Millisecond time base of one board (the SysTick count).
#[derive(Debug, Clone, Default)]
pub struct Clock {
    state: Arc<Mutex<ClockState>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        lock(&self.state).now_ms
    }

    /// Moves time forward by one tick and wakes every expired delay.
    pub fn advance(&self) -> u64 {
        let expired = {
            let mut state = lock(&self.state);
            state.now_ms += 1;
            let now = state.now_ms;
            let (expired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.sleepers)
                .into_iter()
                .partition(|(deadline, _)| *deadline <= now);
            state.sleepers = waiting;
            expired
        };
        for (_, waker) in &expired {
            waker.wake_by_ref();
        }
        self.now_ms()
    }

    /// Resolves once `ms` ticks have elapsed.
    pub fn delay_ms(&self, ms: u64) -> Delay {
        Delay {
            clock: self.clone(),
            deadline: self.now_ms() + ms,
        }
    }

    /// Gives up the rest of the current tick.
    pub fn yield_now(&self) -> Delay {
        self.delay_ms(1)
    }

    fn register(&self, deadline: u64, waker: &Waker) {
        let mut state = lock(&self.state);
        if let Some(entry) = state
            .sleepers
            .iter_mut()
            .find(|(d, w)| *d == deadline && w.will_wake(waker))
        {
            entry.1 = waker.clone();
        } else {
            state.sleepers.push((deadline, waker.clone()));
        }
    }
}

#[derive(Debug)]
pub struct Delay {
    clock: Clock,
    deadline: u64,
}

impl Future for Delay {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.clock.now_ms() >= self.deadline {
            Poll::Ready(())
        } else {
            self.clock.register(self.deadline, cx.waker());
            Poll::Pending
        }
    }
}
