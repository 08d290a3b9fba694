// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use futures::FutureExt;

/// Set by wakers; tells the board to poll its task on the next pass.
#[derive(Debug)]
struct WakeFlag(AtomicBool);

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::Release);
    }
}

/// One firmware main loop.
pub struct Task {
    name: String,
    future: Option<BoxFuture<'static, ()>>,
    pending: Arc<WakeFlag>,
    polls: u64,
}

impl Task {
    pub fn new(name: &str, future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            name: name.to_string(),
            future: Some(future.boxed()),
            pending: Arc::new(WakeFlag(AtomicBool::new(true))),
            polls: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.future.is_none()
    }

    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    /// Polls the future once if a waker fired since the last poll.
    /// Returns whether it was polled.
    pub fn poll_if_woken(&mut self) -> bool {
        let Some(future) = self.future.as_mut() else {
            return false;
        };
        if !self.pending.0.swap(false, Ordering::AcqRel) {
            return false;
        }
        let waker = waker_ref(&self.pending);
        let mut cx = Context::from_waker(&waker);
        self.polls += 1;
        if let Poll::Ready(()) = future.as_mut().poll(&mut cx) {
            tracing::debug!("Task '{}' finished after {} polls", self.name, self.polls);
            self.future = None;
        }
        true
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .field("polls", &self.polls)
            .finish()
    }
}
