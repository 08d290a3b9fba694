// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Polling with an iteration budget, one poll per tick.

use crate::runtime::Clock;

/// Polling budgets, in SysTick periods.
pub mod timeouts {
    pub const LSI: u32 = 2;
    pub const LSE: u32 = 5000;
    pub const RTC: u32 = 1000;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{what} not reached after {polls} polls")]
pub struct WaitTimeout {
    pub what: &'static str,
    pub polls: u32,
}

/// Waits for a condition, giving up after `limit` failed polls.
/// `None` waits forever.
#[derive(Debug, Clone)]
pub struct BoundedWait {
    clock: Clock,
    what: &'static str,
    limit: Option<u32>,
}

impl BoundedWait {
    pub fn new(clock: &Clock, what: &'static str, limit: Option<u32>) -> Self {
        Self {
            clock: clock.clone(),
            what,
            limit,
        }
    }

    pub fn unbounded(clock: &Clock, what: &'static str) -> Self {
        Self::new(clock, what, None)
    }

    /// Budget only when `enabled`, mirroring builds with timeout checks off.
    pub fn checked(clock: &Clock, what: &'static str, enabled: bool, limit: u32) -> Self {
        Self::new(clock, what, enabled.then_some(limit))
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Polls a fallible predicate until it holds. Returns the number of
    /// failed polls before success.
    pub async fn try_until<E, F>(&self, mut predicate: F) -> Result<u32, E>
    where
        F: FnMut() -> Result<bool, E>,
        E: From<WaitTimeout>,
    {
        let mut polls = 0;
        loop {
            if predicate()? {
                return Ok(polls);
            }
            polls += 1;
            if self.limit.is_some_and(|limit| polls >= limit) {
                tracing::warn!("Wait for {} timed out after {} polls", self.what, polls);
                return Err(WaitTimeout {
                    what: self.what,
                    polls,
                }
                .into());
            }
            self.clock.yield_now().await;
        }
    }

    pub async fn until<F>(&self, mut predicate: F) -> Result<u32, WaitTimeout>
    where
        F: FnMut() -> bool,
    {
        self.try_until(|| Ok::<_, WaitTimeout>(predicate())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Task;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn run(clock: &Clock, task: &mut Task, ticks: usize) {
        for _ in 0..ticks {
            task.poll_if_woken();
            clock.advance();
        }
    }

    #[test]
    fn test_gives_up_after_exact_poll_count() {
        let clock = Clock::new();
        let result = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU32::new(0));

        let wait = BoundedWait::new(&clock, "LSERDY", Some(timeouts::LSE));
        let (r, c) = (result.clone(), calls.clone());
        let mut task = Task::new("wait", async move {
            let outcome = wait
                .until(|| {
                    c.fetch_add(1, Ordering::Relaxed);
                    false
                })
                .await;
            *r.lock().unwrap() = Some(outcome);
        });

        run(&clock, &mut task, 6000);
        assert!(task.is_finished());
        assert_eq!(calls.load(Ordering::Relaxed), timeouts::LSE);
        assert_eq!(
            *result.lock().unwrap(),
            Some(Err(WaitTimeout {
                what: "LSERDY",
                polls: timeouts::LSE
            }))
        );
    }

    #[test]
    fn test_returns_failed_polls_on_success() {
        let clock = Clock::new();
        let result = Arc::new(Mutex::new(None));
        let wait = BoundedWait::unbounded(&clock, "flag");
        let (r, c) = (result.clone(), clock.clone());
        let mut task = Task::new("wait", async move {
            let outcome = wait.until(|| c.now_ms() >= 3).await;
            *r.lock().unwrap() = Some(outcome);
        });

        run(&clock, &mut task, 10);
        assert_eq!(*result.lock().unwrap(), Some(Ok(3)));
    }

    #[test]
    fn test_checked_disabled_is_unbounded() {
        let clock = Clock::new();
        assert_eq!(BoundedWait::checked(&clock, "x", false, 2).limit(), None);
        assert_eq!(BoundedWait::checked(&clock, "x", true, 2).limit(), Some(2));
    }
}
