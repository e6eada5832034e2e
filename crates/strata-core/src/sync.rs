// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! One-shot completion events used as dispatch prerequisites and fences.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    Pending,
    Complete,
    Failed,
}

struct EventInner {
    state: Mutex<EventState>,
    settled: Condvar,
}

/// A cloneable, waitable, one-shot flag.
///
/// All clones observe the same state. An event settles either as complete or,
/// when the work it stands for panicked, as failed; waiting on a failed event
/// panics so the failure reaches the waiting thread.
#[derive(Clone)]
pub struct CompletionEvent {
    inner: Arc<EventInner>,
}

impl CompletionEvent {
    /// Creates a pending event.
    pub fn new() -> Self {
        Self::with_state(EventState::Pending)
    }

    /// Creates an event that is already complete.
    pub fn completed() -> Self {
        Self::with_state(EventState::Complete)
    }

    fn with_state(state: EventState) -> Self {
        Self {
            inner: Arc::new(EventInner {
                state: Mutex::new(state),
                settled: Condvar::new(),
            }),
        }
    }

    /// Marks the event complete and wakes every waiter. Settling twice is a no-op.
    pub fn signal(&self) {
        self.settle(EventState::Complete);
    }

    /// Marks the event failed and wakes every waiter.
    pub fn fail(&self) {
        self.settle(EventState::Failed);
    }

    /// Whether the event completed successfully.
    pub fn is_complete(&self) -> bool {
        *self.state() == EventState::Complete
    }

    /// Whether the event failed.
    pub fn has_failed(&self) -> bool {
        *self.state() == EventState::Failed
    }

    /// Blocks until the event settles.
    ///
    /// # Panics
    ///
    /// Panics if the event failed.
    pub fn wait(&self) {
        let mut state = self.state();
        while *state == EventState::Pending {
            state = self
                .inner
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        assert!(
            *state == EventState::Complete,
            "awaited work panicked before completing"
        );
    }

    /// Blocks until the event settles or `timeout` elapses. Returns whether it completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.state();
        let (state, _) = self
            .inner
            .settled
            .wait_timeout_while(state, timeout, |s| *s == EventState::Pending)
            .unwrap_or_else(PoisonError::into_inner);
        *state == EventState::Complete
    }

    /// Waits for every event in `events`.
    pub fn wait_all(events: &[CompletionEvent]) {
        for event in events {
            event.wait();
        }
    }

    /// A guard that signals the event when dropped, or fails it if dropped
    /// during a panic.
    pub fn guard(&self) -> CompletionGuard {
        CompletionGuard {
            event: self.clone(),
        }
    }

    fn settle(&self, to: EventState) {
        let mut state = self.state();
        if *state == EventState::Pending {
            *state = to;
            self.inner.settled.notify_all();
        }
    }

    fn state(&self) -> MutexGuard<'_, EventState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CompletionEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompletionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionEvent")
            .field("state", &*self.state())
            .finish()
    }
}

/// Settles a [`CompletionEvent`] when dropped.
#[must_use = "the event settles as soon as the guard is dropped"]
pub struct CompletionGuard {
    event: CompletionEvent,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("Work guarded by a completion event panicked; failing the event.");
            self.event.fail();
        } else {
            self.event.signal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_wakes_waiters() {
        let event = CompletionEvent::new();
        let remote = event.clone();
        let handle = thread::spawn(move || {
            remote.wait();
            remote.is_complete()
        });
        thread::sleep(Duration::from_millis(10));
        event.signal();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_timeout_on_pending_event() {
        let event = CompletionEvent::new();
        assert!(!event.wait_timeout(Duration::from_millis(5)));
        assert!(CompletionEvent::completed().wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_settling_is_one_shot() {
        let event = CompletionEvent::new();
        event.signal();
        event.fail();
        assert!(event.is_complete());
        assert!(!event.has_failed());
    }

    #[test]
    fn test_guard_fails_event_on_panic() {
        let event = CompletionEvent::new();
        let guard = event.guard();
        let result = thread::spawn(move || {
            let _guard = guard;
            panic!("translate failed");
        })
        .join();
        assert!(result.is_err());
        assert!(event.has_failed());
    }

    #[test]
    #[should_panic(expected = "awaited work panicked")]
    fn test_waiting_on_failed_event_panics() {
        let event = CompletionEvent::new();
        event.fail();
        event.wait();
    }
}
