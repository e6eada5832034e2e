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

//! Bookkeeping for outstanding buffer locks.

use crate::api::{BufferId, LockMode};

/// Parameters of one outstanding lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockParams {
    /// The locked buffer.
    pub buffer: BufferId,
    /// Byte offset of the locked range.
    pub offset: u64,
    /// Size of the locked range.
    pub size: u64,
    /// How the buffer is accessed.
    pub mode: LockMode,
}

/// Tracks buffers locked through the immediate command list.
///
/// Each buffer may be locked once at a time. Unlocking must name a locked buffer.
#[derive(Debug, Default)]
pub struct LockTracker {
    outstanding: Vec<LockParams>,
    total_memory_outstanding: u64,
}

impl LockTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lock.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already locked.
    pub fn lock(&mut self, params: LockParams) {
        assert!(
            !self.is_locked(params.buffer),
            "buffer {:?} is already locked",
            params.buffer
        );
        if params.mode == LockMode::WriteOnly {
            self.total_memory_outstanding += params.size;
        }
        self.outstanding.push(params);
    }

    /// Removes the lock on `buffer` and returns its parameters.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is not locked.
    pub fn unlock(&mut self, buffer: BufferId) -> LockParams {
        let Some(index) = self.outstanding.iter().position(|l| l.buffer == buffer) else {
            panic!("mismatched buffer lock: {buffer:?} is not locked");
        };
        let params = self.outstanding.swap_remove(index);
        if params.mode == LockMode::WriteOnly {
            self.total_memory_outstanding -= params.size;
        }
        params
    }

    /// Whether `buffer` is currently locked.
    pub fn is_locked(&self, buffer: BufferId) -> bool {
        self.outstanding.iter().any(|l| l.buffer == buffer)
    }

    /// Number of outstanding locks.
    pub fn outstanding_locks(&self) -> usize {
        self.outstanding.len()
    }

    /// Staging bytes held by outstanding write locks.
    pub fn total_memory_outstanding(&self) -> u64 {
        self.total_memory_outstanding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_lock(buffer: u64, size: u64) -> LockParams {
        LockParams {
            buffer: BufferId(buffer),
            offset: 0,
            size,
            mode: LockMode::WriteOnly,
        }
    }

    #[test]
    fn test_lock_unlock_tracks_memory() {
        let mut tracker = LockTracker::new();
        tracker.lock(write_lock(1, 256));
        tracker.lock(write_lock(2, 64));
        tracker.lock(LockParams {
            mode: LockMode::ReadOnly,
            ..write_lock(3, 1024)
        });
        assert_eq!(tracker.total_memory_outstanding(), 320);
        assert_eq!(tracker.outstanding_locks(), 3);

        let params = tracker.unlock(BufferId(1));
        assert_eq!(params.size, 256);
        assert_eq!(tracker.total_memory_outstanding(), 64);
        assert!(!tracker.is_locked(BufferId(1)));
    }

    #[test]
    #[should_panic(expected = "already locked")]
    fn test_double_lock_is_fatal() {
        let mut tracker = LockTracker::new();
        tracker.lock(write_lock(1, 16));
        tracker.lock(write_lock(1, 16));
    }

    #[test]
    #[should_panic(expected = "mismatched buffer lock")]
    fn test_unlock_without_lock_is_fatal() {
        LockTracker::new().unlock(BufferId(9));
    }
}
