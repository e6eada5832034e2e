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

//! Execution counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of what the executor has replayed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Immediate and immediate async-compute lists replayed.
    pub immediate_lists_executed: u64,
    /// Other lists replayed at top level.
    pub lists_executed: u64,
    /// Commands replayed, sub-lists included.
    pub commands_executed: u64,
    /// Arena bytes of the replayed lists.
    pub bytes_replayed: u64,
    /// Batches handed to parallel translate workers.
    pub parallel_batches: u64,
    /// Command lists alive at the time of the snapshot.
    pub outstanding_lists: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    immediate_lists: AtomicU64,
    lists: AtomicU64,
    commands: AtomicU64,
    bytes: AtomicU64,
    parallel_batches: AtomicU64,
}

impl StatCounters {
    pub(crate) fn record_list(&self, immediate: bool, commands: usize, bytes: usize) {
        if immediate {
            self.immediate_lists.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lists.fetch_add(1, Ordering::Relaxed);
        }
        self.commands.fetch_add(commands as u64, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_parallel_batches(&self, batches: usize) {
        self.parallel_batches
            .fetch_add(batches as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, outstanding_lists: usize) -> ExecutorStats {
        ExecutorStats {
            immediate_lists_executed: self.immediate_lists.load(Ordering::Relaxed),
            lists_executed: self.lists.load(Ordering::Relaxed),
            commands_executed: self.commands.load(Ordering::Relaxed),
            bytes_replayed: self.bytes.load(Ordering::Relaxed),
            parallel_batches: self.parallel_batches.load(Ordering::Relaxed),
            outstanding_lists,
        }
    }
}
