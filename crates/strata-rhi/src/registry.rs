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

//! Shared bookkeeping for every command list of one executor.

use crate::command::Command;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::arena::{ArenaPool, CommandArena};
use strata_core::ArenaConfig;

/// Hands out list UIDs and arenas, and counts the lists that are alive.
///
/// Every command list, recorded list in flight and pending async list holds a
/// registration; the count drops back when it is executed or dropped.
pub struct ListRegistry {
    next_uid: AtomicU32,
    outstanding: AtomicUsize,
    arenas: ArenaPool<Command>,
}

impl ListRegistry {
    /// Creates a registry whose arenas follow `config`.
    pub fn new(config: ArenaConfig) -> Arc<Self> {
        Arc::new(Self {
            next_uid: AtomicU32::new(1),
            outstanding: AtomicUsize::new(0),
            arenas: ArenaPool::new(config),
        })
    }

    /// Number of command lists currently alive.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Reset arenas waiting for reuse.
    pub fn pooled_arenas(&self) -> usize {
        self.arenas.pooled()
    }

    /// Arenas created so far.
    pub fn created_arenas(&self) -> usize {
        self.arenas.created()
    }

    pub(crate) fn next_uid(&self) -> u32 {
        self.next_uid.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn acquire_arena(&self) -> CommandArena<Command> {
        self.arenas.acquire()
    }

    pub(crate) fn release_arena(&self, arena: CommandArena<Command>) {
        self.arenas.release(arena);
    }
}

impl std::fmt::Debug for ListRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListRegistry")
            .field("outstanding", &self.outstanding())
            .field("pooled_arenas", &self.pooled_arenas())
            .finish()
    }
}

/// One registration in the outstanding-list count.
pub(crate) struct Outstanding {
    registry: Arc<ListRegistry>,
}

impl Outstanding {
    pub(crate) fn register(registry: &Arc<ListRegistry>) -> Self {
        registry.outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            registry: Arc::clone(registry),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<ListRegistry> {
        &self.registry
    }
}

impl Drop for Outstanding {
    fn drop(&mut self) {
        self.registry.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}
