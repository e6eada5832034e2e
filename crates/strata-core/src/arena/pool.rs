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

use super::{CommandChain, MemStack};
use crate::config::ArenaConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// The byte stack and command chain owned by one command list.
pub struct CommandArena<T> {
    /// Variable-size payloads referenced by the commands.
    pub scratch: MemStack,
    /// The recorded commands.
    pub chain: CommandChain<T>,
}

impl<T> CommandArena<T> {
    /// Creates an empty arena sized by `config`.
    pub fn new(config: &ArenaConfig) -> Self {
        Self {
            scratch: MemStack::new(config.chunk_size, config.max_bytes),
            chain: CommandChain::new(),
        }
    }

    /// Appends a command.
    pub fn alloc_command(&mut self, command: T) -> u32 {
        self.chain.push(command)
    }

    /// Number of recorded commands.
    pub fn num_commands(&self) -> usize {
        self.chain.len()
    }

    /// Bytes of payload plus the slot storage of the recorded commands.
    pub fn used_memory(&self) -> usize {
        self.scratch.used_bytes() + self.chain.len() * std::mem::size_of::<T>()
    }

    /// Moves every command out in order. `f` gets the payload stack alongside.
    pub fn replay<F: FnMut(T, &MemStack)>(&mut self, mut f: F) -> usize {
        let CommandArena { scratch, chain } = self;
        let scratch: &MemStack = scratch;
        chain.drain_in_order(|command| f(command, scratch))
    }

    /// Drops any commands left and reclaims all payload bytes.
    pub fn reset(&mut self) {
        self.chain.clear();
        self.scratch.reset();
    }
}

/// Reset arenas waiting to be handed to the next command list.
pub struct ArenaPool<T> {
    free: Mutex<Vec<CommandArena<T>>>,
    config: ArenaConfig,
    created: AtomicUsize,
}

impl<T> ArenaPool<T> {
    /// Creates an empty pool.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            config,
            created: AtomicUsize::new(0),
        }
    }

    /// Takes a reset arena from the pool, or creates one.
    pub fn acquire(&self) -> CommandArena<T> {
        let pooled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        pooled.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            CommandArena::new(&self.config)
        })
    }

    /// Resets `arena` and keeps it for reuse, up to the configured pool size.
    pub fn release(&self, mut arena: CommandArena<T>) {
        arena.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.config.pooled_arenas {
            free.push(arena);
        }
    }

    /// Arenas currently waiting in the pool.
    pub fn pooled(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Arenas created since the pool was built.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// The sizing every arena of this pool uses.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ScratchRange;

    #[test]
    fn test_replay_hands_out_payloads() {
        let mut arena: CommandArena<(usize, ScratchRange)> =
            CommandArena::new(&ArenaConfig::default());
        for i in 0..3 {
            let range = arena.scratch.alloc_copy(&[i as u8; 4], 4);
            arena.alloc_command((i, range));
        }
        assert_eq!(arena.num_commands(), 3);

        let mut payloads = Vec::new();
        let replayed = arena.replay(|(i, range), scratch| {
            payloads.push((i, scratch.bytes(range).to_vec()));
        });
        assert_eq!(replayed, 3);
        assert_eq!(payloads[2], (2, vec![2; 4]));
    }

    #[test]
    fn test_pool_reuses_released_arenas() {
        let pool: ArenaPool<u32> = ArenaPool::new(ArenaConfig {
            pooled_arenas: 1,
            ..Default::default()
        });
        let mut first = pool.acquire();
        first.alloc_command(7);
        first.scratch.alloc(128, 8);
        let second = pool.acquire();
        assert_eq!(pool.created(), 2);

        pool.release(first);
        pool.release(second);
        assert_eq!(pool.pooled(), 1);

        let reused = pool.acquire();
        assert_eq!(reused.num_commands(), 0);
        assert_eq!(reused.scratch.used_bytes(), 0);
        assert_eq!(pool.created(), 2);
    }
}
