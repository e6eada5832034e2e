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

//! The per-list memory arena.
//!
//! A command list owns a [`CommandArena`]: a bump allocator for variable-size
//! payloads ([`MemStack`]) plus an arena-of-slots holding the recorded commands
//! in program order ([`CommandChain`]). Nothing is freed individually; the whole
//! arena is reset once the list has executed and goes back to an [`ArenaPool`].

mod chain;
mod mem_stack;
mod pool;

pub use chain::CommandChain;
pub use mem_stack::{MemStack, ScratchRange, MAX_ALIGNMENT};
pub use pool::{ArenaPool, CommandArena};
