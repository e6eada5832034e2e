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

//! Lists detached from their recorder, on their way to execution.

use crate::command::Command;
use crate::list::{ListKind, ListState};
use crate::registry::Outstanding;
use strata_core::api::UniformBufferId;
use strata_core::arena::{CommandArena, MemStack};
use strata_core::context::{CommandContext, ComputeContext, SharedComputeContext};
use strata_core::debug::DebugContext;
use strata_core::CompletionEvent;

/// The context a replay drives.
pub(crate) enum ReplayTarget<'a> {
    Graphics(&'a mut dyn CommandContext),
    Compute(&'a mut dyn ComputeContext),
}

impl ReplayTarget<'_> {
    pub(crate) fn reborrow(&mut self) -> ReplayTarget<'_> {
        match self {
            ReplayTarget::Graphics(ctx) => ReplayTarget::Graphics(&mut **ctx),
            ReplayTarget::Compute(ctx) => ReplayTarget::Compute(&mut **ctx),
        }
    }
}

/// Everything one command needs while it executes.
pub(crate) struct Replay<'a> {
    pub(crate) target: ReplayTarget<'a>,
    pub(crate) scratch: &'a MemStack,
    pub(crate) state: &'a mut ExecutionState,
    pub(crate) compute: Option<&'a SharedComputeContext>,
}

/// State accumulated while one list replays.
#[derive(Debug, Default)]
pub(crate) struct ExecutionState {
    uniform_buffers: Vec<Option<UniformBufferId>>,
    pub(crate) debug: DebugContext,
    pub(crate) nested_commands: usize,
}

impl ExecutionState {
    pub(crate) fn store_uniform_buffer(&mut self, slot: u32, buffer: UniformBufferId) {
        let index = slot as usize;
        if self.uniform_buffers.len() <= index {
            self.uniform_buffers.resize(index + 1, None);
        }
        self.uniform_buffers[index] = Some(buffer);
    }

    #[cfg(test)]
    pub(crate) fn uniform_buffer_slots(&self) -> usize {
        self.uniform_buffers.len()
    }

    pub(crate) fn clear_uniform_buffers(&mut self) {
        self.uniform_buffers.clear();
    }

    pub(crate) fn uniform_buffer(&self, slot: u32) -> UniformBufferId {
        self.uniform_buffers
            .get(slot as usize)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("local uniform buffer {slot} was bound before it was built"))
    }
}

/// Replays every command of `arena` in order against `target`.
pub(crate) fn replay_arena(
    arena: &mut CommandArena<Command>,
    mut target: ReplayTarget<'_>,
    compute: Option<&SharedComputeContext>,
    uid: u32,
) -> usize {
    let mut state = ExecutionState::default();
    let executed = arena.replay(|command, scratch| {
        command.execute(&mut Replay {
            target: target.reborrow(),
            scratch,
            state: &mut state,
            compute,
        });
    });
    if !state.debug.is_balanced() {
        log::warn!(
            "Command list {uid} finished with open debug markers: {}",
            state.debug.current_path()
        );
    }
    executed + state.nested_commands
}

/// A list whose recording has finished, owned by whoever executes it next.
///
/// Executing consumes the list, so a recorded list can never run twice.
pub(crate) struct RecordedList {
    arena: Option<CommandArena<Command>>,
    uid: u32,
    kind: ListKind,
    state: ListState,
    prerequisites: Vec<CompletionEvent>,
    outstanding: Outstanding,
}

impl RecordedList {
    pub(crate) fn new(
        arena: CommandArena<Command>,
        uid: u32,
        kind: ListKind,
        prerequisites: Vec<CompletionEvent>,
        outstanding: Outstanding,
    ) -> Self {
        Self {
            arena: Some(arena),
            uid,
            kind,
            state: ListState::Dispatched,
            prerequisites,
            outstanding,
        }
    }

    pub(crate) fn uid(&self) -> u32 {
        self.uid
    }

    pub(crate) fn kind(&self) -> ListKind {
        self.kind
    }

    pub(crate) fn num_commands(&self) -> usize {
        self.arena.as_ref().map_or(0, CommandArena::num_commands)
    }

    pub(crate) fn used_memory(&self) -> usize {
        self.arena.as_ref().map_or(0, CommandArena::used_memory)
    }

    /// Whether there is nothing to wait for and nothing to replay.
    pub(crate) fn is_empty(&self) -> bool {
        self.num_commands() == 0 && self.prerequisites.is_empty()
    }

    /// Blocks until every dispatch prerequisite has completed.
    pub(crate) fn wait_prerequisites(&mut self) {
        CompletionEvent::wait_all(&std::mem::take(&mut self.prerequisites));
    }

    /// Replays the list and returns the arena to the pool.
    pub(crate) fn execute(
        mut self,
        target: ReplayTarget<'_>,
        compute: Option<&SharedComputeContext>,
    ) -> usize {
        self.wait_prerequisites();
        self.state = ListState::Executing;
        let Some(mut arena) = self.arena.take() else {
            return 0;
        };
        log::trace!(
            "Executing {:?} command list {} ({} commands, {} bytes)",
            self.kind,
            self.uid,
            arena.num_commands(),
            arena.used_memory()
        );
        let executed = replay_arena(&mut arena, target, compute, self.uid);
        self.state = ListState::Executed;
        self.outstanding.registry().release_arena(arena);
        executed
    }
}

impl Drop for RecordedList {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            if arena.num_commands() > 0 {
                log::warn!(
                    "Command list {} dropped in state {:?} with {} commands that never executed",
                    self.uid,
                    self.state,
                    arena.num_commands()
                );
            }
            self.outstanding.registry().release_arena(arena);
        }
    }
}
