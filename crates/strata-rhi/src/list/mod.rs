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

//! Command lists: recording, validation and in-place replay.

mod compute;
mod graphics;
mod pending;
mod pso;

pub use compute::{ComputeCommandList, ComputeCommands, LocalUniformBuffer};
pub use graphics::{CommandList, GraphicsCommands};
pub use pending::{AsyncCommandList, PendingCommandList};
pub(crate) use pending::async_pair;
pub(crate) use pso::PsoContext;

use crate::command::{pack_transitions, Command};
use crate::recorded::{replay_arena, ExecutionState, RecordedList, Replay, ReplayTarget};
use crate::registry::{ListRegistry, Outstanding};
use std::sync::Arc;
use strata_core::api::TransitionInfo;
use strata_core::arena::{CommandArena, ScratchRange};
use strata_core::context::{
    lock_context, CommandContext, ComputeContext, SharedCommandContext, SharedComputeContext,
};
use strata_core::CompletionEvent;

/// Which queue a list records for and whether it is one of the executor's
/// long-lived immediate lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// A graphics list created by a caller.
    Regular,
    /// A compute list created by a caller.
    Compute,
    /// The executor's immediate graphics list.
    Immediate,
    /// The executor's immediate async compute list.
    ImmediateAsyncCompute,
}

impl ListKind {
    /// Whether this is one of the executor's immediate lists.
    pub fn is_immediate(self) -> bool {
        matches!(self, ListKind::Immediate | ListKind::ImmediateAsyncCompute)
    }

    /// Whether the list replays on the async compute queue.
    pub fn is_compute(self) -> bool {
        matches!(self, ListKind::Compute | ListKind::ImmediateAsyncCompute)
    }
}

/// Lifecycle of a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListState {
    /// Accepting commands.
    Recording,
    /// Handed to the executor, waiting to replay.
    Dispatched,
    /// Replaying.
    Executing,
    /// Replayed. Must be reset before recording again.
    Executed,
}

/// The back-end contexts a list forwards to in bypass mode.
#[derive(Clone, Default)]
pub(crate) struct ContextBinding {
    pub(crate) graphics: Option<SharedCommandContext>,
    pub(crate) compute: Option<SharedComputeContext>,
}

/// State shared by every kind of command list.
///
/// Lists expose it through `Deref` for inspection; recording goes through the
/// [`ComputeCommands`] and [`GraphicsCommands`] traits.
pub struct CommandListBase {
    arena: Option<CommandArena<Command>>,
    uid: u32,
    kind: ListKind,
    state: ListState,
    bypass: bool,
    binding: ContextBinding,
    inside_render_pass: bool,
    inside_compute_pass: bool,
    pso: PsoContext,
    prerequisites: Vec<CompletionEvent>,
    next_local_uniform: u32,
    bypass_state: ExecutionState,
    outstanding: Outstanding,
}

impl CommandListBase {
    pub(crate) fn new(
        registry: &Arc<ListRegistry>,
        kind: ListKind,
        binding: ContextBinding,
        bypass: bool,
    ) -> Self {
        Self {
            arena: Some(registry.acquire_arena()),
            uid: registry.next_uid(),
            kind,
            state: ListState::Recording,
            bypass,
            binding,
            inside_render_pass: false,
            inside_compute_pass: false,
            pso: PsoContext::default(),
            prerequisites: Vec::new(),
            next_local_uniform: 0,
            bypass_state: ExecutionState::default(),
            outstanding: Outstanding::register(registry),
        }
    }

    /// The list's unique id. Changes on every reset.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// What kind of list this is.
    pub fn kind(&self) -> ListKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListState {
        self.state
    }

    /// Number of recorded commands.
    pub fn num_commands(&self) -> usize {
        self.arena.as_ref().map_or(0, CommandArena::num_commands)
    }

    /// Whether any command is waiting to execute.
    pub fn has_commands(&self) -> bool {
        self.num_commands() > 0
    }

    /// Arena bytes in use.
    pub fn used_memory(&self) -> usize {
        self.arena.as_ref().map_or(0, CommandArena::used_memory)
    }

    /// Whether calls go straight to the back end.
    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// Whether this is one of the executor's immediate lists.
    pub fn is_immediate(&self) -> bool {
        self.kind.is_immediate()
    }

    /// Whether a render pass is open.
    pub fn is_inside_render_pass(&self) -> bool {
        self.inside_render_pass
    }

    /// Whether a compute pass is open.
    pub fn is_inside_compute_pass(&self) -> bool {
        self.inside_compute_pass
    }

    /// Names of the recorded commands, in order.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.arena
            .as_ref()
            .map(|arena| arena.chain.iter().map(Command::name).collect())
            .unwrap_or_default()
    }

    pub(crate) fn submit(&mut self, command: Command) {
        assert!(
            self.state == ListState::Recording,
            "cannot record {} into command list {} while it is {:?}; reset it first",
            command.name(),
            self.uid,
            self.state
        );
        if self.bypass {
            self.execute_bypassed(command);
        } else {
            self.arena_mut().alloc_command(command);
        }
    }

    fn execute_bypassed(&mut self, command: Command) {
        let uid = self.uid;
        let arena = self
            .arena
            .as_mut()
            .expect("command list owns an arena while recording");
        let state = &mut self.bypass_state;
        let binding = &self.binding;
        match (self.kind.is_compute(), &binding.compute) {
            (true, Some(slot)) => {
                let mut ctx = lock_context(slot);
                command.execute(&mut Replay {
                    target: ReplayTarget::Compute(&mut **ctx),
                    scratch: &arena.scratch,
                    state,
                    compute: None,
                });
            }
            _ => {
                let Some(slot) = binding.graphics.as_ref() else {
                    panic!("command list {uid} is in bypass mode without a bound context");
                };
                let mut ctx = lock_context(slot);
                command.execute(&mut Replay {
                    target: ReplayTarget::Graphics(&mut **ctx),
                    scratch: &arena.scratch,
                    state,
                    compute: binding.compute.as_ref(),
                });
            }
        }
        if arena.num_commands() == 0 {
            arena.scratch.reset();
        }
    }

    pub(crate) fn alloc_copy(&mut self, data: &[u8], align: usize) -> ScratchRange {
        self.arena_mut().scratch.alloc_copy(data, align)
    }

    pub(crate) fn alloc_str(&mut self, text: &str) -> ScratchRange {
        self.arena_mut().scratch.alloc_str(text)
    }

    pub(crate) fn alloc_transitions(&mut self, transitions: &[TransitionInfo]) -> ScratchRange {
        pack_transitions(&mut self.arena_mut().scratch, transitions)
    }

    pub(crate) fn next_local_uniform_slot(&mut self) -> u32 {
        let slot = self.next_local_uniform;
        self.next_local_uniform += 1;
        slot
    }

    pub(crate) fn pso_mut(&mut self) -> &mut PsoContext {
        &mut self.pso
    }

    pub(crate) fn pso(&self) -> &PsoContext {
        &self.pso
    }

    pub(crate) fn set_inside_render_pass(&mut self, inside: bool) {
        self.inside_render_pass = inside;
    }

    pub(crate) fn set_inside_compute_pass(&mut self, inside: bool) {
        self.inside_compute_pass = inside;
    }

    pub(crate) fn assert_outside_render_pass(&self, operation: &str) {
        assert!(
            !self.inside_render_pass,
            "{operation} is not allowed inside a render pass"
        );
    }

    pub(crate) fn add_prerequisite(&mut self, event: CompletionEvent) {
        self.prerequisites.push(event);
    }

    pub(crate) fn has_prerequisites(&self) -> bool {
        !self.prerequisites.is_empty()
    }

    pub(crate) fn take_prerequisites(&mut self) -> Vec<CompletionEvent> {
        std::mem::take(&mut self.prerequisites)
    }

    pub(crate) fn registry(&self) -> &Arc<ListRegistry> {
        self.outstanding.registry()
    }

    /// Switches bypass on or off. Only legal while nothing is recorded.
    pub(crate) fn set_bypass(&mut self, bypass: bool) {
        assert!(
            !self.has_commands(),
            "cannot change bypass mode of command list {} with recorded commands",
            self.uid
        );
        self.bypass = bypass;
    }

    /// Detaches the recorded work and keeps recording into a fresh arena under a new UID.
    pub(crate) fn swap_out(&mut self) -> RecordedList {
        let registry = Arc::clone(self.registry());
        let arena = std::mem::replace(self.arena_mut(), registry.acquire_arena());
        let recorded = RecordedList::new(
            arena,
            self.uid,
            self.kind,
            self.take_prerequisites(),
            Outstanding::register(&registry),
        );
        self.uid = registry.next_uid();
        self.next_local_uniform = 0;
        self.bypass_state = ExecutionState::default();
        recorded
    }

    #[cfg(test)]
    pub(crate) fn local_uniform_usage(&self) -> (u32, usize) {
        (self.next_local_uniform, self.bypass_state.uniform_buffer_slots())
    }

    /// Starts a new bypass generation: local uniform buffers built so far can
    /// no longer be bound and their slots are reused.
    pub(crate) fn recycle_bypass_state(&mut self) {
        if !self.bypass {
            return;
        }
        self.uid = self.registry().next_uid();
        self.next_local_uniform = 0;
        self.bypass_state.clear_uniform_buffers();
    }

    /// Consumes the list into its recorded form.
    pub(crate) fn into_recorded(mut self) -> RecordedList {
        assert!(
            self.state == ListState::Recording,
            "command list {} was already executed; reset it before executing it again",
            self.uid
        );
        let registry = Arc::clone(self.registry());
        let arena = self
            .arena
            .take()
            .unwrap_or_else(|| registry.acquire_arena());
        RecordedList::new(
            arena,
            self.uid,
            self.kind,
            self.take_prerequisites(),
            Outstanding::register(&registry),
        )
    }

    pub(crate) fn execute_graphics_in_place(&mut self, ctx: &mut dyn CommandContext) {
        self.execute_in_place(ReplayTarget::Graphics(ctx), None);
    }

    pub(crate) fn execute_compute_in_place(&mut self, ctx: &mut dyn ComputeContext) {
        self.execute_in_place(ReplayTarget::Compute(ctx), None);
    }

    fn execute_in_place(
        &mut self,
        target: ReplayTarget<'_>,
        compute: Option<&SharedComputeContext>,
    ) {
        assert!(
            self.state != ListState::Executed,
            "command list {} executed twice without an intervening reset",
            self.uid
        );
        self.state = ListState::Executing;
        CompletionEvent::wait_all(&self.take_prerequisites());
        let uid = self.uid;
        let executed = replay_arena(self.arena_mut(), target, compute, uid);
        log::trace!("Executed command list {uid} in place ({executed} commands)");
        self.state = ListState::Executed;
    }

    /// Reclaims the arena and returns the list to recording under a new UID.
    pub(crate) fn reset(&mut self) {
        let uid = self.registry().next_uid();
        self.arena_mut().reset();
        self.uid = uid;
        self.state = ListState::Recording;
        self.inside_render_pass = false;
        self.inside_compute_pass = false;
        self.pso = PsoContext::default();
        self.prerequisites.clear();
        self.next_local_uniform = 0;
        self.bypass_state = ExecutionState::default();
    }

    fn arena_mut(&mut self) -> &mut CommandArena<Command> {
        self.arena
            .as_mut()
            .expect("command list owns an arena while recording")
    }
}

impl Drop for CommandListBase {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            if self.state == ListState::Recording && arena.num_commands() > 0 {
                log::warn!(
                    "Command list {} dropped with {} commands that never executed",
                    self.uid,
                    arena.num_commands()
                );
            }
            self.outstanding.registry().release_arena(arena);
        }
    }
}

impl std::fmt::Debug for CommandListBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandListBase")
            .field("uid", &self.uid)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("bypass", &self.bypass)
            .field("num_commands", &self.num_commands())
            .finish()
    }
}
