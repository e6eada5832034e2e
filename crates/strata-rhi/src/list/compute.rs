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

//! The compute recording surface, shared by every list kind.

use super::{CommandListBase, ContextBinding, ListKind};
use crate::command::{Command, ComputeCommand};
use crate::recorded::RecordedList;
use crate::registry::ListRegistry;
use std::ops::Deref;
use std::sync::Arc;
use strata_core::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, GpuFenceId, ShaderStage,
    StagingBufferId, TransitionInfo, UavId, UniformBufferId, UniformLayoutId,
};
use strata_core::arena::MAX_ALIGNMENT;
use strata_core::context::ComputeContext;
use strata_core::CompletionEvent;

/// A uniform buffer whose contents were captured by one specific list.
///
/// It can only be bound on the list that built it, and only until that list
/// is reset or flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalUniformBuffer {
    list_uid: u32,
    slot: u32,
}

impl LocalUniformBuffer {
    /// UID of the list that built the buffer.
    pub fn list_uid(&self) -> u32 {
        self.list_uid
    }
}

/// Recording of operations valid on every queue.
///
/// In bypass mode each call reaches the bound back-end context before it
/// returns; otherwise it is recorded and replays later in call order.
pub trait ComputeCommands {
    #[doc(hidden)]
    fn list_base(&mut self) -> &mut CommandListBase;

    /// Binds a compute pipeline.
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::SetComputePipeline(pipeline)));
    }

    /// Dispatches `x * y * z` thread groups.
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::Dispatch { x, y, z }));
    }

    /// Dispatches with group counts read from a buffer.
    fn dispatch_indirect(&mut self, args: BufferId, offset: u64) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::DispatchIndirect { args, offset }));
    }

    /// Transitions a batch of resources. Not allowed inside a render pass.
    fn transition_resources(&mut self, transitions: &[TransitionInfo]) {
        let base = self.list_base();
        base.assert_outside_render_pass("transition_resources");
        let range = base.alloc_transitions(transitions);
        base.submit(Command::Compute(ComputeCommand::Transition(range)));
    }

    /// Writes loose shader parameter bytes. The bytes are copied.
    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) {
        let base = self.list_base();
        let value = base.alloc_copy(value, MAX_ALIGNMENT);
        base.submit(Command::Compute(ComputeCommand::SetShaderParameter {
            stage,
            buffer_index,
            base_index,
            value,
        }));
    }

    /// Binds a uniform buffer created by the back end.
    fn set_uniform_buffer(&mut self, stage: ShaderStage, base_index: u32, buffer: UniformBufferId) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::SetUniformBuffer {
                stage,
                base_index,
                buffer,
            }));
    }

    /// Captures `contents` now; the back-end buffer is created when the list replays.
    fn build_local_uniform_buffer(
        &mut self,
        layout: UniformLayoutId,
        contents: &[u8],
    ) -> LocalUniformBuffer {
        assert!(!contents.is_empty(), "local uniform buffer contents are empty");
        let base = self.list_base();
        let slot = base.next_local_uniform_slot();
        let contents = base.alloc_copy(contents, MAX_ALIGNMENT);
        let list_uid = base.uid();
        base.submit(Command::Compute(ComputeCommand::BuildLocalUniformBuffer {
            slot,
            layout,
            contents,
        }));
        LocalUniformBuffer { list_uid, slot }
    }

    /// Binds a buffer from [`ComputeCommands::build_local_uniform_buffer`].
    ///
    /// # Panics
    ///
    /// Panics if the buffer was built by another list, or by this list before
    /// it was reset or flushed.
    fn set_local_uniform_buffer(
        &mut self,
        stage: ShaderStage,
        base_index: u32,
        buffer: &LocalUniformBuffer,
    ) {
        let base = self.list_base();
        assert_eq!(
            buffer.list_uid,
            base.uid(),
            "local uniform buffer was built by command list {}, not by command list {}",
            buffer.list_uid,
            base.uid()
        );
        base.submit(Command::Compute(ComputeCommand::SetLocalUniformBuffer {
            stage,
            base_index,
            slot: buffer.slot,
        }));
    }

    /// Opens a debug marker region.
    fn push_event(&mut self, name: &str, color: u32) {
        let base = self.list_base();
        let name = base.alloc_str(name);
        base.submit(Command::Compute(ComputeCommand::PushEvent { name, color }));
    }

    /// Closes the innermost debug marker region.
    fn pop_event(&mut self) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::PopEvent));
    }

    /// Signals a GPU fence slot once preceding work completes.
    fn write_gpu_fence(&mut self, fence: GpuFenceId) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::WriteGpuFence(fence)));
    }

    /// Waits on a cross-queue compute fence.
    fn wait_compute_fence(&mut self, fence: ComputeFenceId) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::WaitComputeFence(fence)));
    }

    /// Sets the async compute share of the GPU.
    fn set_async_compute_budget(&mut self, budget: AsyncComputeBudget) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::SetAsyncComputeBudget(budget)));
    }

    /// Copies a buffer range into a staging buffer. Not allowed inside a render pass.
    fn copy_to_staging_buffer(
        &mut self,
        source: BufferId,
        destination: StagingBufferId,
        offset: u64,
        size: u64,
    ) {
        let base = self.list_base();
        base.assert_outside_render_pass("copy_to_staging_buffer");
        base.submit(Command::Compute(ComputeCommand::CopyToStagingBuffer {
            source,
            destination,
            offset,
            size,
        }));
    }

    /// Clears an unordered access view.
    fn clear_uav(&mut self, uav: UavId, values: [u32; 4]) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::ClearUav { uav, values }));
    }

    /// Hints that recorded work may be submitted to the GPU.
    fn submit_commands_hint(&mut self) {
        self.list_base()
            .submit(Command::Compute(ComputeCommand::SubmitCommandsHint));
    }
}

/// A list recording for the async compute queue.
pub struct ComputeCommandList {
    pub(crate) base: CommandListBase,
}

impl ComputeCommandList {
    /// Creates an unbound, deferred compute list.
    pub fn new(registry: &Arc<ListRegistry>) -> Self {
        Self::with_binding(registry, ListKind::Compute, ContextBinding::default(), false)
    }

    pub(crate) fn with_binding(
        registry: &Arc<ListRegistry>,
        kind: ListKind,
        binding: ContextBinding,
        bypass: bool,
    ) -> Self {
        Self {
            base: CommandListBase::new(registry, kind, binding, bypass),
        }
    }

    /// Makes the list's execution wait for `event`.
    pub fn add_dispatch_prerequisite(&mut self, event: CompletionEvent) {
        self.base.add_prerequisite(event);
    }

    /// Replays the list on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the list was already executed and not reset since.
    pub fn execute_on(&mut self, context: &mut dyn ComputeContext) {
        self.base.execute_compute_in_place(context);
    }

    /// Drops recorded commands and starts recording again under a new UID.
    pub fn reset(&mut self) {
        self.base.reset();
    }

    pub(crate) fn into_recorded(self) -> RecordedList {
        self.base.into_recorded()
    }
}

impl ComputeCommands for ComputeCommandList {
    fn list_base(&mut self) -> &mut CommandListBase {
        &mut self.base
    }
}

impl Deref for ComputeCommandList {
    type Target = CommandListBase;

    fn deref(&self) -> &CommandListBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ArenaConfig;

    #[test]
    fn test_compute_list_records_in_order() {
        let registry = ListRegistry::new(ArenaConfig::default());
        let mut list = ComputeCommandList::new(&registry);
        list.push_event("Culling", 0xff00ff);
        list.set_compute_pipeline(ComputePipelineId(3));
        list.dispatch_compute(8, 8, 1);
        list.pop_event();
        assert_eq!(
            list.command_names(),
            vec!["PushEvent", "SetComputePipeline", "DispatchCompute", "PopEvent"]
        );
        assert!(list.used_memory() > 0);
    }

    #[test]
    #[should_panic(expected = "not by command list")]
    fn test_local_uniform_buffer_is_bound_to_its_list() {
        let registry = ListRegistry::new(ArenaConfig::default());
        let mut first = ComputeCommandList::new(&registry);
        let mut second = ComputeCommandList::new(&registry);
        let buffer = first.build_local_uniform_buffer(UniformLayoutId(1), &[0u8; 64]);
        second.set_local_uniform_buffer(ShaderStage::Compute, 0, &buffer);
    }

    #[test]
    #[should_panic(expected = "not by command list")]
    fn test_local_uniform_buffer_dies_with_reset() {
        let registry = ListRegistry::new(ArenaConfig::default());
        let mut list = ComputeCommandList::new(&registry);
        let buffer = list.build_local_uniform_buffer(UniformLayoutId(1), &[1u8; 16]);
        list.reset();
        list.set_local_uniform_buffer(ShaderStage::Compute, 0, &buffer);
    }
}
