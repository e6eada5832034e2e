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

//! The command list executor: owner of the back end, the immediate lists and
//! the execution thread.

use crate::dispatch::{Backend, Dispatcher};
use crate::error::ExecutorError;
use crate::immediate::{
    ImmediateAsyncComputeCommandList, ImmediateCommandList, ImmediateFlushType,
};
use crate::list::{
    async_pair, AsyncCommandList, CommandList, ComputeCommandList, ContextBinding, ListKind,
    PendingCommandList,
};
use crate::registry::ListRegistry;
use crate::stats::ExecutorStats;
use std::sync::Arc;
use strata_core::api::GpuFenceId;
use strata_core::context::{CommandContext, ComputeContext};
use strata_core::fence::FenceAllocator;
use strata_core::{ExecutorConfig, FrameFlags};

/// Number of lists the executor itself keeps alive: the two immediate lists.
const IMMEDIATE_LIST_COUNT: usize = 2;

/// Records, dispatches and executes command lists against one back end.
///
/// The executor owns the back-end contexts. Lists it creates are bound to
/// them, so in bypass mode their calls reach the back end directly.
///
/// # Examples
///
/// ```
/// use strata_core::ExecutorConfig;
/// use strata_infra::NullContext;
/// use strata_rhi::prelude::*;
///
/// let mut executor =
///     CommandListExecutor::new(ExecutorConfig::inline(), Box::new(NullContext::default()), None)?;
/// let mut list = executor.create_command_list();
/// list.draw_primitive(0, 1, 1);
/// executor.execute_list(list);
/// assert_eq!(executor.stats().lists_executed, 1);
/// # Ok::<(), strata_rhi::ExecutorError>(())
/// ```
pub struct CommandListExecutor {
    config: ExecutorConfig,
    flags: FrameFlags,
    registry: Arc<ListRegistry>,
    dispatcher: Arc<Dispatcher>,
    immediate: ImmediateCommandList,
    async_compute: ImmediateAsyncComputeCommandList,
    shut_down: bool,
}

impl CommandListExecutor {
    /// Creates an executor driving `graphics`, and `compute` for the async
    /// compute queue when the back end has one.
    pub fn new(
        config: ExecutorConfig,
        graphics: Box<dyn CommandContext>,
        compute: Option<Box<dyn ComputeContext>>,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        let flags = FrameFlags::latch(&config);
        let registry = ListRegistry::new(config.arena.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            Backend::new(graphics, compute),
            flags.use_rhi_thread,
            config.parallel_translate.worker_threads,
            config.fence_ring_size,
        )?);
        let immediate =
            ImmediateCommandList::new(&registry, Arc::clone(&dispatcher), &config, flags);
        let async_compute = ImmediateAsyncComputeCommandList::new(&registry, &dispatcher, flags);
        dispatcher.set_force_flush(config.force_rhi_flush);
        log::info!(
            "Command list executor created (bypass: {}, rhi thread: {}, parallel: {})",
            flags.bypass,
            flags.use_rhi_thread,
            flags.use_parallel_algorithms
        );
        Ok(Self {
            config,
            flags,
            registry,
            dispatcher,
            immediate,
            async_compute,
            shut_down: false,
        })
    }

    /// The immediate graphics list.
    pub fn immediate(&mut self) -> &mut ImmediateCommandList {
        &mut self.immediate
    }

    /// The immediate async compute list.
    pub fn async_compute(&mut self) -> &mut ImmediateAsyncComputeCommandList {
        &mut self.async_compute
    }

    /// Submits the immediate async compute list's work behind the immediate
    /// list's work, and dispatches both.
    pub fn dispatch_async_compute(&mut self) {
        self.async_compute.immediate_dispatch(&mut self.immediate);
    }

    /// Creates a graphics list recording with this frame's flags.
    pub fn create_command_list(&self) -> CommandList {
        CommandList::with_binding(
            &self.registry,
            ListKind::Regular,
            self.binding(),
            self.flags.bypass,
        )
    }

    /// Creates a compute list recording with this frame's flags.
    pub fn create_compute_command_list(&self) -> ComputeCommandList {
        ComputeCommandList::with_binding(
            &self.registry,
            ListKind::Compute,
            self.binding(),
            self.flags.bypass,
        )
    }

    /// Creates a list to record on another thread, and the handle to queue it with.
    ///
    /// The list always records deferred, so its work replays where it was
    /// queued even in a bypass frame. In bypass the queue call blocks until
    /// recording finishes, so start the recorder before queueing.
    pub fn create_async_command_list(&self) -> (AsyncCommandList, PendingCommandList) {
        async_pair(CommandList::with_binding(
            &self.registry,
            ListKind::Regular,
            self.binding(),
            false,
        ))
    }

    /// Executes `list` after everything recorded on the immediate list so far.
    ///
    /// The list replays inline or on the execution thread; either way it is
    /// consumed and cannot execute again. An empty list is a no-op.
    pub fn execute_list(&mut self, list: CommandList) {
        let recorded = list.into_recorded();
        if recorded.is_empty() {
            return;
        }
        self.immediate
            .immediate_flush(ImmediateFlushType::DispatchToRhiThread);
        self.dispatcher.dispatch(recorded);
    }

    /// Executes a compute list on the async compute queue, after everything
    /// recorded on the immediate list so far.
    pub fn execute_compute_list(&mut self, list: ComputeCommandList) {
        let recorded = list.into_recorded();
        if recorded.is_empty() {
            return;
        }
        self.immediate
            .immediate_flush(ImmediateFlushType::DispatchToRhiThread);
        self.dispatcher.dispatch(recorded);
    }

    /// Takes the frame snapshot of the configuration. Call between frames.
    ///
    /// Starts or stops the execution thread to match the new flags.
    ///
    /// # Panics
    ///
    /// Panics if a list other than the immediate lists is alive, or if the
    /// immediate lists still hold recorded commands.
    pub fn latch_bypass(&mut self) -> Result<(), ExecutorError> {
        self.immediate
            .immediate_flush(ImmediateFlushType::FlushRhiThread);
        assert!(
            !self.async_compute.has_commands(),
            "immediate async compute list has unsubmitted commands at latch time"
        );
        self.check_no_outstanding_cmd_lists();

        let flags = FrameFlags::latch(&self.config);
        if flags != self.flags {
            log::debug!("Latching frame flags {:?} -> {:?}", self.flags, flags);
        }
        self.dispatcher.set_rhi_thread_enabled(flags.use_rhi_thread)?;
        self.dispatcher.set_force_flush(self.config.force_rhi_flush);
        self.immediate.latch(flags, &self.config);
        self.async_compute.latch(flags);
        self.flags = flags;
        Ok(())
    }

    /// The configuration in use.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Replaces the configuration. It takes effect at the next [`latch_bypass`].
    ///
    /// [`latch_bypass`]: CommandListExecutor::latch_bypass
    pub fn set_config(&mut self, config: ExecutorConfig) -> Result<(), ExecutorError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// The flags of the frame being recorded.
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Whether the current frame records in bypass mode.
    pub fn is_bypass(&self) -> bool {
        self.flags.bypass
    }

    /// Number of command lists alive, the two immediate lists included.
    pub fn outstanding_cmd_lists(&self) -> usize {
        self.registry.outstanding()
    }

    /// Asserts that no list besides the immediate lists is alive.
    ///
    /// # Panics
    ///
    /// Panics when a created list was neither executed nor dropped.
    pub fn check_no_outstanding_cmd_lists(&self) {
        let outstanding = self.outstanding_cmd_lists();
        assert!(
            outstanding == IMMEDIATE_LIST_COUNT,
            "{} command lists are outstanding; all lists must be executed or dropped first",
            outstanding - IMMEDIATE_LIST_COUNT.min(outstanding)
        );
    }

    /// Blocks until the execution thread executed every dispatch so far.
    pub fn wait_for_rhi_thread_tasks(&self) {
        self.dispatcher.wait_for_rhi_thread_tasks();
    }

    /// Whether dispatched lists execute on the execution thread.
    pub fn is_rhi_thread_active(&self) -> bool {
        self.dispatcher.is_rhi_thread_active()
    }

    /// Whether every dispatched list executed and the thread is not stalled.
    pub fn is_rhi_thread_completely_flushed(&self) -> bool {
        self.dispatcher.is_completely_flushed()
    }

    /// Allocates a GPU fence slot for the current frame.
    pub fn alloc_fence(&self) -> GpuFenceId {
        self.dispatcher.alloc_fence()
    }

    /// The fence ring.
    pub fn fences(&self) -> &FenceAllocator {
        self.dispatcher.fences()
    }

    /// Marks every frame up to `frame` as complete, freeing its fence slots.
    pub fn retire_frame(&self, frame: u64) {
        self.dispatcher.fences().retire_frame(frame);
    }

    /// The frame being recorded.
    pub fn frame_number(&self) -> u64 {
        self.dispatcher.frame_number()
    }

    /// A snapshot of the execution counters.
    pub fn stats(&self) -> ExecutorStats {
        self.dispatcher
            .backend()
            .stats
            .snapshot(self.registry.outstanding())
    }

    /// The registry lists are created from.
    pub fn registry(&self) -> &Arc<ListRegistry> {
        &self.registry
    }

    /// Flushes pending work and stops the execution thread. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if self.async_compute.has_commands() {
            self.dispatch_async_compute();
        }
        self.immediate
            .immediate_flush(ImmediateFlushType::FlushRhiThread);
        self.dispatcher.shutdown();
        log::info!("Command list executor shut down.");
    }

    fn binding(&self) -> ContextBinding {
        let backend = self.dispatcher.backend();
        ContextBinding {
            graphics: Some(Arc::clone(&backend.graphics)),
            compute: backend.compute.clone(),
        }
    }
}

impl Drop for CommandListExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{ComputeCommands, GraphicsCommands};
    use strata_core::api::{ShaderStage, UniformLayoutId};
    use strata_infra::NullContext;

    fn executor(config: ExecutorConfig) -> CommandListExecutor {
        CommandListExecutor::new(config, Box::new(NullContext::default()), None).unwrap()
    }

    #[test]
    fn test_new_executor_owns_two_immediate_lists() {
        let executor = executor(ExecutorConfig::inline());
        assert_eq!(executor.outstanding_cmd_lists(), 2);
        executor.check_no_outstanding_cmd_lists();
        assert!(!executor.is_rhi_thread_active());
    }

    #[test]
    #[should_panic(expected = "1 command lists are outstanding")]
    fn test_leaked_list_is_detected() {
        let executor = executor(ExecutorConfig::inline());
        let _leaked = executor.create_command_list();
        executor.check_no_outstanding_cmd_lists();
    }

    #[test]
    fn test_empty_list_is_a_no_op() {
        let mut executor = executor(ExecutorConfig::inline());
        let list = executor.create_command_list();
        executor.execute_list(list);
        assert_eq!(executor.stats().lists_executed, 0);
    }

    #[test]
    fn test_latch_applies_new_config() {
        let mut executor = executor(ExecutorConfig::default());
        assert!(executor.is_rhi_thread_active());
        let mut config = executor.config().clone();
        config.bypass = true;
        executor.set_config(config).unwrap();
        assert!(!executor.is_bypass());
        executor.latch_bypass().unwrap();
        assert!(executor.is_bypass());
        assert!(!executor.flags().use_rhi_thread);
        assert!(!executor.flags().use_parallel_algorithms);
        assert!(!executor.is_rhi_thread_active());
    }

    #[test]
    fn test_bypass_frames_reuse_local_uniform_slots() {
        let mut executor = executor(ExecutorConfig {
            bypass: true,
            ..Default::default()
        });
        for _ in 0..1000 {
            let immediate = executor.immediate();
            let uniforms = immediate.build_local_uniform_buffer(UniformLayoutId(1), &[0; 16]);
            immediate.set_local_uniform_buffer(ShaderStage::Vertex, 0, &uniforms);
            immediate.end_frame();
        }
        assert_eq!(executor.immediate().local_uniform_usage(), (0, 0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut executor = executor(ExecutorConfig::inline());
        let mut config = ExecutorConfig::inline();
        config.fence_ring_size = 0;
        assert!(matches!(
            executor.set_config(config),
            Err(ExecutorError::Config(_))
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut executor = executor(ExecutorConfig::default());
        let mut list = executor.create_command_list();
        list.draw_primitive(0, 3, 1);
        executor.execute_list(list);
        executor.shutdown();
        executor.shutdown();
        assert!(!executor.is_rhi_thread_active());
        assert_eq!(executor.stats().lists_executed, 1);
    }
}
