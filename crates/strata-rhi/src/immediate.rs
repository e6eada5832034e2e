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

//! The executor's long-lived immediate lists.
//!
//! The immediate graphics list is where frame structure, synchronisation and
//! sub-list submission happen. Every flush hands its recorded work to the
//! dispatcher and keeps recording into a fresh arena.

use crate::command::{Command, ControlCommand, GraphicsCommand};
use crate::dispatch::{Backend, Dispatcher};
use crate::list::{
    CommandList, CommandListBase, ComputeCommandList, ComputeCommands, ContextBinding,
    GraphicsCommands, ListKind, PendingCommandList,
};
use crate::recorded::RecordedList;
use crate::registry::ListRegistry;
use crate::translate::translate_lists;
use crossbeam_channel::Sender;
use std::ops::Deref;
use std::sync::{Arc, MutexGuard};
use strata_core::api::{BufferId, GpuFenceId, LockMode, TextureId, ViewportId};
use strata_core::arena::MAX_ALIGNMENT;
use strata_core::context::CommandContext;
use strata_core::lock::{LockParams, LockTracker};
use strata_core::{CompletionEvent, ExecutorConfig, FrameFlags, ParallelTranslateConfig};

/// How far [`ImmediateCommandList::immediate_flush`] synchronises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmediateFlushType {
    /// Only wait for the immediate list's dispatch prerequisites.
    WaitForOutstandingTasksOnly,
    /// Hand the recorded work to the execution thread and return.
    DispatchToRhiThread,
    /// Dispatch, then wait until the execution thread started on it.
    WaitForDispatchToRhiThread,
    /// Dispatch, then wait until the execution thread finished everything.
    FlushRhiThread,
}

/// A CPU-side staging area for a locked buffer range.
///
/// Obtained from [`ImmediateCommandList::lock_buffer`] and consumed by
/// [`ImmediateCommandList::unlock_buffer`].
#[derive(Debug)]
#[must_use = "a locked buffer stays locked until passed to unlock_buffer"]
pub struct BufferLock {
    buffer: BufferId,
    offset: u64,
    mode: LockMode,
    data: Vec<u8>,
}

impl BufferLock {
    /// The locked buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Offset of the locked range.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// How the range was locked.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// The staged bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The staged bytes, to fill before unlocking a write lock.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Keeps the execution thread parked until dropped.
///
/// While the guard lives, the caller may drive the back-end context directly.
pub struct RhiThreadStall {
    backend: Arc<Backend>,
    resume: Option<Sender<()>>,
}

impl RhiThreadStall {
    pub(crate) fn new(backend: Arc<Backend>, resume: Sender<()>) -> Self {
        Self {
            backend,
            resume: Some(resume),
        }
    }

    /// The back end's graphics context.
    pub fn context(&self) -> MutexGuard<'_, Box<dyn CommandContext>> {
        self.backend.graphics()
    }
}

impl Drop for RhiThreadStall {
    fn drop(&mut self) {
        if let Some(resume) = self.resume.take() {
            let _ = resume.send(());
        }
        log::debug!("RHI thread resumed.");
    }
}

/// The executor's immediate graphics list.
pub struct ImmediateCommandList {
    list: CommandList,
    dispatcher: Arc<Dispatcher>,
    flags: FrameFlags,
    translate: ParallelTranslateConfig,
    flush_on_queue_parallel_submit: bool,
    locks: LockTracker,
    last_frame_fence: Option<(u64, CompletionEvent)>,
    last_present_fence: Option<CompletionEvent>,
}

impl ImmediateCommandList {
    pub(crate) fn new(
        registry: &Arc<ListRegistry>,
        dispatcher: Arc<Dispatcher>,
        config: &ExecutorConfig,
        flags: FrameFlags,
    ) -> Self {
        let binding = ContextBinding {
            graphics: Some(Arc::clone(&dispatcher.backend().graphics)),
            compute: dispatcher.backend().compute.clone(),
        };
        Self {
            list: CommandList::with_binding(registry, ListKind::Immediate, binding, flags.bypass),
            dispatcher,
            flags,
            translate: config.parallel_translate.clone(),
            flush_on_queue_parallel_submit: config.flush_on_queue_parallel_submit,
            locks: LockTracker::new(),
            last_frame_fence: None,
            last_present_fence: None,
        }
    }

    /// Applies a new frame snapshot. The list must be empty.
    pub(crate) fn latch(&mut self, flags: FrameFlags, config: &ExecutorConfig) {
        self.list.base.set_bypass(flags.bypass);
        self.flags = flags;
        self.translate = config.parallel_translate.clone();
        self.flush_on_queue_parallel_submit = config.flush_on_queue_parallel_submit;
    }

    /// Flushes recorded work as far as `flush` asks.
    pub fn immediate_flush(&mut self, flush: ImmediateFlushType) {
        match flush {
            ImmediateFlushType::WaitForOutstandingTasksOnly => self.wait_for_tasks(),
            ImmediateFlushType::DispatchToRhiThread => self.dispatch(),
            ImmediateFlushType::WaitForDispatchToRhiThread => {
                self.dispatch();
                self.dispatcher.wait_for_dispatch();
            }
            ImmediateFlushType::FlushRhiThread => {
                self.dispatch();
                self.dispatcher.wait_for_rhi_thread_tasks();
            }
        }
    }

    /// Makes the list's execution wait for `event`.
    pub fn add_dispatch_prerequisite(&mut self, event: CompletionEvent) {
        self.list.add_dispatch_prerequisite(event);
    }

    /// Blocks until every dispatch prerequisite of the list has completed.
    pub fn wait_for_tasks(&mut self) {
        CompletionEvent::wait_all(&self.list.base.take_prerequisites());
    }

    /// Blocks until the execution thread started on the last dispatch.
    pub fn wait_for_dispatch(&self) {
        self.dispatcher.wait_for_dispatch();
    }

    /// Blocks until the execution thread executed every dispatch so far.
    pub fn wait_for_rhi_thread_tasks(&self) {
        self.dispatcher.wait_for_rhi_thread_tasks();
    }

    /// Starts a frame.
    pub fn begin_frame(&mut self) {
        self.wait_for_tasks();
        self.submit_graphics(GraphicsCommand::BeginFrame);
    }

    /// Ends the frame and dispatches it.
    ///
    /// Blocks until the previous frame finished executing, then retires its
    /// fences, so at most one frame is ever in flight on the execution thread.
    pub fn end_frame(&mut self) {
        self.submit_graphics(GraphicsCommand::EndFrame);
        let frame = self.dispatcher.frame_number();
        let fence = self.rhi_thread_fence();
        self.immediate_flush(ImmediateFlushType::DispatchToRhiThread);
        if let Some((previous, previous_fence)) = self.last_frame_fence.replace((frame, fence)) {
            previous_fence.wait();
            self.dispatcher.fences().retire_frame(previous);
        }
        let next = self.dispatcher.advance_frame();
        log::trace!("Frame {frame} ended; recording frame {next}");
    }

    /// Starts a scene, after the list's outstanding prerequisites completed.
    pub fn begin_scene(&mut self) {
        self.wait_for_tasks();
        self.submit_graphics(GraphicsCommand::BeginScene);
    }

    /// Ends a scene, after the list's outstanding prerequisites completed.
    pub fn end_scene(&mut self) {
        self.wait_for_tasks();
        self.submit_graphics(GraphicsCommand::EndScene);
    }

    /// Starts drawing into a viewport.
    pub fn begin_drawing_viewport(
        &mut self,
        viewport: ViewportId,
        render_target: Option<TextureId>,
    ) {
        self.submit_graphics(GraphicsCommand::BeginDrawingViewport {
            viewport,
            render_target,
        });
    }

    /// Ends drawing into a viewport, presenting it if `present` is set.
    ///
    /// Presents are paced: this waits until the previous present executed.
    pub fn end_drawing_viewport(
        &mut self,
        viewport: ViewportId,
        present: bool,
        lock_to_vsync: bool,
    ) {
        self.submit_graphics(GraphicsCommand::EndDrawingViewport {
            viewport,
            present,
            lock_to_vsync,
        });
        let fence = self.rhi_thread_fence();
        self.immediate_flush(ImmediateFlushType::DispatchToRhiThread);
        if let Some(previous) = self.last_present_fence.replace(fence) {
            previous.wait();
        }
    }

    /// Returns an event signalled once execution reaches this point of the list.
    pub fn rhi_thread_fence(&mut self) -> CompletionEvent {
        let event = CompletionEvent::new();
        self.submit_control(ControlCommand::SignalFence(event.clone()));
        event
    }

    /// Dispatches if needed and blocks until `fence` is signalled.
    pub fn wait_on_rhi_thread_fence(&mut self, fence: &CompletionEvent) {
        if !fence.is_complete() {
            self.immediate_flush(ImmediateFlushType::DispatchToRhiThread);
            fence.wait();
        }
    }

    /// Records a closure run against the graphics context in list order.
    pub fn enqueue_lambda<F>(&mut self, lambda: F)
    where
        F: FnOnce(&mut dyn CommandContext) + Send + 'static,
    {
        self.submit_control(ControlCommand::Lambda(Box::new(lambda)));
    }

    /// Queues a finished list; it executes at this point of the immediate list.
    pub fn queue_command_list_submit(&mut self, list: CommandList) {
        let recorded = list.into_recorded();
        if !recorded.is_empty() {
            self.submit_control(ControlCommand::SubmitSubList(recorded));
        }
    }

    /// Queues a list still being recorded; execution waits for it at this point.
    pub fn queue_async_command_list_submit(&mut self, pending: PendingCommandList) {
        if self.list.is_bypass() {
            let recorded = pending.wait();
            if !recorded.is_empty() {
                self.submit_control(ControlCommand::SubmitSubList(recorded));
            }
        } else {
            self.submit_control(ControlCommand::WaitForAndSubmitSubList(pending));
        }
    }

    /// Queues a set of finished lists, translating them in parallel when the
    /// frame allows it. They are submitted in the order given.
    pub fn queue_parallel_async_command_list_submit(&mut self, lists: Vec<CommandList>) {
        let recorded: Vec<RecordedList> =
            lists.into_iter().map(CommandList::into_recorded).collect();
        let commands = translate_lists(
            recorded,
            self.flags.use_parallel_algorithms,
            &self.translate,
            self.dispatcher.backend(),
            self.dispatcher.pool(),
        );
        for command in commands {
            self.submit_control(command);
        }
        if self.flush_on_queue_parallel_submit {
            self.immediate_flush(ImmediateFlushType::FlushRhiThread);
        }
    }

    /// Queues a finished compute list on the async compute queue, after the
    /// graphics work recorded so far.
    pub fn queue_async_compute(&mut self, list: ComputeCommandList) {
        self.queue_async_compute_recorded(list.into_recorded());
    }

    pub(crate) fn queue_async_compute_recorded(&mut self, recorded: RecordedList) {
        if !recorded.is_empty() {
            self.submit_control(ControlCommand::SubmitAsyncCompute(recorded));
        }
    }

    /// Locks a buffer range for CPU access.
    ///
    /// A read lock flushes the execution thread and returns the current
    /// contents. A write lock returns a zeroed staging area that is uploaded
    /// when the lock is released.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already locked.
    pub fn lock_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        size: u64,
        mode: LockMode,
    ) -> BufferLock {
        self.locks.lock(LockParams {
            buffer,
            offset,
            size,
            mode,
        });
        let data = match mode {
            LockMode::ReadOnly => {
                self.immediate_flush(ImmediateFlushType::FlushRhiThread);
                self.dispatcher.read_buffer(buffer, offset, size)
            }
            LockMode::WriteOnly => vec![0; size as usize],
        };
        BufferLock {
            buffer,
            offset,
            mode,
            data,
        }
    }

    /// Releases a lock, recording the upload of a write lock's staged bytes.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not locked.
    pub fn unlock_buffer(&mut self, lock: BufferLock) {
        let params = self.locks.unlock(lock.buffer);
        if params.mode == LockMode::WriteOnly {
            let data = self.list.base.alloc_copy(&lock.data, MAX_ALIGNMENT);
            self.submit_graphics(GraphicsCommand::UpdateBuffer {
                buffer: params.buffer,
                offset: params.offset,
                data,
            });
        }
    }

    /// Outstanding buffer locks.
    pub fn lock_tracker(&self) -> &LockTracker {
        &self.locks
    }

    /// Parks the execution thread after it executed everything recorded so far.
    ///
    /// Returns `None` when no execution thread is running.
    pub fn stall_rhi_thread(&mut self) -> Option<RhiThreadStall> {
        self.immediate_flush(ImmediateFlushType::DispatchToRhiThread);
        self.dispatcher.stall()
    }

    /// Allocates a GPU fence slot for the current frame.
    pub fn alloc_fence(&self) -> GpuFenceId {
        self.dispatcher.alloc_fence()
    }

    /// The frame currently being recorded.
    pub fn frame_number(&self) -> u64 {
        self.dispatcher.frame_number()
    }

    /// The flags the current frame records with.
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    fn dispatch(&mut self) {
        let base = &mut self.list.base;
        base.recycle_bypass_state();
        if !base.has_commands() && !base.has_prerequisites() {
            return;
        }
        let recorded = base.swap_out();
        self.dispatcher.dispatch(recorded);
    }

    fn submit_graphics(&mut self, command: GraphicsCommand) {
        self.list.base.submit(Command::Graphics(command));
    }

    fn submit_control(&mut self, command: ControlCommand) {
        self.list.base.submit(Command::Control(command));
    }
}

impl ComputeCommands for ImmediateCommandList {
    fn list_base(&mut self) -> &mut CommandListBase {
        &mut self.list.base
    }
}

impl GraphicsCommands for ImmediateCommandList {}

impl Deref for ImmediateCommandList {
    type Target = CommandListBase;

    fn deref(&self) -> &CommandListBase {
        &self.list.base
    }
}

/// The executor's immediate async compute list.
pub struct ImmediateAsyncComputeCommandList {
    list: ComputeCommandList,
}

impl ImmediateAsyncComputeCommandList {
    pub(crate) fn new(
        registry: &Arc<ListRegistry>,
        dispatcher: &Dispatcher,
        flags: FrameFlags,
    ) -> Self {
        let binding = ContextBinding {
            graphics: Some(Arc::clone(&dispatcher.backend().graphics)),
            compute: dispatcher.backend().compute.clone(),
        };
        Self {
            list: ComputeCommandList::with_binding(
                registry,
                ListKind::ImmediateAsyncCompute,
                binding,
                flags.bypass,
            ),
        }
    }

    pub(crate) fn latch(&mut self, flags: FrameFlags) {
        self.list.base.set_bypass(flags.bypass);
    }

    /// Submits the recorded compute work behind the graphics work recorded so
    /// far on `immediate`, and dispatches.
    pub fn immediate_dispatch(&mut self, immediate: &mut ImmediateCommandList) {
        self.submit_commands_hint();
        self.list.base.recycle_bypass_state();
        if self.list.has_commands() {
            let recorded = self.list.base.swap_out();
            immediate.queue_async_compute_recorded(recorded);
        }
        immediate.immediate_flush(ImmediateFlushType::DispatchToRhiThread);
    }
}

impl ComputeCommands for ImmediateAsyncComputeCommandList {
    fn list_base(&mut self) -> &mut CommandListBase {
        &mut self.list.base
    }
}

impl Deref for ImmediateAsyncComputeCommandList {
    type Target = CommandListBase;

    fn deref(&self) -> &CommandListBase {
        &self.list.base
    }
}
