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

//! Back-end execution context contracts.
//!
//! A back end exposes one method per recordable operation. Command lists either
//! forward calls straight to these methods (bypass mode) or record them and
//! replay them later, in order, against the same methods.

use crate::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, CopyTextureInfo,
    DepthRenderTargetView, DrawIndexedArgs, GpuFenceId, GraphicsPipelineDesc, QueryId,
    RenderPassInfo, RenderTargetView, ScissorRect, ShaderStage, StagingBufferId, TextureId,
    TransitionInfo, UavId, UniformBufferId, UniformLayoutId, Viewport, ViewportId,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operations valid on every queue, including the async compute queue.
pub trait ComputeContext: Send {
    /// Binds a compute pipeline.
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId);

    /// Dispatches `x * y * z` thread groups.
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);

    /// Dispatches with group counts read from `args` at `offset`.
    fn dispatch_indirect(&mut self, args: BufferId, offset: u64);

    /// Transitions a batch of resources.
    fn transition_resources(&mut self, transitions: &[TransitionInfo]);

    /// Writes loose shader parameter bytes.
    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    );

    /// Binds a uniform buffer.
    fn set_uniform_buffer(&mut self, stage: ShaderStage, base_index: u32, buffer: UniformBufferId);

    /// Creates a single-use uniform buffer from `contents`.
    fn create_uniform_buffer(
        &mut self,
        layout: UniformLayoutId,
        contents: &[u8],
    ) -> UniformBufferId;

    /// Opens a named debug marker region.
    fn push_event(&mut self, name: &str, color: u32);

    /// Closes the innermost debug marker region.
    fn pop_event(&mut self);

    /// Signals the GPU fence in slot `fence` once preceding work completes.
    fn write_gpu_fence(&mut self, fence: GpuFenceId);

    /// Makes this queue wait for a cross-queue compute fence.
    fn wait_compute_fence(&mut self, fence: ComputeFenceId);

    /// Sets the async compute share of the GPU.
    fn set_async_compute_budget(&mut self, budget: AsyncComputeBudget);

    /// Copies `size` bytes of `source` at `offset` into a staging buffer.
    fn copy_to_staging_buffer(
        &mut self,
        source: BufferId,
        destination: StagingBufferId,
        offset: u64,
        size: u64,
    );

    /// Clears an unordered access view.
    fn clear_uav(&mut self, uav: UavId, values: [u32; 4]);

    /// Hints that the work recorded so far may be submitted to the GPU.
    fn submit_commands_hint(&mut self);
}

/// The full graphics context. Every graphics context is also a compute context.
pub trait CommandContext: ComputeContext {
    /// Binds color and depth targets outside of a render pass.
    fn set_render_targets(
        &mut self,
        color: &[RenderTargetView],
        depth_stencil: Option<&DepthRenderTargetView>,
    );

    /// Begins a render pass.
    fn begin_render_pass(&mut self, info: &RenderPassInfo);

    /// Ends the current render pass.
    fn end_render_pass(&mut self);

    /// Advances to the next subpass of the current render pass.
    fn next_subpass(&mut self);

    /// Begins a named compute pass.
    fn begin_compute_pass(&mut self, name: &str);

    /// Ends the current compute pass.
    fn end_compute_pass(&mut self);

    /// Binds a graphics pipeline.
    fn set_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: ScissorRect);

    /// Sets the stencil reference value.
    fn set_stencil_ref(&mut self, value: u32);

    /// Sets the blend constant.
    fn set_blend_factor(&mut self, factor: [f32; 4]);

    /// Binds a vertex stream.
    fn set_stream_source(&mut self, stream_index: u32, buffer: BufferId, offset: u32);

    /// Draws non-indexed primitives.
    fn draw_primitive(&mut self, base_vertex: u32, num_primitives: u32, num_instances: u32);

    /// Draws indexed primitives.
    fn draw_indexed_primitive(&mut self, args: &DrawIndexedArgs);

    /// Draws with arguments read from `args` at `offset`.
    fn draw_primitive_indirect(&mut self, args: BufferId, offset: u32);

    /// Copies between textures.
    fn copy_texture(&mut self, source: TextureId, destination: TextureId, info: &CopyTextureInfo);

    /// Copies a buffer region.
    fn copy_buffer_region(
        &mut self,
        destination: BufferId,
        destination_offset: u64,
        source: BufferId,
        source_offset: u64,
        size: u64,
    );

    /// Resolves a multisampled texture.
    fn copy_to_resolve_target(&mut self, source: TextureId, destination: TextureId);

    /// Clears a color texture.
    fn clear_color_texture(&mut self, texture: TextureId, color: [f32; 4]);

    /// Uploads `data` into `buffer` at `offset`.
    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    /// Reads `size` bytes of `buffer` at `offset`.
    ///
    /// Only called once all previously recorded work has executed.
    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> Vec<u8>;

    /// Begins a query.
    fn begin_render_query(&mut self, query: QueryId);

    /// Ends a query.
    fn end_render_query(&mut self, query: QueryId);

    /// Marks the start of a frame.
    fn begin_frame(&mut self);

    /// Marks the end of a frame.
    fn end_frame(&mut self);

    /// Marks the start of a scene.
    fn begin_scene(&mut self);

    /// Marks the end of a scene.
    fn end_scene(&mut self);

    /// Begins drawing to a viewport.
    fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>);

    /// Ends drawing to a viewport, presenting it if `present` is set.
    fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool);

    /// Forgets any state the back end cached from previous commands.
    fn invalidate_cached_state(&mut self);

    /// The provider used for parallel translation, if this back end supports it.
    fn parallel_provider(&self) -> Option<Arc<dyn ParallelContextProvider>> {
        None
    }
}

/// A context a translate worker records into, later submitted in order.
pub trait ContextContainer: Send {
    /// The context the worker translates into.
    fn context(&mut self) -> &mut dyn CommandContext;

    /// Called once the worker has finished translating.
    fn finish(&mut self);

    /// Submits the translated work. `index` is this container's position in a
    /// group of `num` containers; containers are submitted in index order.
    fn submit(self: Box<Self>, index: usize, num: usize);
}

/// Creates the contexts parallel translate workers record into.
pub trait ParallelContextProvider: Send + Sync {
    /// Creates container `index` of `num`, or `None` if the back end cannot
    /// provide one right now.
    fn create_container(&self, index: usize, num: usize) -> Option<Box<dyn ContextContainer>>;
}

/// A graphics context shared between the recording and execution threads.
pub type SharedCommandContext = Arc<Mutex<Box<dyn CommandContext>>>;

/// An async compute context shared between the recording and execution threads.
pub type SharedComputeContext = Arc<Mutex<Box<dyn ComputeContext>>>;

/// Wraps a graphics context for sharing.
pub fn share_command_context(context: Box<dyn CommandContext>) -> SharedCommandContext {
    Arc::new(Mutex::new(context))
}

/// Wraps a compute context for sharing.
pub fn share_compute_context(context: Box<dyn ComputeContext>) -> SharedComputeContext {
    Arc::new(Mutex::new(context))
}

/// Locks a shared context.
///
/// A panic on another thread while it held the lock is already fatal for that
/// thread; the context itself stays usable.
pub fn lock_context<T: ?Sized>(slot: &Arc<Mutex<Box<T>>>) -> MutexGuard<'_, Box<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
