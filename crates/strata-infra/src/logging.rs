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

//! A back-end decorator that logs every call before forwarding it.

use std::sync::Arc;
use strata_core::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, CopyTextureInfo,
    DepthRenderTargetView, DrawIndexedArgs, GpuFenceId, GraphicsPipelineDesc, QueryId,
    RenderPassInfo, RenderTargetView, ScissorRect, ShaderStage, StagingBufferId, TextureId,
    TransitionInfo, UavId, UniformBufferId, UniformLayoutId, Viewport, ViewportId,
};
use strata_core::context::{CommandContext, ComputeContext, ParallelContextProvider};

/// Logs each call at `debug` level under a label, then forwards it to the
/// wrapped context.
pub struct LoggingContext {
    label: String,
    inner: Box<dyn CommandContext>,
}

impl LoggingContext {
    /// Wraps `inner`.
    pub fn new(label: &str, inner: Box<dyn CommandContext>) -> Self {
        Self {
            label: label.to_string(),
            inner,
        }
    }

    /// Unwraps the decorated context.
    pub fn into_inner(self) -> Box<dyn CommandContext> {
        self.inner
    }
}

impl ComputeContext for LoggingContext {
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId) {
        log::debug!("[{}] set_compute_pipeline({:?})", self.label, pipeline);
        self.inner.set_compute_pipeline(pipeline);
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        log::debug!("[{}] dispatch_compute({x}, {y}, {z})", self.label);
        self.inner.dispatch_compute(x, y, z);
    }

    fn dispatch_indirect(&mut self, args: BufferId, offset: u64) {
        log::debug!("[{}] dispatch_indirect({:?}, {offset})", self.label, args);
        self.inner.dispatch_indirect(args, offset);
    }

    fn transition_resources(&mut self, transitions: &[TransitionInfo]) {
        log::debug!("[{}] transition_resources({} resources)", self.label, transitions.len());
        self.inner.transition_resources(transitions);
    }

    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) {
        log::debug!(
            "[{}] set_shader_parameter({:?}, {buffer_index}, {base_index}, {} bytes)",
            self.label,
            stage,
            value.len()
        );
        self.inner
            .set_shader_parameter(stage, buffer_index, base_index, value);
    }

    fn set_uniform_buffer(&mut self, stage: ShaderStage, base_index: u32, buffer: UniformBufferId) {
        log::debug!(
            "[{}] set_uniform_buffer({:?}, {base_index}, {:?})",
            self.label,
            stage,
            buffer
        );
        self.inner.set_uniform_buffer(stage, base_index, buffer);
    }

    fn create_uniform_buffer(
        &mut self,
        layout: UniformLayoutId,
        contents: &[u8],
    ) -> UniformBufferId {
        let buffer = self.inner.create_uniform_buffer(layout, contents);
        log::debug!(
            "[{}] create_uniform_buffer({:?}, {} bytes) -> {:?}",
            self.label,
            layout,
            contents.len(),
            buffer
        );
        buffer
    }

    fn push_event(&mut self, name: &str, color: u32) {
        log::debug!("[{}] push_event({name:?}, {color:#08x})", self.label);
        self.inner.push_event(name, color);
    }

    fn pop_event(&mut self) {
        log::debug!("[{}] pop_event()", self.label);
        self.inner.pop_event();
    }

    fn write_gpu_fence(&mut self, fence: GpuFenceId) {
        log::debug!("[{}] write_gpu_fence({:?})", self.label, fence);
        self.inner.write_gpu_fence(fence);
    }

    fn wait_compute_fence(&mut self, fence: ComputeFenceId) {
        log::debug!("[{}] wait_compute_fence({:?})", self.label, fence);
        self.inner.wait_compute_fence(fence);
    }

    fn set_async_compute_budget(&mut self, budget: AsyncComputeBudget) {
        log::debug!("[{}] set_async_compute_budget({:?})", self.label, budget);
        self.inner.set_async_compute_budget(budget);
    }

    fn copy_to_staging_buffer(
        &mut self,
        source: BufferId,
        destination: StagingBufferId,
        offset: u64,
        size: u64,
    ) {
        log::debug!(
            "[{}] copy_to_staging_buffer({:?}, {:?}, {offset}, {size})",
            self.label,
            source,
            destination
        );
        self.inner
            .copy_to_staging_buffer(source, destination, offset, size);
    }

    fn clear_uav(&mut self, uav: UavId, values: [u32; 4]) {
        log::debug!("[{}] clear_uav({:?}, {:?})", self.label, uav, values);
        self.inner.clear_uav(uav, values);
    }

    fn submit_commands_hint(&mut self) {
        log::debug!("[{}] submit_commands_hint()", self.label);
        self.inner.submit_commands_hint();
    }
}

impl CommandContext for LoggingContext {
    fn set_render_targets(
        &mut self,
        color: &[RenderTargetView],
        depth_stencil: Option<&DepthRenderTargetView>,
    ) {
        log::debug!(
            "[{}] set_render_targets({} color, depth: {})",
            self.label,
            color.len(),
            depth_stencil.is_some()
        );
        self.inner.set_render_targets(color, depth_stencil);
    }

    fn begin_render_pass(&mut self, info: &RenderPassInfo) {
        log::debug!(
            "[{}] begin_render_pass({:?})",
            self.label,
            info.label.as_deref().unwrap_or("unnamed")
        );
        self.inner.begin_render_pass(info);
    }

    fn end_render_pass(&mut self) {
        log::debug!("[{}] end_render_pass()", self.label);
        self.inner.end_render_pass();
    }

    fn next_subpass(&mut self) {
        log::debug!("[{}] next_subpass()", self.label);
        self.inner.next_subpass();
    }

    fn begin_compute_pass(&mut self, name: &str) {
        log::debug!("[{}] begin_compute_pass({name:?})", self.label);
        self.inner.begin_compute_pass(name);
    }

    fn end_compute_pass(&mut self) {
        log::debug!("[{}] end_compute_pass()", self.label);
        self.inner.end_compute_pass();
    }

    fn set_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) {
        log::debug!(
            "[{}] set_graphics_pipeline({:?}, {} targets)",
            self.label,
            desc.label,
            desc.num_render_targets
        );
        self.inner.set_graphics_pipeline(desc);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        log::debug!("[{}] set_viewport({:?})", self.label, viewport);
        self.inner.set_viewport(viewport);
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        log::debug!("[{}] set_scissor_rect({:?})", self.label, rect);
        self.inner.set_scissor_rect(rect);
    }

    fn set_stencil_ref(&mut self, value: u32) {
        log::debug!("[{}] set_stencil_ref({value})", self.label);
        self.inner.set_stencil_ref(value);
    }

    fn set_blend_factor(&mut self, factor: [f32; 4]) {
        log::debug!("[{}] set_blend_factor({:?})", self.label, factor);
        self.inner.set_blend_factor(factor);
    }

    fn set_stream_source(&mut self, stream_index: u32, buffer: BufferId, offset: u32) {
        log::debug!(
            "[{}] set_stream_source({stream_index}, {:?}, {offset})",
            self.label,
            buffer
        );
        self.inner.set_stream_source(stream_index, buffer, offset);
    }

    fn draw_primitive(&mut self, base_vertex: u32, num_primitives: u32, num_instances: u32) {
        log::debug!(
            "[{}] draw_primitive({base_vertex}, {num_primitives}, {num_instances})",
            self.label
        );
        self.inner
            .draw_primitive(base_vertex, num_primitives, num_instances);
    }

    fn draw_indexed_primitive(&mut self, args: &DrawIndexedArgs) {
        log::debug!("[{}] draw_indexed_primitive({:?})", self.label, args);
        self.inner.draw_indexed_primitive(args);
    }

    fn draw_primitive_indirect(&mut self, args: BufferId, offset: u32) {
        log::debug!("[{}] draw_primitive_indirect({:?}, {offset})", self.label, args);
        self.inner.draw_primitive_indirect(args, offset);
    }

    fn copy_texture(&mut self, source: TextureId, destination: TextureId, info: &CopyTextureInfo) {
        log::debug!(
            "[{}] copy_texture({:?} -> {:?})",
            self.label,
            source,
            destination
        );
        self.inner.copy_texture(source, destination, info);
    }

    fn copy_buffer_region(
        &mut self,
        destination: BufferId,
        destination_offset: u64,
        source: BufferId,
        source_offset: u64,
        size: u64,
    ) {
        log::debug!(
            "[{}] copy_buffer_region({:?}+{source_offset} -> {:?}+{destination_offset}, {size})",
            self.label,
            source,
            destination
        );
        self.inner
            .copy_buffer_region(destination, destination_offset, source, source_offset, size);
    }

    fn copy_to_resolve_target(&mut self, source: TextureId, destination: TextureId) {
        log::debug!(
            "[{}] copy_to_resolve_target({:?} -> {:?})",
            self.label,
            source,
            destination
        );
        self.inner.copy_to_resolve_target(source, destination);
    }

    fn clear_color_texture(&mut self, texture: TextureId, color: [f32; 4]) {
        log::debug!("[{}] clear_color_texture({:?}, {:?})", self.label, texture, color);
        self.inner.clear_color_texture(texture, color);
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        log::debug!(
            "[{}] update_buffer({:?}, {offset}, {} bytes)",
            self.label,
            buffer,
            data.len()
        );
        self.inner.update_buffer(buffer, offset, data);
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> Vec<u8> {
        log::debug!("[{}] read_buffer({:?}, {offset}, {size})", self.label, buffer);
        self.inner.read_buffer(buffer, offset, size)
    }

    fn begin_render_query(&mut self, query: QueryId) {
        log::debug!("[{}] begin_render_query({:?})", self.label, query);
        self.inner.begin_render_query(query);
    }

    fn end_render_query(&mut self, query: QueryId) {
        log::debug!("[{}] end_render_query({:?})", self.label, query);
        self.inner.end_render_query(query);
    }

    fn begin_frame(&mut self) {
        log::debug!("[{}] begin_frame()", self.label);
        self.inner.begin_frame();
    }

    fn end_frame(&mut self) {
        log::debug!("[{}] end_frame()", self.label);
        self.inner.end_frame();
    }

    fn begin_scene(&mut self) {
        log::debug!("[{}] begin_scene()", self.label);
        self.inner.begin_scene();
    }

    fn end_scene(&mut self) {
        log::debug!("[{}] end_scene()", self.label);
        self.inner.end_scene();
    }

    fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>) {
        log::debug!(
            "[{}] begin_drawing_viewport({:?}, {:?})",
            self.label,
            viewport,
            render_target
        );
        self.inner.begin_drawing_viewport(viewport, render_target);
    }

    fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool) {
        log::debug!(
            "[{}] end_drawing_viewport({:?}, present: {present}, vsync: {lock_to_vsync})",
            self.label,
            viewport
        );
        self.inner
            .end_drawing_viewport(viewport, present, lock_to_vsync);
    }

    fn invalidate_cached_state(&mut self) {
        log::debug!("[{}] invalidate_cached_state()", self.label);
        self.inner.invalidate_cached_state();
    }

    fn parallel_provider(&self) -> Option<Arc<dyn ParallelContextProvider>> {
        self.inner.parallel_provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{BackendCall, CallLog, RecordingContext};

    #[test]
    fn test_calls_are_forwarded() {
        let log = CallLog::new();
        let mut ctx = LoggingContext::new("frame", Box::new(RecordingContext::new(log.clone())));
        ctx.begin_frame();
        ctx.draw_primitive(0, 2, 1);
        ctx.end_frame();
        assert_eq!(
            log.calls(),
            vec![
                BackendCall::BeginFrame,
                BackendCall::DrawPrimitive {
                    base_vertex: 0,
                    num_primitives: 2,
                    num_instances: 1
                },
                BackendCall::EndFrame,
            ]
        );
    }
}
