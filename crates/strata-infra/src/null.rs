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

//! A back end that accepts every call and does nothing.

use strata_core::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, CopyTextureInfo,
    DepthRenderTargetView, DrawIndexedArgs, GpuFenceId, GraphicsPipelineDesc, QueryId,
    RenderPassInfo, RenderTargetView, ScissorRect, ShaderStage, StagingBufferId, TextureId,
    TransitionInfo, UavId, UniformBufferId, UniformLayoutId, Viewport, ViewportId,
};
use strata_core::context::{CommandContext, ComputeContext};

/// Discards every call. Reads return zeroes.
#[derive(Debug, Default)]
pub struct NullContext {
    next_uniform_buffer: u64,
    calls: u64,
}

impl NullContext {
    /// Number of calls received.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl ComputeContext for NullContext {
    fn set_compute_pipeline(&mut self, _pipeline: ComputePipelineId) {
        self.calls += 1;
    }
    fn dispatch_compute(&mut self, _x: u32, _y: u32, _z: u32) {
        self.calls += 1;
    }
    fn dispatch_indirect(&mut self, _args: BufferId, _offset: u64) {
        self.calls += 1;
    }
    fn transition_resources(&mut self, _transitions: &[TransitionInfo]) {
        self.calls += 1;
    }
    fn set_shader_parameter(&mut self, _s: ShaderStage, _b: u32, _i: u32, _value: &[u8]) {
        self.calls += 1;
    }
    fn set_uniform_buffer(&mut self, _s: ShaderStage, _i: u32, _buffer: UniformBufferId) {
        self.calls += 1;
    }
    fn create_uniform_buffer(&mut self, _layout: UniformLayoutId, _c: &[u8]) -> UniformBufferId {
        self.calls += 1;
        self.next_uniform_buffer += 1;
        UniformBufferId(self.next_uniform_buffer)
    }
    fn push_event(&mut self, _name: &str, _color: u32) {
        self.calls += 1;
    }
    fn pop_event(&mut self) {
        self.calls += 1;
    }
    fn write_gpu_fence(&mut self, _fence: GpuFenceId) {
        self.calls += 1;
    }
    fn wait_compute_fence(&mut self, _fence: ComputeFenceId) {
        self.calls += 1;
    }
    fn set_async_compute_budget(&mut self, _budget: AsyncComputeBudget) {
        self.calls += 1;
    }
    fn copy_to_staging_buffer(&mut self, _s: BufferId, _d: StagingBufferId, _o: u64, _n: u64) {
        self.calls += 1;
    }
    fn clear_uav(&mut self, _uav: UavId, _values: [u32; 4]) {
        self.calls += 1;
    }
    fn submit_commands_hint(&mut self) {
        self.calls += 1;
    }
}

impl CommandContext for NullContext {
    fn set_render_targets(&mut self, _c: &[RenderTargetView], _d: Option<&DepthRenderTargetView>) {
        self.calls += 1;
    }
    fn begin_render_pass(&mut self, _info: &RenderPassInfo) {
        self.calls += 1;
    }
    fn end_render_pass(&mut self) {
        self.calls += 1;
    }
    fn next_subpass(&mut self) {
        self.calls += 1;
    }
    fn begin_compute_pass(&mut self, _name: &str) {
        self.calls += 1;
    }
    fn end_compute_pass(&mut self) {
        self.calls += 1;
    }
    fn set_graphics_pipeline(&mut self, _desc: &GraphicsPipelineDesc) {
        self.calls += 1;
    }
    fn set_viewport(&mut self, _viewport: Viewport) {
        self.calls += 1;
    }
    fn set_scissor_rect(&mut self, _rect: ScissorRect) {
        self.calls += 1;
    }
    fn set_stencil_ref(&mut self, _value: u32) {
        self.calls += 1;
    }
    fn set_blend_factor(&mut self, _factor: [f32; 4]) {
        self.calls += 1;
    }
    fn set_stream_source(&mut self, _i: u32, _buffer: BufferId, _offset: u32) {
        self.calls += 1;
    }
    fn draw_primitive(&mut self, _base: u32, _primitives: u32, _instances: u32) {
        self.calls += 1;
    }
    fn draw_indexed_primitive(&mut self, _args: &DrawIndexedArgs) {
        self.calls += 1;
    }
    fn draw_primitive_indirect(&mut self, _args: BufferId, _offset: u32) {
        self.calls += 1;
    }
    fn copy_texture(&mut self, _s: TextureId, _d: TextureId, _info: &CopyTextureInfo) {
        self.calls += 1;
    }
    fn copy_buffer_region(&mut self, _d: BufferId, _doff: u64, _s: BufferId, _soff: u64, _n: u64) {
        self.calls += 1;
    }
    fn copy_to_resolve_target(&mut self, _s: TextureId, _d: TextureId) {
        self.calls += 1;
    }
    fn clear_color_texture(&mut self, _texture: TextureId, _color: [f32; 4]) {
        self.calls += 1;
    }
    fn update_buffer(&mut self, _buffer: BufferId, _offset: u64, _data: &[u8]) {
        self.calls += 1;
    }
    fn read_buffer(&mut self, _buffer: BufferId, _offset: u64, size: u64) -> Vec<u8> {
        self.calls += 1;
        vec![0; size as usize]
    }
    fn begin_render_query(&mut self, _query: QueryId) {
        self.calls += 1;
    }
    fn end_render_query(&mut self, _query: QueryId) {
        self.calls += 1;
    }
    fn begin_frame(&mut self) {
        self.calls += 1;
    }
    fn end_frame(&mut self) {
        self.calls += 1;
    }
    fn begin_scene(&mut self) {
        self.calls += 1;
    }
    fn end_scene(&mut self) {
        self.calls += 1;
    }
    fn begin_drawing_viewport(&mut self, _viewport: ViewportId, _rt: Option<TextureId>) {
        self.calls += 1;
    }
    fn end_drawing_viewport(&mut self, _viewport: ViewportId, _present: bool, _vsync: bool) {
        self.calls += 1;
    }
    fn invalidate_cached_state(&mut self) {
        self.calls += 1;
    }
}
