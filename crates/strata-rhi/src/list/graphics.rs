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

//! Graphics recording: render targets, passes, draws and copies.

use super::{CommandListBase, ComputeCommands, ContextBinding, ListKind};
use crate::command::{Command, GraphicsCommand, RenderTargetBinding};
use crate::recorded::RecordedList;
use crate::registry::ListRegistry;
use std::ops::Deref;
use std::sync::Arc;
use strata_core::api::{
    BufferId, CopyTextureInfo, DepthRenderTargetView, DrawIndexedArgs, GraphicsPipelineDesc,
    QueryId, RenderPassInfo, RenderTargetView, ScissorRect, TextureId, Viewport, ViewportId,
    MAX_SIMULTANEOUS_RENDER_TARGETS,
};
use strata_core::context::CommandContext;
use strata_core::CompletionEvent;

/// Recording of graphics-queue operations.
///
/// Pass structure is validated as calls are made, so a misuse panics at the
/// call site rather than when the list replays.
pub trait GraphicsCommands: ComputeCommands {
    /// Binds color and depth targets.
    ///
    /// # Panics
    ///
    /// Panics with more than eight color targets, or inside a render pass.
    fn set_render_targets(
        &mut self,
        color: &[RenderTargetView],
        depth_stencil: Option<&DepthRenderTargetView>,
    ) {
        assert!(
            color.len() <= MAX_SIMULTANEOUS_RENDER_TARGETS,
            "{} render targets bound; at most {MAX_SIMULTANEOUS_RENDER_TARGETS} are supported",
            color.len()
        );
        let base = self.list_base();
        base.assert_outside_render_pass("set_render_targets");
        base.pso_mut().cache_render_targets(color, depth_stencil);
        base.submit(Command::Graphics(GraphicsCommand::SetRenderTargets(
            Box::new(RenderTargetBinding {
                color: color.to_vec(),
                depth_stencil: depth_stencil.copied(),
            }),
        )));
    }

    /// Opens a render pass.
    fn begin_render_pass(&mut self, info: &RenderPassInfo) {
        let base = self.list_base();
        assert!(
            !base.is_inside_render_pass(),
            "begin_render_pass called inside a render pass"
        );
        assert!(
            !base.is_inside_compute_pass(),
            "begin_render_pass called inside a compute pass"
        );
        base.pso_mut().cache_render_pass(info);
        base.set_inside_render_pass(true);
        base.submit(Command::Graphics(GraphicsCommand::BeginRenderPass(
            Box::new(info.clone()),
        )));
    }

    /// Closes the open render pass.
    fn end_render_pass(&mut self) {
        let base = self.list_base();
        assert!(
            base.is_inside_render_pass(),
            "end_render_pass called without a matching begin_render_pass"
        );
        base.pso_mut().end_render_pass();
        base.set_inside_render_pass(false);
        base.submit(Command::Graphics(GraphicsCommand::EndRenderPass));
    }

    /// Advances to the next subpass of the open render pass.
    fn next_subpass(&mut self) {
        let base = self.list_base();
        assert!(
            base.is_inside_render_pass(),
            "next_subpass called without a matching begin_render_pass"
        );
        base.pso_mut().next_subpass();
        base.submit(Command::Graphics(GraphicsCommand::NextSubpass));
    }

    /// Opens a named compute pass on the graphics queue.
    fn begin_compute_pass(&mut self, name: &str) {
        let base = self.list_base();
        assert!(
            !base.is_inside_render_pass(),
            "begin_compute_pass called inside a render pass"
        );
        assert!(
            !base.is_inside_compute_pass(),
            "begin_compute_pass called inside a compute pass"
        );
        base.set_inside_compute_pass(true);
        let name = base.alloc_str(name);
        base.submit(Command::Graphics(GraphicsCommand::BeginComputePass { name }));
    }

    /// Closes the open compute pass.
    fn end_compute_pass(&mut self) {
        let base = self.list_base();
        assert!(
            base.is_inside_compute_pass(),
            "end_compute_pass called without a matching begin_compute_pass"
        );
        base.set_inside_compute_pass(false);
        base.submit(Command::Graphics(GraphicsCommand::EndComputePass));
    }

    /// Binds a graphics pipeline.
    ///
    /// The render-target formats, count and subpass of `desc` are replaced by
    /// the state of the last bound targets or render pass.
    fn set_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) {
        let base = self.list_base();
        let mut desc = desc.clone();
        base.pso().apply(&mut desc);
        base.submit(Command::Graphics(GraphicsCommand::SetGraphicsPipeline(
            Box::new(desc),
        )));
    }

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::SetViewport(viewport)));
    }

    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::SetScissorRect(rect)));
    }

    /// Sets the stencil reference value.
    fn set_stencil_ref(&mut self, value: u32) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::SetStencilRef(value)));
    }

    /// Sets the blend constant.
    fn set_blend_factor(&mut self, factor: [f32; 4]) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::SetBlendFactor(factor)));
    }

    /// Binds a vertex stream.
    fn set_stream_source(&mut self, stream_index: u32, buffer: BufferId, offset: u32) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::SetStreamSource {
                stream_index,
                buffer,
                offset,
            }));
    }

    /// Draws non-indexed primitives.
    fn draw_primitive(&mut self, base_vertex: u32, num_primitives: u32, num_instances: u32) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::DrawPrimitive {
                base_vertex,
                num_primitives,
                num_instances,
            }));
    }

    /// Draws indexed primitives.
    fn draw_indexed_primitive(&mut self, args: &DrawIndexedArgs) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::DrawIndexedPrimitive(*args)));
    }

    /// Draws with arguments read from a buffer.
    fn draw_primitive_indirect(&mut self, args: BufferId, offset: u32) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::DrawPrimitiveIndirect {
                args,
                offset,
            }));
    }

    /// Copies between textures. Not allowed inside a render pass.
    fn copy_texture(&mut self, source: TextureId, destination: TextureId, info: &CopyTextureInfo) {
        let base = self.list_base();
        base.assert_outside_render_pass("copy_texture");
        base.submit(Command::Graphics(GraphicsCommand::CopyTexture {
            source,
            destination,
            info: *info,
        }));
    }

    /// Copies a byte range between buffers. Not allowed inside a render pass.
    fn copy_buffer_region(
        &mut self,
        destination: BufferId,
        destination_offset: u64,
        source: BufferId,
        source_offset: u64,
        size: u64,
    ) {
        let base = self.list_base();
        base.assert_outside_render_pass("copy_buffer_region");
        base.submit(Command::Graphics(GraphicsCommand::CopyBufferRegion {
            destination,
            destination_offset,
            source,
            source_offset,
            size,
        }));
    }

    /// Resolves a multisampled texture. Not allowed inside a render pass.
    fn copy_to_resolve_target(&mut self, source: TextureId, destination: TextureId) {
        let base = self.list_base();
        base.assert_outside_render_pass("copy_to_resolve_target");
        base.submit(Command::Graphics(GraphicsCommand::CopyToResolveTarget {
            source,
            destination,
        }));
    }

    /// Clears a color texture. Not allowed inside a render pass.
    fn clear_color_texture(&mut self, texture: TextureId, color: [f32; 4]) {
        let base = self.list_base();
        base.assert_outside_render_pass("clear_color_texture");
        base.submit(Command::Graphics(GraphicsCommand::ClearColorTexture {
            texture,
            color,
        }));
    }

    /// Uploads bytes into a buffer. The bytes are copied.
    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let base = self.list_base();
        base.assert_outside_render_pass("update_buffer");
        let data = base.alloc_copy(data, 1);
        base.submit(Command::Graphics(GraphicsCommand::UpdateBuffer {
            buffer,
            offset,
            data,
        }));
    }

    /// Starts an occlusion or timer query.
    fn begin_render_query(&mut self, query: QueryId) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::BeginRenderQuery(query)));
    }

    /// Ends a query.
    fn end_render_query(&mut self, query: QueryId) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::EndRenderQuery(query)));
    }

    /// Drops any state the back end caches between calls.
    fn invalidate_cached_state(&mut self) {
        self.list_base()
            .submit(Command::Graphics(GraphicsCommand::InvalidateCachedState));
    }
}

/// A graphics command list created by a caller.
///
/// Record through [`GraphicsCommands`], then hand it to the executor or
/// replay it directly with [`CommandList::execute_on`].
pub struct CommandList {
    pub(crate) base: CommandListBase,
}

impl CommandList {
    /// Creates an unbound, deferred graphics list.
    pub fn new(registry: &Arc<ListRegistry>) -> Self {
        Self::with_binding(registry, ListKind::Regular, ContextBinding::default(), false)
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
    pub fn execute_on(&mut self, context: &mut dyn CommandContext) {
        self.base.execute_graphics_in_place(context);
    }

    /// Drops recorded commands and starts recording again under a new UID.
    pub fn reset(&mut self) {
        self.base.reset();
    }

    pub(crate) fn into_recorded(self) -> RecordedList {
        self.base.into_recorded()
    }
}

impl ComputeCommands for CommandList {
    fn list_base(&mut self) -> &mut CommandListBase {
        &mut self.base
    }
}

impl GraphicsCommands for CommandList {}

impl Deref for CommandList {
    type Target = CommandListBase;

    fn deref(&self) -> &CommandListBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::api::PixelFormat;
    use strata_core::ArenaConfig;

    fn list() -> CommandList {
        CommandList::new(&ListRegistry::new(ArenaConfig::default()))
    }

    fn target(id: u64) -> RenderTargetView {
        RenderTargetView::new(TextureId(id), PixelFormat::Rgba8Unorm)
    }

    #[test]
    fn test_render_pass_tracks_state() {
        let mut list = list();
        list.begin_render_pass(&RenderPassInfo::single(target(1)));
        assert!(list.is_inside_render_pass());
        list.draw_primitive(0, 2, 1);
        list.end_render_pass();
        assert!(!list.is_inside_render_pass());
        assert_eq!(
            list.command_names(),
            vec!["BeginRenderPass", "DrawPrimitive", "EndRenderPass"]
        );
    }

    #[test]
    #[should_panic(expected = "begin_render_pass called inside a render pass")]
    fn test_nested_render_pass_panics() {
        let mut list = list();
        list.begin_render_pass(&RenderPassInfo::single(target(1)));
        list.begin_render_pass(&RenderPassInfo::single(target(2)));
    }

    #[test]
    #[should_panic(expected = "without a matching begin_render_pass")]
    fn test_unmatched_end_render_pass_panics() {
        list().end_render_pass();
    }

    #[test]
    #[should_panic(expected = "copy_texture is not allowed inside a render pass")]
    fn test_copy_inside_render_pass_panics() {
        let mut list = list();
        list.begin_render_pass(&RenderPassInfo::single(target(1)));
        list.copy_texture(TextureId(1), TextureId(2), &CopyTextureInfo::default());
    }

    #[test]
    #[should_panic(expected = "at most 8 are supported")]
    fn test_too_many_render_targets_panics() {
        let targets: Vec<_> = (0..9).map(target).collect();
        list().set_render_targets(&targets, None);
    }

    #[test]
    #[should_panic(expected = "begin_render_pass called inside a compute pass")]
    fn test_render_pass_inside_compute_pass_panics() {
        let mut list = list();
        list.begin_compute_pass("Lighting");
        list.begin_render_pass(&RenderPassInfo::single(target(1)));
    }
}
