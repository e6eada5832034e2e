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

//! The recorded command objects and their replay.
//!
//! Each recordable operation is one variant carrying exactly its arguments.
//! Variable-size arguments live in the owning list's arena and are referenced
//! through [`ScratchRange`]s. Replaying a command consumes it.

use crate::list::PendingCommandList;
use crate::recorded::{ExecutionState, RecordedList, Replay, ReplayTarget};
use bytemuck::{Pod, Zeroable};
use crossbeam_channel::Receiver;
use strata_core::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, CopyTextureInfo,
    DepthRenderTargetView, DrawIndexedArgs, GpuFenceId, GraphicsPipelineDesc, QueryId,
    RenderPassInfo, RenderTargetView, ResourceAccess, ScissorRect, ShaderStage, StagingBufferId,
    TextureId, TransitionInfo, TransitionPipeline, TransitionResource, UavId, UniformBufferId,
    UniformLayoutId, Viewport, ViewportId,
};
use strata_core::arena::{MemStack, ScratchRange};
use strata_core::context::{lock_context, CommandContext, ComputeContext, ContextContainer};
use strata_core::CompletionEvent;

/// A deferred closure run against the graphics context.
pub(crate) type Lambda = Box<dyn FnOnce(&mut dyn CommandContext) + Send>;

pub(crate) enum Command {
    Compute(ComputeCommand),
    Graphics(GraphicsCommand),
    Control(ControlCommand),
}

pub(crate) enum ComputeCommand {
    SetComputePipeline(ComputePipelineId),
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        args: BufferId,
        offset: u64,
    },
    Transition(ScratchRange),
    SetShaderParameter {
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: ScratchRange,
    },
    SetUniformBuffer {
        stage: ShaderStage,
        base_index: u32,
        buffer: UniformBufferId,
    },
    BuildLocalUniformBuffer {
        slot: u32,
        layout: UniformLayoutId,
        contents: ScratchRange,
    },
    SetLocalUniformBuffer {
        stage: ShaderStage,
        base_index: u32,
        slot: u32,
    },
    PushEvent {
        name: ScratchRange,
        color: u32,
    },
    PopEvent,
    WriteGpuFence(GpuFenceId),
    WaitComputeFence(ComputeFenceId),
    SetAsyncComputeBudget(AsyncComputeBudget),
    CopyToStagingBuffer {
        source: BufferId,
        destination: StagingBufferId,
        offset: u64,
        size: u64,
    },
    ClearUav {
        uav: UavId,
        values: [u32; 4],
    },
    SubmitCommandsHint,
}

pub(crate) struct RenderTargetBinding {
    pub(crate) color: Vec<RenderTargetView>,
    pub(crate) depth_stencil: Option<DepthRenderTargetView>,
}

pub(crate) enum GraphicsCommand {
    SetRenderTargets(Box<RenderTargetBinding>),
    BeginRenderPass(Box<RenderPassInfo>),
    EndRenderPass,
    NextSubpass,
    BeginComputePass {
        name: ScratchRange,
    },
    EndComputePass,
    SetGraphicsPipeline(Box<GraphicsPipelineDesc>),
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    SetStencilRef(u32),
    SetBlendFactor([f32; 4]),
    SetStreamSource {
        stream_index: u32,
        buffer: BufferId,
        offset: u32,
    },
    DrawPrimitive {
        base_vertex: u32,
        num_primitives: u32,
        num_instances: u32,
    },
    DrawIndexedPrimitive(DrawIndexedArgs),
    DrawPrimitiveIndirect {
        args: BufferId,
        offset: u32,
    },
    CopyTexture {
        source: TextureId,
        destination: TextureId,
        info: CopyTextureInfo,
    },
    CopyBufferRegion {
        destination: BufferId,
        destination_offset: u64,
        source: BufferId,
        source_offset: u64,
        size: u64,
    },
    CopyToResolveTarget {
        source: TextureId,
        destination: TextureId,
    },
    ClearColorTexture {
        texture: TextureId,
        color: [f32; 4],
    },
    UpdateBuffer {
        buffer: BufferId,
        offset: u64,
        data: ScratchRange,
    },
    BeginRenderQuery(QueryId),
    EndRenderQuery(QueryId),
    BeginFrame,
    EndFrame,
    BeginScene,
    EndScene,
    BeginDrawingViewport {
        viewport: ViewportId,
        render_target: Option<TextureId>,
    },
    EndDrawingViewport {
        viewport: ViewportId,
        present: bool,
        lock_to_vsync: bool,
    },
    InvalidateCachedState,
}

pub(crate) enum ControlCommand {
    Lambda(Lambda),
    SubmitSubList(RecordedList),
    WaitForAndSubmitSubList(PendingCommandList),
    WaitForAndSubmitTranslated {
        index: usize,
        num: usize,
        handoff: Receiver<Box<dyn ContextContainer>>,
    },
    SubmitAsyncCompute(RecordedList),
    SignalFence(CompletionEvent),
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Compute(command) => command.name(),
            Command::Graphics(command) => command.name(),
            Command::Control(command) => command.name(),
        }
    }

    pub(crate) fn execute(self, replay: &mut Replay<'_>) {
        match self {
            Command::Compute(command) => match &mut replay.target {
                ReplayTarget::Graphics(ctx) => {
                    command.execute(&mut **ctx, replay.scratch, replay.state)
                }
                ReplayTarget::Compute(ctx) => {
                    command.execute(&mut **ctx, replay.scratch, replay.state)
                }
            },
            Command::Graphics(command) => {
                let ReplayTarget::Graphics(ctx) = &mut replay.target else {
                    panic!(
                        "graphics command {} replayed on a compute-only context",
                        command.name()
                    );
                };
                command.execute(&mut **ctx, replay.scratch, replay.state);
            }
            Command::Control(command) => command.execute(replay),
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ComputeCommand {
    fn name(&self) -> &'static str {
        match self {
            ComputeCommand::SetComputePipeline(_) => "SetComputePipeline",
            ComputeCommand::Dispatch { .. } => "DispatchCompute",
            ComputeCommand::DispatchIndirect { .. } => "DispatchIndirect",
            ComputeCommand::Transition(_) => "TransitionResources",
            ComputeCommand::SetShaderParameter { .. } => "SetShaderParameter",
            ComputeCommand::SetUniformBuffer { .. } => "SetUniformBuffer",
            ComputeCommand::BuildLocalUniformBuffer { .. } => "BuildLocalUniformBuffer",
            ComputeCommand::SetLocalUniformBuffer { .. } => "SetLocalUniformBuffer",
            ComputeCommand::PushEvent { .. } => "PushEvent",
            ComputeCommand::PopEvent => "PopEvent",
            ComputeCommand::WriteGpuFence(_) => "WriteGpuFence",
            ComputeCommand::WaitComputeFence(_) => "WaitComputeFence",
            ComputeCommand::SetAsyncComputeBudget(_) => "SetAsyncComputeBudget",
            ComputeCommand::CopyToStagingBuffer { .. } => "CopyToStagingBuffer",
            ComputeCommand::ClearUav { .. } => "ClearUav",
            ComputeCommand::SubmitCommandsHint => "SubmitCommandsHint",
        }
    }

    fn execute<C>(self, ctx: &mut C, scratch: &MemStack, state: &mut ExecutionState)
    where
        C: ComputeContext + ?Sized,
    {
        match self {
            ComputeCommand::SetComputePipeline(pipeline) => ctx.set_compute_pipeline(pipeline),
            ComputeCommand::Dispatch { x, y, z } => ctx.dispatch_compute(x, y, z),
            ComputeCommand::DispatchIndirect { args, offset } => {
                ctx.dispatch_indirect(args, offset)
            }
            ComputeCommand::Transition(range) => {
                ctx.transition_resources(&unpack_transitions(scratch.bytes(range)));
            }
            ComputeCommand::SetShaderParameter {
                stage,
                buffer_index,
                base_index,
                value,
            } => ctx.set_shader_parameter(stage, buffer_index, base_index, scratch.bytes(value)),
            ComputeCommand::SetUniformBuffer {
                stage,
                base_index,
                buffer,
            } => ctx.set_uniform_buffer(stage, base_index, buffer),
            ComputeCommand::BuildLocalUniformBuffer {
                slot,
                layout,
                contents,
            } => {
                let buffer = ctx.create_uniform_buffer(layout, scratch.bytes(contents));
                state.store_uniform_buffer(slot, buffer);
            }
            ComputeCommand::SetLocalUniformBuffer {
                stage,
                base_index,
                slot,
            } => ctx.set_uniform_buffer(stage, base_index, state.uniform_buffer(slot)),
            ComputeCommand::PushEvent { name, color } => {
                let name = scratch.str_at(name);
                state.debug.push_marker(name);
                ctx.push_event(name, color);
            }
            ComputeCommand::PopEvent => {
                state.debug.pop_marker();
                ctx.pop_event();
            }
            ComputeCommand::WriteGpuFence(fence) => ctx.write_gpu_fence(fence),
            ComputeCommand::WaitComputeFence(fence) => ctx.wait_compute_fence(fence),
            ComputeCommand::SetAsyncComputeBudget(budget) => ctx.set_async_compute_budget(budget),
            ComputeCommand::CopyToStagingBuffer {
                source,
                destination,
                offset,
                size,
            } => ctx.copy_to_staging_buffer(source, destination, offset, size),
            ComputeCommand::ClearUav { uav, values } => ctx.clear_uav(uav, values),
            ComputeCommand::SubmitCommandsHint => ctx.submit_commands_hint(),
        }
    }
}

impl GraphicsCommand {
    fn name(&self) -> &'static str {
        match self {
            GraphicsCommand::SetRenderTargets(_) => "SetRenderTargets",
            GraphicsCommand::BeginRenderPass(_) => "BeginRenderPass",
            GraphicsCommand::EndRenderPass => "EndRenderPass",
            GraphicsCommand::NextSubpass => "NextSubpass",
            GraphicsCommand::BeginComputePass { .. } => "BeginComputePass",
            GraphicsCommand::EndComputePass => "EndComputePass",
            GraphicsCommand::SetGraphicsPipeline(_) => "SetGraphicsPipeline",
            GraphicsCommand::SetViewport(_) => "SetViewport",
            GraphicsCommand::SetScissorRect(_) => "SetScissorRect",
            GraphicsCommand::SetStencilRef(_) => "SetStencilRef",
            GraphicsCommand::SetBlendFactor(_) => "SetBlendFactor",
            GraphicsCommand::SetStreamSource { .. } => "SetStreamSource",
            GraphicsCommand::DrawPrimitive { .. } => "DrawPrimitive",
            GraphicsCommand::DrawIndexedPrimitive(_) => "DrawIndexedPrimitive",
            GraphicsCommand::DrawPrimitiveIndirect { .. } => "DrawPrimitiveIndirect",
            GraphicsCommand::CopyTexture { .. } => "CopyTexture",
            GraphicsCommand::CopyBufferRegion { .. } => "CopyBufferRegion",
            GraphicsCommand::CopyToResolveTarget { .. } => "CopyToResolveTarget",
            GraphicsCommand::ClearColorTexture { .. } => "ClearColorTexture",
            GraphicsCommand::UpdateBuffer { .. } => "UpdateBuffer",
            GraphicsCommand::BeginRenderQuery(_) => "BeginRenderQuery",
            GraphicsCommand::EndRenderQuery(_) => "EndRenderQuery",
            GraphicsCommand::BeginFrame => "BeginFrame",
            GraphicsCommand::EndFrame => "EndFrame",
            GraphicsCommand::BeginScene => "BeginScene",
            GraphicsCommand::EndScene => "EndScene",
            GraphicsCommand::BeginDrawingViewport { .. } => "BeginDrawingViewport",
            GraphicsCommand::EndDrawingViewport { .. } => "EndDrawingViewport",
            GraphicsCommand::InvalidateCachedState => "InvalidateCachedState",
        }
    }

    fn execute(self, ctx: &mut dyn CommandContext, scratch: &MemStack, state: &mut ExecutionState) {
        match self {
            GraphicsCommand::SetRenderTargets(binding) => {
                ctx.set_render_targets(&binding.color, binding.depth_stencil.as_ref());
            }
            GraphicsCommand::BeginRenderPass(info) => ctx.begin_render_pass(&info),
            GraphicsCommand::EndRenderPass => ctx.end_render_pass(),
            GraphicsCommand::NextSubpass => ctx.next_subpass(),
            GraphicsCommand::BeginComputePass { name } => {
                let name = scratch.str_at(name);
                state.debug.push_marker(name);
                ctx.begin_compute_pass(name);
            }
            GraphicsCommand::EndComputePass => {
                state.debug.pop_marker();
                ctx.end_compute_pass();
            }
            GraphicsCommand::SetGraphicsPipeline(desc) => ctx.set_graphics_pipeline(&desc),
            GraphicsCommand::SetViewport(viewport) => ctx.set_viewport(viewport),
            GraphicsCommand::SetScissorRect(rect) => ctx.set_scissor_rect(rect),
            GraphicsCommand::SetStencilRef(value) => ctx.set_stencil_ref(value),
            GraphicsCommand::SetBlendFactor(factor) => ctx.set_blend_factor(factor),
            GraphicsCommand::SetStreamSource {
                stream_index,
                buffer,
                offset,
            } => ctx.set_stream_source(stream_index, buffer, offset),
            GraphicsCommand::DrawPrimitive {
                base_vertex,
                num_primitives,
                num_instances,
            } => ctx.draw_primitive(base_vertex, num_primitives, num_instances),
            GraphicsCommand::DrawIndexedPrimitive(args) => ctx.draw_indexed_primitive(&args),
            GraphicsCommand::DrawPrimitiveIndirect { args, offset } => {
                ctx.draw_primitive_indirect(args, offset);
            }
            GraphicsCommand::CopyTexture {
                source,
                destination,
                info,
            } => ctx.copy_texture(source, destination, &info),
            GraphicsCommand::CopyBufferRegion {
                destination,
                destination_offset,
                source,
                source_offset,
                size,
            } => ctx.copy_buffer_region(
                destination,
                destination_offset,
                source,
                source_offset,
                size,
            ),
            GraphicsCommand::CopyToResolveTarget {
                source,
                destination,
            } => ctx.copy_to_resolve_target(source, destination),
            GraphicsCommand::ClearColorTexture { texture, color } => {
                ctx.clear_color_texture(texture, color);
            }
            GraphicsCommand::UpdateBuffer {
                buffer,
                offset,
                data,
            } => ctx.update_buffer(buffer, offset, scratch.bytes(data)),
            GraphicsCommand::BeginRenderQuery(query) => ctx.begin_render_query(query),
            GraphicsCommand::EndRenderQuery(query) => ctx.end_render_query(query),
            GraphicsCommand::BeginFrame => ctx.begin_frame(),
            GraphicsCommand::EndFrame => ctx.end_frame(),
            GraphicsCommand::BeginScene => ctx.begin_scene(),
            GraphicsCommand::EndScene => ctx.end_scene(),
            GraphicsCommand::BeginDrawingViewport {
                viewport,
                render_target,
            } => ctx.begin_drawing_viewport(viewport, render_target),
            GraphicsCommand::EndDrawingViewport {
                viewport,
                present,
                lock_to_vsync,
            } => ctx.end_drawing_viewport(viewport, present, lock_to_vsync),
            GraphicsCommand::InvalidateCachedState => ctx.invalidate_cached_state(),
        }
    }
}

impl ControlCommand {
    fn name(&self) -> &'static str {
        match self {
            ControlCommand::Lambda(_) => "Lambda",
            ControlCommand::SubmitSubList(_) => "SubmitSubList",
            ControlCommand::WaitForAndSubmitSubList(_) => "WaitForAndSubmitSubList",
            ControlCommand::WaitForAndSubmitTranslated { .. } => "WaitForAndSubmitSubListParallel",
            ControlCommand::SubmitAsyncCompute(_) => "SubmitAsyncCompute",
            ControlCommand::SignalFence(_) => "RhiThreadFence",
        }
    }

    fn execute(self, replay: &mut Replay<'_>) {
        match self {
            ControlCommand::Lambda(lambda) => {
                let ReplayTarget::Graphics(ctx) = &mut replay.target else {
                    panic!("lambda command replayed on a compute-only context");
                };
                lambda(&mut **ctx);
            }
            ControlCommand::SubmitSubList(list) => {
                let executed = list.execute(replay.target.reborrow(), replay.compute);
                replay.state.nested_commands += executed;
            }
            ControlCommand::WaitForAndSubmitSubList(pending) => {
                let list = pending.wait();
                let executed = list.execute(replay.target.reborrow(), replay.compute);
                replay.state.nested_commands += executed;
            }
            ControlCommand::WaitForAndSubmitTranslated {
                index,
                num,
                handoff,
            } => {
                let Ok(container) = handoff.recv() else {
                    log::error!("Parallel translate batch {index} of {num} failed.");
                    panic!("parallel translate batch {index} of {num} never finished translating");
                };
                container.submit(index, num);
            }
            ControlCommand::SubmitAsyncCompute(list) => {
                let executed = match replay.compute {
                    Some(slot) => {
                        let mut ctx = lock_context(slot);
                        list.execute(ReplayTarget::Compute(&mut **ctx), None)
                    }
                    None => list.execute(replay.target.reborrow(), None),
                };
                replay.state.nested_commands += executed;
            }
            ControlCommand::SignalFence(event) => event.signal(),
        }
    }
}

/// Fixed-layout form of a [`TransitionInfo`] stored in a list's arena.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PackedTransition {
    resource: u64,
    resource_kind: u32,
    access: u32,
    pipeline: u32,
    _pad: u32,
}

impl PackedTransition {
    fn pack(info: &TransitionInfo) -> Self {
        let (resource_kind, resource) = match info.resource {
            TransitionResource::Texture(id) => (0, id.0),
            TransitionResource::Uav(id) => (1, id.0),
            TransitionResource::Buffer(id) => (2, id.0),
        };
        let access = match info.access {
            ResourceAccess::Readable => 0,
            ResourceAccess::Writable => 1,
            ResourceAccess::ReadWriteBarrier => 2,
            ResourceAccess::ReadWriteNoBarrier => 3,
        };
        let pipeline = match info.pipeline {
            TransitionPipeline::GraphicsToGraphics => 0,
            TransitionPipeline::GraphicsToCompute => 1,
            TransitionPipeline::ComputeToGraphics => 2,
            TransitionPipeline::ComputeToCompute => 3,
        };
        Self {
            resource,
            resource_kind,
            access,
            pipeline,
            _pad: 0,
        }
    }

    fn unpack(self) -> TransitionInfo {
        let resource = match self.resource_kind {
            0 => TransitionResource::Texture(TextureId(self.resource)),
            1 => TransitionResource::Uav(UavId(self.resource)),
            _ => TransitionResource::Buffer(BufferId(self.resource)),
        };
        let access = match self.access {
            0 => ResourceAccess::Readable,
            1 => ResourceAccess::Writable,
            2 => ResourceAccess::ReadWriteBarrier,
            _ => ResourceAccess::ReadWriteNoBarrier,
        };
        let pipeline = match self.pipeline {
            0 => TransitionPipeline::GraphicsToGraphics,
            1 => TransitionPipeline::GraphicsToCompute,
            2 => TransitionPipeline::ComputeToGraphics,
            _ => TransitionPipeline::ComputeToCompute,
        };
        TransitionInfo {
            resource,
            access,
            pipeline,
        }
    }
}

pub(crate) fn pack_transitions(
    scratch: &mut MemStack,
    transitions: &[TransitionInfo],
) -> ScratchRange {
    let packed: Vec<PackedTransition> = transitions.iter().map(PackedTransition::pack).collect();
    scratch.alloc_slice(&packed)
}

fn unpack_transitions(bytes: &[u8]) -> Vec<TransitionInfo> {
    bytes
        .chunks_exact(std::mem::size_of::<PackedTransition>())
        .map(|chunk| bytemuck::pod_read_unaligned::<PackedTransition>(chunk).unpack())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_survive_the_arena() {
        let transitions = [
            TransitionInfo::texture(TextureId(4), ResourceAccess::Writable),
            TransitionInfo::uav(
                UavId(9),
                ResourceAccess::ReadWriteNoBarrier,
                TransitionPipeline::ComputeToGraphics,
            ),
            TransitionInfo {
                resource: TransitionResource::Buffer(BufferId(1)),
                access: ResourceAccess::Readable,
                pipeline: TransitionPipeline::ComputeToCompute,
            },
        ];
        let mut scratch = MemStack::new(1024, 4096);
        let range = pack_transitions(&mut scratch, &transitions);
        assert_eq!(range.len(), 3 * 24);
        assert_eq!(unpack_transitions(scratch.bytes(range)), transitions);
    }
}
