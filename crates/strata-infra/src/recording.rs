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

//! A back end that records every call it receives.
//!
//! Used to observe exactly what reached the back end, and in which order,
//! whatever path the calls took through the executor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::api::{
    AsyncComputeBudget, BufferId, ComputeFenceId, ComputePipelineId, CopyTextureInfo,
    DepthRenderTargetView, DrawIndexedArgs, GpuFenceId, GraphicsPipelineDesc, QueryId,
    RenderPassInfo, RenderTargetView, ScissorRect, ShaderStage, StagingBufferId, TextureId,
    TransitionInfo, UavId, UniformBufferId, UniformLayoutId, Viewport, ViewportId,
};
use strata_core::context::{
    CommandContext, ComputeContext, ContextContainer, ParallelContextProvider,
};

/// One call received by a [`RecordingContext`], with owned arguments.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum BackendCall {
    SetComputePipeline(ComputePipelineId),
    DispatchCompute { x: u32, y: u32, z: u32 },
    DispatchIndirect { args: BufferId, offset: u64 },
    TransitionResources(Vec<TransitionInfo>),
    SetShaderParameter {
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: Vec<u8>,
    },
    SetUniformBuffer {
        stage: ShaderStage,
        base_index: u32,
        buffer: UniformBufferId,
    },
    CreateUniformBuffer {
        layout: UniformLayoutId,
        contents: Vec<u8>,
        buffer: UniformBufferId,
    },
    PushEvent { name: String, color: u32 },
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
    ClearUav { uav: UavId, values: [u32; 4] },
    SubmitCommandsHint,
    SetRenderTargets {
        color: Vec<RenderTargetView>,
        depth_stencil: Option<DepthRenderTargetView>,
    },
    BeginRenderPass(RenderPassInfo),
    EndRenderPass,
    NextSubpass,
    BeginComputePass(String),
    EndComputePass,
    SetGraphicsPipeline(GraphicsPipelineDesc),
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
    DrawPrimitiveIndirect { args: BufferId, offset: u32 },
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
    ClearColorTexture { texture: TextureId, color: [f32; 4] },
    UpdateBuffer {
        buffer: BufferId,
        offset: u64,
        data: Vec<u8>,
    },
    ReadBuffer {
        buffer: BufferId,
        offset: u64,
        size: u64,
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
    /// A translated container was submitted.
    SubmitContainer { index: usize, num: usize },
}

impl BackendCall {
    /// The call's name, matching the context method in CamelCase.
    pub fn name(&self) -> &'static str {
        match self {
            BackendCall::SetComputePipeline(_) => "SetComputePipeline",
            BackendCall::DispatchCompute { .. } => "DispatchCompute",
            BackendCall::DispatchIndirect { .. } => "DispatchIndirect",
            BackendCall::TransitionResources(_) => "TransitionResources",
            BackendCall::SetShaderParameter { .. } => "SetShaderParameter",
            BackendCall::SetUniformBuffer { .. } => "SetUniformBuffer",
            BackendCall::CreateUniformBuffer { .. } => "CreateUniformBuffer",
            BackendCall::PushEvent { .. } => "PushEvent",
            BackendCall::PopEvent => "PopEvent",
            BackendCall::WriteGpuFence(_) => "WriteGpuFence",
            BackendCall::WaitComputeFence(_) => "WaitComputeFence",
            BackendCall::SetAsyncComputeBudget(_) => "SetAsyncComputeBudget",
            BackendCall::CopyToStagingBuffer { .. } => "CopyToStagingBuffer",
            BackendCall::ClearUav { .. } => "ClearUav",
            BackendCall::SubmitCommandsHint => "SubmitCommandsHint",
            BackendCall::SetRenderTargets { .. } => "SetRenderTargets",
            BackendCall::BeginRenderPass(_) => "BeginRenderPass",
            BackendCall::EndRenderPass => "EndRenderPass",
            BackendCall::NextSubpass => "NextSubpass",
            BackendCall::BeginComputePass(_) => "BeginComputePass",
            BackendCall::EndComputePass => "EndComputePass",
            BackendCall::SetGraphicsPipeline(_) => "SetGraphicsPipeline",
            BackendCall::SetViewport(_) => "SetViewport",
            BackendCall::SetScissorRect(_) => "SetScissorRect",
            BackendCall::SetStencilRef(_) => "SetStencilRef",
            BackendCall::SetBlendFactor(_) => "SetBlendFactor",
            BackendCall::SetStreamSource { .. } => "SetStreamSource",
            BackendCall::DrawPrimitive { .. } => "DrawPrimitive",
            BackendCall::DrawIndexedPrimitive(_) => "DrawIndexedPrimitive",
            BackendCall::DrawPrimitiveIndirect { .. } => "DrawPrimitiveIndirect",
            BackendCall::CopyTexture { .. } => "CopyTexture",
            BackendCall::CopyBufferRegion { .. } => "CopyBufferRegion",
            BackendCall::CopyToResolveTarget { .. } => "CopyToResolveTarget",
            BackendCall::ClearColorTexture { .. } => "ClearColorTexture",
            BackendCall::UpdateBuffer { .. } => "UpdateBuffer",
            BackendCall::ReadBuffer { .. } => "ReadBuffer",
            BackendCall::BeginRenderQuery(_) => "BeginRenderQuery",
            BackendCall::EndRenderQuery(_) => "EndRenderQuery",
            BackendCall::BeginFrame => "BeginFrame",
            BackendCall::EndFrame => "EndFrame",
            BackendCall::BeginScene => "BeginScene",
            BackendCall::EndScene => "EndScene",
            BackendCall::BeginDrawingViewport { .. } => "BeginDrawingViewport",
            BackendCall::EndDrawingViewport { .. } => "EndDrawingViewport",
            BackendCall::InvalidateCachedState => "InvalidateCachedState",
            BackendCall::SubmitContainer { .. } => "SubmitContainer",
        }
    }
}

/// A call plus the context that received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Label of the receiving context.
    pub context: String,
    /// The call.
    pub call: BackendCall,
}

/// A shared, append-only trace of back-end calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call, in the order received.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.entries().iter().map(|e| e.call.clone()).collect()
    }

    /// Every call with the label of the context that received it.
    pub fn entries(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    /// Calls received by the context labelled `context`.
    pub fn calls_for(&self, context: &str) -> Vec<BackendCall> {
        self.lock()
            .iter()
            .filter(|e| e.context == context)
            .map(|e| e.call.clone())
            .collect()
    }

    /// Names of every call, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.lock().iter().map(|e| e.call.name()).collect()
    }

    /// Number of calls received.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no call was received.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forgets every call.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, context: &str, call: BackendCall) {
        self.lock().push(RecordedCall {
            context: context.to_string(),
            call,
        });
    }

    fn append(&self, entries: Vec<RecordedCall>) {
        self.lock().extend(entries);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type BufferStore = Arc<Mutex<HashMap<BufferId, Vec<u8>>>>;

/// A context that appends every call it receives to a [`CallLog`].
///
/// Buffer updates are applied to an in-memory store so read-backs see them.
pub struct RecordingContext {
    label: String,
    log: CallLog,
    buffers: BufferStore,
    next_uniform_buffer: Arc<AtomicU64>,
    provider: Option<Arc<RecordingParallelProvider>>,
}

impl RecordingContext {
    /// Creates a context labelled `"graphics"`.
    pub fn new(log: CallLog) -> Self {
        Self::with_label("graphics", log)
    }

    /// Creates a context with a custom label, e.g. `"compute"`.
    pub fn with_label(label: &str, log: CallLog) -> Self {
        Self {
            label: label.to_string(),
            log,
            buffers: BufferStore::default(),
            next_uniform_buffer: Arc::new(AtomicU64::new(1)),
            provider: None,
        }
    }

    /// Offers parallel translate containers that record into the same log.
    pub fn with_parallel_translate(mut self) -> Self {
        self.provider = Some(Arc::new(RecordingParallelProvider::new(self.sibling())));
        self
    }

    /// Offers a parallel translate provider that declines every container.
    pub fn with_declining_parallel_translate(mut self) -> Self {
        let mut provider = RecordingParallelProvider::new(self.sibling());
        provider.accept = false;
        self.provider = Some(Arc::new(provider));
        self
    }

    /// The provider offered to the executor, if any.
    pub fn provider(&self) -> Option<Arc<RecordingParallelProvider>> {
        self.provider.clone()
    }

    /// The log this context appends to.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// The current contents of `buffer`.
    pub fn buffer_contents(&self, buffer: BufferId) -> Vec<u8> {
        lock(&self.buffers).get(&buffer).cloned().unwrap_or_default()
    }

    /// A context sharing this one's label, buffers and uniform ids, logging into `log`.
    fn sibling_into(&self, log: CallLog) -> Self {
        Self {
            label: self.label.clone(),
            log,
            buffers: Arc::clone(&self.buffers),
            next_uniform_buffer: Arc::clone(&self.next_uniform_buffer),
            provider: None,
        }
    }

    fn sibling(&self) -> Self {
        self.sibling_into(self.log.clone())
    }

    fn record(&self, call: BackendCall) {
        self.log.push(&self.label, call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn write_bytes(store: &BufferStore, buffer: BufferId, offset: u64, data: &[u8]) {
    let mut buffers = lock(store);
    let contents = buffers.entry(buffer).or_default();
    let end = offset as usize + data.len();
    if contents.len() < end {
        contents.resize(end, 0);
    }
    contents[offset as usize..end].copy_from_slice(data);
}

fn read_bytes(store: &BufferStore, buffer: BufferId, offset: u64, size: u64) -> Vec<u8> {
    let buffers = lock(store);
    let mut out = vec![0; size as usize];
    if let Some(contents) = buffers.get(&buffer) {
        let start = (offset as usize).min(contents.len());
        let end = (offset as usize + size as usize).min(contents.len());
        out[..end - start].copy_from_slice(&contents[start..end]);
    }
    out
}

impl ComputeContext for RecordingContext {
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineId) {
        self.record(BackendCall::SetComputePipeline(pipeline));
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record(BackendCall::DispatchCompute { x, y, z });
    }

    fn dispatch_indirect(&mut self, args: BufferId, offset: u64) {
        self.record(BackendCall::DispatchIndirect { args, offset });
    }

    fn transition_resources(&mut self, transitions: &[TransitionInfo]) {
        self.record(BackendCall::TransitionResources(transitions.to_vec()));
    }

    fn set_shader_parameter(
        &mut self,
        stage: ShaderStage,
        buffer_index: u32,
        base_index: u32,
        value: &[u8],
    ) {
        self.record(BackendCall::SetShaderParameter {
            stage,
            buffer_index,
            base_index,
            value: value.to_vec(),
        });
    }

    fn set_uniform_buffer(&mut self, stage: ShaderStage, base_index: u32, buffer: UniformBufferId) {
        self.record(BackendCall::SetUniformBuffer {
            stage,
            base_index,
            buffer,
        });
    }

    fn create_uniform_buffer(
        &mut self,
        layout: UniformLayoutId,
        contents: &[u8],
    ) -> UniformBufferId {
        let buffer = UniformBufferId(self.next_uniform_buffer.fetch_add(1, Ordering::Relaxed));
        self.record(BackendCall::CreateUniformBuffer {
            layout,
            contents: contents.to_vec(),
            buffer,
        });
        buffer
    }

    fn push_event(&mut self, name: &str, color: u32) {
        self.record(BackendCall::PushEvent {
            name: name.to_string(),
            color,
        });
    }

    fn pop_event(&mut self) {
        self.record(BackendCall::PopEvent);
    }

    fn write_gpu_fence(&mut self, fence: GpuFenceId) {
        self.record(BackendCall::WriteGpuFence(fence));
    }

    fn wait_compute_fence(&mut self, fence: ComputeFenceId) {
        self.record(BackendCall::WaitComputeFence(fence));
    }

    fn set_async_compute_budget(&mut self, budget: AsyncComputeBudget) {
        self.record(BackendCall::SetAsyncComputeBudget(budget));
    }

    fn copy_to_staging_buffer(
        &mut self,
        source: BufferId,
        destination: StagingBufferId,
        offset: u64,
        size: u64,
    ) {
        self.record(BackendCall::CopyToStagingBuffer {
            source,
            destination,
            offset,
            size,
        });
    }

    fn clear_uav(&mut self, uav: UavId, values: [u32; 4]) {
        self.record(BackendCall::ClearUav { uav, values });
    }

    fn submit_commands_hint(&mut self) {
        self.record(BackendCall::SubmitCommandsHint);
    }
}

impl CommandContext for RecordingContext {
    fn set_render_targets(
        &mut self,
        color: &[RenderTargetView],
        depth_stencil: Option<&DepthRenderTargetView>,
    ) {
        self.record(BackendCall::SetRenderTargets {
            color: color.to_vec(),
            depth_stencil: depth_stencil.copied(),
        });
    }

    fn begin_render_pass(&mut self, info: &RenderPassInfo) {
        self.record(BackendCall::BeginRenderPass(info.clone()));
    }

    fn end_render_pass(&mut self) {
        self.record(BackendCall::EndRenderPass);
    }

    fn next_subpass(&mut self) {
        self.record(BackendCall::NextSubpass);
    }

    fn begin_compute_pass(&mut self, name: &str) {
        self.record(BackendCall::BeginComputePass(name.to_string()));
    }

    fn end_compute_pass(&mut self) {
        self.record(BackendCall::EndComputePass);
    }

    fn set_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) {
        self.record(BackendCall::SetGraphicsPipeline(desc.clone()));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(BackendCall::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.record(BackendCall::SetScissorRect(rect));
    }

    fn set_stencil_ref(&mut self, value: u32) {
        self.record(BackendCall::SetStencilRef(value));
    }

    fn set_blend_factor(&mut self, factor: [f32; 4]) {
        self.record(BackendCall::SetBlendFactor(factor));
    }

    fn set_stream_source(&mut self, stream_index: u32, buffer: BufferId, offset: u32) {
        self.record(BackendCall::SetStreamSource {
            stream_index,
            buffer,
            offset,
        });
    }

    fn draw_primitive(&mut self, base_vertex: u32, num_primitives: u32, num_instances: u32) {
        self.record(BackendCall::DrawPrimitive {
            base_vertex,
            num_primitives,
            num_instances,
        });
    }

    fn draw_indexed_primitive(&mut self, args: &DrawIndexedArgs) {
        self.record(BackendCall::DrawIndexedPrimitive(*args));
    }

    fn draw_primitive_indirect(&mut self, args: BufferId, offset: u32) {
        self.record(BackendCall::DrawPrimitiveIndirect { args, offset });
    }

    fn copy_texture(&mut self, source: TextureId, destination: TextureId, info: &CopyTextureInfo) {
        self.record(BackendCall::CopyTexture {
            source,
            destination,
            info: *info,
        });
    }

    fn copy_buffer_region(
        &mut self,
        destination: BufferId,
        destination_offset: u64,
        source: BufferId,
        source_offset: u64,
        size: u64,
    ) {
        let data = read_bytes(&self.buffers, source, source_offset, size);
        write_bytes(&self.buffers, destination, destination_offset, &data);
        self.record(BackendCall::CopyBufferRegion {
            destination,
            destination_offset,
            source,
            source_offset,
            size,
        });
    }

    fn copy_to_resolve_target(&mut self, source: TextureId, destination: TextureId) {
        self.record(BackendCall::CopyToResolveTarget {
            source,
            destination,
        });
    }

    fn clear_color_texture(&mut self, texture: TextureId, color: [f32; 4]) {
        self.record(BackendCall::ClearColorTexture { texture, color });
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        write_bytes(&self.buffers, buffer, offset, data);
        self.record(BackendCall::UpdateBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, size: u64) -> Vec<u8> {
        self.record(BackendCall::ReadBuffer {
            buffer,
            offset,
            size,
        });
        read_bytes(&self.buffers, buffer, offset, size)
    }

    fn begin_render_query(&mut self, query: QueryId) {
        self.record(BackendCall::BeginRenderQuery(query));
    }

    fn end_render_query(&mut self, query: QueryId) {
        self.record(BackendCall::EndRenderQuery(query));
    }

    fn begin_frame(&mut self) {
        self.record(BackendCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.record(BackendCall::EndFrame);
    }

    fn begin_scene(&mut self) {
        self.record(BackendCall::BeginScene);
    }

    fn end_scene(&mut self) {
        self.record(BackendCall::EndScene);
    }

    fn begin_drawing_viewport(&mut self, viewport: ViewportId, render_target: Option<TextureId>) {
        self.record(BackendCall::BeginDrawingViewport {
            viewport,
            render_target,
        });
    }

    fn end_drawing_viewport(&mut self, viewport: ViewportId, present: bool, lock_to_vsync: bool) {
        self.record(BackendCall::EndDrawingViewport {
            viewport,
            present,
            lock_to_vsync,
        });
    }

    fn invalidate_cached_state(&mut self) {
        self.record(BackendCall::InvalidateCachedState);
    }

    fn parallel_provider(&self) -> Option<Arc<dyn ParallelContextProvider>> {
        self.provider
            .clone()
            .map(|provider| provider as Arc<dyn ParallelContextProvider>)
    }
}

/// Hands out [`RecordingContainer`]s for parallel translate.
pub struct RecordingParallelProvider {
    template: Mutex<RecordingContext>,
    accept: bool,
    created: AtomicUsize,
}

impl RecordingParallelProvider {
    fn new(template: RecordingContext) -> Self {
        Self {
            template: Mutex::new(template),
            accept: true,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of containers handed out.
    pub fn containers_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ParallelContextProvider for RecordingParallelProvider {
    fn create_container(&self, index: usize, num: usize) -> Option<Box<dyn ContextContainer>> {
        if !self.accept {
            return None;
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let template = lock(&self.template);
        let private = CallLog::new();
        Some(Box::new(RecordingContainer {
            context: template.sibling_into(private.clone()),
            private,
            target: template.log.clone(),
            index,
            num,
            finished: false,
        }))
    }
}

/// A context recorded into off-thread, whose calls join the main log only
/// when submitted.
pub struct RecordingContainer {
    context: RecordingContext,
    private: CallLog,
    target: CallLog,
    index: usize,
    num: usize,
    finished: bool,
}

impl ContextContainer for RecordingContainer {
    fn context(&mut self) -> &mut dyn CommandContext {
        &mut self.context
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn submit(self: Box<Self>, index: usize, num: usize) {
        assert!(self.finished, "container {index} of {num} submitted before it finished");
        assert_eq!(
            (self.index, self.num),
            (index, num),
            "container submitted under the wrong batch index"
        );
        self.target.push(
            &self.context.label,
            BackendCall::SubmitContainer { index, num },
        );
        self.target.append(self.private.entries());
    }
}
