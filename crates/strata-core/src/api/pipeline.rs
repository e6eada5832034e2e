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

//! Pipeline state descriptions and draw arguments.

use super::pass::{SubpassHint, MAX_SIMULTANEOUS_RENDER_TARGETS};
use super::resource::BufferId;

/// Texel formats understood by pipeline descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// No format. Used for unbound slots.
    #[default]
    Unknown,
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit BGRA, normalized.
    Bgra8Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float single channel.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

/// The shader stage a parameter or uniform buffer binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Pixel (fragment) shader.
    Pixel,
    /// Compute shader.
    Compute,
}

/// An opaque handle to a compiled shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u64);

/// An opaque handle to a compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineId(pub u64);

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// A triangle strip.
    TriangleStrip,
    /// Independent lines.
    LineList,
    /// Points.
    PointList,
}

/// Describes a graphics pipeline.
///
/// The render-target part (`render_target_formats`, `num_render_targets`,
/// `depth_stencil_format`, `subpass_hint`, `subpass_index`) does not have to be
/// filled in by the caller: command lists complete it from the render targets
/// that were bound when the pipeline is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphicsPipelineDesc {
    /// Vertex shader.
    pub vertex_shader: Option<ShaderId>,
    /// Pixel shader.
    pub pixel_shader: Option<ShaderId>,
    /// Topology.
    pub primitive_type: PrimitiveType,
    /// Formats of the bound color targets, [`PixelFormat::Unknown`] when unbound.
    pub render_target_formats: [PixelFormat; MAX_SIMULTANEOUS_RENDER_TARGETS],
    /// Number of bound color targets.
    pub num_render_targets: u32,
    /// Format of the bound depth target.
    pub depth_stencil_format: PixelFormat,
    /// Subpass layout of the enclosing render pass.
    pub subpass_hint: SubpassHint,
    /// Index of the subpass the pipeline is used in.
    pub subpass_index: u8,
    /// An optional debug label.
    pub label: Option<String>,
}

/// Arguments of an indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawIndexedArgs {
    /// The index buffer.
    pub index_buffer: BufferId,
    /// Added to each index before fetching vertices.
    pub base_vertex_index: i32,
    /// First instance id.
    pub first_instance: u32,
    /// Number of vertices referenced.
    pub num_vertices: u32,
    /// First index read.
    pub start_index: u32,
    /// Number of primitives drawn.
    pub num_primitives: u32,
    /// Number of instances drawn.
    pub num_instances: u32,
}
