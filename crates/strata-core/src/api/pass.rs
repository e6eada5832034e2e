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

//! Render targets, render pass descriptions and fixed-function rasteriser state.

use super::pipeline::PixelFormat;
use super::resource::{QueryId, TextureId};

/// The maximum number of color targets bound at once.
pub const MAX_SIMULTANEOUS_RENDER_TARGETS: usize = 8;

/// What happens to a target's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadAction {
    /// Keep the previous contents.
    #[default]
    Load,
    /// Clear to the target's clear value.
    Clear,
    /// Contents are undefined.
    NoAction,
}

/// What happens to a target's contents when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreAction {
    /// Write results back to memory.
    #[default]
    Store,
    /// Results may be discarded.
    DontCare,
}

/// A color render target binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetView {
    /// The texture rendered into.
    pub texture: TextureId,
    /// The format the texture is viewed with.
    pub format: PixelFormat,
    /// The mip level rendered into.
    pub mip_index: u32,
    /// The array slice rendered into, or all slices.
    pub array_slice: Option<u32>,
    /// Load action at the start of a pass.
    pub load: LoadAction,
    /// Store action at the end of a pass.
    pub store: StoreAction,
}

impl RenderTargetView {
    /// Binds mip 0 of `texture`, loading and storing its contents.
    pub fn new(texture: TextureId, format: PixelFormat) -> Self {
        Self {
            texture,
            format,
            mip_index: 0,
            array_slice: None,
            load: LoadAction::Load,
            store: StoreAction::Store,
        }
    }
}

/// A depth/stencil target binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRenderTargetView {
    /// The depth texture.
    pub texture: TextureId,
    /// The depth format.
    pub format: PixelFormat,
    /// Depth load action.
    pub depth_load: LoadAction,
    /// Depth store action.
    pub depth_store: StoreAction,
    /// Stencil load action.
    pub stencil_load: LoadAction,
    /// Stencil store action.
    pub stencil_store: StoreAction,
}

impl DepthRenderTargetView {
    /// Binds `texture` as depth/stencil, loading and storing both aspects.
    pub fn new(texture: TextureId, format: PixelFormat) -> Self {
        Self {
            texture,
            format,
            depth_load: LoadAction::Load,
            depth_store: StoreAction::Store,
            stencil_load: LoadAction::Load,
            stencil_store: StoreAction::Store,
        }
    }
}

/// Tells the back end how subpasses inside a render pass relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubpassHint {
    /// A single subpass.
    #[default]
    None,
    /// A second subpass reads the depth written by the first.
    DepthRead,
}

/// Describes a render pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassInfo {
    /// Color targets, at most [`MAX_SIMULTANEOUS_RENDER_TARGETS`].
    pub color_targets: Vec<RenderTargetView>,
    /// Optional depth/stencil target.
    pub depth_stencil: Option<DepthRenderTargetView>,
    /// Subpass layout hint.
    pub subpass_hint: SubpassHint,
    /// Occlusion queries issued inside the pass.
    pub occlusion_queries: Vec<QueryId>,
    /// An optional debug label.
    pub label: Option<String>,
}

impl RenderPassInfo {
    /// A pass rendering into a single color target.
    pub fn single(target: RenderTargetView) -> Self {
        Self {
            color_targets: vec![target],
            ..Default::default()
        }
    }
}

/// A viewport rectangle with depth range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge.
    pub min_x: f32,
    /// Top edge.
    pub min_y: f32,
    /// Near depth.
    pub min_z: f32,
    /// Right edge.
    pub max_x: f32,
    /// Bottom edge.
    pub max_y: f32,
    /// Far depth.
    pub max_z: f32,
}

impl Viewport {
    /// A `width` x `height` viewport at the origin with a 0..1 depth range.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            max_x: width,
            max_y: height,
            max_z: 1.0,
            ..Default::default()
        }
    }
}

/// A scissor rectangle. A disabled rect covers the whole target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// Whether scissoring is enabled.
    pub enabled: bool,
    /// Left edge.
    pub min_x: u32,
    /// Top edge.
    pub min_y: u32,
    /// Right edge.
    pub max_x: u32,
    /// Bottom edge.
    pub max_y: u32,
}

/// Region description for a texture-to-texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CopyTextureInfo {
    /// Size of the copied region. Zero means the whole source mip.
    pub size: [u32; 3],
    /// Origin in the source texture.
    pub source_position: [u32; 3],
    /// Origin in the destination texture.
    pub dest_position: [u32; 3],
    /// Source mip level.
    pub source_mip: u32,
    /// Destination mip level.
    pub dest_mip: u32,
    /// Number of mips copied.
    pub num_mips: u32,
}
