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

//! Opaque GPU resource handles and resource state transitions.
//!
//! Handles are plain ids minted by the back end. Command lists only carry them
//! around; they never dereference them.

/// An opaque handle to a GPU buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// An opaque handle to an unordered access view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UavId(pub u64);

/// An opaque handle to a CPU-readable staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagingBufferId(pub u64);

/// An opaque handle to a uniform buffer created by the back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBufferId(pub u64);

/// Identifies the layout a uniform buffer's contents follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLayoutId(pub u32);

/// An opaque handle to an occlusion or timestamp query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub u64);

/// An opaque handle to a presentable viewport (swap chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportId(pub u64);

/// A fence used to synchronise the async compute queue with the graphics queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputeFenceId(pub u64);

/// A slot in the GPU fence ring, see [`crate::fence::FenceAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuFenceId(pub u32);

/// The access a resource transitions to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceAccess {
    /// Read-only access from shaders or copies.
    Readable,
    /// Write access (render target, copy destination).
    Writable,
    /// Read/write access with a barrier between consecutive writes.
    ReadWriteBarrier,
    /// Read/write access where consecutive writes need no barrier.
    ReadWriteNoBarrier,
}

/// The pipelines on either side of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionPipeline {
    /// Graphics to graphics.
    #[default]
    GraphicsToGraphics,
    /// Graphics to compute.
    GraphicsToCompute,
    /// Compute to graphics.
    ComputeToGraphics,
    /// Compute to compute.
    ComputeToCompute,
}

/// The resource a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionResource {
    /// A whole texture.
    Texture(TextureId),
    /// An unordered access view.
    Uav(UavId),
    /// A whole buffer.
    Buffer(BufferId),
}

/// One entry of a batched resource transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionInfo {
    /// The resource being transitioned.
    pub resource: TransitionResource,
    /// The access the resource moves to.
    pub access: ResourceAccess,
    /// The pipelines involved.
    pub pipeline: TransitionPipeline,
}

impl TransitionInfo {
    /// A graphics-to-graphics transition of a texture.
    pub fn texture(texture: TextureId, access: ResourceAccess) -> Self {
        Self {
            resource: TransitionResource::Texture(texture),
            access,
            pipeline: TransitionPipeline::GraphicsToGraphics,
        }
    }

    /// A transition of an unordered access view between the given pipelines.
    pub fn uav(uav: UavId, access: ResourceAccess, pipeline: TransitionPipeline) -> Self {
        Self {
            resource: TransitionResource::Uav(uav),
            access,
            pipeline,
        }
    }
}

/// How a buffer lock accesses the buffer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// The caller fills a staging area that is uploaded on unlock.
    WriteOnly,
    /// The caller reads the buffer's current contents.
    ReadOnly,
}

/// The share of the GPU the async compute queue may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AsyncComputeBudget {
    /// Lowest priority.
    Least,
    /// Lower than graphics.
    Less,
    /// Even split with graphics.
    #[default]
    Balanced,
    /// Higher than graphics.
    More,
    /// Async compute takes everything it can.
    All,
}
