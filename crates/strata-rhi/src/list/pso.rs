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

//! Render-target state cached while recording, used to complete pipeline descriptions.

use strata_core::api::{
    DepthRenderTargetView, GraphicsPipelineDesc, PixelFormat, RenderPassInfo, RenderTargetView,
    SubpassHint, MAX_SIMULTANEOUS_RENDER_TARGETS,
};

/// The render targets and subpass the list last bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PsoContext {
    color_formats: Vec<PixelFormat>,
    depth_format: PixelFormat,
    subpass_hint: SubpassHint,
    subpass_index: u8,
}

impl PsoContext {
    pub(crate) fn cache_render_targets(
        &mut self,
        color: &[RenderTargetView],
        depth_stencil: Option<&DepthRenderTargetView>,
    ) {
        assert!(
            color.len() <= MAX_SIMULTANEOUS_RENDER_TARGETS,
            "{} render targets bound; at most {MAX_SIMULTANEOUS_RENDER_TARGETS} are supported",
            color.len()
        );
        self.color_formats = color.iter().map(|rt| rt.format).collect();
        self.depth_format = depth_stencil.map_or(PixelFormat::Unknown, |ds| ds.format);
    }

    pub(crate) fn cache_render_pass(&mut self, info: &RenderPassInfo) {
        self.cache_render_targets(&info.color_targets, info.depth_stencil.as_ref());
        self.subpass_hint = info.subpass_hint;
        self.subpass_index = 0;
    }

    pub(crate) fn next_subpass(&mut self) {
        self.subpass_index += 1;
    }

    pub(crate) fn end_render_pass(&mut self) {
        self.subpass_hint = SubpassHint::None;
        self.subpass_index = 0;
    }

    /// Overwrites the render-target part of `desc` with the cached state.
    pub(crate) fn apply(&self, desc: &mut GraphicsPipelineDesc) {
        desc.render_target_formats = [PixelFormat::Unknown; MAX_SIMULTANEOUS_RENDER_TARGETS];
        for (slot, format) in desc.render_target_formats.iter_mut().zip(&self.color_formats) {
            *slot = *format;
        }
        desc.num_render_targets = self.color_formats.len() as u32;
        desc.depth_stencil_format = self.depth_format;
        desc.subpass_hint = self.subpass_hint;
        desc.subpass_index = self.subpass_index;
    }
}
