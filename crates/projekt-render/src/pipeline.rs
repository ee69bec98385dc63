// SPDX-License-Identifier: CEPL-1.0
use std::fs::File;
use std::path::Path;

use ash::vk;
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, PipelineDesc, ViewportMode};
use crate::mesh::VERTEX_LAYOUT;

/// SPIR-V words for the vertex and fragment stage.
#[derive(Clone, Debug)]
pub struct ShaderSet {
    vertex: Vec<u32>,
    fragment: Vec<u32>,
}

impl ShaderSet {
    pub fn load(vertex: &Path, fragment: &Path) -> RenderResult<Self> {
        Ok(Self {
            vertex: read_words(vertex)?,
            fragment: read_words(fragment)?,
        })
    }

    pub fn from_words(vertex: Vec<u32>, fragment: Vec<u32>) -> Self {
        Self { vertex, fragment }
    }
}

fn read_words(path: &Path) -> RenderResult<Vec<u32>> {
    let mut file = File::open(path).map_err(|e| RenderError::shader(path, e))?;
    let words = ash::util::read_spv(&mut file).map_err(|e| RenderError::shader(path, e))?;
    debug!("loaded {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Layout plus compiled pipeline for one color format (and, when baked, one extent).
#[derive(Debug)]
pub struct PipelineState {
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    color_format: vk::Format,
    viewport: ViewportMode,
}

impl PipelineState {
    pub fn build<G: Gpu>(
        gpu: &G,
        shaders: &ShaderSet,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        viewport: ViewportMode,
    ) -> RenderResult<Self> {
        let vert = gpu.create_shader_module(&shaders.vertex)?;
        let frag = match gpu.create_shader_module(&shaders.fragment) {
            Ok(m) => m,
            Err(e) => {
                gpu.destroy_shader_module(vert);
                return Err(e);
            }
        };

        let result = Self::build_with_modules(
            gpu,
            vert,
            frag,
            render_pass,
            set_layout,
            color_format,
            viewport,
        );

        // Modules are only needed while the pipeline is compiled.
        gpu.destroy_shader_module(frag);
        gpu.destroy_shader_module(vert);
        result
    }

    fn build_with_modules<G: Gpu>(
        gpu: &G,
        vert: vk::ShaderModule,
        frag: vk::ShaderModule,
        render_pass: vk::RenderPass,
        set_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        viewport: ViewportMode,
    ) -> RenderResult<Self> {
        let layout = gpu.create_pipeline_layout(&[set_layout])?;
        let desc = PipelineDesc {
            render_pass,
            layout,
            vertex_shader: vert,
            fragment_shader: frag,
            vertex_layout: &VERTEX_LAYOUT,
            viewport,
        };
        let pipeline = match gpu.create_graphics_pipeline(&desc) {
            Ok(p) => p,
            Err(e) => {
                gpu.destroy_pipeline_layout(layout);
                return Err(e);
            }
        };

        Ok(Self {
            layout,
            pipeline,
            color_format,
            viewport,
        })
    }

    /// Dynamic pipelines survive a resize; baked ones never do.
    pub fn needs_rebuild(&self, color_format: vk::Format) -> bool {
        matches!(self.viewport, ViewportMode::Baked(_)) || self.color_format != color_format
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        gpu.destroy_pipeline(self.pipeline);
        gpu.destroy_pipeline_layout(self.layout);
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn viewport(&self) -> ViewportMode {
        self.viewport
    }
}
