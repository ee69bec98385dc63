// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, ViewportMode};
use crate::mesh::Mesh;
use crate::pipeline::PipelineState;
use crate::target::RenderTarget;

/// Everything one image's command buffer refers to.
pub struct DrawInputs<'a> {
    pub target: &'a RenderTarget,
    pub pipeline: &'a PipelineState,
    pub mesh: &'a Mesh,
    pub sets: &'a [vk::DescriptorSet],
    pub clear: [f32; 4],
}

/// Pre-recorded command buffers, one per swap chain image, replayed every frame.
#[derive(Debug)]
pub struct CommandRecording {
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandRecording {
    pub fn record<G: Gpu>(gpu: &G, inputs: &DrawInputs<'_>) -> RenderResult<Self> {
        let framebuffers = inputs.target.framebuffers();
        if inputs.sets.len() != framebuffers.len() {
            return Err(RenderError::unsupported(
                "descriptor sets",
                format!(
                    "{} sets for {} framebuffers",
                    inputs.sets.len(),
                    framebuffers.len()
                ),
            ));
        }

        let recording = Self {
            buffers: gpu.allocate_command_buffers(framebuffers.len() as u32)?,
        };
        for (i, &cmd) in recording.buffers.iter().enumerate() {
            if let Err(e) = record_one(gpu, cmd, inputs, i) {
                recording.destroy(gpu);
                return Err(e);
            }
        }
        Ok(recording)
    }

    pub fn buffer(&self, image_index: usize) -> RenderResult<vk::CommandBuffer> {
        self.buffers
            .get(image_index)
            .copied()
            .ok_or_else(|| RenderError::unavailable("command buffer"))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        gpu.free_command_buffers(&self.buffers);
    }
}

fn record_one<G: Gpu>(
    gpu: &G,
    cmd: vk::CommandBuffer,
    inputs: &DrawInputs<'_>,
    image_index: usize,
) -> RenderResult<()> {
    let fb = &inputs.target.framebuffers()[image_index];
    let pipeline = inputs.pipeline;
    let mesh = inputs.mesh;

    gpu.begin_commands(cmd)?;
    gpu.cmd_begin_render_pass(
        cmd,
        inputs.target.pass(),
        fb.handle(),
        fb.extent(),
        inputs.clear,
    );
    gpu.cmd_bind_pipeline(cmd, pipeline.pipeline());
    if pipeline.viewport() == ViewportMode::Dynamic {
        gpu.cmd_set_viewport_scissor(cmd, fb.extent());
    }
    gpu.cmd_bind_geometry(
        cmd,
        mesh.vertex_buffer(),
        mesh.index_buffer(),
        mesh.index_type(),
    );
    gpu.cmd_bind_descriptor_set(cmd, pipeline.layout(), inputs.sets[image_index]);
    gpu.cmd_draw_indexed(cmd, mesh.index_count());
    gpu.cmd_end_render_pass(cmd);
    gpu.end_commands(cmd)
}
