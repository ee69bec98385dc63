// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Backend-independent half of the renderer: the [`Gpu`] seam, swap chain negotiation,
//! the per-swap-chain objects and the [`FrameDriver`] state machine that ties them together.

use std::path::PathBuf;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod commands;
mod error;
mod frame;
mod gpu;
mod mesh;
mod negotiate;
mod pipeline;
mod swapchain;
mod sync;
mod target;
mod uniforms;

#[cfg(test)]
mod mock;

pub use commands::{CommandRecording, DrawInputs};
pub use error::{RenderError, RenderResult, Site};
pub use frame::{FrameDriver, FrameOutcome, FramePhase, FrameStats};
pub use gpu::{
    Gpu, GpuBuffer, ImageSharing, MemoryLocation, PipelineDesc, QueueFamilies, Submission,
    SurfaceSupport, SwapchainDesc, VertexLayout, ViewportMode,
};
pub use mesh::{Mesh, Vertex, QUAD_INDICES, QUAD_VERTICES, VERTEX_LAYOUT};
pub use negotiate::{
    choose_extent, choose_image_count, choose_present_mode, choose_sharing,
    choose_surface_format, format_name, present_mode_name, PresentPreference,
    PREFERRED_SURFACE_FORMAT,
};
pub use pipeline::{PipelineState, ShaderSet};
pub use swapchain::Swapchain;
pub use sync::{FrameSlots, SlotHandles};
pub use target::{Framebuffer, RenderTarget};
pub use uniforms::{DescriptorLayout, UniformBlock, UniformSets};

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero side; nothing can be presented then.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewportKind {
    #[default]
    Dynamic,
    Baked,
}

impl ViewportKind {
    pub fn mode(self, extent: ash::vk::Extent2D) -> ViewportMode {
        match self {
            ViewportKind::Dynamic => ViewportMode::Dynamic,
            ViewportKind::Baked => ViewportMode::Baked(extent),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderSettings {
    pub clear_color: [f32; 4],
    pub present: PresentPreference,
    pub viewport: ViewportKind,
    /// Only honoured by debug builds.
    pub validation: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            present: PresentPreference::Mailbox,
            viewport: ViewportKind::Dynamic,
            validation: true,
            vertex_shader: PathBuf::from("shaders/quad.vert.spv"),
            fragment_shader: PathBuf::from("shaders/quad.frag.spv"),
        }
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> RenderResult<Self>
    where
        Self: Sized;

    /// Takes effect on the next frame.
    fn resize(&mut self, size: RenderSize);
    fn render(&mut self, uniforms: &UniformBlock) -> RenderResult<FrameOutcome>;
    fn set_clear_color(&mut self, rgba: [f32; 4]) -> RenderResult<()>;
    fn extent(&self) -> RenderSize;
    fn stats(&self) -> FrameStats;
}
