// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! ash backend for `projekt-render`: instance and surface, adapter selection, the logical
//! device and an implementation of [`projekt_render::Gpu`] on top of it.

use projekt_render::{
    FrameDriver, FrameOutcome, FrameStats, RenderResult, RenderSettings, RenderSize, Renderer,
    ShaderSet, UniformBlock,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

mod device;
mod gpu;
mod instance;
mod memory;

pub use gpu::AshGpu;

pub struct VkRenderer {
    driver: FrameDriver<AshGpu>,
}

impl VkRenderer {
    /// Idles the device and releases everything in reverse creation order.
    pub fn shutdown(self) -> RenderResult<()> {
        self.driver.shutdown()
    }

    pub fn driver(&self) -> &FrameDriver<AshGpu> {
        &self.driver
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &RenderSettings,
    ) -> RenderResult<Self> {
        let shaders = ShaderSet::load(&settings.vertex_shader, &settings.fragment_shader)?;
        let gpu = AshGpu::new(window, display, settings.validation)?;
        let driver = FrameDriver::new(gpu, size, settings, shaders)?;
        info!(
            "vk: renderer up, {} images, {}x{}",
            driver.image_count(),
            driver.extent().width,
            driver.extent().height
        );
        Ok(Self { driver })
    }

    fn resize(&mut self, size: RenderSize) {
        self.driver.resize(size);
    }

    fn render(&mut self, uniforms: &UniformBlock) -> RenderResult<FrameOutcome> {
        self.driver.draw_frame(uniforms)
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) -> RenderResult<()> {
        self.driver.set_clear_color(rgba)
    }

    fn extent(&self) -> RenderSize {
        let e = self.driver.extent();
        RenderSize::new(e.width, e.height)
    }

    fn stats(&self) -> FrameStats {
        self.driver.stats()
    }
}
