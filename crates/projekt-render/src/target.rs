// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::RenderResult;
use crate::gpu::Gpu;
use crate::swapchain::Swapchain;

#[derive(Debug)]
pub struct Framebuffer {
    handle: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// The clear-and-present pass plus one framebuffer per swap chain image.
#[derive(Debug)]
pub struct RenderTarget {
    pass: vk::RenderPass,
    framebuffers: Vec<Framebuffer>,
}

impl RenderTarget {
    pub fn build<G: Gpu>(gpu: &G, swapchain: &Swapchain) -> RenderResult<Self> {
        let pass = gpu.create_render_pass(swapchain.format())?;
        let mut target = Self {
            pass,
            framebuffers: Vec::with_capacity(swapchain.image_count()),
        };

        for &view in swapchain.views() {
            match gpu.create_framebuffer(pass, view, swapchain.extent()) {
                Ok(handle) => target.framebuffers.push(Framebuffer {
                    handle,
                    extent: swapchain.extent(),
                }),
                Err(e) => {
                    target.destroy(gpu);
                    return Err(e);
                }
            }
        }
        Ok(target)
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        for fb in self.framebuffers {
            gpu.destroy_framebuffer(fb.handle);
        }
        gpu.destroy_render_pass(self.pass);
    }

    pub fn pass(&self) -> vk::RenderPass {
        self.pass
    }

    pub fn framebuffers(&self) -> &[Framebuffer] {
        &self.framebuffers
    }
}
