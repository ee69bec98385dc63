// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::info;

use crate::error::RenderResult;
use crate::gpu::{Gpu, SwapchainDesc};
use crate::negotiate::{format_name, present_mode_name, PresentPreference};
use crate::RenderSize;

/// Presentable images plus one view each. Move-only; released with [`Swapchain::destroy`].
#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    desc: SwapchainDesc,
}

impl Swapchain {
    /// Negotiates against a fresh capability query. `old` stays alive; the caller
    /// destroys it once this returns.
    pub fn build<G: Gpu>(
        gpu: &G,
        want: RenderSize,
        preference: PresentPreference,
        old: Option<&Swapchain>,
    ) -> RenderResult<Self> {
        let support = gpu.surface_support()?;
        let desc = SwapchainDesc::negotiate(&support, gpu.queue_families(), want, preference)?;
        let old_handle = old.map_or(vk::SwapchainKHR::null(), |s| s.handle);

        let handle = gpu.create_swapchain(&desc, old_handle)?;
        let images = match gpu.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                gpu.destroy_swapchain(handle);
                return Err(e);
            }
        };

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            match gpu.create_image_view(image, desc.surface_format.format) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in views {
                        gpu.destroy_image_view(view);
                    }
                    gpu.destroy_swapchain(handle);
                    return Err(e);
                }
            }
        }

        info!(
            "swapchain: {}x{} {} {:?} {} images={}",
            desc.extent.width,
            desc.extent.height,
            format_name(desc.surface_format.format),
            desc.surface_format.color_space,
            present_mode_name(desc.present_mode),
            images.len()
        );

        Ok(Self {
            handle,
            images,
            views,
            desc,
        })
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        for view in self.views {
            gpu.destroy_image_view(view);
        }
        // images belong to the swap chain
        gpu.destroy_swapchain(self.handle);
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn desc(&self) -> &SwapchainDesc {
        &self.desc
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    pub fn format(&self) -> vk::Format {
        self.desc.surface_format.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.desc.present_mode
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// What the driver actually created, which may exceed the requested count.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
