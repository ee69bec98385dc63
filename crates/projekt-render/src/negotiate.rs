// SPDX-License-Identifier: CEPL-1.0
//! Swap chain parameter negotiation. Pure functions over what the surface reports.

use ash::vk;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{ImageSharing, QueueFamilies, SurfaceSupport, SwapchainDesc};
use crate::RenderSize;

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentPreference {
    /// Lowest latency without tearing, uncapped.
    #[default]
    Mailbox,
    /// Locked to the display refresh.
    Fifo,
}

impl PresentPreference {
    /// Fallback order; the first mode the surface lists wins.
    pub fn order(self) -> [vk::PresentModeKHR; 4] {
        match self {
            PresentPreference::Mailbox => [
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::FIFO_RELAXED,
                vk::PresentModeKHR::IMMEDIATE,
            ],
            PresentPreference::Fifo => [
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::FIFO_RELAXED,
                vk::PresentModeKHR::IMMEDIATE,
            ],
        }
    }
}

/// `None` only when the surface reports no formats at all.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [] => None,
        // A lone UNDEFINED entry means "anything goes".
        [only] if only.format == vk::Format::UNDEFINED => Some(PREFERRED_SURFACE_FORMAT),
        _ => Some(
            formats
                .iter()
                .copied()
                .find(|f| *f == PREFERRED_SURFACE_FORMAT)
                .unwrap_or(formats[0]),
        ),
    }
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    preference
        .order()
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    // not clamp(): min > max has been seen from drivers
    vk::Extent2D {
        width: want
            .width
            .max(caps.min_image_extent.width)
            .min(caps.max_image_extent.width),
        height: want
            .height
            .max(caps.min_image_extent.height)
            .min(caps.max_image_extent.height),
    }
}

/// One more than the minimum for overlap, capped by the maximum (0 == "no max").
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

pub fn choose_sharing(families: QueueFamilies) -> ImageSharing {
    if families.graphics == families.present {
        ImageSharing::Exclusive
    } else {
        ImageSharing::Concurrent([families.graphics, families.present])
    }
}

fn choose_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

impl SwapchainDesc {
    pub fn negotiate(
        support: &SurfaceSupport,
        families: QueueFamilies,
        want: RenderSize,
        preference: PresentPreference,
    ) -> RenderResult<Self> {
        let caps = &support.capabilities;
        let surface_format = choose_surface_format(&support.formats)
            .ok_or_else(|| RenderError::unsupported("surface format", "surface lists no formats"))?;

        Ok(SwapchainDesc {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes, preference),
            extent: choose_extent(caps, want),
            image_count: choose_image_count(caps),
            pre_transform: choose_transform(caps),
            sharing: choose_sharing(families),
        })
    }
}

// Info only
pub fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        _ => "OTHER",
    }
}

pub fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}
