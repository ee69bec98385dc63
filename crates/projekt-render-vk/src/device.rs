// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::{vk, Device, Instance};
use projekt_render::{QueueFamilies, RenderError, RenderResult};
use tracing::{debug, info};

use crate::instance::InstanceContext;

pub(crate) struct Adapter {
    pub(crate) phys: vk::PhysicalDevice,
    pub(crate) families: QueueFamilies,
    pub(crate) name: String,
}

/// First adapter with graphics, present and the swapchain extension. A single family
/// that does both is preferred over a split pair.
pub(crate) fn pick_adapter(ctx: &InstanceContext) -> RenderResult<Adapter> {
    // SAFETY: plain queries against a live instance and surface.
    let physicals = unsafe { ctx.instance.enumerate_physical_devices() }
        .map_err(|e| RenderError::setup("enumerate_physical_devices", e))?;

    let mut rejected = Vec::new();
    for phys in physicals {
        let name = adapter_name(&ctx.instance, phys);
        if !has_swapchain_extension(&ctx.instance, phys) {
            rejected.push(format!("{name}: no VK_KHR_swapchain"));
            continue;
        }
        match queue_families(ctx, phys) {
            Some(families) => {
                info!(
                    "vk: adapter '{name}' graphics={} present={}",
                    families.graphics, families.present
                );
                return Ok(Adapter {
                    phys,
                    families,
                    name,
                });
            }
            None => rejected.push(format!("{name}: no graphics+present queues")),
        }
    }

    Err(RenderError::unsupported(
        "adapter",
        if rejected.is_empty() {
            "no Vulkan devices".to_string()
        } else {
            rejected.join("; ")
        },
    ))
}

fn adapter_name(instance: &Instance, phys: vk::PhysicalDevice) -> String {
    // SAFETY: `phys` was enumerated from this instance.
    let props = unsafe { instance.get_physical_device_properties(phys) };
    props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "<unnamed>".to_string())
}

fn has_swapchain_extension(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    // SAFETY: `phys` was enumerated from this instance.
    let exts = unsafe { instance.enumerate_device_extension_properties(phys) }.unwrap_or_default();
    exts.iter()
        .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == swapchain::NAME))
}

fn queue_families(ctx: &InstanceContext, phys: vk::PhysicalDevice) -> Option<QueueFamilies> {
    // SAFETY: `phys` was enumerated from this instance.
    let props = unsafe {
        ctx.instance
            .get_physical_device_queue_family_properties(phys)
    };

    let mut graphics = None;
    let mut present = None;
    for (i, q) in props.iter().enumerate() {
        let i = i as u32;
        let does_graphics = q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        // SAFETY: surface and adapter belong to the same instance.
        let does_present = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_support(phys, i, ctx.surface)
        }
        .unwrap_or(false);

        if does_graphics && does_present {
            return Some(QueueFamilies {
                graphics: i,
                present: i,
            });
        }
        if does_graphics && graphics.is_none() {
            graphics = Some(i);
        }
        if does_present && present.is_none() {
            present = Some(i);
        }
    }
    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

pub(crate) struct DeviceQueues {
    pub(crate) device: Device,
    pub(crate) graphics: vk::Queue,
    pub(crate) present: vk::Queue,
}

pub(crate) fn create_device(instance: &Instance, adapter: &Adapter) -> RenderResult<DeviceQueues> {
    let priorities = [1.0_f32];
    let QueueFamilies { graphics, present } = adapter.families;
    let mut unique = vec![graphics];
    if present != graphics {
        unique.push(present);
    }
    let queue_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = unique
        .iter()
        .map(|&family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let extensions = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    // SAFETY: every pointer in `dinfo` outlives the call.
    let device = unsafe { instance.create_device(adapter.phys, &dinfo, None) }
        .map_err(|e| RenderError::setup("create_device", e))?;
    // SAFETY: both families were requested with one queue each.
    let (graphics_queue, present_queue) = unsafe {
        (
            device.get_device_queue(graphics, 0),
            device.get_device_queue(present, 0),
        )
    };
    debug!("vk: device created for '{}'", adapter.name);

    Ok(DeviceQueues {
        device,
        graphics: graphics_queue,
        present: present_queue,
    })
}

pub(crate) fn create_command_pool(device: &Device, family: u32) -> RenderResult<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    // SAFETY: live device, valid family index.
    unsafe { device.create_command_pool(&pool_info, None) }
        .map_err(|e| RenderError::setup("create_command_pool", e))
}
