// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use projekt_render::{RenderError, RenderResult};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{info, warn};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"Projekt";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback struct for the duration of the call.
    let msg = unsafe { (*data).message_as_c_str() };
    let tag = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        "error"
    } else {
        "warning"
    };
    if let Some(msg) = msg {
        eprintln!("[Vulkan {tag}] {}", msg.to_string_lossy());
    }
    vk::FALSE
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Loader, instance, optional debug messenger and the window surface.
///
/// STRICT ORDER: the surface is created from this instance before any adapter is queried,
/// and dropping tears down surface, messenger, instance in that order.
pub(crate) struct InstanceContext {
    _entry: Entry,
    pub(crate) instance: Instance,
    debug: Option<DebugMessenger>,
    pub(crate) surface_loader: surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,
}

impl InstanceContext {
    pub(crate) fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> RenderResult<Self> {
        let dh = display
            .display_handle()
            .map_err(RenderError::host)?
            .as_raw();
        let wh = window.window_handle().map_err(RenderError::host)?.as_raw();

        // SAFETY: the loader library stays loaded for as long as `Entry` lives.
        let entry = unsafe { Entry::load() }
            .map_err(|e| RenderError::unsupported("Vulkan loader", e.to_string()))?;

        let validation = cfg!(debug_assertions) && validation && has_validation_layer(&entry);
        let instance = create_instance(&entry, dh, validation)?;

        let debug = if validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        // SAFETY: both raw handles come from live objects borrowed for this call.
        let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
        {
            Ok(s) => s,
            Err(e) => {
                // SAFETY: nothing else was created from this instance yet.
                unsafe {
                    if let Some(d) = &debug {
                        d.loader.destroy_debug_utils_messenger(d.messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(RenderError::host(format!("create_surface: {e:?}")));
            }
        };

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
        })
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        // SAFETY: the device and every surface-derived object are gone by now.
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(d) = self.debug.take() {
                d.loader.destroy_debug_utils_messenger(d.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn has_validation_layer(entry: &Entry) -> bool {
    // SAFETY: plain query on a loaded entry.
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    let found = layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
    if !found {
        warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed; skipping");
    }
    found
}

fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> RenderResult<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .map_err(|e| RenderError::setup("enumerate_required_extensions", e))?
        .to_vec();
    if validation {
        extensions.push(debug_utils::NAME.as_ptr());
    }
    let layers = [VALIDATION_LAYER.as_ptr()];
    let layer_count = if validation { layers.len() as u32 } else { 0 };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layer_count,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    // SAFETY: every pointer in `create_info` outlives the call.
    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(|e| RenderError::setup("create_instance", e))?;
    info!(
        "vk: instance ready (validation={validation}, {} extensions)",
        extensions.len()
    );
    Ok(instance)
}

fn create_debug_messenger(entry: &Entry, instance: &Instance) -> RenderResult<DebugMessenger> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    // SAFETY: the instance was created with VK_EXT_debug_utils enabled.
    let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
        .map_err(|e| RenderError::setup("create_debug_utils_messenger", e))?;
    Ok(DebugMessenger { loader, messenger })
}
