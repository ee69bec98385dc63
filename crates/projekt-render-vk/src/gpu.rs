// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::prelude::VkResult;
use ash::{vk, Device};
use projekt_render::{
    Gpu, GpuBuffer, ImageSharing, MemoryLocation, PipelineDesc, QueueFamilies, RenderError,
    RenderResult, Submission, SurfaceSupport, SwapchainDesc, ViewportMode,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};

use crate::device::{create_command_pool, create_device, pick_adapter};
use crate::instance::InstanceContext;
use crate::memory;

const ENTRY_POINT: &std::ffi::CStr = c"main";

/// The ash-backed device. Owns the instance chain, the logical device, both queues
/// and the one command pool; everything else is owned by the wrappers that call into it.
pub struct AshGpu {
    ctx: InstanceContext,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
    mem_props: vk::PhysicalDeviceMemoryProperties,
    device: Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: swapchain::Device,
    command_pool: vk::CommandPool,
}

impl AshGpu {
    /// STRICT ORDER: instance, surface, adapter, device, queues, command pool.
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        validation: bool,
    ) -> RenderResult<Self> {
        let ctx = InstanceContext::new(window, display, validation)?;
        let adapter = pick_adapter(&ctx)?;
        let dq = create_device(&ctx.instance, &adapter)?;

        let command_pool = match create_command_pool(&dq.device, adapter.families.graphics) {
            Ok(pool) => pool,
            Err(e) => {
                // SAFETY: nothing was created from the device yet.
                unsafe { dq.device.destroy_device(None) };
                return Err(e);
            }
        };

        // SAFETY: `phys` was enumerated from this instance.
        let mem_props = unsafe {
            ctx.instance
                .get_physical_device_memory_properties(adapter.phys)
        };
        let swapchain_loader = swapchain::Device::new(&ctx.instance, &dq.device);
        info!("vk: device ready on '{}'", adapter.name);

        Ok(Self {
            ctx,
            phys: adapter.phys,
            families: adapter.families,
            mem_props,
            device: dq.device,
            graphics_queue: dq.graphics,
            present_queue: dq.present,
            swapchain_loader,
            command_pool,
        })
    }

    fn memory_flags(location: MemoryLocation) -> vk::MemoryPropertyFlags {
        match location {
            MemoryLocation::Device => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryLocation::Host => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }
}

impl Drop for AshGpu {
    fn drop(&mut self) {
        // STRICT TEARDOWN ORDER: idle, pool, device; the instance chain drops after this.
        // SAFETY: every child object was handed back by its owner before the gpu drops.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                warn!("vk: device_wait_idle on drop failed: {e:?}");
            }
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
        }
    }
}

// SAFETY (whole impl): every handle passed in was created by this device or by its
// swapchain loader, and the wrappers calling in never release a handle twice.
impl Gpu for AshGpu {
    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn surface_support(&self) -> RenderResult<SurfaceSupport> {
        let loader = &self.ctx.surface_loader;
        let surface = self.ctx.surface;
        unsafe {
            let capabilities = loader
                .get_physical_device_surface_capabilities(self.phys, surface)
                .map_err(|e| RenderError::device("get_physical_device_surface_capabilities", e))?;
            let formats = loader
                .get_physical_device_surface_formats(self.phys, surface)
                .map_err(|e| RenderError::device("get_physical_device_surface_formats", e))?;
            let present_modes = loader
                .get_physical_device_surface_present_modes(self.phys, surface)
                .map_err(|e| {
                    RenderError::device("get_physical_device_surface_present_modes", e)
                })?;
            Ok(SurfaceSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| RenderError::device("device_wait_idle", e))
    }

    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old: vk::SwapchainKHR,
    ) -> RenderResult<vk::SwapchainKHR> {
        let (sharing_mode, families) = match desc.sharing {
            ImageSharing::Exclusive => (vk::SharingMode::EXCLUSIVE, [0; 2]),
            ImageSharing::Concurrent(pair) => (vk::SharingMode::CONCURRENT, pair),
        };
        let family_count = if sharing_mode == vk::SharingMode::CONCURRENT {
            families.len() as u32
        } else {
            0
        };
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.ctx.surface,
            min_image_count: desc.image_count,
            image_format: desc.surface_format.format,
            image_color_space: desc.surface_format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };
        unsafe { self.swapchain_loader.create_swapchain(&info, None) }
            .map_err(|e| RenderError::setup("create_swapchain", e))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| RenderError::setup("get_swapchain_images", e))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
    ) -> RenderResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&info, None) }
            .map_err(|e| RenderError::setup("create_image_view", e))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_render_pass(&self, color_format: vk::Format) -> RenderResult<vk::RenderPass> {
        let attachment = vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            ..Default::default()
        };
        // Layout transition waits for the acquire semaphore's stage.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        unsafe { self.device.create_render_pass(&info, None) }
            .map_err(|e| RenderError::setup("create_render_pass", e))
    }

    fn destroy_render_pass(&self, pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(pass, None) }
    }

    fn create_framebuffer(
        &self,
        pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&info, None) }
            .map_err(|e| RenderError::setup("create_framebuffer", e))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> RenderResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: std::mem::size_of_val(code),
            ..Default::default()
        };
        unsafe { self.device.create_shader_module(&info, None) }
            .map_err(|e| RenderError::setup("create_shader_module", e))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<vk::PipelineLayout> {
        let info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: set_layouts.len() as u32,
            p_set_layouts: set_layouts.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.create_pipeline_layout(&info, None) }
            .map_err(|e| RenderError::setup("create_pipeline_layout", e))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc<'_>) -> RenderResult<vk::Pipeline> {
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: desc.vertex_shader,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: desc.fragment_shader,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        // --- Vertex input: one interleaved binding, attribute i at location i ---
        let binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .enumerate()
            .map(|(location, &(format, offset))| vk::VertexInputAttributeDescription {
                location: location as u32,
                binding: 0,
                format,
                offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &binding,
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };

        // --- Viewport: dynamic, or compiled in for one extent ---
        let (baked_viewport, baked_scissor) = match desc.viewport {
            ViewportMode::Baked(extent) => (
                vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                },
                vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                },
            ),
            ViewportMode::Dynamic => (vk::Viewport::default(), vk::Rect2D::default()),
        };
        let is_dynamic = desc.viewport == ViewportMode::Dynamic;
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: if is_dynamic {
                std::ptr::null()
            } else {
                &baked_viewport
            },
            scissor_count: 1,
            p_scissors: if is_dynamic {
                std::ptr::null()
            } else {
                &baked_scissor
            },
            ..Default::default()
        };
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };

        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            p_dynamic_state: if is_dynamic {
                &dynamic_state
            } else {
                std::ptr::null()
            },
            layout: desc.layout,
            render_pass: desc.render_pass,
            subpass: 0,
            ..Default::default()
        };

        let pipelines = unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                None,
            )
        }
        .map_err(|(_, e)| RenderError::setup("create_graphics_pipelines", e))?;
        pipelines
            .first()
            .copied()
            .ok_or_else(|| RenderError::unavailable("graphics pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_uniform_set_layout(&self) -> RenderResult<vk::DescriptorSetLayout> {
        let binding = vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        };
        let info = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: 1,
            p_bindings: &binding,
            ..Default::default()
        };
        unsafe { self.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| RenderError::setup("create_descriptor_set_layout", e))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(&self, max_sets: u32) -> RenderResult<vk::DescriptorPool> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: max_sets,
        }];
        let info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.create_descriptor_pool(&info, None) }
            .map_err(|e| RenderError::setup("create_descriptor_pool", e))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_uniform_sets(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        buffers: &[vk::Buffer],
        range: vk::DeviceSize,
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; buffers.len()];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: pool,
            descriptor_set_count: layouts.len() as u32,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc) }
            .map_err(|e| RenderError::setup("allocate_descriptor_sets", e))?;

        let infos: Vec<vk::DescriptorBufferInfo> = buffers
            .iter()
            .map(|&buffer| vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            })
            .collect();
        let writes: Vec<vk::WriteDescriptorSet<'_>> = sets
            .iter()
            .zip(&infos)
            .map(|(&dst_set, info)| vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set,
                dst_binding: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                p_buffer_info: info,
                ..Default::default()
            })
            .collect();
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        Ok(sets)
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> RenderResult<GpuBuffer> {
        let usage = match location {
            MemoryLocation::Device => usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::Host => usage,
        };
        memory::create_buffer_and_memory(
            &self.device,
            &self.mem_props,
            size,
            usage,
            Self::memory_flags(location),
        )
    }

    fn write_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()> {
        memory::write_mapped(&self.device, dst, bytes)
    }

    fn upload_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()> {
        memory::upload_via_staging(
            &self.device,
            &self.mem_props,
            self.graphics_queue,
            self.command_pool,
            dst,
            bytes,
        )
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        memory::destroy_buffer(&self.device, buffer);
    }

    fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&info) }
            .map_err(|e| RenderError::setup("allocate_command_buffers", e))
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe { self.device.free_command_buffers(self.command_pool, buffers) }
    }

    fn begin_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &info) }
            .map_err(|e| RenderError::setup("begin_command_buffer", e))
    }

    fn end_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
            .map_err(|e| RenderError::setup("end_command_buffer", e))
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
    ) {
        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        };
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: 1,
            p_clear_values: &clear_value,
            ..Default::default()
        };
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device
                .cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
            self.device
                .cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));
        }
    }

    fn cmd_bind_geometry(
        &self,
        cmd: vk::CommandBuffer,
        vertices: vk::Buffer,
        indices: vk::Buffer,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(cmd, 0, &[vertices], &[0]);
            self.device.cmd_bind_index_buffer(cmd, indices, 0, index_type);
        }
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0) }
    }

    fn create_semaphore(&self) -> RenderResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device.create_semaphore(&info, None) }
            .map_err(|e| RenderError::setup("create_semaphore", e))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&info, None) }
            .map_err(|e| RenderError::setup("create_fence", e))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RenderResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout) }
            .map_err(|e| RenderError::device("wait_for_fences", e))
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
            .map_err(|e| RenderError::device("reset_fences", e))
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn submit(&self, submission: &Submission) -> RenderResult<()> {
        let wait_stages = [submission.wait_stage];
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &submission.wait,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &submission.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &submission.signal,
            ..Default::default()
        };
        unsafe {
            self.device.queue_submit(
                self.graphics_queue,
                std::slice::from_ref(&info),
                submission.fence,
            )
        }
        .map_err(|e| RenderError::device("queue_submit", e))
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &info)
        }
    }
}
