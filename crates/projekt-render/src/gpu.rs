// SPDX-License-Identifier: CEPL-1.0
//! The device seam: every native call the frame machinery makes goes through [`Gpu`].
//!
//! Handles are plain `ash::vk` values. Ownership lives one level up: each wrapper in this
//! crate holds the handles it created and gives them back through the matching `destroy_*`
//! call, so an implementation never has to track what is alive.

use ash::prelude::VkResult;
use ash::vk;

use crate::error::RenderResult;

/// Queue family indices the swap chain images may be used from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

/// Snapshot of what the surface supports right now.
#[derive(Clone, Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSharing {
    Exclusive,
    /// Graphics and present family, in that order.
    Concurrent([u32; 2]),
}

/// Fully negotiated swap chain parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewportMode {
    /// Viewport and scissor are set while recording; resizes keep the pipeline.
    Dynamic,
    /// Viewport and scissor are compiled in for this extent.
    Baked(vk::Extent2D),
}

/// Vertex buffer layout: one interleaved binding.
#[derive(Clone, Copy, Debug)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [(vk::Format, u32)],
}

pub struct PipelineDesc<'a> {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub vertex_shader: vk::ShaderModule,
    pub fragment_shader: vk::ShaderModule,
    pub vertex_layout: &'a VertexLayout,
    pub viewport: ViewportMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local; filled through [`Gpu::upload_buffer`].
    Device,
    /// Host-visible and coherent; filled through [`Gpu::write_buffer`].
    Host,
}

/// A buffer and its backing allocation. Move-only; released with [`Gpu::destroy_buffer`].
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

/// One graphics-queue submission of a single command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    pub wait: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    pub command_buffer: vk::CommandBuffer,
    pub signal: vk::Semaphore,
    pub fence: vk::Fence,
}

pub trait Gpu {
    fn queue_families(&self) -> QueueFamilies;
    /// Re-queried on every call; capabilities change with the window and the output.
    fn surface_support(&self) -> RenderResult<SurfaceSupport>;
    fn wait_idle(&self) -> RenderResult<()>;

    // swap chain
    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old: vk::SwapchainKHR,
    ) -> RenderResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn create_image_view(&self, image: vk::Image, format: vk::Format)
        -> RenderResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    // render target
    fn create_render_pass(&self, color_format: vk::Format) -> RenderResult<vk::RenderPass>;
    fn destroy_render_pass(&self, pass: vk::RenderPass);
    fn create_framebuffer(
        &self,
        pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // pipeline
    fn create_shader_module(&self, code: &[u32]) -> RenderResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_graphics_pipeline(&self, desc: &PipelineDesc<'_>) -> RenderResult<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // descriptors: one vertex-stage uniform buffer at binding 0
    fn create_uniform_set_layout(&self) -> RenderResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_descriptor_pool(&self, max_sets: u32) -> RenderResult<vk::DescriptorPool>;
    /// Frees every set allocated from the pool as well.
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocates one set per buffer and points binding 0 of each at it.
    fn allocate_uniform_sets(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        buffers: &[vk::Buffer],
        range: vk::DeviceSize,
    ) -> RenderResult<Vec<vk::DescriptorSet>>;

    // memory
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> RenderResult<GpuBuffer>;
    fn write_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()>;
    /// Staging buffer plus a one-shot copy on the graphics queue; blocks until done.
    fn upload_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()>;
    fn destroy_buffer(&self, buffer: GpuBuffer);

    // command buffers
    fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]);
    /// Begins with `SIMULTANEOUS_USE`: the buffer is resubmitted every frame until re-recorded.
    fn begin_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()>;
    fn end_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()>;
    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
    );
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D);
    fn cmd_bind_geometry(
        &self,
        cmd: vk::CommandBuffer,
        vertices: vk::Buffer,
        indices: vk::Buffer,
        index_type: vk::IndexType,
    );
    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32);

    // synchronization
    fn create_semaphore(&self) -> RenderResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RenderResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()>;

    // frame
    /// Raw result: the caller tells staleness apart from real failures.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    fn submit(&self, submission: &Submission) -> RenderResult<()>;
    /// `Ok(true)` means suboptimal.
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;
}
