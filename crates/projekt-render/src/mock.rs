// SPDX-License-Identifier: CEPL-1.0
//! Counting stand-in for a device. Every handle is fabricated, tracked while alive and
//! checked on release; synchronization misuse is recorded as a violation instead of hanging.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use crate::error::{RenderError, RenderResult};
use crate::gpu::{
    Gpu, GpuBuffer, MemoryLocation, PipelineDesc, QueueFamilies, Submission, SurfaceSupport,
    SwapchainDesc,
};
use crate::negotiate::PREFERRED_SURFACE_FORMAT;

pub const FENCE_NEVER_SIGNALS: &str = "wait on a fence that was reset and never submitted";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted; signals on the next wait or idle-wait.
    Pending,
}

struct State {
    next_raw: u64,
    live: HashMap<u64, &'static str>,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, u32>,
    violations: Vec<String>,

    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    families: QueueFamilies,
    fixed_extent: Option<vk::Extent2D>,

    fences: HashMap<u64, FenceState>,
    signaled_semaphores: HashSet<u64>,
    swapchain_images: HashMap<u64, Vec<vk::Image>>,
    next_image: HashMap<u64, u32>,
    acquired: HashSet<(u64, u32)>,
    acquire_script: VecDeque<VkResult<(u32, bool)>>,
    present_script: VecDeque<VkResult<bool>>,

    swapchains: Vec<(vk::SwapchainKHR, vk::SwapchainKHR)>,
    submissions: Vec<Submission>,
    acquire_semaphores: Vec<vk::Semaphore>,
    waited: Vec<vk::Fence>,
    recorded: HashMap<u64, Vec<&'static str>>,
    uploads: HashMap<u64, usize>,
    last_write: Option<(vk::Buffer, usize)>,
    last_clear: Option<[f32; 4]>,
    last_draw: Option<u32>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_raw: 1,
            live: HashMap::new(),
            calls: Vec::new(),
            failures: HashMap::new(),
            violations: Vec::new(),
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            families: QueueFamilies {
                graphics: 0,
                present: 0,
            },
            fixed_extent: None,
            fences: HashMap::new(),
            signaled_semaphores: HashSet::new(),
            swapchain_images: HashMap::new(),
            next_image: HashMap::new(),
            acquired: HashSet::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            swapchains: Vec::new(),
            submissions: Vec::new(),
            acquire_semaphores: Vec::new(),
            waited: Vec::new(),
            recorded: HashMap::new(),
            uploads: HashMap::new(),
            last_write: None,
            last_clear: None,
            last_draw: None,
        }
    }
}

impl State {
    fn raw(&mut self) -> u64 {
        let raw = self.next_raw;
        self.next_raw += 1;
        raw
    }

    fn mint<H: Handle>(&mut self, kind: &'static str) -> H {
        let raw = self.raw();
        self.live.insert(raw, kind);
        H::from_raw(raw)
    }

    fn release<H: Handle>(&mut self, handle: H, kind: &'static str) {
        let raw = handle.as_raw();
        match self.live.remove(&raw) {
            Some(k) if k == kind => {}
            Some(k) => self
                .violations
                .push(format!("released {k} {raw:#x} as a {kind}")),
            None => self
                .violations
                .push(format!("released {kind} {raw:#x} that is not alive")),
        }
    }

    fn record(&mut self, cmd: vk::CommandBuffer, call: &'static str) {
        self.calls.push(call);
        self.recorded.entry(cmd.as_raw()).or_default().push(call);
    }
}

/// Cheap to clone; clones share state so a test can inspect a mock it handed away.
#[derive(Clone, Default)]
pub struct MockGpu {
    state: Rc<RefCell<State>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    fn enter(&self, call: &'static str) -> RenderResult<()> {
        let mut s = self.state.borrow_mut();
        s.calls.push(call);
        if let Some(left) = s.failures.get_mut(call) {
            *left -= 1;
            if *left == 0 {
                s.failures.remove(call);
                return Err(RenderError::setup(call, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
        }
        Ok(())
    }

    fn log(&self, call: &'static str) {
        self.state.borrow_mut().calls.push(call);
    }

    fn mint<H: Handle>(&self, kind: &'static str) -> H {
        self.state.borrow_mut().mint(kind)
    }

    fn release<H: Handle>(&self, handle: H, kind: &'static str) {
        self.state.borrow_mut().release(handle, kind);
    }

    fn violation(&self, what: String) {
        self.state.borrow_mut().violations.push(what);
    }

    // configuration

    pub fn set_present_modes(&self, modes: &[vk::PresentModeKHR]) {
        self.state.borrow_mut().present_modes = modes.to_vec();
    }

    pub fn set_formats(&self, formats: &[vk::SurfaceFormatKHR]) {
        self.state.borrow_mut().formats = formats.to_vec();
    }

    pub fn set_queue_families(&self, families: QueueFamilies) {
        self.state.borrow_mut().families = families;
    }

    /// `None` lets the requested size through (clamped).
    pub fn set_fixed_extent(&self, extent: Option<vk::Extent2D>) {
        self.state.borrow_mut().fixed_extent = extent;
    }

    /// The `n`th call (1-based) of `call` from now on fails.
    pub fn fail_nth(&self, call: &'static str, n: u32) {
        self.state.borrow_mut().failures.insert(call, n);
    }

    pub fn script_acquire(&self, result: VkResult<(u32, bool)>) {
        self.state.borrow_mut().acquire_script.push_back(result);
    }

    pub fn script_present(&self, result: VkResult<bool>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    // inspection

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn live_count(&self, kind: &str) -> i64 {
        self.state
            .borrow()
            .live
            .values()
            .filter(|k| **k == kind)
            .count() as i64
    }

    pub fn live_total(&self) -> i64 {
        self.state.borrow().live.len() as i64
    }

    pub fn live_snapshot(&self) -> BTreeMap<&'static str, i64> {
        let mut out = BTreeMap::new();
        for kind in self.state.borrow().live.values() {
            *out.entry(*kind).or_insert(0) += 1;
        }
        out
    }

    /// `(created, old)` per swap chain creation.
    pub fn swapchains_created(&self) -> Vec<(vk::SwapchainKHR, vk::SwapchainKHR)> {
        self.state.borrow().swapchains.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.borrow().submissions.clone()
    }

    /// Semaphores signaled by successful acquires, in order.
    pub fn acquire_semaphores(&self) -> Vec<vk::Semaphore> {
        self.state.borrow().acquire_semaphores.clone()
    }

    pub fn waited_fences(&self) -> Vec<vk::Fence> {
        self.state.borrow().waited.clone()
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state.borrow().fences.get(&fence.as_raw()) == Some(&FenceState::Signaled)
    }

    pub fn commands_for(&self, cmd: vk::CommandBuffer) -> Vec<&'static str> {
        self.state
            .borrow()
            .recorded
            .get(&cmd.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    pub fn uploaded_bytes(&self, buffer: vk::Buffer) -> Option<usize> {
        self.state.borrow().uploads.get(&buffer.as_raw()).copied()
    }

    pub fn last_write(&self) -> Option<(vk::Buffer, usize)> {
        self.state.borrow().last_write
    }

    pub fn last_clear(&self) -> Option<[f32; 4]> {
        self.state.borrow().last_clear
    }

    pub fn last_draw_count(&self) -> Option<u32> {
        self.state.borrow().last_draw
    }
}

impl Gpu for MockGpu {
    fn queue_families(&self) -> QueueFamilies {
        self.state.borrow().families
    }

    fn surface_support(&self) -> RenderResult<SurfaceSupport> {
        self.enter("surface_support")?;
        let s = self.state.borrow();
        let current_extent = s.fixed_extent.unwrap_or(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        Ok(SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent,
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: s.formats.clone(),
            present_modes: s.present_modes.clone(),
        })
    }

    fn wait_idle(&self) -> RenderResult<()> {
        self.enter("wait_idle")?;
        for state in self.state.borrow_mut().fences.values_mut() {
            if *state == FenceState::Pending {
                *state = FenceState::Signaled;
            }
        }
        Ok(())
    }

    fn create_swapchain(
        &self,
        desc: &SwapchainDesc,
        old: vk::SwapchainKHR,
    ) -> RenderResult<vk::SwapchainKHR> {
        self.enter("create_swapchain")?;
        let mut s = self.state.borrow_mut();
        if old != vk::SwapchainKHR::null() && !s.live.contains_key(&old.as_raw()) {
            s.violations.push("old swapchain handed over after destruction".into());
        }
        let handle: vk::SwapchainKHR = s.mint("swapchain");
        let images = (0..desc.image_count)
            .map(|_| {
                let raw = s.raw();
                vk::Image::from_raw(raw)
            })
            .collect();
        s.swapchain_images.insert(handle.as_raw(), images);
        s.swapchains.push((handle, old));
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>> {
        self.enter("swapchain_images")?;
        Ok(self
            .state
            .borrow()
            .swapchain_images
            .get(&swapchain.as_raw())
            .cloned()
            .unwrap_or_default())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.log("destroy_swapchain");
        let mut s = self.state.borrow_mut();
        s.swapchain_images.remove(&swapchain.as_raw());
        s.acquired.retain(|(sc, _)| *sc != swapchain.as_raw());
        s.release(swapchain, "swapchain");
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
    ) -> RenderResult<vk::ImageView> {
        self.enter("create_image_view")?;
        Ok(self.mint("image view"))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.log("destroy_image_view");
        self.release(view, "image view");
    }

    fn create_render_pass(&self, _color_format: vk::Format) -> RenderResult<vk::RenderPass> {
        self.enter("create_render_pass")?;
        Ok(self.mint("render pass"))
    }

    fn destroy_render_pass(&self, pass: vk::RenderPass) {
        self.log("destroy_render_pass");
        self.release(pass, "render pass");
    }

    fn create_framebuffer(
        &self,
        _pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        self.enter("create_framebuffer")?;
        Ok(self.mint("framebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.log("destroy_framebuffer");
        self.release(framebuffer, "framebuffer");
    }

    fn create_shader_module(&self, code: &[u32]) -> RenderResult<vk::ShaderModule> {
        self.enter("create_shader_module")?;
        if code.is_empty() {
            return Err(RenderError::setup(
                "create_shader_module",
                vk::Result::ERROR_INVALID_SHADER_NV,
            ));
        }
        Ok(self.mint("shader module"))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.log("destroy_shader_module");
        self.release(module, "shader module");
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<vk::PipelineLayout> {
        self.enter("create_pipeline_layout")?;
        Ok(self.mint("pipeline layout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.log("destroy_pipeline_layout");
        self.release(layout, "pipeline layout");
    }

    fn create_graphics_pipeline(&self, _desc: &PipelineDesc<'_>) -> RenderResult<vk::Pipeline> {
        self.enter("create_graphics_pipeline")?;
        Ok(self.mint("pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.log("destroy_pipeline");
        self.release(pipeline, "pipeline");
    }

    fn create_uniform_set_layout(&self) -> RenderResult<vk::DescriptorSetLayout> {
        self.enter("create_uniform_set_layout")?;
        Ok(self.mint("descriptor set layout"))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.log("destroy_descriptor_set_layout");
        self.release(layout, "descriptor set layout");
    }

    fn create_descriptor_pool(&self, _max_sets: u32) -> RenderResult<vk::DescriptorPool> {
        self.enter("create_descriptor_pool")?;
        Ok(self.mint("descriptor pool"))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.log("destroy_descriptor_pool");
        self.release(pool, "descriptor pool");
    }

    fn allocate_uniform_sets(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
        buffers: &[vk::Buffer],
        _range: vk::DeviceSize,
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        self.enter("allocate_uniform_sets")?;
        let mut s = self.state.borrow_mut();
        // freed with the pool, so not tracked individually
        Ok(buffers
            .iter()
            .map(|_| {
                let raw = s.raw();
                vk::DescriptorSet::from_raw(raw)
            })
            .collect())
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
        _location: MemoryLocation,
    ) -> RenderResult<GpuBuffer> {
        self.enter("create_buffer")?;
        let mut s = self.state.borrow_mut();
        Ok(GpuBuffer {
            buffer: s.mint("buffer"),
            memory: s.mint("memory"),
            size,
        })
    }

    fn write_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()> {
        self.enter("write_buffer")?;
        if bytes.len() as vk::DeviceSize > dst.size {
            self.violation(format!("wrote {} bytes into {}", bytes.len(), dst.size));
        }
        self.state.borrow_mut().last_write = Some((dst.buffer, bytes.len()));
        Ok(())
    }

    fn upload_buffer(&self, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()> {
        self.enter("upload_buffer")?;
        if bytes.len() as vk::DeviceSize > dst.size {
            self.violation(format!("uploaded {} bytes into {}", bytes.len(), dst.size));
        }
        self.state
            .borrow_mut()
            .uploads
            .insert(dst.buffer.as_raw(), bytes.len());
        Ok(())
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        self.log("destroy_buffer");
        let mut s = self.state.borrow_mut();
        s.release(buffer.buffer, "buffer");
        s.release(buffer.memory, "memory");
    }

    fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>> {
        self.enter("allocate_command_buffers")?;
        Ok((0..count).map(|_| self.mint("command buffer")).collect())
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        self.log("free_command_buffers");
        for &cmd in buffers {
            self.release(cmd, "command buffer");
        }
    }

    fn begin_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        self.enter("begin_commands")?;
        self.state
            .borrow_mut()
            .recorded
            .insert(cmd.as_raw(), vec!["begin_commands"]);
        Ok(())
    }

    fn end_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        self.enter("end_commands")?;
        self.state
            .borrow_mut()
            .recorded
            .entry(cmd.as_raw())
            .or_default()
            .push("end_commands");
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        _pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        clear: [f32; 4],
    ) {
        let mut s = self.state.borrow_mut();
        s.record(cmd, "cmd_begin_render_pass");
        s.last_clear = Some(clear);
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.state.borrow_mut().record(cmd, "cmd_end_render_pass");
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.state.borrow_mut().record(cmd, "cmd_bind_pipeline");
    }

    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, _extent: vk::Extent2D) {
        self.state.borrow_mut().record(cmd, "cmd_set_viewport_scissor");
    }

    fn cmd_bind_geometry(
        &self,
        cmd: vk::CommandBuffer,
        _vertices: vk::Buffer,
        _indices: vk::Buffer,
        _index_type: vk::IndexType,
    ) {
        self.state.borrow_mut().record(cmd, "cmd_bind_geometry");
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _set: vk::DescriptorSet,
    ) {
        self.state.borrow_mut().record(cmd, "cmd_bind_descriptor_set");
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32) {
        let mut s = self.state.borrow_mut();
        s.record(cmd, "cmd_draw_indexed");
        s.last_draw = Some(index_count);
    }

    fn create_semaphore(&self) -> RenderResult<vk::Semaphore> {
        self.enter("create_semaphore")?;
        Ok(self.mint("semaphore"))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.log("destroy_semaphore");
        let mut s = self.state.borrow_mut();
        s.signaled_semaphores.remove(&semaphore.as_raw());
        s.release(semaphore, "semaphore");
    }

    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence> {
        self.enter("create_fence")?;
        let mut s = self.state.borrow_mut();
        let fence: vk::Fence = s.mint("fence");
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        s.fences.insert(fence.as_raw(), state);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.log("destroy_fence");
        let mut s = self.state.borrow_mut();
        if s.fences.remove(&fence.as_raw()) == Some(FenceState::Pending) {
            s.violations.push("fence destroyed while its work is pending".into());
        }
        s.release(fence, "fence");
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> RenderResult<()> {
        self.enter("wait_for_fence")?;
        let mut s = self.state.borrow_mut();
        s.waited.push(fence);
        match s.fences.get(&fence.as_raw()).copied() {
            Some(FenceState::Pending) | Some(FenceState::Signaled) => {
                s.fences.insert(fence.as_raw(), FenceState::Signaled);
            }
            Some(FenceState::Unsignaled) => s.violations.push(FENCE_NEVER_SIGNALS.to_string()),
            None => s.violations.push("wait on an unknown fence".into()),
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        self.enter("reset_fence")?;
        let mut s = self.state.borrow_mut();
        if s.fences.get(&fence.as_raw()) != Some(&FenceState::Signaled) {
            s.violations.push("reset of a fence that was not signaled".into());
        }
        s.fences.insert(fence.as_raw(), FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.log("acquire_next_image");
        let mut s = self.state.borrow_mut();
        let sc = swapchain.as_raw();
        let image_count = s.swapchain_images.get(&sc).map_or(0, Vec::len) as u32;

        let result = match s.acquire_script.pop_front() {
            Some(scripted) => scripted,
            None => {
                let next = s.next_image.entry(sc).or_insert(0);
                let index = *next;
                *next = (index + 1) % image_count.max(1);
                Ok((index, false))
            }
        };

        if let Ok((index, _)) = result {
            if index >= image_count {
                s.violations
                    .push(format!("acquired image {index} of {image_count}"));
            }
            if !s.acquired.insert((sc, index)) {
                s.violations
                    .push(format!("image {index} acquired twice without a present"));
            }
            if !s.signaled_semaphores.insert(signal.as_raw()) {
                s.violations
                    .push("acquire signals a semaphore that is already signaled".into());
            }
            s.acquire_semaphores.push(signal);
        }
        result
    }

    fn submit(&self, submission: &Submission) -> RenderResult<()> {
        self.enter("submit")?;
        let mut s = self.state.borrow_mut();
        if !s.signaled_semaphores.remove(&submission.wait.as_raw()) {
            s.violations
                .push("submit waits on a semaphore nothing signaled".into());
        }
        if !s.signaled_semaphores.insert(submission.signal.as_raw()) {
            s.violations
                .push("submit signals a semaphore that is already signaled".into());
        }
        let fence = submission.fence.as_raw();
        if s.fences.get(&fence) != Some(&FenceState::Unsignaled) {
            s.violations.push("submit with a fence that was not reset".into());
        }
        s.fences.insert(fence, FenceState::Pending);
        s.submissions.push(*submission);
        Ok(())
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        self.log("present");
        let mut s = self.state.borrow_mut();
        if !s.signaled_semaphores.remove(&wait.as_raw()) {
            s.violations
                .push("present waits on a semaphore nothing signaled".into());
        }
        if !s.acquired.remove(&(swapchain.as_raw(), image_index)) {
            s.violations
                .push(format!("presented image {image_index} that was not acquired"));
        }
        s.present_script.pop_front().unwrap_or(Ok(false))
    }
}
