// SPDX-License-Identifier: CEPL-1.0
//! The frame state machine: `prepare_frame` → `write_uniforms` → `submit_frame`, plus the
//! rebuild that follows resizes and stale surfaces.

use ash::vk;
use tracing::{debug, info, warn};

use crate::commands::{CommandRecording, DrawInputs};
use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, Submission};
use crate::mesh::Mesh;
use crate::pipeline::{PipelineState, ShaderSet};
use crate::swapchain::Swapchain;
use crate::sync::FrameSlots;
use crate::target::RenderTarget;
use crate::uniforms::{DescriptorLayout, UniformBlock, UniformSets};
use crate::{RenderSettings, RenderSize, MAX_FRAMES_IN_FLIGHT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    /// An image is acquired; its uniforms may be written.
    Acquired(u32),
    /// Uniforms for the acquired image are written.
    Recorded(u32),
}

impl FramePhase {
    fn name(self) -> &'static str {
        match self {
            FramePhase::Idle => "idle",
            FramePhase::Acquired(_) => "acquired",
            FramePhase::Recorded(_) => "recorded",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Nothing was submitted this tick (stale surface or zero-size window).
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub rebuilds: u64,
}

/// Owns the device seam and everything built on it.
///
/// Parts are optional so a failed construction or rebuild still tears down whatever exists.
/// Construction order: set layout, slots, mesh, swap chain, target, pipeline, uniforms,
/// commands. Teardown runs the reverse.
pub struct FrameDriver<G: Gpu> {
    gpu: G,
    shaders: ShaderSet,
    settings: RenderSettings,

    want: RenderSize,
    resize_pending: bool,
    stale: bool,
    phase: FramePhase,
    current_frame: usize,
    /// Fence of the frame that last rendered into each image.
    images_in_flight: Vec<vk::Fence>,
    stats: FrameStats,

    set_layout: Option<DescriptorLayout>,
    slots: Option<FrameSlots>,
    mesh: Option<Mesh>,
    swapchain: Option<Swapchain>,
    target: Option<RenderTarget>,
    pipeline: Option<PipelineState>,
    uniforms: Option<UniformSets>,
    commands: Option<CommandRecording>,
}

#[track_caller]
fn part<'a, T>(part: &'a Option<T>, what: &'static str) -> RenderResult<&'a T> {
    match part {
        Some(p) => Ok(p),
        None => Err(RenderError::unavailable(what)),
    }
}

impl<G: Gpu> FrameDriver<G> {
    pub fn new(
        gpu: G,
        size: RenderSize,
        settings: &RenderSettings,
        shaders: ShaderSet,
    ) -> RenderResult<Self> {
        let mut driver = Self {
            gpu,
            shaders,
            settings: settings.clone(),
            want: size,
            resize_pending: false,
            stale: false,
            phase: FramePhase::Idle,
            current_frame: 0,
            images_in_flight: Vec::new(),
            stats: FrameStats::default(),
            set_layout: None,
            slots: None,
            mesh: None,
            swapchain: None,
            target: None,
            pipeline: None,
            uniforms: None,
            commands: None,
        };

        driver.set_layout = Some(DescriptorLayout::build(&driver.gpu)?);
        driver.slots = Some(FrameSlots::build(&driver.gpu)?);
        driver.mesh = Some(Mesh::quad(&driver.gpu)?);

        if size.is_empty() {
            // Minimized at startup: build on the first non-zero resize.
            driver.resize_pending = true;
        } else {
            driver.build_presentation()?;
        }
        Ok(driver)
    }

    /// Recorded now, applied at the start of the next `prepare_frame`.
    pub fn resize(&mut self, size: RenderSize) {
        if size != self.want {
            debug!("resize requested: {}x{}", size.width, size.height);
        }
        self.want = size;
        self.resize_pending = true;
    }

    /// Waits for the current slot, then acquires an image.
    ///
    /// `Ok(None)` means the frame is skipped: the surface went stale (and has been
    /// rebuilt) or the window has no area.
    pub fn prepare_frame(&mut self) -> RenderResult<Option<u32>> {
        if self.phase != FramePhase::Idle {
            return Err(RenderError::out_of_order("prepare_frame", self.phase.name()));
        }
        if self.want.is_empty() {
            self.stats.frames_skipped += 1;
            return Ok(None);
        }
        if self.resize_pending {
            self.rebuild_now()?;
        }

        let slot = part(&self.slots, "frame slots")?.get(self.current_frame)?;
        let swapchain = part(&self.swapchain, "swapchain")?.handle();

        self.gpu.wait_for_fence(slot.in_flight, u64::MAX)?;

        let (index, suboptimal) =
            match self
                .gpu
                .acquire_next_image(swapchain, u64::MAX, slot.image_available)
            {
                Ok(acquired) => acquired,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("acquire: out of date");
                    // The fence is still signaled; the slot is reused untouched next tick.
                    self.rebuild_now()?;
                    self.stats.frames_skipped += 1;
                    return Ok(None);
                }
                Err(e) => return Err(RenderError::device("acquire_next_image", e)),
            };
        if suboptimal {
            debug!("acquire: suboptimal");
            self.stale = true;
        }

        let image = index as usize;
        let previous = self
            .images_in_flight
            .get(image)
            .copied()
            .ok_or_else(|| RenderError::unavailable("acquired image"))?;
        if previous != vk::Fence::null() && previous != slot.in_flight {
            self.gpu.wait_for_fence(previous, u64::MAX)?;
        }
        self.images_in_flight[image] = slot.in_flight;

        // Reset only once a submission is certain to follow.
        self.gpu.reset_fence(slot.in_flight)?;

        self.phase = FramePhase::Acquired(index);
        Ok(Some(index))
    }

    pub fn write_uniforms(&mut self, block: &UniformBlock) -> RenderResult<()> {
        let FramePhase::Acquired(index) = self.phase else {
            return Err(RenderError::out_of_order("write_uniforms", self.phase.name()));
        };
        part(&self.uniforms, "uniform sets")?.write(&self.gpu, index as usize, block)?;
        self.phase = FramePhase::Recorded(index);
        Ok(())
    }

    /// Submits the acquired image's commands and presents it.
    pub fn submit_frame(&mut self) -> RenderResult<()> {
        let index = match self.phase {
            FramePhase::Acquired(i) | FramePhase::Recorded(i) => i,
            FramePhase::Idle => return Err(RenderError::out_of_order("submit_frame", "idle")),
        };
        self.phase = FramePhase::Idle;

        let slot = part(&self.slots, "frame slots")?.get(self.current_frame)?;
        let swapchain = part(&self.swapchain, "swapchain")?.handle();
        let command_buffer = part(&self.commands, "command buffers")?.buffer(index as usize)?;

        self.gpu.submit(&Submission {
            wait: slot.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            command_buffer,
            signal: slot.render_finished,
            fence: slot.in_flight,
        })?;

        let stale = match self.gpu.present(swapchain, index, slot.render_finished) {
            Ok(suboptimal) => suboptimal || self.stale,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(RenderError::device("queue_present", e)),
        };

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        self.stats.frames_presented += 1;

        if stale {
            debug!("present: surface stale");
            self.rebuild_now()?;
        }
        Ok(())
    }

    /// One complete tick.
    pub fn draw_frame(&mut self, block: &UniformBlock) -> RenderResult<FrameOutcome> {
        if self.prepare_frame()?.is_none() {
            return Ok(FrameOutcome::Skipped);
        }
        self.write_uniforms(block)?;
        self.submit_frame()?;
        Ok(FrameOutcome::Presented)
    }

    /// Idle-waits, then rebuilds the swap chain and everything sized by it.
    ///
    /// Only valid between frames: an acquired image belongs to the chain being replaced.
    pub fn rebuild(&mut self) -> RenderResult<()> {
        if self.phase != FramePhase::Idle {
            return Err(RenderError::out_of_order("rebuild", self.phase.name()));
        }
        self.rebuild_now()
    }

    fn rebuild_now(&mut self) -> RenderResult<()> {
        self.gpu.wait_idle()?;
        self.stats.rebuilds += 1;
        self.build_presentation()?;
        info!(
            "rebuilt for {}x{} (rebuild #{})",
            self.want.width, self.want.height, self.stats.rebuilds
        );
        Ok(())
    }

    fn build_presentation(&mut self) -> RenderResult<()> {
        if let Some(commands) = self.commands.take() {
            commands.destroy(&self.gpu);
        }
        if let Some(uniforms) = self.uniforms.take() {
            uniforms.destroy(&self.gpu);
        }
        if let Some(target) = self.target.take() {
            target.destroy(&self.gpu);
        }

        let old = self.swapchain.take();
        let built = Swapchain::build(&self.gpu, self.want, self.settings.present, old.as_ref());
        if let Some(old) = old {
            old.destroy(&self.gpu);
        }
        let swapchain = self.swapchain.insert(built?);
        let format = swapchain.format();
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let target = self
            .target
            .insert(RenderTarget::build(&self.gpu, swapchain)?);

        if self
            .pipeline
            .as_ref()
            .map_or(true, |p| p.needs_rebuild(format))
        {
            if let Some(pipeline) = self.pipeline.take() {
                pipeline.destroy(&self.gpu);
            }
            let set_layout = part(&self.set_layout, "descriptor set layout")?.handle();
            self.pipeline = Some(PipelineState::build(
                &self.gpu,
                &self.shaders,
                target.pass(),
                set_layout,
                format,
                self.settings.viewport.mode(extent),
            )?);
        }

        let uniforms = UniformSets::build(
            &self.gpu,
            part(&self.set_layout, "descriptor set layout")?,
            image_count,
        )?;
        self.uniforms = Some(uniforms);

        self.record_commands()?;

        self.images_in_flight = vec![vk::Fence::null(); image_count];
        self.resize_pending = false;
        self.stale = false;
        Ok(())
    }

    fn record_commands(&mut self) -> RenderResult<()> {
        if let Some(commands) = self.commands.take() {
            commands.destroy(&self.gpu);
        }
        let inputs = DrawInputs {
            target: part(&self.target, "render target")?,
            pipeline: part(&self.pipeline, "pipeline")?,
            mesh: part(&self.mesh, "mesh")?,
            sets: part(&self.uniforms, "uniform sets")?.sets(),
            clear: self.settings.clear_color,
        };
        let commands = CommandRecording::record(&self.gpu, &inputs)?;
        self.commands = Some(commands);
        Ok(())
    }

    /// Re-records every command buffer with the new clear colour.
    pub fn set_clear_color(&mut self, rgba: [f32; 4]) -> RenderResult<()> {
        self.settings.clear_color = rgba;
        if self.commands.is_none() {
            // picked up by the next rebuild
            return Ok(());
        }
        self.gpu.wait_idle()?;
        self.record_commands()
    }

    /// Explicit teardown with the idle-wait error surfaced. Dropping does the same quietly.
    pub fn shutdown(mut self) -> RenderResult<()> {
        let idle = self.gpu.wait_idle();
        self.teardown();
        idle
    }

    fn teardown(&mut self) {
        // STRICT ORDER: reverse of construction.
        if let Some(commands) = self.commands.take() {
            commands.destroy(&self.gpu);
        }
        if let Some(uniforms) = self.uniforms.take() {
            uniforms.destroy(&self.gpu);
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy(&self.gpu);
        }
        if let Some(target) = self.target.take() {
            target.destroy(&self.gpu);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&self.gpu);
        }
        if let Some(mesh) = self.mesh.take() {
            mesh.destroy(&self.gpu);
        }
        if let Some(slots) = self.slots.take() {
            slots.destroy(&self.gpu);
        }
        if let Some(layout) = self.set_layout.take() {
            layout.destroy(&self.gpu);
        }
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Zero while nothing has been built yet.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map_or(vk::Extent2D::default(), Swapchain::extent)
    }

    pub fn format(&self) -> Option<vk::Format> {
        self.swapchain.as_ref().map(Swapchain::format)
    }

    pub fn present_mode(&self) -> Option<vk::PresentModeKHR> {
        self.swapchain.as_ref().map(Swapchain::present_mode)
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    pub fn framebuffer_extents(&self) -> Vec<vk::Extent2D> {
        self.target.as_ref().map_or_else(Vec::new, |t| {
            t.framebuffers().iter().map(|fb| fb.extent()).collect()
        })
    }
}

impl<G: Gpu> Drop for FrameDriver<G> {
    fn drop(&mut self) {
        if self.set_layout.is_none() {
            return;
        }
        if let Err(e) = self.gpu.wait_idle() {
            warn!("wait_idle before teardown failed: {e}");
        }
        self.teardown();
    }
}
