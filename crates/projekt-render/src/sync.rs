// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;
use crate::MAX_FRAMES_IN_FLIGHT;

/// Copy of one slot's handles; the slot itself stays owned by [`FrameSlots`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotHandles {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

/// Semaphore pair and fence for each frame in flight.
#[derive(Debug)]
pub struct FrameSlots {
    slots: Vec<SlotHandles>,
}

impl FrameSlots {
    pub fn build<G: Gpu>(gpu: &G) -> RenderResult<Self> {
        let mut slots = Self {
            slots: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
        };
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            match Self::build_slot(gpu) {
                Ok(slot) => slots.slots.push(slot),
                Err(e) => {
                    slots.destroy(gpu);
                    return Err(e);
                }
            }
        }
        Ok(slots)
    }

    fn build_slot<G: Gpu>(gpu: &G) -> RenderResult<SlotHandles> {
        let image_available = gpu.create_semaphore()?;
        let render_finished = match gpu.create_semaphore() {
            Ok(s) => s,
            Err(e) => {
                gpu.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        // Signaled so the very first wait returns at once.
        let in_flight = match gpu.create_fence(true) {
            Ok(f) => f,
            Err(e) => {
                gpu.destroy_semaphore(render_finished);
                gpu.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        Ok(SlotHandles {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub fn get(&self, frame: usize) -> RenderResult<SlotHandles> {
        self.slots
            .get(frame)
            .copied()
            .ok_or_else(|| RenderError::unavailable("frame slot"))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        for slot in self.slots.into_iter().rev() {
            gpu.destroy_fence(slot.in_flight);
            gpu.destroy_semaphore(slot.render_finished);
            gpu.destroy_semaphore(slot.image_available);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGpu;

    #[test]
    fn one_triple_per_frame_in_flight() {
        let gpu = MockGpu::new();
        let slots = FrameSlots::build(&gpu).unwrap();
        assert_eq!(slots.len(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(gpu.live_count("semaphore"), 2 * MAX_FRAMES_IN_FLIGHT as i64);
        assert_eq!(gpu.live_count("fence"), MAX_FRAMES_IN_FLIGHT as i64);

        let a = slots.get(0).unwrap();
        let b = slots.get(1).unwrap();
        assert_ne!(a.image_available, b.image_available);
        assert_ne!(a.in_flight, b.in_flight);
        assert!(gpu.fence_signaled(a.in_flight));
        assert!(slots.get(MAX_FRAMES_IN_FLIGHT).is_err());

        slots.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn failure_in_the_second_slot_unwinds_the_first() {
        let gpu = MockGpu::new();
        gpu.fail_nth("create_fence", 2);
        assert!(FrameSlots::build(&gpu).is_err());
        assert_eq!(gpu.live_total(), 0);
    }
}
