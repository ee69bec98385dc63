// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use glam::{Mat4, Vec3};
use projekt_render::UniformBlock;

/// Longest step the simulation takes; a stall (window drag, breakpoint) is not replayed.
pub const MAX_STEP: Duration = Duration::from_millis(50);

/// Radians per second around Z.
const SPIN_RATE: f32 = std::f32::consts::FRAC_PI_2;
const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
const EYE: Vec3 = Vec3::new(0.0, -1.5, 2.0);

/// The scene: one quad spinning about Z, seen from slightly below and in front.
#[derive(Debug, Default)]
pub struct Game {
    elapsed: f32,
    ticks: u64,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `dt`, clamped to [`MAX_STEP`]. Returns the step actually taken.
    pub fn tick(&mut self, dt: Duration) -> Duration {
        let step = dt.min(MAX_STEP);
        self.elapsed += step.as_secs_f32();
        self.ticks += 1;
        step
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn uniforms(&self, aspect: f32) -> UniformBlock {
        let model = Mat4::from_rotation_z(self.elapsed * SPIN_RATE);
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y);
        let mut proj = Mat4::perspective_rh(FOV_Y, aspect.max(f32::EPSILON), 0.1, 10.0);
        // Vulkan clip space has Y pointing down.
        proj.y_axis.y *= -1.0;
        UniformBlock { model, view, proj }
    }
}
