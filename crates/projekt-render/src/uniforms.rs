// SPDX-License-Identifier: CEPL-1.0
use std::mem::size_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, GpuBuffer, MemoryLocation};

/// Matches the `UniformBufferObject` block at set 0, binding 0 of the vertex shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl UniformBlock {
    pub const SIZE: vk::DeviceSize = size_of::<UniformBlock>() as vk::DeviceSize;
}

/// Set layout shared by every per-image descriptor set. Lives as long as the driver.
#[derive(Debug)]
pub struct DescriptorLayout {
    handle: vk::DescriptorSetLayout,
}

impl DescriptorLayout {
    pub fn build<G: Gpu>(gpu: &G) -> RenderResult<Self> {
        Ok(Self {
            handle: gpu.create_uniform_set_layout()?,
        })
    }

    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        gpu.destroy_descriptor_set_layout(self.handle);
    }
}

/// One host-visible uniform buffer and descriptor set per swap chain image.
#[derive(Debug)]
pub struct UniformSets {
    buffers: Vec<GpuBuffer>,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl UniformSets {
    pub fn build<G: Gpu>(
        gpu: &G,
        layout: &DescriptorLayout,
        image_count: usize,
    ) -> RenderResult<Self> {
        let mut uniforms = Self {
            buffers: Vec::with_capacity(image_count),
            pool: vk::DescriptorPool::null(),
            sets: Vec::new(),
        };
        if let Err(e) = uniforms.fill(gpu, layout, image_count) {
            uniforms.destroy(gpu);
            return Err(e);
        }
        Ok(uniforms)
    }

    fn fill<G: Gpu>(
        &mut self,
        gpu: &G,
        layout: &DescriptorLayout,
        image_count: usize,
    ) -> RenderResult<()> {
        for _ in 0..image_count {
            let buffer = gpu.create_buffer(
                UniformBlock::SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::Host,
            )?;
            self.buffers.push(buffer);
        }
        self.pool = gpu.create_descriptor_pool(image_count as u32)?;

        let handles: Vec<vk::Buffer> = self.buffers.iter().map(|b| b.buffer).collect();
        self.sets =
            gpu.allocate_uniform_sets(self.pool, layout.handle(), &handles, UniformBlock::SIZE)?;
        Ok(())
    }

    /// The caller guarantees no submitted frame still reads this image's buffer.
    pub fn write<G: Gpu>(
        &self,
        gpu: &G,
        image_index: usize,
        block: &UniformBlock,
    ) -> RenderResult<()> {
        let buffer = self
            .buffers
            .get(image_index)
            .ok_or_else(|| RenderError::unavailable("uniform buffer"))?;
        gpu.write_buffer(buffer, bytemuck::bytes_of(block))
    }

    pub fn sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        if self.pool != vk::DescriptorPool::null() {
            gpu.destroy_descriptor_pool(self.pool);
        }
        for buffer in self.buffers {
            gpu.destroy_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGpu;

    #[test]
    fn block_is_three_column_major_matrices() {
        assert_eq!(UniformBlock::SIZE, 3 * 64);
        let block = UniformBlock {
            model: Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0)),
            ..Default::default()
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&block));
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn one_buffer_and_set_per_image() {
        let gpu = MockGpu::new();
        let layout = DescriptorLayout::build(&gpu).unwrap();
        let sets = UniformSets::build(&gpu, &layout, 3).unwrap();
        assert_eq!(sets.sets().len(), 3);
        assert_eq!(gpu.live_count("buffer"), 3);

        sets.write(&gpu, 2, &UniformBlock::default()).unwrap();
        assert_eq!(gpu.count("write_buffer"), 1);
        assert!(sets.write(&gpu, 3, &UniformBlock::default()).is_err());

        sets.destroy(&gpu);
        layout.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }

    #[test]
    fn pool_failure_releases_the_buffers() {
        let gpu = MockGpu::new();
        let layout = DescriptorLayout::build(&gpu).unwrap();
        gpu.fail_nth("create_descriptor_pool", 1);

        assert!(UniformSets::build(&gpu, &layout, 2).is_err());
        assert_eq!(gpu.live_count("buffer"), 0);
        assert_eq!(gpu.live_count("memory"), 0);
        layout.destroy(&gpu);
    }
}
