// SPDX-License-Identifier: CEPL-1.0
use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::error::RenderResult;
use crate::gpu::{Gpu, GpuBuffer, MemoryLocation, VertexLayout};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub color: [f32; 3],
}

pub const VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride: size_of::<Vertex>() as u32,
    attributes: &[
        (vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, pos) as u32),
        (vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color) as u32),
    ],
};

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex {
        pos: [-0.5, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        pos: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        pos: [0.5, -0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        pos: [0.5, 0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

// Clockwise on screen when seen from +Z through a Y-flipped projection.
pub const QUAD_INDICES: [u16; 6] = [0, 3, 1, 1, 3, 2];

/// Static geometry in device-local memory, filled through a staging copy.
#[derive(Debug)]
pub struct Mesh {
    vertices: GpuBuffer,
    indices: GpuBuffer,
    index_count: u32,
}

impl Mesh {
    pub fn upload<G: Gpu>(gpu: &G, vertices: &[Vertex], indices: &[u16]) -> RenderResult<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        let vbuf = gpu.create_buffer(
            vertex_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::Device,
        )?;
        if let Err(e) = gpu.upload_buffer(&vbuf, vertex_bytes) {
            gpu.destroy_buffer(vbuf);
            return Err(e);
        }

        let ibuf = match gpu.create_buffer(
            index_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::Device,
        ) {
            Ok(b) => b,
            Err(e) => {
                gpu.destroy_buffer(vbuf);
                return Err(e);
            }
        };
        if let Err(e) = gpu.upload_buffer(&ibuf, index_bytes) {
            gpu.destroy_buffer(ibuf);
            gpu.destroy_buffer(vbuf);
            return Err(e);
        }

        Ok(Self {
            vertices: vbuf,
            indices: ibuf,
            index_count: indices.len() as u32,
        })
    }

    pub fn quad<G: Gpu>(gpu: &G) -> RenderResult<Self> {
        Self::upload(gpu, &QUAD_VERTICES, &QUAD_INDICES)
    }

    pub fn destroy<G: Gpu>(self, gpu: &G) {
        gpu.destroy_buffer(self.indices);
        gpu.destroy_buffer(self.vertices);
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.buffer
    }

    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.buffer
    }

    pub fn index_type(&self) -> vk::IndexType {
        vk::IndexType::UINT16
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGpu;

    #[test]
    fn layout_is_two_packed_vec3s() {
        assert_eq!(VERTEX_LAYOUT.stride, 24);
        assert_eq!(VERTEX_LAYOUT.attributes[0].1, 0);
        assert_eq!(VERTEX_LAYOUT.attributes[1].1, 12);
    }

    #[test]
    fn quad_indices_stay_in_range() {
        assert!(QUAD_INDICES
            .iter()
            .all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn quad_triangles_wind_clockwise_from_positive_z() {
        for tri in QUAD_INDICES.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| QUAD_VERTICES[tri[i] as usize].pos);
            let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(cross < 0.0, "{tri:?} winds counter-clockwise");
        }
    }

    #[test]
    fn upload_goes_through_staging_into_device_memory() {
        let gpu = MockGpu::new();
        let mesh = Mesh::quad(&gpu).unwrap();

        assert_eq!(mesh.index_count(), 6);
        assert_eq!(gpu.count("upload_buffer"), 2);
        assert_eq!(gpu.count("write_buffer"), 0);
        assert_eq!(gpu.uploaded_bytes(mesh.vertex_buffer()), Some(96));
        assert_eq!(gpu.uploaded_bytes(mesh.index_buffer()), Some(12));

        mesh.destroy(&gpu);
        assert_eq!(gpu.live_total(), 0);
    }
}
