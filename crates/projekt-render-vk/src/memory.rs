// SPDX-License-Identifier: CEPL-1.0
use ash::{vk, Device};
use projekt_render::{GpuBuffer, RenderError, RenderResult};

/// Index of the first memory type allowed by `type_bits` that has every flag in `required`.
pub(crate) fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    (0..props.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && props.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or_else(|| {
            RenderError::unsupported(
                "memory type",
                format!("bits={type_bits:#b} flags={required:?}"),
            )
        })
}

pub(crate) fn create_buffer_and_memory(
    device: &Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    props: vk::MemoryPropertyFlags,
) -> RenderResult<GpuBuffer> {
    let bci = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    // SAFETY: live device; every handle created here is released on the error paths.
    unsafe {
        let buffer = device
            .create_buffer(&bci, None)
            .map_err(|e| RenderError::setup("create_buffer", e))?;
        let req = device.get_buffer_memory_requirements(buffer);
        let memory_type_index = match find_memory_type(mem_props, req.memory_type_bits, props) {
            Ok(i) => i,
            Err(e) => {
                device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = match device.allocate_memory(&mai, None) {
            Ok(m) => m,
            Err(e) => {
                device.destroy_buffer(buffer, None);
                return Err(RenderError::setup("allocate_memory", e));
            }
        };
        if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
            return Err(RenderError::setup("bind_buffer_memory", e));
        }
        Ok(GpuBuffer {
            buffer,
            memory,
            size,
        })
    }
}

/// Copies `bytes` into host-visible, coherent memory.
pub(crate) fn write_mapped(device: &Device, dst: &GpuBuffer, bytes: &[u8]) -> RenderResult<()> {
    if bytes.len() as vk::DeviceSize > dst.size {
        return Err(RenderError::unsupported(
            "buffer size",
            format!("{} bytes into {}", bytes.len(), dst.size),
        ));
    }
    // SAFETY: memory is host-visible, not mapped elsewhere, and large enough (checked above).
    unsafe {
        let ptr = device
            .map_memory(
                dst.memory,
                0,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )
            .map_err(|e| RenderError::setup("map_memory", e))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
        device.unmap_memory(dst.memory);
    }
    Ok(())
}

pub(crate) fn destroy_buffer(device: &Device, buffer: GpuBuffer) {
    // SAFETY: the caller guarantees the GPU no longer uses the buffer.
    unsafe {
        device.destroy_buffer(buffer.buffer, None);
        device.free_memory(buffer.memory, None);
    }
}

/// One-shot staging upload: host -> staging, then staging -> `dst` on `queue`. Blocks.
pub(crate) fn upload_via_staging(
    device: &Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    cmd_pool: vk::CommandPool,
    dst: &GpuBuffer,
    bytes: &[u8],
) -> RenderResult<()> {
    let size = bytes.len() as vk::DeviceSize;
    let staging = create_buffer_and_memory(
        device,
        mem_props,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    let result = write_mapped(device, &staging, bytes)
        .and_then(|()| copy_buffer(device, queue, cmd_pool, staging.buffer, dst.buffer, size));
    destroy_buffer(device, staging);
    result
}

fn copy_buffer(
    device: &Device,
    queue: vk::Queue,
    cmd_pool: vk::CommandPool,
    src: vk::Buffer,
    dst: vk::Buffer,
    size: vk::DeviceSize,
) -> RenderResult<()> {
    let ai = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: cmd_pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: 1,
        ..Default::default()
    };
    // SAFETY: pool and queue belong to `device`; the buffer is freed after the queue idles.
    unsafe {
        let cmds = device
            .allocate_command_buffers(&ai)
            .map_err(|e| RenderError::setup("allocate_command_buffers(staging)", e))?;
        let cmd = cmds[0];
        let result = (|| {
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            device
                .begin_command_buffer(cmd, &bi)
                .map_err(|e| RenderError::setup("begin_command_buffer(staging)", e))?;
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            device.cmd_copy_buffer(cmd, src, dst, std::slice::from_ref(&region));
            device
                .end_command_buffer(cmd)
                .map_err(|e| RenderError::setup("end_command_buffer(staging)", e))?;

            let si = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                ..Default::default()
            };
            device
                .queue_submit(queue, std::slice::from_ref(&si), vk::Fence::null())
                .map_err(|e| RenderError::device("queue_submit(staging)", e))?;
            device
                .queue_wait_idle(queue)
                .map_err(|e| RenderError::device("queue_wait_idle(staging)", e))
        })();
        device.free_command_buffers(cmd_pool, &cmds);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut p = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, f) in flags.iter().enumerate() {
            p.memory_types[i].property_flags = *f;
        }
        p
    }

    #[test]
    fn picks_the_first_type_with_every_flag() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let p = props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            host,
            host | vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);
        assert_eq!(find_memory_type(&p, 0b1111, host).unwrap(), 2);
        assert_eq!(find_memory_type(&p, 0b1000, host).unwrap(), 3);
        assert_eq!(
            find_memory_type(&p, 0b1111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
    }

    #[test]
    fn no_match_is_a_selection_error() {
        let p = props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&p, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, RenderError::Unsupported { what: "memory type", .. }));
        // allowed bits exclude the only candidate
        assert!(find_memory_type(&p, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).is_err());
    }
}
