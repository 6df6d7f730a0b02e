//! Backend buffer (§3.2): a `VkBuffer` plus its backing device memory.
//!
//! Vulkan has no glBufferSubData-style API independent of memory
//! visibility, so every buffer here is allocated from a host-visible,
//! host-coherent memory type; a backend targeting discrete GPUs with
//! staging uploads would instead route `upload` through a transfer queue
//! and a staging buffer, but that refinement is out of scope for the
//! reference implementation (SPEC_FULL.md §3.2 names staging memory as
//! optional).

use ash::vk;
use ngl_gpu::resource::{BufferDescriptor, BufferUsage};
use ngl_gpu::traits::Buffer;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

fn usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        let supported = (type_bits & (1 << i)) != 0;
        let suitable = props.memory_types[i as usize].property_flags.contains(required);
        supported && suitable
    })
}

#[derive(Debug)]
pub struct VulkanBuffer {
    device: Rc<ash::Device>,
    pub handle: vk::Buffer,
    memory: vk::DeviceMemory,
    descriptor: BufferDescriptor,
}

impl VulkanBuffer {
    pub fn new(
        device: Rc<ash::Device>,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        descriptor: BufferDescriptor,
    ) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::default()
            .size(descriptor.size.max(1))
            .usage(usage_flags(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { device.create_buffer(&create_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateBuffer: {e}")))?;
        let reqs = unsafe { device.get_buffer_memory_requirements(handle) };
        let mappable = descriptor.usage.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE);
        let mut required = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        if !mappable {
            required = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        }
        let type_index = find_memory_type(mem_props, reqs.memory_type_bits, required)
            .or_else(|| {
                find_memory_type(
                    mem_props,
                    reqs.memory_type_bits,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .ok_or_else(|| NglError::new(ErrorCode::Memory, "no suitable memory type for buffer"))?;
        let alloc_info = vk::MemoryAllocateInfo::default().allocation_size(reqs.size).memory_type_index(type_index);
        let memory = unsafe { device.allocate_memory(&alloc_info, None) }.map_err(|e| {
            unsafe { device.destroy_buffer(handle, None) };
            NglError::new(ErrorCode::Memory, format!("vkAllocateMemory: {e}"))
        })?;
        unsafe { device.bind_buffer_memory(handle, memory, 0) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkBindBufferMemory: {e}")))?;
        Ok(VulkanBuffer { device, handle, memory, descriptor })
    }
}

impl Buffer for VulkanBuffer {
    fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    fn upload(&self, offset: u64, data: &[u8]) -> Result<()> {
        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, offset, data.len() as u64, vk::MemoryMapFlags::empty())
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkMapMemory: {e}")))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    unsafe fn map(&self, offset: u64, len: u64) -> Result<*mut u8> {
        if !self.descriptor.usage.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE) {
            return Err(NglError::new(ErrorCode::InvalidUsage, "buffer was not created with MAP_* usage"));
        }
        let ptr = self
            .device
            .map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkMapMemory: {e}")))?;
        Ok(ptr as *mut u8)
    }

    fn unmap(&self) {
        unsafe { self.device.unmap_memory(self.memory) };
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.handle, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
