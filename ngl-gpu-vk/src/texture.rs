//! Backend texture (§3.2): a `VkImage` + view + memory, uploaded through a
//! transient staging buffer and a one-shot command buffer (Vulkan has no
//! direct CPU-to-optimal-tiling write path). Wrapped textures (created from
//! an externally supplied `VkImage`, e.g. an Android-hardware-buffer
//! import) forbid `upload` and mipmap generation, and `Drop` must not
//! destroy the underlying image or free memory it doesn't own (§4.5).

use ash::vk;
use ngl_gpu::format::PixelFormat;
use ngl_gpu::resource::{TextureDescriptor, TextureType};
use ngl_gpu::traits::Texture;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::cell::Cell;
use std::rc::Rc;

/// Queue + transient command pool shared by every texture/rendertarget
/// operation that needs a one-shot command buffer (upload, layout
/// transition, mipmap generation). Owned by [`crate::backend::VulkanDevice`]
/// and handed down by `Rc` — mirrors `ngl-gpu-gl` threading `Rc<glow::
/// Context>` through every backend resource.
#[derive(Debug)]
pub struct CommandContext {
    pub device: Rc<ash::Device>,
    pub queue: vk::Queue,
    pub pool: vk::CommandPool,
    pub mem_props: vk::PhysicalDeviceMemoryProperties,
}

impl CommandContext {
    /// Records `record` into a transient command buffer, submits it, and
    /// waits for completion. Every call here is followed by an immediate
    /// fence wait: this backend favors correctness over pipelining for
    /// resource setup, matching the GL backend's synchronous glTexSubImage
    /// calls at the same layer.
    pub fn run_oneshot(&self, record: impl FnOnce(vk::CommandBuffer)) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkAllocateCommandBuffers: {e}")))?[0];
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| NglError::new(ErrorCode::External, format!("vkBeginCommandBuffer: {e}")))?;
        }
        record(cmd);
        unsafe {
            self.device
                .end_command_buffer(cmd)
                .map_err(|e| NglError::new(ErrorCode::External, format!("vkEndCommandBuffer: {e}")))?;
            let cmds = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&cmds);
            self.device
                .queue_submit(self.queue, &[submit], vk::Fence::null())
                .map_err(|e| NglError::new(ErrorCode::External, format!("vkQueueSubmit: {e}")))?;
            self.device
                .queue_wait_idle(self.queue)
                .map_err(|e| NglError::new(ErrorCode::External, format!("vkQueueWaitIdle: {e}")))?;
            self.device.free_command_buffers(self.pool, &cmds);
        }
        Ok(())
    }

    fn find_memory_type(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> Option<u32> {
        (0..self.mem_props.memory_type_count).find(|&i| {
            (type_bits & (1 << i)) != 0
                && self.mem_props.memory_types[i as usize].property_flags.contains(required)
        })
    }
}

pub fn vk_format(format: PixelFormat) -> vk::Format {
    use PixelFormat::*;
    match format {
        R8Unorm => vk::Format::R8_UNORM,
        Rg8Unorm => vk::Format::R8G8_UNORM,
        Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        R16Float => vk::Format::R16_SFLOAT,
        Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        R32Float => vk::Format::R32_SFLOAT,
        Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        Depth16Unorm => vk::Format::D16_UNORM,
        Depth24UnormStencil8 => vk::Format::D24_UNORM_S8_UINT,
        Depth32Float => vk::Format::D32_SFLOAT,
    }
}

fn image_type_and_view_type(ty: TextureType) -> (vk::ImageType, vk::ImageViewType, vk::ImageCreateFlags) {
    match ty {
        TextureType::Texture2D => (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D, vk::ImageCreateFlags::empty()),
        TextureType::Texture2DArray => {
            (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D_ARRAY, vk::ImageCreateFlags::empty())
        }
        TextureType::Texture3D => (vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D, vk::ImageCreateFlags::empty()),
        TextureType::TextureCube => {
            (vk::ImageType::TYPE_2D, vk::ImageViewType::CUBE, vk::ImageCreateFlags::CUBE_COMPATIBLE)
        }
    }
}

fn usage_flags(usage: ngl_gpu::resource::TextureUsage, format: PixelFormat) -> vk::ImageUsageFlags {
    use ngl_gpu::resource::TextureUsage as U;
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(U::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(U::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(U::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(U::DEPTH_STENCIL_ATTACHMENT) || format.is_depth_stencil() {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(U::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(U::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(U::TRANSIENT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::TRANSIENT_ATTACHMENT;
    }
    flags
}

fn aspect_mask(format: PixelFormat) -> vk::ImageAspectFlags {
    let info = format.info();
    if info.has_depth && info.has_stencil {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if info.has_depth {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

#[derive(Debug)]
pub struct VulkanTexture {
    ctx: Rc<CommandContext>,
    pub image: vk::Image,
    pub view: vk::ImageView,
    memory: Option<vk::DeviceMemory>,
    descriptor: TextureDescriptor,
    /// Tracked so `upload`/mipmap generation know which barrier to emit;
    /// Vulkan has no implicit layout like GL's bound-texture-is-ready model.
    layout: Cell<vk::ImageLayout>,
}

impl VulkanTexture {
    pub fn new(ctx: Rc<CommandContext>, descriptor: TextureDescriptor) -> Result<Self> {
        let (image_type, view_type, create_flags) = image_type_and_view_type(descriptor.ty);
        let format = vk_format(descriptor.format);
        let levels = descriptor.mip_level_count();
        let layers = if descriptor.ty == TextureType::TextureCube { 6 } else { descriptor.depth_or_layers.max(1) };
        let depth = if descriptor.ty == TextureType::Texture3D { descriptor.depth_or_layers.max(1) } else { 1 };

        let create_info = vk::ImageCreateInfo::default()
            .flags(create_flags)
            .image_type(image_type)
            .format(format)
            .extent(vk::Extent3D { width: descriptor.width, height: descriptor.height, depth })
            .mip_levels(levels)
            .array_layers(layers)
            .samples(samples_flag(descriptor.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage_flags(descriptor.usage, descriptor.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { ctx.device.create_image(&create_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateImage: {e}")))?;
        let reqs = unsafe { ctx.device.get_image_memory_requirements(image) };
        let type_index = ctx
            .find_memory_type(reqs.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
            .ok_or_else(|| NglError::new(ErrorCode::Memory, "no suitable memory type for image"))?;
        let alloc_info = vk::MemoryAllocateInfo::default().allocation_size(reqs.size).memory_type_index(type_index);
        let memory = unsafe { ctx.device.allocate_memory(&alloc_info, None) }.map_err(|e| {
            unsafe { ctx.device.destroy_image(image, None) };
            NglError::new(ErrorCode::Memory, format!("vkAllocateMemory: {e}"))
        })?;
        unsafe { ctx.device.bind_image_memory(image, memory, 0) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkBindImageMemory: {e}")))?;

        let view = Self::create_view(&ctx.device, image, view_type, format, descriptor, levels, layers)?;

        Ok(VulkanTexture {
            ctx,
            image,
            view,
            memory: Some(memory),
            descriptor,
            layout: Cell::new(vk::ImageLayout::UNDEFINED),
        })
    }

    /// Wraps an externally-supplied `VkImage` (§4.5): `handle` is the raw
    /// `u64` image handle; `Drop` must not destroy it or free memory this
    /// texture never allocated.
    pub fn wrap(ctx: Rc<CommandContext>, descriptor: TextureDescriptor, handle: u64) -> Result<Self> {
        debug_assert!(descriptor.wrapped);
        let (_, view_type, _) = image_type_and_view_type(descriptor.ty);
        let format = vk_format(descriptor.format);
        let image = vk::Image::from_raw(handle);
        let levels = descriptor.mip_level_count();
        let layers = descriptor.depth_or_layers.max(1);
        let view = Self::create_view(&ctx.device, image, view_type, format, descriptor, levels, layers)?;
        Ok(VulkanTexture { ctx, image, view, memory: None, descriptor, layout: Cell::new(vk::ImageLayout::UNDEFINED) })
    }

    fn create_view(
        device: &ash::Device,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        descriptor: TextureDescriptor,
        levels: u32,
        layers: u32,
    ) -> Result<vk::ImageView> {
        let subresource = vk::ImageSubresourceRange::default()
            .aspect_mask(aspect_mask(descriptor.format))
            .base_mip_level(0)
            .level_count(levels)
            .base_array_layer(0)
            .layer_count(layers);
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(subresource);
        unsafe { device.create_image_view(&create_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateImageView: {e}")))
    }

    fn transition(&self, cmd: vk::CommandBuffer, new_layout: vk::ImageLayout, levels: u32) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(self.layout.get())
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect_mask(self.descriptor.format))
                    .base_mip_level(0)
                    .level_count(levels)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        self.layout.set(new_layout);
    }
}

fn samples_flag(samples: u32) -> vk::SampleCountFlags {
    match samples {
        0 | 1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

impl Texture for VulkanTexture {
    fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    fn upload(&self, level: u32, data: &[u8]) -> Result<()> {
        if self.descriptor.wrapped {
            return Err(NglError::new(ErrorCode::InvalidUsage, "upload is forbidden on a wrapped texture"));
        }
        let staging = crate::buffer::VulkanBuffer::new(
            self.ctx.device.clone(),
            &self.ctx.mem_props,
            ngl_gpu::resource::BufferDescriptor {
                size: data.len() as u64,
                usage: ngl_gpu::resource::BufferUsage::TRANSFER_SRC
                    | ngl_gpu::resource::BufferUsage::MAP_WRITE,
            },
        )?;
        <crate::buffer::VulkanBuffer as Buffer>::upload(&staging, 0, data)?;

        let w = (self.descriptor.width >> level).max(1);
        let h = (self.descriptor.height >> level).max(1);
        let levels = self.descriptor.mip_level_count();
        self.ctx.run_oneshot(|cmd| {
            self.transition(cmd, vk::ImageLayout::TRANSFER_DST_OPTIMAL, levels);
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(aspect_mask(self.descriptor.format))
                        .mip_level(level)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_extent(vk::Extent3D { width: w, height: h, depth: 1 });
            unsafe {
                self.ctx.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            self.transition(cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, levels);
        })
    }

    fn download(&self, level: u32) -> Result<Vec<u8>> {
        let bpp = self.descriptor.format.info().bytes_per_pixel;
        let w = (self.descriptor.width >> level).max(1);
        let h = (self.descriptor.height >> level).max(1);
        let size = (w * h * bpp) as u64;
        let staging = crate::buffer::VulkanBuffer::new(
            self.ctx.device.clone(),
            &self.ctx.mem_props,
            ngl_gpu::resource::BufferDescriptor {
                size,
                usage: ngl_gpu::resource::BufferUsage::TRANSFER_DST | ngl_gpu::resource::BufferUsage::MAP_READ,
            },
        )?;
        let levels = self.descriptor.mip_level_count();
        self.ctx.run_oneshot(|cmd| {
            self.transition(cmd, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, levels);
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(aspect_mask(self.descriptor.format))
                        .mip_level(level)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_extent(vk::Extent3D { width: w, height: h, depth: 1 });
            unsafe {
                self.ctx.device.cmd_copy_image_to_buffer(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    staging.handle,
                    &[region],
                );
            }
            self.transition(cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, levels);
        })?;
        unsafe {
            let ptr = Buffer::map(&staging, 0, size)?;
            let mut out = vec![0u8; size as usize];
            std::ptr::copy_nonoverlapping(ptr, out.as_mut_ptr(), size as usize);
            staging.unmap();
            Ok(out)
        }
    }

    fn generate_mipmaps(&self) -> Result<()> {
        if self.descriptor.wrapped {
            return Err(NglError::new(ErrorCode::InvalidUsage, "mipmap generation is forbidden on a wrapped texture"));
        }
        let levels = self.descriptor.mip_level_count();
        if levels <= 1 {
            return Ok(());
        }
        self.ctx.run_oneshot(|cmd| {
            let mut mip_w = self.descriptor.width as i32;
            let mut mip_h = self.descriptor.height as i32;
            for level in 1..levels {
                let barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(self.image)
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(level - 1)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );
                unsafe {
                    self.ctx.device.cmd_pipeline_barrier(
                        cmd,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier],
                    );
                }
                let next_w = (mip_w / 2).max(1);
                let next_h = (mip_h / 2).max(1);
                let blit = vk::ImageBlit::default()
                    .src_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level - 1)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .src_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D { x: mip_w, y: mip_h, z: 1 },
                    ])
                    .dst_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .mip_level(level)
                            .base_array_layer(0)
                            .layer_count(1),
                    )
                    .dst_offsets([
                        vk::Offset3D { x: 0, y: 0, z: 0 },
                        vk::Offset3D { x: next_w, y: next_h, z: 1 },
                    ]);
                unsafe {
                    self.ctx.device.cmd_blit_image(
                        cmd,
                        self.image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        self.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit],
                        vk::Filter::LINEAR,
                    );
                }
                mip_w = next_w;
                mip_h = next_h;
            }
            self.layout.set(vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            self.transition(cmd, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, levels);
        })
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            if !self.descriptor.wrapped {
                self.ctx.device.destroy_image(self.image, None);
            }
            if let Some(memory) = self.memory {
                self.ctx.device.free_memory(memory, None);
            }
        }
    }
}
