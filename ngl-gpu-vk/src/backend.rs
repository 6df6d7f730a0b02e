//! The concrete `GpuDevice` for Vulkan (§4.1, §4.3). Assumes the caller has
//! already created an `ash::Instance`/`ash::Device`/graphics queue and
//! handed them to [`VulkanDevice::new`] — obtaining those from the
//! platform's window system (and any `VK_KHR_surface`/`VK_KHR_swapchain`
//! extensions) is the façade's job, not this crate's (the WSI is named but
//! out of scope, SPEC_FULL.md §1), the same division `ngl-gpu-gl` draws
//! around an already-current `glow::Context`.
//!
//! Unlike GL's immediate-mode call stream, every recorded command here goes
//! into one primary command buffer spanning `begin_draw`..`end_draw`,
//! submitted once at `end_draw` and waited on with a fence before the
//! capture read-back (§4.1.1, §5 ordering guarantees: "MSAA resolve and
//! capture read-back are observed strictly after every draw").

use crate::pipeline::VulkanPipeline;
use crate::query::TimerQuery;
use crate::rendertarget::VulkanRenderTarget;
use crate::texture::{CommandContext, VulkanTexture};
use ash::vk;
use ngl_gpu::bindgroup::{Access, BindGroup};
use ngl_gpu::config::{Backend, GpuConfig, Viewport};
use ngl_gpu::context::GpuDevice;
use ngl_gpu::format::PixelFormat;
use ngl_gpu::limits::{Features, Limits};
use ngl_gpu::pipeline::{CullMode, PipelineDescriptor};
use ngl_gpu::rendertarget::{LoadOp, RenderTarget, RenderTargetLayout};
use ngl_gpu::resource::{BufferDescriptor, TextureDescriptor, TextureType, TextureUsage};
use ngl_gpu::traits::{Buffer, Pipeline, Program, RenderTargetBackend, Texture};
use ngl_gpu::vertex::IndexFormat;
use ngl_gpu::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::cell::RefCell;
use std::rc::Rc;

fn index_type(f: IndexFormat) -> vk::IndexType {
    match f {
        IndexFormat::R16Uint => vk::IndexType::UINT16,
        IndexFormat::R32Uint => vk::IndexType::UINT32,
    }
}

/// Everything the caller's WSI/instance setup must supply; obtaining these
/// values is out of scope (SPEC_FULL.md §1).
pub struct VulkanDeviceParams {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
}

/// Just enough of a bound pipeline to fill in the next `bind_bindgroup`
/// call — copied out of the `VulkanPipeline` rather than holding the
/// pipeline itself, since ownership of that object (and its `Drop`) stays
/// with the `Ref<dyn Pipeline>` the façade already holds.
#[derive(Copy, Clone, Debug)]
struct BoundPipelineInfo {
    layout: vk::PipelineLayout,
    descriptor_set_layout: vk::DescriptorSetLayout,
    is_compute: bool,
}

#[derive(Debug, Default)]
struct BoundState {
    pipeline: Option<BoundPipelineInfo>,
    descriptor_set: Option<vk::DescriptorSet>,
}

#[derive(Debug)]
pub struct VulkanDevice {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    ctx: Rc<CommandContext>,
    config: GpuConfig,
    width: u32,
    height: u32,
    features: Features,
    limits: Limits,
    version: u32,

    frame_pool: vk::CommandPool,
    frame_cmd: vk::CommandBuffer,
    frame_fence: vk::Fence,
    descriptor_pool: vk::DescriptorPool,

    timer: Option<RefCell<TimerQuery>>,

    default_image: VulkanTexture,
    default_rt: VulkanRenderTarget,

    bound: BoundState,
    active_render_pass: Option<(vk::RenderPass, vk::Framebuffer)>,
}

const DEFAULT_COLOR_FORMAT: PixelFormat = PixelFormat::Rgba8Unorm;

impl VulkanDevice {
    pub fn new(params: VulkanDeviceParams, config: GpuConfig) -> Result<Self> {
        let device = Rc::new(params.device);
        let mem_props = unsafe { params.instance.get_physical_device_memory_properties(params.physical_device) };
        let props = unsafe { params.instance.get_physical_device_properties(params.physical_device) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(params.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let oneshot_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateCommandPool: {e}")))?;
        let ctx = Rc::new(CommandContext { device: device.clone(), queue: params.queue, pool: oneshot_pool, mem_props });

        let frame_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateCommandPool: {e}")))?;
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(frame_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let frame_cmd = unsafe { device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkAllocateCommandBuffers: {e}")))?[0];
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let frame_fence = unsafe { device.create_fence(&fence_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateFence: {e}")))?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER).descriptor_count(64),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC).descriptor_count(64),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC).descriptor_count(64),
        ];
        let dp_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(64)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);
        let descriptor_pool = unsafe { device.create_descriptor_pool(&dp_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateDescriptorPool: {e}")))?;

        let timer = TimerQuery::new(&device, props.limits.timestamp_period).map(RefCell::new);
        let mut features = Features::NPOT_MIPMAP | Features::COMPUTE | Features::INVALIDATE_SUBDATA;
        if timer.is_some() {
            features |= Features::TIMER_QUERY;
        }
        if props.limits.framebuffer_depth_sample_counts.intersects(vk::SampleCountFlags::TYPE_4) {
            features |= Features::DEPTH_STENCIL_RESOLVE;
        }

        let (width, height) = (config.width.max(1), config.height.max(1));
        let default_image = VulkanTexture::new(
            ctx.clone(),
            TextureDescriptor {
                ty: TextureType::Texture2D,
                format: DEFAULT_COLOR_FORMAT,
                width,
                height,
                depth_or_layers: 1,
                samples: 1,
                usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_SRC,
                sampler: Default::default(),
                wrapped: false,
            },
        )?;
        let default_rt =
            VulkanRenderTarget::default_target(ctx.clone(), default_image.view, DEFAULT_COLOR_FORMAT, width, height)?;

        let limits = Limits {
            max_color_attachments: props.limits.max_color_attachments.min(8),
            max_texture_size: props.limits.max_image_dimension2_d,
            max_samples: 8,
            max_dynamic_uniform_buffers: props.limits.max_descriptor_set_uniform_buffers_dynamic.min(8),
            max_dynamic_storage_buffers: props.limits.max_descriptor_set_storage_buffers_dynamic.min(4),
        };

        Ok(VulkanDevice {
            instance: params.instance,
            physical_device: params.physical_device,
            ctx,
            config,
            width,
            height,
            features,
            limits,
            version: vk::api_version_major(props.api_version) * 1000 + vk::api_version_minor(props.api_version) * 100,
            frame_pool,
            frame_cmd,
            frame_fence,
            descriptor_pool,
            timer,
            default_image,
            default_rt,
            bound: BoundState::default(),
            active_render_pass: None,
        })
    }

    fn device(&self) -> &ash::Device {
        &self.ctx.device
    }

    fn downcast_texture<'a>(t: &'a dyn Texture) -> Result<&'a VulkanTexture> {
        t.downcast_ref::<VulkanTexture>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan texture bound to Vulkan device"))
    }

    fn downcast_buffer<'a>(b: &'a dyn Buffer) -> Result<&'a crate::buffer::VulkanBuffer> {
        b.downcast_ref::<crate::buffer::VulkanBuffer>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan buffer bound to Vulkan device"))
    }
}

impl GpuDevice for VulkanDevice {
    fn kind(&self) -> Backend {
        self.config.backend
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn language_version(&self) -> u32 {
        // SPIR-V version this backend expects shaders compiled for; the
        // façade's shader-cross-compilation step (out of scope) is
        // responsible for matching it.
        self.version
    }

    fn features(&self) -> Features {
        self.features
    }

    fn limits(&self) -> Limits {
        self.limits
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, viewport: Option<Viewport>) -> Result<()> {
        self.width = width;
        self.height = height;
        if let Some(vp) = viewport {
            self.config.width = vp.width;
            self.config.height = vp.height;
        }
        self.default_image = VulkanTexture::new(
            self.ctx.clone(),
            TextureDescriptor {
                ty: TextureType::Texture2D,
                format: DEFAULT_COLOR_FORMAT,
                width: width.max(1),
                height: height.max(1),
                depth_or_layers: 1,
                samples: 1,
                usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_SRC,
                sampler: Default::default(),
                wrapped: false,
            },
        )?;
        self.default_rt =
            VulkanRenderTarget::default_target(self.ctx.clone(), self.default_image.view, DEFAULT_COLOR_FORMAT, width.max(1), height.max(1))?;
        Ok(())
    }

    fn wait_idle(&self) {
        unsafe { let _ = self.device().device_wait_idle(); }
    }

    fn create_buffer(&self, desc: BufferDescriptor) -> Result<Ref<dyn Buffer>> {
        let buf = crate::buffer::VulkanBuffer::new(self.ctx.device.clone(), &self.ctx.mem_props, desc)?;
        Ok(Ref::new(buf))
    }

    fn create_texture(&self, desc: TextureDescriptor) -> Result<Ref<dyn Texture>> {
        let tex = VulkanTexture::new(self.ctx.clone(), desc)?;
        Ok(Ref::new(tex))
    }

    fn wrap_texture(&self, desc: TextureDescriptor, handle: u64) -> Result<Ref<dyn Texture>> {
        let tex = VulkanTexture::wrap(self.ctx.clone(), desc, handle)?;
        Ok(Ref::new(tex))
    }

    fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Ref<dyn Program>> {
        let program = crate::shader::VulkanProgram::new_graphics(self.ctx.device.clone(), vertex_src, fragment_src)?;
        Ok(Ref::new(program))
    }

    fn create_compute_program(&self, compute_src: &str) -> Result<Ref<dyn Program>> {
        if !self.features.contains(Features::COMPUTE) {
            return Err(NglError::new(ErrorCode::Unsupported, "compute shaders are not available"));
        }
        let program = crate::shader::VulkanProgram::new_compute(self.ctx.device.clone(), compute_src)?;
        Ok(Ref::new(program))
    }

    fn create_pipeline(&self, desc: &PipelineDescriptor) -> Result<Ref<dyn Pipeline>> {
        let pipeline = VulkanPipeline::new(self.ctx.device.clone(), desc)?;
        Ok(Ref::new(pipeline))
    }

    fn create_rendertarget_backend(&self, rt: &RenderTarget) -> Result<Ref<dyn RenderTargetBackend>> {
        let backend = VulkanRenderTarget::build(self.ctx.clone(), rt)?;
        Ok(Ref::new(backend))
    }

    fn default_rendertarget(&self, load_op: LoadOp) -> (RenderTarget, Ref<dyn RenderTargetBackend>) {
        // The internally owned default render target always clears; a
        // "resume" (LOAD) variant would require tracking the swapchain
        // image's prior contents, which the WSI (out of scope) owns.
        let _ = load_op;
        let rt = RenderTarget {
            width: self.width,
            height: self.height,
            layout: RenderTargetLayout { samples: self.config.samples, ..Default::default() },
            colors: Default::default(),
            depth_stencil: None,
        };
        (rt, Ref::new(self.default_rt.share()))
    }

    fn begin_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        let vk_rt = backend_rt
            .downcast_ref::<VulkanRenderTarget>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan render target bound to Vulkan device"))?;

        let mut clear_values = Vec::new();
        for color in rt.colors.iter() {
            clear_values.push(vk::ClearValue { color: vk::ClearColorValue { float32: color.clear_value.color } });
        }
        if let Some(ds) = &rt.depth_stencil {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: ds.clear_value.depth, stencil: ds.clear_value.stencil as u32 },
            });
        }
        if clear_values.is_empty() {
            let [r, g, b, a] = self.config.clear_color;
            clear_values.push(vk::ClearValue { color: vk::ClearColorValue { float32: [r, g, b, a] } });
        }

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_rt.render_pass)
            .framebuffer(vk_rt.framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: vk::Extent2D { width: rt.width, height: rt.height } })
            .clear_values(&clear_values);
        unsafe {
            self.device().cmd_begin_render_pass(self.frame_cmd, &begin_info, vk::SubpassContents::INLINE);
            let viewport = vk::Viewport { x: 0.0, y: 0.0, width: rt.width as f32, height: rt.height as f32, min_depth: 0.0, max_depth: 1.0 };
            self.device().cmd_set_viewport(self.frame_cmd, 0, &[viewport]);
            let scissor = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: vk::Extent2D { width: rt.width, height: rt.height } };
            self.device().cmd_set_scissor(self.frame_cmd, 0, &[scissor]);
        }
        self.active_render_pass = Some((vk_rt.render_pass, vk_rt.framebuffer));
        Ok(())
    }

    fn end_render_pass(&mut self, _rt: &RenderTarget, _backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        unsafe { self.device().cmd_end_render_pass(self.frame_cmd) };
        self.active_render_pass = None;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) {
        let Some(vk_pipeline) = pipeline.downcast_ref::<VulkanPipeline>() else {
            log::error!("non-Vulkan pipeline bound to Vulkan device");
            return;
        };
        let bind_point = if vk_pipeline.is_compute { vk::PipelineBindPoint::COMPUTE } else { vk::PipelineBindPoint::GRAPHICS };
        unsafe { self.device().cmd_bind_pipeline(self.frame_cmd, bind_point, vk_pipeline.handle) };
        self.bound.pipeline = Some(BoundPipelineInfo {
            layout: vk_pipeline.layout,
            descriptor_set_layout: vk_pipeline.descriptor_set_layout,
            is_compute: vk_pipeline.is_compute,
        });
        self.bound.descriptor_set = None;
    }

    fn bind_bindgroup(&mut self, bindgroup: &BindGroup, dynamic_offsets: &[u32]) {
        let Some(pipeline) = self.bound.pipeline.as_ref() else {
            log::error!("set_bindgroup called with no pipeline bound");
            return;
        };
        let layouts = [pipeline.descriptor_set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.descriptor_pool).set_layouts(&layouts);
        let set = match unsafe { self.device().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                log::error!("vkAllocateDescriptorSets: {e}");
                return;
            }
        };

        let mut writes = Vec::new();
        let mut image_infos = Vec::new();
        for (i, binding) in bindgroup.textures().iter().enumerate() {
            if let Some(binding) = binding {
                if let Ok(tex) = Self::downcast_texture(&*binding.texture) {
                    image_infos.push(vk::DescriptorImageInfo::default().image_view(tex.view).image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));
                    let info_ref = image_infos.last().unwrap();
                    let entry = &bindgroup.layout.textures[i];
                    writes.push(
                        vk::WriteDescriptorSet::default()
                            .dst_set(set)
                            .dst_binding(entry.binding)
                            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                            .image_info(std::slice::from_ref(info_ref)),
                    );
                }
            }
        }
        let mut buffer_infos = Vec::new();
        for (i, binding) in bindgroup.buffers().iter().enumerate() {
            if let Some(binding) = binding {
                if let Ok(buf) = Self::downcast_buffer(&*binding.buffer) {
                    buffer_infos.push(vk::DescriptorBufferInfo::default().buffer(buf.handle).offset(binding.offset).range(binding.size));
                    let info_ref = buffer_infos.last().unwrap();
                    let entry = &bindgroup.layout.buffers[i];
                    let ty = if entry.access == Access::Read {
                        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
                    } else {
                        vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
                    };
                    writes.push(
                        vk::WriteDescriptorSet::default()
                            .dst_set(set)
                            .dst_binding(entry.binding)
                            .descriptor_type(ty)
                            .buffer_info(std::slice::from_ref(info_ref)),
                    );
                }
            }
        }
        if !writes.is_empty() {
            unsafe { self.device().update_descriptor_sets(&writes, &[]) };
        }

        let bind_point = if pipeline.is_compute { vk::PipelineBindPoint::COMPUTE } else { vk::PipelineBindPoint::GRAPHICS };
        unsafe {
            self.device().cmd_bind_descriptor_sets(self.frame_cmd, bind_point, pipeline.layout, 0, &[set], dynamic_offsets);
        }
        // §4.3/§5: conservative barrier bracketing any WRITE-access texture.
        if bindgroup.has_write_access() {
            let barrier = vk::MemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE);
            unsafe {
                self.device().cmd_pipeline_barrier(
                    self.frame_cmd,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[barrier],
                    &[],
                    &[],
                );
            }
        }
        self.bound.descriptor_set = Some(set);
    }

    fn bind_vertex_buffer(&mut self, index: u32, buffer: &dyn Buffer, offset: u64) {
        let Ok(buf) = Self::downcast_buffer(buffer) else { return };
        unsafe { self.device().cmd_bind_vertex_buffers(self.frame_cmd, index, &[buf.handle], &[offset]) };
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, format: IndexFormat) {
        let Ok(buf) = Self::downcast_buffer(buffer) else { return };
        unsafe { self.device().cmd_bind_index_buffer(self.frame_cmd, buf.handle, offset, index_type(format)) };
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe { self.device().cmd_draw(self.frame_cmd, vertex_count, instance_count.max(1), first_vertex, first_instance) };
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        unsafe {
            self.device().cmd_draw_indexed(self.frame_cmd, index_count, instance_count.max(1), first_index, vertex_offset, first_instance);
        }
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        unsafe { self.device().cmd_dispatch(self.frame_cmd, group_x, group_y, group_z) };
    }

    fn begin_draw(&mut self, _t: f64) {
        let device = self.ctx.device.clone();
        unsafe {
            let _ = device.wait_for_fences(&[self.frame_fence], true, u64::MAX);
            let _ = device.reset_fences(&[self.frame_fence]);
            let _ = device.reset_command_pool(self.frame_pool, vk::CommandPoolResetFlags::empty());
            let _ = device.reset_descriptor_pool(self.descriptor_pool, vk::DescriptorPoolResetFlags::empty());
            let begin_info = vk::CommandBufferBeginInfo::default();
            let _ = device.begin_command_buffer(self.frame_cmd, &begin_info);
        }
        if let Some(timer) = self.timer.as_ref() {
            timer.borrow_mut().begin(&device, self.frame_cmd);
        }
    }

    fn end_draw(&mut self, _t: f64, capture: Option<&mut [u8]>) {
        let device = self.ctx.device.clone();
        if let Some(timer) = self.timer.as_ref() {
            timer.borrow_mut().end(&device, self.frame_cmd);
        }
        unsafe {
            let _ = device.end_command_buffer(self.frame_cmd);
            let cmds = [self.frame_cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&cmds);
            let _ = device.queue_submit(self.ctx.queue, &[submit], self.frame_fence);
            let _ = device.wait_for_fences(&[self.frame_fence], true, u64::MAX);
        }
        if let Some(dst) = capture {
            if let Ok(bytes) = self.default_image.download(0) {
                let len = dst.len().min(bytes.len());
                dst[..len].copy_from_slice(&bytes[..len]);
            }
        }
    }

    fn query_draw_time_ns(&self) -> Option<u64> {
        self.timer.as_ref()?.borrow_mut().result_ns(self.device())
    }

    fn transform_projection_matrix(&self, m: &mut [f32; 16]) {
        // Vulkan's clip space is already Y-down, matching this engine's
        // onscreen convention once the viewport height is negated (done by
        // the WSI, out of scope); the façade identity here matches
        // SPEC_FULL.md §4.1: "the Vulkan backend exposes identity".
        let _ = m;
    }

    fn rendertarget_uvcoord_matrix(&self) -> [f32; 16] {
        let mut m = [0.0f32; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        m
    }

    fn transform_cull_mode(&self, cull_mode: CullMode) -> CullMode {
        cull_mode
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        self.wait_idle();
        if let Some(timer) = self.timer.as_ref() {
            timer.borrow().destroy(self.device());
        }
        unsafe {
            self.device().destroy_descriptor_pool(self.descriptor_pool, None);
            self.device().destroy_fence(self.frame_fence, None);
            self.device().destroy_command_pool(self.frame_pool, None);
            self.device().destroy_command_pool(self.ctx.pool, None);
        }
    }
}
