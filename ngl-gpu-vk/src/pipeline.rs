//! Backend pipeline (§3.2, §3.3): descriptor-set layout, pipeline layout,
//! and the `VkGraphicsPipeline`/`VkComputePipeline` itself. A throwaway
//! `VkRenderPass` matching the pipeline's [`RenderTargetLayout`] is built
//! only to satisfy `vkCreateGraphicsPipelines`'s render-pass-compatibility
//! requirement (formats + sample count + attachment count, not load/store
//! ops) and destroyed immediately after — the real render pass used at draw
//! time lives in [`crate::rendertarget::VulkanRenderTarget`] and is checked
//! for compatibility the same way `ngl-gpu`'s façade checks it (Testable
//! Property #3).

use crate::shader::VulkanProgram;
use crate::texture::vk_format;
use ash::vk;
use ngl_gpu::bindgroup::{Access, BindGroupLayout, ShaderStageFlags};
use ngl_gpu::pipeline::{
    BlendFactor, BlendOp, CompareOp, CullMode, GraphicsState, PipelineDescriptor, PipelineType,
    PrimitiveTopology, StencilOp, VertexFormat, VertexStepMode,
};
use ngl_gpu::traits::Pipeline;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

fn blend_factor(f: BlendFactor) -> vk::BlendFactor {
    match f {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

fn blend_op(o: BlendOp) -> vk::BlendOp {
    match o {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

fn compare_op(c: CompareOp) -> vk::CompareOp {
    match c {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn stencil_op(o: StencilOp) -> vk::StencilOp {
    match o {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub fn cull_mode_flags(c: CullMode) -> vk::CullModeFlags {
    match c {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

fn topology(t: PrimitiveTopology) -> vk::PrimitiveTopology {
    match t {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

fn vertex_format(f: VertexFormat) -> vk::Format {
    match f {
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Sint32 => vk::Format::R32_SINT,
        VertexFormat::Sint32x2 => vk::Format::R32G32_SINT,
        VertexFormat::Sint32x3 => vk::Format::R32G32B32_SINT,
        VertexFormat::Sint32x4 => vk::Format::R32G32B32A32_SINT,
    }
}

fn stage_flags(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub fn descriptor_set_layout(device: &ash::Device, layout: &BindGroupLayout) -> Result<vk::DescriptorSetLayout> {
    let mut bindings = Vec::new();
    for entry in layout.textures.iter() {
        bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(entry.binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags(entry.stages)),
        );
    }
    for entry in layout.buffers.iter() {
        let ty = if entry.access == Access::Read {
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        } else {
            vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
        };
        bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(entry.binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags(entry.stages)),
        );
    }
    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe { device.create_descriptor_set_layout(&create_info, None) }
        .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateDescriptorSetLayout: {e}")))
}

/// Builds a `VkRenderPass` whose attachment formats/sample-count/order
/// match a [`ngl_gpu::rendertarget::RenderTargetLayout`] (§3.2: "a pipeline
/// is created against a layout"). Load/store ops here are placeholders —
/// Vulkan render-pass compatibility ignores them — the real ops live on
/// [`crate::rendertarget::VulkanRenderTarget`]'s own render pass.
pub fn render_pass_for_layout(
    device: &ash::Device,
    layout: &ngl_gpu::rendertarget::RenderTargetLayout,
) -> Result<vk::RenderPass> {
    let mut attachments = Vec::new();
    let mut color_refs = Vec::new();
    for color in layout.colors.iter() {
        let index = attachments.len() as u32;
        attachments.push(
            vk::AttachmentDescription::default()
                .format(vk_format(color.format))
                .samples(crate::rendertarget::samples_flag(layout.samples))
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        );
        color_refs.push(vk::AttachmentReference::default().attachment(index).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
    }
    let depth_ref = layout.depth_stencil.map(|ds| {
        let index = attachments.len() as u32;
        attachments.push(
            vk::AttachmentDescription::default()
                .format(vk_format(ds.format))
                .samples(crate::rendertarget::samples_flag(layout.samples))
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        );
        vk::AttachmentReference::default().attachment(index).layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }
    let subpasses = [subpass];
    let create_info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(&subpasses);
    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateRenderPass: {e}")))
}

#[derive(Debug)]
pub struct VulkanPipeline {
    device: Rc<ash::Device>,
    pub handle: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub is_compute: bool,
    pub vertex_buffer_count: u32,
}

impl VulkanPipeline {
    pub fn new(device: Rc<ash::Device>, desc: &PipelineDescriptor) -> Result<Self> {
        let set_layout = descriptor_set_layout(&device, &desc.bindgroup_layout)?;
        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(|e| {
            unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
            NglError::new(ErrorCode::Memory, format!("vkCreatePipelineLayout: {e}"))
        })?;

        if desc.ty == PipelineType::Compute {
            let program = desc
                .program
                .downcast_ref::<VulkanProgram>()
                .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan program bound to Vulkan device"))?;
            let module = program
                .compute
                .ok_or_else(|| NglError::new(ErrorCode::InvalidArg, "compute pipeline needs a compute program"))?;
            let entry = std::ffi::CString::new("main").unwrap();
            let stage = vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::COMPUTE)
                .module(module)
                .name(&entry);
            let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);
            let handle = unsafe {
                device.create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
            }
            .map_err(|(_, e)| NglError::new(ErrorCode::GraphicsUnsupported, format!("vkCreateComputePipelines: {e}")))?
            [0];
            return Ok(VulkanPipeline {
                device,
                handle,
                layout,
                descriptor_set_layout: set_layout,
                is_compute: true,
                vertex_buffer_count: 0,
            });
        }

        let render_pass = render_pass_for_layout(&device, &desc.rendertarget_layout)?;
        let program = desc
            .program
            .downcast_ref::<VulkanProgram>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan program bound to Vulkan device"))?;
        let entry = std::ffi::CString::new("main").unwrap();
        let mut stages = Vec::new();
        if let Some(vs) = program.vertex {
            stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::VERTEX).module(vs).name(&entry));
        }
        if let Some(fs) = program.fragment {
            stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::FRAGMENT).module(fs).name(&entry));
        }

        let mut bindings = Vec::new();
        let mut attributes = Vec::new();
        for (binding, buf) in desc.vertex_buffers.iter().enumerate() {
            bindings.push(
                vk::VertexInputBindingDescription::default()
                    .binding(binding as u32)
                    .stride(buf.stride)
                    .input_rate(match buf.step_mode {
                        VertexStepMode::Vertex => vk::VertexInputRate::VERTEX,
                        VertexStepMode::Instance => vk::VertexInputRate::INSTANCE,
                    }),
            );
            for attr in &buf.attributes {
                attributes.push(
                    vk::VertexInputAttributeDescription::default()
                        .location(attr.location)
                        .binding(binding as u32)
                        .format(vertex_format(attr.format))
                        .offset(attr.offset),
                );
            }
        }
        let vertex_input =
            vk::PipelineVertexInputStateCreateInfo::default().vertex_binding_descriptions(&bindings).vertex_attribute_descriptions(&attributes);
        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology(desc.topology));
        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);
        let state = desc.state;
        let rasterization = rasterization_state(state);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(crate::rendertarget::samples_flag(desc.rendertarget_layout.samples));
        let depth_stencil = depth_stencil_state(state);
        let color_attachment = color_blend_attachment(state);
        let color_attachments = [color_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let result = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None) };
        unsafe { device.destroy_render_pass(render_pass, None) };
        let handle = result
            .map_err(|(_, e)| NglError::new(ErrorCode::GraphicsUnsupported, format!("vkCreateGraphicsPipelines: {e}")))?
            [0];

        Ok(VulkanPipeline {
            device,
            handle,
            layout,
            descriptor_set_layout: set_layout,
            is_compute: false,
            vertex_buffer_count: desc.vertex_buffers.len() as u32,
        })
    }
}

fn rasterization_state(state: GraphicsState) -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(cull_mode_flags(state.cull_mode))
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0)
}

fn depth_stencil_state(state: GraphicsState) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    let face = |f: ngl_gpu::pipeline::StencilFaceState| vk::StencilOpState {
        fail_op: stencil_op(f.fail_op),
        pass_op: stencil_op(f.pass_op),
        depth_fail_op: stencil_op(f.depth_fail_op),
        compare_op: compare_op(f.compare_op),
        compare_mask: f.read_mask,
        write_mask: f.write_mask,
        reference: f.reference,
    };
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(state.depth.test_enable)
        .depth_write_enable(state.depth.write_enable)
        .depth_compare_op(compare_op(state.depth.compare_op))
        .stencil_test_enable(state.stencil.test_enable)
        .front(face(state.stencil.front))
        .back(face(state.stencil.back))
}

fn color_blend_attachment(state: GraphicsState) -> vk::PipelineColorBlendAttachmentState {
    use ngl_gpu::pipeline::ColorWriteMask as M;
    let mut write_mask = vk::ColorComponentFlags::empty();
    if state.color_write_mask.contains(M::RED) {
        write_mask |= vk::ColorComponentFlags::R;
    }
    if state.color_write_mask.contains(M::GREEN) {
        write_mask |= vk::ColorComponentFlags::G;
    }
    if state.color_write_mask.contains(M::BLUE) {
        write_mask |= vk::ColorComponentFlags::B;
    }
    if state.color_write_mask.contains(M::ALPHA) {
        write_mask |= vk::ColorComponentFlags::A;
    }
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(state.blend.enable)
        .src_color_blend_factor(blend_factor(state.blend.color.src_factor))
        .dst_color_blend_factor(blend_factor(state.blend.color.dst_factor))
        .color_blend_op(blend_op(state.blend.color.op))
        .src_alpha_blend_factor(blend_factor(state.blend.alpha.src_factor))
        .dst_alpha_blend_factor(blend_factor(state.blend.alpha.dst_factor))
        .alpha_blend_op(blend_op(state.blend.alpha.op))
        .color_write_mask(write_mask)
}

impl Pipeline for VulkanPipeline {}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.handle, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}
