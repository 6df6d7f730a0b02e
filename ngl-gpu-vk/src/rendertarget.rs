//! Backend render target (§3.2, §4.2): a real `VkRenderPass` (with the
//! attachments' actual load/store ops, unlike the throwaway one
//! [`crate::pipeline`] builds for compatibility checks) plus the
//! `VkFramebuffer` bound to it.
//!
//! The default (onscreen) render target is presented by the WSI, which is
//! out of scope here (SPEC_FULL.md §1); this backend owns an internally
//! allocated color image standing in for the swapchain's current image, the
//! same simplification `ngl-gpu-gl`'s default framebuffer (id 0) makes by
//! assuming *some* framebuffer is already bound by the platform layer. A
//! real WSI integration substitutes its own swapchain image/view for this
//! one immediately before present.

use crate::texture::CommandContext;
use ash::vk;
use ngl_gpu::format::PixelFormat;
use ngl_gpu::rendertarget::{LoadOp, RenderTarget, RenderTargetLayout, StoreOp};
use ngl_gpu::traits::{RenderTargetBackend, Texture};
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

pub fn samples_flag(samples: u32) -> vk::SampleCountFlags {
    match samples {
        0 | 1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

fn downcast_texture<'a>(t: &'a dyn Texture) -> Result<&'a crate::texture::VulkanTexture> {
    t.downcast_ref::<crate::texture::VulkanTexture>()
        .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-Vulkan texture bound to Vulkan device"))
}

#[derive(Debug)]
pub struct VulkanRenderTarget {
    ctx: Rc<CommandContext>,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    /// `None` for the default render target: presentation happens via the
    /// WSI path rather than an MSAA-resolve blit here.
    pub resolve_from_msaa: bool,
    /// `true` when this object owns `render_pass`/`framebuffer` and must
    /// destroy them; the default render target variants share ownership
    /// with [`crate::backend::VulkanDevice`] instead (rebuilt on resize).
    pub owned: bool,
}

impl VulkanRenderTarget {
    /// Builds the real render pass + framebuffer for an RTT node's render
    /// target (§4.2): attachments, resolve targets, and load/store ops come
    /// straight from the [`RenderTarget`] value built by the scene runtime.
    pub fn build(ctx: Rc<CommandContext>, rt: &RenderTarget) -> Result<Self> {
        let mut attachments = Vec::new();
        let mut views = Vec::new();
        let mut color_refs = Vec::new();
        let mut resolve_refs = Vec::new();
        let mut has_resolve = false;

        for color in rt.colors.iter() {
            let tex = downcast_texture(&*color.texture)?;
            let index = attachments.len() as u32;
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(crate::texture::vk_format(color.texture.descriptor().format))
                    .samples(samples_flag(rt.layout.samples))
                    .load_op(load_op(color.load_op))
                    .store_op(store_op(color.store_op))
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            );
            views.push(tex.view);
            color_refs.push(vk::AttachmentReference::default().attachment(index).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));

            if let Some((resolve_tex, _)) = &color.resolve_target {
                has_resolve = true;
                let resolve_tex = downcast_texture(&**resolve_tex)?;
                let r_index = attachments.len() as u32;
                attachments.push(
                    vk::AttachmentDescription::default()
                        .format(crate::texture::vk_format(resolve_tex.descriptor().format))
                        .samples(vk::SampleCountFlags::TYPE_1)
                        .load_op(vk::AttachmentLoadOp::DONT_CARE)
                        .store_op(vk::AttachmentStoreOp::STORE)
                        .initial_layout(vk::ImageLayout::UNDEFINED)
                        .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                );
                views.push(resolve_tex.view);
                resolve_refs.push(vk::AttachmentReference::default().attachment(r_index).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
            } else {
                resolve_refs.push(vk::AttachmentReference::default().attachment(vk::ATTACHMENT_UNUSED).layout(vk::ImageLayout::UNDEFINED));
            }
        }

        let depth_ref = if let Some(ds) = &rt.depth_stencil {
            let tex = downcast_texture(&*ds.texture)?;
            let index = attachments.len() as u32;
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(crate::texture::vk_format(ds.texture.descriptor().format))
                    .samples(samples_flag(rt.layout.samples))
                    .load_op(load_op(ds.load_op))
                    .store_op(store_op(ds.store_op))
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            views.push(tex.view);
            Some(vk::AttachmentReference::default().attachment(index).layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL))
        } else {
            None
        };

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if has_resolve {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass];
        let rp_info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(&subpasses);
        let render_pass = unsafe { ctx.device.create_render_pass(&rp_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateRenderPass: {e}")))?;

        let fb_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&views)
            .width(rt.width)
            .height(rt.height)
            .layers(1);
        let framebuffer = unsafe { ctx.device.create_framebuffer(&fb_info, None) }.map_err(|e| {
            unsafe { ctx.device.destroy_render_pass(render_pass, None) };
            NglError::new(ErrorCode::Memory, format!("vkCreateFramebuffer: {e}"))
        })?;

        Ok(VulkanRenderTarget { ctx, render_pass, framebuffer, resolve_from_msaa: has_resolve, owned: true })
    }

    /// The internally-owned default render target standing in for the
    /// swapchain's current image (see module doc).
    pub fn default_target(
        ctx: Rc<CommandContext>,
        color_view: vk::ImageView,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let attachment = vk::AttachmentDescription::default()
            .format(crate::texture::vk_format(format))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        let attachments = [attachment];
        let color_ref = vk::AttachmentReference::default().attachment(0).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS).color_attachments(&color_refs);
        let subpasses = [subpass];
        let rp_info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(&subpasses);
        let render_pass = unsafe { ctx.device.create_render_pass(&rp_info, None) }
            .map_err(|e| NglError::new(ErrorCode::Memory, format!("vkCreateRenderPass: {e}")))?;
        let views = [color_view];
        let fb_info = vk::FramebufferCreateInfo::default().render_pass(render_pass).attachments(&views).width(width).height(height).layers(1);
        let framebuffer = unsafe { ctx.device.create_framebuffer(&fb_info, None) }.map_err(|e| {
            unsafe { ctx.device.destroy_render_pass(render_pass, None) };
            NglError::new(ErrorCode::Memory, format!("vkCreateFramebuffer: {e}"))
        })?;
        Ok(VulkanRenderTarget { ctx, render_pass, framebuffer, resolve_from_msaa: false, owned: true })
    }

    pub fn layout_compatible(samples: u32, layout: &RenderTargetLayout) -> bool {
        layout.samples == samples
    }

    /// A second, non-owning handle to the same render pass/framebuffer —
    /// used for the default render target, which [`crate::backend::
    /// VulkanDevice`] keeps rebuilding on resize and must remain the sole
    /// owner of.
    pub fn share(&self) -> Self {
        VulkanRenderTarget {
            ctx: self.ctx.clone(),
            render_pass: self.render_pass,
            framebuffer: self.framebuffer,
            resolve_from_msaa: self.resolve_from_msaa,
            owned: false,
        }
    }
}

impl RenderTargetBackend for VulkanRenderTarget {}

impl Drop for VulkanRenderTarget {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                self.ctx.device.destroy_framebuffer(self.framebuffer, None);
                self.ctx.device.destroy_render_pass(self.render_pass, None);
            }
        }
    }
}
