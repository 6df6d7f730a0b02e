//! FBO translation of a [`ngl_gpu::rendertarget::RenderTarget`] (§4.2).
//!
//! The default render target (window-system framebuffer) is represented by
//! `draw_fbo: None`, which binds to GL name 0 — there is nothing to create
//! or destroy for it.

use crate::texture::GlTexture;
use glow::HasContext;
use ngl_gpu::rendertarget::{LoadOp, RenderTarget};
use ngl_gpu::traits::RenderTargetBackend;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

#[derive(Debug)]
pub struct GlRenderTarget {
    gl: Rc<glow::Context>,
    pub draw_fbo: Option<glow::Framebuffer>,
    /// Only present when at least one attachment declares a resolve target
    /// (§4.2 MSAA): a second, single-sample FBO that `end_render_pass`
    /// blits into.
    pub resolve_fbo: Option<glow::Framebuffer>,
    /// Only meaningful for the window-system framebuffer (`draw_fbo: None`),
    /// which has no per-attachment `ColorAttachment::load_op` to read.
    pub default_load_op: Option<LoadOp>,
}
impl RenderTargetBackend for GlRenderTarget {}

fn attach_color(gl: &glow::Context, index: u32, tex: &GlTexture, layer: u32) {
    let attachment = glow::COLOR_ATTACHMENT0 + index;
    unsafe {
        match tex.target {
            glow::TEXTURE_2D | glow::TEXTURE_2D_MULTISAMPLE => {
                gl.framebuffer_texture_2d(glow::FRAMEBUFFER, attachment, tex.target, Some(tex.handle), 0);
            }
            glow::TEXTURE_CUBE_MAP => {
                let face = glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer;
                gl.framebuffer_texture_2d(glow::FRAMEBUFFER, attachment, face, Some(tex.handle), 0);
            }
            _ => {
                gl.framebuffer_texture_layer(glow::FRAMEBUFFER, attachment, Some(tex.handle), 0, layer as i32);
            }
        }
    }
}

fn attach_depth_stencil(gl: &glow::Context, tex: &GlTexture) {
    let has_stencil = tex.descriptor().format.info().has_stencil;
    let attachment = if has_stencil { glow::DEPTH_STENCIL_ATTACHMENT } else { glow::DEPTH_ATTACHMENT };
    unsafe { gl.framebuffer_texture_2d(glow::FRAMEBUFFER, attachment, tex.target, Some(tex.handle), 0) };
}

impl GlRenderTarget {
    /// The window-system framebuffer (GL name 0); nothing to build or tear
    /// down, `gl` is only kept so `Drop` has a uniform shape.
    pub fn screen(gl: Rc<glow::Context>, load_op: LoadOp) -> Self {
        GlRenderTarget { gl, draw_fbo: None, resolve_fbo: None, default_load_op: Some(load_op) }
    }

    pub fn build(gl: Rc<glow::Context>, rt: &RenderTarget) -> Result<Self> {
        unsafe {
            let draw_fbo = gl
                .create_framebuffer()
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_framebuffer: {e}")))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(draw_fbo));
            let mut draw_buffers = Vec::with_capacity(rt.colors.len());
            for (i, color) in rt.colors.iter().enumerate() {
                let tex = color
                    .texture
                    .downcast_ref::<GlTexture>()
                    .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL texture bound to GL render target"))?;
                attach_color(&gl, i as u32, tex, color.layer);
                draw_buffers.push(glow::COLOR_ATTACHMENT0 + i as u32);
            }
            if draw_buffers.is_empty() {
                gl.draw_buffer(glow::NONE);
            } else {
                gl.draw_buffers(&draw_buffers);
            }
            if let Some(ds) = &rt.depth_stencil {
                let tex = ds
                    .texture
                    .downcast_ref::<GlTexture>()
                    .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL texture bound as depth attachment"))?;
                attach_depth_stencil(&gl, tex);
            }
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(draw_fbo);
                return Err(NglError::new(ErrorCode::External, format!("incomplete framebuffer: 0x{status:x}")));
            }

            let needs_resolve = rt.colors.iter().any(|c| c.resolve_target.is_some());
            let resolve_fbo = if needs_resolve {
                let fbo = gl
                    .create_framebuffer()
                    .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_framebuffer: {e}")))?;
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
                for (i, color) in rt.colors.iter().enumerate() {
                    if let Some((resolve_tex, layer)) = &color.resolve_target {
                        let tex = resolve_tex
                            .downcast_ref::<GlTexture>()
                            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL resolve texture"))?;
                        attach_color(&gl, i as u32, tex, *layer);
                    }
                }
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                Some(fbo)
            } else {
                None
            };

            Ok(GlRenderTarget { gl, draw_fbo: Some(draw_fbo), resolve_fbo, default_load_op: None })
        }
    }
}

impl Drop for GlRenderTarget {
    fn drop(&mut self) {
        unsafe {
            if let Some(fbo) = self.draw_fbo {
                self.gl.delete_framebuffer(fbo);
            }
            if let Some(fbo) = self.resolve_fbo {
                self.gl.delete_framebuffer(fbo);
            }
        }
    }
}
