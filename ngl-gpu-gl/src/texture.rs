//! Backend texture (§3.2). Wrapped textures (created from an externally
//! supplied handle, e.g. an EGL-image-imported name) forbid `upload` and
//! mipmap generation, and their `Drop` must not delete the GL name (§4.5).

use glow::HasContext;
use ngl_gpu::format::PixelFormat;
use ngl_gpu::resource::{TextureDescriptor, TextureType};
use ngl_gpu::traits::Texture;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

pub fn texture_target(ty: TextureType, samples: u32) -> u32 {
    match ty {
        TextureType::Texture2D if samples > 1 => glow::TEXTURE_2D_MULTISAMPLE,
        TextureType::Texture2D => glow::TEXTURE_2D,
        TextureType::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        TextureType::Texture3D => glow::TEXTURE_3D,
        TextureType::TextureCube => glow::TEXTURE_CUBE_MAP,
    }
}

/// (internal_format, format, type) for a sized pixel format's GL upload path.
pub fn format_triple(format: PixelFormat) -> (i32, u32, u32) {
    use PixelFormat::*;
    match format {
        R8Unorm => (glow::R8 as i32, glow::RED, glow::UNSIGNED_BYTE),
        Rg8Unorm => (glow::RG8 as i32, glow::RG, glow::UNSIGNED_BYTE),
        Rgba8Unorm => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        Rgba8Srgb => (glow::SRGB8_ALPHA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        Bgra8Unorm => (glow::RGBA8 as i32, glow::BGRA, glow::UNSIGNED_BYTE),
        R16Float => (glow::R16F as i32, glow::RED, glow::HALF_FLOAT),
        Rgba16Float => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
        R32Float => (glow::R32F as i32, glow::RED, glow::FLOAT),
        Rgba32Float => (glow::RGBA32F as i32, glow::RGBA, glow::FLOAT),
        Depth16Unorm => (glow::DEPTH_COMPONENT16 as i32, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT),
        Depth24UnormStencil8 => {
            (glow::DEPTH24_STENCIL8 as i32, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8)
        }
        Depth32Float => (glow::DEPTH_COMPONENT32F as i32, glow::DEPTH_COMPONENT, glow::FLOAT),
    }
}

#[derive(Debug)]
pub struct GlTexture {
    gl: Rc<glow::Context>,
    pub handle: glow::Texture,
    pub target: u32,
    descriptor: TextureDescriptor,
}

impl GlTexture {
    fn storage(gl: &glow::Context, target: u32, desc: &TextureDescriptor) {
        let (internal, format, ty) = format_triple(desc.format);
        let levels = desc.mip_level_count() as i32;
        unsafe {
            match desc.ty {
                TextureType::Texture2D if desc.samples > 1 => {
                    gl.tex_storage_2d_multisample(
                        target,
                        desc.samples as i32,
                        internal as u32,
                        desc.width as i32,
                        desc.height as i32,
                        true,
                    );
                }
                TextureType::Texture2D => {
                    gl.tex_storage_2d(target, levels, internal as u32, desc.width as i32, desc.height as i32);
                }
                TextureType::Texture2DArray => {
                    gl.tex_storage_3d(
                        target,
                        levels,
                        internal as u32,
                        desc.width as i32,
                        desc.height as i32,
                        desc.depth_or_layers as i32,
                    );
                }
                TextureType::Texture3D => {
                    gl.tex_storage_3d(
                        target,
                        levels,
                        internal as u32,
                        desc.width as i32,
                        desc.height as i32,
                        desc.depth_or_layers as i32,
                    );
                }
                TextureType::TextureCube => {
                    gl.tex_storage_2d(target, levels, internal as u32, desc.width as i32, desc.height as i32);
                }
            }
            let _ = (format, ty);
        }
    }

    fn apply_sampler(gl: &glow::Context, target: u32, desc: &TextureDescriptor) {
        use ngl_gpu::resource::{Filter, MipmapFilter, WrapMode};
        let min = match (desc.sampler.min_filter, desc.sampler.mipmap_filter) {
            (Filter::Nearest, MipmapFilter::None) => glow::NEAREST,
            (Filter::Linear, MipmapFilter::None) => glow::LINEAR,
            (Filter::Nearest, MipmapFilter::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
            (Filter::Nearest, MipmapFilter::Linear) => glow::NEAREST_MIPMAP_LINEAR,
            (Filter::Linear, MipmapFilter::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
            (Filter::Linear, MipmapFilter::Linear) => glow::LINEAR_MIPMAP_LINEAR,
        };
        let mag = match desc.sampler.mag_filter {
            Filter::Nearest => glow::NEAREST,
            Filter::Linear => glow::LINEAR,
        };
        let wrap = |w: WrapMode| match w {
            WrapMode::Repeat => glow::REPEAT,
            WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            WrapMode::ClampToBorder => glow::CLAMP_TO_BORDER,
        };
        unsafe {
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap(desc.sampler.wrap_s) as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap(desc.sampler.wrap_t) as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap(desc.sampler.wrap_r) as i32);
        }
    }

    pub fn new(gl: Rc<glow::Context>, descriptor: TextureDescriptor) -> Result<Self> {
        let target = texture_target(descriptor.ty, descriptor.samples);
        unsafe {
            let handle = gl
                .create_texture()
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_texture: {e}")))?;
            gl.bind_texture(target, Some(handle));
            Self::storage(&gl, target, &descriptor);
            if descriptor.samples <= 1 {
                Self::apply_sampler(&gl, target, &descriptor);
            }
            gl.bind_texture(target, None);
        }
        Ok(GlTexture { gl, handle, target, descriptor })
    }

    /// Wraps an externally supplied GL texture name (§4.5); `drop` must not
    /// release `handle`, tracked via `descriptor.wrapped`.
    pub fn wrap(gl: Rc<glow::Context>, descriptor: TextureDescriptor, name: u32) -> Result<Self> {
        debug_assert!(descriptor.wrapped);
        let target = texture_target(descriptor.ty, descriptor.samples);
        let handle = unsafe { glow::NativeTexture(std::num::NonZeroU32::new(name).ok_or_else(|| {
            NglError::new(ErrorCode::InvalidArg, "wrap_texture called with a null handle")
        })?) };
        Ok(GlTexture { gl, handle, target, descriptor })
    }
}

impl Texture for GlTexture {
    fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    fn upload(&self, level: u32, data: &[u8]) -> Result<()> {
        if self.descriptor.wrapped {
            return Err(NglError::new(ErrorCode::InvalidUsage, "upload is forbidden on a wrapped texture"));
        }
        let (_, format, ty) = format_triple(self.descriptor.format);
        unsafe {
            self.gl.bind_texture(self.target, Some(self.handle));
            match self.descriptor.ty {
                TextureType::Texture2D | TextureType::TextureCube => {
                    self.gl.tex_sub_image_2d(
                        self.target,
                        level as i32,
                        0,
                        0,
                        self.descriptor.width as i32,
                        self.descriptor.height as i32,
                        format,
                        ty,
                        glow::PixelUnpackData::Slice(data),
                    );
                }
                TextureType::Texture2DArray | TextureType::Texture3D => {
                    self.gl.tex_sub_image_3d(
                        self.target,
                        level as i32,
                        0,
                        0,
                        0,
                        self.descriptor.width as i32,
                        self.descriptor.height as i32,
                        self.descriptor.depth_or_layers as i32,
                        format,
                        ty,
                        glow::PixelUnpackData::Slice(data),
                    );
                }
            }
            self.gl.bind_texture(self.target, None);
        }
        Ok(())
    }

    fn download(&self, level: u32) -> Result<Vec<u8>> {
        let (_, format, ty) = format_triple(self.descriptor.format);
        let bpp = self.descriptor.format.info().bytes_per_pixel;
        let w = (self.descriptor.width >> level).max(1);
        let h = (self.descriptor.height >> level).max(1);
        let mut out = vec![0u8; (w * h * bpp) as usize];
        unsafe {
            let fbo = self
                .gl
                .create_framebuffer()
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_framebuffer: {e}")))?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.handle),
                level as i32,
            );
            self.gl.read_pixels(
                0,
                0,
                w as i32,
                h as i32,
                format,
                ty,
                glow::PixelPackData::Slice(&mut out),
            );
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.delete_framebuffer(fbo);
        }
        Ok(out)
    }

    fn generate_mipmaps(&self) -> Result<()> {
        if self.descriptor.wrapped {
            return Err(NglError::new(ErrorCode::InvalidUsage, "mipmap generation is forbidden on a wrapped texture"));
        }
        unsafe {
            self.gl.bind_texture(self.target, Some(self.handle));
            self.gl.generate_mipmap(self.target);
            self.gl.bind_texture(self.target, None);
        }
        Ok(())
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if !self.descriptor.wrapped {
            unsafe { self.gl.delete_texture(self.handle) };
        }
    }
}
