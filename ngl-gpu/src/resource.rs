//! Resource descriptors shared by every backend: buffers, textures, and the
//! enumerations their usage/sampling parameters are drawn from (§3.2).

use crate::format::PixelFormat;
use bitflags::bitflags;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX    = 1 << 0;
        const INDEX     = 1 << 1;
        const UNIFORM   = 1 << 2;
        const STORAGE   = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const MAP_READ  = 1 << 6;
        const MAP_WRITE = 1 << 7;
        const DYNAMIC   = 1 << 8;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED                 = 1 << 0;
        const STORAGE                 = 1 << 1;
        const COLOR_ATTACHMENT        = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC            = 1 << 4;
        const TRANSFER_DST            = 1 << 5;
        const TRANSIENT_ATTACHMENT    = 1 << 6;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureType {
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MipmapFilter {
    None,
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum WrapMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SamplerState {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mipmap_filter: MipmapFilter,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
}

impl Default for SamplerState {
    fn default() -> Self {
        SamplerState {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mipmap_filter: MipmapFilter::None,
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            wrap_r: WrapMode::ClampToEdge,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct BufferDescriptor {
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Copy, Clone, Debug)]
pub struct TextureDescriptor {
    pub ty: TextureType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
    pub samples: u32,
    pub usage: TextureUsage,
    pub sampler: SamplerState,
    /// Set when the texture was created from an externally-supplied handle
    /// (§4.5: `upload` and mipmap generation are forbidden on wrapped
    /// textures, and `destroy` must not release the underlying handle).
    pub wrapped: bool,
}

impl TextureDescriptor {
    pub fn mip_level_count(&self) -> u32 {
        if self.sampler.mipmap_filter == MipmapFilter::None {
            1
        } else {
            32 - (self.width.max(self.height).max(1)).leading_zeros()
        }
    }
}
