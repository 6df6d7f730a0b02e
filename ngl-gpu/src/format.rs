//! Pixel formats and their descriptors.

/// A sized pixel format for a texture or render target attachment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    R16Float,
    Rgba16Float,
    R32Float,
    Rgba32Float,
    Depth16Unorm,
    Depth24UnormStencil8,
    Depth32Float,
}

#[derive(Copy, Clone, Debug)]
pub struct FormatInfo {
    pub bytes_per_pixel: u32,
    pub has_depth: bool,
    pub has_stencil: bool,
}

impl PixelFormat {
    pub fn info(self) -> FormatInfo {
        use PixelFormat::*;
        match self {
            R8Unorm => FormatInfo { bytes_per_pixel: 1, has_depth: false, has_stencil: false },
            Rg8Unorm => FormatInfo { bytes_per_pixel: 2, has_depth: false, has_stencil: false },
            Rgba8Unorm | Rgba8Srgb | Bgra8Unorm => {
                FormatInfo { bytes_per_pixel: 4, has_depth: false, has_stencil: false }
            }
            R16Float => FormatInfo { bytes_per_pixel: 2, has_depth: false, has_stencil: false },
            Rgba16Float => FormatInfo { bytes_per_pixel: 8, has_depth: false, has_stencil: false },
            R32Float => FormatInfo { bytes_per_pixel: 4, has_depth: false, has_stencil: false },
            Rgba32Float => FormatInfo { bytes_per_pixel: 16, has_depth: false, has_stencil: false },
            Depth16Unorm => FormatInfo { bytes_per_pixel: 2, has_depth: true, has_stencil: false },
            Depth24UnormStencil8 => {
                FormatInfo { bytes_per_pixel: 4, has_depth: true, has_stencil: true }
            }
            Depth32Float => FormatInfo { bytes_per_pixel: 4, has_depth: true, has_stencil: false },
        }
    }

    pub fn is_depth_stencil(self) -> bool {
        let info = self.info();
        info.has_depth || info.has_stencil
    }
}

/// The format for a capture / download row-major RGBA8 buffer (§6.1, §8
/// Testable Property #8).
pub const CAPTURE_FORMAT: PixelFormat = PixelFormat::Rgba8Unorm;
