//! Hardware-buffer import strategy table (§4.4.5, §9 Design Notes).
//!
//! Indexed by (backend, pixel-format tag), each strategy adapts a decoded
//! media frame into a sampleable texture plus the coordinate matrix that
//! recovers its logical orientation. CPU-format strategies stage through
//! `upload` and are backend-independent; opaque formats (EGL-image,
//! IOSurface, AHardwareBuffer) are 0-copy imports and only compiled in for
//! the platform that actually provides the import path (the import itself
//! is an external collaborator, out of scope — §1). The set is a closed
//! enumeration; there is no plugin mechanism.

use ngl_gpu::config::Backend;
use ngl_gpu::context::GpuContext;
use ngl_gpu::resource::TextureDescriptor;
use ngl_gpu::traits::Texture;
use ngl_gpu::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;

/// Pixel format tag a `Media` decoder reports alongside a decoded frame
/// (§4.4.5). CPU tags go through a staging upload; the `HwOpaque*` tags
/// name the zero-copy import path their platform provides.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrameFormatTag {
    Rgba,
    Bgra,
    Nv12,
    Yuv420P,
    HwOpaqueVideoToolbox,
    HwOpaqueMediaCodec,
    HwOpaqueVaapi,
}

impl FrameFormatTag {
    pub fn is_cpu(self) -> bool {
        !matches!(
            self,
            FrameFormatTag::HwOpaqueVideoToolbox
                | FrameFormatTag::HwOpaqueMediaCodec
                | FrameFormatTag::HwOpaqueVaapi
        )
    }
}

/// A decoded media frame as the (out-of-scope, §1) demux/decode
/// collaborator hands it to the core: tagged pixel format, dimensions, and
/// — for CPU formats — the packed plane data `upload` stages from.
pub struct DecodedFrame {
    pub format: FrameFormatTag,
    pub width: u32,
    pub height: u32,
    pub data: Option<Vec<u8>>,
    /// Opaque platform handle for a `HwOpaque*` tag (EGL image name,
    /// `IOSurfaceRef` cast to an integer, `AHardwareBuffer*`, ...).
    pub opaque_handle: Option<u64>,
}

/// Per-frame output of a strategy's `map_frame`: the sampleable texture and
/// the UV-correction matrix samplers must apply to recover the frame's
/// logical orientation despite any source Y-flip or crop rect (§4.4.5).
pub struct MappedFrame {
    pub texture: Ref<dyn Texture>,
    pub coordinate_matrix: [f32; 16],
}

const IDENTITY: [f32; 16] =
    [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];

/// Selects and applies the hwmap strategy for `frame` on `backend` (§4.4.5).
/// CPU formats always succeed (subject to the normal `create_texture`/
/// `upload` failure modes); an opaque format whose import path isn't
/// compiled in for this backend/platform is `NOT_FOUND`, not a panic.
pub fn map_frame(gpu: &GpuContext, backend: Backend, frame: &DecodedFrame, desc: TextureDescriptor) -> Result<MappedFrame> {
    if frame.format.is_cpu() {
        return map_cpu_frame(gpu, frame, desc);
    }
    map_opaque_frame(backend, frame, desc)
}

fn map_cpu_frame(gpu: &GpuContext, frame: &DecodedFrame, desc: TextureDescriptor) -> Result<MappedFrame> {
    let data = frame
        .data
        .as_ref()
        .ok_or_else(|| NglError::new(ErrorCode::InvalidData, "CPU-format frame carries no plane data"))?;
    let texture = gpu.create_texture(desc)?;
    texture.upload(0, data)?;
    Ok(MappedFrame { texture, coordinate_matrix: IDENTITY })
}

/// Opaque (zero-copy) import paths. Each of these is a real external
/// integration (EGL_KHR_image_base for GL/ES, `CVOpenGLESTextureCache`/
/// `IOSurface` for Apple platforms, `AHardwareBuffer` for NDK, Vulkan's
/// external-memory extensions); none of that is implemented here since the
/// import mechanism itself is named out of scope (§1) — this is the seam a
/// platform integration plugs into, wired by handle/format/backend only.
fn map_opaque_frame(backend: Backend, frame: &DecodedFrame, desc: TextureDescriptor) -> Result<MappedFrame> {
    let _ = desc;
    let supported = matches!(
        (backend, frame.format),
        (Backend::OpenGlEs, FrameFormatTag::HwOpaqueMediaCodec)
            | (Backend::Vulkan, FrameFormatTag::HwOpaqueVaapi)
    );
    if !supported {
        return Err(NglError::new(
            ErrorCode::NotFound,
            format!("no hwmap import strategy compiled in for {:?} x {:?}", backend, frame.format),
        ));
    }
    Err(NglError::new(
        ErrorCode::Unsupported,
        "opaque hwmap import requires a platform integration not linked into this build",
    ))
}
