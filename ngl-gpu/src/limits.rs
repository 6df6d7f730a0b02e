//! Feature bitmask and device limits reported by a backend at `init` (§4.1).

use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct Features: u32 {
        const TIMER_QUERY            = 1 << 0;
        const DEPTH_STENCIL_RESOLVE  = 1 << 1;
        const INVALIDATE_SUBDATA     = 1 << 2;
        const NPOT_MIPMAP            = 1 << 3;
        const COMPUTE                = 1 << 4;
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Limits {
    pub max_color_attachments: u32,
    pub max_texture_size: u32,
    pub max_samples: u32,
    pub max_dynamic_uniform_buffers: u32,
    pub max_dynamic_storage_buffers: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_color_attachments: 4,
            max_texture_size: 4096,
            max_samples: 4,
            max_dynamic_uniform_buffers: 8,
            max_dynamic_storage_buffers: 4,
        }
    }
}

impl Limits {
    /// Best-effort MSAA clamp (§7): "clamp to supported max and warn".
    pub fn clamp_samples(&self, requested: u32) -> u32 {
        if requested > self.max_samples {
            log::warn!(
                "requested {requested} samples exceeds backend max of {}; clamping",
                self.max_samples
            );
            self.max_samples
        } else {
            requested
        }
    }
}
