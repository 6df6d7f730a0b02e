//! Render target layout and render target (§3.2, §4.2).

use crate::format::PixelFormat;
use crate::traits::Texture;
use crate::Ref;
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ColorAttachmentLayout {
    pub format: PixelFormat,
    pub resolve: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DepthStencilAttachmentLayout {
    pub format: PixelFormat,
    pub resolve: bool,
}

/// Descriptor-only value: sample count, ordered color formats, optional
/// depth-stencil format. Two layouts are *compatible* iff all fields are
/// elementwise equal (§3.2, Testable Property #3).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct RenderTargetLayout {
    pub samples: u32,
    pub colors: SmallVec<[ColorAttachmentLayout; 4]>,
    pub depth_stencil: Option<DepthStencilAttachmentLayout>,
}

impl RenderTargetLayout {
    pub fn is_compatible_with(&self, other: &RenderTargetLayout) -> bool {
        self == other
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u8,
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue { color: [0.0, 0.0, 0.0, 1.0], depth: 1.0, stencil: 0 }
    }
}

#[derive(Clone)]
pub struct ColorAttachment {
    pub texture: Ref<dyn Texture>,
    pub layer: u32,
    pub resolve_target: Option<(Ref<dyn Texture>, u32)>,
    pub load_op: LoadOp,
    pub clear_value: ClearValue,
    pub store_op: StoreOp,
}

#[derive(Clone)]
pub struct DepthStencilAttachment {
    pub texture: Ref<dyn Texture>,
    pub load_op: LoadOp,
    pub clear_value: ClearValue,
    pub store_op: StoreOp,
}

/// The live render target object: width, height, the layout it was built
/// against, and the concrete attachments (§3.2, §4.2).
///
/// A single conceptual RTT node builds up to two of these (`available_
/// rendertargets[0..1]`, §4.2): index 0 is "first use" (CLEAR), index 1 is
/// "resume" (LOAD), kept regardless of interruption count — only the store
/// ops on the attachments vary with `nb_interruptions` (see SPEC_FULL.md §4.2,
/// §4.4.4 decided Open Question).
#[derive(Clone)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub layout: RenderTargetLayout,
    pub colors: SmallVec<[ColorAttachment; 4]>,
    pub depth_stencil: Option<DepthStencilAttachment>,
}

impl RenderTarget {
    pub fn layout(&self) -> &RenderTargetLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(samples: u32, resolve: bool) -> RenderTargetLayout {
        RenderTargetLayout {
            samples,
            colors: SmallVec::from_vec(vec![ColorAttachmentLayout { format: PixelFormat::Rgba8Unorm, resolve }]),
            depth_stencil: Some(DepthStencilAttachmentLayout { format: PixelFormat::Depth24UnormStencil8, resolve: false }),
        }
    }

    #[test]
    fn identical_layouts_are_compatible() {
        assert!(layout(4, true).is_compatible_with(&layout(4, true)));
    }

    #[test]
    fn sample_count_mismatch_is_incompatible() {
        assert!(!layout(4, true).is_compatible_with(&layout(1, true)));
    }

    #[test]
    fn resolve_flag_mismatch_is_incompatible() {
        assert!(!layout(4, true).is_compatible_with(&layout(4, false)));
    }

    #[test]
    fn missing_depth_stencil_is_incompatible() {
        let mut no_depth = layout(1, false);
        no_depth.depth_stencil = None;
        assert!(!layout(1, false).is_compatible_with(&no_depth));
    }
}
