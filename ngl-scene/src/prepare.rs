//! Prepare-phase context (§4.4.1): carries the rendertarget layout the
//! current subtree will render into, the ancestor `GraphicConfig` overrides
//! collected so far, and the GPU-CTX handle needed to build pipelines,
//! programs, and bind-group layouts against both.

use ngl_gpu::context::GpuContext;
use ngl_gpu::pipeline::GraphicsStateStack;
use ngl_gpu::rendertarget::RenderTargetLayout;

pub struct PrepareContext<'a> {
    pub gpu: &'a mut GpuContext,
    pub rendertarget_layout: RenderTargetLayout,
    /// Overrides pushed by every `GraphicConfig` ancestor of the node
    /// currently being prepared (§3.3). A render node merges this over its
    /// own authored `GraphicsState` before baking the result into its
    /// `PipelineDescriptor`, since the pipeline is immutable once built.
    pub graphics_state_stack: GraphicsStateStack,
}

impl<'a> PrepareContext<'a> {
    pub fn new(gpu: &'a mut GpuContext, rendertarget_layout: RenderTargetLayout) -> Self {
        PrepareContext { gpu, rendertarget_layout, graphics_state_stack: GraphicsStateStack::new() }
    }

    /// Used by `RenderToTexture::prepare` to build a child `PrepareContext`
    /// against the layout it computed for its own render target; the
    /// `GraphicConfig` stack carries forward unchanged, since an RTT
    /// boundary doesn't reset ancestor state overrides.
    pub fn with_layout(&mut self, rendertarget_layout: RenderTargetLayout) -> PrepareContext<'_> {
        PrepareContext { gpu: self.gpu, rendertarget_layout, graphics_state_stack: self.graphics_state_stack.clone() }
    }
}
