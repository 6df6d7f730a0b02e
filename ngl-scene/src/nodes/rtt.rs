//! `RenderToTexture`: renders its child subtree into one or more owned
//! textures instead of the caller's current render target (§4.2, §4.4.4).

use crate::draw::{DrawContext, RenderTargetPair};
use crate::interruption::{self, InterruptionSurvey};
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::prepare::PrepareContext;
use ngl_gpu::context::GpuContext;
use ngl_gpu::format::PixelFormat;
use ngl_gpu::rendertarget::{
    ColorAttachment, ColorAttachmentLayout, DepthStencilAttachment, DepthStencilAttachmentLayout,
    LoadOp, RenderTarget, RenderTargetLayout, StoreOp,
};
use ngl_gpu::resource::{MipmapFilter, TextureDescriptor, TextureType, TextureUsage};
use ngl_gpu::traits::Texture;
use ngl_gpu::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use smallvec::SmallVec;

/// One color output this node renders into; `mipmap_filter != None` triggers
/// `generate_mipmaps` on the resolved texture at the end of `draw` (§4.4.4
/// step 6).
#[derive(Copy, Clone, Debug)]
pub struct ColorOutput {
    pub format: PixelFormat,
    pub mipmap_filter: MipmapFilter,
}

struct AllocatedOutputs {
    colors: SmallVec<[Ref<dyn Texture>; 4]>,
    msaa_colors: SmallVec<[Option<Ref<dyn Texture>>; 4]>,
    depth: Option<Ref<dyn Texture>>,
}

#[derive(Debug)]
pub struct RenderToTexture {
    base: NodeBase,
    child: NodeRef,
    color_outputs: SmallVec<[ColorOutput; 4]>,
    depth_format: Option<PixelFormat>,
    width: u32,
    height: u32,
    samples: u32,
    survey: InterruptionSurvey,
    rendertargets: Option<RenderTargetPair>,
    allocated: Option<AllocatedOutputs>,
}

impl RenderToTexture {
    pub fn new(
        label: impl Into<String>,
        child: NodeRef,
        color_outputs: Vec<ColorOutput>,
        depth_format: Option<PixelFormat>,
        width: u32,
        height: u32,
        samples: u32,
    ) -> NodeRef {
        let node = new_node_ref(RenderToTexture {
            base: NodeBase::new(label),
            child: child.clone(),
            color_outputs: color_outputs.into(),
            depth_format,
            width,
            height,
            samples,
            survey: InterruptionSurvey::default(),
            rendertargets: None,
            allocated: None,
        });
        child.borrow().base().add_parent(&node);
        node
    }

    /// The resolved, sampleable color texture at `index` (valid once active).
    pub fn output_texture(&self, index: usize) -> Option<Ref<dyn Texture>> {
        self.allocated.as_ref().and_then(|a| a.colors.get(index).cloned())
    }

    fn build_layout(&self) -> RenderTargetLayout {
        RenderTargetLayout {
            samples: self.samples,
            colors: self
                .color_outputs
                .iter()
                .map(|c| ColorAttachmentLayout { format: c.format, resolve: self.samples > 0 })
                .collect(),
            depth_stencil: self
                .depth_format
                .map(|format| DepthStencilAttachmentLayout { format, resolve: false }),
        }
    }

    fn alloc_outputs(&self, gpu: &GpuContext) -> Result<AllocatedOutputs> {
        let mut colors = SmallVec::new();
        let mut msaa_colors = SmallVec::new();
        let transient_ok = self.survey.single_pass();
        for output in &self.color_outputs {
            let resolve_usage = TextureUsage::SAMPLED
                | TextureUsage::COLOR_ATTACHMENT
                | TextureUsage::TRANSFER_SRC;
            let resolve = gpu.create_texture(TextureDescriptor {
                ty: TextureType::Texture2D,
                format: output.format,
                width: self.width,
                height: self.height,
                depth_or_layers: 1,
                samples: 0,
                usage: resolve_usage,
                sampler: ngl_gpu::resource::SamplerState { mipmap_filter: output.mipmap_filter, ..Default::default() },
                wrapped: false,
            })?;
            colors.push(resolve);
            if self.samples > 0 {
                let mut msaa_usage = TextureUsage::COLOR_ATTACHMENT;
                if transient_ok {
                    msaa_usage |= TextureUsage::TRANSIENT_ATTACHMENT;
                }
                let msaa = gpu.create_texture(TextureDescriptor {
                    ty: TextureType::Texture2D,
                    format: output.format,
                    width: self.width,
                    height: self.height,
                    depth_or_layers: 1,
                    samples: self.samples,
                    usage: msaa_usage,
                    sampler: ngl_gpu::resource::SamplerState::default(),
                    wrapped: false,
                })?;
                msaa_colors.push(Some(msaa));
            } else {
                msaa_colors.push(None);
            }
        }
        let depth = match self.depth_format {
            Some(format) => {
                let mut usage = TextureUsage::DEPTH_STENCIL_ATTACHMENT;
                if transient_ok {
                    usage |= TextureUsage::TRANSIENT_ATTACHMENT;
                }
                Some(gpu.create_texture(TextureDescriptor {
                    ty: TextureType::Texture2D,
                    format,
                    width: self.width,
                    height: self.height,
                    depth_or_layers: 1,
                    samples: self.samples,
                    usage,
                    sampler: ngl_gpu::resource::SamplerState::default(),
                    wrapped: false,
                })?)
            }
            None => None,
        };
        Ok(AllocatedOutputs { colors, msaa_colors, depth })
    }

    /// Builds the clear/load render-target variants (§4.2): color store op
    /// is always STORE since the resolved texture is the whole point; depth
    /// store op is DONT_CARE unless more than one interruption forces it to
    /// survive a second resume.
    fn build_rendertarget(&self, allocated: &AllocatedOutputs, load_op: LoadOp, depth_store: StoreOp) -> RenderTarget {
        let colors = self
            .color_outputs
            .iter()
            .zip(allocated.colors.iter())
            .zip(allocated.msaa_colors.iter())
            .map(|((_, resolve), msaa)| match msaa {
                Some(msaa_tex) => ColorAttachment {
                    texture: msaa_tex.clone(),
                    layer: 0,
                    resolve_target: Some((resolve.clone(), 0)),
                    load_op,
                    clear_value: Default::default(),
                    store_op: StoreOp::DontCare,
                },
                None => ColorAttachment {
                    texture: resolve.clone(),
                    layer: 0,
                    resolve_target: None,
                    load_op,
                    clear_value: Default::default(),
                    store_op: StoreOp::Store,
                },
            })
            .collect();
        let depth_stencil = allocated.depth.as_ref().map(|tex| DepthStencilAttachment {
            texture: tex.clone(),
            load_op,
            clear_value: Default::default(),
            store_op: depth_store,
        });
        RenderTarget { width: self.width, height: self.height, layout: self.build_layout(), colors, depth_stencil }
    }
}

impl Node for RenderToTexture {
    fn category(&self) -> Category {
        Category::Container
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn children(&self) -> Vec<NodeRef> {
        vec![self.child.clone()]
    }
    fn rtt_behavior(&self) -> RttBehavior {
        RttBehavior::Interrupts
    }

    /// Surveys the child subtree and hands the child pipeline-building pass
    /// the layout this node will render into (§4.4.4 step "prepare").
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        self.survey = interruption::survey(&[self.child.clone()]);
        let layout = self.build_layout();
        let mut child_ctx = ctx.with_layout(layout);
        self.child.borrow_mut().prepare(&mut child_ctx)
    }

    /// Allocates the owned output textures and both rendertarget variants
    /// (§4.2 "up to two compatible RTs ... indexed by first-use vs resume").
    fn prefetch(&mut self, gpu: &mut GpuContext) -> Result<()> {
        let allocated = self.alloc_outputs(gpu)?;
        let depth_store = if self.survey.depth_must_be_stored() { StoreOp::Store } else { StoreOp::DontCare };
        let clear_rt = self.build_rendertarget(&allocated, LoadOp::Clear, depth_store);
        let load_rt = self.build_rendertarget(&allocated, LoadOp::Load, depth_store);
        let clear_backend = gpu.create_rendertarget_backend(&clear_rt)?;
        let load_backend = gpu.create_rendertarget_backend(&load_rt)?;
        self.rendertargets =
            Some(RenderTargetPair { clear: (clear_rt, clear_backend), load: (load_rt, load_backend) });
        self.allocated = Some(allocated);
        Ok(())
    }

    fn release(&mut self) {
        self.rendertargets = None;
        self.allocated = None;
    }

    /// §4.4.4 draw steps: end any pass the caller has open, install this
    /// node's own rendertarget pair for the child's duration, then restore
    /// nothing explicitly — the caller re-opens its own pass lazily via
    /// `ensure_pass_open` the next time it needs one.
    fn draw(&mut self, ctx: &mut DrawContext) -> Result<()> {
        ctx.end_pass_if_open()?;
        let rendertargets = self
            .rendertargets
            .as_ref()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "RenderToTexture drawn before activation"))?;

        {
            let mut inner = DrawContext::new(&mut *ctx.gpu, ctx.frame, ctx.t, rendertargets);
            inner.model_matrix_stack = vec![ctx.model_matrix()];
            let already = self.child.borrow().base().draw_time.get() == ctx.frame.0;
            if !already && self.child.borrow().base().is_active() {
                self.child.borrow().base().draw_time.set(ctx.frame.0);
                self.child.borrow_mut().draw(&mut inner)?;
            }
            inner.end_pass_if_open()?;
        }

        if let Some(allocated) = &self.allocated {
            for (output, texture) in self.color_outputs.iter().zip(allocated.colors.iter()) {
                if output.mipmap_filter != MipmapFilter::None {
                    texture.generate_mipmaps()?;
                }
            }
        }
        Ok(())
    }
}
