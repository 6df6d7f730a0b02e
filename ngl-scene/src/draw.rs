//! Draw-phase context (§4.1.1, §4.4.4): the GPU-CTX handle plus whatever
//! render target a `RenderToTexture` ancestor currently has installed, so a
//! nested node can resume an interrupted pass or start its own.

use ngl_gpu::context::GpuContext;
use ngl_gpu::rendertarget::RenderTarget;
use ngl_gpu::traits::RenderTargetBackend;
use ngl_gpu::Ref;
use ngl_util::time::FrameId;

/// One of the two rendertargets a `RenderToTexture` node builds for its
/// attachment set (§4.2): `clear` for first use this frame, `load` to
/// resume a pass an interruption closed early.
pub struct RenderTargetPair {
    pub clear: (RenderTarget, Ref<dyn RenderTargetBackend>),
    pub load: (RenderTarget, Ref<dyn RenderTargetBackend>),
}

impl RenderTargetPair {
    pub fn variant(&self, resuming: bool) -> &(RenderTarget, Ref<dyn RenderTargetBackend>) {
        if resuming {
            &self.load
        } else {
            &self.clear
        }
    }
}

/// Tracks whether the render pass belonging to the current rendertarget
/// pair has been opened yet this `draw()` entry, so the first render-
/// capable node to actually issue work opens it (CLEAR) and an RTT
/// interruption that later resumes it opens the LOAD variant instead.
pub struct DrawContext<'a> {
    pub gpu: &'a mut GpuContext,
    pub frame: FrameId,
    /// The time this frame is being drawn for; a `Texture` node backed by a
    /// `Media` child needs this to pull the right decoded frame (§4.4.5).
    pub t: f64,
    pub rendertargets: &'a RenderTargetPair,
    pub pass_open: bool,
    /// `true` once this rendertarget pair has been used at least once this
    /// `draw()` entry; distinguishes "open CLEAR" from "open LOAD" (§4.2).
    pub used_once: bool,
    /// Composed model-transform stack pushed by `TransformGroups` (§3.5)
    /// containers; a `TexturedShape` multiplies its local transform by the
    /// stack top.
    pub model_matrix_stack: Vec<[f32; 16]>,
}

impl<'a> DrawContext<'a> {
    pub fn new(gpu: &'a mut GpuContext, frame: FrameId, t: f64, rendertargets: &'a RenderTargetPair) -> Self {
        DrawContext {
            gpu,
            frame,
            t,
            rendertargets,
            pass_open: false,
            used_once: false,
            model_matrix_stack: vec![IDENTITY],
        }
    }

    pub fn model_matrix(&self) -> [f32; 16] {
        *self.model_matrix_stack.last().unwrap_or(&IDENTITY)
    }

    /// Ensures a pass is open on this context's rendertarget pair, opening
    /// the CLEAR variant the first time and the LOAD variant on any resume
    /// after an interruption closed it (§4.2, §4.4.4).
    pub fn ensure_pass_open(&mut self) -> ngl_util::Result<()> {
        if self.pass_open {
            return Ok(());
        }
        let (rt, backend_rt) = self.rendertargets.variant(self.used_once);
        self.gpu.begin_render_pass(rt, &**backend_rt)?;
        self.pass_open = true;
        self.used_once = true;
        Ok(())
    }

    /// Ends the currently open pass, if any; used both when an interruption
    /// needs the pass closed and when the owning `RenderToTexture` finishes.
    pub fn end_pass_if_open(&mut self) -> ngl_util::Result<()> {
        if !self.pass_open {
            return Ok(());
        }
        let (rt, backend_rt) = self.rendertargets.variant(true);
        self.gpu.end_render_pass(rt, &**backend_rt)?;
        self.pass_open = false;
        Ok(())
    }
}

const IDENTITY: [f32; 16] =
    [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
