//! Shadow of the hot GL state (§4.3): a diff is issued to the driver only
//! when the requested value differs from what's already bound.

use glow::HasContext;
use ngl_gpu::pipeline::{
    BlendFactor, BlendOp, ColorWriteMask, CompareOp, CullMode, DepthState, GraphicsState,
    StencilFaceState, StencilState,
};

pub fn blend_factor_to_gl(f: BlendFactor) -> u32 {
    match f {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

pub fn blend_op_to_gl(op: BlendOp) -> u32 {
    match op {
        BlendOp::Add => glow::FUNC_ADD,
        BlendOp::Subtract => glow::FUNC_SUBTRACT,
        BlendOp::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendOp::Min => glow::MIN,
        BlendOp::Max => glow::MAX,
    }
}

pub fn compare_op_to_gl(op: CompareOp) -> u32 {
    match op {
        CompareOp::Never => glow::NEVER,
        CompareOp::Less => glow::LESS,
        CompareOp::Equal => glow::EQUAL,
        CompareOp::LessOrEqual => glow::LEQUAL,
        CompareOp::Greater => glow::GREATER,
        CompareOp::NotEqual => glow::NOTEQUAL,
        CompareOp::GreaterOrEqual => glow::GEQUAL,
        CompareOp::Always => glow::ALWAYS,
    }
}

pub fn stencil_op_to_gl(op: ngl_gpu::pipeline::StencilOp) -> u32 {
    use ngl_gpu::pipeline::StencilOp::*;
    match op {
        Keep => glow::KEEP,
        Zero => glow::ZERO,
        Replace => glow::REPLACE,
        IncrementClamp => glow::INCR,
        DecrementClamp => glow::DECR,
        Invert => glow::INVERT,
        IncrementWrap => glow::INCR_WRAP,
        DecrementWrap => glow::DECR_WRAP,
    }
}

pub fn cull_mode_to_gl(m: CullMode) -> Option<u32> {
    match m {
        CullMode::None => None,
        CullMode::Front => Some(glow::FRONT),
        CullMode::Back => Some(glow::BACK),
    }
}

/// Diffed against on every `set_pipeline`/draw; `None` means "never applied
/// yet, always issue the first time" rather than "known to be off".
#[derive(Debug, Default)]
pub struct StateCache {
    current: Option<GraphicsState>,
    program: Option<glow::Program>,
    viewport: Option<(i32, i32, u32, u32)>,
    scissor: Option<(i32, i32, u32, u32)>,
}

impl StateCache {
    pub fn new() -> Self {
        StateCache::default()
    }

    pub fn invalidate(&mut self) {
        *self = StateCache::default();
    }

    pub fn bind_program(&mut self, gl: &glow::Context, program: glow::Program) {
        if self.program != Some(program) {
            unsafe { gl.use_program(Some(program)) };
            self.program = Some(program);
        }
    }

    fn apply_stencil_face(gl: &glow::Context, face: u32, s: StencilFaceState) {
        unsafe {
            gl.stencil_func_separate(
                face,
                compare_op_to_gl(s.compare_op),
                s.reference as i32,
                s.read_mask,
            );
            gl.stencil_op_separate(
                face,
                stencil_op_to_gl(s.fail_op),
                stencil_op_to_gl(s.depth_fail_op),
                stencil_op_to_gl(s.pass_op),
            );
            gl.stencil_mask_separate(face, s.write_mask);
        }
    }

    /// Applies every field that differs from the last state bound through
    /// this cache (§4.3: "issues a GPU state change only on a diff").
    pub fn apply(&mut self, gl: &glow::Context, state: GraphicsState) {
        if self.current == Some(state) {
            return;
        }
        let prev = self.current;
        unsafe {
            if prev.map(|p| p.blend) != Some(state.blend) {
                if state.blend.enable {
                    gl.enable(glow::BLEND);
                    gl.blend_func_separate(
                        blend_factor_to_gl(state.blend.color.src_factor),
                        blend_factor_to_gl(state.blend.color.dst_factor),
                        blend_factor_to_gl(state.blend.alpha.src_factor),
                        blend_factor_to_gl(state.blend.alpha.dst_factor),
                    );
                    gl.blend_equation_separate(
                        blend_op_to_gl(state.blend.color.op),
                        blend_op_to_gl(state.blend.alpha.op),
                    );
                } else {
                    gl.disable(glow::BLEND);
                }
            }
            if prev.map(|p| p.color_write_mask) != Some(state.color_write_mask) {
                let m = state.color_write_mask;
                gl.color_mask(
                    m.contains(ColorWriteMask::RED),
                    m.contains(ColorWriteMask::GREEN),
                    m.contains(ColorWriteMask::BLUE),
                    m.contains(ColorWriteMask::ALPHA),
                );
            }
            if prev.map(|p| p.depth) != Some(state.depth) {
                let DepthState { test_enable, write_enable, compare_op } = state.depth;
                if test_enable {
                    gl.enable(glow::DEPTH_TEST);
                } else {
                    gl.disable(glow::DEPTH_TEST);
                }
                gl.depth_mask(write_enable);
                gl.depth_func(compare_op_to_gl(compare_op));
            }
            if prev.map(|p| p.stencil) != Some(state.stencil) {
                let StencilState { test_enable, front, back } = state.stencil;
                if test_enable {
                    gl.enable(glow::STENCIL_TEST);
                    Self::apply_stencil_face(gl, glow::FRONT, front);
                    Self::apply_stencil_face(gl, glow::BACK, back);
                } else {
                    gl.disable(glow::STENCIL_TEST);
                }
            }
            if prev.map(|p| p.cull_mode) != Some(state.cull_mode) {
                match cull_mode_to_gl(state.cull_mode) {
                    Some(mode) => {
                        gl.enable(glow::CULL_FACE);
                        gl.cull_face(mode);
                    }
                    None => gl.disable(glow::CULL_FACE),
                }
            }
        }
        self.current = Some(state);
    }

    /// Applied at pass-begin from the context's own viewport/scissor (§4.3),
    /// independent of the pipeline's `GraphicsState`.
    pub fn apply_viewport(&mut self, gl: &glow::Context, x: i32, y: i32, width: u32, height: u32) {
        if self.viewport != Some((x, y, width, height)) {
            unsafe { gl.viewport(x, y, width as i32, height as i32) };
            self.viewport = Some((x, y, width, height));
        }
    }

    pub fn apply_scissor(&mut self, gl: &glow::Context, rect: Option<(i32, i32, u32, u32)>) {
        match rect {
            Some((x, y, w, h)) => {
                if self.scissor != Some((x, y, w, h)) {
                    unsafe {
                        gl.enable(glow::SCISSOR_TEST);
                        gl.scissor(x, y, w as i32, h as i32);
                    }
                    self.scissor = Some((x, y, w, h));
                }
            }
            None => {
                if self.scissor.is_some() {
                    unsafe { gl.disable(glow::SCISSOR_TEST) };
                    self.scissor = None;
                }
            }
        }
    }
}
