//! Graphics pipeline: topology, the fixed-function [`GraphicsState`]
//! contract (§3.3), vertex state, and the pipeline descriptor itself (§3.2).

use crate::bindgroup::BindGroupLayout;
use crate::format::PixelFormat;
use crate::rendertarget::RenderTargetLayout;
use crate::traits::Program;
use crate::Ref;
use bitflags::bitflags;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub op: BlendOp,
}

impl Default for BlendComponent {
    fn default() -> Self {
        BlendComponent { src_factor: BlendFactor::One, dst_factor: BlendFactor::Zero, op: BlendOp::Add }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlendState {
    pub enable: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl Default for BlendState {
    fn default() -> Self {
        BlendState { enable: false, color: BlendComponent::default(), alpha: BlendComponent::default() }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct ColorWriteMask: u8 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits | Self::GREEN.bits | Self::BLUE.bits | Self::ALPHA.bits;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        DepthState { test_enable: false, write_enable: false, compare_op: CompareOp::Less }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StencilFaceState {
    pub write_mask: u32,
    pub compare_op: CompareOp,
    pub reference: u32,
    pub read_mask: u32,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        StencilFaceState {
            write_mask: 0xff,
            compare_op: CompareOp::Always,
            reference: 0,
            read_mask: 0xff,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StencilState {
    pub test_enable: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for StencilState {
    fn default() -> Self {
        StencilState { test_enable: false, front: StencilFaceState::default(), back: StencilFaceState::default() }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Full contract of a graphics pipeline's fixed-function bits (§3.3). This
/// is a plain value type compared by structural equality, the same as the
/// render-target layout it is always created alongside.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct GraphicsState {
    pub blend: BlendState,
    pub color_write_mask: ColorWriteMask,
    pub depth: DepthState,
    pub stencil: StencilState,
    pub cull_mode: CullMode,
}

impl Default for CullMode {
    fn default() -> Self {
        CullMode::None
    }
}

/// A partial override of [`GraphicsState`], pushed by a `GraphicConfig`
/// container node (§9 Design Notes: "GraphicConfig stack").
#[derive(Copy, Clone, Debug, Default)]
pub struct GraphicsStateOverride {
    pub blend: Option<BlendState>,
    pub color_write_mask: Option<ColorWriteMask>,
    pub depth: Option<DepthState>,
    pub stencil: Option<StencilState>,
    pub cull_mode: Option<CullMode>,
}

impl GraphicsStateOverride {
    pub fn apply(&self, base: GraphicsState) -> GraphicsState {
        GraphicsState {
            blend: self.blend.unwrap_or(base.blend),
            color_write_mask: self.color_write_mask.unwrap_or(base.color_write_mask),
            depth: self.depth.unwrap_or(base.depth),
            stencil: self.stencil.unwrap_or(base.stencil),
            cull_mode: self.cull_mode.unwrap_or(base.cull_mode),
        }
    }
}

/// A context-local stack of [`GraphicsStateOverride`]s, pushed by a
/// `GraphicConfig` container while its subtree is being walked and popped on
/// exit (§9 "GraphicConfig stack"). Consulted at `prepare` time, since a
/// graphics pipeline is an immutable object built once against a specific
/// state (§4.4.1 PREPARED) rather than something that can be re-bound per
/// draw.
#[derive(Clone, Debug, Default)]
pub struct GraphicsStateStack {
    stack: Vec<GraphicsStateOverride>,
}

impl GraphicsStateStack {
    pub fn new() -> Self {
        GraphicsStateStack::default()
    }

    pub fn push(&mut self, state: GraphicsStateOverride) {
        self.stack.push(state);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// The stack merged bottom-to-top over `GraphicsState::default()`.
    pub fn effective(&self) -> GraphicsState {
        self.effective_over(GraphicsState::default())
    }

    /// The stack merged bottom-to-top over `base` instead of the type's
    /// default — `base` is a render node's own authored `GraphicsState`,
    /// which any ancestor `GraphicConfig` override then takes precedence
    /// over (§3.3: "the effective graphics state is the top of the stack
    /// merged over a `Default` baseline", generalized here so each node's own
    /// state is the baseline the stack merges over).
    pub fn effective_over(&self, base: GraphicsState) -> GraphicsState {
        self.stack.iter().fold(base, |acc, over| over.apply(acc))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexStepMode {
    Vertex,
    Instance,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VertexBufferLayout {
    pub stride: u32,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
}

/// An immutable pipeline object, built against a specific
/// [`RenderTargetLayout`] (§3.2, §4.1 "pipeline": P's RT layout must equal
/// R's RT layout elementwise at draw time, Testable Property #3).
///
/// A `COMPUTE` pipeline reuses this same descriptor shape with `ty =
/// PipelineType::Compute`; `topology`, `rendertarget_layout` and
/// `vertex_buffers` are then ignored by every backend (no draw state
/// applies to a dispatch).
pub struct PipelineDescriptor {
    pub ty: PipelineType,
    pub program: Ref<dyn Program>,
    pub topology: PrimitiveTopology,
    pub state: GraphicsState,
    pub rendertarget_layout: RenderTargetLayout,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub bindgroup_layout: Ref<BindGroupLayout>,
    pub color_formats: Vec<PixelFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_stack_merges_bottom_to_top() {
        let mut stack = GraphicsStateStack::new();
        stack.push(GraphicsStateOverride { cull_mode: Some(CullMode::Back), ..Default::default() });
        stack.push(GraphicsStateOverride {
            depth: Some(DepthState { test_enable: true, write_enable: true, compare_op: CompareOp::Less }),
            ..Default::default()
        });
        let effective = stack.effective();
        assert_eq!(effective.cull_mode, CullMode::Back);
        assert!(effective.depth.test_enable);
        stack.pop();
        assert!(!stack.effective().depth.test_enable);
        assert_eq!(stack.effective().cull_mode, CullMode::Back);
    }

    #[test]
    fn effective_over_lets_an_ancestor_override_win_over_the_nodes_own_state() {
        let mut stack = GraphicsStateStack::new();
        stack.push(GraphicsStateOverride { cull_mode: Some(CullMode::Back), ..Default::default() });
        let node_state = GraphicsState { cull_mode: CullMode::Front, ..Default::default() };
        assert_eq!(stack.effective_over(node_state).cull_mode, CullMode::Back);

        stack.pop();
        assert_eq!(stack.effective_over(node_state).cull_mode, CullMode::Front);
    }
}
