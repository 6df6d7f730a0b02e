//! Node base type and lifecycle state (§3.5, §4.4.1).
//!
//! Every concrete node type embeds a [`NodeBase`] and implements [`Node`]'s
//! two accessor methods (`base`/`base_mut`) plus whichever lifecycle hooks
//! its category needs; the rest default to no-ops, the same "capability
//! trait with per-type overrides, common state in one struct" shape
//! `ngl-gpu`'s resource traits use (there it is `Downcast + Debug` over a
//! concrete backend struct; here it is `Downcast + Debug` over a concrete
//! node struct with a shared `NodeBase`).

use crate::draw::DrawContext;
use crate::prepare::PrepareContext;
use crate::rangegate::{RangeKind, RangeList};
use downcast_rs::{impl_downcast, Downcast};
use ngl_gpu::{Ref, WeakRef};
use ngl_util::Result;
use std::cell::{Cell, RefCell};
use std::fmt::Debug;

/// A node's coarse category; affects activation and traversal semantics
/// (§3.5) and which `rtt_behavior` it reports to the interruption survey
/// (§4.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Category {
    Container,
    Render,
    Variable,
    Texture,
    Media,
    RenderRange,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeState {
    Uninitialized,
    Initialized,
    Prepared,
    Active,
}

/// How a node participates in the render-pass interruption count a
/// `RenderToTexture` node computes over its child subtree at `prepare`
/// (§4.2).
#[derive(Copy, Clone, Debug)]
pub enum RttBehavior {
    /// Variable/Texture/Media/RenderRange markers: no effect on pass state.
    Inert,
    /// A `Render`-category node: moves a STOPPED pass back to STARTED.
    StartsPass,
    /// A nested `RenderToTexture` or compute dispatch: moves a STARTED pass
    /// to STOPPED.
    Interrupts,
    /// A plain container (Group, TransformGroups): recurse without changing
    /// pass state.
    Recurse,
    /// A `GraphicConfig` container: contribute its depth/stencil-test flags
    /// to the required feature set, then recurse.
    GraphicConfig { depth_test: bool, stencil_test: bool },
}

/// A handle to a node: a ref-counted, interior-mutable trait object. Every
/// owning edge (a container's child list) holds one of these; every
/// back-edge (a node's parent list) holds the non-owning [`NodeWeak`]
/// instead (§9 Design Notes: "DAG with back-edges").
pub type NodeRef = Ref<RefCell<dyn Node>>;
pub type NodeWeak = WeakRef<RefCell<dyn Node>>;

/// State shared by every node regardless of concrete class (§3.5, §4.4.1).
#[derive(Debug)]
pub struct NodeBase {
    pub label: String,
    pub state: NodeState,
    pub activation_refcount: u32,
    /// Last frame id this node's `update` body ran for; skips re-entry when
    /// the same node is reachable from more than one parent in one frame
    /// (§4.4.2, Testable Property #5).
    pub visit_time: Cell<u64>,
    /// Same idea as `visit_time`, but for the draw traversal: a node shared
    /// by two parents (e.g. a texture sampled by two shapes) still only
    /// draws once per frame.
    pub draw_time: Cell<u64>,
    pub parents: RefCell<Vec<NodeWeak>>,
    pub ranges: RangeList,
}

impl NodeBase {
    pub fn new(label: impl Into<String>) -> Self {
        NodeBase {
            label: label.into(),
            state: NodeState::Uninitialized,
            activation_refcount: 0,
            visit_time: Cell::new(u64::MAX),
            draw_time: Cell::new(u64::MAX),
            parents: RefCell::new(Vec::new()),
            ranges: RangeList::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation_refcount > 0
    }

    pub fn add_parent(&self, parent: &NodeRef) {
        self.parents.borrow_mut().push(Ref::downgrade(parent));
    }

    /// Appends a `RenderRange` marker (§3.5, §4.4.3). `RenderRange` nodes in
    /// the authored scene are one-shot configuration, not traversal
    /// children: attaching one to its owner's `ranges` list at scene-build
    /// time is all they ever do (see [`crate::nodes::renderrange`]).
    pub fn add_range(&mut self, kind: RangeKind, start_time: f64) {
        self.ranges.push(kind, start_time);
    }
}

/// A scene node (§3.5). `init`/`prepare`/`prefetch`/`update`/`draw`/
/// `release`/`uninit` all default to no-ops so a concrete type only
/// overrides what its category actually needs.
pub trait Node: Debug + Downcast {
    fn category(&self) -> Category;
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;

    /// One-shot, non-GPU resource allocation.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Collects the rendertarget layout a subtree will render into so a
    /// graphics pipeline can be created against it (§4.4.1).
    fn prepare(&mut self, _ctx: &mut PrepareContext) -> Result<()> {
        Ok(())
    }

    /// GPU resource allocation on the 0 -> 1 activation-refcount edge.
    fn prefetch(&mut self, _ctx: &mut ngl_gpu::context::GpuContext) -> Result<()> {
        Ok(())
    }

    /// Advances this node's own time-dependent state. Children are visited
    /// by the generic walk in [`crate::lifecycle`] before this runs.
    fn update(&mut self, _t: f64) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, _ctx: &mut DrawContext) -> Result<()> {
        Ok(())
    }

    /// GPU resource teardown on the 1 -> 0 activation-refcount edge.
    fn release(&mut self) {}

    /// Releases resources allocated by `init`; runs once, at scene teardown.
    fn uninit(&mut self) {}

    /// Children this node's category wants visited/activated this frame
    /// (§4.4.2: "a Group visits every child; a TexturedShape visits its
    /// texture and shader; a RenderToTexture visits its child and
    /// textures"). Also doubles as the traversal set for the RTT
    /// interruption survey (§4.2).
    fn children(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn rtt_behavior(&self) -> RttBehavior {
        RttBehavior::Inert
    }
}
impl_downcast!(Node);

pub fn new_node_ref<N: Node + 'static>(node: N) -> NodeRef {
    Ref::new(RefCell::new(node))
}
