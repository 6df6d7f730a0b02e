//! `GraphicConfig`: a container that pushes a partial graphics-state
//! override onto the prepare-time stack for its subtree's duration (§3.3,
//! §9 "GraphicConfig stack").

use crate::draw::DrawContext;
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::prepare::PrepareContext;
use ngl_gpu::pipeline::GraphicsStateOverride;
use ngl_util::Result;

#[derive(Debug)]
pub struct GraphicConfig {
    base: NodeBase,
    child: NodeRef,
    state: GraphicsStateOverride,
}

impl GraphicConfig {
    pub fn new(label: impl Into<String>, child: NodeRef, state: GraphicsStateOverride) -> NodeRef {
        let node = new_node_ref(GraphicConfig { base: NodeBase::new(label), child: child.clone(), state });
        child.borrow().base().add_parent(&node);
        node
    }
}

impl Node for GraphicConfig {
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
        RttBehavior::GraphicConfig {
            depth_test: self.state.depth.map(|d| d.test_enable).unwrap_or(false),
            stencil_test: self.state.stencil.map(|s| s.test_enable).unwrap_or(false),
        }
    }

    /// Pushes this node's override onto `ctx.graphics_state_stack` before
    /// the layout children prepare against recurses, so any `Render`-
    /// category descendant sees it when baking its `PipelineDescriptor`
    /// (§4.4.1); popped again once the subtree is done preparing.
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        ctx.graphics_state_stack.push(self.state);
        let result = self.child.borrow_mut().prepare(ctx);
        ctx.graphics_state_stack.pop();
        result
    }

    fn draw(&mut self, ctx: &mut DrawContext) -> Result<()> {
        let already = self.child.borrow().base().draw_time.get() == ctx.frame.0;
        if !already && self.child.borrow().base().is_active() {
            self.child.borrow().base().draw_time.set(ctx.frame.0);
            self.child.borrow_mut().draw(ctx)?;
        }
        Ok(())
    }
}
