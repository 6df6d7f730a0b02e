//! `Group`: the plain container (§3.5). Visits every child on update and
//! draws every child in list order; no state of its own beyond the child
//! list.

use crate::draw::DrawContext;
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::prepare::PrepareContext;
use ngl_util::Result;

#[derive(Debug)]
pub struct Group {
    base: NodeBase,
    children: Vec<NodeRef>,
}

impl Group {
    pub fn new(label: impl Into<String>) -> NodeRef {
        new_node_ref(Group { base: NodeBase::new(label), children: Vec::new() })
    }

    pub fn add_child(this: &NodeRef, child: NodeRef) {
        child.borrow().base().add_parent(this);
        this.borrow_mut()
            .downcast_mut::<Group>()
            .expect("add_child called on a non-Group node")
            .children
            .push(child);
    }
}

impl Node for Group {
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
        self.children.clone()
    }
    fn rtt_behavior(&self) -> RttBehavior {
        RttBehavior::Recurse
    }

    /// A plain container doesn't change the rendertarget layout its children
    /// prepare against, so it just passes `ctx` straight through to each
    /// child (§4.4.1).
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        for child in &self.children {
            child.borrow_mut().prepare(ctx)?;
        }
        Ok(())
    }

    /// Draws every active child in list order (§4.4.4 nested containers
    /// just pass the `DrawContext` straight through); a child gated
    /// NORENDER this frame was never activated by the lifecycle walk and is
    /// skipped the same way here via the draw-time visit token.
    fn draw(&mut self, ctx: &mut DrawContext) -> Result<()> {
        for child in &self.children {
            let already = child.borrow().base().draw_time.get() == ctx.frame.0;
            if already || !child.borrow().base().is_active() {
                continue;
            }
            child.borrow().base().draw_time.set(ctx.frame.0);
            child.borrow_mut().draw(ctx)?;
        }
        Ok(())
    }
}
