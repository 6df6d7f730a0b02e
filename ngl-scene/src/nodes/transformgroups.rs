//! `TransformGroups`: a container that composes a local 4x4 transform onto
//! [`DrawContext::model_matrix_stack`] for its children (§3.5). The matrix
//! math itself belongs to the math library named out of scope (§1); this
//! node only knows how to multiply two already-computed `[f32; 16]`s in
//! row-major order and push/pop the stack.

use crate::draw::DrawContext;
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::prepare::PrepareContext;
use ngl_util::Result;

fn mat4_mul(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += a[row * 4 + k] * b[k * 4 + col];
            }
            out[row * 4 + col] = sum;
        }
    }
    out
}

#[derive(Debug)]
pub struct TransformGroups {
    base: NodeBase,
    children: Vec<NodeRef>,
    matrix: [f32; 16],
}

impl TransformGroups {
    pub fn new(label: impl Into<String>, matrix: [f32; 16]) -> NodeRef {
        new_node_ref(TransformGroups { base: NodeBase::new(label), children: Vec::new(), matrix })
    }

    pub fn add_child(this: &NodeRef, child: NodeRef) {
        child.borrow().base().add_parent(this);
        this.borrow_mut()
            .downcast_mut::<TransformGroups>()
            .expect("add_child called on a non-TransformGroups node")
            .children
            .push(child);
    }

    pub fn set_matrix(&mut self, matrix: [f32; 16]) {
        self.matrix = matrix;
    }
}

impl Node for TransformGroups {
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

    /// The composed transform only matters at draw time; the rendertarget
    /// layout children prepare against passes through unchanged (§4.4.1).
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        for child in &self.children {
            child.borrow_mut().prepare(ctx)?;
        }
        Ok(())
    }

    fn draw(&mut self, ctx: &mut DrawContext) -> Result<()> {
        let composed = mat4_mul(&ctx.model_matrix(), &self.matrix);
        ctx.model_matrix_stack.push(composed);
        for child in &self.children {
            let already = child.borrow().base().draw_time.get() == ctx.frame.0;
            if !already && child.borrow().base().is_active() {
                child.borrow().base().draw_time.set(ctx.frame.0);
                child.borrow_mut().draw(ctx)?;
            }
        }
        ctx.model_matrix_stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_times_identity_is_identity() {
        let id = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(mat4_mul(&id, &id), id);
    }

    #[test]
    fn translation_composes() {
        let mut t = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        t[3] = 5.0; // row 0, col 3: translate x by 5
        let double = mat4_mul(&t, &t);
        assert_eq!(double[3], 10.0);
    }
}
