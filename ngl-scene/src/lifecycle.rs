//! Per-frame activation and the update walk (§4.4.1, §4.4.2, Testable
//! Properties #5, #6).
//!
//! Activation is tracked with a mark-and-sweep over the *previous* frame's
//! active set rather than threaded explicitly through the recursion: a
//! node is "touched" at most once per frame by the first active parent
//! that reaches it (subsequent parents just bump its reference count), and
//! anything active last frame that nothing touched this frame is released.
//! This gives the symmetric "raised when a parent first references it,
//! lowered when the parent releases it" contract (§3.5) without needing a
//! child to know how many parents it has ahead of time.

use crate::node::{NodeRef, NodeState};
use crate::rangegate::RangeKind;
use ngl_gpu::context::GpuContext;
use ngl_gpu::Ref;
use ngl_util::hashmap::{new_hashmap, HashMap};
use ngl_util::time::{FrameClock, FrameId};
use ngl_util::Result;

struct PendingEntry {
    node: NodeRef,
    count: u32,
}

/// Owns the frame counter and the activation bookkeeping for one scene.
/// The façade crate creates one of these per `GpuContext` and feeds it the
/// scene root on every `prepare_draw`.
pub struct SceneRuntime {
    clock: FrameClock,
    /// Nodes with `activation_refcount > 0` as of the end of the last
    /// completed `update`.
    active: HashMap<usize, NodeRef>,
    /// Reset and refilled on every `update` call.
    pending: HashMap<usize, PendingEntry>,
    last_frame: Option<FrameId>,
}

impl SceneRuntime {
    pub fn new() -> Self {
        SceneRuntime {
            clock: FrameClock::new(),
            active: new_hashmap(),
            pending: new_hashmap(),
            last_frame: None,
        }
    }

    pub fn last_frame(&self) -> Option<FrameId> {
        self.last_frame
    }

    /// Runs one `root.update(t)` pass (§4.1.1 `begin_update`/`root.update`/
    /// `end_update`): touches `root`, recurses top-down gated by
    /// render-range markers, then reconciles the activation set so every
    /// newly-active node has been `prefetch`ed and every node that fell out
    /// of the active set this frame has been `release`d.
    pub fn update(&mut self, root: &NodeRef, t: f64, gpu: &mut GpuContext) -> Result<FrameId> {
        let frame = self.clock.tick();
        self.pending.clear();

        self.touch(root, gpu)?;
        self.update_recursive(root, t, frame, gpu)?;
        self.reconcile();

        self.last_frame = Some(frame);
        Ok(frame)
    }

    /// Marks `node` as referenced this frame; on the 0 -> 1 activation edge
    /// (first reference, this frame or carried over from last frame),
    /// fires `prefetch` (§4.4.1).
    fn touch(&mut self, node: &NodeRef, gpu: &mut GpuContext) -> Result<()> {
        let addr = Ref::addr(node);
        if let Some(entry) = self.pending.get_mut(&addr) {
            entry.count += 1;
            return Ok(());
        }
        let was_inactive = node.borrow().base().activation_refcount == 0;
        self.pending.insert(addr, PendingEntry { node: node.clone(), count: 1 });
        if was_inactive {
            node.borrow_mut().prefetch(gpu)?;
            node.borrow_mut().base_mut().state = NodeState::Active;
        }
        Ok(())
    }

    /// The §4.4.2 walk: visit-dedup by frame id, recurse into the children
    /// the node's class wants evaluated this frame, then run the node's own
    /// `update`. A child gated NORENDER by its own range list (§4.4.3) is
    /// never touched or recursed into at all: it is simply not activated.
    fn update_recursive(&mut self, node: &NodeRef, t: f64, frame: FrameId, gpu: &mut GpuContext) -> Result<()> {
        {
            let n = node.borrow();
            if n.base().visit_time.get() == frame.0 {
                return Ok(());
            }
            n.base().visit_time.set(frame.0);
        }

        let children = node.borrow().children();
        for child in &children {
            if child.borrow().base().ranges.gate_at(t) == RangeKind::NoRender {
                continue;
            }
            self.touch(child, gpu)?;
            self.update_recursive(child, t, frame, gpu)?;
        }

        node.borrow_mut().update(t)?;
        Ok(())
    }

    /// Applies the mark-and-sweep outcome: releases whatever fell out of
    /// the active set, prefetch already having run inline in `touch`, and
    /// records the final per-node activation count for introspection.
    fn reconcile(&mut self) {
        let stale: Vec<usize> = self
            .active
            .keys()
            .copied()
            .filter(|addr| !self.pending.contains_key(addr))
            .collect();
        for addr in stale {
            if let Some(node) = self.active.remove(&addr) {
                node.borrow_mut().release();
                let mut n = node.borrow_mut();
                let base = n.base_mut();
                base.activation_refcount = 0;
                base.state = NodeState::Prepared;
            }
        }
        for (addr, entry) in self.pending.drain() {
            entry.node.borrow_mut().base_mut().activation_refcount = entry.count;
            self.active.insert(addr, entry.node);
        }
    }

    /// Walks whatever remains in the active set at scene teardown, calling
    /// `release` then `uninit` on each (§4.5: "the public `reset` walks the
    /// scene releasing first, then destroys the GPU-CTX").
    pub fn release_all(&mut self) {
        for (_, node) in self.active.drain() {
            node.borrow_mut().release();
            node.borrow_mut().base_mut().state = NodeState::Prepared;
        }
    }
}

impl Default for SceneRuntime {
    fn default() -> Self {
        SceneRuntime::new()
    }
}
