//! `Media`: owns an external decoder and yields time-indexed frames (§4.4.5).
//!
//! The decoder itself (demux, codec, presentation-timestamp bookkeeping) is
//! an external collaborator named out of scope (§1); this node only knows
//! the narrow contract a `Texture` needs: "give me whatever frame is current
//! at time `t`, or `None` if nothing new has arrived since the last call."
//! A `Media` is single-parent — `prepare` enforces it, because the one-shot
//! upload/import semantics some hwmap strategies use do not survive being
//! shared by two textures (Scenario B).

use crate::hwmap::DecodedFrame;
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef};
use crate::prepare::PrepareContext;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::cell::RefCell;
use std::fmt::Debug;

/// Supplied by the host application; out of scope here beyond this contract
/// (§1: "media demux/decode ... named where their contract matters").
pub trait MediaDecoder: Debug {
    fn decode_at(&mut self, t: f64) -> Result<Option<DecodedFrame>>;
}

#[derive(Debug)]
pub struct Media {
    base: NodeBase,
    decoder: RefCell<Box<dyn MediaDecoder>>,
}

impl Media {
    pub fn new(label: impl Into<String>, decoder: Box<dyn MediaDecoder>) -> NodeRef {
        new_node_ref(Media { base: NodeBase::new(label), decoder: RefCell::new(decoder) })
    }

    /// Pulls the frame current at `t`, if the decoder has produced a new one
    /// since the last call.
    pub fn frame_at(&self, t: f64) -> Result<Option<DecodedFrame>> {
        self.decoder.borrow_mut().decode_at(t)
    }
}

impl Node for Media {
    fn category(&self) -> Category {
        Category::Media
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    /// Enforces the single-parent rule (§4.4.5 Scenario B): any live parent
    /// beyond the first referencing node is `INVALID_USAGE`.
    fn prepare(&mut self, _ctx: &mut PrepareContext) -> Result<()> {
        let live_parents = self.base.parents.borrow().iter().filter(|p| p.upgrade().is_some()).count();
        if live_parents > 1 {
            return Err(NglError::new(
                ErrorCode::InvalidUsage,
                format!("Media node '{}' is referenced by more than one parent", self.base.label),
            ));
        }
        Ok(())
    }
}
