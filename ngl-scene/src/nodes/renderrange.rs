//! `RenderRange` markers (§3.5, §4.4.3).
//!
//! A `RenderRange` is authored as a one-shot child of the node it gates,
//! but it never participates in traversal: it is consumed once, at
//! scene-build time, into its owner's [`crate::rangegate::RangeList`]
//! (§4.4.3: "one-shot markers ... attached to a parent's `ranges` list").
//! There is accordingly no `Node` impl here — just the builder the scene
//! constructor calls in place of `children.push(...)`.

use crate::node::NodeRef;
use crate::rangegate::RangeKind;

#[derive(Copy, Clone, Debug)]
pub struct RangeMarkerSpec {
    pub kind: RangeKind,
    pub start_time: f64,
}

pub fn continuous(start_time: f64) -> RangeMarkerSpec {
    RangeMarkerSpec { kind: RangeKind::Continuous, start_time }
}

pub fn no_render(start_time: f64) -> RangeMarkerSpec {
    RangeMarkerSpec { kind: RangeKind::NoRender, start_time }
}

/// Attaches `spec` to `owner`'s range list (§4.4.3 ordering invariant:
/// strictly increasing `start_time`, checked by `RangeList::push`).
pub fn attach(owner: &NodeRef, spec: RangeMarkerSpec) {
    owner.borrow_mut().base_mut().add_range(spec.kind, spec.start_time);
}

/// Attaches every marker in `specs`, in order; the common case of
/// authoring a whole range list in one call.
pub fn attach_all(owner: &NodeRef, specs: &[RangeMarkerSpec]) {
    for spec in specs {
        attach(owner, *spec);
    }
}
