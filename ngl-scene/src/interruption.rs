//! The `RenderToTexture` interruption survey (§4.2, §4.4.4).
//!
//! A `RenderToTexture` node's `prepare` walks its child subtree once to
//! count how many times a nested `RenderToTexture`/compute dispatch would
//! split its render pass in two, and to collect which `depth_test`/
//! `stencil_test` overrides are reachable. The counting automaton is a
//! direct port of the reference engine's pass-state machine: `NONE` until
//! the first `Render`-category node starts it, `STARTED` while render
//! nodes keep drawing into it, `STOPPED` when a nested RTT/compute
//! interrupts it, and back to `STARTED` (incrementing `nb_interruptions`)
//! when a later render node resumes it.

use crate::node::{NodeRef, RttBehavior};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum PassState {
    None,
    Started,
    Stopped,
}

/// Outcome of walking a `RenderToTexture`'s child subtree at `prepare`
/// time: how many times the pass had to be split, and whether any reached
/// `GraphicConfig` override requires a depth or stencil attachment.
#[derive(Copy, Clone, Debug, Default)]
pub struct InterruptionSurvey {
    pub nb_interruptions: u32,
    pub needs_depth_test: bool,
    pub needs_stencil_test: bool,
}

impl InterruptionSurvey {
    /// Zero interruptions means the whole subtree renders in one
    /// uninterrupted pass, so color-MSAA and an engine-owned depth
    /// attachment may be marked `TRANSIENT_ATTACHMENT` (§4.2).
    pub fn single_pass(&self) -> bool {
        self.nb_interruptions == 0
    }

    /// Depth's store op must be `STORE` once there is more than one
    /// interruption, so a second resume can reload it; at most one
    /// interruption keeps it `DONT_CARE` (§4.2, §4.4.4 decided Open
    /// Question: the two-rendertarget scheme itself is unconditional, only
    /// this store-op policy varies with the count).
    pub fn depth_must_be_stored(&self) -> bool {
        self.nb_interruptions > 1
    }
}

pub fn survey(root_children: &[NodeRef]) -> InterruptionSurvey {
    let mut state = PassState::None;
    let mut survey = InterruptionSurvey::default();
    for child in root_children {
        walk(child, &mut state, &mut survey);
    }
    survey
}

fn walk(node: &NodeRef, state: &mut PassState, survey: &mut InterruptionSurvey) {
    match node.borrow().rtt_behavior() {
        RttBehavior::Inert => {}
        RttBehavior::StartsPass => {
            if *state == PassState::Stopped {
                survey.nb_interruptions += 1;
            }
            *state = PassState::Started;
        }
        RttBehavior::Interrupts => {
            if *state == PassState::Started {
                *state = PassState::Stopped;
            }
        }
        RttBehavior::Recurse => {
            for child in node.borrow().children() {
                walk(&child, state, survey);
            }
        }
        RttBehavior::GraphicConfig { depth_test, stencil_test } => {
            survey.needs_depth_test |= depth_test;
            survey.needs_stencil_test |= stencil_test;
            for child in node.borrow().children() {
                walk(&child, state, survey);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{new_node_ref, Category, Node, NodeBase};

    #[derive(Debug)]
    struct Fake {
        base: NodeBase,
        category: Category,
        behavior: RttBehavior,
        kids: Vec<NodeRef>,
    }
    impl Node for Fake {
        fn category(&self) -> Category {
            self.category
        }
        fn base(&self) -> &NodeBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut NodeBase {
            &mut self.base
        }
        fn children(&self) -> Vec<NodeRef> {
            self.kids.clone()
        }
        fn rtt_behavior(&self) -> RttBehavior {
            self.behavior
        }
    }
    fn render() -> NodeRef {
        new_node_ref(Fake {
            base: NodeBase::new("r"),
            category: Category::Render,
            behavior: RttBehavior::StartsPass,
            kids: vec![],
        })
    }
    fn rtt() -> NodeRef {
        new_node_ref(Fake {
            base: NodeBase::new("rtt"),
            category: Category::Container,
            behavior: RttBehavior::Interrupts,
            kids: vec![],
        })
    }
    fn group(kids: Vec<NodeRef>) -> NodeRef {
        new_node_ref(Fake {
            base: NodeBase::new("g"),
            category: Category::Container,
            behavior: RttBehavior::Recurse,
            kids,
        })
    }

    #[test]
    fn no_nested_rtt_means_zero_interruptions() {
        let s = survey(&[render(), render()]);
        assert_eq!(s.nb_interruptions, 0);
        assert!(s.single_pass());
    }

    #[test]
    fn one_interruption_keeps_depth_dont_care() {
        let s = survey(&[render(), rtt(), render()]);
        assert_eq!(s.nb_interruptions, 1);
        assert!(!s.depth_must_be_stored());
    }

    #[test]
    fn two_interruptions_force_depth_store() {
        let s = survey(&[render(), rtt(), render(), rtt(), render()]);
        assert_eq!(s.nb_interruptions, 2);
        assert!(s.depth_must_be_stored());
    }

    #[test]
    fn nested_groups_are_walked_through() {
        let s = survey(&[group(vec![render(), rtt()]), render()]);
        assert_eq!(s.nb_interruptions, 1);
    }
}
