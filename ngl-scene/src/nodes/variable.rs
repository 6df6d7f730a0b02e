//! `Variable`-category nodes (§4.4.2): time-dependent scalars that other
//! nodes read rather than traverse into themselves. Two shapes: a constant,
//! and a keyframed value sampled at `update(t)` and cached until the next
//! time it changes.

use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef};
use ngl_util::Result;
use std::cell::Cell;

/// A single keyframe of a [`AnimatedFloat`].
#[derive(Copy, Clone, Debug)]
pub struct Keyframe {
    pub time: f64,
    pub value: f32,
}

#[derive(Debug)]
pub struct ConstFloat {
    base: NodeBase,
    value: f32,
}

impl ConstFloat {
    pub fn new(label: impl Into<String>, value: f32) -> NodeRef {
        new_node_ref(ConstFloat { base: NodeBase::new(label), value })
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Node for ConstFloat {
    fn category(&self) -> Category {
        Category::Variable
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
}

/// Piecewise-linearly interpolated between consecutive [`Keyframe`]s;
/// clamps to the first/last value outside the keyframed range. Keyframes
/// must be supplied in strictly increasing `time` order.
#[derive(Debug)]
pub struct AnimatedFloat {
    base: NodeBase,
    keyframes: Vec<Keyframe>,
    current: Cell<f32>,
}

impl AnimatedFloat {
    pub fn new(label: impl Into<String>, keyframes: Vec<Keyframe>) -> NodeRef {
        debug_assert!(
            keyframes.windows(2).all(|w| w[0].time < w[1].time),
            "AnimatedFloat keyframes must have strictly increasing time"
        );
        let current = keyframes.first().map(|k| k.value).unwrap_or(0.0);
        new_node_ref(AnimatedFloat { base: NodeBase::new(label), keyframes, current: Cell::new(current) })
    }

    pub fn value(&self) -> f32 {
        self.current.get()
    }

    fn sample(&self, t: f64) -> f32 {
        if self.keyframes.is_empty() {
            return 0.0;
        }
        if t <= self.keyframes[0].time {
            return self.keyframes[0].value;
        }
        let last = self.keyframes.len() - 1;
        if t >= self.keyframes[last].time {
            return self.keyframes[last].value;
        }
        let idx = self.keyframes.partition_point(|k| k.time <= t);
        let a = &self.keyframes[idx - 1];
        let b = &self.keyframes[idx];
        let span = b.time - a.time;
        let frac = if span > 0.0 { (t - a.time) / span } else { 0.0 };
        a.value + (b.value - a.value) * frac as f32
    }
}

impl Node for AnimatedFloat {
    fn category(&self) -> Category {
        Category::Variable
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn update(&mut self, t: f64) -> Result<()> {
        self.current.set(self.sample(t));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_keyframes() {
        let mut anim = AnimatedFloat { base: NodeBase::new("a"), keyframes: vec![
            Keyframe { time: 0.0, value: 0.0 },
            Keyframe { time: 2.0, value: 10.0 },
        ], current: Cell::new(0.0) };
        anim.update(1.0).unwrap();
        assert_eq!(anim.value(), 5.0);
    }

    #[test]
    fn clamps_outside_range() {
        let mut anim = AnimatedFloat { base: NodeBase::new("a"), keyframes: vec![
            Keyframe { time: 1.0, value: 3.0 },
            Keyframe { time: 2.0, value: 7.0 },
        ], current: Cell::new(0.0) };
        anim.update(0.0).unwrap();
        assert_eq!(anim.value(), 3.0);
        anim.update(5.0).unwrap();
        assert_eq!(anim.value(), 7.0);
    }
}
