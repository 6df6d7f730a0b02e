//! L4: the scene-graph runtime (SPEC_FULL.md §2, §3.5, §4.4).
//!
//! A scene is a DAG of [`node::Node`] trait objects rooted at whatever the
//! façade crate (`ngl`) was handed via `set_scene`. This crate owns the
//! node base type and lifecycle state machine, the per-frame update/draw
//! walks, render-range gating, the `RenderToTexture` interruption survey,
//! and the concrete node classes grouped under [`nodes`].

pub mod draw;
pub mod hwmap;
pub mod interruption;
pub mod lifecycle;
pub mod node;
pub mod nodes;
pub mod prepare;
pub mod rangegate;

pub use lifecycle::SceneRuntime;
pub use node::{Category, Node, NodeBase, NodeRef, NodeState, NodeWeak};
