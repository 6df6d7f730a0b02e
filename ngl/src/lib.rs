//! L5: the public façade crate (SPEC_FULL.md §2, §6).
//!
//! Wraps [`ngl_gpu::context::GpuContext`] and [`ngl_scene::SceneRuntime`]
//! behind the small, synchronous entry-point set named in §6.2 (`create`,
//! `configure`, `resize`, `set_capture_buffer`, `set_scene`, `prepare_draw`,
//! `draw`, `reset`, `query_draw_time`), and owns the one thing neither of
//! those crates is allowed to do on its own: pick which backend crate
//! (`ngl-gpu-gl` or `ngl-gpu-vk`) answers a given [`GpuConfig::backend`], and
//! install a default logger for host applications that haven't set one up.

pub mod facade;
pub mod serialize;

pub use facade::{BackendInit, Context, ResetMode};
pub use ngl_gpu::config::{Backend, GpuConfig, Platform, Viewport};
pub use ngl_scene::node::NodeRef;
pub use ngl_util::error::{ErrorCode, NglError};
pub use ngl_util::Result;
