//! L2: the backend-neutral GPU-CTX layer (SPEC_FULL.md §2, §3.2, §4.1-4.3).
//!
//! This crate defines handles and value types that are the same regardless
//! of which backend crate (`ngl-gpu-gl`, `ngl-gpu-vk`) is linked in, plus
//! the [`context::GpuContext`] façade that enforces the cross-backend
//! contracts (pass-opening balance, layout compatibility, dynamic-offset
//! counts) so every backend gets them for free rather than re-checking them
//! itself.

pub mod bindgroup;
pub mod buffer;
pub mod config;
pub mod context;
pub mod format;
pub mod limits;
pub mod pipeline;
pub mod rendertarget;
pub mod resource;
pub mod traits;
pub mod vertex;

pub use ngl_util::rc::{Ref, WeakRef};
pub use ngl_util::error::{ErrorCode, NglError};
pub use ngl_util::Result;
