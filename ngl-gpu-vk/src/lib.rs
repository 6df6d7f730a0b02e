//! The Vulkan backend behind the GPU-CTX trait (SPEC_FULL.md §2 L3).
//!
//! Mirrors `ngl-gpu-gl`'s split: this crate owns descriptor/binding layout
//! translation and image-layout transitions instead of a GL FBO/state
//! shadow, but answers the exact same [`ngl_gpu::context::GpuDevice`]
//! contract. Constructing a device requires an already-initialized
//! `ash::Instance`/`ash::Device`/queue — standing up those from a platform
//! surface is the WSI's job and out of scope here (SPEC_FULL.md §1), the
//! same division `ngl-gpu-gl` draws around an already-current
//! `glow::Context`.

mod backend;
mod buffer;
mod pipeline;
mod query;
mod rendertarget;
mod shader;
mod texture;

pub use backend::{VulkanDevice, VulkanDeviceParams};
