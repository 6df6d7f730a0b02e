//! Capability traits implemented by backend resource objects.
//!
//! Each resource is a trait object behind a [`crate::Ref`] (§9 Design
//! Notes: "owning smart-pointer-of-trait-object"); `downcast_rs` lets a
//! concrete backend recover its own type when it needs backend-specific
//! state the façade doesn't otherwise expose.

use crate::resource::{BufferDescriptor, TextureDescriptor};
use downcast_rs::{impl_downcast, Downcast};
use std::fmt::Debug;

pub trait Buffer: Downcast + Debug {
    fn descriptor(&self) -> &BufferDescriptor;

    /// Writes `data` at byte `offset`.
    fn upload(&self, offset: u64, data: &[u8]) -> crate::Result<()>;

    /// Returns a host pointer valid for `[offset, offset+len)` when MAP_*
    /// usage was requested at creation.
    ///
    /// # Safety
    /// The caller must not access the returned pointer after `unmap`, and
    /// must not alias it with another live mapping of the same range.
    unsafe fn map(&self, offset: u64, len: u64) -> crate::Result<*mut u8>;

    fn unmap(&self);
}
impl_downcast!(Buffer);

pub trait Texture: Downcast + Debug {
    fn descriptor(&self) -> &TextureDescriptor;

    /// Forbidden on a wrapped texture (§3.2, §4.5).
    fn upload(&self, level: u32, data: &[u8]) -> crate::Result<()>;

    fn download(&self, level: u32) -> crate::Result<Vec<u8>>;

    /// Forbidden on a wrapped texture.
    fn generate_mipmaps(&self) -> crate::Result<()>;
}
impl_downcast!(Texture);

pub trait Program: Downcast + Debug {
    /// Discovered uniform/attribute/buffer-block name -> {location, binding}.
    fn reflect(&self, name: &str) -> Option<u32>;
}
impl_downcast!(Program);

pub trait Pipeline: Downcast + Debug {}
impl_downcast!(Pipeline);

pub trait RenderTargetBackend: Downcast + Debug {}
impl_downcast!(RenderTargetBackend);
