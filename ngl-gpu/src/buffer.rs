//! Typed convenience wrapper over [`crate::traits::Buffer`] (§3.2).

use crate::traits::Buffer;
use crate::Ref;
use ngl_util::block::{Block, FieldData};
use ngl_util::memalign::AlignedBuffer;
use std::marker::PhantomData;

/// # Safety
/// Implementors must have no padding, no interior pointers, and be valid
/// for any bit pattern (a "plain old data" type) so that a `&[T]` may be
/// reinterpreted as bytes for upload.
pub unsafe trait Pod: Copy + 'static {}

unsafe impl Pod for f32 {}
unsafe impl Pod for u32 {}
unsafe impl Pod for i32 {}
unsafe impl Pod for u16 {}
unsafe impl Pod for [f32; 2] {}
unsafe impl Pod for [f32; 3] {}
unsafe impl Pod for [f32; 4] {}
unsafe impl Pod for [f32; 16] {}

/// A type-tagged view over an untyped GPU buffer, for call sites that know
/// the element type (e.g. a vertex buffer of `[Vertex]`). Carries no extra
/// runtime state; `T` only disciplines `upload` callers.
pub struct TypedBuffer<T> {
    pub untyped: Ref<dyn Buffer>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod> TypedBuffer<T> {
    pub fn new(untyped: Ref<dyn Buffer>) -> Self {
        TypedBuffer { untyped, _marker: PhantomData }
    }

    pub fn upload(&self, offset: u64, data: &[T]) -> crate::Result<()> {
        // SAFETY: `T: Pod` guarantees validity for any bit pattern and no
        // padding, so the byte length is exactly `size_of::<T>() * len`.
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data))
        };
        self.untyped.upload(offset * std::mem::size_of::<T>() as u64, bytes)
    }
}

/// A uniform/storage buffer backed by a std140/std430 [`Block`] layout
/// (§3.4): each CPU-side field value is placed at its computed offset and
/// stride by [`Block::copy_fields`] into a 16-byte-aligned staging buffer,
/// then uploaded in one call. This is the "Blocks are used to build uniform
/// and storage buffers with predictable offsets" contract (§3.4) wired to
/// an actual GPU buffer, rather than `Block` only ever proving out its own
/// offset math.
pub struct BlockBuffer {
    pub untyped: Ref<dyn Buffer>,
    block: Block,
    variadic_count: Option<usize>,
}

impl BlockBuffer {
    pub fn new(untyped: Ref<dyn Buffer>, block: Block) -> Self {
        BlockBuffer { untyped, block, variadic_count: None }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Sets the runtime element count of the block's variadic tail field (if
    /// any); must be called before `upload_fields` whenever that count
    /// changes, since it changes the staging buffer's total size.
    pub fn set_variadic_count(&mut self, count: usize) {
        self.variadic_count = Some(count);
    }

    /// Copies `sources[i]` into `self.block.fields()[i]`'s slot of a host
    /// staging buffer per [`Block::copy_fields`], then uploads the whole
    /// thing at `offset`.
    pub fn upload_fields(&self, offset: u64, sources: &[FieldData<'_>]) -> crate::Result<()> {
        let size = self.block.size(self.variadic_count);
        let mut staging = AlignedBuffer::new(size, 16);
        self.block.copy_fields(sources, staging.as_mut_slice());
        self.untyped.upload(offset, staging.as_slice())
    }
}
