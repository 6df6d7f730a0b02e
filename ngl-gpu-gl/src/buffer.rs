//! Backend buffer (§3.2): a GL buffer object plus the usage-derived bind
//! target it's created for.

use glow::HasContext;
use ngl_gpu::resource::{BufferDescriptor, BufferUsage};
use ngl_gpu::traits::Buffer;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

/// The target a buffer is (re)bound to for housekeeping calls; an actual
/// draw rebinds vertex/index/uniform buffers to whatever point the command
/// needs regardless of this default.
fn default_target(usage: BufferUsage) -> u32 {
    if usage.contains(BufferUsage::INDEX) {
        glow::ELEMENT_ARRAY_BUFFER
    } else if usage.contains(BufferUsage::UNIFORM) {
        glow::UNIFORM_BUFFER
    } else if usage.contains(BufferUsage::STORAGE) {
        glow::SHADER_STORAGE_BUFFER
    } else {
        glow::ARRAY_BUFFER
    }
}

#[derive(Debug)]
pub struct GlBuffer {
    gl: Rc<glow::Context>,
    pub handle: glow::Buffer,
    pub target: u32,
    descriptor: BufferDescriptor,
}

impl GlBuffer {
    pub fn new(gl: Rc<glow::Context>, descriptor: BufferDescriptor) -> Result<Self> {
        let target = default_target(descriptor.usage);
        let usage_hint = if descriptor.usage.contains(BufferUsage::DYNAMIC) {
            glow::DYNAMIC_DRAW
        } else {
            glow::STATIC_DRAW
        };
        unsafe {
            let handle = gl
                .create_buffer()
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_buffer: {e}")))?;
            gl.bind_buffer(target, Some(handle));
            gl.buffer_data_size(target, descriptor.size as i32, usage_hint);
            gl.bind_buffer(target, None);
            Ok(GlBuffer { gl, handle, target, descriptor })
        }
    }
}

impl Buffer for GlBuffer {
    fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    fn upload(&self, offset: u64, data: &[u8]) -> Result<()> {
        unsafe {
            self.gl.bind_buffer(self.target, Some(self.handle));
            self.gl.buffer_sub_data_u8_slice(self.target, offset as i32, data);
            self.gl.bind_buffer(self.target, None);
        }
        Ok(())
    }

    unsafe fn map(&self, offset: u64, len: u64) -> Result<*mut u8> {
        if !self
            .descriptor
            .usage
            .intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
        {
            return Err(NglError::new(ErrorCode::InvalidUsage, "buffer was not created with MAP_* usage"));
        }
        let access = match (
            self.descriptor.usage.contains(BufferUsage::MAP_READ),
            self.descriptor.usage.contains(BufferUsage::MAP_WRITE),
        ) {
            (true, true) => glow::MAP_READ_BIT | glow::MAP_WRITE_BIT,
            (true, false) => glow::MAP_READ_BIT,
            (false, true) => glow::MAP_WRITE_BIT,
            (false, false) => unreachable!(),
        };
        self.gl.bind_buffer(self.target, Some(self.handle));
        let ptr = self
            .gl
            .map_buffer_range(self.target, offset as i32, len as i32, access);
        Ok(ptr)
    }

    fn unmap(&self) {
        unsafe {
            self.gl.unmap_buffer(self.target);
            self.gl.bind_buffer(self.target, None);
        }
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        unsafe { self.gl.delete_buffer(self.handle) };
    }
}
