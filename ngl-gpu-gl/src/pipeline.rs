//! Graphics/compute pipeline (§3.2): an immutable VAO + program + state
//! bundle, created once against a [`ngl_gpu::pipeline::PipelineDescriptor`].

use glow::HasContext;
use ngl_gpu::pipeline::{
    GraphicsState, PipelineDescriptor, PipelineType, PrimitiveTopology, VertexBufferLayout, VertexFormat,
    VertexStepMode,
};
use ngl_gpu::traits::{Pipeline, Program};
use ngl_gpu::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

pub fn topology_to_gl(t: PrimitiveTopology) -> u32 {
    match t {
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
    }
}

pub fn vertex_attrib_gl(f: VertexFormat) -> (i32, u32, bool) {
    match f {
        VertexFormat::Float32 => (1, glow::FLOAT, false),
        VertexFormat::Float32x2 => (2, glow::FLOAT, false),
        VertexFormat::Float32x3 => (3, glow::FLOAT, false),
        VertexFormat::Float32x4 => (4, glow::FLOAT, false),
        VertexFormat::Sint32 => (1, glow::INT, false),
        VertexFormat::Sint32x2 => (2, glow::INT, false),
        VertexFormat::Sint32x3 => (3, glow::INT, false),
        VertexFormat::Sint32x4 => (4, glow::INT, false),
    }
}

/// A graphics pipeline owns a VAO; a compute pipeline has no vertex state
/// and `vao` is unused (§3.2: "Pipeline ... if graphics: ... vertex state").
#[derive(Debug)]
pub struct GlPipeline {
    gl: Rc<glow::Context>,
    pub vao: Option<glow::VertexArray>,
    pub program: Ref<dyn Program>,
    pub topology: u32,
    pub is_compute: bool,
    /// Carried alongside the VAO so `bind_vertex_buffer` (called with just a
    /// slot index and buffer, no descriptor) can still look up the stride
    /// and attribute layout for that slot.
    pub vertex_buffers: Vec<VertexBufferLayout>,
    /// Baked in at creation time (§3.3: a pipeline's fixed-function state is
    /// immutable); `bind_pipeline` diffs this against the state cache.
    pub state: GraphicsState,
}

impl GlPipeline {
    pub fn new(gl: Rc<glow::Context>, desc: &PipelineDescriptor) -> Result<Self> {
        if desc.ty == PipelineType::Compute {
            return Ok(GlPipeline {
                gl,
                vao: None,
                program: desc.program.clone(),
                topology: 0,
                is_compute: true,
                vertex_buffers: Vec::new(),
                state: GraphicsState::default(),
            });
        }
        unsafe {
            let vao = gl
                .create_vertex_array()
                .map_err(|e| NglError::new(ErrorCode::Memory, format!("create_vertex_array: {e}")))?;
            gl.bind_vertex_array(Some(vao));
            for buffer in &desc.vertex_buffers {
                for attr in &buffer.attributes {
                    gl.enable_vertex_attrib_array(attr.location);
                    if matches!(buffer.step_mode, VertexStepMode::Instance) {
                        gl.vertex_attrib_divisor(attr.location, 1);
                    }
                }
            }
            gl.bind_vertex_array(None);
            Ok(GlPipeline {
                gl,
                vao: Some(vao),
                program: desc.program.clone(),
                topology: topology_to_gl(desc.topology),
                is_compute: false,
                vertex_buffers: desc.vertex_buffers.clone(),
                state: desc.state,
            })
        }
    }

    pub fn gl_program(&self) -> glow::Program {
        self.program
            .downcast_ref::<crate::shader::GlProgram>()
            .expect("non-GL program bound to GL pipeline")
            .handle
    }

    /// Configures slot `index`'s attribute pointers against whatever buffer
    /// is currently bound to `GL_ARRAY_BUFFER` (called from
    /// `set_vertex_buffer`, which binds the target buffer just before this).
    /// `base_offset` is the byte offset the caller bound the buffer's range
    /// at, folded into each attribute's own offset.
    pub fn configure_slot(&self, layout: &VertexBufferLayout, base_offset: u64) {
        unsafe {
            self.gl.bind_vertex_array(self.vao);
            for attr in &layout.attributes {
                let (size, ty, normalized) = vertex_attrib_gl(attr.format);
                self.gl.vertex_attrib_pointer_f32(
                    attr.location,
                    size,
                    ty,
                    normalized,
                    layout.stride as i32,
                    (attr.offset as u64 + base_offset) as i32,
                );
                if matches!(layout.step_mode, VertexStepMode::Instance) {
                    self.gl.vertex_attrib_divisor(attr.location, 1);
                }
            }
        }
    }
}

impl Pipeline for GlPipeline {}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        if let Some(vao) = self.vao {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }
}
