//! Shader compilation and reflection (§3.2 "Program").

use glow::HasContext;
use ngl_gpu::traits::Program;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::hashmap::HashMap;
use ngl_util::Result;
use std::rc::Rc;

fn compile_stage(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl
            .create_shader(kind)
            .map_err(|e| NglError::new(ErrorCode::External, format!("create_shader: {e}")))?;
        gl.shader_source(shader, src);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(NglError::new(ErrorCode::InvalidData, format!("shader compile failed: {log}")));
        }
        Ok(shader)
    }
}

/// A compiled vertex+fragment pair or a single compute stage, with
/// uniform/attribute/block names reflected into a name -> location map.
#[derive(Debug)]
pub struct GlProgram {
    gl: Rc<glow::Context>,
    pub handle: glow::Program,
    reflection: HashMap<String, u32>,
}

impl GlProgram {
    fn link(gl: Rc<glow::Context>, stages: &[glow::Shader]) -> Result<glow::Program> {
        unsafe {
            let program = gl
                .create_program()
                .map_err(|e| NglError::new(ErrorCode::External, format!("create_program: {e}")))?;
            for &s in stages {
                gl.attach_shader(program, s);
            }
            gl.link_program(program);
            for &s in stages {
                gl.detach_shader(program, s);
                gl.delete_shader(s);
            }
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(NglError::new(ErrorCode::InvalidData, format!("program link failed: {log}")));
            }
            Ok(program)
        }
    }

    fn reflect(gl: &glow::Context, program: glow::Program) -> HashMap<String, u32> {
        let mut map = ngl_util::hashmap::new_hashmap();
        unsafe {
            let nb_uniforms = gl.get_active_uniforms(program);
            for i in 0..nb_uniforms {
                if let Some(u) = gl.get_active_uniform(program, i) {
                    if let Some(loc) = gl.get_uniform_location(program, &u.name) {
                        map.insert(u.name, loc.0.into());
                    }
                }
            }
            let nb_attribs = gl.get_active_attributes(program);
            for i in 0..nb_attribs {
                if let Some(a) = gl.get_active_attribute(program, i) {
                    if let Some(loc) = gl.get_attrib_location(program, &a.name) {
                        map.insert(a.name, loc);
                    }
                }
            }
        }
        map
    }

    pub fn new_graphics(gl: Rc<glow::Context>, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let vs = compile_stage(&gl, glow::VERTEX_SHADER, vertex_src)?;
        let fs = compile_stage(&gl, glow::FRAGMENT_SHADER, fragment_src)?;
        let handle = Self::link(gl.clone(), &[vs, fs])?;
        let reflection = Self::reflect(&gl, handle);
        Ok(GlProgram { gl, handle, reflection })
    }

    pub fn new_compute(gl: Rc<glow::Context>, compute_src: &str) -> Result<Self> {
        let cs = compile_stage(&gl, glow::COMPUTE_SHADER, compute_src)?;
        let handle = Self::link(gl.clone(), &[cs])?;
        let reflection = Self::reflect(&gl, handle);
        Ok(GlProgram { gl, handle, reflection })
    }

    /// Binds every named uniform block to the binding index discovered for
    /// it, so bind-group buffer bindings line up with what the backend
    /// binds via `glBindBufferBase`/`glBindBufferRange`.
    pub fn bind_uniform_blocks(&self) {
        let gl = &self.gl;
        unsafe {
            let nb_blocks = gl.get_active_uniform_blocks(self.handle);
            for i in 0..nb_blocks {
                let name = gl.get_active_uniform_block_name(self.handle, i);
                // Binding index convention: the block's declared index is
                // reused as its binding point, matching the shader's own
                // `layout(binding = N)` qualifier when the driver honors it.
                gl.uniform_block_binding(self.handle, i, i);
                let _ = name;
            }
        }
    }
}

impl Program for GlProgram {
    fn reflect(&self, name: &str) -> Option<u32> {
        self.reflection.get(name).copied()
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        unsafe { self.gl.delete_program(self.handle) };
    }
}
