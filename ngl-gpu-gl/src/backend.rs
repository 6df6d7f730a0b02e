//! The concrete `GpuDevice` for OpenGL/OpenGL ES (§4.1, §4.3). Assumes the
//! caller has already made a GL context current and handed it to `new` as a
//! [`glow::Context`] — obtaining that context from the platform's window
//! system (EGL/GLX/WGL/...) is the façade's job, not this crate's (the WSI
//! is named but out of scope, SPEC_FULL.md §1).

use crate::buffer::GlBuffer;
use crate::pipeline::GlPipeline;
use crate::query::TimerQuery;
use crate::rendertarget::GlRenderTarget;
use crate::shader::GlProgram;
use crate::state::StateCache;
use crate::texture::GlTexture;
use glow::HasContext;
use ngl_gpu::bindgroup::BindGroup;
use ngl_gpu::config::{Backend, GpuConfig, Viewport};
use ngl_gpu::context::GpuDevice;
use ngl_gpu::limits::{Features, Limits};
use ngl_gpu::pipeline::{CullMode, PipelineDescriptor, VertexBufferLayout, VertexStepMode};
use ngl_gpu::rendertarget::{LoadOp, RenderTarget, StoreOp};
use ngl_gpu::resource::{BufferDescriptor, TextureDescriptor};
use ngl_gpu::traits::{Buffer, Pipeline, Program, RenderTargetBackend, Texture};
use ngl_gpu::vertex::IndexFormat;
use ngl_gpu::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::cell::RefCell;
use std::rc::Rc;

fn index_format_to_gl(f: IndexFormat) -> u32 {
    match f {
        IndexFormat::R16Uint => glow::UNSIGNED_SHORT,
        IndexFormat::R32Uint => glow::UNSIGNED_INT,
    }
}


#[derive(Default)]
struct BoundPipelineState {
    vao: Option<glow::VertexArray>,
    program: Option<glow::Program>,
    topology: u32,
    is_compute: bool,
    vertex_buffers: Vec<VertexBufferLayout>,
}

#[derive(Debug)]
pub struct OpenGlDevice {
    gl: Rc<glow::Context>,
    config: GpuConfig,
    width: u32,
    height: u32,
    state: StateCache,
    /// Needs interior mutability: `query_draw_time_ns` takes `&self` (§4.1),
    /// but reading a query result is itself a stateful GL call.
    timer: RefCell<Option<TimerQuery>>,
    features: Features,
    limits: Limits,
    version: u32,
    language_version: u32,
    bound: BoundPipelineState,
    bound_index_offset_bytes: u64,
    bound_index_format: IndexFormat,
}

impl std::fmt::Debug for BoundPipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundPipelineState").field("is_compute", &self.is_compute).finish()
    }
}

impl OpenGlDevice {
    pub fn new(gl: Rc<glow::Context>, config: GpuConfig) -> Result<Self> {
        let (width, height) = (config.width, config.height);
        let mut features = Features::empty();
        let version_string = unsafe { gl.get_parameter_string(glow::VERSION) };
        let version = parse_gl_version(&version_string);
        let language_version = version;
        if unsafe { gl.supported_extensions() }.contains("GL_EXT_disjoint_timer_query") || version >= 3300 {
            features |= Features::TIMER_QUERY;
        }
        features |= Features::INVALIDATE_SUBDATA | Features::NPOT_MIPMAP | Features::COMPUTE;
        let timer = TimerQuery::new(&gl);
        Ok(OpenGlDevice {
            gl,
            config,
            width,
            height,
            state: StateCache::new(),
            timer: RefCell::new(timer),
            features,
            limits: Limits::default(),
            version,
            language_version,
            bound: BoundPipelineState::default(),
            bound_index_offset_bytes: 0,
            bound_index_format: IndexFormat::R32Uint,
        })
    }

    fn downcast_texture<'a>(t: &'a dyn Texture) -> Result<&'a GlTexture> {
        t.downcast_ref::<GlTexture>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL texture bound to GL device"))
    }

    fn downcast_buffer<'a>(b: &'a dyn Buffer) -> Result<&'a GlBuffer> {
        b.downcast_ref::<GlBuffer>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL buffer bound to GL device"))
    }

    fn flip_y(&self) -> bool {
        self.config.offscreen
    }
}

fn parse_gl_version(s: &str) -> u32 {
    // "4.6.0 NVIDIA ..." or "OpenGL ES 3.2 ..."; tolerate either prefix.
    let digits = s
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .find(|tok| tok.contains('.'))
        .unwrap_or("3.0");
    let mut parts = digits.splitn(2, '.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(3);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    major * 1000 + minor * 100
}

impl GpuDevice for OpenGlDevice {
    fn kind(&self) -> Backend {
        self.config.backend
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn language_version(&self) -> u32 {
        self.language_version
    }

    fn features(&self) -> Features {
        self.features
    }

    fn limits(&self) -> Limits {
        self.limits
    }

    fn init(&mut self) -> Result<()> {
        unsafe {
            self.gl.enable(glow::PROGRAM_POINT_SIZE);
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, viewport: Option<Viewport>) -> Result<()> {
        self.width = width;
        self.height = height;
        if let Some(vp) = viewport {
            self.config.width = vp.width;
            self.config.height = vp.height;
        }
        self.state.invalidate();
        Ok(())
    }

    fn wait_idle(&self) {
        unsafe { self.gl.finish() };
    }

    fn create_buffer(&self, desc: BufferDescriptor) -> Result<Ref<dyn Buffer>> {
        let buf = GlBuffer::new(self.gl.clone(), desc)?;
        Ok(Ref::new(buf))
    }

    fn create_texture(&self, desc: TextureDescriptor) -> Result<Ref<dyn Texture>> {
        let tex = GlTexture::new(self.gl.clone(), desc)?;
        Ok(Ref::new(tex))
    }

    fn wrap_texture(&self, desc: TextureDescriptor, handle: u64) -> Result<Ref<dyn Texture>> {
        let tex = GlTexture::wrap(self.gl.clone(), desc, handle as u32)?;
        Ok(Ref::new(tex))
    }

    fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Ref<dyn Program>> {
        let program = GlProgram::new_graphics(self.gl.clone(), vertex_src, fragment_src)?;
        program.bind_uniform_blocks();
        Ok(Ref::new(program))
    }

    fn create_compute_program(&self, compute_src: &str) -> Result<Ref<dyn Program>> {
        if !self.features.contains(Features::COMPUTE) {
            return Err(NglError::new(ErrorCode::Unsupported, "compute shaders are not available"));
        }
        let program = GlProgram::new_compute(self.gl.clone(), compute_src)?;
        program.bind_uniform_blocks();
        Ok(Ref::new(program))
    }

    fn create_pipeline(&self, desc: &PipelineDescriptor) -> Result<Ref<dyn Pipeline>> {
        let pipeline = GlPipeline::new(self.gl.clone(), desc)?;
        Ok(Ref::new(pipeline))
    }

    fn create_rendertarget_backend(&self, rt: &RenderTarget) -> Result<Ref<dyn RenderTargetBackend>> {
        let backend = GlRenderTarget::build(self.gl.clone(), rt)?;
        Ok(Ref::new(backend))
    }

    fn default_rendertarget(&self, load_op: LoadOp) -> (RenderTarget, Ref<dyn RenderTargetBackend>) {
        let rt = RenderTarget {
            width: self.width,
            height: self.height,
            layout: ngl_gpu::rendertarget::RenderTargetLayout {
                samples: self.config.samples,
                colors: Default::default(),
                depth_stencil: None,
            },
            colors: Default::default(),
            depth_stencil: None,
        };
        let backend = GlRenderTarget::screen(self.gl.clone(), load_op);
        (rt, Ref::new(backend))
    }

    fn begin_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        let gl_rt = backend_rt
            .downcast_ref::<GlRenderTarget>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL render target bound to GL device"))?;
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, gl_rt.draw_fbo);
        }
        self.state.apply_viewport(&self.gl, 0, 0, rt.width, rt.height);
        self.state.apply_scissor(&self.gl, None);

        if gl_rt.draw_fbo.is_none() {
            if gl_rt.default_load_op == Some(LoadOp::Clear) {
                let [r, g, b, a] = self.config.clear_color;
                unsafe {
                    self.gl.clear_color(r, g, b, a);
                    self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
                }
            }
            return Ok(());
        }

        unsafe {
            for (i, color) in rt.colors.iter().enumerate() {
                if color.load_op == LoadOp::Clear {
                    self.gl.clear_buffer_f32_slice(glow::COLOR, i as u32, &color.clear_value.color);
                }
            }
            if let Some(ds) = &rt.depth_stencil {
                if ds.load_op == LoadOp::Clear {
                    let has_stencil = ds.texture.descriptor().format.info().has_stencil;
                    if has_stencil {
                        self.gl.clear_buffer_depth_stencil(
                            glow::DEPTH_STENCIL,
                            0,
                            ds.clear_value.depth,
                            ds.clear_value.stencil as i32,
                        );
                    } else {
                        self.gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[ds.clear_value.depth]);
                    }
                }
            }
        }
        Ok(())
    }

    fn end_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        let gl_rt = backend_rt
            .downcast_ref::<GlRenderTarget>()
            .ok_or_else(|| NglError::new(ErrorCode::Bug, "non-GL render target bound to GL device"))?;

        if let Some(resolve_fbo) = gl_rt.resolve_fbo {
            unsafe {
                self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, gl_rt.draw_fbo);
                self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(resolve_fbo));
                self.gl.blit_framebuffer(
                    0,
                    0,
                    rt.width as i32,
                    rt.height as i32,
                    0,
                    0,
                    rt.width as i32,
                    rt.height as i32,
                    glow::COLOR_BUFFER_BIT,
                    glow::NEAREST,
                );
            }
        }

        if self.features.contains(Features::INVALIDATE_SUBDATA) {
            let mut invalidate = Vec::new();
            for (i, color) in rt.colors.iter().enumerate() {
                if color.store_op == StoreOp::DontCare {
                    invalidate.push(glow::COLOR_ATTACHMENT0 + i as u32);
                }
            }
            if let Some(ds) = &rt.depth_stencil {
                if ds.store_op == StoreOp::DontCare {
                    let has_stencil = ds.texture.descriptor().format.info().has_stencil;
                    invalidate.push(if has_stencil { glow::DEPTH_STENCIL_ATTACHMENT } else { glow::DEPTH_ATTACHMENT });
                }
            }
            if !invalidate.is_empty() {
                unsafe {
                    self.gl.bind_framebuffer(glow::FRAMEBUFFER, gl_rt.draw_fbo);
                    self.gl.invalidate_framebuffer(glow::FRAMEBUFFER, &invalidate);
                }
            }
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) {
        let Some(gl_pipeline) = pipeline.downcast_ref::<GlPipeline>() else {
            log::error!("non-GL pipeline bound to GL device");
            return;
        };
        let program = gl_pipeline.gl_program();
        self.state.bind_program(&self.gl, program);
        if !gl_pipeline.is_compute {
            self.state.apply(&self.gl, gl_pipeline.state);
            unsafe { self.gl.bind_vertex_array(gl_pipeline.vao) };
        }
        self.bound = BoundPipelineState {
            vao: gl_pipeline.vao,
            program: Some(program),
            topology: gl_pipeline.topology,
            is_compute: gl_pipeline.is_compute,
            vertex_buffers: gl_pipeline.vertex_buffers.clone(),
        };
    }

    fn bind_bindgroup(&mut self, bindgroup: &BindGroup, dynamic_offsets: &[u32]) {
        // Dynamic offsets are consumed positionally against the buffer
        // entries in declaration order (the layout carries only an
        // aggregate count, not a per-entry dynamic flag).
        let mut dyn_iter = dynamic_offsets.iter();
        for (i, binding) in bindgroup.buffers().iter().enumerate() {
            let Some(binding) = binding else { continue };
            let Ok(buf) = Self::downcast_buffer(&*binding.buffer) else { continue };
            let extra = dyn_iter.next().copied().unwrap_or(0) as u64;
            let offset = binding.offset + extra;
            unsafe {
                self.gl.bind_buffer_range(
                    buf.target,
                    i as u32,
                    Some(buf.handle),
                    offset as i32,
                    binding.size as i32,
                );
            }
        }
        for (i, binding) in bindgroup.textures().iter().enumerate() {
            let Some(binding) = binding else { continue };
            let Ok(tex) = Self::downcast_texture(&*binding.texture) else { continue };
            unsafe {
                self.gl.active_texture(glow::TEXTURE0 + i as u32);
                self.gl.bind_texture(tex.target, Some(tex.handle));
            }
        }
        if bindgroup.has_write_access() {
            unsafe { self.gl.memory_barrier(glow::ALL_BARRIER_BITS) };
        }
    }

    fn bind_vertex_buffer(&mut self, index: u32, buffer: &dyn Buffer, offset: u64) {
        let Ok(buf) = Self::downcast_buffer(buffer) else { return };
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf.handle));
        }
        if let Some(layout) = self.bound.vertex_buffers.get(index as usize).cloned() {
            if let Some(vao) = self.bound.vao {
                unsafe { self.gl.bind_vertex_array(Some(vao)) };
                for attr in &layout.attributes {
                    let (size, ty, normalized) = crate::pipeline::vertex_attrib_gl(attr.format);
                    unsafe {
                        self.gl.vertex_attrib_pointer_f32(
                            attr.location,
                            size,
                            ty,
                            normalized,
                            layout.stride as i32,
                            (attr.offset as u64 + offset) as i32,
                        );
                        if matches!(layout.step_mode, VertexStepMode::Instance) {
                            self.gl.vertex_attrib_divisor(attr.location, 1);
                        }
                    }
                }
            }
        }
        unsafe { self.gl.bind_buffer(glow::ARRAY_BUFFER, None) };
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, format: IndexFormat) {
        let Ok(buf) = Self::downcast_buffer(buffer) else { return };
        self.bound_index_offset_bytes = offset;
        self.bound_index_format = format;
        unsafe {
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buf.handle));
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            if instance_count <= 1 && first_instance == 0 {
                self.gl.draw_arrays(self.bound.topology, first_vertex as i32, vertex_count as i32);
            } else {
                self.gl.draw_arrays_instanced(
                    self.bound.topology,
                    first_vertex as i32,
                    vertex_count as i32,
                    instance_count as i32,
                );
            }
        }
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        _first_instance: u32,
    ) {
        let gl_type = index_format_to_gl(self.bound_index_format);
        let index_size = self.bound_index_format.byte_size();
        let offset = self.bound_index_offset_bytes + (first_index as u64) * index_size;
        unsafe {
            if instance_count <= 1 {
                self.gl.draw_elements(self.bound.topology, index_count as i32, gl_type, offset as i32);
            } else {
                self.gl.draw_elements_instanced(
                    self.bound.topology,
                    index_count as i32,
                    gl_type,
                    offset as i32,
                    instance_count as i32,
                );
            }
            // `vertex_offset` requires `glDrawElementsBaseVertex`, available
            // on desktop GL 3.2+ and GLES 3.2+; omitted for broader GLES
            // 3.0/3.1 compatibility, matching this backend's baseline.
            let _ = vertex_offset;
        }
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        unsafe { self.gl.dispatch_compute(group_x, group_y, group_z) };
    }

    fn begin_draw(&mut self, _t: f64) {
        if let Some(timer) = self.timer.borrow_mut().as_mut() {
            timer.begin(&self.gl);
        }
    }

    fn end_draw(&mut self, _t: f64, capture: Option<&mut [u8]>) {
        if let Some(timer) = self.timer.borrow_mut().as_mut() {
            timer.end(&self.gl);
        }
        if let Some(dst) = capture {
            unsafe {
                self.gl.read_pixels(
                    0,
                    0,
                    self.width as i32,
                    self.height as i32,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelPackData::Slice(dst),
                );
            }
        }
    }

    fn query_draw_time_ns(&self) -> Option<u64> {
        self.timer.borrow_mut().as_mut().and_then(|t| t.result_ns(&self.gl))
    }

    fn transform_projection_matrix(&self, m: &mut [f32; 16]) {
        if self.flip_y() {
            for col in 0..4 {
                m[col * 4 + 1] = -m[col * 4 + 1];
            }
        }
    }

    fn rendertarget_uvcoord_matrix(&self) -> [f32; 16] {
        if self.flip_y() {
            #[rustfmt::skip]
            let m = [
                1.0, 0.0, 0.0, 0.0,
                0.0, -1.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 1.0, 0.0, 1.0,
            ];
            m
        } else {
            let mut m = [0.0f32; 16];
            m[0] = 1.0;
            m[5] = 1.0;
            m[10] = 1.0;
            m[15] = 1.0;
            m
        }
    }

    fn transform_cull_mode(&self, cull_mode: CullMode) -> CullMode {
        if !self.flip_y() {
            return cull_mode;
        }
        match cull_mode {
            CullMode::Front => CullMode::Back,
            CullMode::Back => CullMode::Front,
            CullMode::None => CullMode::None,
        }
    }
}
