//! The GPU-CTX façade (§4.1): one capability-trait implementation per
//! backend, selected at `create`, with the façade itself enforcing the
//! pass-opening and draw-time contracts so every backend gets them for
//! free.

use crate::bindgroup::{BindGroup, BindGroupLayout};
use crate::config::{Backend, GpuConfig, Viewport};
use crate::limits::{Features, Limits};
use crate::pipeline::PipelineDescriptor;
use crate::resource::{BufferDescriptor, TextureDescriptor};
use crate::rendertarget::{LoadOp, RenderTarget};
use crate::traits::{Buffer, Pipeline, Program, RenderTargetBackend, Texture};
use crate::vertex::IndexFormat;
use crate::Ref;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::fmt::Debug;

/// A pipeline paired with the descriptor it was built from; the façade
/// needs the descriptor at draw time to validate layout compatibility and
/// vertex-buffer coverage (Testable Properties #3, #4, Scenario G).
pub struct GraphicsPipelineHandle {
    pub descriptor: PipelineDescriptor,
    pub backend: Ref<dyn Pipeline>,
}

/// One concrete implementation behind the façade (§9 Design Notes: "prefer
/// a capability trait with a single concrete implementation chosen at
/// create"). Methods here assume the façade has already validated its
/// preconditions; a backend only has to execute, not re-check, the §4.1
/// contracts.
pub trait GpuDevice: Debug {
    fn kind(&self) -> Backend;
    fn version(&self) -> u32;
    fn language_version(&self) -> u32;
    fn features(&self) -> Features;
    fn limits(&self) -> Limits;

    fn init(&mut self) -> Result<()>;
    fn resize(&mut self, width: u32, height: u32, viewport: Option<Viewport>) -> Result<()>;
    fn wait_idle(&self);

    fn create_buffer(&self, desc: BufferDescriptor) -> Result<Ref<dyn Buffer>>;
    fn create_texture(&self, desc: TextureDescriptor) -> Result<Ref<dyn Texture>>;
    /// `handle` is an opaque backend-specific external handle (e.g. a GL
    /// texture name or a `VkImage`); the resulting texture's destroy
    /// behavior must not release it (§4.5).
    fn wrap_texture(&self, desc: TextureDescriptor, handle: u64) -> Result<Ref<dyn Texture>>;
    fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Ref<dyn Program>>;
    fn create_compute_program(&self, compute_src: &str) -> Result<Ref<dyn Program>>;
    fn create_pipeline(&self, desc: &PipelineDescriptor) -> Result<Ref<dyn Pipeline>>;
    fn create_rendertarget_backend(&self, rt: &RenderTarget) -> Result<Ref<dyn RenderTargetBackend>>;
    fn default_rendertarget(&self, load_op: LoadOp) -> (RenderTarget, Ref<dyn RenderTargetBackend>);

    fn begin_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()>;
    /// Resolves MSAA and invalidates DONT_CARE attachments (§4.2).
    fn end_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline);
    fn bind_bindgroup(&mut self, bindgroup: &BindGroup, dynamic_offsets: &[u32]);
    fn bind_vertex_buffer(&mut self, index: u32, buffer: &dyn Buffer, offset: u64);
    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, format: IndexFormat);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32);

    fn begin_draw(&mut self, t: f64);
    /// Runs capture read-back (if a capture buffer is set) and present.
    fn end_draw(&mut self, t: f64, capture: Option<&mut [u8]>);

    fn query_draw_time_ns(&self) -> Option<u64>;

    fn transform_projection_matrix(&self, m: &mut [f32; 16]);
    fn rendertarget_uvcoord_matrix(&self) -> [f32; 16];
    fn transform_cull_mode(&self, cull_mode: crate::pipeline::CullMode) -> crate::pipeline::CullMode;
}

struct CaptureTarget {
    ptr: *mut u8,
    len: usize,
}

struct BoundVertexBuffer {
    buffer: Ref<dyn Buffer>,
    offset: u64,
}

struct BoundIndexBuffer {
    buffer: Ref<dyn Buffer>,
    offset: u64,
    format: IndexFormat,
}

/// Public entry points live on [`crate::facade`]'s free functions (§6.2);
/// this struct is the `ctx` they operate on.
pub struct GpuContext {
    pub config: GpuConfig,
    device: Box<dyn GpuDevice>,
    pass_open: bool,
    bound_pipeline: Option<Ref<GraphicsPipelineHandle>>,
    bound_bindgroup_layout: Option<Ref<BindGroupLayout>>,
    bound_vertex_buffers: Vec<Option<BoundVertexBuffer>>,
    bound_index_buffer: Option<BoundIndexBuffer>,
    capture_target: Option<CaptureTarget>,
}

impl GpuContext {
    /// `create(config) -> ctx`. Fails `UNSUPPORTED` if the requested backend
    /// wasn't compiled in (Scenario E); `make_device` is supplied by the
    /// façade crate (`ngl`), which is the only place that knows which
    /// backend crates are linked in.
    pub fn create(
        config: GpuConfig,
        make_device: impl FnOnce(&GpuConfig) -> Result<Box<dyn GpuDevice>>,
    ) -> Result<Self> {
        let device = make_device(&config)?;
        Ok(GpuContext {
            config,
            device,
            pass_open: false,
            bound_pipeline: None,
            bound_bindgroup_layout: None,
            bound_vertex_buffers: Vec::new(),
            bound_index_buffer: None,
            capture_target: None,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.device.init()
    }

    pub fn resize(&mut self, width: u32, height: u32, viewport: Option<Viewport>) -> Result<()> {
        if self.config.offscreen {
            return Err(NglError::new(ErrorCode::InvalidUsage, "resize is onscreen-only"));
        }
        self.device.resize(width, height, viewport)
    }

    /// `set_capture_buffer(ctx, dst)`: only valid offscreen; `None` disables
    /// (Scenario F: a later draw leaves the previous buffer untouched).
    ///
    /// # Safety
    /// `ptr` must remain valid for `len` bytes until capture is disabled or
    /// the context is reset.
    pub unsafe fn set_capture_buffer(&mut self, dst: Option<(*mut u8, usize)>) -> Result<()> {
        if !self.config.offscreen && dst.is_some() {
            return Err(NglError::new(ErrorCode::InvalidUsage, "capture is offscreen-only"));
        }
        self.capture_target = dst.map(|(ptr, len)| CaptureTarget { ptr, len });
        Ok(())
    }

    pub fn begin_draw(&mut self, t: f64) {
        self.device.begin_draw(t);
    }

    pub fn end_draw(&mut self, t: f64) {
        debug_assert!(!self.pass_open, "end_draw called with a render pass still open");
        // SAFETY: `ptr`/`len` were validated live by the caller of
        // `set_capture_buffer`; the slice does not outlive this call.
        let capture = self
            .capture_target
            .as_ref()
            .map(|c| unsafe { std::slice::from_raw_parts_mut(c.ptr, c.len) });
        self.device.end_draw(t, capture);
    }

    pub fn begin_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        if self.pass_open {
            return Err(NglError::new(ErrorCode::InvalidUsage, "a render pass is already open"));
        }
        self.pass_open = true;
        self.device.begin_render_pass(rt, backend_rt)
    }

    pub fn end_render_pass(&mut self, rt: &RenderTarget, backend_rt: &dyn RenderTargetBackend) -> Result<()> {
        if !self.pass_open {
            return Err(NglError::new(ErrorCode::InvalidUsage, "no render pass is open"));
        }
        self.pass_open = false;
        self.bound_vertex_buffers.clear();
        self.bound_index_buffer = None;
        self.device.end_render_pass(rt, backend_rt)
    }

    pub fn is_pass_open(&self) -> bool {
        self.pass_open
    }

    pub fn set_pipeline(&mut self, pipeline: Ref<GraphicsPipelineHandle>) {
        self.device.bind_pipeline(&*pipeline.backend);
        self.bound_pipeline = Some(pipeline);
    }

    /// Validates `bg.layout` against the bound pipeline's bindgroup layout
    /// and that `n == bg.layout.nb_dynamic_offsets` (Testable Property #4).
    pub fn set_bindgroup(&mut self, bindgroup: &BindGroup, dynamic_offsets: &[u32]) -> Result<()> {
        let pipeline = self
            .bound_pipeline
            .as_ref()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "no pipeline is bound"))?;
        if !bindgroup.layout.is_compatible_with(&pipeline.descriptor.bindgroup_layout) {
            return Err(NglError::new(ErrorCode::InvalidUsage, "bind group layout incompatible with pipeline"));
        }
        if dynamic_offsets.len() as u32 != bindgroup.layout.nb_dynamic_offsets {
            return Err(NglError::new(
                ErrorCode::InvalidUsage,
                format!(
                    "expected {} dynamic offsets, got {}",
                    bindgroup.layout.nb_dynamic_offsets,
                    dynamic_offsets.len()
                ),
            ));
        }
        self.device.bind_bindgroup(bindgroup, dynamic_offsets);
        self.bound_bindgroup_layout = Some(bindgroup.layout.clone());
        Ok(())
    }

    pub fn set_vertex_buffer(&mut self, index: u32, buffer: Ref<dyn Buffer>, offset: u64) {
        let idx = index as usize;
        if self.bound_vertex_buffers.len() <= idx {
            self.bound_vertex_buffers.resize_with(idx + 1, || None);
        }
        self.device.bind_vertex_buffer(index, &*buffer, offset);
        self.bound_vertex_buffers[idx] = Some(BoundVertexBuffer { buffer, offset });
    }

    pub fn set_index_buffer(&mut self, buffer: Ref<dyn Buffer>, offset: u64, format: IndexFormat) {
        self.device.bind_index_buffer(&*buffer, offset, format);
        self.bound_index_buffer = Some(BoundIndexBuffer { buffer, offset, format });
    }

    fn check_vertex_buffers_bound(&self) -> Result<()> {
        let pipeline = self
            .bound_pipeline
            .as_ref()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "no pipeline is bound"))?;
        for (slot, _) in pipeline.descriptor.vertex_buffers.iter().enumerate() {
            let bound = self.bound_vertex_buffers.get(slot).and_then(|b| b.as_ref());
            if bound.is_none() {
                let msg = format!("vertex buffer slot {slot} referenced by the pipeline is not bound");
                debug_assert!(false, "{msg}");
                return Err(NglError::new(ErrorCode::InvalidUsage, msg));
            }
        }
        Ok(())
    }

    /// `draw(nv, ni)`. Asserts a pipeline+bindgroup are set and every
    /// vertex-buffer slot referenced by the pipeline's vertex state is
    /// bound (Scenario G): a debug build panics via `debug_assert!`, a
    /// release build returns `INVALID_USAGE`.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.check_vertex_buffers_bound()?;
        self.device.draw(vertex_count, instance_count, first_vertex, first_instance);
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_vertex_buffers_bound()?;
        if self.bound_index_buffer.is_none() {
            return Err(NglError::new(ErrorCode::InvalidUsage, "draw_indexed without a bound index buffer"));
        }
        self.device
            .draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance);
        Ok(())
    }

    pub fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) -> Result<()> {
        if self.bound_pipeline.is_none() {
            return Err(NglError::new(ErrorCode::InvalidUsage, "dispatch without a bound pipeline"));
        }
        self.device.dispatch(group_x, group_y, group_z);
        Ok(())
    }

    pub fn get_default_rendertarget(&self, load_op: LoadOp) -> (RenderTarget, Ref<dyn RenderTargetBackend>) {
        self.device.default_rendertarget(load_op)
    }

    pub fn create_buffer(&self, desc: BufferDescriptor) -> Result<Ref<dyn Buffer>> {
        self.device.create_buffer(desc)
    }

    pub fn create_texture(&self, desc: TextureDescriptor) -> Result<Ref<dyn Texture>> {
        self.device.create_texture(desc)
    }

    pub fn wrap_texture(&self, desc: TextureDescriptor, handle: u64) -> Result<Ref<dyn Texture>> {
        self.device.wrap_texture(desc, handle)
    }

    pub fn create_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Ref<dyn Program>> {
        self.device.create_program(vertex_src, fragment_src)
    }

    pub fn create_compute_program(&self, compute_src: &str) -> Result<Ref<dyn Program>> {
        self.device.create_compute_program(compute_src)
    }

    pub fn create_pipeline(&self, desc: PipelineDescriptor) -> Result<Ref<GraphicsPipelineHandle>> {
        let backend = self.device.create_pipeline(&desc)?;
        Ok(Ref::new(GraphicsPipelineHandle { descriptor: desc, backend }))
    }

    pub fn create_rendertarget_backend(&self, rt: &RenderTarget) -> Result<Ref<dyn RenderTargetBackend>> {
        self.device.create_rendertarget_backend(rt)
    }

    pub fn features(&self) -> Features {
        self.device.features()
    }

    pub fn limits(&self) -> Limits {
        self.device.limits()
    }

    /// Requires the `TIMER_QUERY` feature; returns `None` otherwise.
    pub fn query_draw_time(&self) -> Option<u64> {
        if !self.device.features().contains(Features::TIMER_QUERY) {
            return None;
        }
        self.device.query_draw_time_ns()
    }

    pub fn transform_projection_matrix(&self, m: &mut [f32; 16]) {
        self.device.transform_projection_matrix(m);
    }

    pub fn rendertarget_uvcoord_matrix(&self) -> [f32; 16] {
        self.device.rendertarget_uvcoord_matrix()
    }

    pub fn transform_cull_mode(&self, cull_mode: crate::pipeline::CullMode) -> crate::pipeline::CullMode {
        self.device.transform_cull_mode(cull_mode)
    }

    pub fn wait_idle(&self) {
        self.device.wait_idle();
    }
}
