//! The façade entry points (§6.2). One `Context` per running instance, owning
//! the `GpuContext` (once configured) and the `SceneRuntime` (once a scene is
//! set). Backend selection — the one thing that needs to know which backend
//! crates are actually linked in — lives here rather than in `ngl-gpu`, which
//! only knows about the `GpuDevice` trait it dispatches through.

use ngl_gpu::config::{Backend, GpuConfig, Viewport};
use ngl_gpu::context::GpuContext;
use ngl_gpu::rendertarget::LoadOp;
use ngl_gpu::Ref;
use ngl_scene::draw::{DrawContext, RenderTargetPair};
use ngl_scene::node::{Node, NodeRef, NodeState};
use ngl_scene::prepare::PrepareContext;
use ngl_scene::SceneRuntime;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::hashmap::{new_hashset, HashSet};
use ngl_util::Result;

#[cfg(feature = "gl")]
use std::rc::Rc;

/// What the host application must hand over to bring up a backend device;
/// obtaining these values (a current GL context, an initialized Vulkan
/// instance/device/queue) is the WSI's job and stays out of scope here
/// (SPEC_FULL.md §1) — `ngl-gpu-gl`/`ngl-gpu-vk` only know how to drive an
/// *already-current* context, never how to create one.
pub enum BackendInit {
    #[cfg(feature = "gl")]
    OpenGl { gl: Rc<glow::Context> },
    #[cfg(feature = "vulkan")]
    Vulkan { params: ngl_gpu_vk::VulkanDeviceParams },
}

/// Which suffix of configure -> set_scene -> set_capture_buffer state to
/// tear down (§6.2 `ngl_reset`). The layers nest: tearing down a shallower
/// one also tears down everything built on top of it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetMode {
    /// Disable any active capture destination; leaves the scene and the GPU
    /// context untouched.
    SetCaptureBuffer,
    /// The above, plus release and uninit the current scene.
    SetScene,
    /// The above, plus tear down the GPU context; the next call must be
    /// `configure`.
    Configure,
    /// Full teardown back to the state right after `create` — in this
    /// implementation there is no state below the GPU context to distinguish
    /// this from `Configure`, so the two have identical effect.
    Reset,
}

fn make_device(
    config: &GpuConfig,
    init: BackendInit,
) -> Result<Box<dyn ngl_gpu::context::GpuDevice>> {
    match (config.backend, init) {
        #[cfg(feature = "gl")]
        (Backend::OpenGl, BackendInit::OpenGl { gl }) | (Backend::OpenGlEs, BackendInit::OpenGl { gl }) => {
            Ok(Box::new(ngl_gpu_gl::OpenGlDevice::new(gl, config.clone())?))
        }
        #[cfg(feature = "vulkan")]
        (Backend::Vulkan, BackendInit::Vulkan { params }) => {
            Ok(Box::new(ngl_gpu_vk::VulkanDevice::new(params, config.clone())?))
        }
        #[allow(unreachable_patterns)]
        _ => Err(NglError::new(
            ErrorCode::Unsupported,
            "requested backend is not compiled in, or its init value doesn't match",
        )),
    }
}

/// One running instance of the engine (§6.2 `ctx`).
pub struct Context {
    gpu: Option<GpuContext>,
    runtime: SceneRuntime,
    root: Option<NodeRef>,
}

impl Context {
    /// `ngl_create()`. Installs `pretty_env_logger` unless the host
    /// application has already installed a logger of its own (SPEC_FULL.md
    /// §10.1) — `log::max_level()` reads `Off` only when nothing has called
    /// `set_logger` yet.
    pub fn create() -> Self {
        if log::max_level() == log::LevelFilter::Off {
            let _ = pretty_env_logger::try_init();
        }
        Context { gpu: None, runtime: SceneRuntime::new(), root: None }
    }

    /// `ngl_configure(ctx, config)`. Tears down any previously configured
    /// GPU context and scene, then brings up a fresh one against `config`
    /// and `init` (Scenario E: an unsupported backend/init pairing returns
    /// `UNSUPPORTED` before any resource is allocated, since `make_device`
    /// runs before `GpuContext::create` stores anything).
    pub fn configure(&mut self, config: GpuConfig, init: BackendInit) -> Result<()> {
        self.reset(ResetMode::Configure);
        let mut gpu = GpuContext::create(config, move |cfg| make_device(cfg, init))?;
        gpu.init()?;
        self.gpu = Some(gpu);
        Ok(())
    }

    /// `ngl_resize(ctx, w, h, viewport?)`.
    pub fn resize(&mut self, width: u32, height: u32, viewport: Option<Viewport>) -> Result<()> {
        self.gpu_mut()?.resize(width, height, viewport)
    }

    /// `ngl_set_capture_buffer(ctx, buf)`.
    ///
    /// # Safety
    /// See [`GpuContext::set_capture_buffer`]: `dst` must remain valid for
    /// its declared length until capture is disabled or the context resets.
    pub unsafe fn set_capture_buffer(&mut self, dst: Option<(*mut u8, usize)>) -> Result<()> {
        self.gpu_mut()?.set_capture_buffer(dst)
    }

    /// `ngl_set_scene(ctx, node)`. Releases and uninitializes whatever scene
    /// was previously set, then walks `root`'s `init` (one-shot, §4.4.1) and
    /// `prepare` (rendertarget-layout collection, against the default
    /// framebuffer's layout since the root always draws into it first).
    /// `None` clears the scene without installing a new one.
    pub fn set_scene(&mut self, root: Option<NodeRef>) -> Result<()> {
        if self.root.is_some() {
            self.reset(ResetMode::SetScene);
        }
        let Some(root) = root else { return Ok(()) };
        init_tree(&root)?;
        {
            let gpu = self.gpu_mut()?;
            let (default_rt, _backend) = gpu.get_default_rendertarget(LoadOp::Clear);
            let mut ctx = PrepareContext::new(gpu, default_rt.layout.clone());
            root.borrow_mut().prepare(&mut ctx)?;
        }
        mark_prepared_tree(&root);
        self.root = Some(root);
        Ok(())
    }

    /// `ngl_prepare_draw(ctx, t)`: runs the update walk (bottom-up
    /// activation of variables, media, textures, and containers).
    pub fn prepare_draw(&mut self, t: f64) -> Result<()> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "prepare_draw called with no scene set"))?;
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "context is not configured"))?;
        self.runtime.update(&root, t, gpu)?;
        Ok(())
    }

    /// `ngl_draw(ctx, t)`: brackets the root traversal with `begin_draw`/
    /// `end_draw` (§4.1.1), builds the default rendertarget's clear/load
    /// pair, and draws the root subtree top-down.
    pub fn draw(&mut self, t: f64) -> Result<()> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "draw called with no scene set"))?;
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "context is not configured"))?;
        let frame = self
            .runtime
            .last_frame()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "draw called before prepare_draw"))?;

        gpu.begin_draw(t);
        let clear = gpu.get_default_rendertarget(LoadOp::Clear);
        let load = gpu.get_default_rendertarget(LoadOp::Load);
        let rendertargets = RenderTargetPair { clear, load };
        let result = (|| -> Result<()> {
            let mut ctx = DrawContext::new(gpu, frame, t, &rendertargets);
            let already = root.borrow().base().draw_time.get() == frame.0;
            if !already && root.borrow().base().is_active() {
                root.borrow().base().draw_time.set(frame.0);
                root.borrow_mut().draw(&mut ctx)?;
            }
            ctx.end_pass_if_open()
        })();
        gpu.end_draw(t);
        result
    }

    /// `ngl_reset(ctx, mode)`.
    pub fn reset(&mut self, mode: ResetMode) {
        if let Some(gpu) = self.gpu.as_mut() {
            // SAFETY: disabling capture never touches the pointer.
            let _ = unsafe { gpu.set_capture_buffer(None) };
        }
        if mode == ResetMode::SetCaptureBuffer {
            return;
        }

        if let Some(root) = self.root.take() {
            self.runtime.release_all();
            uninit_tree(&root);
        }
        self.runtime = SceneRuntime::new();
        if mode == ResetMode::SetScene {
            return;
        }

        self.gpu = None;
    }

    /// `ngl_gpu_query_draw_time(ctx, *ns)`; `None` if the context isn't
    /// configured or the backend lacks the timer-query feature.
    pub fn query_draw_time(&self) -> Option<u64> {
        self.gpu.as_ref().and_then(|g| g.query_draw_time())
    }

    /// The currently set scene root, for introspection (e.g. [`crate::serialize`]).
    pub fn scene_root(&self) -> Option<&NodeRef> {
        self.root.as_ref()
    }

    fn gpu_mut(&mut self) -> Result<&mut GpuContext> {
        self.gpu
            .as_mut()
            .ok_or_else(|| NglError::new(ErrorCode::InvalidUsage, "context is not configured"))
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::create()
    }
}

/// One-shot `init` over the whole reachable subtree, in document order, each
/// node visited exactly once regardless of how many parents share it (same
/// pointer-identity dedup [`ngl_scene::lifecycle::SceneRuntime`] uses for the
/// per-frame walks).
fn init_tree(root: &NodeRef) -> Result<()> {
    fn walk(node: &NodeRef, seen: &mut HashSet<usize>) -> Result<()> {
        if !seen.insert(Ref::addr(node)) {
            return Ok(());
        }
        node.borrow_mut().init()?;
        node.borrow_mut().base_mut().state = NodeState::Initialized;
        for child in &node.borrow().children() {
            walk(child, seen)?;
        }
        Ok(())
    }
    walk(root, &mut new_hashset())
}

/// Mirror of [`init_tree`] run at scene teardown (§4.5: "release first, then
/// uninit"); `release` itself already ran via `SceneRuntime::release_all`.
fn uninit_tree(root: &NodeRef) {
    fn walk(node: &NodeRef, seen: &mut HashSet<usize>) {
        if !seen.insert(Ref::addr(node)) {
            return;
        }
        for child in &node.borrow().children() {
            walk(child, seen);
        }
        node.borrow_mut().uninit();
        node.borrow_mut().base_mut().state = NodeState::Uninitialized;
    }
    walk(root, &mut new_hashset());
}

/// `prepare` itself is recursed by each node class (container classes just
/// pass the context through, `RenderToTexture` rebuilds it); this walk only
/// stamps the state every reached node ends up in once that's done.
fn mark_prepared_tree(root: &NodeRef) {
    fn walk(node: &NodeRef, seen: &mut HashSet<usize>) {
        if !seen.insert(Ref::addr(node)) {
            return;
        }
        node.borrow_mut().base_mut().state = NodeState::Prepared;
        for child in &node.borrow().children() {
            walk(child, seen);
        }
    }
    walk(root, &mut new_hashset());
}
