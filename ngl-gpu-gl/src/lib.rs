//! The OpenGL/OpenGL ES backend behind the GPU-CTX trait (SPEC_FULL.md
//! §2 L3, §4.3). Talks to the driver through `glow` rather than hand-rolled
//! `gl_generator` bindings: `glow::Context` is backend-agnostic between
//! desktop GL and GLES, which is exactly the split this crate covers
//! (`Backend::OpenGl` / `Backend::OpenGlEs` both resolve here).
//!
//! Constructing a device requires a context already current on the calling
//! thread and a symbol loader function — bringing up that context from a
//! platform window (EGL/WGL/GLX/EAGL) is the WSI's job and out of scope
//! here (SPEC_FULL.md §1).

mod backend;
mod buffer;
mod pipeline;
mod query;
mod rendertarget;
mod shader;
mod state;
mod texture;

pub use backend::OpenGlDevice;
