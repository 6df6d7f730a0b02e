//! Context configuration (§6.1): the input to `create`/`configure`.

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Backend {
    OpenGl,
    OpenGlEs,
    Vulkan,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Platform {
    Xlib,
    Wayland,
    MacOs,
    Ios,
    Android,
    Windows,
    Auto,
}

#[derive(Copy, Clone, Debug)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct GpuConfig {
    pub backend: Backend,
    pub platform: Platform,
    pub display: u64,
    pub window: u64,
    pub handle: u64,
    pub offscreen: bool,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub clear_color: [f32; 4],
    pub set_surface_pts: bool,
    pub hud: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        GpuConfig {
            backend: Backend::OpenGl,
            platform: Platform::Auto,
            display: 0,
            window: 0,
            handle: 0,
            offscreen: true,
            width: 1280,
            height: 720,
            samples: 0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            set_surface_pts: false,
            hud: false,
        }
    }
}

/// Loads a [`GpuConfig`] from layered sources (defaults -> file -> `NGL_*`
/// environment overrides), matching the teacher's own use of the `config`
/// crate. Additive to the core: `ngl_configure` itself never touches the
/// filesystem or environment (see SPEC_FULL.md §10.3).
#[cfg(feature = "layered-config")]
pub fn load_layered(path: Option<&std::path::Path>) -> Result<GpuConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .set_default("backend", "opengl")?
        .set_default("offscreen", true)?
        .set_default("width", 1280)?
        .set_default("height", 720)?
        .set_default("samples", 0)?;
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("NGL"));
    let settings = builder.build()?;

    let backend = match settings.get_string("backend")?.to_lowercase().as_str() {
        "opengles" => Backend::OpenGlEs,
        "vulkan" => Backend::Vulkan,
        _ => Backend::OpenGl,
    };

    Ok(GpuConfig {
        backend,
        offscreen: settings.get_bool("offscreen").unwrap_or(true),
        width: settings.get_int("width").unwrap_or(1280) as u32,
        height: settings.get_int("height").unwrap_or(720) as u32,
        samples: settings.get_int("samples").unwrap_or(0) as u32,
        ..GpuConfig::default()
    })
}
