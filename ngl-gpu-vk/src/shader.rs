//! Backend program: a `VkShaderModule` pair (or a single compute module)
//! plus a hand-rolled SPIR-V reflection pass that recovers name -> {binding,
//! location} the same way `ngl-gpu-gl`'s `GlProgram` uses driver-queried
//! `glGetActiveUniform`/`glGetActiveAttrib` (§3.2: "exposes discovered
//! uniforms, attributes, and buffer-block bindings as name->{location,
//! binding} maps"). Shader-source cross-compilation is out of scope
//! (SPEC_FULL.md §1): the caller is expected to hand this backend SPIR-V
//! bytecode already targeting Vulkan, the same way it hands `ngl-gpu-gl`
//! GLSL already targeting GL/GLES.

use ash::vk;
use fxhash::FxHashMap;
use ngl_gpu::traits::Program;
use ngl_util::error::{ErrorCode, NglError};
use ngl_util::Result;
use std::rc::Rc;

const OP_NAME: u32 = 5;
const OP_DECORATE: u32 = 71;
const DECORATION_BINDING: u32 = 33;
const DECORATION_LOCATION: u32 = 30;

/// Scans a SPIR-V module's instruction stream for `OpName` (id -> string)
/// and `OpDecorate ... Binding|Location` (id -> number), then joins them by
/// result id. Good enough for the flat name -> slot maps this engine asks
/// for; it does not resolve struct member names inside a uniform block.
fn reflect(words: &[u32]) -> FxHashMap<String, u32> {
    let mut names: FxHashMap<u32, String> = FxHashMap::default();
    let mut slots: FxHashMap<u32, u32> = FxHashMap::default();

    let mut i = 5; // skip the 5-word SPIR-V header
    while i < words.len() {
        let word0 = words[i];
        let op = word0 & 0xffff;
        let len = (word0 >> 16) as usize;
        if len == 0 || i + len > words.len() {
            break;
        }
        match op {
            OP_NAME => {
                let id = words[i + 1];
                let bytes: Vec<u8> = words[i + 2..i + len]
                    .iter()
                    .flat_map(|w| w.to_le_bytes())
                    .take_while(|&b| b != 0)
                    .collect();
                if let Ok(s) = String::from_utf8(bytes) {
                    if !s.is_empty() {
                        names.insert(id, s);
                    }
                }
            }
            OP_DECORATE => {
                let id = words[i + 1];
                let decoration = words[i + 2];
                if (decoration == DECORATION_BINDING || decoration == DECORATION_LOCATION) && len > 3 {
                    slots.insert(id, words[i + 3]);
                }
            }
            _ => {}
        }
        i += len;
    }

    names
        .into_iter()
        .filter_map(|(id, name)| slots.get(&id).map(|&slot| (name, slot)))
        .collect()
}

fn to_spirv(src: &str) -> Vec<u32> {
    let bytes = src.as_bytes();
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[derive(Debug)]
pub struct VulkanProgram {
    device: Rc<ash::Device>,
    pub vertex: Option<vk::ShaderModule>,
    pub fragment: Option<vk::ShaderModule>,
    pub compute: Option<vk::ShaderModule>,
    reflected: FxHashMap<String, u32>,
}

impl VulkanProgram {
    fn create_module(device: &ash::Device, words: &[u32]) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(words);
        unsafe { device.create_shader_module(&create_info, None) }
            .map_err(|e| NglError::new(ErrorCode::InvalidData, format!("vkCreateShaderModule: {e}")))
    }

    pub fn new_graphics(device: Rc<ash::Device>, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        let vertex_words = to_spirv(vertex_src);
        let fragment_words = to_spirv(fragment_src);
        let vertex = Self::create_module(&device, &vertex_words)?;
        let fragment = Self::create_module(&device, &fragment_words)?;
        let mut reflected = reflect(&vertex_words);
        reflected.extend(reflect(&fragment_words));
        Ok(VulkanProgram { device, vertex: Some(vertex), fragment: Some(fragment), compute: None, reflected })
    }

    pub fn new_compute(device: Rc<ash::Device>, compute_src: &str) -> Result<Self> {
        let words = to_spirv(compute_src);
        let compute = Self::create_module(&device, &words)?;
        let reflected = reflect(&words);
        Ok(VulkanProgram { device, vertex: None, fragment: None, compute: Some(compute), reflected })
    }
}

impl Program for VulkanProgram {
    fn reflect(&self, name: &str) -> Option<u32> {
        self.reflected.get(name).copied()
    }
}

impl Drop for VulkanProgram {
    fn drop(&mut self) {
        unsafe {
            for module in [self.vertex, self.fragment, self.compute].into_iter().flatten() {
                self.device.destroy_shader_module(module, None);
            }
        }
    }
}
