//! Bind-group layout and bind group (§3.2).

use crate::resource::SamplerState;
use crate::traits::{Buffer, Texture};
use crate::Ref;
use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX   = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE  = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits | Self::FRAGMENT.bits;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BindingKind {
    Texture,
    Buffer,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BindGroupLayoutEntry {
    pub id: u32,
    pub kind: BindingKind,
    pub binding: u32,
    pub access: Access,
    pub stages: ShaderStageFlags,
    pub immutable_sampler: bool,
}

/// Layout entries partition into two arrays; two layouts are *compatible*
/// iff both arrays match elementwise by type, binding, access, and stage
/// (§3.2).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct BindGroupLayout {
    pub textures: Vec<BindGroupLayoutEntry>,
    pub buffers: Vec<BindGroupLayoutEntry>,
    pub nb_dynamic_offsets: u32,
}

const MAX_DYNAMIC_UNIFORM: u32 = 8;
const MAX_DYNAMIC_STORAGE: u32 = 4;

impl BindGroupLayout {
    pub fn is_compatible_with(&self, other: &BindGroupLayout) -> bool {
        self.textures == other.textures && self.buffers == other.buffers
    }

    /// Validates the ≤8 uniform-dynamic + ≤4 storage-dynamic budget (§3.2).
    pub fn check_dynamic_offset_budget(
        &self,
        nb_dynamic_uniform: u32,
        nb_dynamic_storage: u32,
    ) -> crate::Result<()> {
        if nb_dynamic_uniform > MAX_DYNAMIC_UNIFORM || nb_dynamic_storage > MAX_DYNAMIC_STORAGE {
            return Err(ngl_util::error::NglError::new(
                ngl_util::error::ErrorCode::LimitExceeded,
                format!(
                    "dynamic-offset budget exceeded: {nb_dynamic_uniform} uniform (max {MAX_DYNAMIC_UNIFORM}), {nb_dynamic_storage} storage (max {MAX_DYNAMIC_STORAGE})"
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TextureBinding {
    pub texture: Ref<dyn Texture>,
    pub sampler: SamplerState,
}

#[derive(Clone)]
pub struct BufferBinding {
    pub buffer: Ref<dyn Buffer>,
    pub offset: u64,
    pub size: u64,
}

/// A bind group instance, filled by `update_texture`/`update_buffer`.
/// §5 shared-resource policy: a bind group may only be re-filled between
/// two draws in the same frame as those draws.
pub struct BindGroup {
    pub layout: Ref<BindGroupLayout>,
    textures: Vec<Option<TextureBinding>>,
    buffers: Vec<Option<BufferBinding>>,
}

impl BindGroup {
    pub fn new(layout: Ref<BindGroupLayout>) -> Self {
        let nb_textures = layout.textures.len();
        let nb_buffers = layout.buffers.len();
        BindGroup { layout, textures: vec![None; nb_textures], buffers: vec![None; nb_buffers] }
    }

    pub fn update_texture(&mut self, index: usize, binding: TextureBinding) {
        self.textures[index] = Some(binding);
    }

    pub fn update_buffer(&mut self, index: usize, binding: BufferBinding) {
        self.buffers[index] = Some(binding);
    }

    pub fn textures(&self) -> &[Option<TextureBinding>] {
        &self.textures
    }

    pub fn buffers(&self) -> &[Option<BufferBinding>] {
        &self.buffers
    }

    /// True if any bound texture entry carries WRITE access: a conservative
    /// memory barrier must bracket the next draw (§4.3, §5).
    pub fn has_write_access(&self) -> bool {
        self.layout.textures.iter().any(|e| e.access != Access::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, kind: BindingKind, binding: u32, access: Access) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry { id, kind, binding, access, stages: ShaderStageFlags::ALL_GRAPHICS, immutable_sampler: false }
    }

    #[test]
    fn compatible_layouts_match_elementwise() {
        let a = BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Read)],
            buffers: vec![entry(1, BindingKind::Buffer, 1, Access::ReadWrite)],
            nb_dynamic_offsets: 1,
        };
        let b = a.clone();
        assert!(a.is_compatible_with(&b));
    }

    #[test]
    fn incompatible_on_binding_mismatch() {
        let a = BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Read)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        };
        let b = BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 1, Access::Read)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        };
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn incompatible_on_access_mismatch() {
        let a = BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Read)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        };
        let b = BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Write)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        };
        assert!(!a.is_compatible_with(&b));
    }

    #[test]
    fn dynamic_offset_budget_within_limits() {
        let layout = BindGroupLayout::default();
        assert!(layout.check_dynamic_offset_budget(MAX_DYNAMIC_UNIFORM, MAX_DYNAMIC_STORAGE).is_ok());
    }

    #[test]
    fn dynamic_offset_budget_exceeded() {
        let layout = BindGroupLayout::default();
        assert!(layout.check_dynamic_offset_budget(MAX_DYNAMIC_UNIFORM + 1, 0).is_err());
        assert!(layout.check_dynamic_offset_budget(0, MAX_DYNAMIC_STORAGE + 1).is_err());
    }

    #[test]
    fn has_write_access_reflects_layout() {
        let layout = Ref::new(BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Write)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        });
        let bg = BindGroup::new(layout);
        assert!(bg.has_write_access());

        let ro_layout = Ref::new(BindGroupLayout {
            textures: vec![entry(0, BindingKind::Texture, 0, Access::Read)],
            buffers: vec![],
            nb_dynamic_offsets: 0,
        });
        let ro_bg = BindGroup::new(ro_layout);
        assert!(!ro_bg.has_write_access());
    }
}
