//! `Texture`: a sampleable GPU texture, either a static asset uploaded once
//! at activation or a live view onto a `Media` child's decoded frames
//! (§4.4.5).

use crate::hwmap::{self};
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::nodes::media::Media;
use crate::prepare::PrepareContext;
use ngl_gpu::config::Backend;
use ngl_gpu::context::GpuContext;
use ngl_gpu::resource::TextureDescriptor;
use ngl_gpu::traits::Texture as GpuTexture;
use ngl_gpu::Ref;
use ngl_util::Result;

#[derive(Debug)]
enum Source {
    /// A plain asset: created and optionally uploaded once, at `prefetch`.
    Static { desc: TextureDescriptor, initial_data: Option<Vec<u8>> },
    /// A live view onto a `Media` child, remapped every draw (§4.4.5).
    Media { media: NodeRef, desc: TextureDescriptor, backend: Backend },
}

const IDENTITY: [f32; 16] =
    [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug)]
pub struct Texture {
    base: NodeBase,
    source: Source,
    handle: Option<Ref<dyn GpuTexture>>,
    coordinate_matrix: [f32; 16],
}

impl Texture {
    pub fn from_descriptor(
        label: impl Into<String>,
        desc: TextureDescriptor,
        initial_data: Option<Vec<u8>>,
    ) -> NodeRef {
        new_node_ref(Texture {
            base: NodeBase::new(label),
            source: Source::Static { desc, initial_data },
            handle: None,
            coordinate_matrix: IDENTITY,
        })
    }

    pub fn from_media(label: impl Into<String>, media: NodeRef, desc: TextureDescriptor, backend: Backend) -> NodeRef {
        let node = new_node_ref(Texture {
            base: NodeBase::new(label),
            source: Source::Media { media: media.clone(), desc, backend },
            handle: None,
            coordinate_matrix: IDENTITY,
        });
        media.borrow().base().add_parent(&node);
        node
    }

    pub fn handle(&self) -> Option<Ref<dyn GpuTexture>> {
        self.handle.clone()
    }

    pub fn coordinate_matrix(&self) -> [f32; 16] {
        self.coordinate_matrix
    }

    /// Pulls a fresh frame through the hwmap strategy table when backed by
    /// a `Media` child; a no-op for a static texture, whose `handle` was
    /// already filled at `prefetch`. Called from `TexturedShape::draw`,
    /// which is the first point in the traversal that both has a `GpuContext`
    /// and knows the time being drawn for.
    pub fn ensure_mapped(&mut self, gpu: &mut GpuContext, t: f64) -> Result<()> {
        let (media, desc, backend) = match &self.source {
            Source::Static { .. } => return Ok(()),
            Source::Media { media, desc, backend } => (media.clone(), *desc, *backend),
        };
        let frame = media
            .borrow_mut()
            .downcast_mut::<Media>()
            .expect("Texture::from_media's child must be a Media node")
            .frame_at(t)?;
        if let Some(frame) = frame {
            let mapped = hwmap::map_frame(gpu, backend, &frame, desc)?;
            self.handle = Some(mapped.texture);
            self.coordinate_matrix = mapped.coordinate_matrix;
        }
        Ok(())
    }
}

impl Node for Texture {
    fn category(&self) -> Category {
        Category::Texture
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn children(&self) -> Vec<NodeRef> {
        match &self.source {
            Source::Static { .. } => Vec::new(),
            Source::Media { media, .. } => vec![media.clone()],
        }
    }
    fn rtt_behavior(&self) -> RttBehavior {
        RttBehavior::Inert
    }

    /// A static texture has no children to reach; a media-backed one must
    /// still forward `prepare` down to its `Media` child so the single-
    /// parent check (Scenario B) actually runs.
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        if let Source::Media { media, .. } = &self.source {
            media.borrow_mut().prepare(ctx)?;
        }
        Ok(())
    }

    fn prefetch(&mut self, gpu: &mut GpuContext) -> Result<()> {
        if let Source::Static { desc, initial_data } = &self.source {
            let texture = gpu.create_texture(*desc)?;
            if let Some(data) = initial_data {
                texture.upload(0, data)?;
            }
            self.handle = Some(texture);
        }
        Ok(())
    }

    fn release(&mut self) {
        if matches!(self.source, Source::Media { .. }) {
            self.handle = None;
        }
    }
}
