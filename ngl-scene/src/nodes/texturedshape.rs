//! `TexturedShape`: the one `Render`-category node in this tree (§4.4.2,
//! §4.4.4 "a `Render`-category child moves STOPPED back to STARTED"). Draws
//! a textured quad: a vertex buffer, a program compiled from caller-supplied
//! shader source, a pipeline built against whatever rendertarget layout
//! `prepare` hands it, and a bind group sampling one child `Texture` node.

use crate::draw::DrawContext;
use crate::node::{new_node_ref, Category, Node, NodeBase, NodeRef, RttBehavior};
use crate::nodes::texture::Texture as TextureNode;
use crate::prepare::PrepareContext;
use ngl_gpu::bindgroup::{
    Access, BindGroup, BindGroupLayout, BindGroupLayoutEntry, BindingKind, BufferBinding, ShaderStageFlags,
    TextureBinding,
};
use ngl_gpu::buffer::{BlockBuffer, TypedBuffer};
use ngl_gpu::context::GraphicsPipelineHandle;
use ngl_gpu::pipeline::{
    GraphicsState, PipelineDescriptor, PipelineType, PrimitiveTopology, VertexAttribute, VertexBufferLayout,
    VertexFormat, VertexStepMode,
};
use ngl_gpu::resource::{BufferDescriptor, BufferUsage, SamplerState};
use ngl_gpu::Ref;
use ngl_util::block::{Block, BlockLayout, FieldData, FieldType};
use ngl_util::Result;

/// The model-matrix uniform block: one `mat4` field, laid out std140 (§3.4)
/// so its byte offset is predictable regardless of how many fields a future
/// revision adds ahead of it.
fn model_block() -> Block {
    let mut block = Block::new(BlockLayout::Std140);
    block.add_field("model", FieldType::Mat4, None).expect("a fresh block always accepts its first field");
    block
}

/// Interleaved position (xy) + texcoord (uv) for a unit quad, two triangles.
const QUAD_VERTICES: [f32; 24] = [
    -1.0, -1.0, 0.0, 0.0, //
    1.0, -1.0, 1.0, 0.0, //
    1.0, 1.0, 1.0, 1.0, //
    -1.0, -1.0, 0.0, 0.0, //
    1.0, 1.0, 1.0, 1.0, //
    -1.0, 1.0, 0.0, 1.0, //
];

struct Built {
    pipeline: Ref<GraphicsPipelineHandle>,
    bindgroup_layout: Ref<BindGroupLayout>,
}

struct Activated {
    vertex_buffer: TypedBuffer<f32>,
    model_buffer: BlockBuffer,
    bindgroup: BindGroup,
}

#[derive(Debug)]
pub struct TexturedShape {
    base: NodeBase,
    texture: NodeRef,
    vertex_src: String,
    fragment_src: String,
    state: GraphicsState,
    built: Option<Built>,
    activated: Option<Activated>,
}

impl TexturedShape {
    pub fn new(
        label: impl Into<String>,
        texture: NodeRef,
        vertex_src: impl Into<String>,
        fragment_src: impl Into<String>,
        state: GraphicsState,
    ) -> NodeRef {
        let node = new_node_ref(TexturedShape {
            base: NodeBase::new(label),
            texture: texture.clone(),
            vertex_src: vertex_src.into(),
            fragment_src: fragment_src.into(),
            state,
            built: None,
            activated: None,
        });
        texture.borrow().base().add_parent(&node);
        node
    }

    fn bindgroup_layout_desc() -> BindGroupLayout {
        BindGroupLayout {
            textures: vec![BindGroupLayoutEntry {
                id: 0,
                kind: BindingKind::Texture,
                binding: 0,
                access: Access::Read,
                stages: ShaderStageFlags::FRAGMENT,
                immutable_sampler: false,
            }],
            buffers: vec![BindGroupLayoutEntry {
                id: 1,
                kind: BindingKind::Buffer,
                binding: 1,
                access: Access::Read,
                stages: ShaderStageFlags::VERTEX,
                immutable_sampler: false,
            }],
            nb_dynamic_offsets: 0,
        }
    }
}

impl Node for TexturedShape {
    fn category(&self) -> Category {
        Category::Render
    }
    fn base(&self) -> &NodeBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }
    fn children(&self) -> Vec<NodeRef> {
        vec![self.texture.clone()]
    }
    fn rtt_behavior(&self) -> RttBehavior {
        RttBehavior::StartsPass
    }

    /// Compiles the program and builds the pipeline against the layout the
    /// enclosing `RenderToTexture` (or the root) collected (§4.4.1 PREPARED).
    /// The baked-in `GraphicsState` is this node's own state with every
    /// ancestor `GraphicConfig` override merged on top (§3.3) — the pipeline
    /// is immutable once built, so that merge has to happen here rather
    /// than at draw time.
    fn prepare(&mut self, ctx: &mut PrepareContext) -> Result<()> {
        let program = ctx.gpu.create_program(&self.vertex_src, &self.fragment_src)?;
        let bindgroup_layout = Ref::new(Self::bindgroup_layout_desc());
        let vertex_buffers = vec![VertexBufferLayout {
            stride: 4 * std::mem::size_of::<f32>() as u32,
            step_mode: VertexStepMode::Vertex,
            attributes: vec![
                VertexAttribute { location: 0, format: VertexFormat::Float32x2, offset: 0 },
                VertexAttribute { location: 1, format: VertexFormat::Float32x2, offset: 8 },
            ],
        }];
        let state = ctx.graphics_state_stack.effective_over(self.state);
        let pipeline = ctx.gpu.create_pipeline(PipelineDescriptor {
            ty: PipelineType::Graphics,
            program,
            topology: PrimitiveTopology::TriangleList,
            state,
            rendertarget_layout: ctx.rendertarget_layout.clone(),
            vertex_buffers,
            bindgroup_layout: bindgroup_layout.clone(),
            color_formats: ctx.rendertarget_layout.colors.iter().map(|c| c.format).collect(),
        })?;
        self.built = Some(Built { pipeline, bindgroup_layout });
        Ok(())
    }

    fn prefetch(&mut self, gpu: &mut ngl_gpu::context::GpuContext) -> Result<()> {
        let built = self.built.as_ref().expect("prefetch called before prepare");
        let vertex_buffer = gpu.create_buffer(BufferDescriptor {
            size: (QUAD_VERTICES.len() * std::mem::size_of::<f32>()) as u64,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        })?;
        let typed_vertex = TypedBuffer::<f32>::new(vertex_buffer);
        typed_vertex.upload(0, &QUAD_VERTICES)?;

        let block = model_block();
        let model_buffer_size = block.size(None) as u64;
        let model_buffer = gpu.create_buffer(BufferDescriptor {
            size: model_buffer_size,
            usage: BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST | BufferUsage::DYNAMIC,
        })?;
        let model_block_buffer = BlockBuffer::new(model_buffer, block);

        let mut bindgroup = BindGroup::new(built.bindgroup_layout.clone());
        bindgroup.update_buffer(
            0,
            BufferBinding { buffer: model_block_buffer.untyped.clone(), offset: 0, size: model_buffer_size },
        );

        self.activated = Some(Activated { vertex_buffer: typed_vertex, model_buffer: model_block_buffer, bindgroup });
        Ok(())
    }

    fn release(&mut self) {
        self.activated = None;
    }

    /// Draws the quad using whatever texture handle the child `Texture`
    /// resolves to for this frame's time `t` (§4.4.5); the bind group is
    /// refilled here rather than in `update` because mapping a `Media`
    /// frame needs a live `GpuContext`, which only `draw` carries (§5: a
    /// bind group may only be refilled between two draws in the same
    /// frame as those draws, which this still satisfies).
    fn draw(&mut self, ctx: &mut DrawContext) -> Result<()> {
        self.texture
            .borrow_mut()
            .downcast_mut::<TextureNode>()
            .expect("TexturedShape's child must be a Texture node")
            .ensure_mapped(ctx.gpu, ctx.t)?;
        let handle = self.texture.borrow().downcast_ref::<TextureNode>().and_then(TextureNode::handle);

        let built = self.built.as_ref().expect("draw called before prepare");
        let activated = self.activated.as_mut().expect("draw called before activation");
        if let Some(texture) = handle {
            activated
                .bindgroup
                .update_texture(0, TextureBinding { texture, sampler: SamplerState::default() });
        }
        let model_matrix = ctx.model_matrix();
        // SAFETY: `[f32; 16]` has no padding and is valid for any bit pattern.
        let model_bytes = unsafe {
            std::slice::from_raw_parts(model_matrix.as_ptr() as *const u8, std::mem::size_of::<[f32; 16]>())
        };
        activated.model_buffer.upload_fields(0, &[FieldData { data: model_bytes, count: None }])?;

        ctx.ensure_pass_open()?;
        ctx.gpu.set_pipeline(built.pipeline.clone());
        ctx.gpu.set_bindgroup(&activated.bindgroup, &[])?;
        ctx.gpu.set_vertex_buffer(0, activated.vertex_buffer.untyped.clone(), 0);
        ctx.gpu.draw(6, 1, 0, 0)?;
        Ok(())
    }
}
