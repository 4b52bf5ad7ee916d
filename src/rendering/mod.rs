//! The declarative description of GPU work.
//!
//! A [Submission] holds command encoders, a [CommandEncoder] holds passes and a render pass holds
//! the objects it draws. These are plain values that are built fresh for every frame and handed to
//! [RenderDevice::submit], which turns them into WebGL calls.
//!
//! [RenderDevice::submit]: crate::runtime::RenderDevice::submit
use fnv::FnvHashMap;

use crate::image::renderbuffer::RenderbufferId;
use crate::image::texture::{TextureId, TextureView};
use crate::pipeline::{BindingResource, PipelineId};
use crate::transform_feedback::TransformFeedbackId;
use crate::vertex::{IndexBuffer, VertexAttribute};

pub mod copy;
mod draw;
pub(crate) mod framebuffer_cache;
pub(crate) mod multisample;
pub mod query;
mod render_pass;

pub use self::copy::{
    BlitFramebufferPass, BlitMask, CopyBufferToBufferPass, CopyError, CopyTextureToTexturePass,
    FramebufferAttachments, ImageCopyTexture,
};
pub use self::query::{QueryId, QueryResult};

/// A rectangle in framebuffer pixels, with the origin in the lower left corner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]`, as `viewport` and `scissor` expect.
    pub(crate) fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width as i32, self.height as i32]
    }

    /// `[x0, y0, x1, y1]`, as `blitFramebuffer` expects.
    pub(crate) fn corners(&self) -> [i32; 4] {
        [
            self.x,
            self.y,
            self.x + self.width as i32,
            self.y + self.height as i32,
        ]
    }
}

/// An image that can be rendered to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AttachmentView {
    /// The default framebuffer of the canvas.
    Canvas,
    Texture(TextureView),
    Renderbuffer(RenderbufferId),
}

impl From<TextureView> for AttachmentView {
    fn from(view: TextureView) -> Self {
        AttachmentView::Texture(view)
    }
}

impl From<TextureId> for AttachmentView {
    fn from(texture: TextureId) -> Self {
        AttachmentView::Texture(texture.into())
    }
}

impl From<RenderbufferId> for AttachmentView {
    fn from(renderbuffer: RenderbufferId) -> Self {
        AttachmentView::Renderbuffer(renderbuffer)
    }
}

/// What happens to an attachment's contents when a pass begins.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LoadOp {
    /// Keep the current contents.
    Load,

    /// Clear to the attachment's clear value.
    Clear,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ColorAttachment {
    pub view: AttachmentView,

    /// Converted to integers for integer formats.
    pub clear_value: [f32; 4],

    pub load_op: LoadOp,
}

impl ColorAttachment {
    pub fn new<V>(view: V) -> Self
    where
        V: Into<AttachmentView>,
    {
        ColorAttachment {
            view: view.into(),
            clear_value: [0.0; 4],
            load_op: LoadOp::Load,
        }
    }

    pub fn canvas() -> Self {
        ColorAttachment::new(AttachmentView::Canvas)
    }

    pub fn clear(mut self, value: [f32; 4]) -> Self {
        self.clear_value = value;
        self.load_op = LoadOp::Clear;

        self
    }
}

/// The depth and/or stencil attachment of a pass. Depth and stencil are cleared independently.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DepthStencilAttachment {
    pub view: AttachmentView,
    pub depth_clear_value: f32,
    pub depth_load_op: LoadOp,
    pub stencil_clear_value: i32,
    pub stencil_load_op: LoadOp,
}

impl DepthStencilAttachment {
    pub fn new<V>(view: V) -> Self
    where
        V: Into<AttachmentView>,
    {
        DepthStencilAttachment {
            view: view.into(),
            depth_clear_value: 1.0,
            depth_load_op: LoadOp::Load,
            stencil_clear_value: 0,
            stencil_load_op: LoadOp::Load,
        }
    }

    pub fn canvas() -> Self {
        DepthStencilAttachment::new(AttachmentView::Canvas)
    }

    pub fn clear_depth(mut self, value: f32) -> Self {
        self.depth_clear_value = value;
        self.depth_load_op = LoadOp::Clear;

        self
    }

    pub fn clear_stencil(mut self, value: i32) -> Self {
        self.stencil_clear_value = value;
        self.stencil_load_op = LoadOp::Clear;

        self
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct RenderPassDescriptor {
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,

    /// More than 1 renders into multisampled renderbuffers that are resolved into the color
    /// attachments when the pass ends (WebGL 2.0 only).
    pub sample_count: u32,
}

impl RenderPassDescriptor {
    pub fn new() -> Self {
        RenderPassDescriptor {
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            sample_count: 1,
        }
    }

    pub fn color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);

        self
    }

    pub fn depth_stencil_attachment(mut self, attachment: DepthStencilAttachment) -> Self {
        self.depth_stencil_attachment = Some(attachment);

        self
    }

    pub fn sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;

        self
    }
}

impl Default for RenderPassDescriptor {
    fn default() -> Self {
        RenderPassDescriptor::new()
    }
}

/// How many vertices (or indices) and instances a draw consumes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DrawSpec {
    /// Forces an indexed (`Some(true)`) or non-indexed (`Some(false)`) draw; by default a draw is
    /// indexed if the object has an index buffer.
    pub indexed: Option<bool>,

    /// Defaults to every vertex (or index) available.
    pub count: Option<u32>,

    pub instance_count: u32,

    /// The first vertex, or the first index for indexed draws.
    pub first: u32,
}

impl Default for DrawSpec {
    fn default() -> Self {
        DrawSpec {
            indexed: None,
            count: None,
            instance_count: 1,
            first: 0,
        }
    }
}

/// A single draw: a pipeline with everything bound to it.
#[derive(Clone, PartialEq, Debug)]
pub struct RenderObject {
    pub pipeline: PipelineId,

    /// Vertex attributes by the name of the attribute in the vertex shader.
    pub attributes: FnvHashMap<String, VertexAttribute>,

    pub index_buffer: Option<IndexBuffer>,
    pub draw: DrawSpec,

    /// Values for the program's uniforms and uniform blocks, by name.
    pub bindings: FnvHashMap<String, BindingResource>,

    pub transform_feedback: Option<TransformFeedbackId>,
}

impl RenderObject {
    pub fn new(pipeline: PipelineId) -> Self {
        RenderObject {
            pipeline,
            attributes: FnvHashMap::default(),
            index_buffer: None,
            draw: DrawSpec::default(),
            bindings: FnvHashMap::default(),
            transform_feedback: None,
        }
    }

    pub fn attribute<S>(mut self, name: S, attribute: VertexAttribute) -> Self
    where
        S: Into<String>,
    {
        self.attributes.insert(name.into(), attribute);

        self
    }

    pub fn index_buffer(mut self, index_buffer: IndexBuffer) -> Self {
        self.index_buffer = Some(index_buffer);

        self
    }

    pub fn binding<S, R>(mut self, name: S, resource: R) -> Self
    where
        S: Into<String>,
        R: Into<BindingResource>,
    {
        self.bindings.insert(name.into(), resource.into());

        self
    }

    pub fn draw(mut self, draw: DrawSpec) -> Self {
        self.draw = draw;

        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.draw.count = Some(count);

        self
    }

    pub fn instance_count(mut self, instance_count: u32) -> Self {
        self.draw.instance_count = instance_count;

        self
    }

    pub fn transform_feedback(mut self, transform_feedback: TransformFeedbackId) -> Self {
        self.transform_feedback = Some(transform_feedback);

        self
    }
}

/// An entry in a render pass, executed in order.
#[derive(Clone, PartialEq, Debug)]
pub enum PassObject {
    Viewport(Rect),

    /// Enables the scissor test with this rectangle for the rest of the pass.
    ScissorRect(Rect),

    /// Draws the objects while counting whether any of their samples passed the depth test.
    OcclusionQuery {
        query: QueryId,
        objects: Vec<RenderObject>,
    },

    Draw(RenderObject),
}

impl From<RenderObject> for PassObject {
    fn from(object: RenderObject) -> Self {
        PassObject::Draw(object)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct RenderPassEncoder {
    pub descriptor: RenderPassDescriptor,
    pub objects: Vec<PassObject>,
}

impl RenderPassEncoder {
    pub fn new(descriptor: RenderPassDescriptor) -> Self {
        RenderPassEncoder {
            descriptor,
            objects: Vec::new(),
        }
    }

    pub fn object<O>(mut self, object: O) -> Self
    where
        O: Into<PassObject>,
    {
        self.objects.push(object.into());

        self
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum PassEncoder {
    RenderPass(RenderPassEncoder),
    BlitFramebuffer(BlitFramebufferPass),
    CopyTextureToTexture(CopyTextureToTexturePass),
    CopyBufferToBuffer(CopyBufferToBufferPass),
}

impl From<RenderPassEncoder> for PassEncoder {
    fn from(pass: RenderPassEncoder) -> Self {
        PassEncoder::RenderPass(pass)
    }
}

impl From<BlitFramebufferPass> for PassEncoder {
    fn from(pass: BlitFramebufferPass) -> Self {
        PassEncoder::BlitFramebuffer(pass)
    }
}

impl From<CopyTextureToTexturePass> for PassEncoder {
    fn from(pass: CopyTextureToTexturePass) -> Self {
        PassEncoder::CopyTextureToTexture(pass)
    }
}

impl From<CopyBufferToBufferPass> for PassEncoder {
    fn from(pass: CopyBufferToBufferPass) -> Self {
        PassEncoder::CopyBufferToBuffer(pass)
    }
}

#[derive(Clone, PartialEq, Default, Debug)]
pub struct CommandEncoder {
    pub passes: Vec<PassEncoder>,
}

impl CommandEncoder {
    pub fn new() -> Self {
        CommandEncoder { passes: Vec::new() }
    }

    pub fn pass<P>(mut self, pass: P) -> Self
    where
        P: Into<PassEncoder>,
    {
        self.passes.push(pass.into());

        self
    }
}

#[derive(Clone, PartialEq, Default, Debug)]
pub struct Submission {
    pub command_encoders: Vec<CommandEncoder>,
}

impl Submission {
    pub fn new() -> Self {
        Submission {
            command_encoders: Vec::new(),
        }
    }

    pub fn encoder(mut self, encoder: CommandEncoder) -> Self {
        self.command_encoders.push(encoder);

        self
    }
}
