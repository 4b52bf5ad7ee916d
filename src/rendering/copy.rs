//! Passes that copy data between images and between buffers (WebGL 2.0 only).
//!
//! Image copies are expressed as framebuffer blits: the source image is attached to the read
//! framebuffer, the destination image to the draw framebuffer.
use thiserror::Error;
use web_sys::WebGl2RenderingContext as Gl;

use crate::buffer::BufferId;
use crate::image::format::Aspect;
use crate::image::texture::{TextureId, TextureView};
use crate::rendering::framebuffer_cache::{AttachmentImage, FramebufferTarget, RenderTarget};
use crate::rendering::{AttachmentView, Rect};
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::sampler::FilterMode;

#[derive(Clone, PartialEq, Debug, Error)]
pub enum CopyError {
    #[error("cannot copy a {source_aspect:?} image into a {destination_aspect:?} image")]
    AspectMismatch {
        source_aspect: Aspect,
        destination_aspect: Aspect,
    },
}

/// Which buffers a blit copies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlitMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

impl BlitMask {
    pub const COLOR: BlitMask = BlitMask {
        color: true,
        depth: false,
        stencil: false,
    };

    pub const DEPTH: BlitMask = BlitMask {
        color: false,
        depth: true,
        stencil: false,
    };

    pub const STENCIL: BlitMask = BlitMask {
        color: false,
        depth: false,
        stencil: true,
    };

    pub const ALL: BlitMask = BlitMask {
        color: true,
        depth: true,
        stencil: true,
    };

    fn bits(&self) -> u32 {
        let mut bits = 0;

        if self.color {
            bits |= Gl::COLOR_BUFFER_BIT;
        }

        if self.depth {
            bits |= Gl::DEPTH_BUFFER_BIT;
        }

        if self.stencil {
            bits |= Gl::STENCIL_BUFFER_BIT;
        }

        bits
    }
}

/// The images of one side of a blit.
#[derive(Clone, PartialEq, Debug)]
pub struct FramebufferAttachments {
    pub color: Vec<AttachmentView>,
    pub depth_stencil: Option<AttachmentView>,
}

impl FramebufferAttachments {
    pub fn new() -> Self {
        FramebufferAttachments {
            color: Vec::new(),
            depth_stencil: None,
        }
    }

    /// The default framebuffer.
    pub fn canvas() -> Self {
        FramebufferAttachments {
            color: vec![AttachmentView::Canvas],
            depth_stencil: None,
        }
    }

    pub fn color<V>(mut self, view: V) -> Self
    where
        V: Into<AttachmentView>,
    {
        self.color.push(view.into());

        self
    }

    pub fn depth_stencil<V>(mut self, view: V) -> Self
    where
        V: Into<AttachmentView>,
    {
        self.depth_stencil = Some(view.into());

        self
    }
}

impl Default for FramebufferAttachments {
    fn default() -> Self {
        FramebufferAttachments::new()
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct BlitFramebufferPass {
    pub source: FramebufferAttachments,
    pub destination: FramebufferAttachments,
    pub source_rect: Rect,
    pub destination_rect: Rect,
    pub mask: BlitMask,

    /// Only [FilterMode::Nearest] is valid when the mask includes depth or stencil.
    pub filter: FilterMode,
}

/// One side of a texture copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ImageCopyTexture {
    /// `None` is the canvas.
    pub texture: Option<TextureId>,
    pub mip_level: u32,
    pub layer: u32,
    pub origin: (i32, i32),
}

impl ImageCopyTexture {
    pub fn canvas() -> Self {
        ImageCopyTexture {
            texture: None,
            mip_level: 0,
            layer: 0,
            origin: (0, 0),
        }
    }

    pub fn origin(mut self, x: i32, y: i32) -> Self {
        self.origin = (x, y);

        self
    }
}

impl From<TextureId> for ImageCopyTexture {
    fn from(texture: TextureId) -> Self {
        ImageCopyTexture {
            texture: Some(texture),
            ..ImageCopyTexture::canvas()
        }
    }
}

impl From<TextureView> for ImageCopyTexture {
    fn from(view: TextureView) -> Self {
        ImageCopyTexture {
            texture: Some(view.texture),
            mip_level: view.mip_level,
            layer: view.layer,
            origin: (0, 0),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CopyTextureToTexturePass {
    pub source: ImageCopyTexture,
    pub destination: ImageCopyTexture,

    /// Width and height of the copied region.
    pub copy_size: (u32, u32),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CopyBufferToBufferPass {
    pub source: BufferId,
    pub source_offset: u32,
    pub destination: BufferId,
    pub destination_offset: u32,

    /// Defaults to the remainder of the source buffer after `source_offset`.
    pub size: Option<u32>,
}

impl CopyBufferToBufferPass {
    pub fn new(source: BufferId, destination: BufferId) -> Self {
        CopyBufferToBufferPass {
            source,
            source_offset: 0,
            destination,
            destination_offset: 0,
            size: None,
        }
    }
}

/// Blits are affected by the scissor test and the color write mask.
pub(crate) fn prepare_blit<B>(gl: &B, state: &mut DynamicState<B>)
where
    B: Backend,
{
    state.set_scissor_test_enabled(false).apply(gl);
    state.set_color_mask([true; 4]).apply(gl);
}

fn single_image_target<B>(image: Option<AttachmentImage<B>>) -> RenderTarget<B>
where
    B: Backend,
{
    match image {
        None => RenderTarget::Canvas,
        Some(image) if image.aspect() == Aspect::Color => RenderTarget::Framebuffer {
            color: vec![image],
            depth_stencil: None,
        },
        Some(image) => RenderTarget::Framebuffer {
            color: Vec::new(),
            depth_stencil: Some(image),
        },
    }
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub(crate) fn blit_framebuffer(&mut self, pass: &BlitFramebufferPass) -> Result<(), SubmitError> {
        if !self.gl.version().is_webgl2() {
            log::error!("Framebuffer blits require WebGL 2.0; skipping the pass.");

            return Ok(());
        }

        let source = self.resolve_target(&pass.source.color, pass.source.depth_stencil.as_ref())?;
        let destination = self.resolve_target(
            &pass.destination.color,
            pass.destination.depth_stencil.as_ref(),
        )?;

        let (source, destination) = match (source, destination) {
            (Some(source), Some(destination)) => (source, destination),
            _ => {
                log::error!("Skipping a blit pass with missing attachments.");

                return Ok(());
            }
        };

        self.bind_target(&source, FramebufferTarget::Read)?;
        self.bind_target(&destination, FramebufferTarget::Draw)?;

        prepare_blit(&self.gl, &mut self.state);

        self.gl.blit_framebuffer(
            pass.source_rect.corners(),
            pass.destination_rect.corners(),
            pass.mask.bits(),
            pass.filter.id(),
        );

        Ok(())
    }

    pub(crate) fn copy_texture_to_texture(
        &mut self,
        pass: &CopyTextureToTexturePass,
    ) -> Result<(), SubmitError> {
        if !self.gl.version().is_webgl2() {
            log::error!("Texture copies require WebGL 2.0; skipping the pass.");

            return Ok(());
        }

        let source = match self.copy_image(&pass.source)? {
            Some(image) => image,
            None => return Ok(()),
        };
        let destination = match self.copy_image(&pass.destination)? {
            Some(image) => image,
            None => return Ok(()),
        };

        let source_aspect = source.as_ref().map_or(Aspect::Color, |i| i.aspect());
        let destination_aspect = destination.as_ref().map_or(Aspect::Color, |i| i.aspect());

        if source_aspect != destination_aspect {
            return Err(CopyError::AspectMismatch {
                source_aspect,
                destination_aspect,
            }
            .into());
        }

        self.bind_target(&single_image_target(source), FramebufferTarget::Read)?;
        self.bind_target(&single_image_target(destination), FramebufferTarget::Draw)?;

        prepare_blit(&self.gl, &mut self.state);

        let (width, height) = pass.copy_size;
        let region = |(x, y): (i32, i32)| Rect::new(x, y, width, height).corners();

        self.gl.blit_framebuffer(
            region(pass.source.origin),
            region(pass.destination.origin),
            source_aspect.buffer_mask(),
            Gl::NEAREST,
        );

        Ok(())
    }

    /// The image for one side of a texture copy: `Some(None)` for the canvas, `None` if the
    /// texture is missing.
    fn copy_image(
        &mut self,
        side: &ImageCopyTexture,
    ) -> Result<Option<Option<AttachmentImage<B>>>, SubmitError> {
        let texture = match side.texture {
            Some(texture) => texture,
            None => return Ok(Some(None)),
        };

        let view = TextureView {
            texture,
            mip_level: side.mip_level,
            layer: side.layer,
        };

        match self.texture_image(&view)? {
            Some(image) => Ok(Some(Some(image))),
            None => {
                log::error!("Skipping a texture copy: texture {:?} is missing.", texture);

                Ok(None)
            }
        }
    }

    pub(crate) fn copy_buffer_to_buffer(
        &mut self,
        pass: &CopyBufferToBufferPass,
    ) -> Result<(), SubmitError> {
        if !self.gl.version().is_webgl2() {
            log::error!("Buffer copies require WebGL 2.0; skipping the pass.");

            return Ok(());
        }

        let source = self.prepare_buffer(pass.source)?;
        let destination = self.prepare_buffer(pass.destination)?;

        let RenderDevice {
            gl, state, buffers, ..
        } = self;

        let objects = source
            .zip(destination)
            .and_then(|(s, d)| Some((buffers.get(&s)?.object()?, buffers.get(&d)?.object()?)));

        let (source, destination) = match objects {
            Some(objects) => objects,
            None => {
                log::error!("Skipping a buffer copy with a missing buffer.");

                return Ok(());
            }
        };

        let size = pass
            .size
            .unwrap_or_else(|| source.size.saturating_sub(pass.source_offset));

        state
            .set_bound_copy_read_buffer(Some((source.key, &source.handle)))
            .apply(gl);
        state
            .set_bound_copy_write_buffer(Some((destination.key, &destination.handle)))
            .apply(gl);

        gl.copy_buffer_sub_data(
            Gl::COPY_READ_BUFFER,
            Gl::COPY_WRITE_BUFFER,
            pass.source_offset,
            pass.destination_offset,
            size,
        );

        Ok(())
    }
}
