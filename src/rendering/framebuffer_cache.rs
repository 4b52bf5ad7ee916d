use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::format::{Aspect, TextureFormat};
use crate::image::renderbuffer::RenderbufferId;
use crate::image::texture::TextureView;
use crate::rendering::AttachmentView;
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::next_object_key;

/// The GL object behind an attachment.
pub(crate) enum ImageObject<B>
where
    B: Backend,
{
    Texture {
        handle: B::Texture,
        /// The `framebufferTexture2D` target; selects the face of a cube map.
        image_target: u32,
        layered: bool,
    },
    Renderbuffer(B::Renderbuffer),
}

/// A single image of a texture or renderbuffer, ready to be attached to a framebuffer.
pub(crate) struct AttachmentImage<B>
where
    B: Backend,
{
    /// The key of the texture or renderbuffer object.
    pub(crate) key: u64,
    pub(crate) object: ImageObject<B>,
    pub(crate) mip_level: u32,
    pub(crate) layer: u32,
    pub(crate) format: TextureFormat,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl<B> AttachmentImage<B>
where
    B: Backend,
{
    pub(crate) fn aspect(&self) -> Aspect {
        self.format.aspect()
    }

    fn attach(&self, gl: &B, target: u32, attachment: u32) {
        match &self.object {
            ImageObject::Texture {
                handle,
                layered: true,
                ..
            } => gl.framebuffer_texture_layer(target, attachment, handle, self.mip_level, self.layer),
            ImageObject::Texture {
                handle,
                image_target,
                ..
            } => gl.framebuffer_texture_2d(target, attachment, *image_target, handle, self.mip_level),
            ImageObject::Renderbuffer(handle) => {
                gl.framebuffer_renderbuffer(target, attachment, handle)
            }
        }
    }
}

/// Where a pass renders to or a blit reads from.
pub(crate) enum RenderTarget<B>
where
    B: Backend,
{
    Canvas,
    Framebuffer {
        color: Vec<AttachmentImage<B>>,
        depth_stencil: Option<AttachmentImage<B>>,
    },
}

impl<B> RenderTarget<B>
where
    B: Backend,
{
    /// The size of the area that is rendered to: the smallest attachment, or the drawing buffer
    /// for the canvas.
    pub(crate) fn size(&self, gl: &B) -> (u32, u32) {
        match self {
            RenderTarget::Canvas => gl.drawing_buffer_size(),
            RenderTarget::Framebuffer {
                color,
                depth_stencil,
            } => color
                .iter()
                .chain(depth_stencil.iter())
                .map(|image| (image.width, image.height))
                .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1)))
                .unwrap_or((0, 0)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum FramebufferTarget {
    Draw,
    Read,
}

impl FramebufferTarget {
    fn id(&self, webgl2: bool) -> u32 {
        match (self, webgl2) {
            (_, false) => Gl::FRAMEBUFFER,
            (FramebufferTarget::Draw, true) => Gl::DRAW_FRAMEBUFFER,
            (FramebufferTarget::Read, true) => Gl::READ_FRAMEBUFFER,
        }
    }
}

/// Attachment point, image object key, mip level and layer.
type AttachmentKey = (u32, u64, u32, u32);

struct FramebufferObject<B>
where
    B: Backend,
{
    key: u64,
    handle: B::Framebuffer,
}

/// Framebuffer objects, one per distinct set of attached images.
pub(crate) struct FramebufferCache<B>
where
    B: Backend,
{
    framebuffers: FnvHashMap<Vec<AttachmentKey>, FramebufferObject<B>>,
}

impl<B> FramebufferCache<B>
where
    B: Backend,
{
    pub(crate) fn new() -> Self {
        FramebufferCache {
            framebuffers: FnvHashMap::default(),
        }
    }

    /// Binds the framebuffer for the given attachments to `target`, creating it first if no
    /// framebuffer exists for this exact set of images yet.
    pub(crate) fn bind(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        color: &[AttachmentImage<B>],
        depth_stencil: Option<&AttachmentImage<B>>,
        target: FramebufferTarget,
    ) -> Result<(), SubmitError> {
        let webgl2 = gl.version().is_webgl2();

        let color = if !webgl2 && color.len() > 1 {
            log::warn!(
                "WebGL 1.0 supports a single color attachment; ignoring {} attachments.",
                color.len() - 1
            );

            &color[..1]
        } else {
            color
        };

        let mut attachments: Vec<(u32, &AttachmentImage<B>)> = color
            .iter()
            .enumerate()
            .map(|(index, image)| (Aspect::Color.attachment_point(index as u32), image))
            .collect();

        if let Some(image) = depth_stencil {
            attachments.push((image.aspect().attachment_point(0), image));
        }

        let cache_key: Vec<AttachmentKey> = attachments
            .iter()
            .map(|(point, image)| (*point, image.key, image.mip_level, image.layer))
            .collect();

        if !self.framebuffers.contains_key(&cache_key) {
            let object = create_framebuffer(gl, state, &attachments, color.len(), target)?;

            self.framebuffers.insert(cache_key.clone(), object);
        }

        if let Some(object) = self.framebuffers.get(&cache_key) {
            let framebuffer = Some((object.key, &object.handle));

            match target {
                FramebufferTarget::Draw => state.set_bound_draw_framebuffer(framebuffer).apply(gl),
                FramebufferTarget::Read => state.set_bound_read_framebuffer(framebuffer).apply(gl),
            }
        }

        Ok(())
    }

    /// Deletes every framebuffer that has the image object with the given key attached.
    pub(crate) fn remove_dependents(&mut self, gl: &B, state: &mut DynamicState<B>, key: u64) {
        self.framebuffers.retain(|attachments, object| {
            let dependent = attachments.iter().any(|(_, image, _, _)| *image == key);

            if dependent {
                unbind(gl, state, object.key);
                gl.delete_framebuffer(&object.handle);
            }

            !dependent
        });
    }

    pub(crate) fn clear(&mut self, gl: &B) {
        for (_, object) in self.framebuffers.drain() {
            gl.delete_framebuffer(&object.handle);
        }
    }

    pub(crate) fn forget(&mut self) {
        self.framebuffers.clear();
    }
}

fn unbind<B>(gl: &B, state: &mut DynamicState<B>, key: u64)
where
    B: Backend,
{
    if state.bound_draw_framebuffer() == Some(key) {
        state.set_bound_draw_framebuffer(None).apply(gl);
    }

    if state.bound_read_framebuffer() == Some(key) {
        state.set_bound_read_framebuffer(None).apply(gl);
    }
}

fn create_framebuffer<B>(
    gl: &B,
    state: &mut DynamicState<B>,
    attachments: &[(u32, &AttachmentImage<B>)],
    color_count: usize,
    target: FramebufferTarget,
) -> Result<FramebufferObject<B>, SubmitError>
where
    B: Backend,
{
    let webgl2 = gl.version().is_webgl2();
    let handle = gl
        .create_framebuffer()
        .ok_or(SubmitError::ObjectCreation("framebuffer"))?;
    let key = next_object_key();
    let target_id = target.id(webgl2);

    match target {
        FramebufferTarget::Draw => state
            .set_bound_draw_framebuffer(Some((key, &handle)))
            .apply(gl),
        FramebufferTarget::Read => state
            .set_bound_read_framebuffer(Some((key, &handle)))
            .apply(gl),
    }

    for (attachment, image) in attachments {
        image.attach(gl, target_id, *attachment);
    }

    // Draw buffers are framebuffer state, but `drawBuffers` only reaches the draw binding.
    if webgl2 && target == FramebufferTarget::Draw {
        let draw_buffers: Vec<u32> = if color_count == 0 {
            vec![Gl::NONE]
        } else {
            (0..color_count as u32)
                .map(|index| Gl::COLOR_ATTACHMENT0 + index)
                .collect()
        };

        gl.draw_buffers(&draw_buffers);
    }

    let status = gl.check_framebuffer_status(target_id);

    if status != Gl::FRAMEBUFFER_COMPLETE {
        unbind(gl, state, key);
        gl.delete_framebuffer(&handle);

        return Err(SubmitError::IncompleteFramebuffer(status));
    }

    log::debug!(
        "Created framebuffer with {} attachment(s).",
        attachments.len()
    );

    Ok(FramebufferObject { key, handle })
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    /// Resolves attachment views into the images they refer to, preparing textures and
    /// renderbuffers on the way. Returns `None` if a view refers to a missing resource, or if the
    /// canvas is mixed with other images (both are logged).
    pub(crate) fn resolve_target<'v, I>(
        &mut self,
        color: I,
        depth_stencil: Option<&AttachmentView>,
    ) -> Result<Option<RenderTarget<B>>, SubmitError>
    where
        I: IntoIterator<Item = &'v AttachmentView>,
    {
        let color: Vec<&AttachmentView> = color.into_iter().collect();
        let mut views = color.iter().copied().chain(depth_stencil);

        if views.clone().all(|view| *view == AttachmentView::Canvas) {
            return Ok(Some(RenderTarget::Canvas));
        }

        if views.any(|view| *view == AttachmentView::Canvas) {
            log::error!("The canvas cannot be combined with other attachments.");

            return Ok(None);
        }

        let mut color_images = Vec::with_capacity(color.len());

        for view in color {
            match self.attachment_image(view)? {
                Some(image) => color_images.push(image),
                None => return Ok(None),
            }
        }

        let depth_stencil = match depth_stencil {
            Some(view) => match self.attachment_image(view)? {
                Some(image) => Some(image),
                None => return Ok(None),
            },
            None => None,
        };

        Ok(Some(RenderTarget::Framebuffer {
            color: color_images,
            depth_stencil,
        }))
    }

    /// Binds the target to the draw (or read) framebuffer binding.
    pub(crate) fn bind_target(
        &mut self,
        target: &RenderTarget<B>,
        binding: FramebufferTarget,
    ) -> Result<(), SubmitError> {
        let RenderDevice {
            gl,
            state,
            framebuffers,
            ..
        } = self;

        match target {
            RenderTarget::Canvas => {
                match binding {
                    FramebufferTarget::Draw => state.set_bound_draw_framebuffer(None).apply(gl),
                    FramebufferTarget::Read => state.set_bound_read_framebuffer(None).apply(gl),
                }

                Ok(())
            }
            RenderTarget::Framebuffer {
                color,
                depth_stencil,
            } => framebuffers.bind(gl, state, color, depth_stencil.as_ref(), binding),
        }
    }

    fn attachment_image(
        &mut self,
        view: &AttachmentView,
    ) -> Result<Option<AttachmentImage<B>>, SubmitError> {
        match view {
            AttachmentView::Canvas => Ok(None),
            AttachmentView::Texture(view) => self.texture_image(view),
            AttachmentView::Renderbuffer(id) => self.renderbuffer_image(*id),
        }
    }

    pub(crate) fn texture_image(
        &mut self,
        view: &TextureView,
    ) -> Result<Option<AttachmentImage<B>>, SubmitError> {
        let index = match self.prepare_texture(view.texture)? {
            Some(index) => index,
            None => return Ok(None),
        };

        let entry = match self.textures.get(&index) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let object = match entry.object() {
            Some(object) => object,
            None => return Ok(None),
        };
        let dimension = entry.dimension();
        let (width, height) = object.level_size(view.mip_level);

        Ok(Some(AttachmentImage {
            key: object.key,
            object: ImageObject::Texture {
                handle: object.handle.clone(),
                image_target: dimension.image_target(view.layer),
                layered: dimension.is_layered(),
            },
            mip_level: view.mip_level,
            layer: view.layer,
            format: entry.format(),
            width,
            height,
        }))
    }

    fn renderbuffer_image(
        &mut self,
        id: RenderbufferId,
    ) -> Result<Option<AttachmentImage<B>>, SubmitError> {
        let index = match self.prepare_renderbuffer(id)? {
            Some(index) => index,
            None => return Ok(None),
        };

        let entry = match self.renderbuffers.get(&index) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let object = match entry.object() {
            Some(object) => object,
            None => return Ok(None),
        };
        let descriptor = entry.descriptor();

        Ok(Some(AttachmentImage {
            key: object.key,
            object: ImageObject::Renderbuffer(object.handle.clone()),
            mip_level: 0,
            layer: 0,
            format: descriptor.format,
            width: descriptor.width,
            height: descriptor.height,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::image::renderbuffer::RenderbufferDescriptor;
    use crate::image::texture::{TextureDescriptor, TextureDimension};
    use crate::runtime::recording::RecordingBackend;

    fn texture(device: &mut RenderDevice<RecordingBackend>) -> AttachmentView {
        device
            .create_texture(
                TextureDescriptor::new(TextureFormat::RGBA8, TextureDimension::D2).size(4, 4),
            )
            .into()
    }

    fn bind(
        device: &mut RenderDevice<RecordingBackend>,
        color: &[AttachmentView],
        depth_stencil: Option<&AttachmentView>,
    ) -> Result<(), SubmitError> {
        let target = device.resolve_target(color, depth_stencil)?.unwrap();

        device.bind_target(&target, FramebufferTarget::Draw)
    }

    #[test]
    fn test_framebuffers_are_cached_per_attachment_set() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let a = texture(&mut device);
        let b = texture(&mut device);

        bind(&mut device, &[a], None).unwrap();
        bind(&mut device, &[a], None).unwrap();
        bind(&mut device, &[a, b], None).unwrap();

        assert_eq!(device.gl.count("create_framebuffer"), 2);
        assert_eq!(
            device.gl.calls_named("draw_buffers"),
            vec![
                format!("[{}]", Gl::COLOR_ATTACHMENT0),
                format!("[{}, {}]", Gl::COLOR_ATTACHMENT0, Gl::COLOR_ATTACHMENT1),
            ]
        );
    }

    #[test]
    fn test_attachment_calls() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let color = texture(&mut device);
        let depth = AttachmentView::Renderbuffer(device.create_renderbuffer(
            RenderbufferDescriptor::new(TextureFormat::Depth24Stencil8, 4, 4),
        ));

        bind(&mut device, &[color], Some(&depth)).unwrap();

        // Texture 1 and renderbuffer 2 are created before framebuffer 3.
        assert_eq!(
            device.gl.calls_named("framebuffer_texture_2d"),
            vec![format!(
                "{} {} {} 1 0",
                Gl::DRAW_FRAMEBUFFER,
                Gl::COLOR_ATTACHMENT0,
                Gl::TEXTURE_2D
            )]
        );
        assert_eq!(
            device.gl.calls_named("framebuffer_renderbuffer"),
            vec![format!(
                "{} {} 2",
                Gl::DRAW_FRAMEBUFFER,
                Gl::DEPTH_STENCIL_ATTACHMENT
            )]
        );
    }

    #[test]
    fn test_incomplete_framebuffer() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let color = texture(&mut device);

        device
            .gl
            .set_framebuffer_status(Gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT);

        assert_eq!(
            bind(&mut device, &[color], None),
            Err(SubmitError::IncompleteFramebuffer(
                Gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
            ))
        );
        assert_eq!(device.gl.count("delete_framebuffer"), 1);
        assert_eq!(device.state.bound_draw_framebuffer(), None);
    }

    #[test]
    fn test_destroying_an_attachment_drops_the_framebuffer() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let color = texture(&mut device);

        bind(&mut device, &[color], None).unwrap();

        if let AttachmentView::Texture(view) = color {
            device.destroy_texture(view.texture);
        }

        assert_eq!(device.gl.count("delete_framebuffer"), 1);
        assert_eq!(device.state.bound_draw_framebuffer(), None);
    }

    #[test]
    fn test_canvas_cannot_be_mixed() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let color = texture(&mut device);

        assert!(device
            .resolve_target(&[color, AttachmentView::Canvas], None)
            .unwrap()
            .is_none());
        assert!(matches!(
            device.resolve_target(&[AttachmentView::Canvas], None),
            Ok(Some(RenderTarget::Canvas))
        ));
    }

    #[test]
    fn test_webgl1_uses_a_single_color_attachment() {
        let mut device = RenderDevice::new(RecordingBackend::webgl1());
        let a = texture(&mut device);
        let b = texture(&mut device);

        bind(&mut device, &[a, b], None).unwrap();

        assert_eq!(device.gl.count("framebuffer_texture_2d"), 1);
        assert_eq!(device.gl.count("draw_buffers"), 0);
        assert_eq!(
            device.gl.calls_named("check_framebuffer_status"),
            vec![Gl::FRAMEBUFFER.to_string()]
        );
    }
}
