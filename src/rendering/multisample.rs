//! Multisampled rendering into textures (WebGL 2.0 only).
//!
//! Textures cannot be multisampled in WebGL. A pass with a sample count above 1 renders into
//! multisampled renderbuffers of the same formats and sizes instead; when the pass ends every
//! color renderbuffer is blitted into its texture, which resolves the samples.
use std::slice;

use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::renderbuffer::{allocate_renderbuffer, RenderbufferDescriptor};
use crate::rendering::copy::prepare_blit;
use crate::rendering::framebuffer_cache::{
    AttachmentImage, FramebufferCache, FramebufferTarget, ImageObject,
};
use crate::runtime::state::DynamicState;
use crate::runtime::{Backend, SubmitError};

/// Destination image keys with their mip level and layer, and the sample count.
type TargetKey = (Vec<(u64, u32, u32)>, u32);

struct MultisampleTarget<B>
where
    B: Backend,
{
    color: Vec<AttachmentImage<B>>,
    depth_stencil: Option<AttachmentImage<B>>,
}

impl<B> MultisampleTarget<B>
where
    B: Backend,
{
    fn images(&self) -> impl Iterator<Item = &AttachmentImage<B>> {
        self.color.iter().chain(self.depth_stencil.iter())
    }
}

/// Multisampled renderbuffers for sets of destination images, with the framebuffers that have
/// them attached.
pub(crate) struct MultisampleCache<B>
where
    B: Backend,
{
    targets: FnvHashMap<TargetKey, MultisampleTarget<B>>,
    framebuffers: FramebufferCache<B>,
}

impl<B> MultisampleCache<B>
where
    B: Backend,
{
    pub(crate) fn new() -> Self {
        MultisampleCache {
            targets: FnvHashMap::default(),
            framebuffers: FramebufferCache::new(),
        }
    }

    /// Binds a multisampled framebuffer that mirrors the given attachments for drawing.
    pub(crate) fn bind(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        color: &[AttachmentImage<B>],
        depth_stencil: Option<&AttachmentImage<B>>,
        samples: u32,
    ) -> Result<(), SubmitError> {
        let key = target_key(color, depth_stencil, samples);

        if !self.targets.contains_key(&key) {
            let target = allocate_target(gl, state, color, depth_stencil, samples)?;

            self.targets.insert(key.clone(), target);
        }

        let MultisampleCache {
            targets,
            framebuffers,
        } = self;

        if let Some(target) = targets.get(&key) {
            framebuffers.bind(
                gl,
                state,
                &target.color,
                target.depth_stencil.as_ref(),
                FramebufferTarget::Draw,
            )?;
        }

        Ok(())
    }

    /// Blits every multisampled color renderbuffer into its destination image. `destination` is
    /// the cache that holds the framebuffers for the destination images.
    pub(crate) fn resolve(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        destination: &mut FramebufferCache<B>,
        color: &[AttachmentImage<B>],
        depth_stencil: Option<&AttachmentImage<B>>,
        samples: u32,
    ) -> Result<(), SubmitError> {
        let MultisampleCache {
            targets,
            framebuffers,
        } = self;

        let target = match targets.get(&target_key(color, depth_stencil, samples)) {
            Some(target) => target,
            None => return Ok(()),
        };

        prepare_blit(gl, state);

        for (source, image) in target.color.iter().zip(color) {
            framebuffers.bind(
                gl,
                state,
                slice::from_ref(source),
                None,
                FramebufferTarget::Read,
            )?;
            destination.bind(
                gl,
                state,
                slice::from_ref(image),
                None,
                FramebufferTarget::Draw,
            )?;

            let rect = [0, 0, image.width as i32, image.height as i32];

            gl.blit_framebuffer(rect, rect, Gl::COLOR_BUFFER_BIT, Gl::NEAREST);
        }

        Ok(())
    }

    /// Deletes the renderbuffers that mirror the image object with the given key.
    pub(crate) fn remove_dependents(&mut self, gl: &B, state: &mut DynamicState<B>, key: u64) {
        let MultisampleCache {
            targets,
            framebuffers,
        } = self;

        targets.retain(|(images, _), target| {
            let dependent = images.iter().any(|(image, _, _)| *image == key);

            if dependent {
                for image in target.images() {
                    framebuffers.remove_dependents(gl, state, image.key);
                    delete_image(gl, image);
                }
            }

            !dependent
        });
    }

    pub(crate) fn clear(&mut self, gl: &B) {
        self.framebuffers.clear(gl);

        for (_, target) in self.targets.drain() {
            target.images().for_each(|image| delete_image(gl, image));
        }
    }

    pub(crate) fn forget(&mut self) {
        self.framebuffers.forget();
        self.targets.clear();
    }
}

fn target_key<B>(
    color: &[AttachmentImage<B>],
    depth_stencil: Option<&AttachmentImage<B>>,
    samples: u32,
) -> TargetKey
where
    B: Backend,
{
    let images = color
        .iter()
        .chain(depth_stencil)
        .map(|image| (image.key, image.mip_level, image.layer))
        .collect();

    (images, samples)
}

fn allocate_target<B>(
    gl: &B,
    state: &mut DynamicState<B>,
    color: &[AttachmentImage<B>],
    depth_stencil: Option<&AttachmentImage<B>>,
    samples: u32,
) -> Result<MultisampleTarget<B>, SubmitError>
where
    B: Backend,
{
    let mut allocated = Vec::with_capacity(color.len());

    for image in color {
        match allocate_image(gl, state, image, samples) {
            Ok(renderbuffer) => allocated.push(renderbuffer),
            Err(err) => {
                allocated.iter().for_each(|image| delete_image(gl, image));

                return Err(err);
            }
        }
    }

    let depth_stencil = match depth_stencil {
        Some(image) => match allocate_image(gl, state, image, samples) {
            Ok(renderbuffer) => Some(renderbuffer),
            Err(err) => {
                allocated.iter().for_each(|image| delete_image(gl, image));

                return Err(err);
            }
        },
        None => None,
    };

    log::debug!(
        "Allocated {} multisampled renderbuffer(s) with {} samples.",
        allocated.len() + depth_stencil.iter().count(),
        samples
    );

    Ok(MultisampleTarget {
        color: allocated,
        depth_stencil,
    })
}

fn allocate_image<B>(
    gl: &B,
    state: &mut DynamicState<B>,
    image: &AttachmentImage<B>,
    samples: u32,
) -> Result<AttachmentImage<B>, SubmitError>
where
    B: Backend,
{
    let descriptor =
        RenderbufferDescriptor::new(image.format, image.width, image.height).samples(samples);
    let renderbuffer = allocate_renderbuffer(gl, state, &descriptor)?;

    Ok(AttachmentImage {
        key: renderbuffer.key,
        object: ImageObject::Renderbuffer(renderbuffer.handle),
        mip_level: 0,
        layer: 0,
        format: image.format,
        width: image.width,
        height: image.height,
    })
}

fn delete_image<B>(gl: &B, image: &AttachmentImage<B>)
where
    B: Backend,
{
    if let ImageObject::Renderbuffer(handle) = &image.object {
        gl.delete_renderbuffer(handle);
    }
}
