use crate::image::format::TextureFormat;
use crate::image::texture::TextureError;
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::{next_object_key, resource_id};

resource_id!(
    /// Identifies a renderbuffer registered with a [RenderDevice].
    RenderbufferId
);

/// Describes a renderbuffer: a single image that can be rendered to but not sampled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RenderbufferDescriptor {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,

    /// More than 1 sample requires WebGL 2.0.
    pub samples: u32,
}

impl RenderbufferDescriptor {
    pub fn new(format: TextureFormat, width: u32, height: u32) -> Self {
        RenderbufferDescriptor {
            format,
            width,
            height,
            samples: 1,
        }
    }

    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples;

        self
    }
}

pub(crate) struct RenderbufferEntry<B>
where
    B: Backend,
{
    descriptor: RenderbufferDescriptor,
    object: Option<RenderbufferObject<B>>,
}

impl<B> RenderbufferEntry<B>
where
    B: Backend,
{
    pub(crate) fn descriptor(&self) -> &RenderbufferDescriptor {
        &self.descriptor
    }

    pub(crate) fn object(&self) -> Option<&RenderbufferObject<B>> {
        self.object.as_ref()
    }

    pub(crate) fn forget_object(&mut self) {
        self.object = None;
    }
}

pub(crate) struct RenderbufferObject<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::Renderbuffer,
}

/// Creates a renderbuffer object and allocates its storage.
pub(crate) fn allocate_renderbuffer<B>(
    gl: &B,
    state: &mut DynamicState<B>,
    descriptor: &RenderbufferDescriptor,
) -> Result<RenderbufferObject<B>, SubmitError>
where
    B: Backend,
{
    let version = gl.version();
    let internal_format = descriptor
        .format
        .renderbuffer_format(version)
        .ok_or_else(|| {
            TextureError::Unsupported(format!(
                "format {:?} cannot be used for renderbuffers on {:?}",
                descriptor.format, version
            ))
        })?;

    let handle = gl
        .create_renderbuffer()
        .ok_or(SubmitError::ObjectCreation("renderbuffer"))?;
    let key = next_object_key();

    state.set_bound_renderbuffer(Some((key, &handle))).apply(gl);

    if descriptor.samples > 1 && version.is_webgl2() {
        gl.renderbuffer_storage_multisample(
            descriptor.samples,
            internal_format,
            descriptor.width,
            descriptor.height,
        );
    } else {
        if descriptor.samples > 1 {
            log::warn!("Multisampled renderbuffers require WebGL 2.0; allocating a single sample.");
        }

        gl.renderbuffer_storage(internal_format, descriptor.width, descriptor.height);
    }

    Ok(RenderbufferObject { key, handle })
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_renderbuffer(&mut self, descriptor: RenderbufferDescriptor) -> RenderbufferId {
        let index = self.next_index();

        self.renderbuffers.insert(
            index,
            RenderbufferEntry {
                descriptor,
                object: None,
            },
        );

        RenderbufferId::new(self.id, index)
    }

    pub fn destroy_renderbuffer(&mut self, id: RenderbufferId) {
        if !self.owns(id.context, "renderbuffer") {
            return;
        }

        let RenderDevice {
            gl,
            state,
            renderbuffers,
            framebuffers,
            ..
        } = self;

        if let Some(entry) = renderbuffers.remove(&id.index) {
            if let Some(object) = entry.object {
                framebuffers.remove_dependents(gl, state, object.key);
                gl.delete_renderbuffer(&object.handle);
            }
        }
    }

    pub(crate) fn prepare_renderbuffer(
        &mut self,
        id: RenderbufferId,
    ) -> Result<Option<u64>, SubmitError> {
        if !self.owns(id.context, "renderbuffer") {
            return Ok(None);
        }

        let RenderDevice {
            gl,
            state,
            renderbuffers,
            ..
        } = self;

        let entry = match renderbuffers.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Renderbuffer {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        if entry.object.is_none() {
            entry.object = Some(allocate_renderbuffer(gl, state, &entry.descriptor)?);

            log::debug!("Created GL renderbuffer for {:?}.", id);
        }

        Ok(Some(id.index))
    }
}
