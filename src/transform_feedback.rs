//! Transform feedback objects (WebGL 2.0 only).
//!
//! A transform feedback object records which buffers the varyings of a pipeline are captured into.
//! The object is created lazily and rebuilt whenever one of its buffers got a new GL object.
use web_sys::WebGl2RenderingContext as Gl;

use crate::buffer::BufferBinding;
use crate::runtime::state::ContextUpdate;
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::{next_object_key, resource_id};

resource_id!(
    /// Identifies a transform feedback target registered with a [RenderDevice].
    TransformFeedbackId
);

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TransformFeedbackDescriptor {
    /// One buffer per varying for [Separate] capture, a single buffer for [Interleaved] capture.
    ///
    /// [Separate]: crate::pipeline::TransformFeedbackBufferMode::Separate
    /// [Interleaved]: crate::pipeline::TransformFeedbackBufferMode::Interleaved
    pub buffers: Vec<BufferBinding>,

    /// Discards all primitives after capture, so nothing is rasterized.
    pub discard_rasterizer: bool,
}

impl TransformFeedbackDescriptor {
    pub fn new<I, T>(buffers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BufferBinding>,
    {
        TransformFeedbackDescriptor {
            buffers: buffers.into_iter().map(|b| b.into()).collect(),
            discard_rasterizer: false,
        }
    }

    pub fn discard_rasterizer(mut self) -> Self {
        self.discard_rasterizer = true;

        self
    }
}

pub(crate) struct TransformFeedbackEntry<B>
where
    B: Backend,
{
    descriptor: TransformFeedbackDescriptor,
    object: Option<TransformFeedbackObject<B>>,
}

impl<B> TransformFeedbackEntry<B>
where
    B: Backend,
{
    pub(crate) fn descriptor(&self) -> &TransformFeedbackDescriptor {
        &self.descriptor
    }

    pub(crate) fn object(&self) -> Option<&TransformFeedbackObject<B>> {
        self.object.as_ref()
    }

    pub(crate) fn forget_object(&mut self) {
        self.object = None;
    }
}

pub(crate) struct TransformFeedbackObject<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::TransformFeedback,
    buffer_keys: Vec<u64>,
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_transform_feedback(
        &mut self,
        descriptor: TransformFeedbackDescriptor,
    ) -> TransformFeedbackId {
        let index = self.next_index();

        self.transform_feedbacks.insert(
            index,
            TransformFeedbackEntry {
                descriptor,
                object: None,
            },
        );

        TransformFeedbackId::new(self.id, index)
    }

    pub fn destroy_transform_feedback(&mut self, id: TransformFeedbackId) {
        if !self.owns(id.context, "transform feedback") {
            return;
        }

        let RenderDevice {
            gl,
            state,
            transform_feedbacks,
            ..
        } = self;

        if let Some(entry) = transform_feedbacks.remove(&id.index) {
            if let Some(object) = entry.object {
                state.set_bound_transform_feedback(None).apply(gl);
                gl.delete_transform_feedback(&object.handle);
            }
        }
    }

    /// Makes sure the transform feedback object exists with the current GL objects of its buffers
    /// attached. Returns `None` if it cannot be used: on WebGL 1.0, or when it or one of its
    /// buffers does not exist (all of which are logged).
    pub(crate) fn prepare_transform_feedback(
        &mut self,
        id: TransformFeedbackId,
    ) -> Result<Option<u64>, SubmitError> {
        if !self.owns(id.context, "transform feedback") {
            return Ok(None);
        }

        if !self.gl.version().is_webgl2() {
            log::error!("Transform feedback requires WebGL 2.0; skipping the capture.");

            return Ok(None);
        }

        let bindings = match self.transform_feedbacks.get(&id.index) {
            Some(entry) => entry.descriptor.buffers.clone(),
            None => {
                log::error!("Transform feedback {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        for binding in &bindings {
            if self.prepare_buffer(binding.buffer)?.is_none() {
                log::error!(
                    "Transform feedback {:?} captures into a missing buffer; skipping the capture.",
                    id
                );

                return Ok(None);
            }
        }

        let RenderDevice {
            gl,
            state,
            buffers,
            transform_feedbacks,
            ..
        } = self;

        let objects = bindings
            .iter()
            .filter_map(|binding| buffers.get(&binding.buffer.index)?.object())
            .collect::<Vec<_>>();
        let buffer_keys = objects.iter().map(|object| object.key).collect::<Vec<_>>();

        let entry = match transform_feedbacks.get_mut(&id.index) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(object) = &entry.object {
            if object.buffer_keys == buffer_keys {
                return Ok(Some(id.index));
            }
        }

        if let Some(stale) = entry.object.take() {
            log::debug!("Rebuilding transform feedback {:?}.", id);

            state.set_bound_transform_feedback(None).apply(gl);
            gl.delete_transform_feedback(&stale.handle);
        }

        let handle = gl
            .create_transform_feedback()
            .ok_or(SubmitError::ObjectCreation("transform feedback"))?;
        let key = next_object_key();

        state
            .set_bound_transform_feedback(Some((key, &handle)))
            .apply(gl);

        for (index, (binding, object)) in bindings.iter().zip(objects).enumerate() {
            let index = index as u32;
            let remainder = object.size.saturating_sub(binding.offset);
            let size = binding
                .size
                .or_else(|| (binding.offset > 0).then(|| remainder));

            match size {
                Some(size) => gl.bind_buffer_range(
                    Gl::TRANSFORM_FEEDBACK_BUFFER,
                    index,
                    &object.handle,
                    binding.offset,
                    size,
                ),
                None => {
                    gl.bind_buffer_base(Gl::TRANSFORM_FEEDBACK_BUFFER, index, Some(&object.handle))
                }
            }
        }

        entry.object = Some(TransformFeedbackObject {
            key,
            handle,
            buffer_keys,
        });

        Ok(Some(id.index))
    }
}
