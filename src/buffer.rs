//! GPU buffers.
//!
//! A buffer is registered with [RenderDevice::create_buffer] and identified by the returned
//! [BufferId]. Its GL buffer object is created lazily, the first time a submission references the
//! buffer. The CPU copy of the data stays with the device: [RenderDevice::write_buffer] streams
//! the written ranges into the existing GL buffer with `bufferSubData`,
//! [RenderDevice::update_buffer] replaces the whole descriptor and re-uploads it with
//! `bufferData`. In both cases the GL buffer object is reused.
use std::mem;

use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::state::ContextUpdate;
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::{next_object_key, resource_id};

resource_id!(
    /// Identifies a buffer registered with a [RenderDevice].
    BufferId
);

/// What a buffer is used for; decides the binding target its data is uploaded through.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    TransformFeedback,
    Copy,
}

impl BufferUsage {
    pub(crate) fn upload_target(&self, webgl2: bool) -> u32 {
        match self {
            BufferUsage::Index => Gl::ELEMENT_ARRAY_BUFFER,
            BufferUsage::Uniform if webgl2 => Gl::UNIFORM_BUFFER,
            _ => Gl::ARRAY_BUFFER,
        }
    }
}

/// A hint to the driver about how often the buffer's data will change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UsageHint {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
    StaticRead,
    DynamicRead,
    StreamRead,
    StaticCopy,
    DynamicCopy,
    StreamCopy,
}

impl UsageHint {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            UsageHint::StaticDraw => Gl::STATIC_DRAW,
            UsageHint::DynamicDraw => Gl::DYNAMIC_DRAW,
            UsageHint::StreamDraw => Gl::STREAM_DRAW,
            UsageHint::StaticRead => Gl::STATIC_READ,
            UsageHint::DynamicRead => Gl::DYNAMIC_READ,
            UsageHint::StreamRead => Gl::STREAM_READ,
            UsageHint::StaticCopy => Gl::STATIC_COPY,
            UsageHint::DynamicCopy => Gl::DYNAMIC_COPY,
            UsageHint::StreamCopy => Gl::STREAM_COPY,
        }
    }
}

impl Default for UsageHint {
    fn default() -> Self {
        UsageHint::StaticDraw
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct BufferDescriptor {
    pub data: Vec<u8>,
    pub usage: BufferUsage,
    pub hint: UsageHint,
}

impl BufferDescriptor {
    pub fn new(usage: BufferUsage, data: Vec<u8>) -> Self {
        BufferDescriptor {
            data,
            usage,
            hint: UsageHint::default(),
        }
    }

    pub fn vertex(data: Vec<u8>) -> Self {
        BufferDescriptor::new(BufferUsage::Vertex, data)
    }

    pub fn index(data: Vec<u8>) -> Self {
        BufferDescriptor::new(BufferUsage::Index, data)
    }

    pub fn uniform(data: Vec<u8>) -> Self {
        BufferDescriptor::new(BufferUsage::Uniform, data)
    }

    pub fn hint(mut self, hint: UsageHint) -> Self {
        self.hint = hint;

        self
    }
}

/// Binds a range of a buffer, for use as the value of a uniform block or as a transform feedback
/// target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferBinding {
    pub buffer: BufferId,
    pub offset: u32,

    /// Defaults to the remainder of the buffer after `offset`.
    pub size: Option<u32>,
}

impl From<BufferId> for BufferBinding {
    fn from(buffer: BufferId) -> Self {
        BufferBinding {
            buffer,
            offset: 0,
            size: None,
        }
    }
}

enum PendingUpload {
    None,
    Ranges(Vec<(usize, usize)>),
    Full,
}

pub(crate) struct BufferEntry<B>
where
    B: Backend,
{
    descriptor: BufferDescriptor,
    generation: u64,
    pending: PendingUpload,
    object: Option<BufferObject<B>>,
}

impl<B> BufferEntry<B>
where
    B: Backend,
{
    pub(crate) fn object(&self) -> Option<&BufferObject<B>> {
        self.object.as_ref()
    }

    pub(crate) fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    pub(crate) fn forget_object(&mut self) {
        self.object = None;
        self.pending = PendingUpload::Full;
    }
}

pub(crate) struct BufferObject<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::Buffer,
    pub(crate) size: u32,
    generation: u64,
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferId {
        let index = self.next_index();

        self.buffers.insert(
            index,
            BufferEntry {
                descriptor,
                generation: 0,
                pending: PendingUpload::Full,
                object: None,
            },
        );

        BufferId::new(self.id, index)
    }

    pub fn buffer_descriptor(&self, id: BufferId) -> Option<&BufferDescriptor> {
        if id.context != self.id {
            return None;
        }

        self.buffers.get(&id.index).map(|entry| &entry.descriptor)
    }

    /// Writes `data` into the buffer at byte `offset`, growing the buffer if necessary.
    ///
    /// The written range is streamed into the existing GL buffer the next time a submission uses
    /// the buffer.
    pub fn write_buffer(&mut self, id: BufferId, offset: usize, data: &[u8]) {
        if !self.owns(id.context, "buffer") {
            return;
        }

        let entry = match self.buffers.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Cannot write to buffer {:?}: it has been destroyed.", id);

                return;
            }
        };

        let end = offset + data.len();

        if end > entry.descriptor.data.len() {
            entry.descriptor.data.resize(end, 0);
            entry.pending = PendingUpload::Full;
        }

        entry.descriptor.data[offset..end].copy_from_slice(data);
        entry.generation += 1;

        match &mut entry.pending {
            PendingUpload::None => entry.pending = PendingUpload::Ranges(vec![(offset, end)]),
            PendingUpload::Ranges(ranges) => ranges.push((offset, end)),
            PendingUpload::Full => (),
        }
    }

    /// Replaces the buffer's descriptor; the whole buffer is re-uploaded the next time a
    /// submission uses it.
    pub fn update_buffer<F>(&mut self, id: BufferId, f: F)
    where
        F: FnOnce(&mut BufferDescriptor),
    {
        if !self.owns(id.context, "buffer") {
            return;
        }

        if let Some(entry) = self.buffers.get_mut(&id.index) {
            f(&mut entry.descriptor);

            entry.generation += 1;
            entry.pending = PendingUpload::Full;
        } else {
            log::error!("Cannot update buffer {:?}: it has been destroyed.", id);
        }
    }

    /// Releases the GL buffer and forgets the buffer; vertex array objects that reference it are
    /// deleted too.
    pub fn destroy_buffer(&mut self, id: BufferId) {
        if !self.owns(id.context, "buffer") {
            return;
        }

        let RenderDevice {
            gl,
            state,
            buffers,
            vertex_arrays,
            ..
        } = self;

        if let Some(entry) = buffers.remove(&id.index) {
            if let Some(object) = entry.object {
                vertex_arrays.remove_dependents(gl, state, object.key);
                gl.delete_buffer(&object.handle);
            }
        }
    }

    /// Makes sure the buffer's GL object exists and holds the current data; returns the buffer's
    /// index, or `None` if the buffer does not exist (which is logged).
    pub(crate) fn prepare_buffer(&mut self, id: BufferId) -> Result<Option<u64>, SubmitError> {
        if !self.owns(id.context, "buffer") {
            return Ok(None);
        }

        let RenderDevice {
            gl,
            state,
            buffers,
            ..
        } = self;

        let entry = match buffers.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Buffer {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        if entry.object.is_none() {
            let handle = gl
                .create_buffer()
                .ok_or(SubmitError::ObjectCreation("buffer"))?;

            log::trace!("Created GL buffer for {:?}.", id);

            entry.object = Some(BufferObject {
                key: next_object_key(),
                handle,
                size: 0,
                generation: 0,
            });
            entry.pending = PendingUpload::Full;
        }

        let BufferEntry {
            descriptor,
            generation,
            pending,
            object,
        } = entry;

        let object = match object {
            Some(object) => object,
            None => return Ok(None),
        };

        let needs_upload = match pending {
            PendingUpload::None => object.generation != *generation,
            _ => true,
        };

        if !needs_upload {
            return Ok(Some(id.index));
        }

        let size = match gl_size(descriptor.data.len()) {
            Some(size) => size,
            None => {
                log::error!(
                    "Buffer {:?} holds {} bytes, more than WebGL can address; skipping it.",
                    id,
                    descriptor.data.len()
                );

                return Ok(None);
            }
        };

        let webgl2 = state.version().is_webgl2();
        let target = descriptor.usage.upload_target(webgl2);

        match target {
            Gl::ELEMENT_ARRAY_BUFFER => {
                // The element array binding is vertex array state.
                state.set_bound_vertex_array(None).apply(gl);
                gl.bind_buffer(Gl::ELEMENT_ARRAY_BUFFER, Some(&object.handle));
            }
            Gl::UNIFORM_BUFFER => {
                state
                    .set_bound_uniform_buffer(Some((object.key, &object.handle)))
                    .apply(gl);
            }
            _ => {
                state
                    .set_bound_array_buffer(Some((object.key, &object.handle)))
                    .apply(gl);
            }
        }

        match mem::replace(pending, PendingUpload::None) {
            PendingUpload::Ranges(ranges) if size == object.size => {
                for (start, end) in ranges {
                    gl.buffer_sub_data(target, start as u32, &descriptor.data[start..end]);
                }
            }
            _ => {
                gl.buffer_data(target, &descriptor.data, descriptor.hint.gl_id());

                object.size = size;
            }
        }

        object.generation = *generation;

        Ok(Some(id.index))
    }
}

/// The length of buffer data in the 32 bits WebGL expresses buffer offsets and sizes in.
fn gl_size(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::runtime::recording::RecordingBackend;

    #[test]
    fn test_prepare_twice_creates_once() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![1, 2, 3, 4]));

        assert_eq!(device.gl.count("create_buffer"), 0);

        device.prepare_buffer(buffer).unwrap();
        device.prepare_buffer(buffer).unwrap();

        assert_eq!(device.gl.count("create_buffer"), 1);
        assert_eq!(device.gl.count("buffer_data"), 1);
    }

    #[test]
    fn test_identical_descriptors_are_independent() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let a = device.create_buffer(BufferDescriptor::vertex(vec![1, 2, 3, 4]));
        let b = device.create_buffer(BufferDescriptor::vertex(vec![1, 2, 3, 4]));

        assert_ne!(a, b);

        device.prepare_buffer(a).unwrap();
        device.prepare_buffer(b).unwrap();

        let key_a = device.buffers[&a.index].object().unwrap().key;
        let key_b = device.buffers[&b.index].object().unwrap().key;

        assert_ne!(key_a, key_b);
        assert_eq!(device.gl.count("create_buffer"), 2);
    }

    #[test]
    fn test_write_streams_sub_data_into_same_handle() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![0; 8]));

        device.prepare_buffer(buffer).unwrap();

        let handle = device.buffers[&buffer.index].object().unwrap().handle;

        device.write_buffer(buffer, 4, &[9, 9]);
        device.prepare_buffer(buffer).unwrap();

        assert_eq!(device.buffers[&buffer.index].object().unwrap().handle, handle);
        assert_eq!(device.gl.count("create_buffer"), 1);
        assert_eq!(device.gl.count("buffer_data"), 1);
        assert_eq!(
            device.gl.calls_named("buffer_sub_data"),
            vec![format!("{} 4 [9, 9]", Gl::ARRAY_BUFFER)]
        );
        assert_eq!(
            device.buffer_descriptor(buffer).unwrap().data,
            vec![0, 0, 0, 0, 9, 9, 0, 0]
        );
    }

    #[test]
    fn test_update_reuploads_full_data_into_same_handle() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![0; 4]));

        device.prepare_buffer(buffer).unwrap();
        device.update_buffer(buffer, |descriptor| descriptor.data = vec![1; 12]);
        device.prepare_buffer(buffer).unwrap();

        assert_eq!(device.gl.count("create_buffer"), 1);
        assert_eq!(device.gl.count("buffer_data"), 2);
        assert_eq!(device.gl.count("buffer_sub_data"), 0);
        assert_eq!(device.buffers[&buffer.index].object().unwrap().size, 12);
    }

    #[test]
    fn test_lengths_beyond_32_bits_have_no_gl_size() {
        assert_eq!(gl_size(12), Some(12));
        assert_eq!(gl_size(u32::MAX as usize), Some(u32::MAX));

        #[cfg(target_pointer_width = "64")]
        assert_eq!(gl_size(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_growing_write_reuploads_full_data() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![0; 4]));

        device.prepare_buffer(buffer).unwrap();
        device.write_buffer(buffer, 2, &[1, 1, 1, 1]);
        device.prepare_buffer(buffer).unwrap();

        assert_eq!(device.gl.count("buffer_data"), 2);
        assert_eq!(device.gl.count("buffer_sub_data"), 0);
    }

    #[test]
    fn test_index_buffers_upload_without_vertex_array() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::index(vec![0, 0, 1, 0, 2, 0]));

        device.prepare_buffer(buffer).unwrap();

        let upload = device.gl.position("buffer_data").unwrap();
        let calls = device.gl.calls_named("bind_buffer");

        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with(&Gl::ELEMENT_ARRAY_BUFFER.to_string()));
        assert!(device.gl.position("bind_buffer").unwrap() < upload);
        assert_eq!(device.state.bound_vertex_array(), None);
    }

    #[test]
    fn test_uniform_buffers_upload_through_uniform_target() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::uniform(vec![0; 16]));

        device.prepare_buffer(buffer).unwrap();

        assert!(device.gl.calls_named("buffer_data")[0]
            .starts_with(&Gl::UNIFORM_BUFFER.to_string()));
    }

    #[test]
    fn test_destroyed_and_foreign_buffers_are_skipped() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let mut other = RenderDevice::new(RecordingBackend::webgl2());
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![0; 4]));
        let foreign = other.create_buffer(BufferDescriptor::vertex(vec![0; 4]));

        device.prepare_buffer(buffer).unwrap();
        device.destroy_buffer(buffer);

        assert_eq!(device.gl.count("delete_buffer"), 1);
        assert_eq!(device.prepare_buffer(buffer).unwrap(), None);
        assert_eq!(device.prepare_buffer(foreign).unwrap(), None);
        assert_eq!(device.gl.count("create_buffer"), 1);
    }
}
