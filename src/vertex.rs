//! Vertex input: how buffer data feeds the attributes of a program.
//!
//! Where vertex array objects are available (WebGL 2.0, or WebGL 1.0 with
//! `OES_vertex_array_object`) the attribute setup of a draw is recorded once into a vertex array
//! object, cached per program, attribute bindings and index buffer. Without them the attribute
//! pointers are set again for every draw.
use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::buffer::BufferId;
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{Backend, SubmitError};
use crate::util::next_object_key;

/// The layout of a single attribute value in a buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

impl VertexFormat {
    pub fn components(&self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Sint32 => 1,
            VertexFormat::Float32x2
            | VertexFormat::Uint8x2
            | VertexFormat::Sint8x2
            | VertexFormat::Unorm8x2
            | VertexFormat::Snorm8x2
            | VertexFormat::Uint16x2
            | VertexFormat::Sint16x2
            | VertexFormat::Unorm16x2
            | VertexFormat::Snorm16x2
            | VertexFormat::Uint32x2
            | VertexFormat::Sint32x2 => 2,
            VertexFormat::Float32x3 | VertexFormat::Uint32x3 | VertexFormat::Sint32x3 => 3,
            _ => 4,
        }
    }

    pub(crate) fn component_type(&self) -> u32 {
        match self {
            VertexFormat::Float32
            | VertexFormat::Float32x2
            | VertexFormat::Float32x3
            | VertexFormat::Float32x4 => Gl::FLOAT,
            VertexFormat::Uint8x2
            | VertexFormat::Uint8x4
            | VertexFormat::Unorm8x2
            | VertexFormat::Unorm8x4 => Gl::UNSIGNED_BYTE,
            VertexFormat::Sint8x2
            | VertexFormat::Sint8x4
            | VertexFormat::Snorm8x2
            | VertexFormat::Snorm8x4 => Gl::BYTE,
            VertexFormat::Uint16x2
            | VertexFormat::Uint16x4
            | VertexFormat::Unorm16x2
            | VertexFormat::Unorm16x4 => Gl::UNSIGNED_SHORT,
            VertexFormat::Sint16x2
            | VertexFormat::Sint16x4
            | VertexFormat::Snorm16x2
            | VertexFormat::Snorm16x4 => Gl::SHORT,
            VertexFormat::Uint32
            | VertexFormat::Uint32x2
            | VertexFormat::Uint32x3
            | VertexFormat::Uint32x4 => Gl::UNSIGNED_INT,
            _ => Gl::INT,
        }
    }

    pub(crate) fn normalized(&self) -> bool {
        matches!(
            self,
            VertexFormat::Unorm8x2
                | VertexFormat::Unorm8x4
                | VertexFormat::Snorm8x2
                | VertexFormat::Snorm8x4
                | VertexFormat::Unorm16x2
                | VertexFormat::Unorm16x4
                | VertexFormat::Snorm16x2
                | VertexFormat::Snorm16x4
        )
    }

    /// The size of one value in bytes.
    pub fn size(&self) -> u32 {
        let component_size = match self.component_type() {
            Gl::UNSIGNED_BYTE | Gl::BYTE => 1,
            Gl::UNSIGNED_SHORT | Gl::SHORT => 2,
            _ => 4,
        };

        component_size * self.components()
    }
}

/// Whether an attribute advances per vertex or per instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StepMode {
    Vertex,
    Instance,
}

impl StepMode {
    fn divisor(&self) -> u32 {
        match self {
            StepMode::Vertex => 0,
            StepMode::Instance => 1,
        }
    }
}

/// Binds a region of a buffer to a vertex attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VertexAttribute {
    pub buffer: BufferId,
    pub format: VertexFormat,

    /// Byte offset of the first value.
    pub offset: u32,

    /// Byte distance between consecutive values; `0` means tightly packed.
    pub stride: u32,

    pub step_mode: StepMode,
}

impl VertexAttribute {
    pub fn new(buffer: BufferId, format: VertexFormat) -> Self {
        VertexAttribute {
            buffer,
            format,
            offset: 0,
            stride: 0,
            step_mode: StepMode::Vertex,
        }
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;

        self
    }

    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride;

        self
    }

    pub fn instanced(mut self) -> Self {
        self.step_mode = StepMode::Instance;

        self
    }

    /// The number of complete values a buffer of `buffer_size` bytes holds for this attribute.
    pub(crate) fn value_count(&self, buffer_size: usize) -> u32 {
        let size = self.format.size() as usize;
        let stride = if self.stride == 0 {
            size
        } else {
            self.stride as usize
        };
        let offset = self.offset as usize;

        if buffer_size < offset + size {
            0
        } else {
            ((buffer_size - offset - size) / stride + 1) as u32
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IndexFormat {
    Uint8,
    Uint16,

    /// Requires WebGL 2.0 (or `OES_element_index_uint`).
    Uint32,
}

impl IndexFormat {
    pub(crate) fn id(&self) -> u32 {
        match self {
            IndexFormat::Uint8 => Gl::UNSIGNED_BYTE,
            IndexFormat::Uint16 => Gl::UNSIGNED_SHORT,
            IndexFormat::Uint32 => Gl::UNSIGNED_INT,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            IndexFormat::Uint8 => 1,
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IndexBuffer {
    pub buffer: BufferId,
    pub format: IndexFormat,

    /// Byte offset of the first index.
    pub offset: u32,
}

impl IndexBuffer {
    pub fn new(buffer: BufferId, format: IndexFormat) -> Self {
        IndexBuffer {
            buffer,
            format,
            offset: 0,
        }
    }
}

/// A vertex attribute of the program in use, resolved to the GL buffer that feeds it.
pub(crate) struct AttributeInput<'a, B>
where
    B: Backend,
{
    pub(crate) location: u32,
    pub(crate) integer: bool,
    pub(crate) buffer: (u64, &'a B::Buffer),
    pub(crate) attribute: VertexAttribute,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct VertexArrayKey {
    program: u64,
    attributes: Vec<(u32, u64, VertexAttribute)>,
    index_buffer: Option<u64>,
}

struct VertexArrayObject<B>
where
    B: Backend,
{
    key: u64,
    handle: B::VertexArray,
}

pub(crate) struct VertexArrayCache<B>
where
    B: Backend,
{
    vertex_arrays: FnvHashMap<VertexArrayKey, VertexArrayObject<B>>,

    // Global attribute state, only used without vertex array objects.
    enabled: FnvHashMap<u32, u32>,
}

impl<B> VertexArrayCache<B>
where
    B: Backend,
{
    pub(crate) fn new() -> Self {
        VertexArrayCache {
            vertex_arrays: FnvHashMap::default(),
            enabled: FnvHashMap::default(),
        }
    }

    /// Sets up the vertex input for a draw with `program`.
    pub(crate) fn bind(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        program: u64,
        inputs: &[AttributeInput<B>],
        index_buffer: Option<(u64, &B::Buffer)>,
    ) -> Result<(), SubmitError> {
        if !gl.supports_vertex_arrays() {
            return self.bind_without_vertex_array(gl, state, inputs, index_buffer);
        }

        let key = VertexArrayKey {
            program,
            attributes: inputs
                .iter()
                .map(|input| (input.location, input.buffer.0, input.attribute))
                .collect(),
            index_buffer: index_buffer.map(|(key, _)| key),
        };

        if let Some(vertex_array) = self.vertex_arrays.get(&key) {
            state
                .set_bound_vertex_array(Some((vertex_array.key, &vertex_array.handle)))
                .apply(gl);

            return Ok(());
        }

        let handle = gl
            .create_vertex_array()
            .ok_or(SubmitError::ObjectCreation("vertex array"))?;
        let object_key = next_object_key();

        state
            .set_bound_vertex_array(Some((object_key, &handle)))
            .apply(gl);

        for input in inputs {
            gl.enable_vertex_attrib_array(input.location);
            set_pointer(gl, state, input);

            let divisor = input.attribute.step_mode.divisor();

            if divisor != 0 && !gl.vertex_attrib_divisor(input.location, divisor) {
                state.set_bound_vertex_array(None).apply(gl);
                gl.delete_vertex_array(&handle);

                return Err(SubmitError::InstancingUnavailable);
            }
        }

        if let Some((_, buffer)) = index_buffer {
            gl.bind_buffer(Gl::ELEMENT_ARRAY_BUFFER, Some(buffer));
        }

        log::trace!(
            "Created vertex array with {} attributes for program {}.",
            inputs.len(),
            program
        );

        self.vertex_arrays.insert(
            key,
            VertexArrayObject {
                key: object_key,
                handle,
            },
        );

        Ok(())
    }

    fn bind_without_vertex_array(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        inputs: &[AttributeInput<B>],
        index_buffer: Option<(u64, &B::Buffer)>,
    ) -> Result<(), SubmitError> {
        let stale: Vec<u32> = self
            .enabled
            .keys()
            .copied()
            .filter(|location| !inputs.iter().any(|input| input.location == *location))
            .collect();

        for location in stale {
            if let Some(divisor) = self.enabled.remove(&location) {
                if divisor != 0 {
                    gl.vertex_attrib_divisor(location, 0);
                }
            }

            gl.disable_vertex_attrib_array(location);
        }

        for input in inputs {
            let divisor = input.attribute.step_mode.divisor();

            match self.enabled.get(&input.location).copied() {
                None => {
                    gl.enable_vertex_attrib_array(input.location);

                    if divisor != 0 && !gl.vertex_attrib_divisor(input.location, divisor) {
                        return Err(SubmitError::InstancingUnavailable);
                    }
                }
                Some(current) if current != divisor => {
                    if !gl.vertex_attrib_divisor(input.location, divisor) {
                        return Err(SubmitError::InstancingUnavailable);
                    }
                }
                _ => (),
            }

            self.enabled.insert(input.location, divisor);

            set_pointer(gl, state, input);
        }

        if let Some((_, buffer)) = index_buffer {
            gl.bind_buffer(Gl::ELEMENT_ARRAY_BUFFER, Some(buffer));
        }

        Ok(())
    }

    /// Deletes every vertex array that reads from the GL buffer with `buffer_key`.
    pub(crate) fn remove_dependents(
        &mut self,
        gl: &B,
        state: &mut DynamicState<B>,
        buffer_key: u64,
    ) {
        let bound = state.bound_vertex_array();

        self.vertex_arrays.retain(|key, vertex_array| {
            let depends = key.index_buffer == Some(buffer_key)
                || key
                    .attributes
                    .iter()
                    .any(|(_, buffer, _)| *buffer == buffer_key);

            if depends {
                if bound == Some(vertex_array.key) {
                    state.set_bound_vertex_array(None).apply(gl);
                }

                gl.delete_vertex_array(&vertex_array.handle);
            }

            !depends
        });
    }

    pub(crate) fn clear(&mut self, gl: &B) {
        for (_, vertex_array) in self.vertex_arrays.drain() {
            gl.delete_vertex_array(&vertex_array.handle);
        }

        self.enabled.clear();
    }

    pub(crate) fn forget(&mut self) {
        self.vertex_arrays.clear();
        self.enabled.clear();
    }
}

fn set_pointer<B>(gl: &B, state: &mut DynamicState<B>, input: &AttributeInput<B>)
where
    B: Backend,
{
    let attribute = &input.attribute;
    let format = attribute.format;

    state.set_bound_array_buffer(Some(input.buffer)).apply(gl);

    if input.integer && gl.version().is_webgl2() {
        gl.vertex_attrib_i_pointer(
            input.location,
            format.components(),
            format.component_type(),
            attribute.stride,
            attribute.offset,
        );
    } else {
        gl.vertex_attrib_pointer(
            input.location,
            format.components(),
            format.component_type(),
            format.normalized(),
            attribute.stride,
            attribute.offset,
        );
    }
}
