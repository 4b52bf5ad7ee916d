//! The subset of the WebGL API a [RenderDevice] drives.
//!
//! A [Backend] is a live, already configured WebGL 1.0 or WebGL 2.0 context. The method names
//! follow the WebGL API closely; arguments are the raw GL enum values (see the constants on
//! [web_sys::WebGl2RenderingContext]). Methods that only exist in WebGL 2.0 are no-ops (or return
//! `None`) on a WebGL 1.0 backend; the [RenderDevice] checks [Backend::version] before relying on
//! them.
//!
//! [RenderDevice]: crate::runtime::RenderDevice
use thiserror::Error;

use crate::image::ImageElement;

/// The WebGL version of a [Backend].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GlVersion {
    WebGl1,
    WebGl2,
}

impl GlVersion {
    pub fn is_webgl2(&self) -> bool {
        *self == GlVersion::WebGl2
    }
}

/// Information about an active attribute or uniform, as returned by `getActiveAttrib` and
/// `getActiveUniform`.
#[derive(Clone, PartialEq, Debug)]
pub struct ActiveInfo {
    pub name: String,
    pub size: i32,
    pub type_: u32,
}

/// Error returned when a call into the backend raised an exception.
#[derive(Clone, PartialEq, Debug, Error)]
#[error("WebGL call failed: {0}")]
pub struct BackendError(pub String);

pub trait Backend {
    type Buffer: Clone;
    type Texture: Clone;
    type Sampler: Clone;
    type Renderbuffer: Clone;
    type Framebuffer: Clone;
    type Shader: Clone;
    type Program: Clone;
    type UniformLocation: Clone;
    type VertexArray: Clone;
    type Query: Clone;
    type TransformFeedback: Clone;

    fn version(&self) -> GlVersion;

    fn is_context_lost(&self) -> bool;

    fn drawing_buffer_size(&self) -> (u32, u32);

    /// Whether vertex array objects are available (always in WebGL 2.0, through
    /// `OES_vertex_array_object` in WebGL 1.0).
    fn supports_vertex_arrays(&self) -> bool;

    /// Whether instanced drawing is available (always in WebGL 2.0, through
    /// `ANGLE_instanced_arrays` in WebGL 1.0).
    fn supports_instancing(&self) -> bool;

    // Buffers

    fn create_buffer(&self) -> Option<Self::Buffer>;

    fn delete_buffer(&self, buffer: &Self::Buffer);

    fn bind_buffer(&self, target: u32, buffer: Option<&Self::Buffer>);

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);

    fn buffer_sub_data(&self, target: u32, offset: u32, data: &[u8]);

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: u32,
        write_offset: u32,
        size: u32,
    );

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<&Self::Buffer>);

    fn bind_buffer_range(
        &self,
        target: u32,
        index: u32,
        buffer: &Self::Buffer,
        offset: u32,
        size: u32,
    );

    // Textures

    fn create_texture(&self) -> Option<Self::Texture>;

    fn delete_texture(&self, texture: &Self::Texture);

    fn active_texture(&self, unit: u32);

    fn bind_texture(&self, target: u32, texture: Option<&Self::Texture>);

    fn tex_parameteri(&self, target: u32, pname: u32, param: i32);

    fn tex_parameterf(&self, target: u32, pname: u32, param: f32);

    fn pixel_storei(&self, pname: u32, param: i32);

    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        format: u32,
        type_: u32,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError>;

    fn tex_image_2d_with_element(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        format: u32,
        type_: u32,
        element: &ImageElement,
    ) -> Result<(), BackendError>;

    #[allow(clippy::too_many_arguments)]
    fn tex_image_3d(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        width: u32,
        height: u32,
        depth: u32,
        format: u32,
        type_: u32,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError>;

    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d(
        &self,
        target: u32,
        level: u32,
        offset: (u32, u32, u32),
        width: u32,
        height: u32,
        format: u32,
        type_: u32,
        data: &[u8],
    ) -> Result<(), BackendError>;

    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_3d_with_element(
        &self,
        target: u32,
        level: u32,
        offset: (u32, u32, u32),
        width: u32,
        height: u32,
        format: u32,
        type_: u32,
        element: &ImageElement,
    ) -> Result<(), BackendError>;

    fn generate_mipmap(&self, target: u32);

    // Samplers (WebGL 2.0)

    fn create_sampler(&self) -> Option<Self::Sampler>;

    fn delete_sampler(&self, sampler: &Self::Sampler);

    fn bind_sampler(&self, unit: u32, sampler: Option<&Self::Sampler>);

    fn sampler_parameteri(&self, sampler: &Self::Sampler, pname: u32, param: i32);

    fn sampler_parameterf(&self, sampler: &Self::Sampler, pname: u32, param: f32);

    // Renderbuffers

    fn create_renderbuffer(&self) -> Option<Self::Renderbuffer>;

    fn delete_renderbuffer(&self, renderbuffer: &Self::Renderbuffer);

    fn bind_renderbuffer(&self, renderbuffer: Option<&Self::Renderbuffer>);

    fn renderbuffer_storage(&self, internal_format: u32, width: u32, height: u32);

    /// The sample counts renderbuffers with the given internal format support, largest first
    /// (`getInternalformatParameter` with `SAMPLES`). Always empty in WebGL 1.0.
    fn supported_samples(&self, internal_format: u32) -> Vec<u32>;

    fn renderbuffer_storage_multisample(
        &self,
        samples: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    );

    // Framebuffers

    fn create_framebuffer(&self) -> Option<Self::Framebuffer>;

    fn delete_framebuffer(&self, framebuffer: &Self::Framebuffer);

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<&Self::Framebuffer>);

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: &Self::Texture,
        level: u32,
    );

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: &Self::Texture,
        level: u32,
        layer: u32,
    );

    fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer: &Self::Renderbuffer,
    );

    fn check_framebuffer_status(&self, target: u32) -> u32;

    fn draw_buffers(&self, buffers: &[u32]);

    fn read_buffer(&self, source: u32);

    fn blit_framebuffer(
        &self,
        source: [i32; 4],
        destination: [i32; 4],
        mask: u32,
        filter: u32,
    );

    // Clearing

    fn clear_color(&self, color: [f32; 4]);

    fn clear_depth(&self, depth: f32);

    fn clear_stencil(&self, stencil: i32);

    fn clear(&self, mask: u32);

    fn clear_bufferfv(&self, buffer: u32, draw_buffer: u32, values: &[f32]);

    fn clear_bufferiv(&self, buffer: u32, draw_buffer: u32, values: &[i32]);

    fn clear_bufferuiv(&self, buffer: u32, draw_buffer: u32, values: &[u32]);

    fn clear_bufferfi(&self, buffer: u32, draw_buffer: u32, depth: f32, stencil: i32);

    // Fixed function state

    fn enable(&self, capability: u32);

    fn disable(&self, capability: u32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);

    fn depth_range(&self, near: f32, far: f32);

    fn depth_func(&self, func: u32);

    fn depth_mask(&self, flag: bool);

    fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool);

    fn cull_face(&self, mode: u32);

    fn front_face(&self, mode: u32);

    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32);

    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32);

    fn stencil_mask_separate(&self, face: u32, mask: u32);

    fn blend_func_separate(
        &self,
        source_rgb: u32,
        destination_rgb: u32,
        source_alpha: u32,
        destination_alpha: u32,
    );

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32);

    fn blend_color(&self, color: [f32; 4]);

    // Shaders and programs

    fn create_shader(&self, stage: u32) -> Option<Self::Shader>;

    fn delete_shader(&self, shader: &Self::Shader);

    fn shader_source(&self, shader: &Self::Shader, source: &str);

    fn compile_shader(&self, shader: &Self::Shader);

    fn shader_compile_status(&self, shader: &Self::Shader) -> bool;

    fn shader_info_log(&self, shader: &Self::Shader) -> String;

    fn create_program(&self) -> Option<Self::Program>;

    fn delete_program(&self, program: &Self::Program);

    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader);

    fn transform_feedback_varyings(
        &self,
        program: &Self::Program,
        varyings: &[String],
        buffer_mode: u32,
    );

    fn link_program(&self, program: &Self::Program);

    fn program_link_status(&self, program: &Self::Program) -> bool;

    fn program_info_log(&self, program: &Self::Program) -> String;

    fn use_program(&self, program: Option<&Self::Program>);

    // Reflection

    fn active_attribute_count(&self, program: &Self::Program) -> u32;

    fn active_attribute(&self, program: &Self::Program, index: u32) -> Option<ActiveInfo>;

    fn attribute_location(&self, program: &Self::Program, name: &str) -> i32;

    fn active_uniform_count(&self, program: &Self::Program) -> u32;

    fn active_uniform(&self, program: &Self::Program, index: u32) -> Option<ActiveInfo>;

    fn uniform_location(&self, program: &Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    /// For each of the first `count` active uniforms, the index of the uniform block that contains
    /// it, or `-1` if it is not part of a block. Always all `-1` in WebGL 1.0.
    fn active_uniform_block_indices(&self, program: &Self::Program, count: u32) -> Vec<i32>;

    fn active_uniform_block_count(&self, program: &Self::Program) -> u32;

    fn active_uniform_block_name(&self, program: &Self::Program, index: u32) -> Option<String>;

    fn uniform_block_binding(&self, program: &Self::Program, block_index: u32, binding: u32);

    // Uniform values

    /// Sets a `float`/`vecN` uniform; `components` is the `N` (1 for a scalar).
    fn uniform_f32(&self, location: &Self::UniformLocation, components: usize, data: &[f32]);

    /// Sets an `int`/`ivecN`/`bool`/`bvecN`/sampler uniform.
    fn uniform_i32(&self, location: &Self::UniformLocation, components: usize, data: &[i32]);

    /// Sets a `uint`/`uvecN` uniform (WebGL 2.0).
    fn uniform_u32(&self, location: &Self::UniformLocation, components: usize, data: &[u32]);

    /// Sets a `matCxR` uniform, column major.
    fn uniform_matrix(
        &self,
        location: &Self::UniformLocation,
        columns: usize,
        rows: usize,
        data: &[f32],
    );

    // Vertex input

    fn enable_vertex_attrib_array(&self, location: u32);

    fn disable_vertex_attrib_array(&self, location: u32);

    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: u32,
        type_: u32,
        normalized: bool,
        stride: u32,
        offset: u32,
    );

    fn vertex_attrib_i_pointer(&self, location: u32, size: u32, type_: u32, stride: u32, offset: u32);

    /// Returns `false` if instancing is not available.
    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) -> bool;

    fn create_vertex_array(&self) -> Option<Self::VertexArray>;

    fn delete_vertex_array(&self, vertex_array: &Self::VertexArray);

    fn bind_vertex_array(&self, vertex_array: Option<&Self::VertexArray>);

    // Drawing

    fn draw_arrays(&self, mode: u32, first: u32, count: u32);

    fn draw_elements(&self, mode: u32, count: u32, type_: u32, offset: u32);

    /// Returns `false` if instancing is not available.
    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32) -> bool;

    /// Returns `false` if instancing is not available.
    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: u32,
        type_: u32,
        offset: u32,
        instances: u32,
    ) -> bool;

    // Queries (WebGL 2.0)

    fn create_query(&self) -> Option<Self::Query>;

    fn delete_query(&self, query: &Self::Query);

    fn begin_query(&self, target: u32, query: &Self::Query);

    fn end_query(&self, target: u32);

    fn query_result_available(&self, query: &Self::Query) -> bool;

    fn query_result(&self, query: &Self::Query) -> u32;

    // Transform feedback (WebGL 2.0)

    fn create_transform_feedback(&self) -> Option<Self::TransformFeedback>;

    fn delete_transform_feedback(&self, transform_feedback: &Self::TransformFeedback);

    fn bind_transform_feedback(&self, transform_feedback: Option<&Self::TransformFeedback>);

    fn begin_transform_feedback(&self, primitive_mode: u32);

    fn end_transform_feedback(&self);
}
