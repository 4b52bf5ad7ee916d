//! [Backend] implementations on top of `web-sys`.
//!
//! [WebGl2Context] wraps a `WebGl2RenderingContext`. [WebGl1Context] wraps a
//! `WebGlRenderingContext` together with the `ANGLE_instanced_arrays` and
//! `OES_vertex_array_object` extensions, if the browser exposes them.
use js_sys::{Array, Int32Array};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    AngleInstancedArrays, OesVertexArrayObject, WebGl2RenderingContext as Gl, WebGlBuffer,
    WebGlFramebuffer, WebGlProgram, WebGlQuery, WebGlRenderbuffer, WebGlRenderingContext,
    WebGlSampler, WebGlShader, WebGlTexture, WebGlTransformFeedback, WebGlUniformLocation,
    WebGlVertexArrayObject,
};

use crate::image::ImageElement;
use crate::runtime::backend::{ActiveInfo, Backend, BackendError, GlVersion};

fn js_error(value: JsValue) -> BackendError {
    BackendError(
        value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value)),
    )
}

// Methods that have the same name and signature on `WebGlRenderingContext` and
// `WebGl2RenderingContext`.
macro_rules! common_methods {
    ($tex_image_html_image:ident, $tex_image_html_canvas:ident, $tex_image_html_video:ident) => {
        type Buffer = WebGlBuffer;
        type Texture = WebGlTexture;
        type Sampler = WebGlSampler;
        type Renderbuffer = WebGlRenderbuffer;
        type Framebuffer = WebGlFramebuffer;
        type Shader = WebGlShader;
        type Program = WebGlProgram;
        type UniformLocation = WebGlUniformLocation;
        type VertexArray = WebGlVertexArrayObject;
        type Query = WebGlQuery;
        type TransformFeedback = WebGlTransformFeedback;

        fn is_context_lost(&self) -> bool {
            self.gl.is_context_lost()
        }

        fn drawing_buffer_size(&self) -> (u32, u32) {
            (
                self.gl.drawing_buffer_width() as u32,
                self.gl.drawing_buffer_height() as u32,
            )
        }

        fn create_buffer(&self) -> Option<WebGlBuffer> {
            self.gl.create_buffer()
        }

        fn delete_buffer(&self, buffer: &WebGlBuffer) {
            self.gl.delete_buffer(Some(buffer));
        }

        fn bind_buffer(&self, target: u32, buffer: Option<&WebGlBuffer>) {
            self.gl.bind_buffer(target, buffer);
        }

        fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
            self.gl.buffer_data_with_u8_array(target, data, usage);
        }

        fn buffer_sub_data(&self, target: u32, offset: u32, data: &[u8]) {
            self.gl
                .buffer_sub_data_with_i32_and_u8_array(target, offset as i32, data);
        }

        fn create_texture(&self) -> Option<WebGlTexture> {
            self.gl.create_texture()
        }

        fn delete_texture(&self, texture: &WebGlTexture) {
            self.gl.delete_texture(Some(texture));
        }

        fn active_texture(&self, unit: u32) {
            self.gl.active_texture(Gl::TEXTURE0 + unit);
        }

        fn bind_texture(&self, target: u32, texture: Option<&WebGlTexture>) {
            self.gl.bind_texture(target, texture);
        }

        fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
            self.gl.tex_parameteri(target, pname, param);
        }

        fn tex_parameterf(&self, target: u32, pname: u32, param: f32) {
            self.gl.tex_parameterf(target, pname, param);
        }

        fn pixel_storei(&self, pname: u32, param: i32) {
            self.gl.pixel_storei(pname, param);
        }

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
        ) -> Result<(), BackendError> {
            self.gl
                .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
                    target,
                    level as i32,
                    internal_format as i32,
                    width as i32,
                    height as i32,
                    0,
                    format,
                    type_,
                    data,
                )
                .map_err(js_error)
        }

        fn tex_image_2d_with_element(
            &self,
            target: u32,
            level: u32,
            internal_format: u32,
            format: u32,
            type_: u32,
            element: &ImageElement,
        ) -> Result<(), BackendError> {
            let level = level as i32;
            let internal_format = internal_format as i32;

            match element {
                ImageElement::Image(image) => self
                    .gl
                    .$tex_image_html_image(
                        target,
                        level,
                        internal_format,
                        format,
                        type_,
                        image,
                    ),
                ImageElement::Canvas(canvas) => self
                    .gl
                    .$tex_image_html_canvas(
                        target,
                        level,
                        internal_format,
                        format,
                        type_,
                        canvas,
                    ),
                ImageElement::Video(video) => self
                    .gl
                    .$tex_image_html_video(
                        target,
                        level,
                        internal_format,
                        format,
                        type_,
                        video,
                    ),
                ImageElement::Bitmap(bitmap) => {
                    self.gl.tex_image_2d_with_u32_and_u32_and_image_bitmap(
                        target,
                        level,
                        internal_format,
                        format,
                        type_,
                        bitmap,
                    )
                }
            }
            .map_err(js_error)
        }

        fn generate_mipmap(&self, target: u32) {
            self.gl.generate_mipmap(target);
        }

        fn create_renderbuffer(&self) -> Option<WebGlRenderbuffer> {
            self.gl.create_renderbuffer()
        }

        fn delete_renderbuffer(&self, renderbuffer: &WebGlRenderbuffer) {
            self.gl.delete_renderbuffer(Some(renderbuffer));
        }

        fn bind_renderbuffer(&self, renderbuffer: Option<&WebGlRenderbuffer>) {
            self.gl.bind_renderbuffer(Gl::RENDERBUFFER, renderbuffer);
        }

        fn renderbuffer_storage(&self, internal_format: u32, width: u32, height: u32) {
            self.gl.renderbuffer_storage(
                Gl::RENDERBUFFER,
                internal_format,
                width as i32,
                height as i32,
            );
        }

        fn create_framebuffer(&self) -> Option<WebGlFramebuffer> {
            self.gl.create_framebuffer()
        }

        fn delete_framebuffer(&self, framebuffer: &WebGlFramebuffer) {
            self.gl.delete_framebuffer(Some(framebuffer));
        }

        fn bind_framebuffer(&self, target: u32, framebuffer: Option<&WebGlFramebuffer>) {
            self.gl.bind_framebuffer(target, framebuffer);
        }

        fn framebuffer_texture_2d(
            &self,
            target: u32,
            attachment: u32,
            texture_target: u32,
            texture: &WebGlTexture,
            level: u32,
        ) {
            self.gl.framebuffer_texture_2d(
                target,
                attachment,
                texture_target,
                Some(texture),
                level as i32,
            );
        }

        fn framebuffer_renderbuffer(
            &self,
            target: u32,
            attachment: u32,
            renderbuffer: &WebGlRenderbuffer,
        ) {
            self.gl.framebuffer_renderbuffer(
                target,
                attachment,
                Gl::RENDERBUFFER,
                Some(renderbuffer),
            );
        }

        fn check_framebuffer_status(&self, target: u32) -> u32 {
            self.gl.check_framebuffer_status(target)
        }

        fn clear_color(&self, color: [f32; 4]) {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
        }

        fn clear_depth(&self, depth: f32) {
            self.gl.clear_depth(depth);
        }

        fn clear_stencil(&self, stencil: i32) {
            self.gl.clear_stencil(stencil);
        }

        fn clear(&self, mask: u32) {
            self.gl.clear(mask);
        }

        fn enable(&self, capability: u32) {
            self.gl.enable(capability);
        }

        fn disable(&self, capability: u32) {
            self.gl.disable(capability);
        }

        fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
            self.gl.viewport(x, y, width, height);
        }

        fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
            self.gl.scissor(x, y, width, height);
        }

        fn depth_range(&self, near: f32, far: f32) {
            self.gl.depth_range(near, far);
        }

        fn depth_func(&self, func: u32) {
            self.gl.depth_func(func);
        }

        fn depth_mask(&self, flag: bool) {
            self.gl.depth_mask(flag);
        }

        fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
            self.gl.color_mask(red, green, blue, alpha);
        }

        fn cull_face(&self, mode: u32) {
            self.gl.cull_face(mode);
        }

        fn front_face(&self, mode: u32) {
            self.gl.front_face(mode);
        }

        fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32) {
            self.gl.stencil_func_separate(face, func, reference, mask);
        }

        fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
            self.gl.stencil_op_separate(face, fail, depth_fail, pass);
        }

        fn stencil_mask_separate(&self, face: u32, mask: u32) {
            self.gl.stencil_mask_separate(face, mask);
        }

        fn blend_func_separate(
            &self,
            source_rgb: u32,
            destination_rgb: u32,
            source_alpha: u32,
            destination_alpha: u32,
        ) {
            self.gl.blend_func_separate(
                source_rgb,
                destination_rgb,
                source_alpha,
                destination_alpha,
            );
        }

        fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
            self.gl.blend_equation_separate(mode_rgb, mode_alpha);
        }

        fn blend_color(&self, color: [f32; 4]) {
            self.gl.blend_color(color[0], color[1], color[2], color[3]);
        }

        fn create_shader(&self, stage: u32) -> Option<WebGlShader> {
            self.gl.create_shader(stage)
        }

        fn delete_shader(&self, shader: &WebGlShader) {
            self.gl.delete_shader(Some(shader));
        }

        fn shader_source(&self, shader: &WebGlShader, source: &str) {
            self.gl.shader_source(shader, source);
        }

        fn compile_shader(&self, shader: &WebGlShader) {
            self.gl.compile_shader(shader);
        }

        fn shader_compile_status(&self, shader: &WebGlShader) -> bool {
            self.gl
                .get_shader_parameter(shader, Gl::COMPILE_STATUS)
                .as_bool()
                .unwrap_or(false)
        }

        fn shader_info_log(&self, shader: &WebGlShader) -> String {
            self.gl.get_shader_info_log(shader).unwrap_or_default()
        }

        fn create_program(&self) -> Option<WebGlProgram> {
            self.gl.create_program()
        }

        fn delete_program(&self, program: &WebGlProgram) {
            self.gl.delete_program(Some(program));
        }

        fn attach_shader(&self, program: &WebGlProgram, shader: &WebGlShader) {
            self.gl.attach_shader(program, shader);
        }

        fn link_program(&self, program: &WebGlProgram) {
            self.gl.link_program(program);
        }

        fn program_link_status(&self, program: &WebGlProgram) -> bool {
            self.gl
                .get_program_parameter(program, Gl::LINK_STATUS)
                .as_bool()
                .unwrap_or(false)
        }

        fn program_info_log(&self, program: &WebGlProgram) -> String {
            self.gl.get_program_info_log(program).unwrap_or_default()
        }

        fn use_program(&self, program: Option<&WebGlProgram>) {
            self.gl.use_program(program);
        }

        fn active_attribute_count(&self, program: &WebGlProgram) -> u32 {
            self.gl
                .get_program_parameter(program, Gl::ACTIVE_ATTRIBUTES)
                .as_f64()
                .unwrap_or(0.0) as u32
        }

        fn active_attribute(&self, program: &WebGlProgram, index: u32) -> Option<ActiveInfo> {
            self.gl
                .get_active_attrib(program, index)
                .map(|info| ActiveInfo {
                    name: info.name(),
                    size: info.size(),
                    type_: info.type_(),
                })
        }

        fn attribute_location(&self, program: &WebGlProgram, name: &str) -> i32 {
            self.gl.get_attrib_location(program, name)
        }

        fn active_uniform_count(&self, program: &WebGlProgram) -> u32 {
            self.gl
                .get_program_parameter(program, Gl::ACTIVE_UNIFORMS)
                .as_f64()
                .unwrap_or(0.0) as u32
        }

        fn active_uniform(&self, program: &WebGlProgram, index: u32) -> Option<ActiveInfo> {
            self.gl
                .get_active_uniform(program, index)
                .map(|info| ActiveInfo {
                    name: info.name(),
                    size: info.size(),
                    type_: info.type_(),
                })
        }

        fn uniform_location(
            &self,
            program: &WebGlProgram,
            name: &str,
        ) -> Option<WebGlUniformLocation> {
            self.gl.get_uniform_location(program, name)
        }

        fn uniform_f32(&self, location: &WebGlUniformLocation, components: usize, data: &[f32]) {
            let location = Some(location);

            match components {
                1 => self.gl.uniform1fv_with_f32_array(location, data),
                2 => self.gl.uniform2fv_with_f32_array(location, data),
                3 => self.gl.uniform3fv_with_f32_array(location, data),
                _ => self.gl.uniform4fv_with_f32_array(location, data),
            }
        }

        fn uniform_i32(&self, location: &WebGlUniformLocation, components: usize, data: &[i32]) {
            let location = Some(location);

            match components {
                1 => self.gl.uniform1iv_with_i32_array(location, data),
                2 => self.gl.uniform2iv_with_i32_array(location, data),
                3 => self.gl.uniform3iv_with_i32_array(location, data),
                _ => self.gl.uniform4iv_with_i32_array(location, data),
            }
        }

        fn enable_vertex_attrib_array(&self, location: u32) {
            self.gl.enable_vertex_attrib_array(location);
        }

        fn disable_vertex_attrib_array(&self, location: u32) {
            self.gl.disable_vertex_attrib_array(location);
        }

        fn vertex_attrib_pointer(
            &self,
            location: u32,
            size: u32,
            type_: u32,
            normalized: bool,
            stride: u32,
            offset: u32,
        ) {
            self.gl.vertex_attrib_pointer_with_i32(
                location,
                size as i32,
                type_,
                normalized,
                stride as i32,
                offset as i32,
            );
        }

        fn draw_arrays(&self, mode: u32, first: u32, count: u32) {
            self.gl.draw_arrays(mode, first as i32, count as i32);
        }

        fn draw_elements(&self, mode: u32, count: u32, type_: u32, offset: u32) {
            self.gl
                .draw_elements_with_i32(mode, count as i32, type_, offset as i32);
        }
    };
}

/// A WebGL 2.0 [Backend].
#[derive(Clone, Debug)]
pub struct WebGl2Context {
    gl: Gl,
}

impl WebGl2Context {
    pub fn new(gl: Gl) -> Self {
        WebGl2Context { gl }
    }

    pub fn gl(&self) -> &Gl {
        &self.gl
    }
}

impl Backend for WebGl2Context {
    common_methods!(
        tex_image_2d_with_u32_and_u32_and_html_image_element,
        tex_image_2d_with_u32_and_u32_and_html_canvas_element,
        tex_image_2d_with_u32_and_u32_and_html_video_element
    );

    fn version(&self) -> GlVersion {
        GlVersion::WebGl2
    }

    fn supports_vertex_arrays(&self) -> bool {
        true
    }

    fn supports_instancing(&self) -> bool {
        true
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: u32,
        write_offset: u32,
        size: u32,
    ) {
        self.gl.copy_buffer_sub_data_with_i32_and_i32_and_i32(
            read_target,
            write_target,
            read_offset as i32,
            write_offset as i32,
            size as i32,
        );
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<&WebGlBuffer>) {
        self.gl.bind_buffer_base(target, index, buffer);
    }

    fn bind_buffer_range(
        &self,
        target: u32,
        index: u32,
        buffer: &WebGlBuffer,
        offset: u32,
        size: u32,
    ) {
        self.gl.bind_buffer_range_with_i32_and_i32(
            target,
            index,
            Some(buffer),
            offset as i32,
            size as i32,
        );
    }

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
    ) -> Result<(), BackendError> {
        self.gl
            .tex_image_3d_with_opt_u8_array(
                target,
                level as i32,
                internal_format as i32,
                width as i32,
                height as i32,
                depth as i32,
                0,
                format,
                type_,
                data,
            )
            .map_err(js_error)
    }

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
    ) -> Result<(), BackendError> {
        self.gl
            .tex_sub_image_3d_with_opt_u8_array(
                target,
                level as i32,
                offset.0 as i32,
                offset.1 as i32,
                offset.2 as i32,
                width as i32,
                height as i32,
                1,
                format,
                type_,
                Some(data),
            )
            .map_err(js_error)
    }

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
    ) -> Result<(), BackendError> {
        let level = level as i32;
        let (x, y, z) = (offset.0 as i32, offset.1 as i32, offset.2 as i32);
        let (width, height) = (width as i32, height as i32);

        match element {
            ImageElement::Image(image) => self.gl.tex_sub_image_3d_with_html_image_element(
                target, level, x, y, z, width, height, 1, format, type_, image,
            ),
            ImageElement::Canvas(canvas) => self.gl.tex_sub_image_3d_with_html_canvas_element(
                target, level, x, y, z, width, height, 1, format, type_, canvas,
            ),
            ImageElement::Video(video) => self.gl.tex_sub_image_3d_with_html_video_element(
                target, level, x, y, z, width, height, 1, format, type_, video,
            ),
            ImageElement::Bitmap(bitmap) => self.gl.tex_sub_image_3d_with_image_bitmap(
                target, level, x, y, z, width, height, 1, format, type_, bitmap,
            ),
        }
        .map_err(js_error)
    }

    fn create_sampler(&self) -> Option<WebGlSampler> {
        self.gl.create_sampler()
    }

    fn delete_sampler(&self, sampler: &WebGlSampler) {
        self.gl.delete_sampler(Some(sampler));
    }

    fn bind_sampler(&self, unit: u32, sampler: Option<&WebGlSampler>) {
        self.gl.bind_sampler(unit, sampler);
    }

    fn sampler_parameteri(&self, sampler: &WebGlSampler, pname: u32, param: i32) {
        self.gl.sampler_parameteri(sampler, pname, param);
    }

    fn sampler_parameterf(&self, sampler: &WebGlSampler, pname: u32, param: f32) {
        self.gl.sampler_parameterf(sampler, pname, param);
    }

    fn supported_samples(&self, internal_format: u32) -> Vec<u32> {
        self.gl
            .get_internalformat_parameter(Gl::RENDERBUFFER, internal_format, Gl::SAMPLES)
            .ok()
            .and_then(|value| value.dyn_into::<Int32Array>().ok())
            .map(|samples| samples.to_vec().into_iter().map(|s| s as u32).collect())
            .unwrap_or_default()
    }

    fn renderbuffer_storage_multisample(
        &self,
        samples: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    ) {
        self.gl.renderbuffer_storage_multisample(
            Gl::RENDERBUFFER,
            samples as i32,
            internal_format,
            width as i32,
            height as i32,
        );
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: &WebGlTexture,
        level: u32,
        layer: u32,
    ) {
        self.gl.framebuffer_texture_layer(
            target,
            attachment,
            Some(texture),
            level as i32,
            layer as i32,
        );
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        let array = buffers
            .iter()
            .map(|buffer| JsValue::from(*buffer))
            .collect::<Array>();

        self.gl.draw_buffers(&array);
    }

    fn read_buffer(&self, source: u32) {
        self.gl.read_buffer(source);
    }

    fn blit_framebuffer(&self, source: [i32; 4], destination: [i32; 4], mask: u32, filter: u32) {
        self.gl.blit_framebuffer(
            source[0],
            source[1],
            source[2],
            source[3],
            destination[0],
            destination[1],
            destination[2],
            destination[3],
            mask,
            filter,
        );
    }

    fn clear_bufferfv(&self, buffer: u32, draw_buffer: u32, values: &[f32]) {
        self.gl
            .clear_bufferfv_with_f32_array(buffer, draw_buffer as i32, values);
    }

    fn clear_bufferiv(&self, buffer: u32, draw_buffer: u32, values: &[i32]) {
        self.gl
            .clear_bufferiv_with_i32_array(buffer, draw_buffer as i32, values);
    }

    fn clear_bufferuiv(&self, buffer: u32, draw_buffer: u32, values: &[u32]) {
        self.gl
            .clear_bufferuiv_with_u32_array(buffer, draw_buffer as i32, values);
    }

    fn clear_bufferfi(&self, buffer: u32, draw_buffer: u32, depth: f32, stencil: i32) {
        self.gl
            .clear_bufferfi(buffer, draw_buffer as i32, depth, stencil);
    }

    fn transform_feedback_varyings(
        &self,
        program: &WebGlProgram,
        varyings: &[String],
        buffer_mode: u32,
    ) {
        let array = varyings
            .iter()
            .map(|name| JsValue::from_str(name))
            .collect::<Array>();

        self.gl
            .transform_feedback_varyings(program, &array, buffer_mode);
    }

    fn active_uniform_block_indices(&self, program: &WebGlProgram, count: u32) -> Vec<i32> {
        if count == 0 {
            return Vec::new();
        }

        let indices = (0..count).map(JsValue::from).collect::<Array>();
        let block_indices = self
            .gl
            .get_active_uniforms(program, &indices, Gl::UNIFORM_BLOCK_INDEX);

        match block_indices.dyn_into::<Array>() {
            Ok(array) => array
                .iter()
                .map(|value| value.as_f64().unwrap_or(-1.0) as i32)
                .collect(),
            Err(_) => vec![-1; count as usize],
        }
    }

    fn active_uniform_block_count(&self, program: &WebGlProgram) -> u32 {
        self.gl
            .get_program_parameter(program, Gl::ACTIVE_UNIFORM_BLOCKS)
            .as_f64()
            .unwrap_or(0.0) as u32
    }

    fn active_uniform_block_name(&self, program: &WebGlProgram, index: u32) -> Option<String> {
        self.gl.get_active_uniform_block_name(program, index)
    }

    fn uniform_block_binding(&self, program: &WebGlProgram, block_index: u32, binding: u32) {
        self.gl.uniform_block_binding(program, block_index, binding);
    }

    fn uniform_u32(&self, location: &WebGlUniformLocation, components: usize, data: &[u32]) {
        let location = Some(location);

        match components {
            1 => self.gl.uniform1uiv_with_u32_array(location, data),
            2 => self.gl.uniform2uiv_with_u32_array(location, data),
            3 => self.gl.uniform3uiv_with_u32_array(location, data),
            _ => self.gl.uniform4uiv_with_u32_array(location, data),
        }
    }

    fn uniform_matrix(
        &self,
        location: &WebGlUniformLocation,
        columns: usize,
        rows: usize,
        data: &[f32],
    ) {
        let location = Some(location);

        match (columns, rows) {
            (2, 2) => self.gl.uniform_matrix2fv_with_f32_array(location, false, data),
            (3, 3) => self.gl.uniform_matrix3fv_with_f32_array(location, false, data),
            (2, 3) => self
                .gl
                .uniform_matrix2x3fv_with_f32_array(location, false, data),
            (2, 4) => self
                .gl
                .uniform_matrix2x4fv_with_f32_array(location, false, data),
            (3, 2) => self
                .gl
                .uniform_matrix3x2fv_with_f32_array(location, false, data),
            (3, 4) => self
                .gl
                .uniform_matrix3x4fv_with_f32_array(location, false, data),
            (4, 2) => self
                .gl
                .uniform_matrix4x2fv_with_f32_array(location, false, data),
            (4, 3) => self
                .gl
                .uniform_matrix4x3fv_with_f32_array(location, false, data),
            _ => self.gl.uniform_matrix4fv_with_f32_array(location, false, data),
        }
    }

    fn vertex_attrib_i_pointer(
        &self,
        location: u32,
        size: u32,
        type_: u32,
        stride: u32,
        offset: u32,
    ) {
        self.gl.vertex_attrib_i_pointer_with_i32(
            location,
            size as i32,
            type_,
            stride as i32,
            offset as i32,
        );
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) -> bool {
        self.gl.vertex_attrib_divisor(location, divisor);

        true
    }

    fn create_vertex_array(&self) -> Option<WebGlVertexArrayObject> {
        self.gl.create_vertex_array()
    }

    fn delete_vertex_array(&self, vertex_array: &WebGlVertexArrayObject) {
        self.gl.delete_vertex_array(Some(vertex_array));
    }

    fn bind_vertex_array(&self, vertex_array: Option<&WebGlVertexArrayObject>) {
        self.gl.bind_vertex_array(vertex_array);
    }

    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32) -> bool {
        self.gl
            .draw_arrays_instanced(mode, first as i32, count as i32, instances as i32);

        true
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: u32,
        type_: u32,
        offset: u32,
        instances: u32,
    ) -> bool {
        self.gl.draw_elements_instanced_with_i32(
            mode,
            count as i32,
            type_,
            offset as i32,
            instances as i32,
        );

        true
    }

    fn create_query(&self) -> Option<WebGlQuery> {
        self.gl.create_query()
    }

    fn delete_query(&self, query: &WebGlQuery) {
        self.gl.delete_query(Some(query));
    }

    fn begin_query(&self, target: u32, query: &WebGlQuery) {
        self.gl.begin_query(target, query);
    }

    fn end_query(&self, target: u32) {
        self.gl.end_query(target);
    }

    fn query_result_available(&self, query: &WebGlQuery) -> bool {
        self.gl
            .get_query_parameter(query, Gl::QUERY_RESULT_AVAILABLE)
            .as_bool()
            .unwrap_or(false)
    }

    fn query_result(&self, query: &WebGlQuery) -> u32 {
        let result = self.gl.get_query_parameter(query, Gl::QUERY_RESULT);

        // ANY_SAMPLES_PASSED reports a boolean, other targets a count.
        match result.as_bool() {
            Some(passed) => passed as u32,
            None => result.as_f64().unwrap_or(0.0) as u32,
        }
    }

    fn create_transform_feedback(&self) -> Option<WebGlTransformFeedback> {
        self.gl.create_transform_feedback()
    }

    fn delete_transform_feedback(&self, transform_feedback: &WebGlTransformFeedback) {
        self.gl.delete_transform_feedback(Some(transform_feedback));
    }

    fn bind_transform_feedback(&self, transform_feedback: Option<&WebGlTransformFeedback>) {
        self.gl
            .bind_transform_feedback(Gl::TRANSFORM_FEEDBACK, transform_feedback);
    }

    fn begin_transform_feedback(&self, primitive_mode: u32) {
        self.gl.begin_transform_feedback(primitive_mode);
    }

    fn end_transform_feedback(&self) {
        self.gl.end_transform_feedback();
    }
}

/// A WebGL 1.0 [Backend].
///
/// Instanced drawing is only available if the browser supports `ANGLE_instanced_arrays`, vertex
/// array objects only if it supports `OES_vertex_array_object`. Everything that only exists in
/// WebGL 2.0 (samplers, queries, transform feedback, blitting, buffer copies, 3D textures) is a
/// no-op.
#[derive(Clone, Debug)]
pub struct WebGl1Context {
    gl: WebGlRenderingContext,
    instanced_arrays: Option<AngleInstancedArrays>,
    vertex_array_objects: Option<OesVertexArrayObject>,
}

impl WebGl1Context {
    pub fn new(gl: WebGlRenderingContext) -> Self {
        let instanced_arrays = gl
            .get_extension("ANGLE_instanced_arrays")
            .ok()
            .flatten()
            .map(|extension| extension.unchecked_into::<AngleInstancedArrays>());
        let vertex_array_objects = gl
            .get_extension("OES_vertex_array_object")
            .ok()
            .flatten()
            .map(|extension| extension.unchecked_into::<OesVertexArrayObject>());

        WebGl1Context {
            gl,
            instanced_arrays,
            vertex_array_objects,
        }
    }

    pub fn gl(&self) -> &WebGlRenderingContext {
        &self.gl
    }
}

impl Backend for WebGl1Context {
    common_methods!(
        tex_image_2d_with_u32_and_u32_and_image,
        tex_image_2d_with_u32_and_u32_and_canvas,
        tex_image_2d_with_u32_and_u32_and_video
    );

    fn version(&self) -> GlVersion {
        GlVersion::WebGl1
    }

    fn supports_vertex_arrays(&self) -> bool {
        self.vertex_array_objects.is_some()
    }

    fn supports_instancing(&self) -> bool {
        self.instanced_arrays.is_some()
    }

    fn copy_buffer_sub_data(&self, _: u32, _: u32, _: u32, _: u32, _: u32) {}

    fn bind_buffer_base(&self, _: u32, _: u32, _: Option<&WebGlBuffer>) {}

    fn bind_buffer_range(&self, _: u32, _: u32, _: &WebGlBuffer, _: u32, _: u32) {}

    fn tex_image_3d(
        &self,
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: Option<&[u8]>,
    ) -> Result<(), BackendError> {
        Err(BackendError(
            "3D textures are not supported in WebGL 1.0".to_string(),
        ))
    }

    fn tex_sub_image_3d(
        &self,
        _: u32,
        _: u32,
        _: (u32, u32, u32),
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: &[u8],
    ) -> Result<(), BackendError> {
        Err(BackendError(
            "3D textures are not supported in WebGL 1.0".to_string(),
        ))
    }

    fn tex_sub_image_3d_with_element(
        &self,
        _: u32,
        _: u32,
        _: (u32, u32, u32),
        _: u32,
        _: u32,
        _: u32,
        _: u32,
        _: &ImageElement,
    ) -> Result<(), BackendError> {
        Err(BackendError(
            "3D textures are not supported in WebGL 1.0".to_string(),
        ))
    }

    fn create_sampler(&self) -> Option<WebGlSampler> {
        None
    }

    fn delete_sampler(&self, _: &WebGlSampler) {}

    fn bind_sampler(&self, _: u32, _: Option<&WebGlSampler>) {}

    fn sampler_parameteri(&self, _: &WebGlSampler, _: u32, _: i32) {}

    fn sampler_parameterf(&self, _: &WebGlSampler, _: u32, _: f32) {}

    fn supported_samples(&self, _: u32) -> Vec<u32> {
        Vec::new()
    }

    fn renderbuffer_storage_multisample(
        &self,
        _: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    ) {
        self.renderbuffer_storage(internal_format, width, height);
    }

    fn framebuffer_texture_layer(&self, _: u32, _: u32, _: &WebGlTexture, _: u32, _: u32) {}

    fn draw_buffers(&self, _: &[u32]) {}

    fn read_buffer(&self, _: u32) {}

    fn blit_framebuffer(&self, _: [i32; 4], _: [i32; 4], _: u32, _: u32) {}

    fn clear_bufferfv(&self, _: u32, _: u32, _: &[f32]) {}

    fn clear_bufferiv(&self, _: u32, _: u32, _: &[i32]) {}

    fn clear_bufferuiv(&self, _: u32, _: u32, _: &[u32]) {}

    fn clear_bufferfi(&self, _: u32, _: u32, _: f32, _: i32) {}

    fn transform_feedback_varyings(&self, _: &WebGlProgram, _: &[String], _: u32) {}

    fn active_uniform_block_indices(&self, _: &WebGlProgram, count: u32) -> Vec<i32> {
        vec![-1; count as usize]
    }

    fn active_uniform_block_count(&self, _: &WebGlProgram) -> u32 {
        0
    }

    fn active_uniform_block_name(&self, _: &WebGlProgram, _: u32) -> Option<String> {
        None
    }

    fn uniform_block_binding(&self, _: &WebGlProgram, _: u32, _: u32) {}

    fn uniform_u32(&self, _: &WebGlUniformLocation, _: usize, _: &[u32]) {}

    fn uniform_matrix(
        &self,
        location: &WebGlUniformLocation,
        columns: usize,
        _rows: usize,
        data: &[f32],
    ) {
        let location = Some(location);

        match columns {
            2 => self.gl.uniform_matrix2fv_with_f32_array(location, false, data),
            3 => self.gl.uniform_matrix3fv_with_f32_array(location, false, data),
            _ => self.gl.uniform_matrix4fv_with_f32_array(location, false, data),
        }
    }

    fn vertex_attrib_i_pointer(&self, _: u32, _: u32, _: u32, _: u32, _: u32) {}

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) -> bool {
        if let Some(extension) = &self.instanced_arrays {
            extension.vertex_attrib_divisor_angle(location, divisor);

            true
        } else {
            false
        }
    }

    fn create_vertex_array(&self) -> Option<WebGlVertexArrayObject> {
        self.vertex_array_objects
            .as_ref()
            .and_then(|extension| extension.create_vertex_array_oes())
    }

    fn delete_vertex_array(&self, vertex_array: &WebGlVertexArrayObject) {
        if let Some(extension) = &self.vertex_array_objects {
            extension.delete_vertex_array_oes(Some(vertex_array));
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<&WebGlVertexArrayObject>) {
        if let Some(extension) = &self.vertex_array_objects {
            extension.bind_vertex_array_oes(vertex_array);
        }
    }

    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32) -> bool {
        if let Some(extension) = &self.instanced_arrays {
            extension.draw_arrays_instanced_angle(
                mode,
                first as i32,
                count as i32,
                instances as i32,
            );

            true
        } else {
            false
        }
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: u32,
        type_: u32,
        offset: u32,
        instances: u32,
    ) -> bool {
        if let Some(extension) = &self.instanced_arrays {
            extension.draw_elements_instanced_angle_with_i32(
                mode,
                count as i32,
                type_,
                offset as i32,
                instances as i32,
            );

            true
        } else {
            false
        }
    }

    fn create_query(&self) -> Option<WebGlQuery> {
        None
    }

    fn delete_query(&self, _: &WebGlQuery) {}

    fn begin_query(&self, _: u32, _: &WebGlQuery) {}

    fn end_query(&self, _: u32) {}

    fn query_result_available(&self, _: &WebGlQuery) -> bool {
        false
    }

    fn query_result(&self, _: &WebGlQuery) -> u32 {
        0
    }

    fn create_transform_feedback(&self) -> Option<WebGlTransformFeedback> {
        None
    }

    fn delete_transform_feedback(&self, _: &WebGlTransformFeedback) {}

    fn bind_transform_feedback(&self, _: Option<&WebGlTransformFeedback>) {}

    fn begin_transform_feedback(&self, _: u32) {}

    fn end_transform_feedback(&self) {}
}
