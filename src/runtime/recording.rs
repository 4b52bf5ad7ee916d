//! A [Backend] that records every call made to it, for testing the device without a browser.
//!
//! GL objects are plain `u32` names handed out in creation order. Shader compilation fails for
//! sources that contain `#error`. Program interfaces (attributes, uniforms, uniform blocks) are
//! registered up front against a vertex shader source with [RecordingBackend::set_interface].
use std::cell::{Cell, RefCell};
use std::sync::Once;

use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::ImageElement;
use crate::runtime::backend::{ActiveInfo, Backend, BackendError, GlVersion};

#[derive(Clone, Default, Debug)]
pub struct ProgramInterface {
    pub attributes: Vec<ActiveInfo>,
    pub uniforms: Vec<ActiveInfo>,
    /// For each uniform, the index of the block it belongs to or `-1`.
    pub uniform_blocks: Vec<i32>,
    pub blocks: Vec<String>,
    pub link_error: Option<String>,
}

impl ProgramInterface {
    pub fn attribute(mut self, name: &str, type_: u32) -> Self {
        self.attributes.push(ActiveInfo {
            name: name.to_string(),
            size: 1,
            type_,
        });

        self
    }

    pub fn uniform(mut self, name: &str, type_: u32, size: i32) -> Self {
        self.uniforms.push(ActiveInfo {
            name: name.to_string(),
            size,
            type_,
        });
        self.uniform_blocks.push(-1);

        self
    }

    pub fn block_uniform(mut self, name: &str, type_: u32, block: i32) -> Self {
        self.uniforms.push(ActiveInfo {
            name: name.to_string(),
            size: 1,
            type_,
        });
        self.uniform_blocks.push(block);

        self
    }

    pub fn block(mut self, name: &str) -> Self {
        self.blocks.push(name.to_string());

        self
    }

    pub fn link_error(mut self, log: &str) -> Self {
        self.link_error = Some(log.to_string());

        self
    }
}

thread_local!(static LOG_RECORDS: RefCell<Vec<(log::Level, String)>> = RefCell::new(Vec::new()));

/// Forwards to `env_logger`, so failing tests show the device's log output, and keeps the
/// records of the current thread for [logged].
struct CapturingLogger {
    inner: env_logger::Logger,
}

impl log::Log for CapturingLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOG_RECORDS.with(|records| {
            records
                .borrow_mut()
                .push((record.level(), record.args().to_string()))
        });

        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn init_logger() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let inner = env_logger::builder().is_test(true).build();

        if log::set_logger(Box::leak(Box::new(CapturingLogger { inner }))).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// The messages logged at `level` on the current thread so far.
pub fn logged(level: log::Level) -> Vec<String> {
    LOG_RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .filter(|(record_level, _)| *record_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

pub struct RecordingBackend {
    version: GlVersion,
    instancing: bool,
    vertex_arrays: bool,
    next_object: Cell<u32>,
    calls: RefCell<Vec<(&'static str, String)>>,
    shaders: RefCell<FnvHashMap<u32, String>>,
    program_shaders: RefCell<FnvHashMap<u32, Vec<u32>>>,
    program_interfaces: RefCell<FnvHashMap<u32, ProgramInterface>>,
    interfaces: RefCell<FnvHashMap<String, ProgramInterface>>,
    context_lost: Cell<bool>,
    framebuffer_status: Cell<u32>,
    query_available: Cell<bool>,
    query_result: Cell<u32>,
    sample_counts: RefCell<FnvHashMap<u32, Vec<u32>>>,
}

impl RecordingBackend {
    fn new(version: GlVersion, instancing: bool, vertex_arrays: bool) -> Self {
        init_logger();

        RecordingBackend {
            version,
            instancing,
            vertex_arrays,
            next_object: Cell::new(1),
            calls: RefCell::new(Vec::new()),
            shaders: RefCell::new(FnvHashMap::default()),
            program_shaders: RefCell::new(FnvHashMap::default()),
            program_interfaces: RefCell::new(FnvHashMap::default()),
            interfaces: RefCell::new(FnvHashMap::default()),
            context_lost: Cell::new(false),
            framebuffer_status: Cell::new(Gl::FRAMEBUFFER_COMPLETE),
            query_available: Cell::new(false),
            query_result: Cell::new(0),
            sample_counts: RefCell::new(FnvHashMap::default()),
        }
    }

    pub fn webgl2() -> Self {
        RecordingBackend::new(GlVersion::WebGl2, true, true)
    }

    /// A WebGL 1.0 backend with both `ANGLE_instanced_arrays` and `OES_vertex_array_object`.
    pub fn webgl1() -> Self {
        RecordingBackend::new(GlVersion::WebGl1, true, true)
    }

    pub fn webgl1_without_extensions() -> Self {
        RecordingBackend::new(GlVersion::WebGl1, false, false)
    }

    pub fn set_interface(&self, vertex_source: &str, interface: ProgramInterface) {
        self.interfaces
            .borrow_mut()
            .insert(vertex_source.to_string(), interface);
    }

    pub fn lose_context(&self) {
        self.context_lost.set(true);
    }

    pub fn set_framebuffer_status(&self, status: u32) {
        self.framebuffer_status.set(status);
    }

    pub fn set_query_result(&self, available: bool, result: u32) {
        self.query_available.set(available);
        self.query_result.set(result);
    }

    /// Overrides the sample counts reported for an internal format. Every format supports 4 and
    /// 2 samples on WebGL 2.0 by default.
    pub fn set_supported_samples(&self, internal_format: u32, samples: Vec<u32>) {
        self.sample_counts
            .borrow_mut()
            .insert(internal_format, samples);
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(call, _)| *call == name)
            .count()
    }

    /// The arguments of every call to `name`, in order.
    pub fn calls_named(&self, name: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|(call, _)| *call == name)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// The names of all calls, in order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|(call, _)| *call).collect()
    }

    /// Position of the first call to `name`, if any.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|(call, _)| *call == name)
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, name: &'static str, args: String) {
        self.calls.borrow_mut().push((name, args));
    }

    fn create(&self, name: &'static str) -> u32 {
        let object = self.next_object.get();

        self.next_object.set(object + 1);
        self.record(name, object.to_string());

        object
    }

    fn interface<R>(&self, program: &u32, f: impl FnOnce(&ProgramInterface) -> R) -> Option<R> {
        self.program_interfaces.borrow().get(program).map(f)
    }
}

impl Backend for RecordingBackend {
    type Buffer = u32;
    type Texture = u32;
    type Sampler = u32;
    type Renderbuffer = u32;
    type Framebuffer = u32;
    type Shader = u32;
    type Program = u32;
    type UniformLocation = String;
    type VertexArray = u32;
    type Query = u32;
    type TransformFeedback = u32;

    fn version(&self) -> GlVersion {
        self.version
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost.get()
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (300, 150)
    }

    fn supports_vertex_arrays(&self) -> bool {
        self.vertex_arrays
    }

    fn supports_instancing(&self) -> bool {
        self.instancing
    }

    fn create_buffer(&self) -> Option<u32> {
        Some(self.create("create_buffer"))
    }

    fn delete_buffer(&self, buffer: &u32) {
        self.record("delete_buffer", buffer.to_string());
    }

    fn bind_buffer(&self, target: u32, buffer: Option<&u32>) {
        self.record("bind_buffer", format!("{} {:?}", target, buffer));
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        self.record("buffer_data", format!("{} {:?} {}", target, data, usage));
    }

    fn buffer_sub_data(&self, target: u32, offset: u32, data: &[u8]) {
        self.record("buffer_sub_data", format!("{} {} {:?}", target, offset, data));
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: u32,
        write_offset: u32,
        size: u32,
    ) {
        self.record(
            "copy_buffer_sub_data",
            format!(
                "{} {} {} {} {}",
                read_target, write_target, read_offset, write_offset, size
            ),
        );
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: Option<&u32>) {
        self.record(
            "bind_buffer_base",
            format!("{} {} {:?}", target, index, buffer),
        );
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: &u32, offset: u32, size: u32) {
        self.record(
            "bind_buffer_range",
            format!("{} {} {} {} {}", target, index, buffer, offset, size),
        );
    }

    fn create_texture(&self) -> Option<u32> {
        Some(self.create("create_texture"))
    }

    fn delete_texture(&self, texture: &u32) {
        self.record("delete_texture", texture.to_string());
    }

    fn active_texture(&self, unit: u32) {
        self.record("active_texture", unit.to_string());
    }

    fn bind_texture(&self, target: u32, texture: Option<&u32>) {
        self.record("bind_texture", format!("{} {:?}", target, texture));
    }

    fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
        self.record("tex_parameteri", format!("{} {} {}", target, pname, param));
    }

    fn tex_parameterf(&self, target: u32, pname: u32, param: f32) {
        self.record("tex_parameterf", format!("{} {} {}", target, pname, param));
    }

    fn pixel_storei(&self, pname: u32, param: i32) {
        self.record("pixel_storei", format!("{} {}", pname, param));
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
        self.record(
            "tex_image_2d",
            format!(
                "{} {} {} {}x{} {} {} {}",
                target,
                level,
                internal_format,
                width,
                height,
                format,
                type_,
                data.map(|data| data.len()).unwrap_or(0)
            ),
        );

        Ok(())
    }

    fn tex_image_2d_with_element(
        &self,
        target: u32,
        level: u32,
        internal_format: u32,
        format: u32,
        type_: u32,
        _element: &ImageElement,
    ) -> Result<(), BackendError> {
        self.record(
            "tex_image_2d_with_element",
            format!(
                "{} {} {} {} {}",
                target, level, internal_format, format, type_
            ),
        );

        Ok(())
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
        self.record(
            "tex_image_3d",
            format!(
                "{} {} {} {}x{}x{} {} {} {}",
                target,
                level,
                internal_format,
                width,
                height,
                depth,
                format,
                type_,
                data.map(|data| data.len()).unwrap_or(0)
            ),
        );

        Ok(())
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
        if !self.version.is_webgl2() {
            return Err(BackendError(
                "3D textures are not supported in WebGL 1.0".to_string(),
            ));
        }

        self.record(
            "tex_sub_image_3d",
            format!(
                "{} {} {:?} {}x{} {} {} {}",
                target,
                level,
                offset,
                width,
                height,
                format,
                type_,
                data.len()
            ),
        );

        Ok(())
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
        _element: &ImageElement,
    ) -> Result<(), BackendError> {
        self.record(
            "tex_sub_image_3d_with_element",
            format!(
                "{} {} {:?} {}x{} {} {}",
                target, level, offset, width, height, format, type_
            ),
        );

        Ok(())
    }

    fn generate_mipmap(&self, target: u32) {
        self.record("generate_mipmap", target.to_string());
    }

    fn create_sampler(&self) -> Option<u32> {
        if self.version.is_webgl2() {
            Some(self.create("create_sampler"))
        } else {
            None
        }
    }

    fn delete_sampler(&self, sampler: &u32) {
        self.record("delete_sampler", sampler.to_string());
    }

    fn bind_sampler(&self, unit: u32, sampler: Option<&u32>) {
        self.record("bind_sampler", format!("{} {:?}", unit, sampler));
    }

    fn sampler_parameteri(&self, sampler: &u32, pname: u32, param: i32) {
        self.record(
            "sampler_parameteri",
            format!("{} {} {}", sampler, pname, param),
        );
    }

    fn sampler_parameterf(&self, sampler: &u32, pname: u32, param: f32) {
        self.record(
            "sampler_parameterf",
            format!("{} {} {}", sampler, pname, param),
        );
    }

    fn create_renderbuffer(&self) -> Option<u32> {
        Some(self.create("create_renderbuffer"))
    }

    fn delete_renderbuffer(&self, renderbuffer: &u32) {
        self.record("delete_renderbuffer", renderbuffer.to_string());
    }

    fn bind_renderbuffer(&self, renderbuffer: Option<&u32>) {
        self.record("bind_renderbuffer", format!("{:?}", renderbuffer));
    }

    fn renderbuffer_storage(&self, internal_format: u32, width: u32, height: u32) {
        self.record(
            "renderbuffer_storage",
            format!("{} {}x{}", internal_format, width, height),
        );
    }

    fn supported_samples(&self, internal_format: u32) -> Vec<u32> {
        self.record("supported_samples", internal_format.to_string());

        if !self.version.is_webgl2() {
            return Vec::new();
        }

        self.sample_counts
            .borrow()
            .get(&internal_format)
            .cloned()
            .unwrap_or_else(|| vec![4, 2])
    }

    fn renderbuffer_storage_multisample(
        &self,
        samples: u32,
        internal_format: u32,
        width: u32,
        height: u32,
    ) {
        self.record(
            "renderbuffer_storage_multisample",
            format!("{} {} {}x{}", samples, internal_format, width, height),
        );
    }

    fn create_framebuffer(&self) -> Option<u32> {
        Some(self.create("create_framebuffer"))
    }

    fn delete_framebuffer(&self, framebuffer: &u32) {
        self.record("delete_framebuffer", framebuffer.to_string());
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<&u32>) {
        self.record("bind_framebuffer", format!("{} {:?}", target, framebuffer));
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: &u32,
        level: u32,
    ) {
        self.record(
            "framebuffer_texture_2d",
            format!(
                "{} {} {} {} {}",
                target, attachment, texture_target, texture, level
            ),
        );
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: &u32,
        level: u32,
        layer: u32,
    ) {
        self.record(
            "framebuffer_texture_layer",
            format!("{} {} {} {} {}", target, attachment, texture, level, layer),
        );
    }

    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, renderbuffer: &u32) {
        self.record(
            "framebuffer_renderbuffer",
            format!("{} {} {}", target, attachment, renderbuffer),
        );
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        self.record("check_framebuffer_status", target.to_string());

        self.framebuffer_status.get()
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        self.record("draw_buffers", format!("{:?}", buffers));
    }

    fn read_buffer(&self, source: u32) {
        self.record("read_buffer", source.to_string());
    }

    fn blit_framebuffer(&self, source: [i32; 4], destination: [i32; 4], mask: u32, filter: u32) {
        self.record(
            "blit_framebuffer",
            format!("{:?} {:?} {} {}", source, destination, mask, filter),
        );
    }

    fn clear_color(&self, color: [f32; 4]) {
        self.record("clear_color", format!("{:?}", color));
    }

    fn clear_depth(&self, depth: f32) {
        self.record("clear_depth", depth.to_string());
    }

    fn clear_stencil(&self, stencil: i32) {
        self.record("clear_stencil", stencil.to_string());
    }

    fn clear(&self, mask: u32) {
        self.record("clear", mask.to_string());
    }

    fn clear_bufferfv(&self, buffer: u32, draw_buffer: u32, values: &[f32]) {
        self.record(
            "clear_bufferfv",
            format!("{} {} {:?}", buffer, draw_buffer, values),
        );
    }

    fn clear_bufferiv(&self, buffer: u32, draw_buffer: u32, values: &[i32]) {
        self.record(
            "clear_bufferiv",
            format!("{} {} {:?}", buffer, draw_buffer, values),
        );
    }

    fn clear_bufferuiv(&self, buffer: u32, draw_buffer: u32, values: &[u32]) {
        self.record(
            "clear_bufferuiv",
            format!("{} {} {:?}", buffer, draw_buffer, values),
        );
    }

    fn clear_bufferfi(&self, buffer: u32, draw_buffer: u32, depth: f32, stencil: i32) {
        self.record(
            "clear_bufferfi",
            format!("{} {} {} {}", buffer, draw_buffer, depth, stencil),
        );
    }

    fn enable(&self, capability: u32) {
        self.record("enable", capability.to_string());
    }

    fn disable(&self, capability: u32) {
        self.record("disable", capability.to_string());
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record("viewport", format!("{} {} {} {}", x, y, width, height));
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record("scissor", format!("{} {} {} {}", x, y, width, height));
    }

    fn depth_range(&self, near: f32, far: f32) {
        self.record("depth_range", format!("{} {}", near, far));
    }

    fn depth_func(&self, func: u32) {
        self.record("depth_func", func.to_string());
    }

    fn depth_mask(&self, flag: bool) {
        self.record("depth_mask", flag.to_string());
    }

    fn color_mask(&self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.record(
            "color_mask",
            format!("{} {} {} {}", red, green, blue, alpha),
        );
    }

    fn cull_face(&self, mode: u32) {
        self.record("cull_face", mode.to_string());
    }

    fn front_face(&self, mode: u32) {
        self.record("front_face", mode.to_string());
    }

    fn stencil_func_separate(&self, face: u32, func: u32, reference: i32, mask: u32) {
        self.record(
            "stencil_func_separate",
            format!("{} {} {} {}", face, func, reference, mask),
        );
    }

    fn stencil_op_separate(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        self.record(
            "stencil_op_separate",
            format!("{} {} {} {}", face, fail, depth_fail, pass),
        );
    }

    fn stencil_mask_separate(&self, face: u32, mask: u32) {
        self.record("stencil_mask_separate", format!("{} {}", face, mask));
    }

    fn blend_func_separate(
        &self,
        source_rgb: u32,
        destination_rgb: u32,
        source_alpha: u32,
        destination_alpha: u32,
    ) {
        self.record(
            "blend_func_separate",
            format!(
                "{} {} {} {}",
                source_rgb, destination_rgb, source_alpha, destination_alpha
            ),
        );
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        self.record(
            "blend_equation_separate",
            format!("{} {}", mode_rgb, mode_alpha),
        );
    }

    fn blend_color(&self, color: [f32; 4]) {
        self.record("blend_color", format!("{:?}", color));
    }

    fn create_shader(&self, stage: u32) -> Option<u32> {
        let shader = self.create("create_shader");

        self.record("shader_stage", format!("{} {}", shader, stage));

        Some(shader)
    }

    fn delete_shader(&self, shader: &u32) {
        self.record("delete_shader", shader.to_string());
    }

    fn shader_source(&self, shader: &u32, source: &str) {
        self.shaders.borrow_mut().insert(*shader, source.to_string());
        self.record("shader_source", shader.to_string());
    }

    fn compile_shader(&self, shader: &u32) {
        self.record("compile_shader", shader.to_string());
    }

    fn shader_compile_status(&self, shader: &u32) -> bool {
        self.shaders
            .borrow()
            .get(shader)
            .map(|source| !source.contains("#error"))
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &u32) -> String {
        format!("ERROR: 0:1: shader {} failed to compile", shader)
    }

    fn create_program(&self) -> Option<u32> {
        Some(self.create("create_program"))
    }

    fn delete_program(&self, program: &u32) {
        self.record("delete_program", program.to_string());
    }

    fn attach_shader(&self, program: &u32, shader: &u32) {
        self.program_shaders
            .borrow_mut()
            .entry(*program)
            .or_default()
            .push(*shader);
        self.record("attach_shader", format!("{} {}", program, shader));
    }

    fn transform_feedback_varyings(&self, program: &u32, varyings: &[String], buffer_mode: u32) {
        self.record(
            "transform_feedback_varyings",
            format!("{} {:?} {}", program, varyings, buffer_mode),
        );
    }

    fn link_program(&self, program: &u32) {
        self.record("link_program", program.to_string());

        let shaders = self.shaders.borrow();
        let interfaces = self.interfaces.borrow();
        let interface = self
            .program_shaders
            .borrow()
            .get(program)
            .into_iter()
            .flatten()
            .filter_map(|shader| shaders.get(shader))
            .find_map(|source| interfaces.get(source).cloned())
            .unwrap_or_default();

        self.program_interfaces
            .borrow_mut()
            .insert(*program, interface);
    }

    fn program_link_status(&self, program: &u32) -> bool {
        self.interface(program, |interface| interface.link_error.is_none())
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &u32) -> String {
        self.interface(program, |interface| interface.link_error.clone())
            .flatten()
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<&u32>) {
        self.record("use_program", format!("{:?}", program));
    }

    fn active_attribute_count(&self, program: &u32) -> u32 {
        self.interface(program, |interface| interface.attributes.len() as u32)
            .unwrap_or(0)
    }

    fn active_attribute(&self, program: &u32, index: u32) -> Option<ActiveInfo> {
        self.interface(program, |interface| {
            interface.attributes.get(index as usize).cloned()
        })
        .flatten()
    }

    fn attribute_location(&self, program: &u32, name: &str) -> i32 {
        if name.starts_with("gl_") {
            return -1;
        }

        self.interface(program, |interface| {
            interface
                .attributes
                .iter()
                .position(|attribute| attribute.name == name)
                .map(|location| location as i32)
                .unwrap_or(-1)
        })
        .unwrap_or(-1)
    }

    fn active_uniform_count(&self, program: &u32) -> u32 {
        self.interface(program, |interface| interface.uniforms.len() as u32)
            .unwrap_or(0)
    }

    fn active_uniform(&self, program: &u32, index: u32) -> Option<ActiveInfo> {
        self.interface(program, |interface| {
            interface.uniforms.get(index as usize).cloned()
        })
        .flatten()
    }

    fn uniform_location(&self, program: &u32, name: &str) -> Option<String> {
        self.interface(program, |interface| {
            let known = interface.uniforms.iter().any(|uniform| {
                let base = uniform.name.trim_end_matches("[0]");

                uniform.name == name || name.starts_with(&format!("{}[", base))
            });

            if known {
                Some(name.to_string())
            } else {
                None
            }
        })
        .flatten()
    }

    fn active_uniform_block_indices(&self, program: &u32, count: u32) -> Vec<i32> {
        if !self.version.is_webgl2() {
            return vec![-1; count as usize];
        }

        self.interface(program, |interface| {
            (0..count as usize)
                .map(|i| interface.uniform_blocks.get(i).copied().unwrap_or(-1))
                .collect()
        })
        .unwrap_or_else(|| vec![-1; count as usize])
    }

    fn active_uniform_block_count(&self, program: &u32) -> u32 {
        if !self.version.is_webgl2() {
            return 0;
        }

        self.interface(program, |interface| interface.blocks.len() as u32)
            .unwrap_or(0)
    }

    fn active_uniform_block_name(&self, program: &u32, index: u32) -> Option<String> {
        self.interface(program, |interface| {
            interface.blocks.get(index as usize).cloned()
        })
        .flatten()
    }

    fn uniform_block_binding(&self, program: &u32, block_index: u32, binding: u32) {
        self.record(
            "uniform_block_binding",
            format!("{} {} {}", program, block_index, binding),
        );
    }

    fn uniform_f32(&self, location: &String, components: usize, data: &[f32]) {
        self.record(
            "uniform_f32",
            format!("{} {} {:?}", location, components, data),
        );
    }

    fn uniform_i32(&self, location: &String, components: usize, data: &[i32]) {
        self.record(
            "uniform_i32",
            format!("{} {} {:?}", location, components, data),
        );
    }

    fn uniform_u32(&self, location: &String, components: usize, data: &[u32]) {
        self.record(
            "uniform_u32",
            format!("{} {} {:?}", location, components, data),
        );
    }

    fn uniform_matrix(&self, location: &String, columns: usize, rows: usize, data: &[f32]) {
        self.record(
            "uniform_matrix",
            format!("{} {}x{} {:?}", location, columns, rows, data),
        );
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.record("enable_vertex_attrib_array", location.to_string());
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.record("disable_vertex_attrib_array", location.to_string());
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
        self.record(
            "vertex_attrib_pointer",
            format!(
                "{} {} {} {} {} {}",
                location, size, type_, normalized, stride, offset
            ),
        );
    }

    fn vertex_attrib_i_pointer(
        &self,
        location: u32,
        size: u32,
        type_: u32,
        stride: u32,
        offset: u32,
    ) {
        self.record(
            "vertex_attrib_i_pointer",
            format!("{} {} {} {} {}", location, size, type_, stride, offset),
        );
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) -> bool {
        if self.instancing {
            self.record("vertex_attrib_divisor", format!("{} {}", location, divisor));
        }

        self.instancing
    }

    fn create_vertex_array(&self) -> Option<u32> {
        if self.vertex_arrays {
            Some(self.create("create_vertex_array"))
        } else {
            None
        }
    }

    fn delete_vertex_array(&self, vertex_array: &u32) {
        self.record("delete_vertex_array", vertex_array.to_string());
    }

    fn bind_vertex_array(&self, vertex_array: Option<&u32>) {
        self.record("bind_vertex_array", format!("{:?}", vertex_array));
    }

    fn draw_arrays(&self, mode: u32, first: u32, count: u32) {
        self.record("draw_arrays", format!("{} {} {}", mode, first, count));
    }

    fn draw_elements(&self, mode: u32, count: u32, type_: u32, offset: u32) {
        self.record(
            "draw_elements",
            format!("{} {} {} {}", mode, count, type_, offset),
        );
    }

    fn draw_arrays_instanced(&self, mode: u32, first: u32, count: u32, instances: u32) -> bool {
        if self.instancing {
            self.record(
                "draw_arrays_instanced",
                format!("{} {} {} {}", mode, first, count, instances),
            );
        }

        self.instancing
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: u32,
        type_: u32,
        offset: u32,
        instances: u32,
    ) -> bool {
        if self.instancing {
            self.record(
                "draw_elements_instanced",
                format!("{} {} {} {} {}", mode, count, type_, offset, instances),
            );
        }

        self.instancing
    }

    fn create_query(&self) -> Option<u32> {
        if self.version.is_webgl2() {
            Some(self.create("create_query"))
        } else {
            None
        }
    }

    fn delete_query(&self, query: &u32) {
        self.record("delete_query", query.to_string());
    }

    fn begin_query(&self, target: u32, query: &u32) {
        self.record("begin_query", format!("{} {}", target, query));
    }

    fn end_query(&self, target: u32) {
        self.record("end_query", target.to_string());
    }

    fn query_result_available(&self, query: &u32) -> bool {
        self.record("query_result_available", query.to_string());

        self.query_available.get()
    }

    fn query_result(&self, query: &u32) -> u32 {
        self.record("query_result", query.to_string());

        self.query_result.get()
    }

    fn create_transform_feedback(&self) -> Option<u32> {
        if self.version.is_webgl2() {
            Some(self.create("create_transform_feedback"))
        } else {
            None
        }
    }

    fn delete_transform_feedback(&self, transform_feedback: &u32) {
        self.record("delete_transform_feedback", transform_feedback.to_string());
    }

    fn bind_transform_feedback(&self, transform_feedback: Option<&u32>) {
        self.record(
            "bind_transform_feedback",
            format!("{:?}", transform_feedback),
        );
    }

    fn begin_transform_feedback(&self, primitive_mode: u32) {
        self.record("begin_transform_feedback", primitive_mode.to_string());
    }

    fn end_transform_feedback(&self) {
        self.record("end_transform_feedback", String::new());
    }
}
