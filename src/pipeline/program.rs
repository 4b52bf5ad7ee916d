//! Compiled and linked programs, cached by their source text.
//!
//! Unlike the other GPU objects, programs are not tied to the pipeline that first needed them:
//! every pipeline with byte-identical shader sources (and transform feedback varyings) shares
//! one program, and every program that uses a byte-identical shader stage shares one compiled
//! shader.
use std::rc::Rc;

use fnv::FnvHashMap;
use thiserror::Error;
use web_sys::WebGl2RenderingContext as Gl;

use crate::pipeline::reflection::Reflection;
use crate::pipeline::{RenderPipelineDescriptor, TransformFeedbackBufferMode};
use crate::runtime::Backend;
use crate::util::next_object_key;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn id(&self) -> u32 {
        match self {
            ShaderStage::Vertex => Gl::VERTEX_SHADER,
            ShaderStage::Fragment => Gl::FRAGMENT_SHADER,
        }
    }
}

/// Error returned when a program could not be created; carries the driver's info log.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum CreateProgramError {
    #[error("{stage:?} shader failed to compile: {log}")]
    ShaderCompilation { stage: ShaderStage, log: String },
    #[error("program failed to link: {log}")]
    ProgramLinking { log: String },
    #[error("failed to create a {0} object")]
    ObjectCreation(&'static str),
}

/// A linked program with its reflected interface.
pub(crate) struct Program<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::Program,
    pub(crate) reflection: Reflection<B>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct ProgramKey {
    vertex_source: String,
    fragment_source: String,
    varyings: Vec<String>,
    buffer_mode: Option<TransformFeedbackBufferMode>,
}

pub(crate) struct ProgramCache<B>
where
    B: Backend,
{
    shaders: FnvHashMap<(ShaderStage, String), B::Shader>,
    programs: FnvHashMap<ProgramKey, Rc<Program<B>>>,
}

impl<B> ProgramCache<B>
where
    B: Backend,
{
    pub(crate) fn new() -> Self {
        ProgramCache {
            shaders: FnvHashMap::default(),
            programs: FnvHashMap::default(),
        }
    }

    /// Returns the program for the pipeline's sources, compiling and linking it if no pipeline
    /// with the same sources was used before.
    pub(crate) fn get(
        &mut self,
        gl: &B,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<Rc<Program<B>>, CreateProgramError> {
        let webgl2 = gl.version().is_webgl2();
        let transform_feedback = descriptor
            .transform_feedback
            .as_ref()
            .filter(|layout| !layout.varyings.is_empty());

        if transform_feedback.is_some() && !webgl2 {
            log::error!("Transform feedback requires WebGL 2.0; ignoring the varyings.");
        }

        let transform_feedback = transform_feedback.filter(|_| webgl2);

        let key = ProgramKey {
            vertex_source: descriptor.vertex_shader.clone(),
            fragment_source: descriptor.fragment_shader.clone(),
            varyings: transform_feedback
                .map(|layout| layout.varyings.clone())
                .unwrap_or_default(),
            buffer_mode: transform_feedback.map(|layout| layout.buffer_mode),
        };

        if let Some(program) = self.programs.get(&key) {
            return Ok(program.clone());
        }

        let vertex_shader = self.shader(gl, ShaderStage::Vertex, &key.vertex_source)?;
        let fragment_shader = self.shader(gl, ShaderStage::Fragment, &key.fragment_source)?;

        let handle = gl
            .create_program()
            .ok_or(CreateProgramError::ObjectCreation("program"))?;

        gl.attach_shader(&handle, &vertex_shader);
        gl.attach_shader(&handle, &fragment_shader);

        if let Some(mode) = key.buffer_mode {
            gl.transform_feedback_varyings(&handle, &key.varyings, mode.id());
        }

        gl.link_program(&handle);

        if !gl.program_link_status(&handle) {
            let log = gl.program_info_log(&handle);

            gl.delete_program(&handle);

            return Err(CreateProgramError::ProgramLinking { log });
        }

        let reflection = Reflection::reflect(gl, &handle);

        log::debug!(
            "Linked program with {} attributes, {} uniforms and {} uniform blocks.",
            reflection.attributes.len(),
            reflection.uniforms.len(),
            reflection.blocks.len()
        );

        let program = Rc::new(Program {
            key: next_object_key(),
            handle,
            reflection,
        });

        self.programs.insert(key, program.clone());

        Ok(program)
    }

    fn shader(
        &mut self,
        gl: &B,
        stage: ShaderStage,
        source: &str,
    ) -> Result<B::Shader, CreateProgramError> {
        let key = (stage, source.to_string());

        if let Some(shader) = self.shaders.get(&key) {
            return Ok(shader.clone());
        }

        let shader = gl
            .create_shader(stage.id())
            .ok_or(CreateProgramError::ObjectCreation("shader"))?;

        gl.shader_source(&shader, source);
        gl.compile_shader(&shader);

        if !gl.shader_compile_status(&shader) {
            let log = gl.shader_info_log(&shader);

            gl.delete_shader(&shader);

            return Err(CreateProgramError::ShaderCompilation { stage, log });
        }

        self.shaders.insert(key, shader.clone());

        Ok(shader)
    }

    /// Deletes every shader and program.
    pub(crate) fn clear(&mut self, gl: &B) {
        for (_, program) in self.programs.drain() {
            gl.delete_program(&program.handle);
        }

        for (_, shader) in self.shaders.drain() {
            gl.delete_shader(&shader);
        }
    }

    /// Forgets every shader and program without deleting them, for a lost context.
    pub(crate) fn forget(&mut self) {
        self.programs.clear();
        self.shaders.clear();
    }
}
