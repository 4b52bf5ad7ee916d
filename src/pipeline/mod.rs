//! Render pipelines: shader sources plus the fixed-function state a draw runs with.
//!
//! A pipeline is registered with [RenderDevice::create_pipeline]. Its program is compiled and
//! linked the first time a submission draws with it; pipelines that share their shader sources
//! share a single program.
use std::rc::Rc;

use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::resource_id;

pub mod binding;
pub(crate) mod program;
pub mod reflection;
mod state;

pub use self::binding::{BindingResource, TextureBinding};
pub use self::program::{CreateProgramError, ShaderStage};
pub use self::state::{
    BlendEquation, BlendFactor, Blending, CullingMode, DepthRange, DepthTest, InvalidDepthRange,
    PrimitiveState, StencilOperation, StencilTest, TestFunction, Topology, WindingOrder,
};

use self::program::Program;

resource_id!(
    /// Identifies a pipeline registered with a [RenderDevice].
    PipelineId
);

/// How transform feedback varyings are written to their buffers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TransformFeedbackBufferMode {
    /// All varyings are written to a single buffer, one vertex after the other.
    Interleaved,

    /// Every varying is written to its own buffer.
    Separate,
}

impl TransformFeedbackBufferMode {
    pub(crate) fn id(&self) -> u32 {
        match self {
            TransformFeedbackBufferMode::Interleaved => Gl::INTERLEAVED_ATTRIBS,
            TransformFeedbackBufferMode::Separate => Gl::SEPARATE_ATTRIBS,
        }
    }
}

/// The vertex shader outputs captured by transform feedback (WebGL 2.0 only).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TransformFeedbackLayout {
    pub varyings: Vec<String>,
    pub buffer_mode: TransformFeedbackBufferMode,
}

#[derive(Clone, PartialEq, Debug)]
pub struct RenderPipelineDescriptor {
    /// GLSL ES source of the vertex stage.
    pub vertex_shader: String,

    /// GLSL ES source of the fragment stage.
    pub fragment_shader: String,

    pub primitive: PrimitiveState,

    /// `None` disables the depth test.
    pub depth_test: Option<DepthTest>,

    /// `None` disables the stencil test.
    pub stencil_test: Option<StencilTest>,

    /// `None` disables blending.
    pub blending: Option<Blending>,

    /// `[red, green, blue, alpha]`
    pub color_write_mask: [bool; 4],

    pub transform_feedback: Option<TransformFeedbackLayout>,
}

impl RenderPipelineDescriptor {
    pub fn new<V, F>(vertex_shader: V, fragment_shader: F) -> Self
    where
        V: Into<String>,
        F: Into<String>,
    {
        RenderPipelineDescriptor {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            primitive: PrimitiveState::default(),
            depth_test: None,
            stencil_test: None,
            blending: None,
            color_write_mask: [true; 4],
            transform_feedback: None,
        }
    }

    pub fn primitive(mut self, primitive: PrimitiveState) -> Self {
        self.primitive = primitive;

        self
    }

    pub fn depth_test(mut self, depth_test: DepthTest) -> Self {
        self.depth_test = Some(depth_test);

        self
    }

    pub fn stencil_test(mut self, stencil_test: StencilTest) -> Self {
        self.stencil_test = Some(stencil_test);

        self
    }

    pub fn blending(mut self, blending: Blending) -> Self {
        self.blending = Some(blending);

        self
    }

    pub fn color_write_mask(mut self, mask: [bool; 4]) -> Self {
        self.color_write_mask = mask;

        self
    }

    pub fn transform_feedback<I, S>(
        mut self,
        varyings: I,
        buffer_mode: TransformFeedbackBufferMode,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transform_feedback = Some(TransformFeedbackLayout {
            varyings: varyings.into_iter().map(|v| v.into()).collect(),
            buffer_mode,
        });

        self
    }

    /// Applies the fixed-function state through the state mirror.
    pub(crate) fn apply_state<B>(&self, gl: &B, state: &mut DynamicState<B>)
    where
        B: Backend,
    {
        self.primitive.apply(gl, state);

        DepthTest::apply(&self.depth_test, gl, state);
        StencilTest::apply(&self.stencil_test, gl, state);
        Blending::apply(&self.blending, gl, state);

        state.set_color_mask(self.color_write_mask).apply(gl);
    }
}

pub(crate) struct PipelineEntry<B>
where
    B: Backend,
{
    descriptor: RenderPipelineDescriptor,
    program: Option<Rc<Program<B>>>,
}

impl<B> PipelineEntry<B>
where
    B: Backend,
{
    pub(crate) fn descriptor(&self) -> &RenderPipelineDescriptor {
        &self.descriptor
    }

    pub(crate) fn forget_program(&mut self) {
        self.program = None;
    }
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_pipeline(&mut self, descriptor: RenderPipelineDescriptor) -> PipelineId {
        let index = self.next_index();

        self.pipelines.insert(
            index,
            PipelineEntry {
                descriptor,
                program: None,
            },
        );

        PipelineId::new(self.id, index)
    }

    pub fn pipeline_descriptor(&self, id: PipelineId) -> Option<&RenderPipelineDescriptor> {
        if id.context != self.id {
            return None;
        }

        self.pipelines.get(&id.index).map(|entry| &entry.descriptor)
    }

    /// Forgets the pipeline. Its program stays cached for other pipelines with the same sources.
    pub fn destroy_pipeline(&mut self, id: PipelineId) {
        if !self.owns(id.context, "pipeline") {
            return;
        }

        if self.pipelines.remove(&id.index).is_none() {
            log::error!("Cannot destroy pipeline {:?}: it has been destroyed.", id);
        }
    }

    /// Returns the pipeline's program, compiling and linking it if necessary, or `None` if the
    /// pipeline does not exist (which is logged).
    pub(crate) fn prepare_pipeline(
        &mut self,
        id: PipelineId,
    ) -> Result<Option<Rc<Program<B>>>, SubmitError> {
        if !self.owns(id.context, "pipeline") {
            return Ok(None);
        }

        let RenderDevice {
            gl,
            pipelines,
            programs,
            ..
        } = self;

        let entry = match pipelines.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Pipeline {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        if let Some(program) = &entry.program {
            return Ok(Some(program.clone()));
        }

        let program = programs.get(gl, &entry.descriptor)?;

        entry.program = Some(program.clone());

        Ok(Some(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::runtime::recording::RecordingBackend;

    #[test]
    fn test_pipelines_with_identical_sources_share_a_program() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let a = device.create_pipeline(RenderPipelineDescriptor::new("vertex", "fragment"));
        let b = device.create_pipeline(
            RenderPipelineDescriptor::new("vertex", "fragment").blending(Blending::alpha()),
        );

        let program_a = device.prepare_pipeline(a).unwrap().unwrap();
        let program_b = device.prepare_pipeline(b).unwrap().unwrap();

        assert!(Rc::ptr_eq(&program_a, &program_b));
        assert_eq!(device.gl.count("link_program"), 1);
    }

    #[test]
    fn test_compile_errors_propagate() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let pipeline =
            device.create_pipeline(RenderPipelineDescriptor::new("#error vertex", "fragment"));

        assert!(matches!(
            device.prepare_pipeline(pipeline),
            Err(SubmitError::CreateProgram(CreateProgramError::ShaderCompilation { .. }))
        ));
    }

    #[test]
    fn test_destroyed_pipelines_are_skipped() {
        let mut device = RenderDevice::new(RecordingBackend::webgl2());
        let pipeline = device.create_pipeline(RenderPipelineDescriptor::new("vertex", "fragment"));

        device.destroy_pipeline(pipeline);

        assert!(device.prepare_pipeline(pipeline).unwrap().is_none());
        assert!(device.pipeline_descriptor(pipeline).is_none());
        assert_eq!(device.gl.count("create_program"), 0);
    }

    #[test]
    fn test_apply_state_skips_redundant_calls() {
        let gl = RecordingBackend::webgl2();
        let mut state = DynamicState::initial(&gl);
        let descriptor = RenderPipelineDescriptor::new("vertex", "fragment")
            .depth_test(DepthTest::default())
            .color_write_mask([true, true, true, false]);

        descriptor.apply_state(&gl, &mut state);
        descriptor.apply_state(&gl, &mut state);

        assert_eq!(gl.calls_named("enable"), vec![Gl::DEPTH_TEST.to_string()]);
        assert_eq!(gl.calls_named("color_mask"), vec!["true true true false"]);
    }
}
