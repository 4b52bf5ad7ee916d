use fnv::FnvHashMap;

use crate::buffer::BufferEntry;
use crate::image::renderbuffer::RenderbufferEntry;
use crate::image::texture::TextureEntry;
use crate::pipeline::program::ProgramCache;
use crate::pipeline::PipelineEntry;
use crate::rendering::framebuffer_cache::FramebufferCache;
use crate::rendering::multisample::MultisampleCache;
use crate::rendering::query::QueryScheduler;
use crate::rendering::{PassEncoder, Submission};
use crate::runtime::backend::Backend;
use crate::runtime::state::DynamicState;
use crate::runtime::SubmitError;
use crate::sampler::SamplerEntry;
use crate::transform_feedback::TransformFeedbackEntry;
use crate::util::next_context_id;
use crate::vertex::VertexArrayCache;

/// Executes submissions on a WebGL context and owns every GPU object derived for them.
///
/// Resources (buffers, textures, samplers, renderbuffers, pipelines, transform feedback targets
/// and queries) are registered with a device and identified by the ids it returns. Ids are only
/// valid for the device that issued them; using an id with another device is logged and the
/// resource is treated as missing.
///
/// # Example
///
/// ```no_run
/// use web_glitz_submit::rendering::{
///     ColorAttachment, CommandEncoder, RenderPassDescriptor, RenderPassEncoder, Submission,
/// };
/// use web_glitz_submit::runtime::{canvas_by_id, webgl2_context, ContextOptions, RenderDevice};
///
/// let canvas = canvas_by_id("canvas").unwrap();
/// let context = webgl2_context(&canvas, &ContextOptions::default()).unwrap();
/// let mut device = RenderDevice::new(context);
///
/// let clear = RenderPassEncoder::new(
///     RenderPassDescriptor::new()
///         .color_attachment(ColorAttachment::canvas().clear([0.0, 0.0, 0.0, 1.0])),
/// );
///
/// device
///     .submit(&Submission::new().encoder(CommandEncoder::new().pass(clear)))
///     .unwrap();
/// ```
pub struct RenderDevice<B>
where
    B: Backend,
{
    pub(crate) gl: B,
    pub(crate) state: DynamicState<B>,
    pub(crate) id: usize,
    next_index: u64,
    pub(crate) buffers: FnvHashMap<u64, BufferEntry<B>>,
    pub(crate) textures: FnvHashMap<u64, TextureEntry<B>>,
    pub(crate) samplers: FnvHashMap<u64, SamplerEntry<B>>,
    pub(crate) renderbuffers: FnvHashMap<u64, RenderbufferEntry<B>>,
    pub(crate) pipelines: FnvHashMap<u64, PipelineEntry<B>>,
    pub(crate) transform_feedbacks: FnvHashMap<u64, TransformFeedbackEntry<B>>,
    pub(crate) programs: ProgramCache<B>,
    pub(crate) framebuffers: FramebufferCache<B>,
    pub(crate) vertex_arrays: VertexArrayCache<B>,
    pub(crate) multisample: MultisampleCache<B>,
    pub(crate) queries: QueryScheduler<B>,
    /// Supported sample counts per renderbuffer internal format.
    pub(crate) sample_counts: FnvHashMap<u32, Vec<u32>>,
    submission_count: u64,
    lost: bool,
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    /// Creates a device for a freshly acquired context. The device assumes it is the only user of
    /// the context: state changes made to it behind the device's back are not noticed.
    pub fn new(gl: B) -> Self {
        let state = DynamicState::initial(&gl);

        log::debug!("Created render device for {:?}.", gl.version());

        RenderDevice {
            gl,
            state,
            id: next_context_id(),
            next_index: 0,
            buffers: FnvHashMap::default(),
            textures: FnvHashMap::default(),
            samplers: FnvHashMap::default(),
            renderbuffers: FnvHashMap::default(),
            pipelines: FnvHashMap::default(),
            transform_feedbacks: FnvHashMap::default(),
            programs: ProgramCache::new(),
            framebuffers: FramebufferCache::new(),
            vertex_arrays: VertexArrayCache::new(),
            multisample: MultisampleCache::new(),
            queries: QueryScheduler::new(),
            sample_counts: FnvHashMap::default(),
            submission_count: 0,
            lost: false,
        }
    }

    pub fn context(&self) -> &B {
        &self.gl
    }

    /// The number of submissions executed so far. Increases by one at the end of every
    /// [submit](RenderDevice::submit), whether or not the submission succeeded.
    pub fn submission_count(&self) -> u64 {
        self.submission_count
    }

    /// Whether the context was lost. A lost device ignores every further submission; build a new
    /// device once the context is restored.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Executes a submission: every pass of every command encoder, in order.
    ///
    /// Occlusion queries issued by earlier submissions are polled first. If the context is lost
    /// this does nothing and returns `Ok(())`.
    pub fn submit(&mut self, submission: &Submission) -> Result<(), SubmitError> {
        if self.check_context_lost() {
            return Ok(());
        }

        self.queries.poll(&self.gl, self.submission_count);

        let result = self.execute(submission);

        self.submission_count += 1;

        result
    }

    /// Polls pending occlusion queries without submitting anything, for frames that have no work.
    pub fn poll(&mut self) {
        if self.check_context_lost() {
            return;
        }

        self.queries.poll(&self.gl, self.submission_count);
    }

    fn execute(&mut self, submission: &Submission) -> Result<(), SubmitError> {
        for encoder in &submission.command_encoders {
            for pass in &encoder.passes {
                match pass {
                    PassEncoder::RenderPass(pass) => self.execute_render_pass(pass)?,
                    PassEncoder::BlitFramebuffer(pass) => self.blit_framebuffer(pass)?,
                    PassEncoder::CopyTextureToTexture(pass) => {
                        self.copy_texture_to_texture(pass)?
                    }
                    PassEncoder::CopyBufferToBuffer(pass) => self.copy_buffer_to_buffer(pass)?,
                }
            }
        }

        Ok(())
    }

    fn check_context_lost(&mut self) -> bool {
        if !self.lost && self.gl.is_context_lost() {
            log::warn!("The WebGL context was lost; further submissions are ignored.");

            self.forget_objects();
            self.lost = true;
        }

        self.lost
    }

    /// Drops every GL object without deleting it; the objects died with the context.
    fn forget_objects(&mut self) {
        self.buffers.values_mut().for_each(|e| e.forget_object());
        self.textures.values_mut().for_each(|e| e.forget_object());
        self.samplers.values_mut().for_each(|e| e.forget_object());
        self.renderbuffers.values_mut().for_each(|e| e.forget_object());
        self.pipelines.values_mut().for_each(|e| e.forget_program());
        self.transform_feedbacks
            .values_mut()
            .for_each(|e| e.forget_object());

        self.programs.forget();
        self.framebuffers.forget();
        self.vertex_arrays.forget();
        self.multisample.forget();
        self.queries.forget();
    }

    pub(crate) fn next_index(&mut self) -> u64 {
        let index = self.next_index;

        self.next_index += 1;

        index
    }

    /// Whether an id with the given device id was issued by this device; logs an error if not.
    pub(crate) fn owns(&self, context: usize, kind: &str) -> bool {
        if context == self.id {
            true
        } else {
            log::error!("The {} belongs to a different render device.", kind);

            false
        }
    }
}

impl<B> Drop for RenderDevice<B>
where
    B: Backend,
{
    fn drop(&mut self) {
        if self.lost || self.gl.is_context_lost() {
            return;
        }

        let RenderDevice {
            gl,
            buffers,
            textures,
            samplers,
            renderbuffers,
            transform_feedbacks,
            programs,
            framebuffers,
            vertex_arrays,
            multisample,
            queries,
            ..
        } = self;

        framebuffers.clear(gl);
        multisample.clear(gl);
        vertex_arrays.clear(gl);
        programs.clear(gl);
        queries.clear(gl);

        for entry in buffers.values() {
            if let Some(object) = entry.object() {
                gl.delete_buffer(&object.handle);
            }
        }

        for entry in textures.values() {
            if let Some(object) = entry.object() {
                gl.delete_texture(&object.handle);
            }
        }

        for entry in samplers.values() {
            if let Some(object) = entry.object() {
                gl.delete_sampler(&object.handle);
            }
        }

        for entry in renderbuffers.values() {
            if let Some(object) = entry.object() {
                gl.delete_renderbuffer(&object.handle);
            }
        }

        for entry in transform_feedbacks.values() {
            if let Some(object) = entry.object() {
                gl.delete_transform_feedback(&object.handle);
            }
        }
    }
}
