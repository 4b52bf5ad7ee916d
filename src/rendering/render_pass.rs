//! Executes render passes: binds the target, clears what the attachments ask for and runs the
//! pass objects in order.
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::format::{Aspect, ComponentKind, TextureFormat};
use crate::rendering::framebuffer_cache::{FramebufferTarget, RenderTarget};
use crate::rendering::{LoadOp, PassObject, RenderPassDescriptor, RenderPassEncoder};
use crate::runtime::state::ContextUpdate;
use crate::runtime::{Backend, RenderDevice, SubmitError};

impl<B> RenderDevice<B>
where
    B: Backend,
{
    /// Runs a render pass. A pass whose attachments cannot be resolved is logged and skipped.
    pub(crate) fn execute_render_pass(
        &mut self,
        pass: &RenderPassEncoder,
    ) -> Result<(), SubmitError> {
        let descriptor = &pass.descriptor;
        let target = match self.resolve_target(
            descriptor.color_attachments.iter().map(|a| &a.view),
            descriptor.depth_stencil_attachment.as_ref().map(|a| &a.view),
        )? {
            Some(target) => target,
            None => {
                log::error!("Skipping a render pass whose attachments are unavailable.");

                return Ok(());
            }
        };

        let samples = self.multisample_count(&target, descriptor.sample_count);

        match (&target, samples) {
            (
                RenderTarget::Framebuffer {
                    color,
                    depth_stencil,
                },
                Some(samples),
            ) => {
                let RenderDevice {
                    gl,
                    state,
                    multisample,
                    ..
                } = self;

                multisample.bind(gl, state, color, depth_stencil.as_ref(), samples)?;
            }
            _ => self.bind_target(&target, FramebufferTarget::Draw)?,
        }

        {
            let RenderDevice { gl, state, .. } = self;
            let (width, height) = target.size(gl);

            state
                .set_viewport([0, 0, width as i32, height as i32])
                .apply(gl);
            state.set_scissor_test_enabled(false).apply(gl);
            state.set_rasterizer_discard_enabled(false).apply(gl);
        }

        self.clear_attachments(&target, descriptor);

        for object in &pass.objects {
            match object {
                PassObject::Viewport(rect) => {
                    self.state.set_viewport(rect.to_array()).apply(&self.gl);
                }
                PassObject::ScissorRect(rect) => {
                    let RenderDevice { gl, state, .. } = self;

                    state.set_scissor_test_enabled(true).apply(gl);
                    state.set_scissor_rect(rect.to_array()).apply(gl);
                }
                PassObject::OcclusionQuery { query, objects } => {
                    let active = self.begin_occlusion_query(*query);
                    let result = objects.iter().try_for_each(|object| self.draw(object));

                    if active {
                        self.end_occlusion_query(*query);
                    }

                    result?;
                }
                PassObject::Draw(object) => self.draw(object)?,
            }
        }

        if let (
            RenderTarget::Framebuffer {
                color,
                depth_stencil,
            },
            Some(samples),
        ) = (&target, samples)
        {
            let RenderDevice {
                gl,
                state,
                framebuffers,
                multisample,
                ..
            } = self;

            multisample.resolve(gl, state, framebuffers, color, depth_stencil.as_ref(), samples)?;
        }

        Ok(())
    }

    /// The sample count to render a pass with, or `None` to render it directly into its target.
    ///
    /// The requested count is lowered to the largest count every attachment format supports, or
    /// raised to the smallest one if the request is below all of them.
    fn multisample_count(&mut self, target: &RenderTarget<B>, requested: u32) -> Option<u32> {
        if requested <= 1 {
            return None;
        }

        let images = match target {
            RenderTarget::Canvas => {
                log::debug!(
                    "Ignoring sample count {} for the canvas; canvas antialiasing is a context \
                     option.",
                    requested
                );

                return None;
            }
            RenderTarget::Framebuffer { .. } if !self.gl.version().is_webgl2() => {
                log::error!("Multisampled render passes require WebGL 2.0; rendering without.");

                return None;
            }
            RenderTarget::Framebuffer {
                color,
                depth_stencil,
            } => color.iter().chain(depth_stencil.iter()),
        };

        let mut supported: Option<Vec<u32>> = None;

        for image in images {
            let counts = self.supported_samples(image.format);

            supported = Some(match supported {
                Some(common) => common.into_iter().filter(|c| counts.contains(c)).collect(),
                None => counts,
            });
        }

        let supported = supported.unwrap_or_default();
        let samples = supported
            .iter()
            .copied()
            .filter(|count| *count <= requested)
            .max()
            .or_else(|| supported.iter().copied().min());

        match samples {
            Some(samples) => {
                if samples != requested {
                    log::warn!(
                        "Sample count {} is not supported by the pass's attachments; using {}.",
                        requested,
                        samples
                    );
                }

                Some(samples)
            }
            None => {
                log::warn!(
                    "The pass's attachment formats do not support multisampling; rendering \
                     without."
                );

                None
            }
        }
    }

    /// The sample counts above 1 that renderbuffers of `format` support; queried once per format.
    fn supported_samples(&mut self, format: TextureFormat) -> Vec<u32> {
        let internal_format = match format.renderbuffer_format(self.gl.version()) {
            Some(internal_format) => internal_format,
            None => return Vec::new(),
        };

        let RenderDevice {
            gl, sample_counts, ..
        } = self;

        sample_counts
            .entry(internal_format)
            .or_insert_with(|| {
                gl.supported_samples(internal_format)
                    .into_iter()
                    .filter(|count| *count > 1)
                    .collect()
            })
            .clone()
    }

    fn clear_attachments(&mut self, target: &RenderTarget<B>, descriptor: &RenderPassDescriptor) {
        let RenderDevice { gl, state, .. } = self;

        let depth_stencil = descriptor.depth_stencil_attachment.as_ref();
        let clear_color = descriptor
            .color_attachments
            .iter()
            .any(|attachment| attachment.load_op == LoadOp::Clear);
        let clear_depth = depth_stencil.map_or(false, |a| a.depth_load_op == LoadOp::Clear);
        let clear_stencil = depth_stencil.map_or(false, |a| a.stencil_load_op == LoadOp::Clear);

        if !clear_color && !clear_depth && !clear_stencil {
            return;
        }

        // Write masks apply to clears too.
        if clear_color {
            state.set_color_mask([true; 4]).apply(gl);
        }

        if clear_depth {
            state.set_depth_mask(true).apply(gl);
        }

        if clear_stencil {
            state.set_stencil_write_mask_front(!0).apply(gl);
            state.set_stencil_write_mask_back(!0).apply(gl);
        }

        match target {
            RenderTarget::Framebuffer {
                color,
                depth_stencil: depth_stencil_image,
            } if gl.version().is_webgl2() => {
                let attachments = descriptor.color_attachments.iter().zip(color);

                for (index, (attachment, image)) in attachments.enumerate() {
                    if attachment.load_op != LoadOp::Clear {
                        continue;
                    }

                    let index = index as u32;
                    let value = attachment.clear_value;

                    match image.format.component_kind() {
                        ComponentKind::Float => gl.clear_bufferfv(Gl::COLOR, index, &value),
                        ComponentKind::Int => {
                            gl.clear_bufferiv(Gl::COLOR, index, &value.map(|c| c as i32))
                        }
                        ComponentKind::Uint => {
                            gl.clear_bufferuiv(Gl::COLOR, index, &value.map(|c| c as u32))
                        }
                    }
                }

                if let Some(attachment) = depth_stencil {
                    let combined = depth_stencil_image
                        .as_ref()
                        .map_or(false, |image| image.aspect() == Aspect::DepthStencil);

                    if clear_depth && clear_stencil && combined {
                        gl.clear_bufferfi(
                            Gl::DEPTH_STENCIL,
                            0,
                            attachment.depth_clear_value,
                            attachment.stencil_clear_value,
                        );
                    } else {
                        if clear_depth {
                            gl.clear_bufferfv(Gl::DEPTH, 0, &[attachment.depth_clear_value]);
                        }

                        if clear_stencil {
                            gl.clear_bufferiv(Gl::STENCIL, 0, &[attachment.stencil_clear_value]);
                        }
                    }
                }
            }
            _ => {
                // The canvas, or a WebGL 1.0 framebuffer with a single color attachment.
                let mut mask = 0;

                if let Some(attachment) = descriptor.color_attachments.first() {
                    if attachment.load_op == LoadOp::Clear {
                        state.set_clear_color(attachment.clear_value).apply(gl);
                        mask |= Gl::COLOR_BUFFER_BIT;
                    }
                }

                if let Some(attachment) = depth_stencil {
                    if clear_depth {
                        state.set_clear_depth(attachment.depth_clear_value).apply(gl);
                        mask |= Gl::DEPTH_BUFFER_BIT;
                    }

                    if clear_stencil {
                        state
                            .set_clear_stencil(attachment.stencil_clear_value)
                            .apply(gl);
                        mask |= Gl::STENCIL_BUFFER_BIT;
                    }
                }

                if mask != 0 {
                    gl.clear(mask);
                }
            }
        }
    }
}
