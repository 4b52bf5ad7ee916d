//! Binds a render object's resources to its program and issues the draw call.
use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::buffer::{BufferEntry, BufferId, BufferObject};
use crate::pipeline::binding::{lookup, set_uniform, uniform_value, TextureBinding};
use crate::pipeline::reflection::UniformKind;
use crate::pipeline::BindingResource;
use crate::rendering::RenderObject;
use crate::runtime::state::ContextUpdate;
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::vertex::{AttributeInput, StepMode};

/// Visits every texture and buffer in a tree of binding values.
fn visit_resources<'a, F>(resource: &'a BindingResource, f: &mut F)
where
    F: FnMut(&'a BindingResource),
{
    match resource {
        BindingResource::Array(elements) => {
            elements.iter().for_each(|element| visit_resources(element, f))
        }
        BindingResource::Struct(fields) => {
            fields.values().for_each(|field| visit_resources(field, f))
        }
        BindingResource::Texture(_) | BindingResource::Buffer(_) => f(resource),
        _ => (),
    }
}

fn buffer_object<B>(
    buffers: &FnvHashMap<u64, BufferEntry<B>>,
    device: usize,
    id: BufferId,
) -> Option<&BufferObject<B>>
where
    B: Backend,
{
    if id.context != device {
        return None;
    }

    buffers.get(&id.index)?.object()
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    /// Uploads everything the object reads before anything is bound for the draw; uploads
    /// rebind buffers and textures.
    fn prepare_object(&mut self, object: &RenderObject) -> Result<(), SubmitError> {
        for attribute in object.attributes.values() {
            self.prepare_buffer(attribute.buffer)?;
        }

        if let Some(index_buffer) = &object.index_buffer {
            self.prepare_buffer(index_buffer.buffer)?;
        }

        let mut resources = Vec::new();

        for resource in object.bindings.values() {
            visit_resources(resource, &mut |resource| resources.push(resource));
        }

        for resource in resources {
            match resource {
                BindingResource::Texture(TextureBinding { texture, sampler }) => {
                    self.prepare_texture(*texture)?;

                    if let Some(sampler) = sampler {
                        self.prepare_sampler(*sampler)?;
                    }
                }
                BindingResource::Buffer(binding) => {
                    self.prepare_buffer(binding.buffer)?;
                }
                _ => (),
            }
        }

        Ok(())
    }

    /// Draws a single render object into the currently bound framebuffer.
    ///
    /// Objects whose pipeline is missing are skipped. Missing attributes, uniforms and uniform
    /// blocks are logged and the draw proceeds without them.
    pub(crate) fn draw(&mut self, object: &RenderObject) -> Result<(), SubmitError> {
        let program = match self.prepare_pipeline(object.pipeline)? {
            Some(program) => program,
            None => return Ok(()),
        };

        if object.draw.instance_count != 1 && !self.gl.supports_instancing() {
            return Err(SubmitError::InstancingUnavailable);
        }

        self.prepare_object(object)?;

        let transform_feedback = match object.transform_feedback {
            Some(id) => self.prepare_transform_feedback(id)?,
            None => None,
        };

        let RenderDevice {
            gl,
            state,
            id: device,
            buffers,
            textures,
            samplers,
            pipelines,
            transform_feedbacks,
            vertex_arrays,
            ..
        } = self;

        let device = *device;
        let descriptor = match pipelines.get(&object.pipeline.index) {
            Some(entry) => entry.descriptor(),
            None => return Ok(()),
        };

        state
            .set_active_program(Some((program.key, &program.handle)))
            .apply(gl);
        descriptor.apply_state(gl, state);

        let mut inputs = Vec::with_capacity(program.reflection.attributes.len());
        let mut vertex_count: Option<u32> = None;

        for slot in &program.reflection.attributes {
            let attribute = match object.attributes.get(&slot.name) {
                Some(attribute) => *attribute,
                None => {
                    log::error!(
                        "No vertex attribute bound to `{}`; drawing with the array disabled.",
                        slot.name
                    );

                    continue;
                }
            };

            let buffer = match buffer_object(buffers, device, attribute.buffer) {
                Some(buffer) => buffer,
                None => {
                    log::error!(
                        "The buffer for vertex attribute `{}` is missing; drawing with the array \
                         disabled.",
                        slot.name
                    );

                    continue;
                }
            };

            if attribute.step_mode == StepMode::Vertex {
                let values = attribute.value_count(buffer.size as usize);

                vertex_count = Some(vertex_count.map_or(values, |count| count.min(values)));
            }

            inputs.push(AttributeInput {
                location: slot.location,
                integer: slot.integer,
                buffer: (buffer.key, &buffer.handle),
                attribute,
            });
        }

        let index_buffer = match &object.index_buffer {
            Some(index_buffer) => match buffer_object(buffers, device, index_buffer.buffer) {
                Some(buffer) => Some((index_buffer, buffer)),
                None => {
                    log::error!("The index buffer is missing; skipping the draw.");

                    return Ok(());
                }
            },
            None => None,
        };

        vertex_arrays.bind(
            gl,
            state,
            program.key,
            &inputs,
            index_buffer.map(|(_, buffer)| (buffer.key, &buffer.handle)),
        )?;

        for uniform in &program.reflection.uniforms {
            let location = match &uniform.location {
                Some(location) if !uniform.in_block => location,
                _ => continue,
            };

            let value = match lookup(&object.bindings, &uniform.identifier) {
                Some(value) => value,
                None => {
                    log::error!("No value bound to uniform `{}`.", uniform.identifier);

                    continue;
                }
            };

            let (target, unit) = match (&uniform.kind, uniform.texture_unit) {
                (UniformKind::Sampler(target), Some(unit)) => (*target, unit),
                (kind, _) => {
                    match uniform_value(kind, value) {
                        Ok(value) => set_uniform(gl, location, kind, &value),
                        Err(err) => log::error!("Uniform `{}`: {}.", uniform.identifier, err),
                    }

                    continue;
                }
            };

            let binding = match value {
                BindingResource::Texture(binding) if binding.texture.context == device => binding,
                _ => {
                    log::error!(
                        "Uniform `{}` expects a texture of this device, found a {} value.",
                        uniform.identifier,
                        value.kind_name()
                    );

                    continue;
                }
            };

            let texture = match textures
                .get_mut(&binding.texture.index)
                .and_then(|entry| entry.object_mut())
            {
                Some(texture) => texture,
                None => {
                    log::error!("The texture for uniform `{}` is missing.", uniform.identifier);

                    continue;
                }
            };

            if texture.target != target {
                log::error!(
                    "Uniform `{}` samples target {:#x}, but the texture is bound to {:#x}.",
                    uniform.identifier,
                    target,
                    texture.target
                );

                continue;
            }

            state.set_active_texture(unit).apply(gl);
            state
                .set_bound_texture(texture.target, Some((texture.key, &texture.handle)))
                .apply(gl);

            let sampler = match binding.sampler {
                Some(sampler) if sampler.context == device => samplers.get(&sampler.index),
                Some(_) => {
                    log::error!(
                        "The sampler for uniform `{}` belongs to a different render device.",
                        uniform.identifier
                    );

                    None
                }
                None => None,
            };

            if gl.version().is_webgl2() {
                let object = sampler.and_then(|entry| entry.object());

                state
                    .set_bound_sampler(unit, object.map(|object| (object.key, &object.handle)))
                    .apply(gl);
            } else if let Some(entry) = sampler {
                entry.descriptor().apply_to_texture(gl, texture);
            }

            gl.uniform_i32(location, 1, &[unit as i32]);
        }

        for block in &program.reflection.blocks {
            let binding = match object.bindings.get(&block.name) {
                Some(BindingResource::Buffer(binding)) => binding,
                Some(other) => {
                    log::error!(
                        "Uniform block `{}` expects a buffer, found a {} value.",
                        block.name,
                        other.kind_name()
                    );

                    continue;
                }
                None => {
                    log::error!("No buffer bound to uniform block `{}`.", block.name);

                    continue;
                }
            };

            let buffer = match buffer_object(buffers, device, binding.buffer) {
                Some(buffer) => buffer,
                None => {
                    log::error!("The buffer for uniform block `{}` is missing.", block.name);

                    continue;
                }
            };

            let remainder = buffer.size.saturating_sub(binding.offset);
            let size = binding
                .size
                .or_else(|| (binding.offset > 0).then(|| remainder));

            state
                .bind_uniform_buffer_range(
                    block.binding,
                    (buffer.key, &buffer.handle),
                    binding.offset,
                    size,
                )
                .apply(gl);
        }

        let feedback = match transform_feedback {
            Some(_) if descriptor.transform_feedback.is_none() => {
                log::error!("The pipeline declares no varyings to capture; skipping the capture.");

                None
            }
            Some(index) => transform_feedbacks.get(&index).and_then(|entry| {
                entry
                    .object()
                    .map(|object| (object, entry.descriptor().discard_rasterizer))
            }),
            None => None,
        };

        let topology = descriptor.primitive.topology;

        state
            .set_rasterizer_discard_enabled(feedback.map_or(false, |(_, discard)| discard))
            .apply(gl);

        if let Some((object, _)) = feedback {
            state
                .set_bound_transform_feedback(Some((object.key, &object.handle)))
                .apply(gl);
            gl.begin_transform_feedback(topology.transform_feedback_mode());
        }

        let mode = topology.id();
        let draw = object.draw;
        let instanced = draw.instance_count != 1;

        let drawn = if draw.indexed.unwrap_or(index_buffer.is_some()) {
            match index_buffer {
                Some((index_buffer, buffer)) => {
                    let size = index_buffer.format.size();
                    let available = buffer.size.saturating_sub(index_buffer.offset) / size;
                    let count = draw
                        .count
                        .unwrap_or_else(|| available.saturating_sub(draw.first));
                    let offset = index_buffer.offset + draw.first * size;
                    let format = index_buffer.format.id();

                    if instanced {
                        gl.draw_elements_instanced(mode, count, format, offset, draw.instance_count)
                    } else {
                        gl.draw_elements(mode, count, format, offset);

                        true
                    }
                }
                None => {
                    log::error!("Indexed draw without an index buffer; skipping the draw.");

                    true
                }
            }
        } else {
            let count = draw
                .count
                .unwrap_or_else(|| vertex_count.unwrap_or(0).saturating_sub(draw.first));

            if instanced {
                gl.draw_arrays_instanced(mode, draw.first, count, draw.instance_count)
            } else {
                gl.draw_arrays(mode, draw.first, count);

                true
            }
        };

        if feedback.is_some() {
            gl.end_transform_feedback();
            state.set_bound_transform_feedback(None).apply(gl);
        }

        if !drawn {
            return Err(SubmitError::InstancingUnavailable);
        }

        log::trace!("Drew with program {} in mode {:#x}.", program.key, mode);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::buffer::{BufferBinding, BufferDescriptor};
    use crate::image::format::TextureFormat;
    use crate::image::texture::{TextureDescriptor, TextureDimension};
    use crate::pipeline::{
        PipelineId, PrimitiveState, RenderPipelineDescriptor, Topology,
        TransformFeedbackBufferMode,
    };
    use crate::rendering::DrawSpec;
    use crate::runtime::recording::{ProgramInterface, RecordingBackend};
    use crate::sampler::SamplerDescriptor;
    use crate::transform_feedback::TransformFeedbackDescriptor;
    use crate::vertex::{IndexBuffer, IndexFormat, VertexAttribute, VertexFormat};

    const VERTEX: &str = "vertex shader";

    fn device(gl: RecordingBackend, interface: ProgramInterface) -> RenderDevice<RecordingBackend> {
        gl.set_interface(VERTEX, interface);

        RenderDevice::new(gl)
    }

    fn pipeline(device: &mut RenderDevice<RecordingBackend>) -> PipelineId {
        device.create_pipeline(RenderPipelineDescriptor::new(VERTEX, "fragment shader"))
    }

    fn positions(device: &mut RenderDevice<RecordingBackend>, vertices: usize) -> VertexAttribute {
        let buffer = device.create_buffer(BufferDescriptor::vertex(vec![0; vertices * 8]));

        VertexAttribute::new(buffer, VertexFormat::Float32x2)
    }

    fn with_position() -> ProgramInterface {
        ProgramInterface::default().attribute("position", Gl::FLOAT_VEC2)
    }

    #[test]
    fn test_vertex_count_defaults_to_the_attribute_buffers() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = pipeline(&mut device);
        let position = positions(&mut device, 3);

        device
            .draw(&RenderObject::new(pipeline).attribute("position", position))
            .unwrap();

        assert_eq!(
            device.gl.calls_named("draw_arrays"),
            vec![format!("{} 0 3", Gl::TRIANGLES)]
        );
        assert_eq!(device.gl.count("use_program"), 1);
    }

    #[test]
    fn test_indexed_draws_honor_the_first_index() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = pipeline(&mut device);
        let position = positions(&mut device, 3);
        let indices = device.create_buffer(BufferDescriptor::index(vec![0; 12]));

        device
            .draw(
                &RenderObject::new(pipeline)
                    .attribute("position", position)
                    .index_buffer(IndexBuffer::new(indices, IndexFormat::Uint16))
                    .draw(DrawSpec {
                        first: 2,
                        ..DrawSpec::default()
                    }),
            )
            .unwrap();

        assert_eq!(
            device.gl.calls_named("draw_elements"),
            vec![format!("{} 4 {} 4", Gl::TRIANGLES, Gl::UNSIGNED_SHORT)]
        );
        assert_eq!(device.gl.count("draw_arrays"), 0);
    }

    #[test]
    fn test_instanced_draws() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = pipeline(&mut device);
        let position = positions(&mut device, 3);

        device
            .draw(
                &RenderObject::new(pipeline)
                    .attribute("position", position)
                    .instance_count(5),
            )
            .unwrap();

        assert_eq!(
            device.gl.calls_named("draw_arrays_instanced"),
            vec![format!("{} 0 3 5", Gl::TRIANGLES)]
        );
    }

    #[test]
    fn test_instancing_without_support_fails() {
        let mut device = device(RecordingBackend::webgl1_without_extensions(), with_position());
        let pipeline = pipeline(&mut device);
        let position = positions(&mut device, 3);

        let result = device.draw(
            &RenderObject::new(pipeline)
                .attribute("position", position)
                .instance_count(2),
        );

        assert!(matches!(result, Err(SubmitError::InstancingUnavailable)));
    }

    #[test]
    fn test_missing_attributes_still_draw() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = pipeline(&mut device);

        device.draw(&RenderObject::new(pipeline).count(3)).unwrap();

        assert_eq!(device.gl.count("enable_vertex_attrib_array"), 0);
        assert_eq!(
            device.gl.calls_named("draw_arrays"),
            vec![format!("{} 0 3", Gl::TRIANGLES)]
        );
    }

    #[test]
    fn test_destroyed_pipelines_skip_the_draw() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = pipeline(&mut device);

        device.destroy_pipeline(pipeline);
        device.draw(&RenderObject::new(pipeline).count(3)).unwrap();

        assert_eq!(device.gl.count("draw_arrays"), 0);
    }

    #[test]
    fn test_uniform_values_are_uploaded() {
        let interface = with_position()
            .uniform("color", Gl::FLOAT_VEC4, 1)
            .uniform("flags", Gl::BOOL, 1)
            .uniform("missing", Gl::FLOAT, 1);
        let mut device = device(RecordingBackend::webgl2(), interface);
        let pipeline = pipeline(&mut device);

        device
            .draw(
                &RenderObject::new(pipeline)
                    .count(3)
                    .binding("color", [1.0f32, 0.0, 0.0, 1.0])
                    .binding("flags", true),
            )
            .unwrap();

        assert_eq!(
            device.gl.calls_named("uniform_f32"),
            vec!["color 4 [1.0, 0.0, 0.0, 1.0]"]
        );
        assert_eq!(device.gl.calls_named("uniform_i32"), vec!["flags 1 [1]"]);
        assert_eq!(device.gl.count("draw_arrays"), 1);
    }

    #[test]
    fn test_textures_bind_with_their_sampler() {
        let interface = with_position().uniform("diffuse", Gl::SAMPLER_2D, 1);
        let mut device = device(RecordingBackend::webgl2(), interface);
        let pipeline = pipeline(&mut device);
        let texture = device.create_texture(
            TextureDescriptor::new(TextureFormat::RGBA8, TextureDimension::D2).size(2, 2),
        );
        let sampler = device.create_sampler(SamplerDescriptor::default());

        device
            .draw(
                &RenderObject::new(pipeline)
                    .count(3)
                    .binding("diffuse", TextureBinding::new(texture, sampler)),
            )
            .unwrap();

        let sampler_handle = device.gl.calls_named("create_sampler")[0].clone();

        assert_eq!(
            device.gl.calls_named("bind_sampler"),
            vec![format!("0 Some({})", sampler_handle)]
        );
        assert_eq!(device.gl.calls_named("uniform_i32"), vec!["diffuse 1 [0]"]);
    }

    #[test]
    fn test_webgl1_applies_sampler_parameters_to_the_texture() {
        let interface = with_position().uniform("diffuse", Gl::SAMPLER_2D, 1);
        let mut device = device(RecordingBackend::webgl1(), interface);
        let pipeline = pipeline(&mut device);
        let texture = device.create_texture(
            TextureDescriptor::new(TextureFormat::RGBA8, TextureDimension::D2).size(2, 2),
        );
        let sampler = device.create_sampler(SamplerDescriptor::default());

        device
            .draw(
                &RenderObject::new(pipeline)
                    .count(3)
                    .binding("diffuse", TextureBinding::new(texture, sampler)),
            )
            .unwrap();

        assert_eq!(device.gl.count("bind_sampler"), 0);
        assert_eq!(device.gl.count("create_sampler"), 0);
        assert_eq!(device.gl.calls_named("uniform_i32"), vec!["diffuse 1 [0]"]);
    }

    #[test]
    fn test_uniform_blocks_bind_their_buffer() {
        let interface = with_position()
            .block("Globals")
            .block_uniform("Globals.scale", Gl::FLOAT, 0);
        let mut device = device(RecordingBackend::webgl2(), interface);
        let pipeline = pipeline(&mut device);
        let globals = device.create_buffer(BufferDescriptor::uniform(vec![0; 32]));

        device
            .draw(
                &RenderObject::new(pipeline)
                    .count(3)
                    .binding(
                        "Globals",
                        BufferBinding {
                            buffer: globals,
                            offset: 16,
                            size: None,
                        },
                    ),
            )
            .unwrap();

        let calls = device.gl.calls_named("bind_buffer_range");

        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with(&format!("{} 0 ", Gl::UNIFORM_BUFFER)));
        assert!(calls[0].ends_with(" 16 16"));
        assert_eq!(device.gl.count("uniform_f32"), 0);
    }

    #[test]
    fn test_transform_feedback_wraps_the_draw() {
        let mut device = device(RecordingBackend::webgl2(), with_position());
        let pipeline = device.create_pipeline(
            RenderPipelineDescriptor::new(VERTEX, "fragment shader")
                .primitive(PrimitiveState {
                    topology: Topology::Points,
                    ..PrimitiveState::default()
                })
                .transform_feedback(vec!["result"], TransformFeedbackBufferMode::Interleaved),
        );
        let output = device.create_buffer(BufferDescriptor::vertex(vec![0; 64]));
        let transform_feedback = device.create_transform_feedback(
            TransformFeedbackDescriptor::new(vec![output]).discard_rasterizer(),
        );

        device
            .draw(
                &RenderObject::new(pipeline)
                    .count(4)
                    .transform_feedback(transform_feedback),
            )
            .unwrap();

        let gl = &device.gl;
        let begin = gl.position("begin_transform_feedback").unwrap();
        let draw = gl.position("draw_arrays").unwrap();
        let end = gl.position("end_transform_feedback").unwrap();

        assert!(begin < draw && draw < end);
        assert_eq!(
            gl.calls_named("begin_transform_feedback"),
            vec![Gl::POINTS.to_string()]
        );
        assert_eq!(
            gl.calls_named("enable"),
            vec![Gl::RASTERIZER_DISCARD.to_string()]
        );
    }
}
