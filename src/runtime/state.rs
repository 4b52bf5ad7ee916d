//! A mirror of the GL state a [RenderDevice] has set, so redundant state changes can be skipped.
//!
//! Bound objects are tracked by the `u64` key the device assigned to the GL object when it
//! created it; keys are never reused, so a key that refers to a deleted object can never compare
//! equal to a live one. Every `set_*` method updates the mirror and returns a [ContextUpdate] that
//! performs the corresponding GL call only if the value actually changed.
//!
//! [RenderDevice]: crate::runtime::RenderDevice
use std::marker;

use fnv::FnvHashMap;
use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::backend::{Backend, GlVersion};

pub trait ContextUpdate<'a, B> {
    fn apply(self, context: &B);
}

impl<'a, B, F> ContextUpdate<'a, B> for Option<F>
where
    F: FnOnce(&B),
{
    fn apply(self, context: &B) {
        if let Some(f) = self {
            f(context)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct StencilFunc {
    pub func: u32,
    pub reference: i32,
    pub mask: u32,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct StencilOp {
    pub fail: u32,
    pub depth_fail: u32,
    pub pass: u32,
}

pub struct DynamicState<B> {
    version: GlVersion,
    active_program: Option<u64>,
    bound_array_buffer: Option<u64>,
    bound_copy_read_buffer: Option<u64>,
    bound_copy_write_buffer: Option<u64>,
    bound_uniform_buffer: Option<u64>,
    bound_draw_framebuffer: Option<u64>,
    bound_read_framebuffer: Option<u64>,
    bound_renderbuffer: Option<u64>,
    bound_vertex_array: Option<u64>,
    bound_transform_feedback: Option<u64>,
    active_texture: u32,
    bound_textures: FnvHashMap<(u32, u32), u64>,
    bound_samplers: FnvHashMap<u32, u64>,
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: i32,
    depth_test_enabled: bool,
    stencil_test_enabled: bool,
    scissor_test_enabled: bool,
    blend_enabled: bool,
    cull_face_enabled: bool,
    rasterizer_discard_enabled: bool,
    viewport: [i32; 4],
    scissor_rect: [i32; 4],
    depth_func: u32,
    depth_mask: bool,
    depth_range: (f32, f32),
    color_mask: [bool; 4],
    cull_face: u32,
    front_face: u32,
    stencil_func_front: StencilFunc,
    stencil_func_back: StencilFunc,
    stencil_op_front: StencilOp,
    stencil_op_back: StencilOp,
    stencil_write_mask_front: u32,
    stencil_write_mask_back: u32,
    blend_func: [u32; 4],
    blend_equation: [u32; 2],
    blend_color: [f32; 4],
    _marker: marker::PhantomData<fn(&B)>,
}

macro_rules! capability {
    ($getter:ident, $setter:ident, $field:ident, $capability:expr) => {
        pub fn $getter(&self) -> bool {
            self.$field
        }

        pub fn $setter(&mut self, enabled: bool) -> impl ContextUpdate<'static, B> {
            if enabled != self.$field {
                self.$field = enabled;

                Some(move |context: &B| {
                    if enabled {
                        context.enable($capability);
                    } else {
                        context.disable($capability);
                    }
                })
            } else {
                None
            }
        }
    };
}

impl<B> DynamicState<B>
where
    B: Backend,
{
    /// The state of a freshly created context, as defined by the WebGL specification.
    pub fn initial(context: &B) -> Self {
        let (width, height) = context.drawing_buffer_size();
        let default_stencil_func = StencilFunc {
            func: Gl::ALWAYS,
            reference: 0,
            mask: u32::MAX,
        };
        let default_stencil_op = StencilOp {
            fail: Gl::KEEP,
            depth_fail: Gl::KEEP,
            pass: Gl::KEEP,
        };

        DynamicState {
            version: context.version(),
            active_program: None,
            bound_array_buffer: None,
            bound_copy_read_buffer: None,
            bound_copy_write_buffer: None,
            bound_uniform_buffer: None,
            bound_draw_framebuffer: None,
            bound_read_framebuffer: None,
            bound_renderbuffer: None,
            bound_vertex_array: None,
            bound_transform_feedback: None,
            active_texture: 0,
            bound_textures: FnvHashMap::default(),
            bound_samplers: FnvHashMap::default(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            depth_test_enabled: false,
            stencil_test_enabled: false,
            scissor_test_enabled: false,
            blend_enabled: false,
            cull_face_enabled: false,
            rasterizer_discard_enabled: false,
            viewport: [0, 0, width as i32, height as i32],
            scissor_rect: [0, 0, width as i32, height as i32],
            depth_func: Gl::LESS,
            depth_mask: true,
            depth_range: (0.0, 1.0),
            color_mask: [true; 4],
            cull_face: Gl::BACK,
            front_face: Gl::CCW,
            stencil_func_front: default_stencil_func,
            stencil_func_back: default_stencil_func,
            stencil_op_front: default_stencil_op,
            stencil_op_back: default_stencil_op,
            stencil_write_mask_front: u32::MAX,
            stencil_write_mask_back: u32::MAX,
            blend_func: [Gl::ONE, Gl::ZERO, Gl::ONE, Gl::ZERO],
            blend_equation: [Gl::FUNC_ADD, Gl::FUNC_ADD],
            blend_color: [0.0, 0.0, 0.0, 0.0],
            _marker: marker::PhantomData,
        }
    }

    pub fn version(&self) -> GlVersion {
        self.version
    }

    pub fn active_program(&self) -> Option<u64> {
        self.active_program
    }

    pub fn set_active_program<'a>(
        &mut self,
        program: Option<(u64, &'a B::Program)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = program.map(|(key, _)| key);

        if key != self.active_program {
            self.active_program = key;

            Some(move |context: &B| {
                context.use_program(program.map(|(_, program)| program));
            })
        } else {
            None
        }
    }

    pub fn bound_array_buffer(&self) -> Option<u64> {
        self.bound_array_buffer
    }

    pub fn set_bound_array_buffer<'a>(
        &mut self,
        buffer: Option<(u64, &'a B::Buffer)>,
    ) -> impl ContextUpdate<'a, B> {
        bind_buffer(&mut self.bound_array_buffer, Gl::ARRAY_BUFFER, buffer)
    }

    pub fn set_bound_copy_read_buffer<'a>(
        &mut self,
        buffer: Option<(u64, &'a B::Buffer)>,
    ) -> impl ContextUpdate<'a, B> {
        bind_buffer(&mut self.bound_copy_read_buffer, Gl::COPY_READ_BUFFER, buffer)
    }

    pub fn set_bound_copy_write_buffer<'a>(
        &mut self,
        buffer: Option<(u64, &'a B::Buffer)>,
    ) -> impl ContextUpdate<'a, B> {
        bind_buffer(
            &mut self.bound_copy_write_buffer,
            Gl::COPY_WRITE_BUFFER,
            buffer,
        )
    }

    /// The generic `UNIFORM_BUFFER` binding point (not the indexed binding points).
    pub fn set_bound_uniform_buffer<'a>(
        &mut self,
        buffer: Option<(u64, &'a B::Buffer)>,
    ) -> impl ContextUpdate<'a, B> {
        bind_buffer(&mut self.bound_uniform_buffer, Gl::UNIFORM_BUFFER, buffer)
    }

    /// Binds (a range of) a buffer to an indexed `UNIFORM_BUFFER` binding point. Indexed bindings
    /// are not mirrored, so this always performs the call; it also replaces the generic binding.
    pub fn bind_uniform_buffer_range<'a>(
        &mut self,
        index: u32,
        buffer: (u64, &'a B::Buffer),
        offset: u32,
        size: Option<u32>,
    ) -> impl ContextUpdate<'a, B> {
        let (key, handle) = buffer;

        self.bound_uniform_buffer = Some(key);

        Some(move |context: &B| match size {
            Some(size) => {
                context.bind_buffer_range(Gl::UNIFORM_BUFFER, index, handle, offset, size)
            }
            None => context.bind_buffer_base(Gl::UNIFORM_BUFFER, index, Some(handle)),
        })
    }

    /// `None` is the default framebuffer.
    pub fn bound_draw_framebuffer(&self) -> Option<u64> {
        self.bound_draw_framebuffer
    }

    /// Binds a framebuffer for drawing. On WebGL 1.0 there is a single framebuffer binding, which
    /// also serves as the read framebuffer.
    pub fn set_bound_draw_framebuffer<'a>(
        &mut self,
        framebuffer: Option<(u64, &'a B::Framebuffer)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = framebuffer.map(|(key, _)| key);

        if key != self.bound_draw_framebuffer {
            self.bound_draw_framebuffer = key;

            let target = if self.version.is_webgl2() {
                Gl::DRAW_FRAMEBUFFER
            } else {
                self.bound_read_framebuffer = key;

                Gl::FRAMEBUFFER
            };

            Some(move |context: &B| {
                context.bind_framebuffer(target, framebuffer.map(|(_, f)| f));
            })
        } else {
            None
        }
    }

    pub fn bound_read_framebuffer(&self) -> Option<u64> {
        self.bound_read_framebuffer
    }

    /// Binds a framebuffer for reading (WebGL 2.0 only).
    pub fn set_bound_read_framebuffer<'a>(
        &mut self,
        framebuffer: Option<(u64, &'a B::Framebuffer)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = framebuffer.map(|(key, _)| key);

        if key != self.bound_read_framebuffer {
            self.bound_read_framebuffer = key;

            Some(move |context: &B| {
                context.bind_framebuffer(Gl::READ_FRAMEBUFFER, framebuffer.map(|(_, f)| f));
            })
        } else {
            None
        }
    }

    pub fn set_bound_renderbuffer<'a>(
        &mut self,
        renderbuffer: Option<(u64, &'a B::Renderbuffer)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = renderbuffer.map(|(key, _)| key);

        if key != self.bound_renderbuffer {
            self.bound_renderbuffer = key;

            Some(move |context: &B| {
                context.bind_renderbuffer(renderbuffer.map(|(_, r)| r));
            })
        } else {
            None
        }
    }

    pub fn bound_vertex_array(&self) -> Option<u64> {
        self.bound_vertex_array
    }

    pub fn set_bound_vertex_array<'a>(
        &mut self,
        vertex_array: Option<(u64, &'a B::VertexArray)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = vertex_array.map(|(key, _)| key);

        if key != self.bound_vertex_array {
            self.bound_vertex_array = key;

            Some(move |context: &B| {
                context.bind_vertex_array(vertex_array.map(|(_, v)| v));
            })
        } else {
            None
        }
    }

    pub fn set_bound_transform_feedback<'a>(
        &mut self,
        transform_feedback: Option<(u64, &'a B::TransformFeedback)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = transform_feedback.map(|(key, _)| key);

        if key != self.bound_transform_feedback {
            self.bound_transform_feedback = key;

            Some(move |context: &B| {
                context.bind_transform_feedback(transform_feedback.map(|(_, t)| t));
            })
        } else {
            None
        }
    }

    pub fn active_texture(&self) -> u32 {
        self.active_texture
    }

    pub fn set_active_texture(&mut self, texture_unit: u32) -> impl ContextUpdate<'static, B> {
        if texture_unit != self.active_texture {
            self.active_texture = texture_unit;

            Some(move |context: &B| {
                context.active_texture(texture_unit);
            })
        } else {
            None
        }
    }

    /// Binds a texture to `target` on the currently active texture unit.
    pub fn set_bound_texture<'a>(
        &mut self,
        target: u32,
        texture: Option<(u64, &'a B::Texture)>,
    ) -> impl ContextUpdate<'a, B> {
        let slot = (self.active_texture, target);
        let key = texture.map(|(key, _)| key);

        if key != self.bound_textures.get(&slot).copied() {
            match key {
                Some(key) => self.bound_textures.insert(slot, key),
                None => self.bound_textures.remove(&slot),
            };

            Some(move |context: &B| {
                context.bind_texture(target, texture.map(|(_, t)| t));
            })
        } else {
            None
        }
    }

    pub fn set_bound_sampler<'a>(
        &mut self,
        texture_unit: u32,
        sampler: Option<(u64, &'a B::Sampler)>,
    ) -> impl ContextUpdate<'a, B> {
        let key = sampler.map(|(key, _)| key);

        if key != self.bound_samplers.get(&texture_unit).copied() {
            match key {
                Some(key) => self.bound_samplers.insert(texture_unit, key),
                None => self.bound_samplers.remove(&texture_unit),
            };

            Some(move |context: &B| {
                context.bind_sampler(texture_unit, sampler.map(|(_, s)| s));
            })
        } else {
            None
        }
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) -> impl ContextUpdate<'static, B> {
        if color != self.clear_color {
            self.clear_color = color;

            Some(move |context: &B| {
                context.clear_color(color);
            })
        } else {
            None
        }
    }

    pub fn set_clear_depth(&mut self, depth: f32) -> impl ContextUpdate<'static, B> {
        if depth != self.clear_depth {
            self.clear_depth = depth;

            Some(move |context: &B| {
                context.clear_depth(depth);
            })
        } else {
            None
        }
    }

    pub fn set_clear_stencil(&mut self, stencil: i32) -> impl ContextUpdate<'static, B> {
        if stencil != self.clear_stencil {
            self.clear_stencil = stencil;

            Some(move |context: &B| {
                context.clear_stencil(stencil);
            })
        } else {
            None
        }
    }

    capability!(
        depth_test_enabled,
        set_depth_test_enabled,
        depth_test_enabled,
        Gl::DEPTH_TEST
    );

    capability!(
        stencil_test_enabled,
        set_stencil_test_enabled,
        stencil_test_enabled,
        Gl::STENCIL_TEST
    );

    capability!(
        scissor_test_enabled,
        set_scissor_test_enabled,
        scissor_test_enabled,
        Gl::SCISSOR_TEST
    );

    capability!(blend_enabled, set_blend_enabled, blend_enabled, Gl::BLEND);

    capability!(
        cull_face_enabled,
        set_cull_face_enabled,
        cull_face_enabled,
        Gl::CULL_FACE
    );

    capability!(
        rasterizer_discard_enabled,
        set_rasterizer_discard_enabled,
        rasterizer_discard_enabled,
        Gl::RASTERIZER_DISCARD
    );

    pub fn viewport(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: [i32; 4]) -> impl ContextUpdate<'static, B> {
        if viewport != self.viewport {
            self.viewport = viewport;

            Some(move |context: &B| {
                let [x, y, width, height] = viewport;

                context.viewport(x, y, width, height);
            })
        } else {
            None
        }
    }

    pub fn set_scissor_rect(&mut self, rect: [i32; 4]) -> impl ContextUpdate<'static, B> {
        if rect != self.scissor_rect {
            self.scissor_rect = rect;

            Some(move |context: &B| {
                let [x, y, width, height] = rect;

                context.scissor(x, y, width, height);
            })
        } else {
            None
        }
    }

    pub fn set_depth_func(&mut self, func: u32) -> impl ContextUpdate<'static, B> {
        if func != self.depth_func {
            self.depth_func = func;

            Some(move |context: &B| {
                context.depth_func(func);
            })
        } else {
            None
        }
    }

    pub fn depth_mask(&self) -> bool {
        self.depth_mask
    }

    pub fn set_depth_mask(&mut self, mask: bool) -> impl ContextUpdate<'static, B> {
        if mask != self.depth_mask {
            self.depth_mask = mask;

            Some(move |context: &B| {
                context.depth_mask(mask);
            })
        } else {
            None
        }
    }

    pub fn set_depth_range(&mut self, range: (f32, f32)) -> impl ContextUpdate<'static, B> {
        if range != self.depth_range {
            self.depth_range = range;

            Some(move |context: &B| {
                context.depth_range(range.0, range.1);
            })
        } else {
            None
        }
    }

    pub fn color_mask(&self) -> [bool; 4] {
        self.color_mask
    }

    pub fn set_color_mask(&mut self, mask: [bool; 4]) -> impl ContextUpdate<'static, B> {
        if mask != self.color_mask {
            self.color_mask = mask;

            Some(move |context: &B| {
                context.color_mask(mask[0], mask[1], mask[2], mask[3]);
            })
        } else {
            None
        }
    }

    pub fn set_cull_face(&mut self, mode: u32) -> impl ContextUpdate<'static, B> {
        if mode != self.cull_face {
            self.cull_face = mode;

            Some(move |context: &B| {
                context.cull_face(mode);
            })
        } else {
            None
        }
    }

    pub fn set_front_face(&mut self, mode: u32) -> impl ContextUpdate<'static, B> {
        if mode != self.front_face {
            self.front_face = mode;

            Some(move |context: &B| {
                context.front_face(mode);
            })
        } else {
            None
        }
    }

    pub fn set_stencil_func_front(&mut self, func: StencilFunc) -> impl ContextUpdate<'static, B> {
        if func != self.stencil_func_front {
            self.stencil_func_front = func;

            Some(move |context: &B| {
                context.stencil_func_separate(Gl::FRONT, func.func, func.reference, func.mask);
            })
        } else {
            None
        }
    }

    pub fn set_stencil_func_back(&mut self, func: StencilFunc) -> impl ContextUpdate<'static, B> {
        if func != self.stencil_func_back {
            self.stencil_func_back = func;

            Some(move |context: &B| {
                context.stencil_func_separate(Gl::BACK, func.func, func.reference, func.mask);
            })
        } else {
            None
        }
    }

    pub fn set_stencil_op_front(&mut self, op: StencilOp) -> impl ContextUpdate<'static, B> {
        if op != self.stencil_op_front {
            self.stencil_op_front = op;

            Some(move |context: &B| {
                context.stencil_op_separate(Gl::FRONT, op.fail, op.depth_fail, op.pass);
            })
        } else {
            None
        }
    }

    pub fn set_stencil_op_back(&mut self, op: StencilOp) -> impl ContextUpdate<'static, B> {
        if op != self.stencil_op_back {
            self.stencil_op_back = op;

            Some(move |context: &B| {
                context.stencil_op_separate(Gl::BACK, op.fail, op.depth_fail, op.pass);
            })
        } else {
            None
        }
    }

    pub fn stencil_write_mask(&self) -> (u32, u32) {
        (self.stencil_write_mask_front, self.stencil_write_mask_back)
    }

    pub fn set_stencil_write_mask_front(&mut self, mask: u32) -> impl ContextUpdate<'static, B> {
        if mask != self.stencil_write_mask_front {
            self.stencil_write_mask_front = mask;

            Some(move |context: &B| {
                context.stencil_mask_separate(Gl::FRONT, mask);
            })
        } else {
            None
        }
    }

    pub fn set_stencil_write_mask_back(&mut self, mask: u32) -> impl ContextUpdate<'static, B> {
        if mask != self.stencil_write_mask_back {
            self.stencil_write_mask_back = mask;

            Some(move |context: &B| {
                context.stencil_mask_separate(Gl::BACK, mask);
            })
        } else {
            None
        }
    }

    /// `[source_rgb, destination_rgb, source_alpha, destination_alpha]`
    pub fn set_blend_func(&mut self, func: [u32; 4]) -> impl ContextUpdate<'static, B> {
        if func != self.blend_func {
            self.blend_func = func;

            Some(move |context: &B| {
                context.blend_func_separate(func[0], func[1], func[2], func[3]);
            })
        } else {
            None
        }
    }

    /// `[rgb, alpha]`
    pub fn set_blend_equation(&mut self, equation: [u32; 2]) -> impl ContextUpdate<'static, B> {
        if equation != self.blend_equation {
            self.blend_equation = equation;

            Some(move |context: &B| {
                context.blend_equation_separate(equation[0], equation[1]);
            })
        } else {
            None
        }
    }

    pub fn set_blend_color(&mut self, color: [f32; 4]) -> impl ContextUpdate<'static, B> {
        if color != self.blend_color {
            self.blend_color = color;

            Some(move |context: &B| {
                context.blend_color(color);
            })
        } else {
            None
        }
    }
}

fn bind_buffer<'a, B>(
    bound: &mut Option<u64>,
    target: u32,
    buffer: Option<(u64, &'a B::Buffer)>,
) -> impl ContextUpdate<'a, B>
where
    B: Backend,
{
    let key = buffer.map(|(key, _)| key);

    if key != *bound {
        *bound = key;

        Some(move |context: &B| {
            context.bind_buffer(target, buffer.map(|(_, b)| b));
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::runtime::recording::RecordingBackend;

    #[test]
    fn test_redundant_state_changes_are_skipped() {
        let gl = RecordingBackend::webgl2();
        let mut state = DynamicState::initial(&gl);

        state.set_depth_test_enabled(true).apply(&gl);
        state.set_depth_test_enabled(true).apply(&gl);
        state.set_clear_color([1.0, 0.0, 0.0, 1.0]).apply(&gl);
        state.set_clear_color([1.0, 0.0, 0.0, 1.0]).apply(&gl);
        state.set_depth_mask(true).apply(&gl);

        assert_eq!(gl.count("enable"), 1);
        assert_eq!(gl.count("clear_color"), 1);
        assert_eq!(gl.count("depth_mask"), 0);

        state.set_depth_test_enabled(false).apply(&gl);

        assert_eq!(gl.count("disable"), 1);
    }

    #[test]
    fn test_bindings_are_tracked_by_key() {
        let gl = RecordingBackend::webgl2();
        let mut state = DynamicState::initial(&gl);
        let a = gl.create_buffer().unwrap();
        let b = gl.create_buffer().unwrap();

        state.set_bound_array_buffer(Some((1, &a))).apply(&gl);
        state.set_bound_array_buffer(Some((1, &a))).apply(&gl);
        state.set_bound_array_buffer(Some((2, &b))).apply(&gl);
        state.set_bound_array_buffer(None).apply(&gl);

        assert_eq!(gl.count("bind_buffer"), 3);
    }

    #[test]
    fn test_texture_bindings_are_per_unit() {
        let gl = RecordingBackend::webgl2();
        let mut state = DynamicState::initial(&gl);
        let texture = gl.create_texture().unwrap();

        state
            .set_bound_texture(Gl::TEXTURE_2D, Some((7, &texture)))
            .apply(&gl);
        state.set_active_texture(1).apply(&gl);
        state
            .set_bound_texture(Gl::TEXTURE_2D, Some((7, &texture)))
            .apply(&gl);
        state.set_active_texture(0).apply(&gl);
        state
            .set_bound_texture(Gl::TEXTURE_2D, Some((7, &texture)))
            .apply(&gl);

        assert_eq!(gl.count("bind_texture"), 2);
        assert_eq!(gl.count("active_texture"), 2);
    }

    #[test]
    fn test_webgl1_draw_framebuffer_uses_single_binding() {
        let gl = RecordingBackend::webgl1();
        let mut state = DynamicState::initial(&gl);
        let framebuffer = gl.create_framebuffer().unwrap();

        state
            .set_bound_draw_framebuffer(Some((3, &framebuffer)))
            .apply(&gl);

        assert_eq!(state.bound_read_framebuffer(), Some(3));
        assert_eq!(
            gl.calls_named("bind_framebuffer"),
            vec![format!("{} Some({})", Gl::FRAMEBUFFER, framebuffer)]
        );
    }
}
