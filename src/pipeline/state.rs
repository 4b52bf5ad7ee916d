//! Fixed-function state of a render pipeline: primitive assembly, depth and stencil testing,
//! blending and the color write mask.
use std::ops::RangeInclusive;

use thiserror::Error;
use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::state::{ContextUpdate, DynamicState, StencilFunc, StencilOp};
use crate::runtime::Backend;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub(crate) fn id(&self) -> u32 {
        match self {
            Topology::Points => Gl::POINTS,
            Topology::Lines => Gl::LINES,
            Topology::LineStrip => Gl::LINE_STRIP,
            Topology::LineLoop => Gl::LINE_LOOP,
            Topology::Triangles => Gl::TRIANGLES,
            Topology::TriangleStrip => Gl::TRIANGLE_STRIP,
            Topology::TriangleFan => Gl::TRIANGLE_FAN,
        }
    }

    /// The primitive mode `beginTransformFeedback` expects for this topology.
    pub(crate) fn transform_feedback_mode(&self) -> u32 {
        match self {
            Topology::Points => Gl::POINTS,
            Topology::Lines | Topology::LineStrip | Topology::LineLoop => Gl::LINES,
            _ => Gl::TRIANGLES,
        }
    }

    fn is_triangles(&self) -> bool {
        matches!(
            self,
            Topology::Triangles | Topology::TriangleStrip | Topology::TriangleFan
        )
    }
}

impl Default for Topology {
    fn default() -> Self {
        Topology::Triangles
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CullingMode {
    None,
    Front,
    Back,
    Both,
}

impl Default for CullingMode {
    fn default() -> Self {
        CullingMode::None
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

impl WindingOrder {
    fn id(&self) -> u32 {
        match self {
            WindingOrder::Clockwise => Gl::CW,
            WindingOrder::CounterClockwise => Gl::CCW,
        }
    }
}

impl Default for WindingOrder {
    fn default() -> Self {
        WindingOrder::CounterClockwise
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct PrimitiveState {
    pub topology: Topology,
    pub cull_mode: CullingMode,
    pub front_face: WindingOrder,
}

impl PrimitiveState {
    pub(crate) fn apply<B>(&self, gl: &B, state: &mut DynamicState<B>)
    where
        B: Backend,
    {
        let culled_face = if self.topology.is_triangles() {
            match self.cull_mode {
                CullingMode::None => None,
                CullingMode::Front => Some(Gl::FRONT),
                CullingMode::Back => Some(Gl::BACK),
                CullingMode::Both => Some(Gl::FRONT_AND_BACK),
            }
        } else {
            None
        };

        match culled_face {
            Some(face) => {
                state.set_cull_face_enabled(true).apply(gl);
                state.set_cull_face(face).apply(gl);
                state.set_front_face(self.front_face.id()).apply(gl);
            }
            None => state.set_cull_face_enabled(false).apply(gl),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TestFunction {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    NeverPass,
    AlwaysPass,
}

impl TestFunction {
    pub(crate) fn id(&self) -> u32 {
        match self {
            TestFunction::Equal => Gl::EQUAL,
            TestFunction::NotEqual => Gl::NOTEQUAL,
            TestFunction::Less => Gl::LESS,
            TestFunction::Greater => Gl::GREATER,
            TestFunction::LessOrEqual => Gl::LEQUAL,
            TestFunction::GreaterOrEqual => Gl::GEQUAL,
            TestFunction::NeverPass => Gl::NEVER,
            TestFunction::AlwaysPass => Gl::ALWAYS,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DepthRange {
    near: f32,
    far: f32,
}

impl DepthRange {
    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        DepthRange {
            near: 0.0,
            far: 1.0,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Error)]
#[error("invalid depth range {0:?}: must be increasing and within 0.0..=1.0")]
pub struct InvalidDepthRange(pub RangeInclusive<f32>);

impl TryFrom<RangeInclusive<f32>> for DepthRange {
    type Error = InvalidDepthRange;

    fn try_from(range: RangeInclusive<f32>) -> Result<Self, Self::Error> {
        let near = *range.start();
        let far = *range.end();

        if near < 0.0 || far > 1.0 || near >= far {
            Err(InvalidDepthRange(range))
        } else {
            Ok(DepthRange { near, far })
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DepthTest {
    pub test: TestFunction,
    pub write: bool,
    pub depth_range: DepthRange,
}

impl DepthTest {
    pub(crate) fn apply<B>(option: &Option<Self>, gl: &B, state: &mut DynamicState<B>)
    where
        B: Backend,
    {
        match option {
            Some(depth_test) => {
                state.set_depth_test_enabled(true).apply(gl);
                state.set_depth_func(depth_test.test.id()).apply(gl);
                state
                    .set_depth_range((depth_test.depth_range.near, depth_test.depth_range.far))
                    .apply(gl);
                state.set_depth_mask(depth_test.write).apply(gl);
            }
            None => state.set_depth_test_enabled(false).apply(gl),
        }
    }
}

impl Default for DepthTest {
    fn default() -> Self {
        DepthTest {
            test: TestFunction::Less,
            write: true,
            depth_range: DepthRange::default(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Increment,
    WrappingIncrement,
    Decrement,
    WrappingDecrement,
    Invert,
}

impl StencilOperation {
    pub(crate) fn id(&self) -> u32 {
        match self {
            StencilOperation::Keep => Gl::KEEP,
            StencilOperation::Zero => Gl::ZERO,
            StencilOperation::Replace => Gl::REPLACE,
            StencilOperation::Increment => Gl::INCR,
            StencilOperation::WrappingIncrement => Gl::INCR_WRAP,
            StencilOperation::Decrement => Gl::DECR,
            StencilOperation::WrappingDecrement => Gl::DECR_WRAP,
            StencilOperation::Invert => Gl::INVERT,
        }
    }
}

/// Stencil test configuration, separately for front and back facing primitives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StencilTest {
    pub test_function_front: TestFunction,
    pub fail_operation_front: StencilOperation,
    pub pass_depth_fail_operation_front: StencilOperation,
    pub pass_operation_front: StencilOperation,
    pub test_function_back: TestFunction,
    pub fail_operation_back: StencilOperation,
    pub pass_depth_fail_operation_back: StencilOperation,
    pub pass_operation_back: StencilOperation,
    pub reference_value_front: u32,
    pub test_mask_front: u32,
    pub reference_value_back: u32,
    pub test_mask_back: u32,
    pub write_mask_front: u32,
    pub write_mask_back: u32,
}

impl StencilTest {
    pub(crate) fn apply<B>(option: &Option<Self>, gl: &B, state: &mut DynamicState<B>)
    where
        B: Backend,
    {
        match option {
            Some(stencil_test) => {
                state.set_stencil_test_enabled(true).apply(gl);

                state
                    .set_stencil_func_front(StencilFunc {
                        func: stencil_test.test_function_front.id(),
                        reference: stencil_test.reference_value_front as i32,
                        mask: stencil_test.test_mask_front,
                    })
                    .apply(gl);
                state
                    .set_stencil_op_front(StencilOp {
                        fail: stencil_test.fail_operation_front.id(),
                        depth_fail: stencil_test.pass_depth_fail_operation_front.id(),
                        pass: stencil_test.pass_operation_front.id(),
                    })
                    .apply(gl);
                state
                    .set_stencil_write_mask_front(stencil_test.write_mask_front)
                    .apply(gl);

                state
                    .set_stencil_func_back(StencilFunc {
                        func: stencil_test.test_function_back.id(),
                        reference: stencil_test.reference_value_back as i32,
                        mask: stencil_test.test_mask_back,
                    })
                    .apply(gl);
                state
                    .set_stencil_op_back(StencilOp {
                        fail: stencil_test.fail_operation_back.id(),
                        depth_fail: stencil_test.pass_depth_fail_operation_back.id(),
                        pass: stencil_test.pass_operation_back.id(),
                    })
                    .apply(gl);
                state
                    .set_stencil_write_mask_back(stencil_test.write_mask_back)
                    .apply(gl);
            }
            None => state.set_stencil_test_enabled(false).apply(gl),
        }
    }
}

impl Default for StencilTest {
    fn default() -> Self {
        StencilTest {
            test_function_front: TestFunction::AlwaysPass,
            fail_operation_front: StencilOperation::Keep,
            pass_depth_fail_operation_front: StencilOperation::Keep,
            pass_operation_front: StencilOperation::Keep,
            test_function_back: TestFunction::AlwaysPass,
            fail_operation_back: StencilOperation::Keep,
            pass_depth_fail_operation_back: StencilOperation::Keep,
            pass_operation_back: StencilOperation::Keep,
            reference_value_front: 0,
            test_mask_front: 0xffffffff,
            reference_value_back: 0,
            test_mask_back: 0xffffffff,
            write_mask_front: 0xffffffff,
            write_mask_back: 0xffffffff,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlendFactor {
    Zero,
    One,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SourceColor,
    OneMinusSourceColor,
    DestinationColor,
    OneMinusDestinationColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestinationAlpha,
    OneMinusDestinationAlpha,
    SourceAlphaSaturate,
}

impl BlendFactor {
    pub(crate) fn id(&self) -> u32 {
        match self {
            BlendFactor::Zero => Gl::ZERO,
            BlendFactor::One => Gl::ONE,
            BlendFactor::ConstantColor => Gl::CONSTANT_COLOR,
            BlendFactor::OneMinusConstantColor => Gl::ONE_MINUS_CONSTANT_COLOR,
            BlendFactor::ConstantAlpha => Gl::CONSTANT_ALPHA,
            BlendFactor::OneMinusConstantAlpha => Gl::ONE_MINUS_CONSTANT_ALPHA,
            BlendFactor::SourceColor => Gl::SRC_COLOR,
            BlendFactor::OneMinusSourceColor => Gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::DestinationColor => Gl::DST_COLOR,
            BlendFactor::OneMinusDestinationColor => Gl::ONE_MINUS_DST_COLOR,
            BlendFactor::SourceAlpha => Gl::SRC_ALPHA,
            BlendFactor::OneMinusSourceAlpha => Gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::DestinationAlpha => Gl::DST_ALPHA,
            BlendFactor::OneMinusDestinationAlpha => Gl::ONE_MINUS_DST_ALPHA,
            BlendFactor::SourceAlphaSaturate => Gl::SRC_ALPHA_SATURATE,
        }
    }
}

/// `Min` and `Max` require WebGL 2.0 (or the `EXT_blend_minmax` extension).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlendEquation {
    Addition,
    Subtraction,
    ReverseSubtraction,
    Min,
    Max,
}

impl BlendEquation {
    pub(crate) fn id(&self) -> u32 {
        match self {
            BlendEquation::Addition => Gl::FUNC_ADD,
            BlendEquation::Subtraction => Gl::FUNC_SUBTRACT,
            BlendEquation::ReverseSubtraction => Gl::FUNC_REVERSE_SUBTRACT,
            BlendEquation::Min => Gl::MIN,
            BlendEquation::Max => Gl::MAX,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Blending {
    pub constant_color: [f32; 4],
    pub source_color_factor: BlendFactor,
    pub source_alpha_factor: BlendFactor,
    pub destination_color_factor: BlendFactor,
    pub destination_alpha_factor: BlendFactor,
    pub color_equation: BlendEquation,
    pub alpha_equation: BlendEquation,
}

impl Blending {
    /// Standard "source over" alpha blending.
    pub fn alpha() -> Self {
        Blending {
            source_color_factor: BlendFactor::SourceAlpha,
            source_alpha_factor: BlendFactor::One,
            destination_color_factor: BlendFactor::OneMinusSourceAlpha,
            destination_alpha_factor: BlendFactor::OneMinusSourceAlpha,
            ..Blending::default()
        }
    }

    pub(crate) fn apply<B>(option: &Option<Self>, gl: &B, state: &mut DynamicState<B>)
    where
        B: Backend,
    {
        match option {
            Some(blend) => {
                state.set_blend_enabled(true).apply(gl);
                state.set_blend_color(blend.constant_color).apply(gl);
                state
                    .set_blend_equation([blend.color_equation.id(), blend.alpha_equation.id()])
                    .apply(gl);
                state
                    .set_blend_func([
                        blend.source_color_factor.id(),
                        blend.destination_color_factor.id(),
                        blend.source_alpha_factor.id(),
                        blend.destination_alpha_factor.id(),
                    ])
                    .apply(gl);
            }
            None => state.set_blend_enabled(false).apply(gl),
        }
    }
}

impl Default for Blending {
    fn default() -> Self {
        Blending {
            constant_color: [0.0; 4],
            source_color_factor: BlendFactor::One,
            source_alpha_factor: BlendFactor::One,
            destination_color_factor: BlendFactor::Zero,
            destination_alpha_factor: BlendFactor::Zero,
            color_equation: BlendEquation::Addition,
            alpha_equation: BlendEquation::Addition,
        }
    }
}
