use serde_derive::Serialize;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext, WebGlRenderingContext};

use crate::runtime::web::{WebGl1Context, WebGl2Context};

/// The WebGL version to request from a canvas.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContextVersion {
    WebGl1,
    WebGl2,
}

impl ContextVersion {
    /// The context id passed to `getContext`.
    pub fn context_id(&self) -> &'static str {
        match self {
            ContextVersion::WebGl1 => "webgl",
            ContextVersion::WebGl2 => "webgl2",
        }
    }
}

impl Default for ContextVersion {
    fn default() -> Self {
        ContextVersion::WebGl2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    Default,
    HighPerformance,
    LowPower,
}

impl Default for PowerPreference {
    fn default() -> Self {
        PowerPreference::Default
    }
}

/// Options for acquiring a WebGL context from a canvas element.
///
/// # Example
///
/// ```
/// use web_glitz_submit::runtime::{ContextOptions, ContextVersion, PowerPreference};
///
/// let options = ContextOptions::begin()
///     .version(ContextVersion::WebGl1)
///     .enable_depth()
///     .enable_stencil()
///     .power_preference(PowerPreference::HighPerformance)
///     .finish();
///
/// assert!(options.depth());
/// assert_eq!(options.version().context_id(), "webgl");
/// ```
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ContextOptions {
    version: ContextVersion,
    alpha: bool,
    depth: bool,
    stencil: bool,
    antialias: bool,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    power_preference: PowerPreference,
    fail_if_major_performance_caveat: bool,
}

impl ContextOptions {
    pub fn begin() -> ContextOptionsBuilder {
        ContextOptionsBuilder {
            options: ContextOptions::default(),
        }
    }

    pub fn version(&self) -> ContextVersion {
        self.version
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn depth(&self) -> bool {
        self.depth
    }

    pub fn stencil(&self) -> bool {
        self.stencil
    }

    pub fn antialias(&self) -> bool {
        self.antialias
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn preserve_drawing_buffer(&self) -> bool {
        self.preserve_drawing_buffer
    }

    pub fn power_preference(&self) -> PowerPreference {
        self.power_preference
    }

    pub fn fail_if_major_performance_caveat(&self) -> bool {
        self.fail_if_major_performance_caveat
    }

    fn attributes(&self) -> ContextAttributes {
        ContextAttributes {
            alpha: self.alpha,
            antialias: self.antialias,
            depth: self.depth,
            fail_if_major_performance_caveat: self.fail_if_major_performance_caveat,
            power_preference: self.power_preference,
            premultiplied_alpha: self.premultiplied_alpha,
            preserve_drawing_buffer: self.preserve_drawing_buffer,
            stencil: self.stencil,
        }
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            version: ContextVersion::default(),
            alpha: true,
            depth: false,
            stencil: false,
            antialias: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            power_preference: PowerPreference::default(),
            fail_if_major_performance_caveat: false,
        }
    }
}

pub struct ContextOptionsBuilder {
    options: ContextOptions,
}

impl ContextOptionsBuilder {
    pub fn version(mut self, version: ContextVersion) -> Self {
        self.options.version = version;

        self
    }

    pub fn disable_alpha(mut self) -> Self {
        self.options.alpha = false;

        self
    }

    pub fn enable_depth(mut self) -> Self {
        self.options.depth = true;

        self
    }

    pub fn enable_stencil(mut self) -> Self {
        self.options.stencil = true;

        self
    }

    pub fn disable_antialias(mut self) -> Self {
        self.options.antialias = false;

        self
    }

    pub fn premultiplied_alpha(mut self, premultiplied_alpha: bool) -> Self {
        self.options.premultiplied_alpha = premultiplied_alpha;

        self
    }

    pub fn preserve_drawing_buffer(mut self, preserve_drawing_buffer: bool) -> Self {
        self.options.preserve_drawing_buffer = preserve_drawing_buffer;

        self
    }

    pub fn power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.options.power_preference = power_preference;

        self
    }

    pub fn fail_if_major_performance_caveat(
        mut self,
        fail_if_major_performance_caveat: bool,
    ) -> Self {
        self.options.fail_if_major_performance_caveat = fail_if_major_performance_caveat;

        self
    }

    pub fn finish(self) -> ContextOptions {
        self.options
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextAttributes {
    alpha: bool,
    antialias: bool,
    depth: bool,
    fail_if_major_performance_caveat: bool,
    power_preference: PowerPreference,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    stencil: bool,
}

/// Error returned when a context could not be acquired.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum ContextError {
    #[error("no canvas element with id `{0}`")]
    CanvasNotFound(String),
    #[error("the browser does not support a `{0}` context on this canvas")]
    Unsupported(&'static str),
    #[error("context creation failed: {0}")]
    Creation(String),
}

/// Looks up a canvas element in the current document by its element id.
pub fn canvas_by_id(id: &str) -> Result<HtmlCanvasElement, ContextError> {
    web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(id))
        .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or_else(|| ContextError::CanvasNotFound(id.to_string()))
}

fn get_context(
    canvas: &HtmlCanvasElement,
    context_id: &'static str,
    options: &ContextOptions,
) -> Result<js_sys::Object, ContextError> {
    #[allow(deprecated)]
    let attributes = JsValue::from_serde(&options.attributes())
        .map_err(|e| ContextError::Creation(e.to_string()))?;

    canvas
        .get_context_with_context_options(context_id, &attributes)
        .map_err(|e| ContextError::Creation(e.as_string().unwrap_or_else(|| format!("{:?}", e))))?
        .ok_or(ContextError::Unsupported(context_id))
}

/// Acquires a WebGL 1.0 context from the `canvas`, ignoring [ContextOptions::version].
pub fn webgl1_context(
    canvas: &HtmlCanvasElement,
    options: &ContextOptions,
) -> Result<WebGl1Context, ContextError> {
    let gl = get_context(canvas, "webgl", options)?.unchecked_into::<WebGlRenderingContext>();

    Ok(WebGl1Context::new(gl))
}

/// Acquires a WebGL 2.0 context from the `canvas`, ignoring [ContextOptions::version].
pub fn webgl2_context(
    canvas: &HtmlCanvasElement,
    options: &ContextOptions,
) -> Result<WebGl2Context, ContextError> {
    let gl = get_context(canvas, "webgl2", options)?.unchecked_into::<WebGl2RenderingContext>();

    Ok(WebGl2Context::new(gl))
}
