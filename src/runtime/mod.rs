//! The device that executes submissions, and the WebGL contexts it runs on.
//!
//! A [RenderDevice] is generic over a [Backend]: [WebGl2Context] and [WebGl1Context] wrap the
//! browser's rendering contexts. Acquire one from a canvas with [webgl2_context] or
//! [webgl1_context].

mod backend;
pub use self::backend::{ActiveInfo, Backend, BackendError, GlVersion};

mod context_options;
pub use self::context_options::{
    canvas_by_id, webgl1_context, webgl2_context, ContextError, ContextOptions,
    ContextOptionsBuilder, ContextVersion, PowerPreference,
};

mod device;
pub use self::device::RenderDevice;

mod error;
pub use self::error::SubmitError;

pub mod state;

mod web;
pub use self::web::{WebGl1Context, WebGl2Context};

#[cfg(test)]
pub(crate) mod recording;
