//! Executes declarative, WebGPU-shaped GPU work on WebGL 1.0 and WebGL 2.0.
//!
//! Resources (buffers, textures, samplers, renderbuffers, pipelines, transform feedback targets
//! and occlusion queries) are described by plain descriptors and registered with a
//! [RenderDevice](runtime::RenderDevice). Every frame the application builds a
//! [Submission](rendering::Submission) of render, blit and copy passes and hands it to
//! [RenderDevice::submit](runtime::RenderDevice::submit). The device creates the WebGL objects the
//! submission needs on first use, caches them, and only touches GL state that differs from what
//! is already set.

pub mod buffer;
pub mod image;
pub mod pipeline;
pub mod rendering;
pub mod runtime;
pub mod sampler;
pub mod transform_feedback;
pub mod vertex;

mod util;
pub use self::util::{f32_bytes, u16_bytes, u32_bytes};
