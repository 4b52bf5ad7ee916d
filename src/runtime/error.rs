use thiserror::Error;

use crate::image::texture::TextureError;
use crate::pipeline::CreateProgramError;
use crate::rendering::copy::CopyError;

/// Error returned by [RenderDevice::submit] when a submission could not be executed.
///
/// Missing resources (destroyed or foreign ids, missing uniform values or attributes) are not
/// errors: they are logged and the affected work is skipped.
///
/// [RenderDevice::submit]: crate::runtime::RenderDevice::submit
#[derive(Clone, PartialEq, Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    CreateProgram(#[from] CreateProgramError),
    #[error(transparent)]
    Texture(#[from] TextureError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("instanced drawing requires WebGL 2.0 or the ANGLE_instanced_arrays extension")]
    InstancingUnavailable,
    #[error("framebuffer is incomplete (status {0:#x})")]
    IncompleteFramebuffer(u32),
    #[error("failed to create a {0} object")]
    ObjectCreation(&'static str),
}
