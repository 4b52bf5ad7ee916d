//! Image storage formats for textures and renderbuffers.
//!
//! WebGL 2.0 stores images in sized internal formats. WebGL 1.0 only knows unsized formats, so
//! every [TextureFormat] maps to the closest unsized equivalent there, or to nothing if WebGL 1.0
//! cannot store it.
use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::GlVersion;

/// `UNSIGNED_INT_24_8_WEBGL` from the `WEBGL_depth_texture` extension.
const UNSIGNED_INT_24_8_WEBGL: u32 = 0x84FA;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureFormat {
    R8,
    R16F,
    R32F,
    R8UI,
    R8I,
    R16UI,
    R16I,
    R32UI,
    R32I,
    RG8,
    RG16F,
    RG32F,
    RG8UI,
    RG32UI,
    RGB8,
    SRGB8,
    RGB565,
    RGBA8,
    SRGB8_ALPHA8,
    RGB5_A1,
    RGBA4,
    RGB10_A2,
    RGBA16F,
    RGBA32F,
    RGBA8UI,
    RGBA8I,
    RGBA16UI,
    RGBA32UI,
    RGBA32I,
    DepthComponent16,
    DepthComponent24,
    DepthComponent32F,
    StencilIndex8,
    Depth24Stencil8,
    Depth32FStencil8,
    Luminance,
    LuminanceAlpha,
    Alpha,
}

/// The parts of an image a format stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Aspect {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

impl Aspect {
    /// The framebuffer attachment point for an image of this aspect; `index` selects the color
    /// attachment.
    pub(crate) fn attachment_point(&self, index: u32) -> u32 {
        match self {
            Aspect::Color => Gl::COLOR_ATTACHMENT0 + index,
            Aspect::Depth => Gl::DEPTH_ATTACHMENT,
            Aspect::Stencil => Gl::STENCIL_ATTACHMENT,
            Aspect::DepthStencil => Gl::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    /// The `blitFramebuffer` mask that copies this aspect.
    pub(crate) fn buffer_mask(&self) -> u32 {
        match self {
            Aspect::Color => Gl::COLOR_BUFFER_BIT,
            Aspect::Depth => Gl::DEPTH_BUFFER_BIT,
            Aspect::Stencil => Gl::STENCIL_BUFFER_BIT,
            Aspect::DepthStencil => Gl::DEPTH_BUFFER_BIT | Gl::STENCIL_BUFFER_BIT,
        }
    }
}

/// The kind of values a color format stores, which selects the `clearBuffer*` variant.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ComponentKind {
    Float,
    Int,
    Uint,
}

/// The arguments for a `texImage*` call that allocates storage in a certain format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct UploadFormat {
    pub(crate) internal_format: u32,
    pub(crate) format: u32,
    pub(crate) type_: u32,
}

impl TextureFormat {
    pub fn aspect(&self) -> Aspect {
        match self {
            TextureFormat::DepthComponent16
            | TextureFormat::DepthComponent24
            | TextureFormat::DepthComponent32F => Aspect::Depth,
            TextureFormat::StencilIndex8 => Aspect::Stencil,
            TextureFormat::Depth24Stencil8 | TextureFormat::Depth32FStencil8 => {
                Aspect::DepthStencil
            }
            _ => Aspect::Color,
        }
    }

    pub(crate) fn component_kind(&self) -> ComponentKind {
        match self {
            TextureFormat::R8I
            | TextureFormat::R16I
            | TextureFormat::R32I
            | TextureFormat::RGBA8I
            | TextureFormat::RGBA32I => ComponentKind::Int,
            TextureFormat::R8UI
            | TextureFormat::R16UI
            | TextureFormat::R32UI
            | TextureFormat::RG8UI
            | TextureFormat::RG32UI
            | TextureFormat::RGBA8UI
            | TextureFormat::RGBA16UI
            | TextureFormat::RGBA32UI => ComponentKind::Uint,
            _ => ComponentKind::Float,
        }
    }

    /// The `texImage*` arguments for this format, or `None` if the format cannot be used for
    /// textures in the given WebGL version.
    pub(crate) fn upload_format(&self, version: GlVersion) -> Option<UploadFormat> {
        let (internal_format, format, type_) = if version.is_webgl2() {
            self.webgl2_upload_format()?
        } else {
            self.webgl1_upload_format()?
        };

        Some(UploadFormat {
            internal_format,
            format,
            type_,
        })
    }

    fn webgl2_upload_format(&self) -> Option<(u32, u32, u32)> {
        let format = match self {
            TextureFormat::R8 => (Gl::R8, Gl::RED, Gl::UNSIGNED_BYTE),
            TextureFormat::R16F => (Gl::R16F, Gl::RED, Gl::HALF_FLOAT),
            TextureFormat::R32F => (Gl::R32F, Gl::RED, Gl::FLOAT),
            TextureFormat::R8UI => (Gl::R8UI, Gl::RED_INTEGER, Gl::UNSIGNED_BYTE),
            TextureFormat::R8I => (Gl::R8I, Gl::RED_INTEGER, Gl::BYTE),
            TextureFormat::R16UI => (Gl::R16UI, Gl::RED_INTEGER, Gl::UNSIGNED_SHORT),
            TextureFormat::R16I => (Gl::R16I, Gl::RED_INTEGER, Gl::SHORT),
            TextureFormat::R32UI => (Gl::R32UI, Gl::RED_INTEGER, Gl::UNSIGNED_INT),
            TextureFormat::R32I => (Gl::R32I, Gl::RED_INTEGER, Gl::INT),
            TextureFormat::RG8 => (Gl::RG8, Gl::RG, Gl::UNSIGNED_BYTE),
            TextureFormat::RG16F => (Gl::RG16F, Gl::RG, Gl::HALF_FLOAT),
            TextureFormat::RG32F => (Gl::RG32F, Gl::RG, Gl::FLOAT),
            TextureFormat::RG8UI => (Gl::RG8UI, Gl::RG_INTEGER, Gl::UNSIGNED_BYTE),
            TextureFormat::RG32UI => (Gl::RG32UI, Gl::RG_INTEGER, Gl::UNSIGNED_INT),
            TextureFormat::RGB8 => (Gl::RGB8, Gl::RGB, Gl::UNSIGNED_BYTE),
            TextureFormat::SRGB8 => (Gl::SRGB8, Gl::RGB, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB565 => (Gl::RGB565, Gl::RGB, Gl::UNSIGNED_BYTE),
            TextureFormat::RGBA8 => (Gl::RGBA8, Gl::RGBA, Gl::UNSIGNED_BYTE),
            TextureFormat::SRGB8_ALPHA8 => (Gl::SRGB8_ALPHA8, Gl::RGBA, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB5_A1 => (Gl::RGB5_A1, Gl::RGBA, Gl::UNSIGNED_BYTE),
            TextureFormat::RGBA4 => (Gl::RGBA4, Gl::RGBA, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB10_A2 => (
                Gl::RGB10_A2,
                Gl::RGBA,
                Gl::UNSIGNED_INT_2_10_10_10_REV,
            ),
            TextureFormat::RGBA16F => (Gl::RGBA16F, Gl::RGBA, Gl::HALF_FLOAT),
            TextureFormat::RGBA32F => (Gl::RGBA32F, Gl::RGBA, Gl::FLOAT),
            TextureFormat::RGBA8UI => (Gl::RGBA8UI, Gl::RGBA_INTEGER, Gl::UNSIGNED_BYTE),
            TextureFormat::RGBA8I => (Gl::RGBA8I, Gl::RGBA_INTEGER, Gl::BYTE),
            TextureFormat::RGBA16UI => (Gl::RGBA16UI, Gl::RGBA_INTEGER, Gl::UNSIGNED_SHORT),
            TextureFormat::RGBA32UI => (Gl::RGBA32UI, Gl::RGBA_INTEGER, Gl::UNSIGNED_INT),
            TextureFormat::RGBA32I => (Gl::RGBA32I, Gl::RGBA_INTEGER, Gl::INT),
            TextureFormat::DepthComponent16 => (
                Gl::DEPTH_COMPONENT16,
                Gl::DEPTH_COMPONENT,
                Gl::UNSIGNED_SHORT,
            ),
            TextureFormat::DepthComponent24 => (
                Gl::DEPTH_COMPONENT24,
                Gl::DEPTH_COMPONENT,
                Gl::UNSIGNED_INT,
            ),
            TextureFormat::DepthComponent32F => {
                (Gl::DEPTH_COMPONENT32F, Gl::DEPTH_COMPONENT, Gl::FLOAT)
            }
            TextureFormat::StencilIndex8 => return None,
            TextureFormat::Depth24Stencil8 => (
                Gl::DEPTH24_STENCIL8,
                Gl::DEPTH_STENCIL,
                Gl::UNSIGNED_INT_24_8,
            ),
            TextureFormat::Depth32FStencil8 => (
                Gl::DEPTH32F_STENCIL8,
                Gl::DEPTH_STENCIL,
                Gl::FLOAT_32_UNSIGNED_INT_24_8_REV,
            ),
            TextureFormat::Luminance => (Gl::LUMINANCE, Gl::LUMINANCE, Gl::UNSIGNED_BYTE),
            TextureFormat::LuminanceAlpha => (
                Gl::LUMINANCE_ALPHA,
                Gl::LUMINANCE_ALPHA,
                Gl::UNSIGNED_BYTE,
            ),
            TextureFormat::Alpha => (Gl::ALPHA, Gl::ALPHA, Gl::UNSIGNED_BYTE),
        };

        Some(format)
    }

    fn webgl1_upload_format(&self) -> Option<(u32, u32, u32)> {
        let (format, type_) = match self {
            TextureFormat::R8 | TextureFormat::Luminance => (Gl::LUMINANCE, Gl::UNSIGNED_BYTE),
            TextureFormat::RG8 | TextureFormat::LuminanceAlpha => {
                (Gl::LUMINANCE_ALPHA, Gl::UNSIGNED_BYTE)
            }
            TextureFormat::Alpha => (Gl::ALPHA, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB8 => (Gl::RGB, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB565 => (Gl::RGB, Gl::UNSIGNED_SHORT_5_6_5),
            TextureFormat::RGBA8 => (Gl::RGBA, Gl::UNSIGNED_BYTE),
            TextureFormat::RGB5_A1 => (Gl::RGBA, Gl::UNSIGNED_SHORT_5_5_5_1),
            TextureFormat::RGBA4 => (Gl::RGBA, Gl::UNSIGNED_SHORT_4_4_4_4),
            TextureFormat::RGBA32F => (Gl::RGBA, Gl::FLOAT),
            TextureFormat::DepthComponent16 => (Gl::DEPTH_COMPONENT, Gl::UNSIGNED_SHORT),
            TextureFormat::DepthComponent24 => (Gl::DEPTH_COMPONENT, Gl::UNSIGNED_INT),
            TextureFormat::Depth24Stencil8 => (Gl::DEPTH_STENCIL, UNSIGNED_INT_24_8_WEBGL),
            _ => return None,
        };

        // Unsized internal formats must equal the pixel format.
        Some((format, format, type_))
    }

    /// The `renderbufferStorage` internal format for this format, or `None` if the format cannot
    /// be used for renderbuffers in the given WebGL version.
    pub(crate) fn renderbuffer_format(&self, version: GlVersion) -> Option<u32> {
        if version.is_webgl2() {
            match self {
                TextureFormat::Luminance
                | TextureFormat::LuminanceAlpha
                | TextureFormat::Alpha => None,
                TextureFormat::StencilIndex8 => Some(Gl::STENCIL_INDEX8),
                _ => self
                    .webgl2_upload_format()
                    .map(|(internal_format, _, _)| internal_format),
            }
        } else {
            match self {
                TextureFormat::RGBA4 => Some(Gl::RGBA4),
                TextureFormat::RGB565 => Some(Gl::RGB565),
                TextureFormat::RGB5_A1 => Some(Gl::RGB5_A1),
                TextureFormat::DepthComponent16 => Some(Gl::DEPTH_COMPONENT16),
                TextureFormat::StencilIndex8 => Some(Gl::STENCIL_INDEX8),
                TextureFormat::Depth24Stencil8 => Some(Gl::DEPTH_STENCIL),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webgl2_uses_sized_formats() {
        let format = TextureFormat::RGBA8
            .upload_format(GlVersion::WebGl2)
            .unwrap();

        assert_eq!(format.internal_format, Gl::RGBA8);
        assert_eq!(format.format, Gl::RGBA);
        assert_eq!(format.type_, Gl::UNSIGNED_BYTE);
    }

    #[test]
    fn test_webgl1_uses_unsized_formats() {
        let r8 = TextureFormat::R8.upload_format(GlVersion::WebGl1).unwrap();
        let depth_stencil = TextureFormat::Depth24Stencil8
            .upload_format(GlVersion::WebGl1)
            .unwrap();

        assert_eq!(r8.internal_format, Gl::LUMINANCE);
        assert_eq!(depth_stencil.internal_format, Gl::DEPTH_STENCIL);
        assert_eq!(depth_stencil.type_, 0x84FA);
        assert_eq!(TextureFormat::RGBA8UI.upload_format(GlVersion::WebGl1), None);
    }

    #[test]
    fn test_renderbuffer_formats() {
        assert_eq!(
            TextureFormat::RGBA8.renderbuffer_format(GlVersion::WebGl2),
            Some(Gl::RGBA8)
        );
        assert_eq!(
            TextureFormat::RGBA8.renderbuffer_format(GlVersion::WebGl1),
            None
        );
        assert_eq!(
            TextureFormat::Depth24Stencil8.renderbuffer_format(GlVersion::WebGl1),
            Some(Gl::DEPTH_STENCIL)
        );
    }

    #[test]
    fn test_aspects() {
        assert_eq!(TextureFormat::RGBA8.aspect(), Aspect::Color);
        assert_eq!(TextureFormat::DepthComponent24.aspect(), Aspect::Depth);
        assert_eq!(
            TextureFormat::Depth24Stencil8.aspect().buffer_mask(),
            Gl::DEPTH_BUFFER_BIT | Gl::STENCIL_BUFFER_BIT
        );
        assert_eq!(Aspect::Color.attachment_point(2), Gl::COLOR_ATTACHMENT2);
    }
}
