//! Textures, renderbuffers and the image data they are filled with.
pub mod format;
pub mod renderbuffer;
pub mod texture;

use web_sys::{HtmlCanvasElement, HtmlImageElement, HtmlVideoElement, ImageBitmap};

/// An already decoded DOM image that can be uploaded to a texture.
#[derive(Clone, Debug)]
pub enum ImageElement {
    Image(HtmlImageElement),
    Canvas(HtmlCanvasElement),
    Video(HtmlVideoElement),
    Bitmap(ImageBitmap),
}

impl ImageElement {
    /// The width of the decoded image in pixels.
    pub fn width(&self) -> u32 {
        match self {
            ImageElement::Image(image) => image.natural_width(),
            ImageElement::Canvas(canvas) => canvas.width(),
            ImageElement::Video(video) => video.video_width(),
            ImageElement::Bitmap(bitmap) => bitmap.width(),
        }
    }

    /// The height of the decoded image in pixels.
    pub fn height(&self) -> u32 {
        match self {
            ImageElement::Image(image) => image.natural_height(),
            ImageElement::Canvas(canvas) => canvas.height(),
            ImageElement::Video(video) => video.video_height(),
            ImageElement::Bitmap(bitmap) => bitmap.height(),
        }
    }
}

impl From<HtmlImageElement> for ImageElement {
    fn from(image: HtmlImageElement) -> Self {
        ImageElement::Image(image)
    }
}

impl From<HtmlCanvasElement> for ImageElement {
    fn from(canvas: HtmlCanvasElement) -> Self {
        ImageElement::Canvas(canvas)
    }
}

impl From<HtmlVideoElement> for ImageElement {
    fn from(video: HtmlVideoElement) -> Self {
        ImageElement::Video(video)
    }
}

impl From<ImageBitmap> for ImageElement {
    fn from(bitmap: ImageBitmap) -> Self {
        ImageElement::Bitmap(bitmap)
    }
}

/// The pixel data for one image of a texture.
#[derive(Clone, Debug)]
pub enum SourceData {
    /// Tightly packed pixel data in the texture's format, rows bottom to top.
    Bytes {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
    Element(ImageElement),
}

impl SourceData {
    pub fn size(&self) -> (u32, u32) {
        match self {
            SourceData::Bytes { width, height, .. } => (*width, *height),
            SourceData::Element(element) => (element.width(), element.height()),
        }
    }
}

/// Fills one image of a texture: a mipmap level of a 2D texture, or a mipmap level of one cube
/// face, array layer or depth slice.
#[derive(Clone, Debug)]
pub struct TextureSource {
    pub data: SourceData,
    pub mip_level: u32,

    /// The cube face (in `+X, -X, +Y, -Y, +Z, -Z` order), array layer or depth slice. Ignored for
    /// 2D textures.
    pub layer: u32,
}

impl TextureSource {
    pub fn bytes(data: Vec<u8>, width: u32, height: u32) -> Self {
        TextureSource {
            data: SourceData::Bytes {
                data,
                width,
                height,
            },
            mip_level: 0,
            layer: 0,
        }
    }

    pub fn element<E>(element: E) -> Self
    where
        E: Into<ImageElement>,
    {
        TextureSource {
            data: SourceData::Element(element.into()),
            mip_level: 0,
            layer: 0,
        }
    }

    pub fn mip_level(mut self, mip_level: u32) -> Self {
        self.mip_level = mip_level;

        self
    }

    pub fn layer(mut self, layer: u32) -> Self {
        self.layer = layer;

        self
    }
}
