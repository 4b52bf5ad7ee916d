//! Textures.
//!
//! A texture is registered with [RenderDevice::create_texture]. Its GL texture object is created
//! and filled lazily, the first time a submission references the texture. Changing a texture
//! through [RenderDevice::update_texture] never touches the existing GL object: the next
//! submission that uses the texture creates a new object and uploads every source again, since
//! the new format or size may not be compatible with the old storage.
use fnv::FnvHashMap;
use thiserror::Error;
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::format::{Aspect, ComponentKind, TextureFormat, UploadFormat};
use crate::image::{SourceData, TextureSource};
use crate::runtime::state::ContextUpdate;
use crate::runtime::{Backend, BackendError, RenderDevice, SubmitError};
use crate::util::{next_object_key, resource_id};

resource_id!(
    /// Identifies a texture registered with a [RenderDevice].
    TextureId
);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureDimension {
    D2,
    Cube,
    /// Requires WebGL 2.0.
    D2Array,
    /// Requires WebGL 2.0.
    D3,
}

impl TextureDimension {
    pub(crate) fn target(&self) -> u32 {
        match self {
            TextureDimension::D2 => Gl::TEXTURE_2D,
            TextureDimension::Cube => Gl::TEXTURE_CUBE_MAP,
            TextureDimension::D2Array => Gl::TEXTURE_2D_ARRAY,
            TextureDimension::D3 => Gl::TEXTURE_3D,
        }
    }

    pub(crate) fn is_layered(&self) -> bool {
        matches!(self, TextureDimension::D2Array | TextureDimension::D3)
    }

    /// The target for `texImage2D` and `framebufferTexture2D` calls that address a single image;
    /// `layer` selects the cube face.
    pub(crate) fn image_target(&self, layer: u32) -> u32 {
        match self {
            TextureDimension::Cube => Gl::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
            _ => self.target(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub format: TextureFormat,
    pub dimension: TextureDimension,

    /// The width and height of mip level 0. Taken from the mip level 0 sources if `None`.
    pub size: Option<(u32, u32)>,

    /// The number of array layers of a [TextureDimension::D2Array] texture, or the depth of a
    /// [TextureDimension::D3] texture.
    pub depth_or_array_layers: u32,

    /// Whether the remaining mip levels are generated from level 0 after all sources uploaded.
    pub generate_mipmaps: bool,

    pub sources: Vec<TextureSource>,
}

impl TextureDescriptor {
    pub fn new(format: TextureFormat, dimension: TextureDimension) -> Self {
        TextureDescriptor {
            format,
            dimension,
            size: None,
            depth_or_array_layers: 1,
            generate_mipmaps: false,
            sources: Vec::new(),
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));

        self
    }

    pub fn depth_or_array_layers(mut self, depth_or_array_layers: u32) -> Self {
        self.depth_or_array_layers = depth_or_array_layers;

        self
    }

    pub fn generate_mipmaps(mut self) -> Self {
        self.generate_mipmaps = true;

        self
    }

    pub fn source(mut self, source: TextureSource) -> Self {
        self.sources.push(source);

        self
    }
}

/// A single image of a texture: a mip level of a 2D texture, or a mip level of one cube face,
/// array layer or depth slice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureView {
    pub texture: TextureId,
    pub mip_level: u32,
    pub layer: u32,
}

impl From<TextureId> for TextureView {
    fn from(texture: TextureId) -> Self {
        TextureView {
            texture,
            mip_level: 0,
            layer: 0,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum TextureError {
    #[error("mip level 0 sources disagree in size: expected {expected:?}, found {found:?}")]
    MismatchedSourceSize {
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("unsupported texture: {0}")]
    Unsupported(String),
    #[error("the texture has no explicit size and no mip level 0 source to derive it from")]
    MissingSize,
    #[error(transparent)]
    Upload(#[from] BackendError),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum TextureParameter {
    Int(i32),
    Float(f32),
}

pub(crate) struct TextureEntry<B>
where
    B: Backend,
{
    descriptor: TextureDescriptor,
    generation: u64,
    object: Option<TextureObject<B>>,
}

impl<B> TextureEntry<B>
where
    B: Backend,
{
    pub(crate) fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub(crate) fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    pub(crate) fn object(&self) -> Option<&TextureObject<B>> {
        self.object.as_ref()
    }

    pub(crate) fn object_mut(&mut self) -> Option<&mut TextureObject<B>> {
        self.object.as_mut()
    }

    pub(crate) fn forget_object(&mut self) {
        self.object = None;
    }
}

pub(crate) struct TextureObject<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::Texture,
    pub(crate) target: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    generation: u64,
    parameters: FnvHashMap<u32, TextureParameter>,
}

impl<B> TextureObject<B>
where
    B: Backend,
{
    /// The size of the image at `mip_level`.
    pub(crate) fn level_size(&self, mip_level: u32) -> (u32, u32) {
        (
            mip_size(self.width, mip_level),
            mip_size(self.height, mip_level),
        )
    }

    /// Sets a texture parameter, unless it already has the value. The texture must be bound to
    /// its target on the active texture unit.
    pub(crate) fn set_parameter(&mut self, gl: &B, pname: u32, value: TextureParameter) {
        if self.parameters.get(&pname) == Some(&value) {
            return;
        }

        match value {
            TextureParameter::Int(value) => gl.tex_parameteri(self.target, pname, value),
            TextureParameter::Float(value) => gl.tex_parameterf(self.target, pname, value),
        }

        self.parameters.insert(pname, value);
    }
}

fn mip_size(base: u32, mip_level: u32) -> u32 {
    (base >> mip_level).max(1)
}

struct Uploaded {
    width: u32,
    height: u32,
    mipmapped: bool,
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureId {
        let index = self.next_index();

        self.textures.insert(
            index,
            TextureEntry {
                descriptor,
                generation: 0,
                object: None,
            },
        );

        TextureId::new(self.id, index)
    }

    pub fn texture_descriptor(&self, id: TextureId) -> Option<&TextureDescriptor> {
        if id.context != self.id {
            return None;
        }

        self.textures.get(&id.index).map(|entry| &entry.descriptor)
    }

    /// Changes the texture's descriptor. The texture is rebuilt the next time a submission uses
    /// it; framebuffers that have the texture attached are rebuilt with it.
    pub fn update_texture<F>(&mut self, id: TextureId, f: F)
    where
        F: FnOnce(&mut TextureDescriptor),
    {
        if !self.owns(id.context, "texture") {
            return;
        }

        if let Some(entry) = self.textures.get_mut(&id.index) {
            f(&mut entry.descriptor);

            entry.generation += 1;
        } else {
            log::error!("Cannot update texture {:?}: it has been destroyed.", id);
        }
    }

    pub fn destroy_texture(&mut self, id: TextureId) {
        if !self.owns(id.context, "texture") {
            return;
        }

        let RenderDevice {
            gl,
            state,
            textures,
            framebuffers,
            multisample,
            ..
        } = self;

        if let Some(entry) = textures.remove(&id.index) {
            if let Some(object) = entry.object {
                framebuffers.remove_dependents(gl, state, object.key);
                multisample.remove_dependents(gl, state, object.key);
                gl.delete_texture(&object.handle);
            }
        }
    }

    /// Makes sure the texture's GL object exists and holds the current descriptor's images;
    /// returns the texture's index, or `None` if the texture does not exist (which is logged).
    pub(crate) fn prepare_texture(&mut self, id: TextureId) -> Result<Option<u64>, SubmitError> {
        if !self.owns(id.context, "texture") {
            return Ok(None);
        }

        let RenderDevice {
            gl,
            state,
            textures,
            framebuffers,
            multisample,
            ..
        } = self;

        let entry = match textures.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Texture {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        if let Some(object) = &entry.object {
            if object.generation == entry.generation {
                return Ok(Some(id.index));
            }
        }

        if let Some(stale) = entry.object.take() {
            log::debug!("Rebuilding texture {:?}.", id);

            framebuffers.remove_dependents(gl, state, stale.key);
            multisample.remove_dependents(gl, state, stale.key);
            gl.delete_texture(&stale.handle);
        }

        let handle = gl
            .create_texture()
            .ok_or(SubmitError::ObjectCreation("texture"))?;
        let key = next_object_key();
        let descriptor = &entry.descriptor;
        let target = descriptor.dimension.target();

        state.set_bound_texture(target, Some((key, &handle))).apply(gl);

        let uploaded = match upload(gl, descriptor) {
            Ok(uploaded) => uploaded,
            Err(err) => {
                state.set_bound_texture(target, None).apply(gl);
                gl.delete_texture(&handle);

                return Err(err.into());
            }
        };

        log::debug!(
            "Created GL texture for {:?} ({}x{}).",
            id,
            uploaded.width,
            uploaded.height
        );

        let mut object = TextureObject {
            key,
            handle,
            target,
            width: uploaded.width,
            height: uploaded.height,
            generation: entry.generation,
            parameters: FnvHashMap::default(),
        };

        apply_default_parameters(gl, &mut object, descriptor.format, &uploaded);

        entry.object = Some(object);

        Ok(Some(id.index))
    }
}

/// The default minification filter samples mip levels, which leaves a texture without mip levels
/// incomplete. Integer and depth formats cannot be filtered linearly and non-power-of-two
/// textures cannot repeat in WebGL 1.0.
fn apply_default_parameters<B>(
    gl: &B,
    object: &mut TextureObject<B>,
    format: TextureFormat,
    uploaded: &Uploaded,
) where
    B: Backend,
{
    let filterable = format.component_kind() == ComponentKind::Float
        && format.aspect() == Aspect::Color;

    if !filterable {
        object.set_parameter(
            gl,
            Gl::TEXTURE_MAG_FILTER,
            TextureParameter::Int(Gl::NEAREST as i32),
        );
    }

    if !uploaded.mipmapped {
        let filter = if filterable { Gl::LINEAR } else { Gl::NEAREST };

        object.set_parameter(gl, Gl::TEXTURE_MIN_FILTER, TextureParameter::Int(filter as i32));
    }

    let power_of_two = uploaded.width.is_power_of_two() && uploaded.height.is_power_of_two();

    if !gl.version().is_webgl2() && !power_of_two {
        let clamp = TextureParameter::Int(Gl::CLAMP_TO_EDGE as i32);

        object.set_parameter(gl, Gl::TEXTURE_WRAP_S, clamp);
        object.set_parameter(gl, Gl::TEXTURE_WRAP_T, clamp);
    }
}

fn base_size(descriptor: &TextureDescriptor) -> Result<(u32, u32), TextureError> {
    let mut size = descriptor.size;

    for source in descriptor.sources.iter().filter(|s| s.mip_level == 0) {
        let found = source.data.size();

        match size {
            None => size = Some(found),
            Some(expected) if expected != found => {
                return Err(TextureError::MismatchedSourceSize { expected, found })
            }
            _ => (),
        }
    }

    size.ok_or(TextureError::MissingSize)
}

/// Allocates storage for the bound texture and uploads every source.
fn upload<B>(gl: &B, descriptor: &TextureDescriptor) -> Result<Uploaded, TextureError>
where
    B: Backend,
{
    let version = gl.version();
    let dimension = descriptor.dimension;

    if dimension.is_layered() && !version.is_webgl2() {
        return Err(TextureError::Unsupported(format!(
            "{:?} textures require WebGL 2.0",
            dimension
        )));
    }

    let format = descriptor.format.upload_format(version).ok_or_else(|| {
        TextureError::Unsupported(format!(
            "format {:?} cannot be used for textures on {:?}",
            descriptor.format, version
        ))
    })?;
    let (width, height) = base_size(descriptor)?;

    gl.pixel_storei(Gl::UNPACK_ALIGNMENT, 1);

    if dimension.is_layered() {
        upload_layered(gl, descriptor, format, width, height)?;
    } else {
        upload_2d(gl, descriptor, format, width, height)?;
    }

    let mut mipmapped = descriptor.sources.iter().any(|s| s.mip_level > 0);

    if descriptor.generate_mipmaps {
        if !version.is_webgl2() && !(width.is_power_of_two() && height.is_power_of_two()) {
            log::warn!(
                "Cannot generate mipmaps for a {}x{} texture: WebGL 1.0 requires power-of-two \
                 dimensions.",
                width,
                height
            );
        } else {
            gl.generate_mipmap(dimension.target());

            mipmapped = true;
        }
    }

    Ok(Uploaded {
        width,
        height,
        mipmapped,
    })
}

fn upload_2d<B>(
    gl: &B,
    descriptor: &TextureDescriptor,
    format: UploadFormat,
    width: u32,
    height: u32,
) -> Result<(), TextureError>
where
    B: Backend,
{
    let dimension = descriptor.dimension;
    let images = if dimension == TextureDimension::Cube {
        6
    } else {
        1
    };

    // Level 0 images without a source still need storage for the texture to be complete.
    for layer in 0..images {
        let sourced = descriptor
            .sources
            .iter()
            .any(|s| s.mip_level == 0 && (images == 1 || s.layer == layer));

        if !sourced {
            gl.tex_image_2d(
                dimension.image_target(layer),
                0,
                format.internal_format,
                width,
                height,
                format.format,
                format.type_,
                None,
            )?;
        }
    }

    for source in &descriptor.sources {
        if images > 1 && source.layer >= images {
            log::error!(
                "Ignoring texture source for cube face {}: a cube map has 6 faces.",
                source.layer
            );

            continue;
        }

        let target = dimension.image_target(if images > 1 { source.layer } else { 0 });

        match &source.data {
            SourceData::Bytes {
                data,
                width,
                height,
            } => gl.tex_image_2d(
                target,
                source.mip_level,
                format.internal_format,
                *width,
                *height,
                format.format,
                format.type_,
                Some(data.as_slice()),
            )?,
            SourceData::Element(element) => gl.tex_image_2d_with_element(
                target,
                source.mip_level,
                format.internal_format,
                format.format,
                format.type_,
                element,
            )?,
        }
    }

    Ok(())
}

fn upload_layered<B>(
    gl: &B,
    descriptor: &TextureDescriptor,
    format: UploadFormat,
    width: u32,
    height: u32,
) -> Result<(), TextureError>
where
    B: Backend,
{
    let dimension = descriptor.dimension;
    let target = dimension.target();
    let depth = descriptor.depth_or_array_layers.max(1);

    let mut levels: Vec<u32> = descriptor.sources.iter().map(|s| s.mip_level).collect();

    levels.push(0);
    levels.sort_unstable();
    levels.dedup();

    for level in levels {
        let level_depth = if dimension == TextureDimension::D3 {
            mip_size(depth, level)
        } else {
            depth
        };

        gl.tex_image_3d(
            target,
            level,
            format.internal_format,
            mip_size(width, level),
            mip_size(height, level),
            level_depth,
            format.format,
            format.type_,
            None,
        )?;
    }

    for source in &descriptor.sources {
        let offset = (0, 0, source.layer);

        match &source.data {
            SourceData::Bytes {
                data,
                width,
                height,
            } => gl.tex_sub_image_3d(
                target,
                source.mip_level,
                offset,
                *width,
                *height,
                format.format,
                format.type_,
                data,
            )?,
            SourceData::Element(element) => gl.tex_sub_image_3d_with_element(
                target,
                source.mip_level,
                offset,
                element.width(),
                element.height(),
                format.format,
                format.type_,
                element,
            )?,
        }
    }

    Ok(())
}
