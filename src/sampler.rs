//! Samplers.
//!
//! WebGL 2.0 has sampler objects, which are created lazily and rebuilt when the sampler's
//! descriptor changes. WebGL 1.0 does not: there the sampling parameters are set on the texture
//! itself whenever the texture is bound with this sampler, skipping parameters the texture
//! already has.
use web_sys::WebGl2RenderingContext as Gl;

use crate::image::texture::{TextureObject, TextureParameter};
use crate::pipeline::TestFunction;
use crate::runtime::{Backend, RenderDevice, SubmitError};
use crate::util::{next_object_key, resource_id};

resource_id!(
    /// Identifies a sampler registered with a [RenderDevice].
    SamplerId
);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

impl AddressMode {
    fn id(&self) -> u32 {
        match self {
            AddressMode::ClampToEdge => Gl::CLAMP_TO_EDGE,
            AddressMode::Repeat => Gl::REPEAT,
            AddressMode::MirrorRepeat => Gl::MIRRORED_REPEAT,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FilterMode {
    Nearest,
    Linear,
}

impl FilterMode {
    pub(crate) fn id(&self) -> u32 {
        match self {
            FilterMode::Nearest => Gl::NEAREST,
            FilterMode::Linear => Gl::LINEAR,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SamplerDescriptor {
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,

    /// Only used for 3D textures, which require WebGL 2.0.
    pub address_mode_w: AddressMode,

    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,

    /// How to sample between mip levels; `None` samples the base level only.
    pub mipmap_filter: Option<FilterMode>,

    /// WebGL 2.0 only.
    pub lod_min_clamp: f32,

    /// WebGL 2.0 only.
    pub lod_max_clamp: f32,

    /// Makes this a comparison sampler for depth textures (WebGL 2.0 only).
    pub compare: Option<TestFunction>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        SamplerDescriptor {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: None,
            lod_min_clamp: -1000.0,
            lod_max_clamp: 1000.0,
            compare: None,
        }
    }
}

impl SamplerDescriptor {
    fn min_filter_id(&self) -> u32 {
        match (self.min_filter, self.mipmap_filter) {
            (FilterMode::Nearest, None) => Gl::NEAREST,
            (FilterMode::Linear, None) => Gl::LINEAR,
            (FilterMode::Nearest, Some(FilterMode::Nearest)) => Gl::NEAREST_MIPMAP_NEAREST,
            (FilterMode::Nearest, Some(FilterMode::Linear)) => Gl::NEAREST_MIPMAP_LINEAR,
            (FilterMode::Linear, Some(FilterMode::Nearest)) => Gl::LINEAR_MIPMAP_NEAREST,
            (FilterMode::Linear, Some(FilterMode::Linear)) => Gl::LINEAR_MIPMAP_LINEAR,
        }
    }

    fn mag_filter_id(&self) -> u32 {
        self.mag_filter.id()
    }

    /// The GL sampling parameters this descriptor sets. WebGL 1.0 lacks the wrap mode for the
    /// third dimension, the level of detail clamps and comparison.
    pub(crate) fn parameters(&self, webgl2: bool) -> Vec<(u32, TextureParameter)> {
        let int = |value: u32| TextureParameter::Int(value as i32);

        let mut parameters = vec![
            (Gl::TEXTURE_WRAP_S, int(self.address_mode_u.id())),
            (Gl::TEXTURE_WRAP_T, int(self.address_mode_v.id())),
            (Gl::TEXTURE_MAG_FILTER, int(self.mag_filter_id())),
            (Gl::TEXTURE_MIN_FILTER, int(self.min_filter_id())),
        ];

        if webgl2 {
            parameters.push((Gl::TEXTURE_WRAP_R, int(self.address_mode_w.id())));
            parameters.push((
                Gl::TEXTURE_MIN_LOD,
                TextureParameter::Float(self.lod_min_clamp),
            ));
            parameters.push((
                Gl::TEXTURE_MAX_LOD,
                TextureParameter::Float(self.lod_max_clamp),
            ));

            match self.compare {
                Some(function) => {
                    parameters.push((Gl::TEXTURE_COMPARE_MODE, int(Gl::COMPARE_REF_TO_TEXTURE)));
                    parameters.push((Gl::TEXTURE_COMPARE_FUNC, int(function.id())));
                }
                None => parameters.push((Gl::TEXTURE_COMPARE_MODE, int(Gl::NONE))),
            }
        }

        parameters
    }

    /// Sets this sampler's parameters on a texture, for WebGL 1.0. The texture must be bound on
    /// the active texture unit.
    pub(crate) fn apply_to_texture<B>(&self, gl: &B, texture: &mut TextureObject<B>)
    where
        B: Backend,
    {
        for (pname, value) in self.parameters(false) {
            texture.set_parameter(gl, pname, value);
        }
    }
}

pub(crate) struct SamplerEntry<B>
where
    B: Backend,
{
    descriptor: SamplerDescriptor,
    generation: u64,
    object: Option<SamplerObject<B>>,
}

impl<B> SamplerEntry<B>
where
    B: Backend,
{
    pub(crate) fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    pub(crate) fn object(&self) -> Option<&SamplerObject<B>> {
        self.object.as_ref()
    }

    pub(crate) fn forget_object(&mut self) {
        self.object = None;
    }
}

pub(crate) struct SamplerObject<B>
where
    B: Backend,
{
    pub(crate) key: u64,
    pub(crate) handle: B::Sampler,
    generation: u64,
}

impl<B> RenderDevice<B>
where
    B: Backend,
{
    pub fn create_sampler(&mut self, descriptor: SamplerDescriptor) -> SamplerId {
        let index = self.next_index();

        self.samplers.insert(
            index,
            SamplerEntry {
                descriptor,
                generation: 0,
                object: None,
            },
        );

        SamplerId::new(self.id, index)
    }

    pub fn sampler_descriptor(&self, id: SamplerId) -> Option<&SamplerDescriptor> {
        if id.context != self.id {
            return None;
        }

        self.samplers.get(&id.index).map(|entry| &entry.descriptor)
    }

    /// Changes the sampler's descriptor; the sampler object is rebuilt the next time a submission
    /// uses it.
    pub fn update_sampler<F>(&mut self, id: SamplerId, f: F)
    where
        F: FnOnce(&mut SamplerDescriptor),
    {
        if !self.owns(id.context, "sampler") {
            return;
        }

        if let Some(entry) = self.samplers.get_mut(&id.index) {
            f(&mut entry.descriptor);

            entry.generation += 1;
        } else {
            log::error!("Cannot update sampler {:?}: it has been destroyed.", id);
        }
    }

    pub fn destroy_sampler(&mut self, id: SamplerId) {
        if !self.owns(id.context, "sampler") {
            return;
        }

        if let Some(entry) = self.samplers.remove(&id.index) {
            if let Some(object) = entry.object {
                self.gl.delete_sampler(&object.handle);
            }
        }
    }

    /// On WebGL 2.0, makes sure the sampler object exists and matches the current descriptor.
    /// Returns the sampler's index, or `None` if the sampler does not exist (which is logged).
    pub(crate) fn prepare_sampler(&mut self, id: SamplerId) -> Result<Option<u64>, SubmitError> {
        if !self.owns(id.context, "sampler") {
            return Ok(None);
        }

        let RenderDevice { gl, samplers, .. } = self;

        let entry = match samplers.get_mut(&id.index) {
            Some(entry) => entry,
            None => {
                log::error!("Sampler {:?} has been destroyed.", id);

                return Ok(None);
            }
        };

        if !gl.version().is_webgl2() {
            return Ok(Some(id.index));
        }

        if let Some(object) = &entry.object {
            if object.generation == entry.generation {
                return Ok(Some(id.index));
            }
        }

        if let Some(stale) = entry.object.take() {
            log::debug!("Rebuilding sampler {:?}.", id);

            gl.delete_sampler(&stale.handle);
        }

        let handle = gl
            .create_sampler()
            .ok_or(SubmitError::ObjectCreation("sampler"))?;

        for (pname, value) in entry.descriptor.parameters(true) {
            match value {
                TextureParameter::Int(value) => gl.sampler_parameteri(&handle, pname, value),
                TextureParameter::Float(value) => gl.sampler_parameterf(&handle, pname, value),
            }
        }

        entry.object = Some(SamplerObject {
            key: next_object_key(),
            handle,
            generation: entry.generation,
        });

        Ok(Some(id.index))
    }
}
