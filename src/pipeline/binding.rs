//! Values bound to a program's uniforms.
//!
//! A render object carries a tree of [BindingResource]s keyed by name. Every active uniform of the
//! program is looked up in that tree by walking the segments of its name, so the uniform
//! `lights[1].color` is found in the `color` field of the second element of the `lights` array.
use fnv::FnvHashMap;

use crate::buffer::{BufferBinding, BufferId};
use crate::image::texture::TextureId;
use crate::pipeline::reflection::{IdentifierSegment, UniformIdentifier, UniformKind};
use crate::runtime::Backend;
use crate::sampler::SamplerId;

/// A texture together with the sampler it is sampled with.
///
/// Without a sampler the texture is sampled with its own default parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureBinding {
    pub texture: TextureId,
    pub sampler: Option<SamplerId>,
}

impl TextureBinding {
    pub fn new(texture: TextureId, sampler: SamplerId) -> Self {
        TextureBinding {
            texture,
            sampler: Some(sampler),
        }
    }
}

impl From<TextureId> for TextureBinding {
    fn from(texture: TextureId) -> Self {
        TextureBinding {
            texture,
            sampler: None,
        }
    }
}

/// A value bound to a uniform, a uniform block or a group of them.
///
/// Scalars, vectors and matrices are flat lists of components; matrices are in column-major
/// order.
#[derive(Clone, PartialEq, Debug)]
pub enum BindingResource {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Uint(Vec<u32>),
    Bool(Vec<bool>),
    Array(Vec<BindingResource>),
    Struct(FnvHashMap<String, BindingResource>),
    Texture(TextureBinding),
    Buffer(BufferBinding),
}

impl BindingResource {
    /// Builds a [BindingResource::Struct] from `(field name, value)` pairs.
    pub fn fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<BindingResource>,
    {
        BindingResource::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            BindingResource::Float(_) => "float",
            BindingResource::Int(_) => "int",
            BindingResource::Uint(_) => "uint",
            BindingResource::Bool(_) => "bool",
            BindingResource::Array(_) => "array",
            BindingResource::Struct(_) => "struct",
            BindingResource::Texture(_) => "texture",
            BindingResource::Buffer(_) => "buffer",
        }
    }
}

macro_rules! impl_from_components {
    ($variant:ident, $component:ty) => {
        impl From<$component> for BindingResource {
            fn from(value: $component) -> Self {
                BindingResource::$variant(vec![value])
            }
        }

        impl<const N: usize> From<[$component; N]> for BindingResource {
            fn from(value: [$component; N]) -> Self {
                BindingResource::$variant(value.to_vec())
            }
        }
    };
}

impl_from_components!(Float, f32);
impl_from_components!(Int, i32);
impl_from_components!(Uint, u32);
impl_from_components!(Bool, bool);

/// Matrices, given as an array of columns.
impl<const C: usize, const R: usize> From<[[f32; R]; C]> for BindingResource {
    fn from(columns: [[f32; R]; C]) -> Self {
        BindingResource::Float(columns.iter().flatten().copied().collect())
    }
}

impl From<Vec<BindingResource>> for BindingResource {
    fn from(elements: Vec<BindingResource>) -> Self {
        BindingResource::Array(elements)
    }
}

impl From<TextureBinding> for BindingResource {
    fn from(binding: TextureBinding) -> Self {
        BindingResource::Texture(binding)
    }
}

impl From<TextureId> for BindingResource {
    fn from(texture: TextureId) -> Self {
        BindingResource::Texture(texture.into())
    }
}

impl From<BufferBinding> for BindingResource {
    fn from(binding: BufferBinding) -> Self {
        BindingResource::Buffer(binding)
    }
}

impl From<BufferId> for BindingResource {
    fn from(buffer: BufferId) -> Self {
        BindingResource::Buffer(buffer.into())
    }
}

/// Finds the value for a uniform by walking the segments of its name.
pub(crate) fn lookup<'a>(
    bindings: &'a FnvHashMap<String, BindingResource>,
    identifier: &UniformIdentifier,
) -> Option<&'a BindingResource> {
    let mut segments = identifier.segments().iter();

    let mut current = match segments.next() {
        Some(IdentifierSegment::Name(name)) => bindings.get(name)?,
        _ => return None,
    };

    for segment in segments {
        current = match (segment, current) {
            (IdentifierSegment::Name(name), BindingResource::Struct(fields)) => fields.get(name)?,
            (IdentifierSegment::ArrayIndex(index), BindingResource::Array(elements)) => {
                elements.get(*index)?
            }
            _ => return None,
        };
    }

    Some(current)
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) enum UniformValue {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Uint(Vec<u32>),
}

/// Converts a bound value to the component type a uniform of `kind` expects.
///
/// Numeric values convert freely between float, signed, unsigned and boolean components, but the
/// number of components must match exactly. Returns a description of the problem otherwise.
pub(crate) fn uniform_value(
    kind: &UniformKind,
    resource: &BindingResource,
) -> Result<UniformValue, String> {
    let floats = || -> Option<Vec<f32>> {
        match resource {
            BindingResource::Float(values) => Some(values.clone()),
            BindingResource::Int(values) => Some(values.iter().map(|v| *v as f32).collect()),
            BindingResource::Uint(values) => Some(values.iter().map(|v| *v as f32).collect()),
            BindingResource::Bool(values) => Some(values.iter().map(|v| *v as u8 as f32).collect()),
            _ => None,
        }
    };

    let ints = || -> Option<Vec<i32>> {
        match resource {
            BindingResource::Float(values) => Some(values.iter().map(|v| *v as i32).collect()),
            BindingResource::Int(values) => Some(values.clone()),
            BindingResource::Uint(values) => Some(values.iter().map(|v| *v as i32).collect()),
            BindingResource::Bool(values) => Some(values.iter().map(|v| *v as i32).collect()),
            _ => None,
        }
    };

    let value = match kind {
        UniformKind::Float(_) | UniformKind::Matrix { .. } => floats().map(UniformValue::Float),
        UniformKind::Int(_) => ints().map(UniformValue::Int),
        UniformKind::Bool(_) => ints().map(|values| {
            UniformValue::Int(values.into_iter().map(|v| (v != 0) as i32).collect())
        }),
        UniformKind::Uint(_) => match resource {
            BindingResource::Uint(values) => Some(UniformValue::Uint(values.clone())),
            BindingResource::Float(values) => {
                Some(UniformValue::Uint(values.iter().map(|v| *v as u32).collect()))
            }
            BindingResource::Int(values) => {
                Some(UniformValue::Uint(values.iter().map(|v| *v as u32).collect()))
            }
            BindingResource::Bool(values) => {
                Some(UniformValue::Uint(values.iter().map(|v| *v as u32).collect()))
            }
            _ => None,
        },
        UniformKind::Sampler(_) => None,
    };

    let value =
        value.ok_or_else(|| format!("expected {:?}, found a {} value", kind, resource.kind_name()))?;

    let found = match &value {
        UniformValue::Float(values) => values.len(),
        UniformValue::Int(values) => values.len(),
        UniformValue::Uint(values) => values.len(),
    };

    if found != kind.components() {
        return Err(format!(
            "expected {} components, found {}",
            kind.components(),
            found
        ));
    }

    Ok(value)
}

/// Uploads a converted value with the `uniform*` call that matches `kind`. The program must be in
/// use.
pub(crate) fn set_uniform<B>(
    gl: &B,
    location: &B::UniformLocation,
    kind: &UniformKind,
    value: &UniformValue,
) where
    B: Backend,
{
    match (kind, value) {
        (UniformKind::Matrix { columns, rows }, UniformValue::Float(values)) => {
            gl.uniform_matrix(location, *columns, *rows, values)
        }
        (UniformKind::Float(n), UniformValue::Float(values)) => gl.uniform_f32(location, *n, values),
        (UniformKind::Int(n), UniformValue::Int(values))
        | (UniformKind::Bool(n), UniformValue::Int(values)) => {
            gl.uniform_i32(location, *n, values)
        }
        (UniformKind::Uint(n), UniformValue::Uint(values)) => gl.uniform_u32(location, *n, values),
        _ => log::error!("Cannot upload {:?} to a uniform of kind {:?}.", value, kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> FnvHashMap<String, BindingResource> {
        let mut bindings = FnvHashMap::default();

        bindings.insert("scale".to_string(), 2.0f32.into());
        bindings.insert(
            "lights".to_string(),
            vec![
                BindingResource::fields(vec![("color", [1.0f32, 0.0, 0.0])]),
                BindingResource::fields(vec![("color", [0.0f32, 1.0, 0.0])]),
            ]
            .into(),
        );

        bindings
    }

    #[test]
    fn test_lookup_walks_nested_values() {
        let bindings = bindings();

        assert_eq!(
            lookup(&bindings, &UniformIdentifier::from_string("lights[1].color")),
            Some(&BindingResource::Float(vec![0.0, 1.0, 0.0]))
        );
        assert_eq!(
            lookup(&bindings, &UniformIdentifier::from_string("scale")),
            Some(&BindingResource::Float(vec![2.0]))
        );
    }

    #[test]
    fn test_lookup_misses() {
        let bindings = bindings();

        assert!(lookup(&bindings, &UniformIdentifier::from_string("lights[2].color")).is_none());
        assert!(lookup(&bindings, &UniformIdentifier::from_string("lights[0].range")).is_none());
        assert!(lookup(&bindings, &UniformIdentifier::from_string("scale.x")).is_none());
        assert!(lookup(&bindings, &UniformIdentifier::from_string("offset")).is_none());
    }

    #[test]
    fn test_numeric_values_convert() {
        assert_eq!(
            uniform_value(&UniformKind::Float(2), &[1i32, 2].into()),
            Ok(UniformValue::Float(vec![1.0, 2.0]))
        );
        assert_eq!(
            uniform_value(&UniformKind::Int(1), &1.0f32.into()),
            Ok(UniformValue::Int(vec![1]))
        );
        assert_eq!(
            uniform_value(&UniformKind::Bool(2), &[0i32, 7].into()),
            Ok(UniformValue::Int(vec![0, 1]))
        );
        assert_eq!(
            uniform_value(&UniformKind::Uint(1), &true.into()),
            Ok(UniformValue::Uint(vec![1]))
        );
    }

    #[test]
    fn test_matrices_are_column_major() {
        let matrix: BindingResource = [[1.0f32, 2.0], [3.0, 4.0]].into();

        assert_eq!(
            uniform_value(
                &UniformKind::Matrix {
                    columns: 2,
                    rows: 2
                },
                &matrix
            ),
            Ok(UniformValue::Float(vec![1.0, 2.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn test_mismatches_are_reported() {
        assert!(uniform_value(&UniformKind::Float(3), &[1.0f32, 2.0].into()).is_err());
        assert!(uniform_value(
            &UniformKind::Float(1),
            &BindingResource::Array(vec![1.0f32.into()])
        )
        .is_err());
    }
}
