//! Reflection of the attributes, uniforms and uniform blocks a linked program exposes.
//!
//! The tables are built once, right after a program links, and never change afterwards.
use std::fmt;

use web_sys::WebGl2RenderingContext as Gl;

use crate::runtime::Backend;

/// The name of an active uniform, split into segments.
///
/// For example, `lights[2].color` consists of the segments `Name("lights")`, `ArrayIndex(2)` and
/// `Name("color")`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct UniformIdentifier {
    segments: Vec<IdentifierSegment>,
}

impl UniformIdentifier {
    pub fn from_string(string: &str) -> Self {
        let mut segments = Vec::new();

        for part in string.split('.') {
            let mut pieces = part.split('[');

            if let Some(name) = pieces.next() {
                segments.push(IdentifierSegment::Name(name.to_string()));
            }

            for piece in pieces {
                match piece.trim_end_matches(']').parse::<usize>() {
                    Ok(index) => segments.push(IdentifierSegment::ArrayIndex(index)),
                    Err(_) => log::warn!("Malformed array index in uniform name `{}`.", string),
                }
            }
        }

        UniformIdentifier { segments }
    }

    pub fn segments(&self) -> &[IdentifierSegment] {
        &self.segments
    }
}

impl fmt::Display for UniformIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                IdentifierSegment::Name(name) if i == 0 => write!(f, "{}", name)?,
                IdentifierSegment::Name(name) => write!(f, ".{}", name)?,
                IdentifierSegment::ArrayIndex(index) => write!(f, "[{}]", index)?,
            }
        }

        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum IdentifierSegment {
    Name(String),
    ArrayIndex(usize),
}

/// The shape of a uniform's value, derived from its GL type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UniformKind {
    /// `float` or `vecN`, with `N` components.
    Float(usize),
    Int(usize),
    Uint(usize),
    Bool(usize),
    Matrix { columns: usize, rows: usize },
    /// A sampler; holds the texture target it samples.
    Sampler(u32),
}

impl UniformKind {
    pub fn from_type(type_: u32) -> Option<Self> {
        let kind = match type_ {
            Gl::FLOAT => UniformKind::Float(1),
            Gl::FLOAT_VEC2 => UniformKind::Float(2),
            Gl::FLOAT_VEC3 => UniformKind::Float(3),
            Gl::FLOAT_VEC4 => UniformKind::Float(4),
            Gl::INT => UniformKind::Int(1),
            Gl::INT_VEC2 => UniformKind::Int(2),
            Gl::INT_VEC3 => UniformKind::Int(3),
            Gl::INT_VEC4 => UniformKind::Int(4),
            Gl::UNSIGNED_INT => UniformKind::Uint(1),
            Gl::UNSIGNED_INT_VEC2 => UniformKind::Uint(2),
            Gl::UNSIGNED_INT_VEC3 => UniformKind::Uint(3),
            Gl::UNSIGNED_INT_VEC4 => UniformKind::Uint(4),
            Gl::BOOL => UniformKind::Bool(1),
            Gl::BOOL_VEC2 => UniformKind::Bool(2),
            Gl::BOOL_VEC3 => UniformKind::Bool(3),
            Gl::BOOL_VEC4 => UniformKind::Bool(4),
            Gl::FLOAT_MAT2 => UniformKind::Matrix {
                columns: 2,
                rows: 2,
            },
            Gl::FLOAT_MAT3 => UniformKind::Matrix {
                columns: 3,
                rows: 3,
            },
            Gl::FLOAT_MAT4 => UniformKind::Matrix {
                columns: 4,
                rows: 4,
            },
            Gl::FLOAT_MAT2X3 => UniformKind::Matrix {
                columns: 2,
                rows: 3,
            },
            Gl::FLOAT_MAT2X4 => UniformKind::Matrix {
                columns: 2,
                rows: 4,
            },
            Gl::FLOAT_MAT3X2 => UniformKind::Matrix {
                columns: 3,
                rows: 2,
            },
            Gl::FLOAT_MAT3X4 => UniformKind::Matrix {
                columns: 3,
                rows: 4,
            },
            Gl::FLOAT_MAT4X2 => UniformKind::Matrix {
                columns: 4,
                rows: 2,
            },
            Gl::FLOAT_MAT4X3 => UniformKind::Matrix {
                columns: 4,
                rows: 3,
            },
            Gl::SAMPLER_2D
            | Gl::SAMPLER_2D_SHADOW
            | Gl::INT_SAMPLER_2D
            | Gl::UNSIGNED_INT_SAMPLER_2D => UniformKind::Sampler(Gl::TEXTURE_2D),
            Gl::SAMPLER_CUBE
            | Gl::SAMPLER_CUBE_SHADOW
            | Gl::INT_SAMPLER_CUBE
            | Gl::UNSIGNED_INT_SAMPLER_CUBE => UniformKind::Sampler(Gl::TEXTURE_CUBE_MAP),
            Gl::SAMPLER_3D | Gl::INT_SAMPLER_3D | Gl::UNSIGNED_INT_SAMPLER_3D => {
                UniformKind::Sampler(Gl::TEXTURE_3D)
            }
            Gl::SAMPLER_2D_ARRAY
            | Gl::SAMPLER_2D_ARRAY_SHADOW
            | Gl::INT_SAMPLER_2D_ARRAY
            | Gl::UNSIGNED_INT_SAMPLER_2D_ARRAY => UniformKind::Sampler(Gl::TEXTURE_2D_ARRAY),
            _ => return None,
        };

        Some(kind)
    }

    /// The number of scalar values one uniform of this kind consumes.
    pub fn components(&self) -> usize {
        match *self {
            UniformKind::Float(n) | UniformKind::Int(n) | UniformKind::Uint(n) => n,
            UniformKind::Bool(n) => n,
            UniformKind::Matrix { columns, rows } => columns * rows,
            UniformKind::Sampler(_) => 1,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct AttributeSlot {
    pub(crate) name: String,
    pub(crate) location: u32,

    /// Integer attributes are bound with `vertexAttribIPointer`.
    pub(crate) integer: bool,
}

fn is_integer_type(type_: u32) -> bool {
    matches!(
        type_,
        Gl::INT
            | Gl::INT_VEC2
            | Gl::INT_VEC3
            | Gl::INT_VEC4
            | Gl::UNSIGNED_INT
            | Gl::UNSIGNED_INT_VEC2
            | Gl::UNSIGNED_INT_VEC3
            | Gl::UNSIGNED_INT_VEC4
    )
}

pub(crate) struct UniformSlot<L> {
    pub(crate) identifier: UniformIdentifier,
    pub(crate) kind: UniformKind,

    /// `None` for uniforms in a uniform block, which are not set individually.
    pub(crate) location: Option<L>,

    pub(crate) texture_unit: Option<u32>,
    pub(crate) in_block: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct UniformBlockSlot {
    pub(crate) name: String,
    pub(crate) binding: u32,
}

pub(crate) struct Reflection<B>
where
    B: Backend,
{
    pub(crate) attributes: Vec<AttributeSlot>,
    pub(crate) uniforms: Vec<UniformSlot<B::UniformLocation>>,
    pub(crate) blocks: Vec<UniformBlockSlot>,
}

impl<B> Reflection<B>
where
    B: Backend,
{
    /// Reflects a successfully linked program. Binds uniform block `i` to binding point `i`.
    pub(crate) fn reflect(gl: &B, program: &B::Program) -> Self {
        let mut attributes = Vec::new();

        for index in 0..gl.active_attribute_count(program) {
            if let Some(info) = gl.active_attribute(program, index) {
                let location = gl.attribute_location(program, &info.name);

                // Built-ins such as `gl_VertexID` have no location.
                if location < 0 {
                    continue;
                }

                attributes.push(AttributeSlot {
                    integer: is_integer_type(info.type_),
                    name: info.name,
                    location: location as u32,
                });
            }
        }

        let uniform_count = gl.active_uniform_count(program);
        let block_indices = gl.active_uniform_block_indices(program, uniform_count);
        let mut uniforms = Vec::new();
        let mut next_texture_unit = 0;

        for index in 0..uniform_count {
            let info = match gl.active_uniform(program, index) {
                Some(info) => info,
                None => continue,
            };

            let kind = match UniformKind::from_type(info.type_) {
                Some(kind) => kind,
                None => {
                    log::warn!(
                        "Uniform `{}` has unsupported type {:#x}.",
                        info.name,
                        info.type_
                    );

                    continue;
                }
            };

            let in_block = block_indices.get(index as usize).copied().unwrap_or(-1) >= 0;

            if in_block {
                uniforms.push(UniformSlot {
                    identifier: UniformIdentifier::from_string(&info.name),
                    kind,
                    location: None,
                    texture_unit: None,
                    in_block,
                });

                continue;
            }

            // Only the innermost array is reported with `[0]` and expanded here.
            let base = info.name.strip_suffix("[0]");

            for element in 0..info.size.max(1) {
                let name = match base {
                    Some(base) => format!("{}[{}]", base, element),
                    None => info.name.clone(),
                };

                let texture_unit = if let UniformKind::Sampler(_) = kind {
                    next_texture_unit += 1;

                    Some(next_texture_unit - 1)
                } else {
                    None
                };

                uniforms.push(UniformSlot {
                    location: gl.uniform_location(program, &name),
                    identifier: UniformIdentifier::from_string(&name),
                    kind,
                    texture_unit,
                    in_block,
                });
            }
        }

        let mut blocks = Vec::new();

        for index in 0..gl.active_uniform_block_count(program) {
            if let Some(name) = gl.active_uniform_block_name(program, index) {
                gl.uniform_block_binding(program, index, index);

                blocks.push(UniformBlockSlot {
                    name,
                    binding: index,
                });
            }
        }

        Reflection {
            attributes,
            uniforms,
            blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::runtime::recording::{ProgramInterface, RecordingBackend};

    #[test]
    fn test_identifier_segments() {
        let identifier = UniformIdentifier::from_string("lights[2].color");

        assert_eq!(
            identifier.segments(),
            &[
                IdentifierSegment::Name("lights".to_string()),
                IdentifierSegment::ArrayIndex(2),
                IdentifierSegment::Name("color".to_string()),
            ]
        );
        assert_eq!(identifier.to_string(), "lights[2].color");
    }

    #[test]
    fn test_nested_array_identifier() {
        let identifier = UniformIdentifier::from_string("grid[1][3]");

        assert_eq!(
            identifier.segments(),
            &[
                IdentifierSegment::Name("grid".to_string()),
                IdentifierSegment::ArrayIndex(1),
                IdentifierSegment::ArrayIndex(3),
            ]
        );
    }

    #[test]
    fn test_uniform_kinds() {
        assert_eq!(UniformKind::from_type(Gl::FLOAT_VEC3), Some(UniformKind::Float(3)));
        assert_eq!(
            UniformKind::from_type(Gl::FLOAT_MAT2X3),
            Some(UniformKind::Matrix {
                columns: 2,
                rows: 3
            })
        );
        assert_eq!(
            UniformKind::from_type(Gl::UNSIGNED_INT_SAMPLER_2D_ARRAY),
            Some(UniformKind::Sampler(Gl::TEXTURE_2D_ARRAY))
        );
        assert_eq!(UniformKind::from_type(Gl::FLOAT_MAT3).unwrap().components(), 9);
    }

    fn link(gl: &RecordingBackend, interface: ProgramInterface) -> u32 {
        gl.set_interface("vertex", interface);

        let shader = gl.create_shader(Gl::VERTEX_SHADER).unwrap();
        let program = gl.create_program().unwrap();

        gl.shader_source(&shader, "vertex");
        gl.attach_shader(&program, &shader);
        gl.link_program(&program);

        program
    }

    #[test]
    fn test_reflect() {
        let gl = RecordingBackend::webgl2();
        let program = link(
            &gl,
            ProgramInterface::default()
                .attribute("position", Gl::FLOAT_VEC2)
                .attribute("gl_VertexID", Gl::INT)
                .attribute("index", Gl::UNSIGNED_INT)
                .uniform("colors[0]", Gl::FLOAT_VEC4, 3)
                .uniform("albedo", Gl::SAMPLER_2D, 1)
                .uniform("shadows[0]", Gl::SAMPLER_2D_SHADOW, 2)
                .block_uniform("Camera.view", Gl::FLOAT_MAT4, 0)
                .block("Camera"),
        );

        let reflection = Reflection::<RecordingBackend>::reflect(&gl, &program);

        assert_eq!(
            reflection.attributes,
            vec![
                AttributeSlot {
                    name: "position".to_string(),
                    location: 0,
                    integer: false
                },
                AttributeSlot {
                    name: "index".to_string(),
                    location: 2,
                    integer: true
                },
            ]
        );

        let names: Vec<String> = reflection
            .uniforms
            .iter()
            .map(|uniform| uniform.identifier.to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "colors[0]",
                "colors[1]",
                "colors[2]",
                "albedo",
                "shadows[0]",
                "shadows[1]",
                "Camera.view"
            ]
        );

        let units: Vec<Option<u32>> = reflection
            .uniforms
            .iter()
            .map(|uniform| uniform.texture_unit)
            .collect();

        assert_eq!(
            units,
            vec![None, None, None, Some(0), Some(1), Some(2), None]
        );
        assert!(reflection.uniforms[6].in_block);
        assert!(reflection.uniforms[6].location.is_none());
        assert_eq!(
            reflection.uniforms[1].location,
            Some("colors[1]".to_string())
        );
        assert_eq!(
            reflection.blocks,
            vec![UniformBlockSlot {
                name: "Camera".to_string(),
                binding: 0
            }]
        );
        assert_eq!(
            gl.calls_named("uniform_block_binding"),
            vec![format!("{} 0 0", program)]
        );
    }

    #[test]
    fn test_only_the_innermost_array_is_expanded() {
        let gl = RecordingBackend::webgl2();
        let program = link(
            &gl,
            ProgramInterface::default()
                .uniform("grid[0][0]", Gl::FLOAT, 3)
                .uniform("lights[2].range[0]", Gl::FLOAT, 2),
        );

        let reflection = Reflection::<RecordingBackend>::reflect(&gl, &program);
        let names: Vec<String> = reflection
            .uniforms
            .iter()
            .map(|uniform| uniform.identifier.to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "grid[0][0]",
                "grid[0][1]",
                "grid[0][2]",
                "lights[2].range[0]",
                "lights[2].range[1]",
            ]
        );
    }
}
