use serde::{Deserialize, Serialize};

/// GLSL type of a declared uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl UniformType {
    pub fn components(self) -> usize {
        match self {
            UniformType::Float => 1,
            UniformType::Vec2 => 2,
            UniformType::Vec3 => 3,
            UniformType::Vec4 => 4,
        }
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
        }
    }

    /// Base alignment in bytes under std140 rules.
    pub fn std140_align(self) -> usize {
        match self {
            UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 | UniformType::Vec4 => 16,
        }
    }

    pub fn std140_size(self) -> usize {
        self.components() * 4
    }
}

/// One entry of a program's uniform contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub ty: UniformType,
    /// Default components, padded with zeros past `ty.components()`.
    pub default: [f32; 4],
}

impl UniformDecl {
    pub const fn float(name: &'static str, default: f32) -> Self {
        Self {
            name,
            ty: UniformType::Float,
            default: [default, 0.0, 0.0, 0.0],
        }
    }

    pub const fn vec2(name: &'static str, default: [f32; 2]) -> Self {
        Self {
            name,
            ty: UniformType::Vec2,
            default: [default[0], default[1], 0.0, 0.0],
        }
    }

    pub const fn vec3(name: &'static str, default: [f32; 3]) -> Self {
        Self {
            name,
            ty: UniformType::Vec3,
            default: [default[0], default[1], default[2], 0.0],
        }
    }
}

/// A caller-supplied uniform value.
///
/// JSON numbers map to `Float`, arrays of length 2-4 to the matching vector.
/// Arrays of any other length deserialize into `Other` and are skipped when
/// uniforms are bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUniform", into = "RawUniform")]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Other(Vec<f32>),
}

impl UniformValue {
    /// The GLSL type this value can be bound to, if any.
    pub fn ty(&self) -> Option<UniformType> {
        match self {
            UniformValue::Float(_) => Some(UniformType::Float),
            UniformValue::Vec2(_) => Some(UniformType::Vec2),
            UniformValue::Vec3(_) => Some(UniformType::Vec3),
            UniformValue::Vec4(_) => Some(UniformType::Vec4),
            UniformValue::Other(_) => None,
        }
    }

    /// Components padded to four floats.
    pub fn components(&self) -> [f32; 4] {
        match self {
            UniformValue::Float(x) => [*x, 0.0, 0.0, 0.0],
            UniformValue::Vec2([x, y]) => [*x, *y, 0.0, 0.0],
            UniformValue::Vec3([x, y, z]) => [*x, *y, *z, 0.0],
            UniformValue::Vec4(v) => *v,
            UniformValue::Other(values) => {
                let mut out = [0.0; 4];
                for (slot, value) in out.iter_mut().zip(values) {
                    *slot = *value;
                }
                out
            }
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            UniformValue::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(values: Vec<f32>) -> Self {
        match values.as_slice() {
            [x, y] => UniformValue::Vec2([*x, *y]),
            [x, y, z] => UniformValue::Vec3([*x, *y, *z]),
            [x, y, z, w] => UniformValue::Vec4([*x, *y, *z, *w]),
            _ => UniformValue::Other(values),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawUniform {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl From<RawUniform> for UniformValue {
    fn from(raw: RawUniform) -> Self {
        match raw {
            RawUniform::Scalar(value) => UniformValue::Float(value),
            RawUniform::Vector(values) => values.into(),
        }
    }
}

impl From<UniformValue> for RawUniform {
    fn from(value: UniformValue) -> Self {
        match value {
            UniformValue::Float(x) => RawUniform::Scalar(x),
            UniformValue::Vec2(v) => RawUniform::Vector(v.to_vec()),
            UniformValue::Vec3(v) => RawUniform::Vector(v.to_vec()),
            UniformValue::Vec4(v) => RawUniform::Vector(v.to_vec()),
            UniformValue::Other(values) => RawUniform::Vector(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_arrays_pick_vector_width() {
        let values: Vec<UniformValue> =
            serde_json::from_str("[0.5, [1, 2], [1, 2, 3], [1, 2, 3, 4], [1, 2, 3, 4, 5], [7]]")
                .unwrap();
        assert_eq!(values[0], UniformValue::Float(0.5));
        assert_eq!(values[1], UniformValue::Vec2([1.0, 2.0]));
        assert_eq!(values[2], UniformValue::Vec3([1.0, 2.0, 3.0]));
        assert_eq!(values[3], UniformValue::Vec4([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(values[4].ty(), None);
        assert_eq!(values[5].ty(), None);
    }

    #[test]
    fn std140_rules_for_vectors() {
        assert_eq!(UniformType::Vec3.std140_align(), 16);
        assert_eq!(UniformType::Vec3.std140_size(), 12);
        assert_eq!(UniformType::Vec2.std140_align(), 8);
        assert_eq!(UniformType::Float.std140_align(), 4);
    }

    #[test]
    fn components_are_zero_padded() {
        assert_eq!(
            UniformValue::Vec2([0.25, 0.75]).components(),
            [0.25, 0.75, 0.0, 0.0]
        );
    }
}
