use std::fmt;

use serde::{Serialize, Serializer};

/// Resource slot of a uniform buffer inside a bind group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BindPoint {
    pub group: u32,
    pub binding: u32,
}

impl fmt::Display for BindPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@group({}) @binding({})", self.group, self.binding)
    }
}

/// Shader interface attached to a struct member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldBinding {
    /// `@location(n)` vertex input or inter-stage slot.
    Location(u32),
    /// `@builtin(position)`, the clip-space position read by the rasterizer.
    Position,
    /// Any other `@builtin`.
    Builtin(String),
}

/// Scalar component type of a shader value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Float,
    Sint,
    Uint,
    Bool,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarType::Float => "f32",
            ScalarType::Sint => "i32",
            ScalarType::Uint => "u32",
            ScalarType::Bool => "bool",
        })
    }
}

/// Shape of a struct member in WGSL terms: scalar, vector, matrix, or a fixed-size
/// array of one of those.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldType {
    pub scalar: ScalarType,
    /// Rows of a matrix, components of a vector, 1 for a scalar.
    pub components: u32,
    /// 1 unless the type is a matrix.
    pub columns: u32,
    /// Element count when the member is an array.
    pub count: Option<u32>,
}

impl FieldType {
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self::matrix(scalar, 1, 1)
    }

    pub const fn vector(scalar: ScalarType, components: u32) -> Self {
        Self::matrix(scalar, 1, components)
    }

    pub const fn matrix(scalar: ScalarType, columns: u32, rows: u32) -> Self {
        Self {
            scalar,
            components: rows,
            columns,
            count: None,
        }
    }

    pub const fn array(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let element = match (self.columns, self.components) {
            (1, 1) => self.scalar.to_string(),
            (1, n) => format!("vec{n}<{}>", self.scalar),
            (c, r) => format!("mat{c}x{r}<{}>", self.scalar),
        };
        match self.count {
            Some(count) => write!(f, "array<{element}, {count}>"),
            None => f.write_str(&element),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rust types with a direct WGSL counterpart.
pub trait ShaderType {
    const SHADER_TYPE: FieldType;
}

impl ShaderType for f32 {
    const SHADER_TYPE: FieldType = FieldType::scalar(ScalarType::Float);
}

impl ShaderType for i32 {
    const SHADER_TYPE: FieldType = FieldType::scalar(ScalarType::Sint);
}

impl ShaderType for u32 {
    const SHADER_TYPE: FieldType = FieldType::scalar(ScalarType::Uint);
}

macro_rules! impl_vectors {
    ($($elem:ty => $scalar:ident),* $(,)?) => {$(
        impl ShaderType for [$elem; 2] {
            const SHADER_TYPE: FieldType = FieldType::vector(ScalarType::$scalar, 2);
        }
        impl ShaderType for [$elem; 3] {
            const SHADER_TYPE: FieldType = FieldType::vector(ScalarType::$scalar, 3);
        }
        impl ShaderType for [$elem; 4] {
            const SHADER_TYPE: FieldType = FieldType::vector(ScalarType::$scalar, 4);
        }
    )*};
}

impl_vectors!(f32 => Float, i32 => Sint, u32 => Uint);

// Column-major: `[[f32; R]; C]` is `matCxR<f32>`.
macro_rules! impl_matrices {
    ($(($columns:literal, $rows:literal)),* $(,)?) => {$(
        impl ShaderType for [[f32; $rows]; $columns] {
            const SHADER_TYPE: FieldType =
                FieldType::matrix(ScalarType::Float, $columns, $rows);
        }
    )*};
}

impl_matrices!(
    (2, 2),
    (2, 3),
    (2, 4),
    (3, 2),
    (3, 3),
    (3, 4),
    (4, 2),
    (4, 3),
    (4, 4),
);

/// Placement of a single member inside a [`StructLayout`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    /// Element stride for array members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<FieldBinding>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_format"
    )]
    pub format: Option<wgpu::VertexFormat>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<FieldType>,
}

impl FieldLayout {
    pub fn new(name: &str, offset: usize, size: usize) -> Self {
        Self {
            name: name.to_string(),
            offset: offset as u32,
            size: size as u32,
            stride: None,
            binding: None,
            format: None,
            ty: None,
        }
    }

    pub fn with_type(mut self, ty: FieldType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride as u32);
        self
    }

    pub fn with_location(mut self, location: u32, format: wgpu::VertexFormat) -> Self {
        self.binding = Some(FieldBinding::Location(location));
        self.format = Some(format);
        self
    }

    pub fn end(&self) -> u32 {
        self.offset + self.size
    }

    pub fn location(&self) -> Option<u32> {
        match self.binding {
            Some(FieldBinding::Location(location)) => Some(location),
            _ => None,
        }
    }

    pub fn is_padding(&self) -> bool {
        self.name.starts_with("_pad")
    }
}

/// Ordered description of a struct as one side of the host/device boundary sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructLayout {
    pub name: String,
    pub size: u32,
    pub fields: Vec<FieldLayout>,
}

impl StructLayout {
    pub fn new(name: &str, size: usize, fields: Vec<FieldLayout>) -> Self {
        Self {
            name: name.to_string(),
            size: size as u32,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_at_location(&self, location: u32) -> Option<&FieldLayout> {
        self.fields
            .iter()
            .find(|field| field.location() == Some(location))
    }
}

fn serialize_format<S>(
    format: &Option<wgpu::VertexFormat>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match format {
        Some(format) => serializer.serialize_str(&format!("{format:?}")),
        None => serializer.serialize_none(),
    }
}

/// Size of the field a projection closure points at.
pub(crate) fn field_size<T, F>(_project: impl Fn(&T) -> &F) -> usize {
    std::mem::size_of::<F>()
}

/// WGSL type of the field a projection closure points at.
pub(crate) fn field_type<T, F: ShaderType>(_project: impl Fn(&T) -> &F) -> FieldType {
    F::SHADER_TYPE
}

/// Builds a [`FieldLayout`] from the Rust declaration of `$ty::$field`.
///
/// The WGSL type is derived from the Rust field type unless given explicitly,
/// which is needed when host storage is wider than the shader value.
macro_rules! host_field {
    ($ty:ty, $field:ident) => {
        $crate::layout::FieldLayout::new(
            stringify!($field),
            ::std::mem::offset_of!($ty, $field),
            $crate::layout::common::field_size(|value: &$ty| &value.$field),
        )
        .with_type($crate::layout::common::field_type(|value: &$ty| &value.$field))
    };
    ($ty:ty, $field:ident, $shader_type:expr) => {
        $crate::layout::FieldLayout::new(
            stringify!($field),
            ::std::mem::offset_of!($ty, $field),
            $crate::layout::common::field_size(|value: &$ty| &value.$field),
        )
        .with_type($shader_type)
    };
}

pub(crate) use host_field;
