//! Device-side declarations of the shared structs and their reflection.
//!
//! The WGSL is split the same way the host/device boundary is: [`SHARED_WGSL`]
//! mirrors the Rust structs in [`crate::layout`], while [`DEVICE_ONLY_WGSL`] holds
//! types that only exist between shader stages and have no host representation.

use std::fmt;
use std::path::Path;

use log::debug;
use naga::proc::Layouter;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, BuiltIn, Handle, Module, Scalar, ScalarKind, Type, TypeInner};

use crate::error::ShaderError;
use crate::layout::{BindPoint, FieldBinding, FieldLayout, FieldType, ScalarType, StructLayout};

/// Structs shared with the host, plus the uniform bindings the host fills.
pub const SHARED_WGSL: &str = r#"
struct VertexAttributes {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct DrawUniforms {
    model_matrix: mat4x4<f32>,
    view_projection_matrix: mat4x4<f32>,
    camera_position: vec3<f32>,
    _pad0: f32,
    sphere_position: vec2<f32>,
    sphere_scale: f32,
    _pad1: f32,
}

struct FrameUniforms {
    colors: array<vec3<f32>, 10>,
    color_count: i32,
    time: f32,
    _pad0: vec2<f32>,
    light_position: vec3<f32>,
    _pad1: f32,
    color_cycle_duration: f32,
    glow_intensity: f32,
    _pad2: vec2<f32>,
}

@group(0) @binding(0)
var<uniform> draw_uniforms: DrawUniforms;

@group(0) @binding(1)
var<uniform> frame_uniforms: FrameUniforms;
"#;

/// Vertex-to-fragment values, produced by the vertex stage and interpolated across
/// each triangle.
pub const DEVICE_ONLY_WGSL: &str = r#"
struct InterpolatedVertex {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) view_direction: vec3<f32>,
}
"#;

/// Name of the device-only interpolation struct.
pub const INTERPOLATED_VERTEX: &str = "InterpolatedVertex";

/// The complete device translation unit: shared declarations followed by the
/// device-only ones.
pub fn device_source() -> String {
    format!("{SHARED_WGSL}{DEVICE_ONLY_WGSL}")
}

/// A parsed and validated WGSL module with computed type layouts.
pub struct DeviceModule {
    module: Module,
    layouter: Layouter,
}

impl fmt::Debug for DeviceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceModule")
            .field("structs", &self.struct_names())
            .finish_non_exhaustive()
    }
}

impl DeviceModule {
    /// Parses and validates WGSL source.
    pub fn parse(source: &str) -> Result<Self, ShaderError> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|err| ShaderError::Parse(err.emit_to_string(source)))?;
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|err| ShaderError::Validation(err.to_string()))?;

        let mut layouter = Layouter::default();
        layouter
            .update(module.to_ctx())
            .map_err(|err| ShaderError::Layout(format!("{err:?}")))?;

        debug!(
            "parsed device module with {} types and {} globals",
            module.types.len(),
            module.global_variables.len()
        );
        Ok(Self { module, layouter })
    }

    /// Reads and parses a WGSL file from disk.
    pub fn from_path(path: &Path) -> Result<Self, ShaderError> {
        let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// The crate's own device translation unit.
    pub fn builtin() -> Result<Self, ShaderError> {
        Self::parse(&device_source())
    }

    /// Names of all structs declared by the module.
    pub fn struct_names(&self) -> Vec<&str> {
        self.module
            .types
            .iter()
            .filter(|(_, ty)| matches!(ty.inner, TypeInner::Struct { .. }))
            .filter_map(|(_, ty)| ty.name.as_deref())
            .collect()
    }

    /// Layout of the named struct as the device sees it.
    pub fn struct_layout(&self, name: &str) -> Option<StructLayout> {
        let (_, ty) = self.find_struct(name)?;
        let TypeInner::Struct { members, span } = &ty.inner else {
            return None;
        };

        let fields = members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                let member_ty = &self.module.types[member.ty];
                let ty = field_type(&self.module.types, &member_ty.inner);
                FieldLayout {
                    name: member
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("member{index}")),
                    offset: member.offset,
                    size: self.layouter[member.ty].size,
                    stride: match member_ty.inner {
                        TypeInner::Array { stride, .. } => Some(stride),
                        _ => None,
                    },
                    binding: member.binding.as_ref().and_then(field_binding),
                    format: ty.and_then(vertex_format),
                    ty,
                }
            })
            .collect();

        Some(StructLayout {
            name: name.to_string(),
            size: *span,
            fields,
        })
    }

    /// Slot of the `var<uniform>` whose type is the named struct.
    pub fn uniform_binding(&self, type_name: &str) -> Option<BindPoint> {
        let (handle, _) = self.find_struct(type_name)?;
        self.module
            .global_variables
            .iter()
            .map(|(_, global)| global)
            .find(|global| global.ty == handle && global.space == AddressSpace::Uniform)
            .and_then(|global| global.binding.as_ref())
            .map(|binding| BindPoint {
                group: binding.group,
                binding: binding.binding,
            })
    }

    /// Whether the named member of the named struct is a four-component float vector.
    pub fn is_vec4_f32(&self, struct_name: &str, member_name: &str) -> bool {
        let Some((_, ty)) = self.find_struct(struct_name) else {
            return false;
        };
        let TypeInner::Struct { members, .. } = &ty.inner else {
            return false;
        };
        members
            .iter()
            .find(|member| member.name.as_deref() == Some(member_name))
            .is_some_and(|member| {
                matches!(
                    self.module.types[member.ty].inner,
                    TypeInner::Vector {
                        size: naga::VectorSize::Quad,
                        scalar: Scalar {
                            kind: ScalarKind::Float,
                            width: 4
                        }
                    }
                )
            })
    }

    fn find_struct(&self, name: &str) -> Option<(Handle<Type>, &Type)> {
        self.module.types.iter().find(|(_, ty)| {
            ty.name.as_deref() == Some(name) && matches!(ty.inner, TypeInner::Struct { .. })
        })
    }
}

fn field_binding(binding: &Binding) -> Option<FieldBinding> {
    match binding {
        Binding::Location { location, .. } => Some(FieldBinding::Location(*location)),
        Binding::BuiltIn(BuiltIn::Position { .. }) => Some(FieldBinding::Position),
        Binding::BuiltIn(builtin) => Some(FieldBinding::Builtin(builtin_name(builtin))),
    }
}

/// WGSL spelling of the builtins a vertex or fragment interface can carry.
fn builtin_name(builtin: &BuiltIn) -> String {
    match builtin {
        BuiltIn::VertexIndex => "vertex_index".to_string(),
        BuiltIn::InstanceIndex => "instance_index".to_string(),
        BuiltIn::FrontFacing => "front_facing".to_string(),
        BuiltIn::FragDepth => "frag_depth".to_string(),
        BuiltIn::SampleIndex => "sample_index".to_string(),
        BuiltIn::SampleMask => "sample_mask".to_string(),
        BuiltIn::PrimitiveIndex => "primitive_index".to_string(),
        other => format!("{other:?}"),
    }
}

fn components(size: naga::VectorSize) -> u32 {
    match size {
        naga::VectorSize::Bi => 2,
        naga::VectorSize::Tri => 3,
        naga::VectorSize::Quad => 4,
    }
}

fn scalar_type(scalar: Scalar) -> Option<ScalarType> {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Float, 4) => Some(ScalarType::Float),
        (ScalarKind::Sint, 4) => Some(ScalarType::Sint),
        (ScalarKind::Uint, 4) => Some(ScalarType::Uint),
        (ScalarKind::Bool, _) => Some(ScalarType::Bool),
        _ => None,
    }
}

/// Shape of a member type; `None` for structs, runtime-sized or nested arrays and
/// anything else with no host-side counterpart.
fn field_type(types: &naga::UniqueArena<Type>, inner: &TypeInner) -> Option<FieldType> {
    match *inner {
        TypeInner::Scalar(scalar) => Some(FieldType::scalar(scalar_type(scalar)?)),
        TypeInner::Vector { size, scalar } => {
            Some(FieldType::vector(scalar_type(scalar)?, components(size)))
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => Some(FieldType::matrix(
            scalar_type(scalar)?,
            components(columns),
            components(rows),
        )),
        TypeInner::Array {
            base,
            size: naga::ArraySize::Constant(count),
            ..
        } => {
            let element = field_type(types, &types[base].inner)?;
            if element.count.is_some() {
                return None;
            }
            Some(element.array(count.get()))
        }
        _ => None,
    }
}

/// Vertex format a member of this type would be fed with, if it can be a vertex input.
fn vertex_format(ty: FieldType) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;

    if ty.count.is_some() || ty.columns != 1 {
        return None;
    }
    Some(match (ty.scalar, ty.components) {
        (ScalarType::Float, 1) => F::Float32,
        (ScalarType::Float, 2) => F::Float32x2,
        (ScalarType::Float, 3) => F::Float32x3,
        (ScalarType::Float, 4) => F::Float32x4,
        (ScalarType::Sint, 1) => F::Sint32,
        (ScalarType::Sint, 2) => F::Sint32x2,
        (ScalarType::Sint, 3) => F::Sint32x3,
        (ScalarType::Sint, 4) => F::Sint32x4,
        (ScalarType::Uint, 1) => F::Uint32,
        (ScalarType::Uint, 2) => F::Uint32x2,
        (ScalarType::Uint, 3) => F::Uint32x3,
        (ScalarType::Uint, 4) => F::Uint32x4,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_source_validates() {
        let module = DeviceModule::builtin().expect("device WGSL should validate");
        let mut names = module.struct_names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "DrawUniforms",
                "FrameUniforms",
                "InterpolatedVertex",
                "VertexAttributes"
            ]
        );
    }

    #[test]
    fn shared_source_omits_device_only_types() {
        let module = DeviceModule::parse(SHARED_WGSL).unwrap();
        assert!(module.struct_layout("DrawUniforms").is_some());
        assert!(module.struct_layout(INTERPOLATED_VERTEX).is_none());
    }

    #[test]
    fn reflects_uniform_offsets() {
        let module = DeviceModule::builtin().unwrap();
        let frame = module.struct_layout("FrameUniforms").unwrap();
        assert_eq!(frame.size, 208);
        let colors = frame.field("colors").unwrap();
        assert_eq!((colors.offset, colors.size, colors.stride), (0, 160, Some(16)));
        assert_eq!(frame.field("light_position").unwrap().offset, 176);
        assert_eq!(frame.field("color_cycle_duration").unwrap().offset, 192);

        let draw = module.struct_layout("DrawUniforms").unwrap();
        assert_eq!(draw.size, 160);
        assert_eq!(draw.field("sphere_position").unwrap().offset, 144);
    }

    #[test]
    fn reflects_uniform_bindings() {
        let module = DeviceModule::builtin().unwrap();
        assert_eq!(
            module.uniform_binding("DrawUniforms"),
            Some(BindPoint {
                group: 0,
                binding: 0
            })
        );
        assert_eq!(
            module.uniform_binding("FrameUniforms"),
            Some(BindPoint {
                group: 0,
                binding: 1
            })
        );
        assert_eq!(module.uniform_binding("VertexAttributes"), None);
    }

    #[test]
    fn reflects_interstage_bindings() {
        let module = DeviceModule::builtin().unwrap();
        let interpolated = module.struct_layout(INTERPOLATED_VERTEX).unwrap();
        assert_eq!(interpolated.fields[0].binding, Some(FieldBinding::Position));
        assert!(module.is_vec4_f32(INTERPOLATED_VERTEX, "clip_position"));
        assert_eq!(
            interpolated.field("view_direction").unwrap().location(),
            Some(2)
        );

        let vertex = module.struct_layout("VertexAttributes").unwrap();
        let normal = vertex.field_at_location(1).unwrap();
        assert_eq!(normal.name, "normal");
        assert_eq!(normal.format, Some(wgpu::VertexFormat::Float32x3));
    }

    #[test]
    fn reflects_member_types() {
        let module = DeviceModule::builtin().unwrap();
        let frame = module.struct_layout("FrameUniforms").unwrap();
        let type_of = |name: &str| frame.field(name).unwrap().ty.map(|ty| ty.to_string());
        assert_eq!(type_of("colors").as_deref(), Some("array<vec3<f32>, 10>"));
        assert_eq!(type_of("color_count").as_deref(), Some("i32"));
        assert_eq!(type_of("_pad0").as_deref(), Some("vec2<f32>"));

        let draw = module.struct_layout("DrawUniforms").unwrap();
        assert_eq!(
            draw.field("model_matrix").unwrap().ty,
            Some(FieldType::matrix(ScalarType::Float, 4, 4))
        );
    }

    #[test]
    fn reports_parse_errors() {
        let err = DeviceModule::parse("struct Broken { x: f32").unwrap_err();
        assert!(matches!(err, ShaderError::Parse(_)));
    }

    #[test]
    fn reports_missing_files() {
        let err = DeviceModule::from_path(Path::new("/nonexistent/shader.wgsl")).unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
    }
}
