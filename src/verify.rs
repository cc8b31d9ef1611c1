//! Field-by-field comparison of the host structs against their device declarations.

use std::collections::HashSet;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::device::{DeviceModule, INTERPOLATED_VERTEX};
use crate::error::LayoutError;
use crate::layout::{
    BindPoint, DrawUniforms, FieldBinding, FieldLayout, FieldType, FrameUniforms, StructLayout,
    VertexAttributes, DRAW_UNIFORMS_BINDING, FRAME_UNIFORMS_BINDING,
};

/// One disagreement between the host and device views of a struct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    #[error("{ty}: not declared on the device")]
    MissingStruct { ty: String },
    #[error("{ty}: host size {host} bytes, device size {device} bytes")]
    StructSize { ty: String, host: u32, device: u32 },
    #[error("{ty}.{field}: missing on the device")]
    MissingField { ty: String, field: String },
    #[error("{ty}.{field}: declared on the device only")]
    ExtraField { ty: String, field: String },
    #[error("{ty}.{field}: member {host} on the host but member {device} on the device")]
    FieldOrder {
        ty: String,
        field: String,
        host: usize,
        device: usize,
    },
    #[error("{ty}.{field}: host offset {host}, device offset {device}")]
    FieldOffset {
        ty: String,
        field: String,
        host: u32,
        device: u32,
    },
    #[error("{ty}.{field}: host size {host} bytes, device size {device} bytes")]
    FieldSize {
        ty: String,
        field: String,
        host: u32,
        device: u32,
    },
    #[error("{ty}.{field}: host stride {host:?}, device stride {device:?}")]
    ArrayStride {
        ty: String,
        field: String,
        host: Option<u32>,
        device: Option<u32>,
    },
    #[error("{ty}.{field}: host type {host}, device type {device}")]
    FieldType {
        ty: String,
        field: String,
        host: String,
        device: String,
    },
    #[error("{ty}: no var<uniform> of this type on the device, host binds it at {host}")]
    MissingBinding { ty: String, host: BindPoint },
    #[error("{ty}: host binds {host}, device binds {device}")]
    Binding {
        ty: String,
        host: BindPoint,
        device: BindPoint,
    },
    #[error("{ty}: location {location} has no device member")]
    MissingLocation { ty: String, location: u32 },
    #[error("{ty}.{field}: location {location} has no host attribute")]
    ExtraLocation {
        ty: String,
        field: String,
        location: u32,
    },
    #[error("{ty}: location {location} is {host} on the host but {device} on the device")]
    LocationFormat {
        ty: String,
        location: u32,
        host: String,
        device: String,
    },
    #[error("{ty}.{field}: bytes {offset}..{end} overrun the {stride}-byte vertex stride")]
    AttributeOutOfStride {
        ty: String,
        field: String,
        offset: u32,
        end: u32,
        stride: u32,
    },
    #[error("{ty}: expected exactly one @builtin(position) member, found {count}")]
    PositionBuiltin { ty: String, count: usize },
    #[error("{ty}.{field}: the position builtin must be `clip_position: vec4<f32>`")]
    PositionMember { ty: String, field: String },
    #[error("{ty}.{field}: inter-stage member has neither @location nor @builtin")]
    UnboundMember { ty: String, field: String },
    #[error("{ty}.{field}: location {location} is already used by another member")]
    DuplicateLocation {
        ty: String,
        field: String,
        location: u32,
    },
    #[error("{ty}.{field}: @builtin({builtin}) is not passed from the vertex to the fragment stage")]
    StageBuiltin {
        ty: String,
        field: String,
        builtin: String,
    },
}

/// Role a struct plays at the host/device boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKind {
    VertexInput,
    Uniform,
    DeviceOnly,
}

#[derive(Clone, Debug, Serialize)]
pub struct StructReport {
    pub name: String,
    pub kind: StructKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<BindPoint>,
    pub host: Option<StructLayout>,
    pub device: Option<StructLayout>,
    pub mismatches: Vec<Mismatch>,
}

impl StructReport {
    pub fn is_compatible(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Outcome of comparing every shared struct against a device module.
#[derive(Clone, Debug, Serialize)]
pub struct LayoutReport {
    pub structs: Vec<StructReport>,
}

impl LayoutReport {
    pub fn is_compatible(&self) -> bool {
        self.structs.iter().all(StructReport::is_compatible)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &Mismatch> {
        self.structs.iter().flat_map(|report| report.mismatches.iter())
    }

    pub fn get(&self, name: &str) -> Option<&StructReport> {
        self.structs.iter().find(|report| report.name == name)
    }

    /// Fails with [`LayoutError::Incompatible`] if any struct disagrees.
    pub fn into_result(self) -> Result<Self, LayoutError> {
        if self.is_compatible() {
            Ok(self)
        } else {
            Err(LayoutError::Incompatible {
                mismatches: self.mismatches().cloned().collect(),
            })
        }
    }
}

/// Compares the host declarations in [`crate::layout`] against `module`.
pub fn verify(module: &DeviceModule) -> LayoutReport {
    let structs = vec![
        vertex_report(module, VertexAttributes::host_layout()),
        uniform_report(module, DrawUniforms::host_layout(), DRAW_UNIFORMS_BINDING),
        uniform_report(module, FrameUniforms::host_layout(), FRAME_UNIFORMS_BINDING),
        device_only_report(module, INTERPOLATED_VERTEX),
    ];

    for report in &structs {
        for mismatch in &report.mismatches {
            warn!("layout mismatch: {mismatch}");
        }
    }
    LayoutReport { structs }
}

fn vertex_report(module: &DeviceModule, host: StructLayout) -> StructReport {
    debug!("checking vertex input {}", host.name);
    let device = module.struct_layout(&host.name);
    let mut mismatches = Vec::new();
    match &device {
        Some(device) => compare_vertex_input(&host, device, &mut mismatches),
        None => mismatches.push(Mismatch::MissingStruct {
            ty: host.name.clone(),
        }),
    }
    StructReport {
        name: host.name.clone(),
        kind: StructKind::VertexInput,
        binding: None,
        host: Some(host),
        device,
        mismatches,
    }
}

fn uniform_report(module: &DeviceModule, host: StructLayout, binding: BindPoint) -> StructReport {
    debug!("checking uniform {} at {binding}", host.name);
    let device = module.struct_layout(&host.name);
    let mut mismatches = Vec::new();
    match &device {
        Some(device) => {
            compare_uniform(&host, device, &mut mismatches);
            match module.uniform_binding(&host.name) {
                Some(found) if found != binding => mismatches.push(Mismatch::Binding {
                    ty: host.name.clone(),
                    host: binding,
                    device: found,
                }),
                Some(_) => {}
                None => mismatches.push(Mismatch::MissingBinding {
                    ty: host.name.clone(),
                    host: binding,
                }),
            }
        }
        None => mismatches.push(Mismatch::MissingStruct {
            ty: host.name.clone(),
        }),
    }
    StructReport {
        name: host.name.clone(),
        kind: StructKind::Uniform,
        binding: Some(binding),
        host: Some(host),
        device,
        mismatches,
    }
}

fn device_only_report(module: &DeviceModule, name: &str) -> StructReport {
    debug!("checking device-only {name}");
    let device = module.struct_layout(name);
    let mut mismatches = Vec::new();
    match &device {
        Some(layout) => check_interpolated(module, layout, &mut mismatches),
        None => mismatches.push(Mismatch::MissingStruct {
            ty: name.to_string(),
        }),
    }
    StructReport {
        name: name.to_string(),
        kind: StructKind::DeviceOnly,
        binding: None,
        host: None,
        device,
        mismatches,
    }
}

fn compare_uniform(host: &StructLayout, device: &StructLayout, mismatches: &mut Vec<Mismatch>) {
    let ty = || host.name.clone();

    if host.size != device.size {
        mismatches.push(Mismatch::StructSize {
            ty: ty(),
            host: host.size,
            device: device.size,
        });
    }

    for (host_index, field) in host.fields.iter().enumerate() {
        let Some(device_index) = device.fields.iter().position(|f| f.name == field.name) else {
            mismatches.push(Mismatch::MissingField {
                ty: ty(),
                field: field.name.clone(),
            });
            continue;
        };
        if host_index != device_index {
            mismatches.push(Mismatch::FieldOrder {
                ty: ty(),
                field: field.name.clone(),
                host: host_index,
                device: device_index,
            });
        }
        compare_field(&host.name, field, &device.fields[device_index], mismatches);
    }

    for field in &device.fields {
        if host.field(&field.name).is_none() {
            mismatches.push(Mismatch::ExtraField {
                ty: ty(),
                field: field.name.clone(),
            });
        }
    }
}

fn compare_field(
    ty: &str,
    host: &FieldLayout,
    device: &FieldLayout,
    mismatches: &mut Vec<Mismatch>,
) {
    if host.offset != device.offset {
        mismatches.push(Mismatch::FieldOffset {
            ty: ty.to_string(),
            field: host.name.clone(),
            host: host.offset,
            device: device.offset,
        });
    }
    if host.size != device.size {
        mismatches.push(Mismatch::FieldSize {
            ty: ty.to_string(),
            field: host.name.clone(),
            host: host.size,
            device: device.size,
        });
    }
    if host.stride != device.stride {
        mismatches.push(Mismatch::ArrayStride {
            ty: ty.to_string(),
            field: host.name.clone(),
            host: host.stride,
            device: device.stride,
        });
    }
    if host.ty != device.ty {
        mismatches.push(Mismatch::FieldType {
            ty: ty.to_string(),
            field: host.name.clone(),
            host: type_name(host.ty),
            device: type_name(device.ty),
        });
    }
}

// Vertex input structs are fed through a vertex buffer layout, so their WGSL
// member offsets are irrelevant; only locations and formats have to agree.
fn compare_vertex_input(
    host: &StructLayout,
    device: &StructLayout,
    mismatches: &mut Vec<Mismatch>,
) {
    for field in &host.fields {
        let Some(location) = field.location() else {
            continue;
        };
        if field.end() > host.size {
            mismatches.push(Mismatch::AttributeOutOfStride {
                ty: host.name.clone(),
                field: field.name.clone(),
                offset: field.offset,
                end: field.end(),
                stride: host.size,
            });
        }
        match device.field_at_location(location) {
            None => mismatches.push(Mismatch::MissingLocation {
                ty: host.name.clone(),
                location,
            }),
            Some(device_field) if device_field.format != field.format => {
                mismatches.push(Mismatch::LocationFormat {
                    ty: host.name.clone(),
                    location,
                    host: format_name(field.format),
                    device: format_name(device_field.format),
                })
            }
            Some(_) => {}
        }
    }

    for field in &device.fields {
        if let Some(location) = field.location() {
            if host.field_at_location(location).is_none() {
                mismatches.push(Mismatch::ExtraLocation {
                    ty: host.name.clone(),
                    field: field.name.clone(),
                    location,
                });
            }
        }
    }
}

fn check_interpolated(
    module: &DeviceModule,
    layout: &StructLayout,
    mismatches: &mut Vec<Mismatch>,
) {
    let positions: Vec<_> = layout
        .fields
        .iter()
        .filter(|field| field.binding == Some(FieldBinding::Position))
        .collect();
    if positions.len() != 1 {
        mismatches.push(Mismatch::PositionBuiltin {
            ty: layout.name.clone(),
            count: positions.len(),
        });
    }
    for field in positions {
        if field.name != "clip_position" || !module.is_vec4_f32(&layout.name, &field.name) {
            mismatches.push(Mismatch::PositionMember {
                ty: layout.name.clone(),
                field: field.name.clone(),
            });
        }
    }
    let mut locations = HashSet::new();
    for field in &layout.fields {
        match &field.binding {
            None => mismatches.push(Mismatch::UnboundMember {
                ty: layout.name.clone(),
                field: field.name.clone(),
            }),
            Some(FieldBinding::Location(location)) if !locations.insert(*location) => {
                mismatches.push(Mismatch::DuplicateLocation {
                    ty: layout.name.clone(),
                    field: field.name.clone(),
                    location: *location,
                })
            }
            Some(FieldBinding::Builtin(builtin)) => mismatches.push(Mismatch::StageBuiltin {
                ty: layout.name.clone(),
                field: field.name.clone(),
                builtin: builtin.clone(),
            }),
            Some(_) => {}
        }
    }
}

fn type_name(ty: Option<FieldType>) -> String {
    match ty {
        Some(ty) => ty.to_string(),
        None => "an unsupported type".to_string(),
    }
}

fn format_name(format: Option<wgpu::VertexFormat>) -> String {
    match format {
        Some(format) => format!("{format:?}"),
        None => "a non-vertex type".to_string(),
    }
}
