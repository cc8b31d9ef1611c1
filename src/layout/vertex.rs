use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::common::host_field;
use super::StructLayout;
use crate::error::LayoutError;

/// Per-vertex geometry input, tightly packed as `position.xyz` then `normal.xyz`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexAttributes {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

const _: () = assert!(size_of::<VertexAttributes>() == 24);

impl VertexAttributes {
    pub const POSITION_LOCATION: u32 = 0;
    pub const NORMAL_LOCATION: u32 = 1;

    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexAttributes, position) as wgpu::BufferAddress,
            shader_location: Self::POSITION_LOCATION,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: offset_of!(VertexAttributes, normal) as wgpu::BufferAddress,
            shader_location: Self::NORMAL_LOCATION,
        },
    ];

    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    /// Vertex buffer layout matching the `VertexAttributes` input of the vertex stage.
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Views an interleaved `position.xyz, normal.xyz` float buffer as vertices.
    pub fn from_interleaved(data: &[f32]) -> Result<&[Self], LayoutError> {
        bytemuck::try_cast_slice(data).map_err(|_| LayoutError::InterleavedLength(data.len()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn host_layout() -> StructLayout {
        let [position, normal] = Self::ATTRIBUTES;
        StructLayout::new(
            "VertexAttributes",
            size_of::<Self>(),
            vec![
                host_field!(VertexAttributes, position)
                    .with_location(position.shader_location, position.format),
                host_field!(VertexAttributes, normal)
                    .with_location(normal.shader_location, normal.format),
            ],
        )
    }
}
