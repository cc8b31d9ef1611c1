use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

use super::common::host_field;
use super::{FieldType, ScalarType, StructLayout, DRAW_UNIFORMS_BINDING, FRAME_UNIFORMS_BINDING, MAX_COLORS};
use crate::error::LayoutError;

/// Per-draw transform state, rewritten by the host before every draw call.
///
/// `camera_position` occupies a 16-byte slot; the trailing lane is `_pad0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model_matrix: [[f32; 4]; 4],
    pub view_projection_matrix: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    _pad0: f32,
    pub sphere_position: [f32; 2],
    pub sphere_scale: f32,
    _pad1: f32,
}

const _: () = assert!(size_of::<DrawUniforms>() == 160);

impl Default for DrawUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, Vec2::ZERO, 1.0)
    }
}

impl DrawUniforms {
    pub fn new(
        model: Mat4,
        view_projection: Mat4,
        camera_position: Vec3,
        sphere_position: Vec2,
        sphere_scale: f32,
    ) -> Self {
        Self {
            model_matrix: model.to_cols_array_2d(),
            view_projection_matrix: view_projection.to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            _pad0: 0.0,
            sphere_position: sphere_position.to_array(),
            sphere_scale,
            _pad1: 0.0,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model_matrix)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_projection_matrix)
    }

    pub fn camera_position(&self) -> Vec3 {
        Vec3::from_array(self.camera_position)
    }

    pub fn sphere_position(&self) -> Vec2 {
        Vec2::from_array(self.sphere_position)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads uniforms back from a byte buffer of any alignment.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| LayoutError::ByteLength {
            expected: size_of::<Self>(),
            actual: bytes.len(),
        })
    }

    pub fn host_layout() -> StructLayout {
        StructLayout::new(
            "DrawUniforms",
            size_of::<Self>(),
            vec![
                host_field!(DrawUniforms, model_matrix),
                host_field!(DrawUniforms, view_projection_matrix),
                host_field!(DrawUniforms, camera_position),
                host_field!(DrawUniforms, _pad0),
                host_field!(DrawUniforms, sphere_position),
                host_field!(DrawUniforms, sphere_scale),
                host_field!(DrawUniforms, _pad1),
            ],
        )
    }
}

/// Per-frame shading parameters.
///
/// Palette slots are 16 bytes wide (the `w` lane is padding) so the array stride
/// matches `array<vec3<f32>, 10>` in a uniform buffer. Only the first
/// `color_count` slots are meaningful.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    colors: [[f32; 4]; MAX_COLORS],
    color_count: i32,
    pub time: f32,
    _pad0: [f32; 2],
    pub light_position: [f32; 3],
    _pad1: f32,
    pub color_cycle_duration: f32,
    pub glow_intensity: f32,
    _pad2: [f32; 2],
}

const _: () = assert!(size_of::<FrameUniforms>() == 208);

impl FrameUniforms {
    pub fn new(
        colors: &[Vec3],
        time: f32,
        light_position: Vec3,
        color_cycle_duration: f32,
        glow_intensity: f32,
    ) -> Result<Self, LayoutError> {
        check_cycle_duration(color_cycle_duration)?;
        let mut uniforms = Self {
            time,
            light_position: light_position.to_array(),
            color_cycle_duration,
            glow_intensity,
            ..Self::zeroed()
        };
        uniforms.set_colors(colors)?;
        Ok(uniforms)
    }

    /// Replaces the palette. Unused slots are zeroed.
    ///
    /// More than [`MAX_COLORS`] entries is rejected and leaves `self` untouched.
    pub fn set_colors(&mut self, colors: &[Vec3]) -> Result<(), LayoutError> {
        if colors.len() > MAX_COLORS {
            return Err(LayoutError::TooManyColors {
                count: colors.len(),
                capacity: MAX_COLORS,
            });
        }
        self.colors = [[0.0; 4]; MAX_COLORS];
        for (slot, color) in self.colors.iter_mut().zip(colors) {
            *slot = color.extend(0.0).to_array();
        }
        self.color_count = colors.len() as i32;
        Ok(())
    }

    /// Number of valid palette entries, clamped to the palette capacity.
    pub fn color_count(&self) -> usize {
        usize::try_from(self.color_count)
            .unwrap_or(0)
            .min(MAX_COLORS)
    }

    /// Raw `color_count` as stored in the buffer.
    pub fn raw_color_count(&self) -> i32 {
        self.color_count
    }

    /// The valid palette entries; slots past `color_count` are never read.
    pub fn colors(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.colors[..self.color_count()]
            .iter()
            .map(|slot| Vec4::from_array(*slot).truncate())
    }

    pub fn light_position(&self) -> Vec3 {
        Vec3::from_array(self.light_position)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(0..=MAX_COLORS as i32).contains(&self.color_count) {
            return Err(LayoutError::ColorCountOutOfRange(self.color_count));
        }
        check_cycle_duration(self.color_cycle_duration)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads uniforms back from a byte buffer of any alignment and validates them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LayoutError> {
        let uniforms: Self =
            bytemuck::try_pod_read_unaligned(bytes).map_err(|_| LayoutError::ByteLength {
                expected: size_of::<Self>(),
                actual: bytes.len(),
            })?;
        uniforms.validate()?;
        Ok(uniforms)
    }

    pub fn host_layout() -> StructLayout {
        StructLayout::new(
            "FrameUniforms",
            size_of::<Self>(),
            vec![
                // The fourth lane of each slot is padding.
                host_field!(
                    FrameUniforms,
                    colors,
                    FieldType::vector(ScalarType::Float, 3).array(MAX_COLORS as u32)
                )
                .with_stride(size_of::<[f32; 4]>()),
                host_field!(FrameUniforms, color_count),
                host_field!(FrameUniforms, time),
                host_field!(FrameUniforms, _pad0),
                host_field!(FrameUniforms, light_position),
                host_field!(FrameUniforms, _pad1),
                host_field!(FrameUniforms, color_cycle_duration),
                host_field!(FrameUniforms, glow_intensity),
                host_field!(FrameUniforms, _pad2),
            ],
        )
    }
}

fn check_cycle_duration(duration: f32) -> Result<(), LayoutError> {
    if duration.is_finite() && duration > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidCycleDuration(duration))
    }
}

/// Bind group layout entries for both uniform buffers in [`super::UNIFORM_GROUP`].
pub fn uniform_bind_group_layout_entries() -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        uniform_entry(
            DRAW_UNIFORMS_BINDING.binding,
            wgpu::ShaderStages::VERTEX,
            size_of::<DrawUniforms>(),
        ),
        uniform_entry(
            FRAME_UNIFORMS_BINDING.binding,
            wgpu::ShaderStages::FRAGMENT,
            size_of::<FrameUniforms>(),
        ),
    ]
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(len: usize) -> Vec<Vec3> {
        (0..len)
            .map(|i| Vec3::new(i as f32 * 0.1, 0.5, 1.0 - i as f32 * 0.1))
            .collect()
    }

    #[test]
    fn draw_uniform_offsets() {
        let layout = DrawUniforms::host_layout();
        let offsets: Vec<_> = layout
            .fields
            .iter()
            .map(|field| (field.name.as_str(), field.offset, field.size))
            .collect();
        assert_eq!(
            offsets,
            vec![
                ("model_matrix", 0, 64),
                ("view_projection_matrix", 64, 64),
                ("camera_position", 128, 12),
                ("_pad0", 140, 4),
                ("sphere_position", 144, 8),
                ("sphere_scale", 152, 4),
                ("_pad1", 156, 4),
            ]
        );
        assert_eq!(layout.size, 160);
    }

    #[test]
    fn frame_uniform_offsets() {
        let layout = FrameUniforms::host_layout();
        let colors = layout.field("colors").unwrap();
        assert_eq!((colors.offset, colors.size, colors.stride), (0, 160, Some(16)));
        assert_eq!(layout.field("color_count").unwrap().offset, 160);
        assert_eq!(layout.field("time").unwrap().offset, 164);
        assert_eq!(layout.field("light_position").unwrap().offset, 176);
        assert_eq!(layout.field("color_cycle_duration").unwrap().offset, 192);
        assert_eq!(layout.field("glow_intensity").unwrap().offset, 196);
        assert_eq!(layout.size, 208);
    }

    #[test]
    fn host_fields_carry_shader_types() {
        let frame = FrameUniforms::host_layout();
        assert_eq!(
            frame.field("colors").unwrap().ty,
            Some(FieldType::vector(ScalarType::Float, 3).array(10))
        );
        assert_eq!(
            frame.field("color_count").unwrap().ty,
            Some(FieldType::scalar(ScalarType::Sint))
        );

        let draw = DrawUniforms::host_layout();
        assert_eq!(
            draw.field("camera_position").unwrap().ty,
            Some(FieldType::vector(ScalarType::Float, 3))
        );
        assert_eq!(
            draw.field("view_projection_matrix").unwrap().ty,
            Some(FieldType::matrix(ScalarType::Float, 4, 4))
        );
        assert!(draw.fields.iter().all(|field| field.ty.is_some()));
    }

    #[test]
    fn fields_cover_every_byte() {
        for layout in [DrawUniforms::host_layout(), FrameUniforms::host_layout()] {
            let mut cursor = 0;
            for field in &layout.fields {
                assert_eq!(field.offset, cursor, "{}.{}", layout.name, field.name);
                cursor = field.end();
            }
            assert_eq!(cursor, layout.size, "{}", layout.name);
        }
    }

    #[test]
    fn empty_palette_is_representable() {
        let uniforms = FrameUniforms::new(&[], 0.0, Vec3::ZERO, 4.0, 1.0).unwrap();
        assert_eq!(uniforms.color_count(), 0);
        assert_eq!(uniforms.colors().count(), 0);
        uniforms.validate().unwrap();
    }

    #[test]
    fn full_palette_is_representable() {
        let colors = palette(MAX_COLORS);
        let uniforms = FrameUniforms::new(&colors, 1.5, Vec3::Y, 4.0, 0.8).unwrap();
        assert_eq!(uniforms.raw_color_count(), 10);
        assert_eq!(uniforms.colors().collect::<Vec<_>>(), colors);
    }

    #[test]
    fn oversized_palette_leaves_uniforms_untouched() {
        let mut uniforms = FrameUniforms::new(&palette(3), 0.0, Vec3::ZERO, 2.0, 1.0).unwrap();
        let before = uniforms;
        let err = uniforms.set_colors(&palette(MAX_COLORS + 1)).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::TooManyColors {
                count: 11,
                capacity: 10
            }
        ));
        assert_eq!(uniforms, before);
    }

    #[test]
    fn shrinking_palette_clears_stale_slots() {
        let mut uniforms = FrameUniforms::new(&palette(5), 0.0, Vec3::ZERO, 2.0, 1.0).unwrap();
        uniforms.set_colors(&palette(2)).unwrap();
        assert!(uniforms.colors[2..].iter().all(|slot| *slot == [0.0; 4]));
    }

    #[test]
    fn rejects_non_positive_cycle_duration() {
        for duration in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = FrameUniforms::new(&[], 0.0, Vec3::ZERO, duration, 1.0).unwrap_err();
            assert!(matches!(err, LayoutError::InvalidCycleDuration(_)));
        }
    }

    #[test]
    fn corrupt_color_count_is_clamped_and_rejected() {
        let mut uniforms = FrameUniforms::new(&palette(2), 0.0, Vec3::ZERO, 2.0, 1.0).unwrap();
        uniforms.color_count = 42;
        assert_eq!(uniforms.color_count(), MAX_COLORS);
        assert!(matches!(
            uniforms.validate(),
            Err(LayoutError::ColorCountOutOfRange(42))
        ));
        assert!(FrameUniforms::from_bytes(uniforms.as_bytes()).is_err());

        uniforms.color_count = -3;
        assert_eq!(uniforms.colors().count(), 0);
    }

    #[test]
    fn reads_back_from_unaligned_bytes() {
        let uniforms =
            FrameUniforms::new(&palette(4), 12.25, Vec3::new(1.0, 2.0, 3.0), 6.0, 0.3).unwrap();
        let mut buffer = vec![0u8; 1];
        buffer.extend_from_slice(uniforms.as_bytes());
        let decoded = FrameUniforms::from_bytes(&buffer[1..]).unwrap();
        assert_eq!(decoded, uniforms);

        let err = FrameUniforms::from_bytes(&buffer).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::ByteLength {
                expected: 208,
                actual: 209
            }
        ));
    }

    #[test]
    fn draw_uniforms_keep_glam_values() {
        let model = Mat4::from_translation(Vec3::new(1.0, -2.0, 0.5));
        let view_projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
        let uniforms = DrawUniforms::new(
            model,
            view_projection,
            Vec3::new(0.0, 0.0, 5.0),
            Vec2::new(0.25, -0.75),
            1.5,
        );
        let decoded = DrawUniforms::from_bytes(uniforms.as_bytes()).unwrap();
        assert_eq!(decoded.model_matrix(), model);
        assert_eq!(decoded.view_projection_matrix(), view_projection);
        assert_eq!(decoded.camera_position(), Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(decoded.sphere_position(), Vec2::new(0.25, -0.75));
        assert_eq!(decoded.sphere_scale, 1.5);
    }

    #[test]
    fn bind_group_entries_cover_both_buffers() {
        let [draw, frame] = uniform_bind_group_layout_entries();
        assert_eq!(draw.binding, 0);
        assert_eq!(draw.visibility, wgpu::ShaderStages::VERTEX);
        assert_eq!(frame.binding, 1);
        assert_eq!(frame.visibility, wgpu::ShaderStages::FRAGMENT);
        match frame.ty {
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                min_binding_size,
                ..
            } => assert_eq!(min_binding_size.map(|size| size.get()), Some(208)),
            other => panic!("unexpected binding type {other:?}"),
        }
    }
}
