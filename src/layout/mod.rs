//! Host-side declarations of the structs shared with the sphere shaders.
//!
//! Every struct here is `#[repr(C)]` plain old data whose bytes are copied into
//! GPU-visible memory unchanged. The WGSL side lives in [`crate::device`].

pub(crate) mod common;
mod uniforms;
mod vertex;

pub use common::{
    BindPoint, FieldBinding, FieldLayout, FieldType, ScalarType, ShaderType, StructLayout,
};
pub use uniforms::{uniform_bind_group_layout_entries, DrawUniforms, FrameUniforms};
pub use vertex::VertexAttributes;

/// Capacity of the [`FrameUniforms`] color palette.
pub const MAX_COLORS: usize = 10;

/// Bind group shared by both uniform buffers.
pub const UNIFORM_GROUP: u32 = 0;

/// Slot of [`DrawUniforms`], read by the vertex stage.
pub const DRAW_UNIFORMS_BINDING: BindPoint = BindPoint {
    group: UNIFORM_GROUP,
    binding: 0,
};

/// Slot of [`FrameUniforms`], read by the fragment stage.
pub const FRAME_UNIFORMS_BINDING: BindPoint = BindPoint {
    group: UNIFORM_GROUP,
    binding: 1,
};
