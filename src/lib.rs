//! Data layouts shared between the sphere animation host code and its shaders.
//!
//! The host fills [`VertexAttributes`], [`DrawUniforms`] and [`FrameUniforms`] and
//! copies their bytes into GPU buffers; the shaders read the same bytes through the
//! WGSL declarations in [`device`]. [`verify()`] checks the two sides against each
//! other so the contract cannot silently drift.

pub mod device;
pub mod error;
pub mod layout;
pub mod verify;

pub use device::DeviceModule;
pub use error::{LayoutError, ShaderError};
pub use layout::{
    uniform_bind_group_layout_entries, BindPoint, DrawUniforms, FieldBinding, FieldLayout,
    FieldType, FrameUniforms, ScalarType, StructLayout, VertexAttributes, MAX_COLORS,
};
pub use verify::{verify, LayoutReport, Mismatch, StructKind, StructReport};
