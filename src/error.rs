use std::path::PathBuf;

use thiserror::Error;

use crate::verify::Mismatch;

/// Errors raised while building or reading host-side layout structs.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("palette holds {count} colors but only {capacity} fit")]
    TooManyColors { count: usize, capacity: usize },
    #[error("color count {0} is outside 0..={max}", max = crate::layout::MAX_COLORS)]
    ColorCountOutOfRange(i32),
    #[error("color cycle duration must be positive and finite, got {0}")]
    InvalidCycleDuration(f32),
    #[error("expected {expected} bytes, got {actual}")]
    ByteLength { expected: usize, actual: usize },
    #[error("interleaved vertex data has {0} floats, not a multiple of 6")]
    InterleavedLength(usize),
    #[error("host and device layouts disagree ({} mismatch(es))", .mismatches.len())]
    Incompatible { mismatches: Vec<Mismatch> },
}

/// Errors raised while loading the device-side WGSL declarations.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("WGSL parse error:\n{0}")]
    Parse(String),
    #[error("WGSL validation error: {0}")]
    Validation(String),
    #[error("failed to compute type layouts: {0}")]
    Layout(String),
}
