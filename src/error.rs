//! Error types for the catprint library

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the rendering pipeline and the print job
#[derive(Debug, Error)]
pub enum PrintError {
    /// Input file does not exist
    #[error("input not found: {0}")]
    InputNotFound(PathBuf),

    /// Text input is empty after trimming
    #[error("text input is empty")]
    EmptyInput,

    /// Energy value does not fit the printer's 16-bit range
    #[error("invalid energy value '{0}': expected 0x0000..=0xffff")]
    InvalidEnergy(String),

    /// Wrap/render configuration violates an invariant
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Binarized image width does not match the printer raster width
    #[error("dimension mismatch: expected width {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },

    /// Image could not be decoded
    #[error("image load error: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// Image format is not supported
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// BLE connection, write or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error while reading input or persisting the rendered image
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catprint operations
pub type PrintResult<T> = Result<T, PrintError>;
