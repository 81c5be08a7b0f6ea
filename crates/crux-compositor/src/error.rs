//! Error types for the image compositor.

use crate::types::{ImageId, PixelFormat};

/// Errors that can occur while preparing, uploading or placing images.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    /// A pixel buffer or placement list could not be allocated.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// Pixel data could not be normalized to RGBA.
    #[error("cannot convert {format:?} pixels to RGBA: {reason}")]
    ImageConversion { format: PixelFormat, reason: String },

    /// The graphics backend refused to create a texture.
    #[error("texture upload failed: {0}")]
    UploadFailed(#[source] BackendError),

    /// A placement references an image the store does not know.
    #[error("image not found: {0:?}")]
    MissingReference(ImageId),

    /// The byte length does not match the declared dimensions.
    #[error("invalid dimensions: {width}x{height} needs {expected} bytes, got {len}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },

    /// The normalized image would exceed the configured per-image limit.
    #[error("image too large: {size} bytes (max {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },
}

/// Failure reported by a graphics backend implementation.
///
/// Backends wrap their native errors (device lost, allocation refused, ...)
/// into a message; the compositor only logs it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
