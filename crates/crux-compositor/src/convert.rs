//! Pixel normalization to RGBA.
//!
//! Every texture handed to the graphics backend is 8-bit RGBA. Other
//! protocol formats are expanded or swizzled here before upload.

use crate::error::CompositorError;
use crate::types::PixelFormat;

/// Convert `data` encoded as `format` into a freshly allocated RGBA buffer.
///
/// Fails if `data` is not a whole number of pixels or the output buffer
/// cannot be allocated. Converting RGBA input copies it unchanged.
pub fn to_rgba(format: PixelFormat, data: &[u8]) -> Result<Vec<u8>, CompositorError> {
    let bpp = format.bytes_per_pixel();
    if data.len() % bpp != 0 {
        return Err(CompositorError::ImageConversion {
            format,
            reason: format!("{} bytes is not a multiple of {bpp}", data.len()),
        });
    }

    let pixels = data.len() / bpp;
    let out_len = pixels
        .checked_mul(4)
        .ok_or(CompositorError::OutOfMemory { bytes: usize::MAX })?;
    let mut rgba = Vec::new();
    rgba.try_reserve_exact(out_len)
        .map_err(|_| CompositorError::OutOfMemory { bytes: out_len })?;

    match format {
        PixelFormat::Gray => {
            for &g in data {
                rgba.extend_from_slice(&[g, g, g, 255]);
            }
        }
        PixelFormat::GrayAlpha => {
            for px in data.chunks_exact(2) {
                rgba.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        PixelFormat::Rgb => {
            for px in data.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        PixelFormat::Bgr => {
            for px in data.chunks_exact(3) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
        }
        PixelFormat::Rgba => rgba.extend_from_slice(data),
        PixelFormat::Bgra => {
            for px in data.chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
    }

    Ok(rgba)
}
