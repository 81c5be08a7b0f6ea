//! Core types for the image compositor.
//!
//! Images reach the compositor in any of the protocol pixel formats and are
//! normalized to RGBA before they are handed to the graphics backend.

use std::cmp::Ordering;

use crate::error::CompositorError;

/// Identifier of an image known to the compositor.
///
/// Kitty ids are assigned by the client application through the graphics
/// protocol. There is exactly one overlay image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageId {
    /// Image transmitted through the Kitty graphics protocol.
    Kitty(u32),
    /// The debug/status overlay image.
    Overlay,
}

impl ImageId {
    /// Returns true if a placement of `self` draws before a placement of
    /// `other` at the same z.
    ///
    /// Kitty images always draw before the overlay, and Kitty images draw in
    /// ascending id order. Two overlay ids are unordered: this returns false
    /// both ways, which is only sound because a single overlay exists.
    pub fn draws_before(self, other: ImageId) -> bool {
        match (self, other) {
            (ImageId::Kitty(a), ImageId::Kitty(b)) => a < b,
            (ImageId::Kitty(_), ImageId::Overlay) => true,
            (ImageId::Overlay, _) => false,
        }
    }

    /// Comparator form of [`ImageId::draws_before`] for stable sorting.
    pub fn draw_order(self, other: ImageId) -> Ordering {
        if self.draws_before(other) {
            Ordering::Less
        } else if other.draws_before(self) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// Pixel encoding of image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 1 byte per pixel: luminance.
    Gray,
    /// 2 bytes per pixel: luminance, alpha.
    GrayAlpha,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb,
    /// 3 bytes per pixel: Blue, Green, Red.
    Bgr,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha. The upload format.
    Rgba,
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::GrayAlpha => 2,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Rgba | PixelFormat::Bgra => 4,
        }
    }

    /// Byte length of a `width`x`height` image in this format, or `None` on
    /// overflow.
    pub fn byte_len(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Borrowed pixel data supplied by a collaborator (terminal core or overlay
/// producer). The compositor copies it before keeping it.
#[derive(Debug, Clone, Copy)]
pub struct PixelSource<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

/// Owned pixel data awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Exactly `width * height * format.bytes_per_pixel()` bytes.
    pub data: Vec<u8>,
}

impl PendingData {
    /// Wrap an owned buffer, checking its length against the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CompositorError> {
        let expected = format
            .byte_len(width, height)
            .ok_or(CompositorError::OutOfMemory { bytes: usize::MAX })?;
        if data.len() != expected {
            return Err(CompositorError::InvalidDimensions {
                width,
                height,
                len: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Copy borrowed pixels into an owned buffer.
    ///
    /// Allocation failure is reported as [`CompositorError::OutOfMemory`]
    /// instead of aborting.
    pub fn copy_from(source: PixelSource<'_>) -> Result<Self, CompositorError> {
        let expected = source
            .format
            .byte_len(source.width, source.height)
            .ok_or(CompositorError::OutOfMemory { bytes: usize::MAX })?;
        if source.data.len() != expected {
            return Err(CompositorError::InvalidDimensions {
                width: source.width,
                height: source.height,
                len: source.data.len(),
                expected,
            });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(expected)
            .map_err(|_| CompositorError::OutOfMemory { bytes: expected })?;
        data.extend_from_slice(source.data);
        Ok(Self {
            width: source.width,
            height: source.height,
            format: source.format,
            data,
        })
    }
}

/// Cell dimensions in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl CellSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One image placement as it will be drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// The image to sample from.
    pub image_id: ImageId,
    /// Grid column of the top-left cell.
    pub x: i32,
    /// Grid row of the top-left cell, relative to the top of the viewport.
    /// Negative when the image starts above the viewport.
    pub y: i32,
    /// Compositing order; also selects the draw band.
    pub z: i32,
    /// Destination width in pixels.
    pub width: u32,
    /// Destination height in pixels.
    pub height: u32,
    /// Pixel offset inside the top-left cell.
    pub cell_offset_x: u32,
    pub cell_offset_y: u32,
    /// Source rectangle within the image, in pixels.
    pub source_x: u32,
    pub source_y: u32,
    pub source_width: u32,
    pub source_height: u32,
}

/// Draw-order bucket a placement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// Below the cell background colors.
    BelowBackground,
    /// Above backgrounds, below text.
    BelowText,
    /// Above text.
    AboveText,
    /// The debug/status overlay, drawn last.
    Overlay,
}

impl Band {
    /// All bands in the order a frame composites them.
    pub const ALL: [Band; 4] = [
        Band::BelowBackground,
        Band::BelowText,
        Band::AboveText,
        Band::Overlay,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitty_draws_before_overlay() {
        assert!(ImageId::Kitty(5).draws_before(ImageId::Overlay));
        assert!(!ImageId::Overlay.draws_before(ImageId::Kitty(5)));
    }

    #[test]
    fn test_kitty_ids_ascending() {
        assert!(ImageId::Kitty(2).draws_before(ImageId::Kitty(9)));
        assert!(!ImageId::Kitty(9).draws_before(ImageId::Kitty(2)));
        assert!(!ImageId::Kitty(4).draws_before(ImageId::Kitty(4)));
    }

    #[test]
    fn test_overlay_pair_is_unordered() {
        assert!(!ImageId::Overlay.draws_before(ImageId::Overlay));
        assert_eq!(
            ImageId::Overlay.draw_order(ImageId::Overlay),
            Ordering::Equal
        );
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Gray.bytes_per_pixel(), 1);
        assert_eq!(PixelFormat::GrayAlpha.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Bgr.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Bgra.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_pending_data_rejects_wrong_length() {
        let result = PendingData::new(2, 2, PixelFormat::Rgb, vec![0; 11]);
        assert!(matches!(
            result,
            Err(CompositorError::InvalidDimensions {
                expected: 12,
                len: 11,
                ..
            })
        ));
    }

    #[test]
    fn test_copy_from_owns_bytes() {
        let bytes = vec![1u8, 2, 3, 4];
        let source = PixelSource {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba,
            data: &bytes,
        };
        let pending = PendingData::copy_from(source).unwrap();
        drop(bytes);
        assert_eq!(pending.data, vec![1, 2, 3, 4]);
    }
}
