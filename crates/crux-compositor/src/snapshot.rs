//! Terminal-side inputs to the placement builder.
//!
//! The [`KittySnapshot`] trait captures what the compositor reads from the
//! terminal core's Kitty graphics state each frame. The terminal owns the
//! authoritative images and placements and is responsible for locking
//! them while the compositor reads; the compositor copies whatever it
//! keeps.

use std::time::Instant;

use crate::types::PixelSource;

/// A protocol image as held by the terminal.
#[derive(Debug, Clone, Copy)]
pub struct KittyImage<'a> {
    /// Protocol-assigned image id.
    pub id: u32,
    /// Version stamp: equal stamps mean equal content.
    pub transmit_time: Instant,
    pub pixels: PixelSource<'a>,
}

/// Where a protocol placement is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementLocation {
    /// Anchored at a fixed cell, in absolute screen rows (scrollback
    /// included).
    Pinned { column: u32, row: u32 },
    /// Driven by Unicode placeholder cells written into the grid.
    Virtual,
}

/// A protocol placement as held by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPlacement {
    pub image_id: u32,
    pub placement_id: u32,
    pub location: PlacementLocation,
    /// Pixel offset inside the anchor cell.
    pub x_offset: u32,
    pub y_offset: u32,
    /// Source rectangle in image pixels (0 width/height = to the edge).
    pub source_x: u32,
    pub source_y: u32,
    pub source_width: u32,
    pub source_height: u32,
    /// Display size in cells (0 = derived from the image).
    pub columns: u32,
    pub rows: u32,
    /// Compositing order.
    pub z: i32,
}

impl SnapshotPlacement {
    /// Pinned placement of the whole image at its natural size.
    pub fn pinned(image_id: u32, column: u32, row: u32) -> Self {
        Self {
            image_id,
            placement_id: 0,
            location: PlacementLocation::Pinned { column, row },
            x_offset: 0,
            y_offset: 0,
            source_x: 0,
            source_y: 0,
            source_width: 0,
            source_height: 0,
            columns: 0,
            rows: 0,
            z: 0,
        }
    }

    /// Virtual placement covering `columns` x `rows` cells.
    pub fn virtual_grid(image_id: u32, placement_id: u32, columns: u32, rows: u32) -> Self {
        Self {
            placement_id,
            location: PlacementLocation::Virtual,
            columns,
            rows,
            ..Self::pinned(image_id, 0, 0)
        }
    }
}

/// A horizontal run of placeholder cells found in the visible grid.
///
/// Consecutive placeholder cells of one image row collapse into a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderRun {
    pub image_id: u32,
    pub placement_id: u32,
    /// Viewport column of the first cell.
    pub column: u32,
    /// Viewport row.
    pub row: u32,
    /// Number of cells in the run.
    pub width: u32,
    /// Cell coordinates inside the virtual placement grid.
    pub image_column: u32,
    pub image_row: u32,
}

/// The visible window into the screen, in absolute screen rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Screen row shown at the top of the viewport.
    pub top_row: u32,
    /// Number of visible rows.
    pub rows: u32,
}

impl Viewport {
    pub const fn new(top_row: u32, rows: u32) -> Self {
        Self { top_row, rows }
    }

    /// Last visible screen row (inclusive).
    pub const fn bottom_row(self) -> u32 {
        self.top_row.saturating_add(self.rows.saturating_sub(1))
    }
}

/// Read access to the terminal's Kitty graphics state.
pub trait KittySnapshot {
    /// True if images or placements changed since the last frame.
    fn is_dirty(&self) -> bool;

    /// Look up a protocol image.
    fn image(&self, id: u32) -> Option<KittyImage<'_>>;

    /// True if the terminal still holds image `id`.
    fn contains_image(&self, id: u32) -> bool {
        self.image(id).is_some()
    }

    /// All placements, pinned and virtual.
    fn placements(&self) -> Vec<SnapshotPlacement>;

    /// The viewport currently displayed.
    fn viewport(&self) -> Viewport;

    /// Placeholder runs visible in `viewport`.
    fn placeholders(&self, viewport: Viewport) -> Vec<PlaceholderRun>;
}
