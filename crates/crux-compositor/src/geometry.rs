//! Placement geometry: source clamping, destination sizing and the pixel
//! layout of virtual placements.

use crate::snapshot::{PlaceholderRun, SnapshotPlacement};
use crate::types::CellSize;

/// Rectangle in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clamp the requested source rectangle of `p` to the image bounds.
///
/// A zero requested extent means "to the edge of the image".
pub fn clamp_source(p: &SnapshotPlacement, image_width: u32, image_height: u32) -> SourceRect {
    let x = image_width.min(p.source_x);
    let y = image_height.min(p.source_y);
    let remaining_width = image_width - x;
    let remaining_height = image_height - y;
    SourceRect {
        x,
        y,
        width: if p.source_width > 0 {
            remaining_width.min(p.source_width)
        } else {
            remaining_width
        },
        height: if p.source_height > 0 {
            remaining_height.min(p.source_height)
        } else {
            remaining_height
        },
    }
}

/// Destination size in pixels.
///
/// Columns and rows scale to whole cells. When only one of them is given
/// the other axis keeps the source aspect ratio; when neither is given the
/// source extent is drawn 1:1.
pub fn destination_size(p: &SnapshotPlacement, source: SourceRect, cell: CellSize) -> (u32, u32) {
    if p.columns > 0 && p.rows > 0 {
        return (
            p.columns.saturating_mul(cell.width),
            p.rows.saturating_mul(cell.height),
        );
    }

    let mut width = u64::from(source.width);
    let mut height = u64::from(source.height);
    if p.columns > 0 {
        let scaled = u64::from(p.columns) * u64::from(cell.width);
        if width > 0 {
            height = height * scaled / width;
        }
        width = scaled;
    } else if p.rows > 0 {
        let scaled = u64::from(p.rows) * u64::from(cell.height);
        if height > 0 {
            width = width * scaled / height;
        }
        height = scaled;
    }

    (saturate_u32(width), saturate_u32(height))
}

/// Number of grid cells (columns, rows) a placement covers.
///
/// Always at least one cell in each direction so the anchor cell itself
/// is counted even for zero-sized placements.
pub fn grid_size(
    p: &SnapshotPlacement,
    dest: (u32, u32),
    offset: (u32, u32),
    cell: CellSize,
) -> (u32, u32) {
    if p.columns > 0 && p.rows > 0 {
        return (p.columns, p.rows);
    }
    if cell.is_empty() {
        return (1, 1);
    }
    let cols = (u64::from(dest.0) + u64::from(offset.0)).div_ceil(u64::from(cell.width));
    let rows = (u64::from(dest.1) + u64::from(offset.1)).div_ceil(u64::from(cell.height));
    (saturate_u32(cols).max(1), saturate_u32(rows).max(1))
}

/// Grid of a virtual placement. Missing dimensions are derived from the
/// image size in cells.
pub fn virtual_grid_size(
    p: &SnapshotPlacement,
    image_width: u32,
    image_height: u32,
    cell: CellSize,
) -> (u32, u32) {
    if cell.is_empty() {
        return (p.columns, p.rows);
    }
    let cols = if p.columns > 0 {
        p.columns
    } else {
        image_width.div_ceil(cell.width)
    };
    let rows = if p.rows > 0 {
        p.rows
    } else {
        image_height.div_ceil(cell.height)
    };
    (cols, rows)
}

/// Pixel layout of one placeholder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderPlacement {
    /// Offset from the top-left of the run's first cell.
    pub offset_x: u32,
    pub offset_y: u32,
    pub dest_width: u32,
    pub dest_height: u32,
    pub source: SourceRect,
}

impl RenderPlacement {
    pub fn is_empty(&self) -> bool {
        self.dest_width == 0 || self.dest_height == 0
    }
}

/// Lay out the part of an image that a placeholder run shows.
///
/// The image is scaled to fit the `grid` (columns, rows) of its virtual
/// placement, preserving aspect ratio, and centred in it. The run covers
/// one cell row of that grid; the result is the intersection of the run
/// with the fitted image, plus the matching source rectangle.
pub fn virtual_render_placement(
    run: &PlaceholderRun,
    grid: (u32, u32),
    image_width: u32,
    image_height: u32,
    cell: CellSize,
) -> RenderPlacement {
    if cell.is_empty() || image_width == 0 || image_height == 0 || grid.0 == 0 || grid.1 == 0 {
        return RenderPlacement::default();
    }

    let cell_w = f64::from(cell.width);
    let cell_h = f64::from(cell.height);
    let grid_w = f64::from(grid.0) * cell_w;
    let grid_h = f64::from(grid.1) * cell_h;
    let img_w = f64::from(image_width);
    let img_h = f64::from(image_height);

    let scale = (grid_w / img_w).min(grid_h / img_h);
    let fitted_w = img_w * scale;
    let fitted_h = img_h * scale;
    let fitted_x = (grid_w - fitted_w) / 2.0;
    let fitted_y = (grid_h - fitted_h) / 2.0;

    let run_x = f64::from(run.image_column) * cell_w;
    let run_y = f64::from(run.image_row) * cell_h;
    let run_w = f64::from(run.width) * cell_w;

    let left = run_x.max(fitted_x);
    let right = (run_x + run_w).min(fitted_x + fitted_w);
    let top = run_y.max(fitted_y);
    let bottom = (run_y + cell_h).min(fitted_y + fitted_h);
    if right <= left || bottom <= top {
        return RenderPlacement::default();
    }

    let source_x = ((left - fitted_x) / scale).round().min(img_w);
    let source_y = ((top - fitted_y) / scale).round().min(img_h);
    let source_w = ((right - left) / scale).round().min(img_w - source_x);
    let source_h = ((bottom - top) / scale).round().min(img_h - source_y);

    RenderPlacement {
        offset_x: (left - run_x).round() as u32,
        offset_y: (top - run_y).round() as u32,
        dest_width: (right - left).round() as u32,
        dest_height: (bottom - top).round() as u32,
        source: SourceRect {
            x: source_x as u32,
            y: source_y as u32,
            width: source_w as u32,
            height: source_h as u32,
        },
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
