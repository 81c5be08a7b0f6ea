//! Frame compositor: the renderer-facing entry point.
//!
//! Each rendered frame drives the compositor in a fixed order on the
//! render thread:
//!
//! ```text
//! kitty_requires_update()? ─yes─▶ kitty_update()   rebuild placements
//!                                      │
//!                              upload()             push pending textures
//!                                      │
//!                 draw(BelowBackground) ... draw(Overlay)
//! ```

use std::time::Instant;

use crux_config::GraphicsConfig;

use crate::backend::{DrawMode, DrawStep, GraphicsBackend, ImageVertex};
use crate::error::CompositorError;
use crate::geometry;
use crate::placements::{PlacementList, VIRTUAL_Z};
use crate::snapshot::{KittySnapshot, PlacementLocation, SnapshotPlacement, Viewport};
use crate::store::{ImageStore, StoreStats};
use crate::types::{Band, CellSize, ImageId, PixelSource, Placement};

/// Owns every image the renderer knows about and the placements to draw.
///
/// Generic over the backend texture type so the store can hold textures
/// directly.
#[derive(Debug)]
pub struct ImageCompositor<T> {
    config: GraphicsConfig,
    images: ImageStore<T>,
    kitty: PlacementList,
    /// The single overlay placement, if an overlay is shown.
    overlay: Option<Placement>,
}

impl<T> Default for ImageCompositor<T> {
    fn default() -> Self {
        Self::new(GraphicsConfig::default())
    }
}

impl<T> ImageCompositor<T> {
    pub fn new(config: GraphicsConfig) -> Self {
        Self {
            images: ImageStore::with_limit(config.max_image_bytes),
            config,
            kitty: PlacementList::new(),
            overlay: None,
        }
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn images(&self) -> &ImageStore<T> {
        &self.images
    }

    pub fn stats(&self) -> StoreStats {
        self.images.stats()
    }

    /// Placements of one band, in draw order.
    pub fn placements(&self, band: Band) -> &[Placement] {
        match band {
            Band::Overlay => self.overlay.as_slice(),
            _ => self.kitty.band(band),
        }
    }

    /// True if the placement list must be rebuilt this frame.
    ///
    /// Virtual placements follow the cells they are written in, and cell
    /// edits do not mark the Kitty state dirty, so any frame that showed a
    /// virtual placement forces a rebuild of the next one.
    pub fn kitty_requires_update(&self, snapshot: &impl KittySnapshot) -> bool {
        snapshot.is_dirty() || self.kitty.has_virtual()
    }

    /// Rebuild the Kitty placement list from the terminal's state.
    ///
    /// Per-image failures are logged and the placement skipped. Only a
    /// failure to grow the placement list itself is returned, in which
    /// case the frame should be skipped.
    pub fn kitty_update(
        &mut self,
        snapshot: &impl KittySnapshot,
        cell: CellSize,
    ) -> Result<(), CompositorError> {
        self.kitty.clear();

        if !self.config.kitty_images {
            self.images.unload_missing_kitty(|_| false);
            self.kitty.finish();
            return Ok(());
        }

        // Images the terminal deleted are unloaded on the next upload pass.
        self.images
            .unload_missing_kitty(|id| snapshot.contains_image(id));

        let viewport = snapshot.viewport();
        if viewport.rows == 0 {
            self.kitty.finish();
            return Ok(());
        }

        let placements = snapshot.placements();
        let mut virtuals: Vec<&SnapshotPlacement> = Vec::new();
        for p in &placements {
            match p.location {
                PlacementLocation::Pinned { column, row } => {
                    self.prep_pinned(snapshot, p, column, row, viewport, cell)?;
                }
                PlacementLocation::Virtual => {
                    self.kitty.set_has_virtual();
                    virtuals.push(p);
                }
            }
        }

        if !virtuals.is_empty() && self.config.virtual_placements {
            self.prep_virtual(snapshot, &virtuals, viewport, cell)?;
        }

        self.kitty.finish();
        log::debug!(
            "rebuilt kitty placements: {} placed, bounds {:?}, virtual={}",
            self.kitty.len(),
            self.kitty.bounds(),
            self.kitty.has_virtual()
        );
        Ok(())
    }

    fn prep_pinned(
        &mut self,
        snapshot: &impl KittySnapshot,
        p: &SnapshotPlacement,
        column: u32,
        row: u32,
        viewport: Viewport,
        cell: CellSize,
    ) -> Result<(), CompositorError> {
        let Some(image) = snapshot.image(p.image_id) else {
            log::warn!("{}", CompositorError::MissingReference(ImageId::Kitty(p.image_id)));
            return Ok(());
        };

        let source = geometry::clamp_source(p, image.pixels.width, image.pixels.height);
        let (width, height) = geometry::destination_size(p, source, cell);
        let cell_offset_x = p.x_offset.min(cell.width.saturating_sub(1));
        let cell_offset_y = p.y_offset.min(cell.height.saturating_sub(1));
        let (_, grid_rows) =
            geometry::grid_size(p, (width, height), (cell_offset_x, cell_offset_y), cell);

        let img_top_y = row;
        let img_bot_y = row.saturating_add(grid_rows - 1);
        if img_top_y > viewport.bottom_row() || img_bot_y < viewport.top_row {
            return Ok(());
        }

        if let Err(err) =
            self.images
                .prep_image(ImageId::Kitty(image.id), image.transmit_time, image.pixels)
        {
            log::warn!("error preparing kitty image {}: {err}", image.id);
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Ok(());
        }

        let y = i64::from(img_top_y) - i64::from(viewport.top_row);
        self.kitty.push(Placement {
            image_id: ImageId::Kitty(image.id),
            x: i32::try_from(column).unwrap_or(i32::MAX),
            y: i32::try_from(y).unwrap_or(i32::MIN),
            z: p.z,
            width,
            height,
            cell_offset_x,
            cell_offset_y,
            source_x: source.x,
            source_y: source.y,
            source_width: source.width,
            source_height: source.height,
        })
    }

    fn prep_virtual(
        &mut self,
        snapshot: &impl KittySnapshot,
        virtuals: &[&SnapshotPlacement],
        viewport: Viewport,
        cell: CellSize,
    ) -> Result<(), CompositorError> {
        for run in snapshot.placeholders(viewport) {
            let Some(image) = snapshot.image(run.image_id) else {
                log::warn!(
                    "placeholder: {}",
                    CompositorError::MissingReference(ImageId::Kitty(run.image_id))
                );
                continue;
            };
            let Some(vp) = virtuals
                .iter()
                .find(|v| v.image_id == run.image_id && v.placement_id == run.placement_id)
            else {
                log::warn!(
                    "placeholder references missing virtual placement {} of image {}",
                    run.placement_id,
                    run.image_id
                );
                continue;
            };

            let (width, height) = (image.pixels.width, image.pixels.height);
            let grid = geometry::virtual_grid_size(vp, width, height, cell);
            let rp = geometry::virtual_render_placement(&run, grid, width, height, cell);
            if rp.is_empty() {
                continue;
            }

            if let Err(err) =
                self.images
                    .prep_image(ImageId::Kitty(image.id), image.transmit_time, image.pixels)
            {
                log::warn!("error preparing kitty image {}: {err}", image.id);
                continue;
            }

            self.kitty.push(Placement {
                image_id: ImageId::Kitty(image.id),
                x: i32::try_from(run.column).unwrap_or(i32::MAX),
                y: i32::try_from(run.row).unwrap_or(i32::MAX),
                z: VIRTUAL_Z,
                width: rp.dest_width,
                height: rp.dest_height,
                cell_offset_x: rp.offset_x,
                cell_offset_y: rp.offset_y,
                source_x: rp.source.x,
                source_y: rp.source.y,
                source_width: rp.source.width,
                source_height: rp.source.height,
            })?;
        }
        Ok(())
    }

    /// Show `overlay` as the debug/status overlay, or hide it with `None`.
    ///
    /// Every call re-prepares the overlay image: it is stamped with the
    /// current instant so it is always treated as new content.
    pub fn overlay_update(
        &mut self,
        overlay: Option<PixelSource<'_>>,
    ) -> Result<(), CompositorError> {
        let Some(pixels) = overlay.filter(|_| self.config.debug_overlay) else {
            self.images.mark_for_unload(ImageId::Overlay);
            self.overlay = None;
            return Ok(());
        };

        if let Err(err) = self
            .images
            .prep_image(ImageId::Overlay, Instant::now(), pixels)
        {
            self.overlay = None;
            return Err(err);
        }

        self.overlay = Some(Placement {
            image_id: ImageId::Overlay,
            x: 0,
            y: 0,
            z: 0,
            width: pixels.width,
            height: pixels.height,
            cell_offset_x: 0,
            cell_offset_y: 0,
            source_x: 0,
            source_y: 0,
            source_width: pixels.width,
            source_height: pixels.height,
        });
        Ok(())
    }

    /// Unload every image, e.g. on terminal reset. Placements are dropped
    /// immediately; textures go on the next upload pass.
    pub fn clear(&mut self) {
        self.images.mark_all_for_unload();
        self.kitty.clear();
        self.kitty.finish();
        self.overlay = None;
    }

    /// Drop unloaded images and upload pending ones.
    ///
    /// Returns false if any upload failed. This is diagnostic only: drawing
    /// proceeds with whatever is ready.
    pub fn upload<B>(&mut self, backend: &mut B) -> bool
    where
        B: GraphicsBackend<Texture = T>,
    {
        let success = self.images.upload(backend);
        log::debug!("image upload pass done: {:?}", self.images.stats());
        success
    }

    /// Issue one draw per placement of `band`.
    ///
    /// Placements whose image is missing or not yet drawable are skipped,
    /// as are placements whose vertex buffer cannot be created. Nothing
    /// here aborts the band.
    // TODO: batch placements that share an image into one instanced draw.
    pub fn draw<B>(
        &self,
        backend: &mut B,
        pipeline: &B::Pipeline,
        pass: &mut B::RenderPass,
        band: Band,
    ) where
        B: GraphicsBackend<Texture = T>,
    {
        for placement in self.placements(band) {
            let Some(image) = self.images.image(placement.image_id) else {
                log::warn!("{}", CompositorError::MissingReference(placement.image_id));
                continue;
            };
            let Some(texture) = image.drawable_texture() else {
                log::warn!(
                    "image not ready for placement image_id={:?}",
                    placement.image_id
                );
                continue;
            };

            let vertex = ImageVertex::from(placement);
            let buffer = match backend.create_vertex_buffer(bytemuck::bytes_of(&vertex)) {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::error!("error creating image vertex buffer: {err}");
                    continue;
                }
            };

            backend.draw_step(
                pass,
                DrawStep {
                    pipeline,
                    buffer,
                    texture,
                    mode: DrawMode::TriangleStrip,
                    vertex_count: 4,
                },
            );
        }
    }
}
