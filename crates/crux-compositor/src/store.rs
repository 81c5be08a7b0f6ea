//! Image lifecycle store.
//!
//! The [`ImageStore`] maps every [`ImageId`] the renderer knows about to
//! its [`Image`] state and the transmit stamp of the content it holds.
//! Entries are never removed synchronously: they are flagged for unload
//! and dropped by the next [`ImageStore::upload`] pass.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use crate::backend::GraphicsBackend;
use crate::error::CompositorError;
use crate::image::Image;
use crate::types::{ImageId, PendingData, PixelFormat, PixelSource};

/// Default per-image cap: 64 MiB of RGBA pixel data.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = crux_config::DEFAULT_MAX_IMAGE_BYTES;

/// Internal record for a stored image.
#[derive(Debug)]
pub struct ImageEntry<T> {
    pub image: Image<T>,
    /// Stamp of the content currently held. `None` until the first
    /// successful prepare.
    pub transmit_time: Option<Instant>,
}

/// Per-state counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub pending: usize,
    pub replacing: usize,
    pub ready: usize,
    pub unloading: usize,
    /// Bytes held in pending buffers (textures are not counted).
    pub pending_bytes: usize,
}

/// Owns every pending buffer and texture the compositor holds.
#[derive(Debug)]
pub struct ImageStore<T> {
    entries: HashMap<ImageId, ImageEntry<T>>,
    /// Maximum RGBA size of a single image.
    max_image_bytes: usize,
}

impl<T> Default for ImageStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ImageStore<T> {
    /// Create an empty store with the default per-image limit (64 MiB).
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_IMAGE_BYTES)
    }

    /// Create an empty store with a custom per-image limit.
    pub fn with_limit(max_image_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_image_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageEntry<T>> {
        self.entries.get(&id)
    }

    pub fn image(&self, id: ImageId) -> Option<&Image<T>> {
        self.entries.get(&id).map(|entry| &entry.image)
    }

    /// Flag one entry for removal on the next upload pass.
    pub fn mark_for_unload(&mut self, id: ImageId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.image.mark_for_unload();
        }
    }

    /// Flag every entry for removal on the next upload pass.
    pub fn mark_all_for_unload(&mut self) {
        for entry in self.entries.values_mut() {
            entry.image.mark_for_unload();
        }
    }

    /// Flag every Kitty entry whose protocol id fails `exists`.
    pub fn unload_missing_kitty(&mut self, exists: impl Fn(u32) -> bool) {
        for (id, entry) in &mut self.entries {
            if let ImageId::Kitty(n) = *id {
                if !exists(n) && !entry.image.is_unloading() {
                    log::debug!("image {n} no longer exists in the terminal, unloading");
                    entry.image.mark_for_unload();
                }
            }
        }
    }

    /// Make sure `id` holds the content stamped `transmit_time`.
    ///
    /// An identical stamp on a live entry means identical content, so
    /// nothing is copied, converted or uploaded. Otherwise the bytes are
    /// copied into the store, normalized to RGBA, and left pending for the
    /// next upload pass. An existing texture is kept, but is not drawn,
    /// until then. Preparing an unload-flagged entry revives it.
    ///
    /// On failure a brand-new entry is never inserted, and an existing
    /// entry is flagged for unload since its content is now stale.
    pub fn prep_image(
        &mut self,
        id: ImageId,
        transmit_time: Instant,
        source: PixelSource<'_>,
    ) -> Result<(), CompositorError> {
        let existing = self.entries.get(&id);
        if existing.is_some_and(|entry| {
            entry.transmit_time == Some(transmit_time) && !entry.image.is_unloading()
        }) {
            return Ok(());
        }
        let is_new = existing.is_none();

        let pending = match self.copy_pending(source) {
            Ok(pending) => pending,
            Err(err) => {
                if !is_new {
                    self.mark_for_unload(id);
                }
                return Err(err);
            }
        };

        let entry = match self.entries.entry(id) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.image.mark_for_replace(pending);
                entry
            }
            Entry::Vacant(vacant) => vacant.insert(ImageEntry {
                image: Image::Pending(pending),
                transmit_time: None,
            }),
        };

        if let Err(err) = entry.image.prep_for_upload() {
            log::warn!("failed to convert image {id:?}: {err}");
            entry.image.mark_for_unload();
            return Err(err);
        }

        entry.transmit_time = Some(transmit_time);
        Ok(())
    }

    /// Drop unload-flagged entries and upload pending ones.
    ///
    /// Failures are logged and do not stop the pass; a failed image stays
    /// pending and is retried next frame. Returns false if any upload
    /// failed.
    pub fn upload<B>(&mut self, backend: &mut B) -> bool
    where
        B: GraphicsBackend<Texture = T> + ?Sized,
    {
        let mut success = true;
        self.entries.retain(|id, entry| {
            if entry.image.is_unloading() {
                log::debug!("unloading image {id:?}");
                return false;
            }

            if entry.image.is_pending() {
                match entry.image.upload(backend) {
                    Ok(()) => log::debug!("uploaded image {id:?}"),
                    Err(err) => {
                        log::error!("error uploading image {id:?}: {err}");
                        success = false;
                    }
                }
            }

            true
        });
        success
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for entry in self.entries.values() {
            match &entry.image {
                Image::Pending(_) => stats.pending += 1,
                Image::Replace { .. } => stats.replacing += 1,
                Image::Ready(_) => stats.ready += 1,
                Image::UnloadPending(_) | Image::UnloadReady(_) | Image::UnloadReplace { .. } => {
                    stats.unloading += 1
                }
            }
            if let Some(pending) = entry.image.pending() {
                stats.pending_bytes += pending.data.len();
            }
        }
        stats
    }

    fn copy_pending(&self, source: PixelSource<'_>) -> Result<PendingData, CompositorError> {
        let size = PixelFormat::Rgba
            .byte_len(source.width, source.height)
            .ok_or(CompositorError::OutOfMemory { bytes: usize::MAX })?;
        if size > self.max_image_bytes {
            return Err(CompositorError::ImageTooLarge {
                size,
                max: self.max_image_bytes,
            });
        }
        PendingData::copy_from(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::testing::{MockBackend, MockTexture};

    fn rgb_2x2(bytes: &[u8; 12]) -> PixelSource<'_> {
        PixelSource {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb,
            data: bytes,
        }
    }

    #[test]
    fn test_prep_new_image_is_pending_rgba() {
        let mut store: ImageStore<MockTexture> = ImageStore::new();
        let bytes = [7u8; 12];
        store
            .prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes))
            .unwrap();

        let image = store.image(ImageId::Kitty(1)).unwrap();
        let pending = image.pending().unwrap();
        assert!(matches!(image, Image::Pending(_)));
        assert_eq!(pending.format, PixelFormat::Rgba);
        assert_eq!(pending.data.len(), 16);
    }

    #[test]
    fn test_prep_same_stamp_is_deduplicated() {
        let mut store: ImageStore<MockTexture> = ImageStore::new();
        let bytes = [7u8; 12];
        let t0 = Instant::now();
        store.prep_image(ImageId::Kitty(1), t0, rgb_2x2(&bytes)).unwrap();
        let ptr = store.image(ImageId::Kitty(1)).unwrap().pending().unwrap().data.as_ptr();

        let other = [9u8; 12];
        store.prep_image(ImageId::Kitty(1), t0, rgb_2x2(&other)).unwrap();
        let pending = store.image(ImageId::Kitty(1)).unwrap().pending().unwrap();
        assert_eq!(pending.data.as_ptr(), ptr);
        assert_eq!(pending.data[0], 7);
    }

    #[test]
    fn test_prep_same_stamp_revives_unloading_entry() {
        let mut store = ImageStore::new();
        let mut backend = MockBackend::default();
        let bytes = [7u8; 12];
        let t0 = Instant::now();
        store.prep_image(ImageId::Kitty(1), t0, rgb_2x2(&bytes)).unwrap();
        assert!(store.upload(&mut backend));

        store.mark_all_for_unload();
        store.prep_image(ImageId::Kitty(1), t0, rgb_2x2(&bytes)).unwrap();
        let image = store.image(ImageId::Kitty(1)).unwrap();
        assert!(!image.is_unloading());
        assert!(image.is_pending());

        assert!(store.upload(&mut backend));
        assert!(matches!(
            store.image(ImageId::Kitty(1)),
            Some(Image::Ready(texture)) if texture.serial == 2
        ));
    }

    #[test]
    fn test_prep_new_stamp_replaces_texture() {
        let mut store = ImageStore::new();
        let mut backend = MockBackend::default();
        let bytes = [7u8; 12];
        let t0 = Instant::now();
        store.prep_image(ImageId::Kitty(1), t0, rgb_2x2(&bytes)).unwrap();
        assert!(store.upload(&mut backend));

        let t1 = t0 + Duration::from_millis(1);
        store.prep_image(ImageId::Kitty(1), t1, rgb_2x2(&bytes)).unwrap();
        assert!(matches!(
            store.image(ImageId::Kitty(1)),
            Some(Image::Replace { texture, .. }) if texture.serial == 1
        ));

        assert!(store.upload(&mut backend));
        assert!(matches!(
            store.image(ImageId::Kitty(1)),
            Some(Image::Ready(texture)) if texture.serial == 2
        ));
    }

    #[test]
    fn test_prep_invalid_new_image_is_not_inserted() {
        let mut store: ImageStore<MockTexture> = ImageStore::new();
        let short = [0u8; 5];
        let source = PixelSource {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb,
            data: &short,
        };
        let result = store.prep_image(ImageId::Kitty(3), Instant::now(), source);
        assert!(matches!(result, Err(CompositorError::InvalidDimensions { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_prep_invalid_replacement_unloads_existing() {
        let mut store: ImageStore<MockTexture> = ImageStore::new();
        let bytes = [7u8; 12];
        let t0 = Instant::now();
        store.prep_image(ImageId::Kitty(3), t0, rgb_2x2(&bytes)).unwrap();

        let short = [0u8; 5];
        let source = PixelSource {
            width: 2,
            height: 2,
            format: PixelFormat::Rgb,
            data: &short,
        };
        let t1 = t0 + Duration::from_millis(1);
        assert!(store.prep_image(ImageId::Kitty(3), t1, source).is_err());
        assert!(store.image(ImageId::Kitty(3)).unwrap().is_unloading());
    }

    #[test]
    fn test_prep_rejects_images_over_limit() {
        let mut store: ImageStore<MockTexture> = ImageStore::with_limit(15);
        let bytes = [7u8; 12];
        let result = store.prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes));
        assert!(matches!(
            result,
            Err(CompositorError::ImageTooLarge { size: 16, max: 15 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_upload_removes_unloading_entries() {
        let mut store = ImageStore::new();
        let mut backend = MockBackend::default();
        let bytes = [7u8; 12];
        store
            .prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store
            .prep_image(ImageId::Kitty(2), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store.mark_for_unload(ImageId::Kitty(1));

        assert!(store.upload(&mut backend));
        assert!(store.get(ImageId::Kitty(1)).is_none());
        assert!(matches!(store.image(ImageId::Kitty(2)), Some(Image::Ready(_))));
        // Never-uploaded unload entries are not uploaded first.
        assert_eq!(backend.textures_created, 1);
    }

    #[test]
    fn test_upload_failure_keeps_entry_pending() {
        let mut store = ImageStore::new();
        let mut backend = MockBackend {
            fail_textures: true,
            ..MockBackend::default()
        };
        let bytes = [7u8; 12];
        store
            .prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes))
            .unwrap();

        assert!(!store.upload(&mut backend));
        assert!(store.image(ImageId::Kitty(1)).unwrap().is_pending());

        backend.fail_textures = false;
        assert!(store.upload(&mut backend));
        assert!(matches!(store.image(ImageId::Kitty(1)), Some(Image::Ready(_))));
    }

    #[test]
    fn test_unload_missing_kitty_skips_overlay() {
        let mut store: ImageStore<MockTexture> = ImageStore::new();
        let bytes = [7u8; 12];
        store
            .prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store
            .prep_image(ImageId::Kitty(2), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store
            .prep_image(ImageId::Overlay, Instant::now(), rgb_2x2(&bytes))
            .unwrap();

        store.unload_missing_kitty(|id| id == 2);
        assert!(store.image(ImageId::Kitty(1)).unwrap().is_unloading());
        assert!(!store.image(ImageId::Kitty(2)).unwrap().is_unloading());
        assert!(!store.image(ImageId::Overlay).unwrap().is_unloading());
    }

    #[test]
    fn test_stats() {
        let mut store = ImageStore::new();
        let mut backend = MockBackend::default();
        let bytes = [7u8; 12];
        store
            .prep_image(ImageId::Kitty(1), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store.upload(&mut backend);
        store
            .prep_image(ImageId::Kitty(2), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store
            .prep_image(ImageId::Kitty(3), Instant::now(), rgb_2x2(&bytes))
            .unwrap();
        store.mark_for_unload(ImageId::Kitty(3));

        let stats = store.stats();
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.unloading, 1);
        assert_eq!(stats.replacing, 0);
        assert_eq!(stats.pending_bytes, 32);
    }
}
