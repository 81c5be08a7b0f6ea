//! Per-frame placement list with z-ordering and band partitioning.
//!
//! The list is rebuilt from scratch every frame that needs it, then
//! stable-sorted by `(z, image id)` and split into three contiguous bands
//! by two indices:
//!
//! ```text
//! [0, bg_end)          below the cell backgrounds   (z < BG_LIMIT)
//! [bg_end, text_end)   below text                   (BG_LIMIT <= z < 0)
//! [text_end, len)      above text                   (z >= 0)
//! ```

use crate::error::CompositorError;
use crate::types::{Band, Placement};

/// Placements with a z below this draw under cell backgrounds.
pub const BG_LIMIT: i32 = i32::MIN / 2;

/// z assigned to every virtual placement: just under text, above other
/// negative-z images.
pub const VIRTUAL_Z: i32 = -1;

/// Sorted, banded placements for one frame.
#[derive(Debug, Default)]
pub struct PlacementList {
    placements: Vec<Placement>,
    bg_end: usize,
    text_end: usize,
    /// True if the last build saw any virtual placement.
    has_virtual: bool,
}

impl PlacementList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: drop all placements and reset the virtual flag.
    pub fn clear(&mut self) {
        self.placements.clear();
        self.bg_end = 0;
        self.text_end = 0;
        self.has_virtual = false;
    }

    /// Append a placement. Allocation failure is reported, not aborted on.
    pub fn push(&mut self, placement: Placement) -> Result<(), CompositorError> {
        self.placements.try_reserve(1).map_err(|_| CompositorError::OutOfMemory {
            bytes: std::mem::size_of::<Placement>() * (self.placements.len() + 1),
        })?;
        self.placements.push(placement);
        Ok(())
    }

    pub fn set_has_virtual(&mut self) {
        self.has_virtual = true;
    }

    pub fn has_virtual(&self) -> bool {
        self.has_virtual
    }

    /// Sort and compute the band boundaries. Call once after all pushes.
    pub fn finish(&mut self) {
        sort_placements(&mut self.placements);
        let (bg_end, text_end) = band_bounds(&self.placements);
        self.bg_end = bg_end;
        self.text_end = text_end;
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Placements of one band. The overlay band is never part of this list.
    pub fn band(&self, band: Band) -> &[Placement] {
        match band {
            Band::BelowBackground => &self.placements[..self.bg_end],
            Band::BelowText => &self.placements[self.bg_end..self.text_end],
            Band::AboveText => &self.placements[self.text_end..],
            Band::Overlay => &[],
        }
    }

    /// Band boundaries as `(bg_end, text_end)`.
    pub fn bounds(&self) -> (usize, usize) {
        (self.bg_end, self.text_end)
    }
}

/// Stable sort by z ascending, ties broken by [`ImageId::draws_before`].
///
/// [`ImageId::draws_before`]: crate::types::ImageId::draws_before
pub fn sort_placements(placements: &mut [Placement]) {
    placements.sort_by(|a, b| a.z.cmp(&b.z).then_with(|| a.image_id.draw_order(b.image_id)));
}

/// Band boundaries `(bg_end, text_end)` of a z-sorted slice.
///
/// `bg_end` is the first index with `z >= BG_LIMIT` and `text_end` the first
/// with `z >= 0`; either defaults to the slice length.
pub fn band_bounds(sorted: &[Placement]) -> (usize, usize) {
    let len = sorted.len();
    let bg_end = sorted.iter().position(|p| p.z >= BG_LIMIT).unwrap_or(len);
    let text_end = sorted.iter().position(|p| p.z >= 0).unwrap_or(len);
    (bg_end, text_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageId;

    fn at(image_id: ImageId, z: i32) -> Placement {
        Placement {
            image_id,
            x: 0,
            y: 0,
            z,
            width: 1,
            height: 1,
            cell_offset_x: 0,
            cell_offset_y: 0,
            source_x: 0,
            source_y: 0,
            source_width: 1,
            source_height: 1,
        }
    }

    fn zs(placements: &[Placement]) -> Vec<i32> {
        placements.iter().map(|p| p.z).collect()
    }

    #[test]
    fn test_sort_kitty_before_overlay_at_equal_z() {
        let mut list = vec![at(ImageId::Overlay, 3), at(ImageId::Kitty(5), 3)];
        sort_placements(&mut list);
        assert_eq!(list[0].image_id, ImageId::Kitty(5));
        assert_eq!(list[1].image_id, ImageId::Overlay);
    }

    #[test]
    fn test_sort_kitty_ids_ascending_at_equal_z() {
        let mut list = vec![at(ImageId::Kitty(9), 3), at(ImageId::Kitty(2), 3)];
        sort_placements(&mut list);
        assert_eq!(list[0].image_id, ImageId::Kitty(2));
        assert_eq!(list[1].image_id, ImageId::Kitty(9));
    }

    #[test]
    fn test_sort_is_stable_for_same_image() {
        let mut first = at(ImageId::Kitty(1), 0);
        first.x = 1;
        let mut second = at(ImageId::Kitty(1), 0);
        second.x = 2;
        let mut list = vec![first, at(ImageId::Kitty(0), 5), second];
        sort_placements(&mut list);
        assert_eq!(list[0].x, 1);
        assert_eq!(list[1].x, 2);
        assert_eq!(list[2].z, 5);
    }

    #[test]
    fn test_sort_by_z_first() {
        let mut list = vec![
            at(ImageId::Kitty(1), 10),
            at(ImageId::Kitty(9), -5),
            at(ImageId::Kitty(3), 0),
        ];
        sort_placements(&mut list);
        assert_eq!(zs(&list), vec![-5, 0, 10]);
    }

    #[test]
    fn test_band_bounds_with_background_band() {
        let list: Vec<_> = [i32::MIN, -50, 0, 7]
            .into_iter()
            .map(|z| at(ImageId::Kitty(1), z))
            .collect();
        assert_eq!(band_bounds(&list), (1, 2));
    }

    #[test]
    fn test_band_bounds_moderate_negative_is_below_text() {
        // -100000 is well above BG_LIMIT, so nothing is below the background.
        let list: Vec<_> = [-100_000, -50, 0, 7]
            .into_iter()
            .map(|z| at(ImageId::Kitty(1), z))
            .collect();
        assert_eq!(band_bounds(&list), (0, 2));
    }

    #[test]
    fn test_band_bounds_defaults_to_len() {
        let below: Vec<_> = [i32::MIN, BG_LIMIT - 1]
            .into_iter()
            .map(|z| at(ImageId::Kitty(1), z))
            .collect();
        assert_eq!(band_bounds(&below), (2, 2));

        let under_text: Vec<_> = [-3, -1].into_iter().map(|z| at(ImageId::Kitty(1), z)).collect();
        assert_eq!(band_bounds(&under_text), (0, 2));

        assert_eq!(band_bounds(&[]), (0, 0));
    }

    #[test]
    fn test_list_bands() {
        let mut list = PlacementList::new();
        for z in [7, 0, i32::MIN, -50] {
            list.push(at(ImageId::Kitty(1), z)).unwrap();
        }
        list.finish();

        assert_eq!(zs(list.band(Band::BelowBackground)), vec![i32::MIN]);
        assert_eq!(zs(list.band(Band::BelowText)), vec![-50]);
        assert_eq!(zs(list.band(Band::AboveText)), vec![0, 7]);
        assert!(list.band(Band::Overlay).is_empty());
    }

    #[test]
    fn test_clear_resets_virtual_flag() {
        let mut list = PlacementList::new();
        list.set_has_virtual();
        list.push(at(ImageId::Kitty(1), 0)).unwrap();
        list.finish();
        assert!(list.has_virtual());

        list.clear();
        assert!(!list.has_virtual());
        assert!(list.is_empty());
        assert_eq!(list.bounds(), (0, 0));
    }
}
