//! Renderer-side image compositing for the Crux terminal emulator.
//!
//! This crate turns the terminal's Kitty graphics state into GPU textures
//! and per-frame draw calls. It handles:
//!
//! - **Image lifecycle**: pending upload, ready, replace and unload states,
//!   deduplicated by transmit stamp
//! - **Pixel normalization**: every supported format is converted to RGBA
//!   before upload
//! - **Placement building**: pinned and virtual (Unicode placeholder)
//!   placements are clipped to the viewport, z-sorted and split into bands
//! - **Drawing**: one quad per placement, band by band
//!
//! # Architecture
//!
//! ```text
//! terminal core (KittySnapshot)
//!     │
//!     ▼
//! ImageCompositor::kitty_update()   ← rebuild placements, prepare images
//!     │
//!     ▼
//! ImageCompositor::upload()         ← create textures, drop unloaded images
//!     │
//!     ▼
//! ImageCompositor::draw(band)       ← one GraphicsBackend draw per placement
//! ```
//!
//! # Threading
//!
//! Everything runs on the render thread, once per frame, in the order
//! above. The compositor holds no locks; the terminal is responsible for
//! keeping its snapshot consistent while it is read.

pub mod backend;
pub mod compositor;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod image;
pub mod placements;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export primary types for convenience.
pub use backend::{DrawMode, DrawStep, GraphicsBackend, ImageVertex};
pub use compositor::ImageCompositor;
pub use error::{BackendError, CompositorError};
pub use image::Image;
pub use placements::{PlacementList, BG_LIMIT, VIRTUAL_Z};
pub use snapshot::{
    KittyImage, KittySnapshot, PlaceholderRun, PlacementLocation, SnapshotPlacement, Viewport,
};
pub use store::{ImageStore, StoreStats};
pub use types::{Band, CellSize, ImageId, PendingData, PixelFormat, PixelSource, Placement};

pub use crux_config::GraphicsConfig;
