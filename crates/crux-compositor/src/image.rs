//! Image lifecycle state machine.
//!
//! An [`Image`] owns either pixel bytes awaiting upload, a backend texture,
//! or both while a replacement is in flight. Each state has an "unload"
//! twin that carries the same payload and marks the image for removal on
//! the next upload pass.
//!
//! ```text
//!   Pending ──upload──▶ Ready ──replace──▶ Replace ──upload──▶ Ready
//!      │                  │                   │
//!   unload             unload              unload
//!      ▼                  ▼                   ▼
//! UnloadPending      UnloadReady        UnloadReplace
//! ```
//!
//! Dropping an `Image` releases exactly the payload its current state owns.

use std::mem;

use crate::backend::GraphicsBackend;
use crate::convert;
use crate::error::CompositorError;
use crate::types::{PendingData, PixelFormat};

/// Lifecycle state of one image, generic over the backend texture type.
#[derive(Debug)]
pub enum Image<T> {
    /// Bytes awaiting upload.
    Pending(PendingData),
    /// A live texture plus new bytes that supersede it once uploaded.
    Replace { texture: T, pending: PendingData },
    /// Uploaded and drawable.
    Ready(T),
    UnloadPending(PendingData),
    UnloadReady(T),
    UnloadReplace { texture: T, pending: PendingData },
}

impl<T> Image<T> {
    /// Flag the image for removal, keeping its payload. Idempotent.
    pub fn mark_for_unload(&mut self) {
        self.transition(|image| match image {
            Image::Pending(p) => Image::UnloadPending(p),
            Image::Replace { texture, pending } => Image::UnloadReplace { texture, pending },
            Image::Ready(t) => Image::UnloadReady(t),
            unloading => unloading,
        });
    }

    /// Supersede the current content with `pending`.
    ///
    /// Stale pending bytes are dropped. A live texture is kept alongside the
    /// new bytes and released once they upload; the image is not drawable
    /// in between. Replacing also clears any unload flag.
    pub fn mark_for_replace(&mut self, pending: PendingData) {
        self.transition(|image| match image {
            Image::Pending(_) | Image::UnloadPending(_) => Image::Pending(pending),
            Image::Replace { texture, .. }
            | Image::UnloadReplace { texture, .. }
            | Image::Ready(texture)
            | Image::UnloadReady(texture) => Image::Replace { texture, pending },
        });
    }

    /// Normalize pending bytes to RGBA in place.
    ///
    /// No-op when already RGBA or when there are no pending bytes, so it is
    /// safe to call repeatedly.
    pub fn prep_for_upload(&mut self) -> Result<(), CompositorError> {
        let Some(pending) = self.pending_mut() else {
            return Ok(());
        };
        if pending.format == PixelFormat::Rgba {
            return Ok(());
        }

        let rgba = convert::to_rgba(pending.format, &pending.data)?;
        pending.data = rgba;
        pending.format = PixelFormat::Rgba;
        Ok(())
    }

    /// Upload pending bytes and become drawable.
    ///
    /// On success the bytes, and the superseded texture of a replace, are
    /// dropped. On failure the image is left untouched so the next frame
    /// can retry. Calling this on an image without pending bytes does
    /// nothing.
    pub fn upload<B>(&mut self, backend: &mut B) -> Result<(), CompositorError>
    where
        B: GraphicsBackend<Texture = T> + ?Sized,
    {
        self.prep_for_upload()?;
        let Some(pending) = self.pending() else {
            log::warn!("upload called on an image with no pending data");
            return Ok(());
        };

        let texture = backend
            .create_texture(pending.width, pending.height, &pending.data)
            .map_err(CompositorError::UploadFailed)?;

        let unloading = self.is_unloading();
        *self = if unloading {
            Image::UnloadReady(texture)
        } else {
            Image::Ready(texture)
        };
        Ok(())
    }

    /// True if the image owns bytes awaiting upload.
    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// True if the image owns a texture, drawable or being replaced.
    pub fn has_texture(&self) -> bool {
        !matches!(self, Image::Pending(_) | Image::UnloadPending(_))
    }

    pub fn is_unloading(&self) -> bool {
        matches!(
            self,
            Image::UnloadPending(_) | Image::UnloadReady(_) | Image::UnloadReplace { .. }
        )
    }

    /// The texture to sample when drawing, if the image is drawable.
    pub fn drawable_texture(&self) -> Option<&T> {
        match self {
            Image::Ready(t) | Image::UnloadReady(t) => Some(t),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingData> {
        match self {
            Image::Pending(p)
            | Image::UnloadPending(p)
            | Image::Replace { pending: p, .. }
            | Image::UnloadReplace { pending: p, .. } => Some(p),
            Image::Ready(_) | Image::UnloadReady(_) => None,
        }
    }

    fn pending_mut(&mut self) -> Option<&mut PendingData> {
        match self {
            Image::Pending(p)
            | Image::UnloadPending(p)
            | Image::Replace { pending: p, .. }
            | Image::UnloadReplace { pending: p, .. } => Some(p),
            Image::Ready(_) | Image::UnloadReady(_) => None,
        }
    }

    /// Move the current state through `f`. The placeholder left behind
    /// while `f` runs owns no allocation.
    fn transition(&mut self, f: impl FnOnce(Self) -> Self) {
        let current = mem::replace(self, Image::Pending(PendingData::empty()));
        *self = f(current);
    }
}

impl PendingData {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Rgba,
            data: Vec::new(),
        }
    }
}
