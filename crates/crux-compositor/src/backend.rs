//! Graphics backend seam.
//!
//! The compositor never talks to a GPU API directly. A renderer implements
//! [`GraphicsBackend`] for its device (Metal, wgpu, ...) and the compositor
//! treats textures, buffers and pipelines as opaque handles.

use bytemuck::{Pod, Zeroable};

use crate::error::BackendError;
use crate::types::Placement;

/// Primitive topology for a draw step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    TriangleStrip,
}

/// Per-placement vertex data for the image shader.
///
/// One value describes one quad; the shader expands it into the four
/// corners of a triangle strip.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ImageVertex {
    /// Grid column and viewport-relative row of the top-left cell.
    pub grid_pos: [f32; 2],
    /// Pixel offset inside the top-left cell.
    pub cell_offset: [f32; 2],
    /// Source rectangle in image pixels: x, y, width, height.
    pub source_rect: [f32; 4],
    /// Destination size in pixels.
    pub dest_size: [f32; 2],
}

impl From<&Placement> for ImageVertex {
    fn from(p: &Placement) -> Self {
        Self {
            grid_pos: [p.x as f32, p.y as f32],
            cell_offset: [p.cell_offset_x as f32, p.cell_offset_y as f32],
            source_rect: [
                p.source_x as f32,
                p.source_y as f32,
                p.source_width as f32,
                p.source_height as f32,
            ],
            dest_size: [p.width as f32, p.height as f32],
        }
    }
}

/// One draw call: a pipeline, a vertex buffer and the texture to sample.
pub struct DrawStep<'a, B: GraphicsBackend + ?Sized> {
    pub pipeline: &'a B::Pipeline,
    /// Ownership passes to the backend, which keeps it alive until the pass
    /// is submitted.
    pub buffer: B::Buffer,
    pub texture: &'a B::Texture,
    pub mode: DrawMode,
    pub vertex_count: u32,
}

/// Device operations the compositor needs from a renderer.
pub trait GraphicsBackend {
    type Texture;
    type Buffer;
    type Pipeline;
    type RenderPass;

    /// Create a texture from tightly packed 8-bit RGBA pixels.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Self::Texture, BackendError>;

    /// Create a vertex buffer holding `bytes`.
    fn create_vertex_buffer(&mut self, bytes: &[u8]) -> Result<Self::Buffer, BackendError>;

    /// Record one draw into `pass`.
    fn draw_step(&mut self, pass: &mut Self::RenderPass, step: DrawStep<'_, Self>);
}
