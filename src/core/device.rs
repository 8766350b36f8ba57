//! Render device abstraction.
//!
//! A [`RenderDevice`] is the explicit device handle every component receives
//! at construction. It is the only way the crate touches GPU memory:
//!
//! ```text
//! DownsamplerNxN ──allocate_image──▶ RenderDevice ◀──clear_*── RenderView
//!        │                               ▲
//!        └────────downsample_2x2─────────┘
//! ```
//!
//! Handles are cheap to clone and all clones drive the same device.

use super::image::{GpuImage, ImageDesc};
use crate::errors::Result;

pub trait RenderDevice: Clone {
    /// Shared handle to an image owned by this device.
    type Image: GpuImage + Clone;

    /// Short backend name used in log output.
    fn backend_name(&self) -> &'static str;

    /// Allocates an image. Failures are reported, never retried.
    fn allocate_image(&self, desc: &ImageDesc) -> Result<Self::Image>;

    /// Writes the 2x2 box average of `src` into `dst`.
    ///
    /// Destination texel `(x, y)` is the mean of source texels
    /// `(2x + dx, 2y + dy)` for `dx, dy` in `{0, 1}`, each coordinate clamped
    /// to the source's last column/row. The call is complete, from the
    /// caller's point of view, before any later call on the same device.
    fn downsample_2x2(&self, src: &Self::Image, dst: &Self::Image) -> Result<()>;

    /// Fills a color target with `color`.
    fn clear_color(&self, target: &Self::Image, color: wgpu::Color) -> Result<()>;

    /// Clears the depth and/or stencil aspects of a depth-stencil target.
    /// `None` leaves that aspect untouched.
    fn clear_depth_stencil(
        &self,
        target: &Self::Image,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<()>;
}
