//! Post-processing passes.
//!
//! Every pass implements [`PostProcess`]: one input image, one output image,
//! and an `apply` that records (or, on the CPU backend, performs) its work.
//!
//! - [`Downsample2x2`]: a single 2x2 box reduction
//! - [`DownsamplerNxN`]: `N` chained reductions owning `N - 1` intermediates
//! - [`TilingEffect`]: the chain fixed at the tile size plus a final
//!   [`ShadingPass`] over the reduced image

pub mod downsampler;
pub mod tiling;

pub use downsampler::{Downsample2x2, DownsamplerNxN};
pub use tiling::{ShadingPass, TileParams, TilingEffect};

use crate::core::RenderDevice;
use crate::errors::Result;

/// A pass with one input pin and one output pin.
///
/// # Design principles
/// - Binding may allocate (through the pass's device handle); `apply` never does
/// - `apply` fails without doing any work when an endpoint is unbound
/// - Bound images are shared handles; the pass never frees caller images
pub trait PostProcess<D: RenderDevice> {
    /// Returns the pass name, used in errors and logs.
    fn name(&self) -> &str;

    fn bind_input(&mut self, image: D::Image) -> Result<()>;

    fn input(&self) -> Option<&D::Image>;

    fn bind_output(&mut self, image: D::Image) -> Result<()>;

    fn output(&self) -> Option<&D::Image>;

    /// Runs the pass to completion.
    fn apply(&mut self) -> Result<()>;
}
