#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Hierarchical 2x2 image reduction and a tiled reduction effect built on it.
//!
//! Every pass is generic over a [`RenderDevice`]: [`WgpuDevice`] for real
//! GPUs, [`CpuDevice`] for headless tests and tooling.
//!
//! ```rust,ignore
//! use myth_tiling::prelude::*;
//!
//! let device = CpuDevice::new();
//! let mut effect = TilingEffect::new(&device, CpuTileMosaic, TilingSettings::default())?;
//! effect.bind_input(frame.clone())?;
//! effect.bind_output(target.clone())?;
//! effect.apply()?;
//! ```

pub mod backends;
pub mod core;
pub mod errors;
pub mod postprocess;
pub mod settings;
pub mod view;

pub use crate::backends::{CpuDevice, CpuImage, CpuTileMosaic, GpuContext, TileMosaicPass, WgpuDevice, WgpuImage};
pub use crate::core::{GpuImage, ImageDesc, RenderDevice};
pub use crate::errors::{Result, TilingError};
pub use crate::postprocess::{Downsample2x2, DownsamplerNxN, PostProcess, ShadingPass, TileParams, TilingEffect};
pub use crate::settings::{GpuSettings, TilingSettings};
pub use crate::view::{Attachment, FrameBuffer, RenderView, ViewCapabilities, ViewKind, ViewOperation};

pub mod prelude {
    pub use crate::backends::{CpuDevice, CpuTileMosaic, GpuContext, TileMosaicPass, WgpuDevice};
    pub use crate::core::{GpuImage, ImageDesc, RenderDevice};
    pub use crate::errors::{Result, TilingError};
    pub use crate::postprocess::{DownsamplerNxN, PostProcess, ShadingPass, TilingEffect};
    pub use crate::settings::{GpuSettings, TilingSettings};
    pub use crate::view::{Attachment, FrameBuffer, RenderView};
}
