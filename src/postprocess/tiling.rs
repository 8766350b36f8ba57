//! Tiled Reduction Post-Processing Effect
//!
//! Reduces the frame to one texel per `tile_size x tile_size` block and hands
//! the reduced image to a [`ShadingPass`] that composes it into the frame
//! target.
//!
//! # Algorithm
//!
//! 1. **Reduce**: a [`DownsamplerNxN`] with `log2(tile_size)` stages writes
//!    into an effect-owned image of `(src_w / tile, src_h / tile)`.
//! 2. **Parameterize**: [`TileParams`] is recomputed from the frame target's
//!    current size before every run.
//! 3. **Shade**: the shading pass reads the reduced image and writes the
//!    frame target.
//!
//! # Data Flow
//!
//! ```text
//! source ──▶ DownsamplerNxN ──▶ reduced ──▶ ShadingPass ──▶ target
//!                                              ▲
//!                        TileParams(target) ───┘
//! ```

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::warn;

use super::{DownsamplerNxN, PostProcess};
use crate::core::image::ensure_usage;
use crate::core::{GpuImage, ImageDesc, RenderDevice};
use crate::errors::{Endpoint, Result, TilingError};
use crate::settings::TilingSettings;

/// Per-frame vector consumed by the shading pass.
///
/// `tile_per_row_line = (tile / target_w, tile / target_h, tile, 1 / tile)`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct TileParams {
    pub tile_per_row_line: [f32; 4],
}

impl TileParams {
    #[must_use]
    pub fn new(tile_size: u32, (target_width, target_height): (u32, u32)) -> Self {
        let tile = tile_size as f32;
        Self {
            tile_per_row_line: [
                tile / target_width as f32,
                tile / target_height as f32,
                tile,
                1.0 / tile,
            ],
        }
    }

    #[inline]
    #[must_use]
    pub fn tile_size(&self) -> f32 {
        self.tile_per_row_line[2]
    }

    #[inline]
    #[must_use]
    pub fn inv_tile_size(&self) -> f32 {
        self.tile_per_row_line[3]
    }

    #[inline]
    #[must_use]
    pub fn as_vec4(&self) -> Vec4 {
        Vec4::from_array(self.tile_per_row_line)
    }
}

/// The final composition step run over the reduced image.
///
/// Implementations are backend specific; see
/// [`TileMosaicPass`](crate::backends::gpu::TileMosaicPass) and
/// [`CpuTileMosaic`](crate::backends::cpu::CpuTileMosaic).
pub trait ShadingPass<D: RenderDevice> {
    fn name(&self) -> &str;

    /// Shades `target` from the reduced `input`.
    fn apply(
        &mut self,
        device: &D,
        input: &D::Image,
        target: &D::Image,
        params: &TileParams,
    ) -> Result<()>;
}

/// Hierarchical tile reduction followed by a shading pass.
pub struct TilingEffect<D: RenderDevice, S: ShadingPass<D>> {
    device: D,
    settings: TilingSettings,
    downsampler: DownsamplerNxN<D>,
    shading: S,
    /// Effect-owned destination of the reduction chain.
    reduced: Option<D::Image>,
    /// Frame target the shading pass writes.
    target: Option<D::Image>,
    params: TileParams,
}

impl<D: RenderDevice, S: ShadingPass<D>> TilingEffect<D, S> {
    pub fn new(device: &D, shading: S, settings: TilingSettings) -> Result<Self> {
        settings.validate()?;
        let downsampler =
            DownsamplerNxN::with_label(device, settings.log2_tile_size as usize, settings.label)?;

        Ok(Self {
            device: device.clone(),
            settings,
            downsampler,
            shading,
            reduced: None,
            target: None,
            params: TileParams::default(),
        })
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &TilingSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.settings.tile_size()
    }

    #[inline]
    #[must_use]
    pub fn downsampler(&self) -> &DownsamplerNxN<D> {
        &self.downsampler
    }

    /// The reduced image the chain writes and the shading pass reads.
    #[inline]
    #[must_use]
    pub fn reduced(&self) -> Option<&D::Image> {
        self.reduced.as_ref()
    }

    /// Parameters computed for the most recent [`apply`](PostProcess::apply).
    #[inline]
    #[must_use]
    pub fn params(&self) -> TileParams {
        self.params
    }

    /// Extent of the reduced image for a source of `(width, height)`.
    fn reduced_extent(&self, (width, height): (u32, u32)) -> (u32, u32) {
        let tile = self.tile_size();
        let extent = (width / tile, height / tile);
        if extent.0 == 0 || extent.1 == 0 {
            warn!(
                "{}: source {width}x{height} is smaller than one {tile}px tile, clamping",
                self.settings.label
            );
        }
        (extent.0.max(1), extent.1.max(1))
    }
}

impl<D: RenderDevice, S: ShadingPass<D>> PostProcess<D> for TilingEffect<D, S> {
    fn name(&self) -> &str {
        self.settings.label
    }

    fn bind_input(&mut self, image: D::Image) -> Result<()> {
        let (width, height) = self.reduced_extent(image.size());
        let format = image.format();

        let reduced = match &self.reduced {
            Some(current) if current.size() == (width, height) && current.format() == format => {
                current.clone()
            }
            _ => self.device.allocate_image(&ImageDesc::render_target(
                width,
                height,
                format,
                self.settings.label,
            ))?,
        };

        self.downsampler.bind_input(image)?;
        self.downsampler.bind_output(reduced.clone())?;
        self.reduced = Some(reduced);
        Ok(())
    }

    fn input(&self) -> Option<&D::Image> {
        self.downsampler.input()
    }

    fn bind_output(&mut self, image: D::Image) -> Result<()> {
        ensure_usage(&image, wgpu::TextureUsages::RENDER_ATTACHMENT, "frame target")?;
        self.target = Some(image);
        Ok(())
    }

    fn output(&self) -> Option<&D::Image> {
        self.target.as_ref()
    }

    fn apply(&mut self) -> Result<()> {
        if self.downsampler.input().is_none() {
            return Err(TilingError::unbound(self.name(), Endpoint::Input));
        }
        let Some(reduced) = self.reduced.as_ref() else {
            return Err(TilingError::unbound(self.name(), Endpoint::Input));
        };
        let Some(target) = self.target.as_ref() else {
            return Err(TilingError::unbound(self.name(), Endpoint::Output));
        };

        self.params = TileParams::new(self.settings.tile_size(), target.size());

        self.downsampler.apply()?;
        self.shading.apply(&self.device, reduced, target, &self.params)
    }
}
