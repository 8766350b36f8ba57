//! Hierarchical 2x2 Downsampler
//!
//! Reduces a source image by `2^N` through `N` sequential 2x2 box filters.
//!
//! # Data Flow
//!
//! ```text
//! source ─▶ stage 0 ─▶ tex 0 ─▶ stage 1 ─▶ tex 1 ─▶ … ─▶ stage N-1 ─▶ output
//!   (caller)             (owned)              (owned)                (caller)
//! ```
//!
//! Stages live in a small inline arena indexed `0..N`, intermediates in a
//! `Vec` indexed `0..N-1`. Intermediate `i` is written by stage `i` and read
//! by stage `i + 1`, so stages always run strictly in index order.
//!
//! # Rebinding
//!
//! Intermediates are keyed by the source extent and format. Binding a source
//! with the same key reuses them; anything else drops and reallocates the
//! whole set, invalidating handles previously returned by
//! [`DownsamplerNxN::intermediates`].

use log::{debug, trace, warn};
use smallvec::SmallVec;

use super::PostProcess;
use crate::core::image::ensure_usage;
use crate::core::{GpuImage, ImageDesc, RenderDevice, downsample_chain_extents};
use crate::errors::{Endpoint, Result, TilingError};

/// Stage arena stays inline up to this many stages (16x reduction).
const INLINE_STAGES: usize = 4;

// ─── Single Stage ─────────────────────────────────────────────────────────────

/// One 2x2 box reduction from `input` into `output`.
pub struct Downsample2x2<D: RenderDevice> {
    device: D,
    input: Option<D::Image>,
    output: Option<D::Image>,
}

impl<D: RenderDevice> Downsample2x2<D> {
    #[must_use]
    pub fn new(device: &D) -> Self {
        Self {
            device: device.clone(),
            input: None,
            output: None,
        }
    }
}

impl<D: RenderDevice> PostProcess<D> for Downsample2x2<D> {
    fn name(&self) -> &str {
        "Downsample 2x2"
    }

    fn bind_input(&mut self, image: D::Image) -> Result<()> {
        self.input = Some(image);
        Ok(())
    }

    fn input(&self) -> Option<&D::Image> {
        self.input.as_ref()
    }

    fn bind_output(&mut self, image: D::Image) -> Result<()> {
        self.output = Some(image);
        Ok(())
    }

    fn output(&self) -> Option<&D::Image> {
        self.output.as_ref()
    }

    fn apply(&mut self) -> Result<()> {
        let src = self
            .input
            .as_ref()
            .ok_or_else(|| TilingError::unbound(self.name(), Endpoint::Input))?;
        let dst = self
            .output
            .as_ref()
            .ok_or_else(|| TilingError::unbound(self.name(), Endpoint::Output))?;

        if src.id() == dst.id() {
            return Err(TilingError::Configuration(format!(
                "{}: input and output are the same image #{}",
                self.name(),
                src.id()
            )));
        }
        ensure_usage(src, wgpu::TextureUsages::TEXTURE_BINDING, "downsample source")?;
        ensure_usage(dst, wgpu::TextureUsages::RENDER_ATTACHMENT, "downsample target")?;

        self.device.downsample_2x2(src, dst)
    }
}

// ─── N-Stage Chain ────────────────────────────────────────────────────────────

/// `N` chained [`Downsample2x2`] stages plus the `N - 1` images between them.
pub struct DownsamplerNxN<D: RenderDevice> {
    device: D,
    stages: SmallVec<[Downsample2x2<D>; INLINE_STAGES]>,
    intermediates: Vec<D::Image>,
    /// Source extent and format the current intermediates were sized for.
    intermediate_key: Option<((u32, u32), wgpu::TextureFormat)>,
    label: &'static str,
}

impl<D: RenderDevice> DownsamplerNxN<D> {
    /// Configures a chain of `stage_count` stages.
    ///
    /// No image is allocated until [`bind_input`](PostProcess::bind_input).
    pub fn new(device: &D, stage_count: usize) -> Result<Self> {
        Self::with_label(device, stage_count, "Downsample Intermediate")
    }

    /// Like [`new`](Self::new), tagging intermediates with `label`.
    pub fn with_label(device: &D, stage_count: usize, label: &'static str) -> Result<Self> {
        if stage_count < 1 {
            return Err(TilingError::Configuration(
                "downsampler needs at least one stage".to_string(),
            ));
        }

        Ok(Self {
            device: device.clone(),
            stages: (0..stage_count).map(|_| Downsample2x2::new(device)).collect(),
            intermediates: Vec::with_capacity(stage_count - 1),
            intermediate_key: None,
            label,
        })
    }

    #[inline]
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    #[must_use]
    pub fn stages(&self) -> &[Downsample2x2<D>] {
        &self.stages
    }

    /// Images owned by the chain, in production order.
    #[inline]
    #[must_use]
    pub fn intermediates(&self) -> &[D::Image] {
        &self.intermediates
    }

    #[must_use]
    pub fn intermediate_extents(&self) -> Vec<(u32, u32)> {
        self.intermediates.iter().map(GpuImage::size).collect()
    }

    /// Extent the last stage produces from the bound input.
    #[must_use]
    pub fn output_extent(&self) -> Option<(u32, u32)> {
        let source = self.input()?;
        downsample_chain_extents(source.size(), self.stage_count())
            .last()
            .copied()
    }

    fn last_index(&self) -> usize {
        self.stages.len() - 1
    }

    fn ensure_intermediates(&mut self, source: &D::Image) -> Result<()> {
        let key = (source.size(), source.format());
        if self.intermediate_key == Some(key) {
            return Ok(());
        }

        let extents = downsample_chain_extents(key.0, self.stage_count());
        let mut fresh = Vec::with_capacity(self.stage_count() - 1);
        for &(width, height) in &extents[..self.last_index()] {
            let desc = ImageDesc::render_target(width, height, key.1, self.label);
            fresh.push(self.device.allocate_image(&desc)?);
        }

        debug!(
            "[{}] allocated {} intermediates for {}x{} {:?}: {:?}",
            self.device.backend_name(),
            fresh.len(),
            key.0.0,
            key.0.1,
            key.1,
            &extents[..self.last_index()]
        );

        self.intermediates = fresh;
        self.intermediate_key = Some(key);
        Ok(())
    }
}

impl<D: RenderDevice> PostProcess<D> for DownsamplerNxN<D> {
    fn name(&self) -> &str {
        "Downsample NxN"
    }

    /// Sizes the intermediates from `image` and wires every stage except the
    /// last stage's output.
    fn bind_input(&mut self, image: D::Image) -> Result<()> {
        self.ensure_intermediates(&image)?;

        let last = self.last_index();
        for (i, stage) in self.stages.iter_mut().enumerate() {
            let input = if i == 0 {
                image.clone()
            } else {
                self.intermediates[i - 1].clone()
            };
            stage.bind_input(input)?;
            if i < last {
                stage.bind_output(self.intermediates[i].clone())?;
            }
        }
        Ok(())
    }

    fn input(&self) -> Option<&D::Image> {
        self.stages[0].input()
    }

    fn bind_output(&mut self, image: D::Image) -> Result<()> {
        if self.input().is_none() {
            return Err(TilingError::Configuration(format!(
                "{}: bind_output called before bind_input",
                self.name()
            )));
        }
        ensure_usage(&image, wgpu::TextureUsages::RENDER_ATTACHMENT, "downsample output")?;
        if let Some(expected) = self.output_extent().filter(|&e| e != image.size()) {
            warn!(
                "{}: output is {}x{}, the chain produces {}x{}",
                self.label,
                image.width(),
                image.height(),
                expected.0,
                expected.1
            );
        }
        let last = self.last_index();
        self.stages[last].bind_output(image)
    }

    fn output(&self) -> Option<&D::Image> {
        self.stages[self.last_index()].output()
    }

    fn apply(&mut self) -> Result<()> {
        if self.input().is_none() {
            return Err(TilingError::unbound(self.name(), Endpoint::Input));
        }
        if self.output().is_none() {
            return Err(TilingError::unbound(self.name(), Endpoint::Output));
        }

        for (i, stage) in self.stages.iter_mut().enumerate() {
            trace!("{}: stage {i}", self.label);
            stage.apply()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::cpu::{CpuDevice, DispatchKind};

    const FMT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    fn source(device: &CpuDevice, width: u32, height: u32) -> crate::backends::cpu::CpuImage {
        device
            .allocate_image(&ImageDesc::render_target(width, height, FMT, "source"))
            .unwrap()
    }

    #[test]
    fn zero_stages_is_a_configuration_error() {
        let device = CpuDevice::new();
        assert!(matches!(
            DownsamplerNxN::new(&device, 0),
            Err(TilingError::Configuration(_))
        ));
    }

    #[test]
    fn single_stage_has_no_intermediates() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 1).unwrap();
        let src = source(&device, 8, 8);
        chain.bind_input(src.clone()).unwrap();

        assert!(chain.intermediates().is_empty());
        assert_eq!(chain.input().map(GpuImage::id), Some(src.id()));
        assert!(chain.output().is_none());
        assert_eq!(chain.output_extent(), Some((4, 4)));
    }

    #[test]
    fn stages_are_wired_through_intermediates() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 3).unwrap();
        let src = source(&device, 64, 32);
        chain.bind_input(src.clone()).unwrap();

        let mids = chain.intermediates().to_vec();
        assert_eq!(mids.len(), 2);

        let stages = chain.stages();
        assert_eq!(stages[0].input().unwrap().id(), src.id());
        assert_eq!(stages[0].output().unwrap().id(), mids[0].id());
        assert_eq!(stages[1].input().unwrap().id(), mids[0].id());
        assert_eq!(stages[1].output().unwrap().id(), mids[1].id());
        assert_eq!(stages[2].input().unwrap().id(), mids[1].id());
        assert!(stages[2].output().is_none());
    }

    #[test]
    fn intermediates_inherit_source_format() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 4).unwrap();
        chain.bind_input(source(&device, 100, 60)).unwrap();
        assert!(chain.intermediates().iter().all(|img| img.format() == FMT));
    }

    #[test]
    fn rebinding_same_extent_reuses_intermediates() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 3).unwrap();
        chain.bind_input(source(&device, 32, 32)).unwrap();
        let first: Vec<u64> = chain.intermediates().iter().map(GpuImage::id).collect();

        chain.bind_input(source(&device, 32, 32)).unwrap();
        let second: Vec<u64> = chain.intermediates().iter().map(GpuImage::id).collect();
        assert_eq!(first, second);

        chain.bind_input(source(&device, 64, 32)).unwrap();
        let third: Vec<u64> = chain.intermediates().iter().map(GpuImage::id).collect();
        assert!(first.iter().all(|id| !third.contains(id)));
        assert_eq!(chain.intermediate_extents(), vec![(32, 16), (16, 8)]);
    }

    #[test]
    fn apply_without_output_dispatches_nothing() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 2).unwrap();
        chain.bind_input(source(&device, 16, 16)).unwrap();

        let err = chain.apply().unwrap_err();
        assert!(matches!(
            err,
            TilingError::UnboundEndpoint {
                endpoint: Endpoint::Output,
                ..
            }
        ));
        assert!(device.dispatch_log().is_empty());
    }

    #[test]
    fn output_without_render_usage_is_rejected_at_bind() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 4).unwrap();
        chain.bind_input(source(&device, 256, 256)).unwrap();

        let sampled_only = device
            .allocate_image(&ImageDesc {
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                ..ImageDesc::render_target(16, 16, FMT, "sampled")
            })
            .unwrap();
        assert!(matches!(
            chain.bind_output(sampled_only),
            Err(TilingError::Configuration(_))
        ));
        assert!(chain.output().is_none());

        assert!(matches!(
            chain.apply(),
            Err(TilingError::UnboundEndpoint {
                endpoint: Endpoint::Output,
                ..
            })
        ));
        assert!(device.dispatch_log().is_empty());
    }

    #[test]
    fn mismatched_output_extent_is_still_bound() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 2).unwrap();
        chain.bind_input(source(&device, 64, 64)).unwrap();
        let dst = source(&device, 8, 8);
        chain.bind_output(dst.clone()).unwrap();
        assert_eq!(chain.output_extent(), Some((16, 16)));
        assert_eq!(chain.output().map(GpuImage::id), Some(dst.id()));
    }

    #[test]
    fn stages_dispatch_in_index_order() {
        let device = CpuDevice::new();
        let mut chain = DownsamplerNxN::new(&device, 4).unwrap();
        let src = source(&device, 256, 256);
        let dst = source(&device, 16, 16);
        chain.bind_input(src.clone()).unwrap();
        chain.bind_output(dst.clone()).unwrap();
        chain.apply().unwrap();

        let log = device.dispatch_log();
        assert_eq!(log.len(), 4);
        assert!(log.windows(2).all(|w| w[0].sequence < w[1].sequence));

        let mut expected_src = src.id();
        for (i, entry) in log.iter().enumerate() {
            let DispatchKind::Downsample { src, dst: out } = entry.kind else {
                panic!("unexpected dispatch {entry:?}");
            };
            assert_eq!(src, expected_src, "stage {i} read the wrong image");
            expected_src = out;
        }
        assert_eq!(expected_src, dst.id());
    }
}
