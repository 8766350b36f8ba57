//! CPU Reference Backend
//!
//! A [`RenderDevice`] that keeps every image in host memory as RGBA `f32`
//! texels and executes work inline. Used by tests, tools, and hosts without a
//! GPU.
//!
//! # Texel layout
//!
//! Row-major `Vec<Vec4>`. Depth-stencil images store depth in `x` and the
//! stencil reference in `y`.
//!
//! # Dispatch log
//!
//! Every operation that writes texels appends a [`Dispatch`] carrying a
//! device-wide, strictly increasing sequence number. The log is the CPU
//! equivalent of GPU timestamp queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::core::image::ensure_usage;
use crate::core::image::next_image_id;
use crate::core::{GpuImage, ImageDesc, RenderDevice};
use crate::errors::{Result, TilingError};
use crate::postprocess::{ShadingPass, TileParams};

/// Same default as `wgpu::Limits::default().max_texture_dimension_2d`.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

// ─── Dispatch Log ─────────────────────────────────────────────────────────────

/// What a logged operation did. IDs are [`GpuImage::id`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    Downsample { src: u64, dst: u64 },
    ClearColor { target: u64 },
    ClearDepthStencil { target: u64 },
    Shade { input: u64, target: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub sequence: u64,
    pub kind: DispatchKind,
}

// ─── Device ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DeviceState {
    max_dimension: u32,
    memory_budget: Option<u64>,
    /// Bytes held by live images; shared with every image so drops are counted.
    live_bytes: Arc<AtomicU64>,
    next_sequence: AtomicU64,
    log: Mutex<Vec<Dispatch>>,
}

/// Host-memory render device. Clones share the same state.
#[derive(Debug, Clone)]
pub struct CpuDevice {
    state: Arc<DeviceState>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuDevice {
    /// Device with the default dimension limit and no memory budget.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_DIMENSION, None)
    }

    /// Device that refuses allocations beyond `max_dimension` per axis or
    /// beyond `memory_budget` bytes of live images.
    #[must_use]
    pub fn with_limits(max_dimension: u32, memory_budget: Option<u64>) -> Self {
        Self {
            state: Arc::new(DeviceState {
                max_dimension,
                memory_budget,
                live_bytes: Arc::new(AtomicU64::new(0)),
                next_sequence: AtomicU64::new(0),
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Bytes currently held by images allocated from this device.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.state.live_bytes.load(Ordering::Relaxed)
    }

    /// Snapshot of every dispatch recorded so far, in execution order.
    #[must_use]
    pub fn dispatch_log(&self) -> Vec<Dispatch> {
        self.state.log.lock().clone()
    }

    /// Drains the dispatch log.
    pub fn take_dispatch_log(&self) -> Vec<Dispatch> {
        std::mem::take(&mut *self.state.log.lock())
    }

    /// Allocates an image and uploads `texels` into it.
    pub fn create_image_with_texels(&self, desc: &ImageDesc, texels: &[Vec4]) -> Result<CpuImage> {
        let image = self.allocate_image(desc)?;
        image.write_texels(texels)?;
        Ok(image)
    }

    /// Adds `bytes` to the live total, failing if that would exceed the
    /// budget. Check and update are one atomic step.
    fn reserve_bytes(&self, label: &str, bytes: u64) -> Result<()> {
        let budget = self.state.memory_budget;
        self.state
            .live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(bytes)
                    .filter(|&next| budget.is_none_or(|budget| next <= budget))
            })
            .map(|_| ())
            .map_err(|live| {
                TilingError::AllocationFailed(match budget {
                    Some(budget) => format!(
                        "'{label}': {bytes} bytes requested, {} of {budget} available",
                        budget.saturating_sub(live)
                    ),
                    None => format!("'{label}': {bytes} bytes overflow the live total {live}"),
                })
            })
    }

    pub(crate) fn record(&self, kind: DispatchKind) {
        let sequence = self.state.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.state.log.lock().push(Dispatch { sequence, kind });
    }
}

impl RenderDevice for CpuDevice {
    type Image = CpuImage;

    fn backend_name(&self) -> &'static str {
        "cpu"
    }

    fn allocate_image(&self, desc: &ImageDesc) -> Result<CpuImage> {
        desc.validate(self.state.max_dimension)?;

        let bytes = desc.byte_size()?;
        self.reserve_bytes(desc.label, bytes)?;

        let texel_count = desc.width as usize * desc.height as usize;
        let mut texels = Vec::new();
        if let Err(e) = texels.try_reserve_exact(texel_count) {
            self.state.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
            return Err(TilingError::AllocationFailed(format!(
                "'{}': {texel_count} texels: {e}",
                desc.label
            )));
        }
        texels.resize(texel_count, Vec4::ZERO);

        let image = CpuImage(Arc::new(CpuImageStorage {
            id: next_image_id(),
            label: desc.label,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            bytes,
            texels: RwLock::new(texels),
            live_bytes: Arc::clone(&self.state.live_bytes),
        }));

        debug!(
            "[cpu] allocated #{} '{}' {}x{} {:?}",
            image.id(),
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        Ok(image)
    }

    fn downsample_2x2(&self, src: &CpuImage, dst: &CpuImage) -> Result<()> {
        if src.id() == dst.id() {
            return Err(TilingError::Configuration(format!(
                "cannot downsample image #{} into itself",
                src.id()
            )));
        }
        ensure_usage(src, wgpu::TextureUsages::TEXTURE_BINDING, "downsample source")?;
        ensure_usage(dst, wgpu::TextureUsages::RENDER_ATTACHMENT, "downsample target")?;

        let (src_w, src_h) = (src.width() as usize, src.height() as usize);
        let (dst_w, dst_h) = (dst.width() as usize, dst.height() as usize);
        {
            let source = src.0.texels.read();
            let mut target = dst.0.texels.write();
            let at = |x: usize, y: usize| source[y * src_w + x];

            for y in 0..dst_h {
                let y0 = (2 * y).min(src_h - 1);
                let y1 = (2 * y + 1).min(src_h - 1);
                for x in 0..dst_w {
                    let x0 = (2 * x).min(src_w - 1);
                    let x1 = (2 * x + 1).min(src_w - 1);
                    target[y * dst_w + x] = (at(x0, y0) + at(x1, y0) + at(x0, y1) + at(x1, y1)) * 0.25;
                }
            }
        }

        self.record(DispatchKind::Downsample {
            src: src.id(),
            dst: dst.id(),
        });
        Ok(())
    }

    fn clear_color(&self, target: &CpuImage, color: wgpu::Color) -> Result<()> {
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "clear target")?;
        if target.format().is_depth_stencil_format() {
            return Err(TilingError::UnsupportedFormat(target.format()));
        }

        target.fill(Vec4::new(
            color.r as f32,
            color.g as f32,
            color.b as f32,
            color.a as f32,
        ));
        self.record(DispatchKind::ClearColor {
            target: target.id(),
        });
        Ok(())
    }

    fn clear_depth_stencil(
        &self,
        target: &CpuImage,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<()> {
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "clear target")?;
        let format = target.format();
        if !format.is_depth_stencil_format() {
            return Err(TilingError::UnsupportedFormat(format));
        }

        let depth = depth.filter(|_| format.has_depth_aspect());
        let stencil = stencil.filter(|_| format.has_stencil_aspect());
        for texel in target.0.texels.write().iter_mut() {
            if let Some(depth) = depth {
                texel.x = depth;
            }
            if let Some(stencil) = stencil {
                texel.y = stencil as f32;
            }
        }

        self.record(DispatchKind::ClearDepthStencil {
            target: target.id(),
        });
        Ok(())
    }
}

// ─── Images ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CpuImageStorage {
    id: u64,
    label: &'static str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    bytes: u64,
    texels: RwLock<Vec<Vec4>>,
    live_bytes: Arc<AtomicU64>,
}

impl Drop for CpuImageStorage {
    fn drop(&mut self) {
        self.live_bytes.fetch_sub(self.bytes, Ordering::Relaxed);
    }
}

/// Shared handle to a host-memory image.
#[derive(Debug, Clone)]
pub struct CpuImage(Arc<CpuImageStorage>);

impl CpuImage {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.0.label
    }

    /// Texel at `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn texel(&self, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let index = y as usize * self.width() as usize + x as usize;
        Some(self.0.texels.read()[index])
    }

    /// Copy of all texels, row-major.
    #[must_use]
    pub fn read_texels(&self) -> Vec<Vec4> {
        self.0.texels.read().clone()
    }

    pub fn write_texels(&self, texels: &[Vec4]) -> Result<()> {
        let mut storage = self.0.texels.write();
        if texels.len() != storage.len() {
            return Err(TilingError::Configuration(format!(
                "image #{} holds {} texels, got {}",
                self.id(),
                storage.len(),
                texels.len()
            )));
        }
        storage.copy_from_slice(texels);
        Ok(())
    }

    pub fn fill(&self, value: Vec4) {
        self.0.texels.write().fill(value);
    }
}

impl GpuImage for CpuImage {
    fn id(&self) -> u64 {
        self.0.id
    }

    fn width(&self) -> u32 {
        self.0.width
    }

    fn height(&self) -> u32 {
        self.0.height
    }

    fn format(&self) -> wgpu::TextureFormat {
        self.0.format
    }

    fn usage(&self) -> wgpu::TextureUsages {
        self.0.usage
    }
}

// ─── Shading ──────────────────────────────────────────────────────────────────

/// CPU counterpart of [`TileMosaicPass`](crate::backends::gpu::TileMosaicPass):
/// every target pixel takes the reduced texel of the tile it falls in.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuTileMosaic;

impl ShadingPass<CpuDevice> for CpuTileMosaic {
    fn name(&self) -> &str {
        "CPU Tile Mosaic"
    }

    fn apply(
        &mut self,
        device: &CpuDevice,
        input: &CpuImage,
        target: &CpuImage,
        params: &TileParams,
    ) -> Result<()> {
        if input.id() == target.id() {
            return Err(TilingError::Configuration(format!(
                "{}: input and target are the same image #{}",
                self.name(),
                input.id()
            )));
        }
        ensure_usage(input, wgpu::TextureUsages::TEXTURE_BINDING, "mosaic source")?;
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "mosaic target")?;

        let inv_tile = params.inv_tile_size();
        let (in_w, in_h) = (input.width() as usize, input.height() as usize);
        let (out_w, out_h) = (target.width() as usize, target.height() as usize);
        // Sample at pixel centers, as the fragment shader does.
        let tile_of = |p: usize, limit: usize| (((p as f32 + 0.5) * inv_tile) as usize).min(limit - 1);
        {
            let reduced = input.0.texels.read();
            let mut out = target.0.texels.write();
            for y in 0..out_h {
                let ty = tile_of(y, in_h);
                for x in 0..out_w {
                    out[y * out_w + x] = reduced[ty * in_w + tile_of(x, in_w)];
                }
            }
        }

        device.record(DispatchKind::Shade {
            input: input.id(),
            target: target.id(),
        });
        Ok(())
    }
}
