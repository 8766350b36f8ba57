//! wgpu Backend
//!
//! [`WgpuDevice`] implements [`RenderDevice`] on a `wgpu::Device` and
//! `wgpu::Queue`:
//!
//! - images are single-mip 2D textures with a default view
//! - `downsample_2x2` draws a fullscreen triangle with an exact box filter
//! - clears are empty render passes with `LoadOp::Clear`
//!
//! Each operation is recorded into its own command buffer and submitted
//! immediately. Submissions on one queue execute in order, which gives the
//! read-after-write ordering the reduction chain depends on.
//!
//! Formats and sample counts are checked before any pipeline is built, so an
//! image the fullscreen passes cannot read or render into is reported as an
//! error instead of reaching wgpu validation.

mod blit;
pub mod context;
mod fullscreen;
pub mod mosaic;

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

pub use context::GpuContext;
pub use mosaic::TileMosaicPass;

use self::blit::BoxDownsampler;
use crate::core::image::{ensure_usage, next_image_id};
use crate::core::{GpuImage, ImageDesc, RenderDevice};
use crate::errors::{Result, TilingError};

fn is_float_sampled(format: wgpu::TextureFormat) -> bool {
    matches!(
        format.sample_type(None, None),
        Some(wgpu::TextureSampleType::Float { .. })
    )
}

/// Fails unless shaders can read `format` as a single-sampled
/// `texture_2d<f32>`.
pub(crate) fn ensure_float_sampled(format: wgpu::TextureFormat, sample_count: u32) -> Result<()> {
    if sample_count != 1 {
        return Err(TilingError::Configuration(format!(
            "{format:?} source has {sample_count} samples, expected 1"
        )));
    }
    if is_float_sampled(format) {
        Ok(())
    } else {
        Err(TilingError::UnsupportedFormat(format))
    }
}

/// Fails unless a fullscreen pass writing `vec4<f32>` can render into
/// `format` with the device's `features`.
pub(crate) fn ensure_float_renderable(
    format: wgpu::TextureFormat,
    features: wgpu::Features,
) -> Result<()> {
    let renderable = format
        .guaranteed_format_features(features)
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
    if !format.is_depth_stencil_format() && is_float_sampled(format) && renderable {
        Ok(())
    } else {
        Err(TilingError::UnsupportedFormat(format))
    }
}

/// Fullscreen pipelines are built with a single-sample multisample state.
pub(crate) fn ensure_single_sampled_target(target: &WgpuImage) -> Result<()> {
    let samples = target.texture.sample_count();
    if samples == 1 {
        Ok(())
    } else {
        Err(TilingError::Configuration(format!(
            "target image #{} has {samples} samples, expected 1",
            target.id
        )))
    }
}

// ─── Images ───────────────────────────────────────────────────────────────────

/// Shared handle to a GPU texture and its default view.
#[derive(Debug, Clone)]
pub struct WgpuImage {
    id: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuImage {
    /// Wraps an externally created texture, e.g. a surface frame.
    #[must_use]
    pub fn from_texture(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id: next_image_id(),
            texture,
            view,
        }
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl GpuImage for WgpuImage {
    fn id(&self) -> u64 {
        self.id
    }

    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn height(&self) -> u32 {
        self.texture.height()
    }

    fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    fn usage(&self) -> wgpu::TextureUsages {
        self.texture.usage()
    }
}

// ─── Device ───────────────────────────────────────────────────────────────────

/// Render device handle over a wgpu device and queue. Clones share the
/// same device, queue and pipeline caches.
#[derive(Clone)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    downsampler: Arc<Mutex<BoxDownsampler>>,
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let downsampler = BoxDownsampler::new(&device);
        debug!("[wgpu] render device ready");
        Self {
            device,
            queue,
            downsampler: Arc::new(Mutex::new(downsampler)),
        }
    }

    #[inline]
    #[must_use]
    pub fn raw(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    #[inline]
    #[must_use]
    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl RenderDevice for WgpuDevice {
    type Image = WgpuImage;

    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn allocate_image(&self, desc: &ImageDesc) -> Result<WgpuImage> {
        desc.validate(self.device.limits().max_texture_dimension_2d)?;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        Ok(WgpuImage::from_texture(texture))
    }

    fn downsample_2x2(&self, src: &WgpuImage, dst: &WgpuImage) -> Result<()> {
        if src.id() == dst.id() {
            return Err(TilingError::Configuration(format!(
                "cannot downsample image #{} into itself",
                src.id()
            )));
        }
        ensure_usage(src, wgpu::TextureUsages::TEXTURE_BINDING, "downsample source")?;
        ensure_usage(dst, wgpu::TextureUsages::RENDER_ATTACHMENT, "downsample target")?;
        ensure_float_sampled(src.format(), src.texture.sample_count())?;
        ensure_float_renderable(dst.format(), self.device.features())?;
        ensure_single_sampled_target(dst)?;

        let mut encoder = self.encoder("Box Downsample Encoder");
        self.downsampler
            .lock()
            .encode(&self.device, &mut encoder, src.view(), dst.view(), dst.format());
        self.submit(encoder);
        Ok(())
    }

    fn clear_color(&self, target: &WgpuImage, color: wgpu::Color) -> Result<()> {
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "clear target")?;
        if target.format().is_depth_stencil_format() {
            return Err(TilingError::UnsupportedFormat(target.format()));
        }

        let mut encoder = self.encoder("Clear Color Encoder");
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Color Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            ..Default::default()
        });
        self.submit(encoder);
        Ok(())
    }

    fn clear_depth_stencil(
        &self,
        target: &WgpuImage,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Result<()> {
        ensure_usage(target, wgpu::TextureUsages::RENDER_ATTACHMENT, "clear target")?;
        let format = target.format();
        if !format.is_depth_stencil_format() {
            return Err(TilingError::UnsupportedFormat(format));
        }

        // Aspects present in the format must have ops; untouched ones load.
        let depth_ops = format.has_depth_aspect().then(|| wgpu::Operations {
            load: depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        });
        let stencil_ops = format.has_stencil_aspect().then(|| wgpu::Operations {
            load: stencil.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
            store: wgpu::StoreOp::Store,
        });

        let mut encoder = self.encoder("Clear Depth Stencil Encoder");
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Depth Stencil Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.view(),
                depth_ops,
                stencil_ops,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            ..Default::default()
        });
        self.submit(encoder);
        Ok(())
    }
}
