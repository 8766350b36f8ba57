//! Render View Abstraction
//!
//! A [`RenderView`] binds an image as a draw destination. It is a tagged
//! variant over the two view kinds, each carrying only the operations that
//! make sense for it:
//!
//! | Operation             | `ColorTarget` | `DepthStencilTarget`      |
//! |-----------------------|---------------|---------------------------|
//! | `clear_color`         | ✅            | ❌                        |
//! | `clear_depth`         | ❌            | ✅ (depth formats)        |
//! | `clear_stencil`       | ❌            | ✅ (stencil formats)      |
//! | `clear_depth_stencil` | ❌            | ✅ (depth+stencil formats)|
//! | attach / detach       | color slots   | depth-stencil slot        |
//!
//! Anything outside a view's [`ViewCapabilities`] returns
//! [`TilingError::UnsupportedOperation`].
//!
//! Clears go through the [`RenderDevice`] passed to each call.

pub mod frame_buffer;

pub use frame_buffer::{Attachment, FrameBuffer, MAX_COLOR_ATTACHMENTS};

use bitflags::bitflags;

use crate::core::{GpuImage, ImageDesc, RenderDevice};
use crate::errors::{Result, TilingError};

bitflags! {
    /// Operations a [`RenderView`] supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewCapabilities: u8 {
        const CLEAR_COLOR   = 1 << 0;
        const CLEAR_DEPTH   = 1 << 1;
        const CLEAR_STENCIL = 1 << 2;
        const ATTACH        = 1 << 3;
        const DETACH        = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ColorTarget,
    DepthStencilTarget,
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewKind::ColorTarget => f.write_str("color target"),
            ViewKind::DepthStencilTarget => f.write_str("depth-stencil target"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewOperation {
    ClearColor,
    ClearDepth,
    ClearStencil,
    ClearDepthStencil,
    Attach(Attachment),
    Detach(Attachment),
}

impl ViewOperation {
    /// Capabilities the operation needs.
    #[must_use]
    pub fn required(self) -> ViewCapabilities {
        match self {
            ViewOperation::ClearColor => ViewCapabilities::CLEAR_COLOR,
            ViewOperation::ClearDepth => ViewCapabilities::CLEAR_DEPTH,
            ViewOperation::ClearStencil => ViewCapabilities::CLEAR_STENCIL,
            ViewOperation::ClearDepthStencil => {
                ViewCapabilities::CLEAR_DEPTH | ViewCapabilities::CLEAR_STENCIL
            }
            ViewOperation::Attach(_) => ViewCapabilities::ATTACH,
            ViewOperation::Detach(_) => ViewCapabilities::DETACH,
        }
    }
}

impl std::fmt::Display for ViewOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewOperation::ClearColor => f.write_str("clear color"),
            ViewOperation::ClearDepth => f.write_str("clear depth"),
            ViewOperation::ClearStencil => f.write_str("clear stencil"),
            ViewOperation::ClearDepthStencil => f.write_str("clear depth-stencil"),
            ViewOperation::Attach(att) => write!(f, "attach to {att}"),
            ViewOperation::Detach(att) => write!(f, "detach from {att}"),
        }
    }
}

// ─── View Kinds ───────────────────────────────────────────────────────────────

/// Color render target view.
pub struct ColorTargetView<D: RenderDevice> {
    image: D::Image,
}

/// Depth and/or stencil render target view.
pub struct DepthStencilView<D: RenderDevice> {
    image: D::Image,
}

impl<D: RenderDevice> Clone for ColorTargetView<D> {
    fn clone(&self) -> Self {
        Self {
            image: self.image.clone(),
        }
    }
}

impl<D: RenderDevice> Clone for DepthStencilView<D> {
    fn clone(&self) -> Self {
        Self {
            image: self.image.clone(),
        }
    }
}

impl<D: RenderDevice> DepthStencilView<D> {
    /// Allocates a dedicated depth-stencil texture and views it.
    pub fn create(
        device: &D,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Result<Self> {
        Self::check_format(format)?;
        let image = device.allocate_image(&ImageDesc {
            width,
            height,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            sample_count,
            label: "Depth Stencil View",
        })?;
        Ok(Self { image })
    }

    fn check_format(format: wgpu::TextureFormat) -> Result<()> {
        if format.is_depth_stencil_format() {
            Ok(())
        } else {
            Err(TilingError::Configuration(format!(
                "{format:?} has no depth or stencil aspect"
            )))
        }
    }
}

// ─── RenderView ───────────────────────────────────────────────────────────────

/// A render target view of either kind.
pub enum RenderView<D: RenderDevice> {
    Color(ColorTargetView<D>),
    DepthStencil(DepthStencilView<D>),
}

impl<D: RenderDevice> Clone for RenderView<D> {
    fn clone(&self) -> Self {
        match self {
            RenderView::Color(view) => RenderView::Color(view.clone()),
            RenderView::DepthStencil(view) => RenderView::DepthStencil(view.clone()),
        }
    }
}

impl<D: RenderDevice> From<DepthStencilView<D>> for RenderView<D> {
    fn from(view: DepthStencilView<D>) -> Self {
        RenderView::DepthStencil(view)
    }
}

impl<D: RenderDevice> RenderView<D> {
    #[must_use]
    pub fn color(image: D::Image) -> Self {
        RenderView::Color(ColorTargetView { image })
    }

    /// Fails with [`TilingError::Configuration`] for formats without a depth
    /// or stencil aspect.
    pub fn depth_stencil(image: D::Image) -> Result<Self> {
        DepthStencilView::<D>::check_format(image.format())?;
        Ok(RenderView::DepthStencil(DepthStencilView { image }))
    }

    #[must_use]
    pub fn kind(&self) -> ViewKind {
        match self {
            RenderView::Color(_) => ViewKind::ColorTarget,
            RenderView::DepthStencil(_) => ViewKind::DepthStencilTarget,
        }
    }

    #[must_use]
    pub fn image(&self) -> &D::Image {
        match self {
            RenderView::Color(view) => &view.image,
            RenderView::DepthStencil(view) => &view.image,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image().width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image().height()
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.image().format()
    }

    #[must_use]
    pub fn capabilities(&self) -> ViewCapabilities {
        let common = ViewCapabilities::ATTACH | ViewCapabilities::DETACH;
        match self {
            RenderView::Color(_) => common | ViewCapabilities::CLEAR_COLOR,
            RenderView::DepthStencil(view) => {
                let format = view.image.format();
                let mut caps = common;
                caps.set(ViewCapabilities::CLEAR_DEPTH, format.has_depth_aspect());
                caps.set(ViewCapabilities::CLEAR_STENCIL, format.has_stencil_aspect());
                caps
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn supports(&self, operation: ViewOperation) -> bool {
        self.capabilities().contains(operation.required())
    }

    fn require(&self, operation: ViewOperation) -> Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(TilingError::UnsupportedOperation {
                view: self.kind(),
                operation,
            })
        }
    }

    pub fn clear_color(&self, device: &D, color: wgpu::Color) -> Result<()> {
        self.require(ViewOperation::ClearColor)?;
        device.clear_color(self.image(), color)
    }

    pub fn clear_depth(&self, device: &D, depth: f32) -> Result<()> {
        self.require(ViewOperation::ClearDepth)?;
        device.clear_depth_stencil(self.image(), Some(depth), None)
    }

    pub fn clear_stencil(&self, device: &D, stencil: u32) -> Result<()> {
        self.require(ViewOperation::ClearStencil)?;
        device.clear_depth_stencil(self.image(), None, Some(stencil))
    }

    pub fn clear_depth_stencil(&self, device: &D, depth: f32, stencil: u32) -> Result<()> {
        self.require(ViewOperation::ClearDepthStencil)?;
        device.clear_depth_stencil(self.image(), Some(depth), Some(stencil))
    }

    /// Called by [`FrameBuffer`] before the view is stored in `attachment`.
    pub fn on_attached(&self, attachment: Attachment) -> Result<()> {
        let operation = ViewOperation::Attach(attachment);
        self.require(operation)?;
        self.check_slot(attachment, operation)
    }

    /// Called by [`FrameBuffer`] when the view leaves `attachment`.
    pub fn on_detached(&self, attachment: Attachment) -> Result<()> {
        let operation = ViewOperation::Detach(attachment);
        self.require(operation)?;
        self.check_slot(attachment, operation)
    }

    fn check_slot(&self, attachment: Attachment, operation: ViewOperation) -> Result<()> {
        let fits = matches!(
            (self, attachment),
            (RenderView::Color(_), Attachment::Color(_))
                | (RenderView::DepthStencil(_), Attachment::DepthStencil)
        );
        if fits {
            Ok(())
        } else {
            Err(TilingError::UnsupportedOperation {
                view: self.kind(),
                operation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::cpu::CpuDevice;

    fn image(device: &CpuDevice, format: wgpu::TextureFormat) -> crate::backends::CpuImage {
        device
            .allocate_image(&ImageDesc::render_target(4, 4, format, "view"))
            .unwrap()
    }

    #[test]
    fn capability_sets_follow_kind_and_format() {
        let device = CpuDevice::new();
        let color = RenderView::<CpuDevice>::color(image(&device, wgpu::TextureFormat::Rgba8Unorm));
        let depth =
            RenderView::<CpuDevice>::depth_stencil(image(&device, wgpu::TextureFormat::Depth32Float))
                .unwrap();
        let stencil = RenderView::<CpuDevice>::depth_stencil(image(
            &device,
            wgpu::TextureFormat::Depth24PlusStencil8,
        ))
        .unwrap();

        assert_eq!(
            color.capabilities(),
            ViewCapabilities::CLEAR_COLOR | ViewCapabilities::ATTACH | ViewCapabilities::DETACH
        );
        assert!(depth.supports(ViewOperation::ClearDepth));
        assert!(!depth.supports(ViewOperation::ClearStencil));
        assert!(!depth.supports(ViewOperation::ClearDepthStencil));
        assert!(stencil.supports(ViewOperation::ClearDepthStencil));
        assert!(!stencil.supports(ViewOperation::ClearColor));
    }

    #[test]
    fn color_format_cannot_back_a_depth_view() {
        let device = CpuDevice::new();
        let result =
            RenderView::<CpuDevice>::depth_stencil(image(&device, wgpu::TextureFormat::Rgba8Unorm));
        assert!(matches!(result, Err(TilingError::Configuration(_))));
    }

    #[test]
    fn operation_display_names_the_slot() {
        let op = ViewOperation::Attach(Attachment::Color(2));
        assert_eq!(op.to_string(), "attach to color attachment 2");
        let err = TilingError::UnsupportedOperation {
            view: ViewKind::DepthStencilTarget,
            operation: ViewOperation::ClearColor,
        };
        assert_eq!(
            err.to_string(),
            "depth-stencil target view does not support clear color"
        );
    }
}
