//! Render View and FrameBuffer Tests
//!
//! Tests for:
//! - Capability sets per view kind and format
//! - Clears routed through the device
//! - UnsupportedOperation errors for capability violations
//! - FrameBuffer attach / detach / clear

use glam::Vec4;

use myth_tiling::backends::cpu::{CpuDevice, CpuImage, DispatchKind};
use myth_tiling::core::{GpuImage, ImageDesc, RenderDevice};
use myth_tiling::errors::TilingError;
use myth_tiling::view::{
    Attachment, DepthStencilView, FrameBuffer, RenderView, ViewKind, ViewOperation,
};

fn image(device: &CpuDevice, format: wgpu::TextureFormat) -> CpuImage {
    device
        .allocate_image(&ImageDesc::render_target(4, 4, format, "view"))
        .unwrap()
}

fn unsupported(result: myth_tiling::Result<()>, kind: ViewKind, op: ViewOperation) -> bool {
    matches!(
        result,
        Err(TilingError::UnsupportedOperation { view, operation }) if view == kind && operation == op
    )
}

// ============================================================================
// Color views
// ============================================================================

#[test]
fn color_view_clears_every_texel() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let target = image(&device, wgpu::TextureFormat::Rgba8Unorm);
    let view = RenderView::<CpuDevice>::color(target.clone());

    view.clear_color(&device, wgpu::Color { r: 0.0, g: 0.5, b: 1.0, a: 1.0 })?;

    assert!(
        target
            .read_texels()
            .iter()
            .all(|&t| t == Vec4::new(0.0, 0.5, 1.0, 1.0))
    );
    assert_eq!(
        device.dispatch_log().last().map(|d| d.kind),
        Some(DispatchKind::ClearColor {
            target: target.id()
        })
    );
    Ok(())
}

#[test]
fn color_view_rejects_depth_and_stencil_clears() {
    let device = CpuDevice::new();
    let view = RenderView::<CpuDevice>::color(image(&device, wgpu::TextureFormat::Rgba8Unorm));
    let kind = ViewKind::ColorTarget;

    assert!(unsupported(view.clear_depth(&device, 1.0), kind, ViewOperation::ClearDepth));
    assert!(unsupported(view.clear_stencil(&device, 0), kind, ViewOperation::ClearStencil));
    assert!(unsupported(
        view.clear_depth_stencil(&device, 1.0, 0),
        kind,
        ViewOperation::ClearDepthStencil
    ));
    assert!(device.dispatch_log().is_empty());
}

// ============================================================================
// Depth-stencil views
// ============================================================================

#[test]
fn depth_view_rejects_color_clear() {
    let device = CpuDevice::new();
    let view = RenderView::<CpuDevice>::depth_stencil(image(
        &device,
        wgpu::TextureFormat::Depth24PlusStencil8,
    ))
    .unwrap();

    assert_eq!(view.kind(), ViewKind::DepthStencilTarget);
    assert!(unsupported(
        view.clear_color(&device, wgpu::Color::BLACK),
        ViewKind::DepthStencilTarget,
        ViewOperation::ClearColor
    ));
}

#[test]
fn depth_only_format_rejects_stencil_clear() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let depth = image(&device, wgpu::TextureFormat::Depth32Float);
    let view = RenderView::<CpuDevice>::depth_stencil(depth.clone())?;

    view.clear_depth(&device, 0.5)?;
    assert_eq!(depth.texel(0, 0).map(|t| t.x), Some(0.5));
    assert!(unsupported(
        view.clear_stencil(&device, 1),
        ViewKind::DepthStencilTarget,
        ViewOperation::ClearStencil
    ));
    Ok(())
}

#[test]
fn created_depth_view_owns_its_texture() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let view: RenderView<CpuDevice> =
        DepthStencilView::create(&device, 64, 32, wgpu::TextureFormat::Depth24PlusStencil8, 1)?
            .into();

    assert_eq!((view.width(), view.height()), (64, 32));
    assert_eq!(view.format(), wgpu::TextureFormat::Depth24PlusStencil8);
    view.clear_depth_stencil(&device, 1.0, 3)?;
    assert_eq!(view.image().texel(63, 31), Some(Vec4::new(1.0, 3.0, 0.0, 0.0)));

    assert!(matches!(
        DepthStencilView::create(&device, 64, 32, wgpu::TextureFormat::Rgba8Unorm, 1),
        Err(TilingError::Configuration(_))
    ));
    Ok(())
}

// ============================================================================
// FrameBuffer
// ============================================================================

#[test]
fn frame_buffer_attach_detach_roundtrip() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let mut fb = FrameBuffer::<CpuDevice>::new();
    let color = image(&device, wgpu::TextureFormat::Rgba8Unorm);

    fb.attach(Attachment::Color(0), RenderView::color(color.clone()))?;
    assert_eq!(
        fb.view(Attachment::Color(0)).map(|v| v.image().id()),
        Some(color.id())
    );
    assert!(fb.view(Attachment::DepthStencil).is_none());
    assert_eq!((fb.width(), fb.height()), (4, 4));

    let detached = fb.detach(Attachment::Color(0))?;
    assert_eq!(detached.map(|v| v.image().id()), Some(color.id()));
    assert!(fb.view(Attachment::Color(0)).is_none());
    Ok(())
}

#[test]
fn frame_buffer_rejects_size_mismatch() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let mut fb = FrameBuffer::<CpuDevice>::new();
    fb.attach(
        Attachment::Color(0),
        RenderView::color(image(&device, wgpu::TextureFormat::Rgba8Unorm)),
    )?;

    let depth = DepthStencilView::create(&device, 8, 8, wgpu::TextureFormat::Depth32Float, 1)?;
    let result = fb.attach(Attachment::DepthStencil, depth.into());
    assert!(matches!(result, Err(TilingError::Configuration(_))));
    assert!(fb.view(Attachment::DepthStencil).is_none());
    Ok(())
}

#[test]
fn frame_buffer_clear_uses_each_views_capabilities() -> anyhow::Result<()> {
    let device = CpuDevice::new();
    let mut fb = FrameBuffer::<CpuDevice>::new();
    let albedo = image(&device, wgpu::TextureFormat::Rgba8Unorm);
    let normal = image(&device, wgpu::TextureFormat::Rgba16Float);
    let depth = image(&device, wgpu::TextureFormat::Depth32Float);

    fb.attach(Attachment::Color(0), RenderView::color(albedo.clone()))?;
    fb.attach(Attachment::Color(1), RenderView::color(normal.clone()))?;
    fb.attach(Attachment::DepthStencil, RenderView::depth_stencil(depth.clone())?)?;

    fb.clear(&device, wgpu::Color::WHITE, 1.0, 0)?;

    assert!(albedo.read_texels().iter().all(|&t| t == Vec4::ONE));
    assert!(normal.read_texels().iter().all(|&t| t == Vec4::ONE));
    assert!(depth.read_texels().iter().all(|t| t.x == 1.0 && t.y == 0.0));

    let kinds: Vec<DispatchKind> = device.dispatch_log().into_iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DispatchKind::ClearColor { target: albedo.id() },
            DispatchKind::ClearColor { target: normal.id() },
            DispatchKind::ClearDepthStencil { target: depth.id() },
        ]
    );
    Ok(())
}
