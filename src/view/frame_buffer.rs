//! Frame buffer: a set of render views bound as draw destinations.

use log::trace;
use smallvec::SmallVec;

use super::{RenderView, ViewOperation};
use crate::core::RenderDevice;
use crate::errors::{Result, TilingError};

/// wgpu's `max_color_attachments` default.
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// A frame buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    DepthStencil,
}

impl std::fmt::Display for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attachment::Color(index) => write!(f, "color attachment {index}"),
            Attachment::DepthStencil => f.write_str("depth-stencil attachment"),
        }
    }
}

/// Color slots plus one depth-stencil slot. All attached views share one size.
pub struct FrameBuffer<D: RenderDevice> {
    colors: SmallVec<[Option<RenderView<D>>; 4]>,
    depth_stencil: Option<RenderView<D>>,
}

impl<D: RenderDevice> Default for FrameBuffer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RenderDevice> FrameBuffer<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            colors: SmallVec::new(),
            depth_stencil: None,
        }
    }

    fn views(&self) -> impl Iterator<Item = &RenderView<D>> {
        self.colors.iter().flatten().chain(self.depth_stencil.as_ref())
    }

    /// Occupied slots with their views.
    pub fn slots(&self) -> impl Iterator<Item = (Attachment, &RenderView<D>)> {
        let colors = self.colors.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|view| (Attachment::Color(index as u32), view))
        });
        colors.chain(
            self.depth_stencil
                .as_ref()
                .map(|view| (Attachment::DepthStencil, view)),
        )
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views().next().is_none()
    }

    /// Size shared by all attached views, `None` while empty.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.views().next().map(|view| (view.width(), view.height()))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.size().map_or(0, |(width, _)| width)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.size().map_or(0, |(_, height)| height)
    }

    #[must_use]
    pub fn view(&self, attachment: Attachment) -> Option<&RenderView<D>> {
        match attachment {
            Attachment::Color(index) => self.colors.get(index as usize)?.as_ref(),
            Attachment::DepthStencil => self.depth_stencil.as_ref(),
        }
    }

    fn slot_mut(&mut self, attachment: Attachment) -> Result<&mut Option<RenderView<D>>> {
        check_index(attachment)?;
        match attachment {
            Attachment::Color(index) => {
                let index = index as usize;
                if self.colors.len() <= index {
                    self.colors.resize_with(index + 1, || None);
                }
                Ok(&mut self.colors[index])
            }
            Attachment::DepthStencil => Ok(&mut self.depth_stencil),
        }
    }

    /// Binds `view` to `attachment`, returning the view it replaced.
    pub fn attach(
        &mut self,
        attachment: Attachment,
        view: RenderView<D>,
    ) -> Result<Option<RenderView<D>>> {
        check_index(attachment)?;
        view.on_attached(attachment)?;

        // A replaced view does not count toward the size check.
        let others_size = self
            .slots()
            .filter(|(slot, _)| *slot != attachment)
            .map(|(_, v)| (v.width(), v.height()))
            .next();
        let size = (view.width(), view.height());
        if let Some(expected) = others_size.filter(|&expected| expected != size) {
            return Err(TilingError::Configuration(format!(
                "{attachment}: view is {}x{}, frame buffer is {}x{}",
                size.0, size.1, expected.0, expected.1
            )));
        }

        trace!("attach {} to {attachment}", view.kind());
        let previous = self.slot_mut(attachment)?.replace(view);
        if let Some(old) = &previous {
            old.on_detached(attachment)?;
        }
        Ok(previous)
    }

    /// Unbinds whatever is in `attachment`.
    pub fn detach(&mut self, attachment: Attachment) -> Result<Option<RenderView<D>>> {
        let Some(view) = self.view(attachment) else {
            return Ok(None);
        };
        view.on_detached(attachment)?;
        trace!("detach {} from {attachment}", view.kind());
        Ok(self.slot_mut(attachment)?.take())
    }

    /// Clears every attached view with what it supports: color views with
    /// `color`, depth-stencil views with `depth` and/or `stencil`.
    pub fn clear(&self, device: &D, color: wgpu::Color, depth: f32, stencil: u32) -> Result<()> {
        for view in self.views() {
            if view.supports(ViewOperation::ClearColor) {
                view.clear_color(device, color)?;
            } else if view.supports(ViewOperation::ClearDepthStencil) {
                view.clear_depth_stencil(device, depth, stencil)?;
            } else if view.supports(ViewOperation::ClearDepth) {
                view.clear_depth(device, depth)?;
            } else if view.supports(ViewOperation::ClearStencil) {
                view.clear_stencil(device, stencil)?;
            }
        }
        Ok(())
    }
}

/// Slot indices past the limit are rejected before anything is touched.
fn check_index(attachment: Attachment) -> Result<()> {
    match attachment {
        Attachment::Color(index) if index >= MAX_COLOR_ATTACHMENTS => {
            Err(TilingError::Configuration(format!(
                "color attachment {index} exceeds the limit of {MAX_COLOR_ATTACHMENTS}"
            )))
        }
        _ => Ok(()),
    }
}
