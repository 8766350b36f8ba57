//! Image handles and allocation descriptors.
//!
//! An image is an opaque 2D pixel buffer owned by a [`RenderDevice`]
//! backend. Components only see it through the [`GpuImage`] trait and hold
//! cheap, shareable handles to it.
//!
//! [`RenderDevice`]: super::RenderDevice

use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{Result, TilingError};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Fresh process-wide image id. Backends assign one per allocation and
/// share it between clones of the handle.
pub(crate) fn next_image_id() -> u64 {
    NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Usage every image inside the reduction chain needs: sampled by the next
/// stage (GPU read) and rendered into by the current one (GPU write).
pub const RENDER_TARGET_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::RENDER_ATTACHMENT);

/// Read-only view of an allocated image.
pub trait GpuImage {
    /// Unique identity, shared by clones of the same handle.
    fn id(&self) -> u64;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> wgpu::TextureFormat;
    fn usage(&self) -> wgpu::TextureUsages;

    /// `(width, height)` in pixels.
    #[inline]
    fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }
}

/// Descriptor for requesting an image from a [`RenderDevice`](super::RenderDevice).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub sample_count: u32,
    pub label: &'static str,
}

impl ImageDesc {
    /// Single-sampled image that can be both sampled and rendered into.
    #[must_use]
    pub fn render_target(
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &'static str,
    ) -> Self {
        Self {
            width,
            height,
            format,
            usage: RENDER_TARGET_USAGE,
            sample_count: 1,
            label,
        }
    }

    /// Approximate size of the image in bytes. Formats without a copyable
    /// block size (packed depth-stencil) count as 4 bytes per texel.
    ///
    /// Fails with [`TilingError::AllocationFailed`] if the size does not fit
    /// in a `u64`.
    pub fn byte_size(&self) -> Result<u64> {
        let block = self.format.block_copy_size(None).unwrap_or(4);
        u64::from(self.width)
            .checked_mul(u64::from(self.height))
            .and_then(|texels| texels.checked_mul(u64::from(block)))
            .and_then(|bytes| bytes.checked_mul(u64::from(self.sample_count.max(1))))
            .ok_or_else(|| {
                TilingError::AllocationFailed(format!(
                    "'{}': {}x{} {:?} x{} overflows the addressable size",
                    self.label, self.width, self.height, self.format, self.sample_count
                ))
            })
    }

    /// Rejects requests no backend can satisfy.
    pub fn validate(&self, max_dimension: u32) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TilingError::AllocationFailed(format!(
                "'{}': zero-sized image {}x{}",
                self.label, self.width, self.height
            )));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(TilingError::AllocationFailed(format!(
                "'{}': {}x{} exceeds the device limit of {max_dimension}",
                self.label, self.width, self.height
            )));
        }
        if self.sample_count == 0 {
            return Err(TilingError::AllocationFailed(format!(
                "'{}': sample count must be at least 1",
                self.label
            )));
        }
        Ok(())
    }
}

/// Fails unless `image` was allocated with every flag in `required`.
pub(crate) fn ensure_usage<I: GpuImage>(
    image: &I,
    required: wgpu::TextureUsages,
    role: &str,
) -> Result<()> {
    if image.usage().contains(required) {
        Ok(())
    } else {
        Err(TilingError::Configuration(format!(
            "{role} image #{} lacks usage {:?} (has {:?})",
            image.id(),
            required,
            image.usage()
        )))
    }
}

/// Extent of one 2x2 reduction: each axis halves, floored, never below 1.
#[inline]
#[must_use]
pub fn half_extent((width, height): (u32, u32)) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Output extent of every stage in an `stage_count`-long 2x2 chain.
///
/// Entry `i` is what stage `i` writes; the last entry equals
/// `(max(1, w >> n), max(1, h >> n))`.
#[must_use]
pub fn downsample_chain_extents(source: (u32, u32), stage_count: usize) -> Vec<(u32, u32)> {
    std::iter::successors(Some(half_extent(source)), |&extent| Some(half_extent(extent)))
        .take(stage_count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_extents_halve_and_clamp() {
        assert_eq!(
            downsample_chain_extents((256, 256), 4),
            vec![(128, 128), (64, 64), (32, 32), (16, 16)]
        );
        assert_eq!(
            downsample_chain_extents((3, 3), 3),
            vec![(1, 1), (1, 1), (1, 1)]
        );
        assert_eq!(downsample_chain_extents((1, 640), 2), vec![(1, 320), (1, 160)]);
    }

    #[test]
    fn final_extent_matches_shift_formula() {
        for (w, h) in [(1920, 1080), (17, 5), (1, 1), (4096, 3)] {
            for n in 1..=8 {
                let last = *downsample_chain_extents((w, h), n).last().unwrap();
                assert_eq!(last, ((w >> n).max(1), (h >> n).max(1)));
            }
        }
    }

    #[test]
    fn validate_rejects_zero_and_oversized() {
        let fmt = wgpu::TextureFormat::Rgba8Unorm;
        assert!(ImageDesc::render_target(0, 4, fmt, "z").validate(8192).is_err());
        assert!(ImageDesc::render_target(9000, 4, fmt, "big").validate(8192).is_err());
        assert!(ImageDesc::render_target(16, 16, fmt, "ok").validate(8192).is_ok());
    }

    #[test]
    fn byte_size_uses_block_size() {
        let desc = ImageDesc::render_target(4, 2, wgpu::TextureFormat::Rgba16Float, "hdr");
        assert_eq!(desc.byte_size().unwrap(), 4 * 2 * 8);
    }

    #[test]
    fn byte_size_overflow_is_an_allocation_failure() {
        let desc = ImageDesc::render_target(
            u32::MAX,
            u32::MAX,
            wgpu::TextureFormat::Rgba32Float,
            "huge",
        );
        assert!(matches!(
            desc.byte_size(),
            Err(TilingError::AllocationFailed(_))
        ));
    }

    #[test]
    fn image_ids_are_unique() {
        let a = next_image_id();
        let b = next_image_id();
        assert_ne!(a, b);
    }
}
