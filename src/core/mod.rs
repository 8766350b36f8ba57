//! Device-facing core types: the [`RenderDevice`] trait, image handles and
//! allocation descriptors.

pub mod device;
pub mod image;

pub use device::RenderDevice;
pub use image::{
    GpuImage, ImageDesc, RENDER_TARGET_USAGE, downsample_chain_extents, half_extent,
};
