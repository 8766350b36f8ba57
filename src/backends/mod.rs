//! [`RenderDevice`](crate::core::RenderDevice) implementations.
//!
//! - [`gpu`]: wgpu textures and fullscreen render passes
//! - [`cpu`]: host-memory reference implementation with a dispatch log

pub mod cpu;
pub mod gpu;

pub use cpu::{CpuDevice, CpuImage, CpuTileMosaic};
pub use gpu::{GpuContext, TileMosaicPass, WgpuDevice, WgpuImage};
