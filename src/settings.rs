//! GPU & Tiling Settings
//!
//! Plain configuration structs consumed at construction time. Both implement
//! [`Default`] and are meant to be customized with struct-update syntax.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_tiling::settings::{GpuSettings, TilingSettings};
//!
//! let gpu = GpuSettings {
//!     power_preference: wgpu::PowerPreference::LowPower,
//!     ..Default::default()
//! };
//!
//! // 8x8 tiles instead of the default 16x16
//! let tiling = TilingSettings {
//!     log2_tile_size: 3,
//!     ..Default::default()
//! };
//! ```

use crate::errors::{Result, TilingError};

/// Default tile edge as a power of two (`1 << 4 = 16` pixels).
pub const DEFAULT_LOG2_TILE_SIZE: u32 = 4;

/// Largest accepted tile edge exponent (4096-pixel tiles).
pub const MAX_LOG2_TILE_SIZE: u32 = 12;

// ---------------------------------------------------------------------------
// GpuSettings
// ---------------------------------------------------------------------------

/// Configuration for headless GPU context creation.
///
/// | Field                    | Description                       | Default           |
/// |--------------------------|-----------------------------------|-------------------|
/// | `power_preference`       | GPU adapter selection strategy    | `HighPerformance` |
/// | `force_fallback_adapter` | Request a software adapter        | `false`           |
/// | `required_features`      | Required wgpu features            | Empty             |
/// | `required_limits`        | Required wgpu limits              | Default           |
#[derive(Debug, Clone)]
pub struct GpuSettings {
    /// GPU adapter selection preference.
    ///
    /// - `HighPerformance`: Prefer discrete / dedicated GPU
    /// - `LowPower`: Prefer integrated GPU (better battery life)
    pub power_preference: wgpu::PowerPreference,

    /// Ask wgpu for a software (fallback) adapter, e.g. on CI machines.
    pub force_fallback_adapter: bool,

    /// Required wgpu features that must be supported by the adapter.
    pub required_features: wgpu::Features,

    /// Required wgpu limits. `max_texture_dimension_2d` also bounds
    /// every image allocation.
    pub required_limits: wgpu::Limits,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TilingSettings
// ---------------------------------------------------------------------------

/// Configuration for [`TilingEffect`](crate::postprocess::TilingEffect).
///
/// The reduction chain has exactly `log2_tile_size` stages, so the reduced
/// image holds one texel per `tile_size() x tile_size()` block of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingSettings {
    /// Tile edge as a power of two. Must be in `1..=MAX_LOG2_TILE_SIZE`.
    pub log2_tile_size: u32,

    /// Debug label attached to images allocated by the effect.
    pub label: &'static str,
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self {
            log2_tile_size: DEFAULT_LOG2_TILE_SIZE,
            label: "Tiling",
        }
    }
}

impl TilingSettings {
    /// Tile edge in pixels.
    #[inline]
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        1 << self.log2_tile_size
    }

    pub fn validate(&self) -> Result<()> {
        if self.log2_tile_size == 0 || self.log2_tile_size > MAX_LOG2_TILE_SIZE {
            return Err(TilingError::Configuration(format!(
                "log2_tile_size must be in 1..={MAX_LOG2_TILE_SIZE}, got {}",
                self.log2_tile_size
            )));
        }
        Ok(())
    }
}
