//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`TilingError`] covers all failure modes including:
//! - GPU initialization failures
//! - Pipeline configuration and endpoint binding errors
//! - Image allocation failures reported by a [`RenderDevice`](crate::core::RenderDevice)
//! - Render view capability violations
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, TilingError>`.
//!
//! ```rust,ignore
//! use myth_tiling::errors::{Result, TilingError};
//!
//! fn reduce() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::view::{ViewKind, ViewOperation};

/// Which side of a pass was left unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Input,
    Output,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Input => f.write_str("input"),
            Endpoint::Output => f.write_str("output"),
        }
    }
}

/// The main error type for the tiling post-process.
#[derive(Error, Debug)]
pub enum TilingError {
    // ========================================================================
    // GPU Context Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// Invalid stage count, tile size, or binding order.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `apply()` was called while a required endpoint had no image.
    #[error("Pass '{pass}' has no {endpoint} bound")]
    UnboundEndpoint {
        /// Name of the pass that refused to run
        pass: String,
        /// The missing endpoint
        endpoint: Endpoint,
    },

    /// The image allocator refused a request. Never retried internally.
    #[error("Image allocation failed: {0}")]
    AllocationFailed(String),

    /// The backend cannot read or write images of this format.
    #[error("Unsupported texture format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    // ========================================================================
    // Render View Errors
    // ========================================================================
    /// The operation is outside the view's capability set.
    #[error("{view} view does not support {operation}")]
    UnsupportedOperation {
        view: ViewKind,
        operation: ViewOperation,
    },
}

impl TilingError {
    pub(crate) fn unbound(pass: &str, endpoint: Endpoint) -> Self {
        TilingError::UnboundEndpoint {
            pass: pass.to_string(),
            endpoint,
        }
    }
}

/// Alias for `Result<T, TilingError>`.
pub type Result<T> = std::result::Result<T, TilingError>;
