//! wgpu Context
//!
//! [`GpuContext`] holds the core GPU handles for headless rendering: adapter,
//! device and queue. It is created once and handed out as a [`WgpuDevice`];
//! nothing in the crate looks the device up globally.

use log::debug;

use super::WgpuDevice;
use crate::errors::{Result, TilingError};
use crate::settings::GpuSettings;

/// Core wgpu context holding GPU handles.
pub struct GpuContext {
    /// The adapter the device was created from
    pub adapter: wgpu::Adapter,
    /// The wgpu device for GPU operations
    pub device: wgpu::Device,
    /// The command queue for submitting work
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new(settings: &GpuSettings) -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: settings.force_fallback_adapter,
            })
            .await
            .map_err(|e| TilingError::AdapterRequestFailed(e.to_string()))?;

        let info = adapter.get_info();
        debug!("Using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Tiling Device"),
                required_features: settings.required_features,
                required_limits: settings.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`new`](Self::new) for tools and tests.
    pub fn new_blocking(settings: &GpuSettings) -> Result<Self> {
        pollster::block_on(Self::new(settings))
    }

    /// Render device handle sharing this context's device and queue.
    #[must_use]
    pub fn render_device(&self) -> WgpuDevice {
        WgpuDevice::new(self.device.clone(), self.queue.clone())
    }
}
