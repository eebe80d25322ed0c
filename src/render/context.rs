//! GPU context management using wgpu

use crate::core::error::Error;

/// Headless GPU context: no surface, compute + offscreen rendering only
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Create a new headless GPU context
    pub async fn new_headless() -> Result<Self, Error> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let adapter_limits = adapter.limits();

        let device_desc = wgpu::DeviceDescriptor {
            label: Some("grassfield_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits {
                max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
                max_buffer_size: adapter_limits.max_buffer_size,
                ..Default::default()
            },
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: Default::default(),
        };

        let (device, queue) = adapter
            .request_device(&device_desc)
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);
        log::info!("GPU buffer limits: max_buffer_size={}MB, max_storage_binding={}MB",
            adapter_limits.max_buffer_size / 1024 / 1024,
            adapter_limits.max_storage_buffer_binding_size / 1024 / 1024);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`GpuContext::new_headless`]
    pub fn new_headless_blocking() -> Result<Self, Error> {
        pollster::block_on(Self::new_headless())
    }
}
