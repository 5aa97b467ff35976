use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use tracing::{debug, warn};

use crate::types::{GpuCapabilities, GpuPowerPreference};

/// Headless device plus the capabilities of the adapter it runs on.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub capabilities: GpuCapabilities,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    pub(crate) fn new(power: GpuPowerPreference) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, power)?;
        let capabilities = adapter_capabilities(&adapter);
        debug!(
            renderer = %capabilities.renderer,
            vendor = %capabilities.vendor,
            backend = %capabilities.backend,
            software = capabilities.software,
            "selected GPU adapter"
        );
        if capabilities.software {
            warn!("only a software adapter is available; effects will render slowly");
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("gpufx device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            warn!(?reason, %message, "GPU device lost");
            flag.store(true, Ordering::SeqCst);
        });

        Ok(Self {
            _instance: instance,
            device,
            queue,
            capabilities,
            lost,
        })
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

pub(crate) fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

pub(crate) fn request_adapter(
    instance: &wgpu::Instance,
    power: GpuPowerPreference,
) -> Result<wgpu::Adapter> {
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: power.to_wgpu(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")
}

pub(crate) fn adapter_capabilities(adapter: &wgpu::Adapter) -> GpuCapabilities {
    let info = adapter.get_info();
    let limits = adapter.limits();
    let full_featured = adapter.get_downlevel_capabilities().is_webgpu_compliant();
    GpuCapabilities {
        available: true,
        full_featured,
        max_texture_size: limits.max_texture_dimension_2d,
        // Render targets share the 2D texture limit.
        max_renderbuffer_size: limits.max_texture_dimension_2d,
        vendor: vendor_name(info.vendor, &info.driver),
        renderer: if info.name.is_empty() {
            "Generic GPU".to_string()
        } else {
            info.name.clone()
        },
        backend: format!("{:?}", info.backend),
        software: info.device_type == wgpu::DeviceType::Cpu,
    }
}

fn vendor_name(pci_id: u32, driver: &str) -> String {
    let known = match pci_id {
        0x10de => Some("NVIDIA"),
        0x1002 | 0x1022 => Some("AMD"),
        0x8086 => Some("Intel"),
        0x106b => Some("Apple"),
        0x13b5 => Some("ARM"),
        0x5143 => Some("Qualcomm"),
        0x1010 => Some("Imagination Technologies"),
        0x10005 => Some("Mesa"),
        _ => None,
    };
    match known {
        Some(name) => name.to_string(),
        None if !driver.is_empty() => driver.to_string(),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_names_from_pci_ids() {
        assert_eq!(vendor_name(0x10de, "nvidia"), "NVIDIA");
        assert_eq!(vendor_name(0x8086, ""), "Intel");
        assert_eq!(vendor_name(0xbeef, "llvmpipe"), "llvmpipe");
        assert_eq!(vendor_name(0, ""), "Unknown");
    }
}
